pub mod snapshot;
pub mod volume;
