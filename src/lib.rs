//! volmon: mounted-volume classification and change detection.
//!
//! - [`collectors`] enumerates mounts and reads their capacity.
//! - [`classify`] assigns each mount a [`Category`].
//! - [`builder`] turns a probe result into an immutable [`Snapshot`].
//! - [`pipeline`] delivers snapshots to a consumer in order.
//! - [`watcher`] triggers debounced refreshes on mount activity.

pub mod builder;
pub mod classify;
pub mod collectors;
pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod util;
pub mod watcher;

pub use builder::SnapshotBuilder;
pub use classify::Classifier;
pub use collectors::{MountTableProbe, VolumeProbe};
pub use error::{BuildError, ProbeEntryError, ProbeError, WatcherSetupError};
pub use models::snapshot::{ClassifiedVolume, Snapshot, SnapshotView};
pub use models::volume::{Category, IconTag, VolumeEntry};
pub use pipeline::{RefreshPipeline, SnapshotSink};
pub use watcher::{ChangeWatcher, Coverage, Trigger, WatchState, WatcherOptions};
