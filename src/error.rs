//! Error types for probing, building and watching.
//!
//! Only [`ProbeError`] ever reaches the caller of a refresh. Per-volume
//! failures ([`ProbeEntryError`]) are logged and the volume is dropped.

use std::path::PathBuf;
use thiserror::Error;

/// The mount table could not be read at all.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("cannot read mount table {path}: {source}")]
    MountTable {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Capacity figures for a single mount point could not be read.
#[derive(Debug, Error)]
#[error("cannot stat {mount}: {source}")]
pub struct ProbeEntryError {
    pub mount:  String,
    #[source]
    pub source: nix::Error,
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("volume enumeration failed: {0}")]
    Probe(#[from] ProbeError),
}

#[derive(Debug, Error)]
pub enum WatcherSetupError {
    /// The change signal on the mount root could not be installed.
    #[error("cannot watch mount root {path}: {source}")]
    MountRoot {
        path:   PathBuf,
        #[source]
        source: notify::Error,
    },

    /// The mount-table notification could not be subscribed.
    #[error("cannot subscribe to mount notifications via {path}: {source}")]
    Subscribe {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot spawn watcher thread: {0}")]
    Spawn(#[source] std::io::Error),
}
