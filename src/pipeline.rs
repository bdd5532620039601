//! The refresh pipeline: build a snapshot and hand it to its consumer.

use crate::builder::SnapshotBuilder;
use crate::collectors::VolumeProbe;
use crate::error::BuildError;
use crate::models::snapshot::Snapshot;
use tracing::{debug, warn};

/// Consumer of snapshots, e.g. a renderer.
pub trait SnapshotSink: Send {
    fn accept(&mut self, snapshot: Snapshot);

    /// Called when a refresh failed. The last accepted snapshot stays current.
    fn unavailable(&mut self, _error: &BuildError) {}
}

impl<F> SnapshotSink for F
where
    F: FnMut(Snapshot) + Send,
{
    fn accept(&mut self, snapshot: Snapshot) {
        self(snapshot)
    }
}

/// Owns the builder and the sink, and only ever forwards snapshots newer
/// than the last one delivered.
pub struct RefreshPipeline<P, S> {
    builder:         SnapshotBuilder<P>,
    sink:            S,
    last_generation: u64,
}

impl<P: VolumeProbe, S: SnapshotSink> RefreshPipeline<P, S> {
    pub fn new(builder: SnapshotBuilder<P>, sink: S) -> Self {
        Self { builder, sink, last_generation: 0 }
    }

    /// Run one refresh. On failure the sink is told the volume list is
    /// unavailable and the error is returned so the caller can retry.
    pub fn refresh(&mut self) -> Result<(), BuildError> {
        let snapshot = match self.builder.build() {
            Ok(s)  => s,
            Err(e) => {
                warn!("volume list unavailable: {e}");
                self.sink.unavailable(&e);
                return Err(e);
            }
        };
        self.deliver(snapshot);
        Ok(())
    }

    /// Hand a snapshot to the sink unless one at least as new was already
    /// delivered. Returns whether it was accepted. Snapshots built elsewhere
    /// (e.g. on another thread) may arrive out of order.
    pub fn deliver(&mut self, snapshot: Snapshot) -> bool {
        if snapshot.generation() <= self.last_generation {
            debug!("dropping stale snapshot #{}", snapshot.generation());
            return false;
        }
        self.last_generation = snapshot.generation();
        self.sink.accept(snapshot);
        true
    }

    pub fn last_generation(&self) -> u64 {
        self.last_generation
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}
