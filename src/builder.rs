//! Turns a probe result into a [`Snapshot`].

use crate::classify::Classifier;
use crate::collectors::VolumeProbe;
use crate::error::BuildError;
use crate::models::snapshot::{ClassifiedVolume, Snapshot};
use crate::models::volume::{Category, VolumeEntry};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

pub struct SnapshotBuilder<P> {
    probe:           P,
    classifier:      Classifier,
    next_generation: AtomicU64,
}

impl<P: VolumeProbe> SnapshotBuilder<P> {
    pub fn new(probe: P, classifier: Classifier) -> Self {
        Self { probe, classifier, next_generation: AtomicU64::new(1) }
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Probe the system and classify every volume. Nothing is cached: each
    /// call reads the mount table afresh.
    pub fn build(&self) -> Result<Snapshot, BuildError> {
        let entries = self.probe.list_volumes()?;
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let snapshot = Snapshot::new(generation, chrono::Local::now(), self.assemble(entries));
        debug!("built snapshot #{} with {} volume(s)", generation, snapshot.len());
        Ok(snapshot)
    }

    fn assemble(&self, entries: Vec<VolumeEntry>) -> BTreeMap<String, ClassifiedVolume> {
        let fallback_internal = self.fallback_internal(&entries);

        let mut volumes = BTreeMap::new();
        for entry in entries {
            let category = if fallback_internal.as_deref() == Some(entry.path.as_str()) {
                Category::Internal
            } else {
                self.classifier.classify_entry(&entry)
            };
            let volume = ClassifiedVolume {
                icon:         self.classifier.icon_hint(&entry.path, category),
                display_name: self.classifier.display_name(&entry.path),
                category,
                entry,
            };
            // Mount over mount: the later table line is the visible one.
            volumes.insert(volume.entry.path.clone(), volume);
        }
        volumes
    }

    /// Without a "/" mount, the first volume outside the mount root stands in
    /// for the internal drive.
    fn fallback_internal(&self, entries: &[VolumeEntry]) -> Option<String> {
        if entries.iter().any(|e| e.path == "/") {
            return None;
        }
        entries
            .iter()
            .find(|e| !self.classifier.is_under_mount_root(&e.path))
            .map(|e| e.path.clone())
    }
}
