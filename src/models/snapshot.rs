use crate::models::volume::{Category, IconTag, VolumeEntry};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::BTreeMap;

/// A volume together with everything the classifier decided about it.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedVolume {
    pub entry:        VolumeEntry,
    pub category:     Category,
    pub icon:         IconTag,
    pub display_name: String,
}

/// Categorized view of all volumes at one point in time.
///
/// A snapshot is never modified once built; a refresh produces a new one.
#[derive(Debug, Clone)]
pub struct Snapshot {
    generation: u64,
    taken_at:   DateTime<Local>,
    volumes:    BTreeMap<String, ClassifiedVolume>,
}

impl Snapshot {
    pub(crate) fn new(
        generation: u64,
        taken_at: DateTime<Local>,
        volumes: BTreeMap<String, ClassifiedVolume>,
    ) -> Self {
        Self { generation, taken_at, volumes }
    }

    /// Position of this snapshot in its builder's sequence; strictly increasing.
    pub fn generation(&self) -> u64 { self.generation }

    pub fn taken_at(&self) -> DateTime<Local> { self.taken_at }

    pub fn len(&self) -> usize { self.volumes.len() }

    pub fn is_empty(&self) -> bool { self.volumes.is_empty() }

    pub fn get(&self, path: &str) -> Option<&ClassifiedVolume> {
        self.volumes.get(path)
    }

    /// All volumes, ordered by path.
    pub fn volumes(&self) -> impl Iterator<Item = &ClassifiedVolume> {
        self.volumes.values()
    }

    /// Volumes of one category, ordered by path.
    pub fn in_category(&self, category: Category) -> Vec<&ClassifiedVolume> {
        self.volumes.values().filter(|v| v.category == category).collect()
    }

    pub fn internal(&self) -> Option<&ClassifiedVolume> {
        self.volumes.values().find(|v| v.category == Category::Internal)
    }

    pub fn is_newer_than(&self, other: &Snapshot) -> bool {
        (self.generation, self.taken_at) > (other.generation, other.taken_at)
    }

    /// Read-only structure handed to renderers.
    pub fn view(&self) -> SnapshotView {
        let sections = Category::ALL
            .iter()
            .map(|&category| Section {
                category,
                title: category.label(),
                rows:  self.in_category(category).into_iter().map(DisplayRow::from).collect(),
            })
            .collect();
        SnapshotView { generation: self.generation, taken_at: self.taken_at, sections }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotView {
    pub generation: u64,
    pub taken_at:   DateTime<Local>,
    pub sections:   Vec<Section>,
}

impl SnapshotView {
    pub fn section(&self, category: Category) -> Option<&Section> {
        self.sections.iter().find(|s| s.category == category)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Section {
    pub category: Category,
    pub title:    &'static str,
    pub rows:     Vec<DisplayRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DisplayRow {
    pub display_name: String,
    pub path:         String,
    pub total_bytes:  u64,
    pub used_bytes:   u64,
    pub free_bytes:   u64,
    pub icon:         IconTag,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fs_type:      Option<String>,
}

impl From<&ClassifiedVolume> for DisplayRow {
    fn from(v: &ClassifiedVolume) -> Self {
        Self {
            display_name: v.display_name.clone(),
            path:         v.entry.path.clone(),
            total_bytes:  v.entry.total_bytes,
            used_bytes:   v.entry.used_bytes,
            free_bytes:   v.entry.free_bytes,
            icon:         v.icon,
            fs_type:      v.entry.fs_type.clone(),
        }
    }
}
