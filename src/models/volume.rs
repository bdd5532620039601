use serde::{Deserialize, Serialize};

/// One mounted volume with its capacity figures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeEntry {
    pub path:        String,          // mount point, unique key
    pub total_bytes: u64,
    pub free_bytes:  u64,             // available to unprivileged users
    pub used_bytes:  u64,
    pub device:      Option<String>,  // "/dev/sdb1", "server:/export"
    pub fs_type:     Option<String>,  // "ext4", "nfs4", "cifs"
}

impl VolumeEntry {
    /// Build an entry from raw capacity figures. `used` is clamped to
    /// `0..=total` when the OS reports more free space than capacity.
    pub fn new(path: impl Into<String>, total_bytes: u64, free_bytes: u64) -> Self {
        Self {
            path: path.into(),
            total_bytes,
            free_bytes,
            used_bytes: total_bytes.saturating_sub(free_bytes),
            device:  None,
            fs_type: None,
        }
    }

    pub fn with_mount_info(mut self, device: Option<String>, fs_type: Option<String>) -> Self {
        self.device  = device;
        self.fs_type = fs_type;
        self
    }

    pub fn use_pct(&self) -> f64 {
        if self.total_bytes == 0 { return 0.0; }
        self.used_bytes as f64 / self.total_bytes as f64 * 100.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Internal,
    External,
    System,
    Network,
}

impl Category {
    /// Presentation order of the sections.
    pub const ALL: [Category; 4] = [
        Category::Internal,
        Category::External,
        Category::System,
        Category::Network,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Category::Internal => "Internal Drive",
            Category::External => "External Storage",
            Category::System   => "System Volumes",
            Category::Network  => "Network Storage",
        }
    }
}

/// Display hint for a volume. Purely cosmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IconTag {
    InternalDrive,
    ExternalDrive,
    Network,
    Gearshape,
    Library,
    Private,
    Recovery,
    OpticalDisc,
}

impl IconTag {
    pub fn label(&self) -> &'static str {
        match self {
            IconTag::InternalDrive => "internaldrive",
            IconTag::ExternalDrive => "externaldrive",
            IconTag::Network       => "network",
            IconTag::Gearshape     => "gearshape",
            IconTag::Library       => "library",
            IconTag::Private       => "private",
            IconTag::Recovery      => "recovery",
            IconTag::OpticalDisc   => "opticaldisc",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn used_is_total_minus_free() {
        let e = VolumeEntry::new("/", 500_000_000_000, 200_000_000_000);
        assert_eq!(e.used_bytes, 300_000_000_000);
    }

    #[test]
    fn used_clamps_when_free_exceeds_total() {
        let e = VolumeEntry::new("/media/usb", 100, 150);
        assert_eq!(e.used_bytes, 0);
        assert!(e.used_bytes <= e.total_bytes);
    }

    #[test]
    fn empty_volume_has_no_usage() {
        let e = VolumeEntry::new("/media/empty", 0, 0);
        assert_eq!(e.used_bytes, 0);
        assert_eq!(e.use_pct(), 0.0);
    }

    #[test]
    fn used_stays_within_bounds() {
        let samples = [(0, 0), (10, 0), (10, 10), (10, 3), (3, 10), (u64::MAX, 1), (1, u64::MAX)];
        for (total, free) in samples {
            let e = VolumeEntry::new("/x", total, free);
            assert!(e.used_bytes <= total, "total={total} free={free}");
            assert_eq!(e.used_bytes, total.saturating_sub(free));
        }
    }
}
