use crate::config::VolumesConfig;
use crate::error::{ProbeEntryError, ProbeError};
use crate::models::volume::VolumeEntry;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Filesystems that never hold user storage.
const SKIP_FS: &[&str] = &[
    "proc", "sysfs", "devpts", "tmpfs", "devtmpfs", "cgroup", "cgroup2",
    "pstore", "efivarfs", "securityfs", "debugfs", "tracefs", "bpf",
    "hugetlbfs", "mqueue", "fusectl", "configfs", "binfmt_misc",
    "overlay", "nsfs", "rpc_pipefs", "autofs", "squashfs", "ramfs",
];

/// Source of the current volume list.
pub trait VolumeProbe: Send {
    /// Enumerate mounted volumes in mount-table order. Volumes whose capacity
    /// cannot be read are left out; only an unreadable mount table is an error.
    fn list_volumes(&self) -> Result<Vec<VolumeEntry>, ProbeError>;
}

impl<F> VolumeProbe for F
where
    F: Fn() -> Result<Vec<VolumeEntry>, ProbeError> + Send,
{
    fn list_volumes(&self) -> Result<Vec<VolumeEntry>, ProbeError> {
        self()
    }
}

/// One line of the mount table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountRecord {
    pub device:  String,
    pub mount:   String,
    pub fs_type: String,
}

impl MountRecord {
    /// False for pseudo filesystems and loop-mounted snaps.
    pub fn is_storage(&self) -> bool {
        !SKIP_FS.contains(&self.fs_type.as_str()) && !self.device.starts_with("/dev/loop")
    }
}

/// Probe backed by a `/proc/mounts`-format table and `statvfs`.
#[derive(Debug, Clone)]
pub struct MountTableProbe {
    mount_table: PathBuf,
}

impl MountTableProbe {
    pub fn new(mount_table: impl Into<PathBuf>) -> Self {
        Self { mount_table: mount_table.into() }
    }

    pub fn from_config(cfg: &VolumesConfig) -> Self {
        Self::new(cfg.mount_table.clone())
    }

    pub fn mount_table(&self) -> &Path {
        &self.mount_table
    }
}

impl VolumeProbe for MountTableProbe {
    fn list_volumes(&self) -> Result<Vec<VolumeEntry>, ProbeError> {
        let text = std::fs::read_to_string(&self.mount_table).map_err(|source| {
            ProbeError::MountTable { path: self.mount_table.clone(), source }
        })?;

        let mut out = Vec::new();
        for record in parse_mount_table(&text) {
            if !record.is_storage() { continue; }
            match statvfs_for(&record) {
                Ok(entry) => out.push(entry),
                Err(e)    => warn!("skipping volume: {e}"),
            }
        }
        debug!("probed {} volume(s) from {}", out.len(), self.mount_table.display());
        Ok(out)
    }
}

/// Parse `/proc/mounts` text: "device mountpoint fstype options dump pass".
pub fn parse_mount_table(text: &str) -> Vec<MountRecord> {
    let mut v = Vec::new();
    for line in text.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 3 { continue; }
        v.push(MountRecord {
            device:  unescape(fields[0]),
            mount:   unescape(fields[1]),
            fs_type: fields[2].to_string(),
        });
    }
    v
}

/// Decode the kernel's octal escapes ("\040" for space, "\011" tab, ...).
fn unescape(field: &str) -> String {
    if !field.contains('\\') {
        return field.to_string();
    }
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 4 <= bytes.len() {
            if let Some(b) = octal_byte(&bytes[i + 1..i + 4]) {
                out.push(b);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn octal_byte(digits: &[u8]) -> Option<u8> {
    let mut value: u32 = 0;
    for &d in digits {
        if !(b'0'..=b'7').contains(&d) { return None; }
        value = value * 8 + u32::from(d - b'0');
    }
    u8::try_from(value).ok()
}

fn statvfs_for(record: &MountRecord) -> Result<VolumeEntry, ProbeEntryError> {
    use nix::sys::statvfs::statvfs;
    let stat = statvfs(record.mount.as_str()).map_err(|source| ProbeEntryError {
        mount: record.mount.clone(),
        source,
    })?;

    let frsize = stat.fragment_size() as u64;
    let total_bytes = (stat.blocks() as u64).saturating_mul(frsize);
    let avail_bytes = (stat.blocks_available() as u64).saturating_mul(frsize);

    Ok(VolumeEntry::new(record.mount.clone(), total_bytes, avail_bytes)
        .with_mount_info(Some(record.device.clone()), Some(record.fs_type.clone())))
}
