use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub volumes: VolumesConfig,

    #[serde(default)]
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Quiet period after a mount event before the volume list is re-read (ms)
    pub debounce_ms: u64,
    /// Polling interval used when mount notifications are unavailable (seconds)
    pub fallback_poll_sec: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumesConfig {
    /// Directory under which removable and network volumes appear (like macOS "/Volumes").
    /// Defaults to the per-user udisks2 directory when one exists.
    pub mount_root: PathBuf,
    /// Mount table read for enumeration and polled for mount notifications.
    pub mount_table: PathBuf,
    /// Reserved directories; a mount at or below one of these is a system volume.
    /// Checked before the mount root, so none may contain it: `/run` is left
    /// out because udisks2 mounts under `/run/media/$USER`.
    pub system_prefixes: Vec<String>,
    /// Volume names under the mount root that denote recovery partitions.
    pub recovery_names: Vec<String>,
    /// Name substrings treated as network shares when the fs type is unknown.
    pub network_markers: Vec<String>,
    /// Filesystem types that are network-backed.
    pub network_fs_types: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Include the "System Volumes" section in reports.
    pub show_system: bool,
    /// Include the "Network Storage" section in reports.
    pub show_network: bool,
}

// ── Defaults ─────────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            volumes: VolumesConfig::default(),
            display: DisplayConfig::default(),
        }
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self { debounce_ms: 250, fallback_poll_sec: 30 }
    }
}

impl Default for VolumesConfig {
    fn default() -> Self {
        Self {
            mount_root:  default_mount_root(),
            mount_table: PathBuf::from("/proc/self/mounts"),
            system_prefixes: vec![
                "/System".into(), "/Library".into(), "/private".into(), "/dev".into(),
                "/boot".into(), "/sys".into(), "/proc".into(), "/snap".into(),
            ],
            recovery_names:  vec!["Recovery".into()],
            network_markers: vec!["afp".into(), "smb".into(), "nfs".into(), "cifs".into()],
            network_fs_types: vec![
                "nfs".into(), "nfs4".into(), "cifs".into(), "smb3".into(), "smbfs".into(),
                "afpfs".into(), "fuse.sshfs".into(), "9p".into(), "davfs".into(),
                "ceph".into(), "glusterfs".into(), "fuse.glusterfs".into(),
            ],
        }
    }
}

/// `/run/media/$USER` (Fedora, Arch) or `/media/$USER` (Debian, Ubuntu),
/// whichever exists, else `/media`.
fn default_mount_root() -> PathBuf {
    let user = std::env::var("USER").ok();
    pick_mount_root(user.as_deref(), |p| p.is_dir())
}

fn pick_mount_root(user: Option<&str>, is_dir: impl Fn(&Path) -> bool) -> PathBuf {
    if let Some(user) = user.filter(|u| !u.is_empty()) {
        for base in ["/run/media", "/media"] {
            let candidate = Path::new(base).join(user);
            if is_dir(&candidate) {
                return candidate;
            }
        }
    }
    PathBuf::from("/media")
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { show_system: false, show_network: true }
    }
}

// ── Load / Save ───────────────────────────────────────────────────────

impl Config {
    pub fn load() -> Self {
        match try_load() {
            Ok(c)  => c,
            Err(e) => {
                tracing::debug!("using default config: {e:#}");
                // Write defaults on first run (best-effort)
                if let Err(e) = try_write_defaults() {
                    tracing::debug!("could not write default config: {e:#}");
                }
                Config::default()
            }
        }
    }

    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("volmon").join("volmon.toml"))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

fn try_load() -> Result<Config> {
    let path = Config::config_path().ok_or_else(|| anyhow::anyhow!("no config dir"))?;
    let text = fs::read_to_string(path)?;
    Config::from_toml(&text)
}

fn try_write_defaults() -> Result<()> {
    let path = Config::config_path().ok_or_else(|| anyhow::anyhow!("no config dir"))?;
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let text = toml::to_string_pretty(&Config::default())?;
    fs::write(path, format!("# volmon configuration\n# Generated on first run, edit freely\n\n{}", text))?;
    Ok(())
}
