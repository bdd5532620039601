//! Mount-path classification.
//!
//! Categories are assigned by walking [`RULES`] in order; the first matching
//! rule wins and the last rule matches everything, so every path receives
//! exactly one category.

use crate::config::VolumesConfig;
use crate::models::volume::{Category, IconTag, VolumeEntry};

/// Predicate half of a classification rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Matcher {
    /// The filesystem root itself.
    Root,
    /// At or below a reserved system directory, or a recovery volume.
    SystemPath,
    /// Under the mount root and backed by (or named like) a network share.
    NetworkShare,
    /// Anything else under the mount root.
    UnderMountRoot,
    /// Fallback.
    Any,
}

pub const RULES: &[(Matcher, Category)] = &[
    (Matcher::Root,           Category::Internal),
    (Matcher::SystemPath,     Category::System),
    (Matcher::NetworkShare,   Category::Network),
    (Matcher::UnderMountRoot, Category::External),
    (Matcher::Any,            Category::System),
];

/// Icons for system volumes, checked in order before the recovery check.
const SYSTEM_ICONS: &[(&str, IconTag)] = &[
    ("/System",  IconTag::Gearshape),
    ("/Library", IconTag::Library),
    ("/private", IconTag::Private),
];

#[derive(Debug, Clone)]
pub struct Classifier {
    mount_root:       String,
    system_prefixes:  Vec<String>,
    recovery_names:   Vec<String>,
    network_markers:  Vec<String>,   // lowercased
    network_fs_types: Vec<String>,   // lowercased
}

impl Classifier {
    pub fn from_config(cfg: &VolumesConfig) -> Self {
        let mount_root = cfg.mount_root.to_string_lossy();
        Self {
            mount_root:       trim_slash(&mount_root).to_string(),
            system_prefixes:  cfg.system_prefixes.iter().map(|p| trim_slash(p).to_string()).collect(),
            recovery_names:   cfg.recovery_names.clone(),
            network_markers:  cfg.network_markers.iter().map(|m| m.to_lowercase()).collect(),
            network_fs_types: cfg.network_fs_types.iter().map(|t| t.to_lowercase()).collect(),
        }
    }

    /// Classify a bare mount path. Network shares are recognised by name only.
    pub fn classify(&self, path: &str) -> Category {
        self.classify_mount(path, None)
    }

    /// Classify a probed volume, using its filesystem type when known.
    pub fn classify_entry(&self, entry: &VolumeEntry) -> Category {
        self.classify_mount(&entry.path, entry.fs_type.as_deref())
    }

    pub fn classify_mount(&self, path: &str, fs_type: Option<&str>) -> Category {
        RULES
            .iter()
            .find(|(matcher, _)| self.matches(*matcher, path, fs_type))
            .map(|(_, category)| *category)
            .unwrap_or(Category::System)
    }

    pub fn matches(&self, matcher: Matcher, path: &str, fs_type: Option<&str>) -> bool {
        match matcher {
            Matcher::Root           => path == "/",
            Matcher::SystemPath     => self.is_system_path(path),
            Matcher::NetworkShare   => self.volume_name(path)
                .is_some_and(|name| self.is_network(name, fs_type)),
            Matcher::UnderMountRoot => self.volume_name(path).is_some(),
            Matcher::Any            => true,
        }
    }

    pub fn icon_hint(&self, path: &str, category: Category) -> IconTag {
        match category {
            Category::Internal => IconTag::InternalDrive,
            Category::External => IconTag::ExternalDrive,
            Category::Network  => IconTag::Network,
            Category::System   => SYSTEM_ICONS
                .iter()
                .find(|(prefix, _)| has_path_prefix(path, prefix))
                .map(|(_, icon)| *icon)
                .unwrap_or_else(|| {
                    if self.recovery_names.iter().any(|r| path.contains(r.as_str())) {
                        IconTag::Recovery
                    } else {
                        IconTag::OpticalDisc
                    }
                }),
        }
    }

    pub fn is_under_mount_root(&self, path: &str) -> bool {
        self.volume_name(path).is_some()
    }

    /// The part of `path` below the mount root, e.g. "Backup" for
    /// "/Volumes/Backup". `None` for paths outside the mount root.
    pub fn volume_name<'a>(&self, path: &'a str) -> Option<&'a str> {
        let rest = path.strip_prefix(self.mount_root.as_str())?.strip_prefix('/')?;
        if rest.is_empty() { None } else { Some(rest) }
    }

    /// Name shown to the user: the mount-root prefix is stripped, other paths
    /// are kept whole.
    pub fn display_name(&self, path: &str) -> String {
        self.volume_name(path).unwrap_or(path).to_string()
    }

    fn is_system_path(&self, path: &str) -> bool {
        if self.system_prefixes.iter().any(|p| has_path_prefix(path, p)) {
            return true;
        }
        self.volume_name(path)
            .is_some_and(|name| self.recovery_names.iter().any(|r| name.starts_with(r.as_str())))
    }

    // Substring markers are a heuristic: a volume named "smbfriends" reads as
    // a share. The fs type, when the probe has one, overrides them.
    fn is_network(&self, name: &str, fs_type: Option<&str>) -> bool {
        match fs_type.filter(|t| !t.is_empty()) {
            Some(t) => {
                let t = t.to_lowercase();
                self.network_fs_types.iter().any(|n| *n == t)
            }
            None => {
                let name = name.to_lowercase();
                self.network_markers.iter().any(|m| name.contains(m.as_str()))
            }
        }
    }
}

/// `prefix` matches whole path components: "/dev" covers "/dev" and
/// "/dev/shm" but not "/devices".
fn has_path_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || prefix.is_empty(),
        None       => false,
    }
}

fn trim_slash(p: &str) -> &str {
    p.trim_end_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn classifier() -> Classifier {
        Classifier::from_config(&VolumesConfig {
            mount_root: PathBuf::from("/Volumes"),
            ..VolumesConfig::default()
        })
    }

    #[test]
    fn rules_classify_by_first_match() {
        let c = classifier();
        let cases: &[(&str, Category)] = &[
            ("/",                         Category::Internal),
            ("/System/Volumes/Data",      Category::System),
            ("/System",                   Category::System),
            ("/Library/Caches",           Category::System),
            ("/private/var/vm",           Category::System),
            ("/dev",                      Category::System),
            ("/boot/efi",                 Category::System),
            ("/Volumes/Recovery",         Category::System),
            ("/Volumes/Recovery HD",      Category::System),
            ("/Volumes/NAS-smb",          Category::Network),
            ("/Volumes/afp_share",        Category::Network),
            ("/Volumes/home-nfs",         Category::Network),
            ("/Volumes/Backup",           Category::External),
            ("/Volumes/My Passport",      Category::External),
            ("/Volumes",                  Category::System),
            ("/home",                     Category::System),
            ("/mnt/data",                 Category::System),
            ("",                          Category::System),
            ("relative/path",             Category::System),
        ];
        for (path, expected) in cases {
            assert_eq!(c.classify(path), *expected, "path {path:?}");
        }
    }

    #[test]
    fn each_rule_matches_its_own_example() {
        let c = classifier();
        assert!(c.matches(Matcher::Root, "/", None));
        assert!(!c.matches(Matcher::Root, "/Volumes/Root", None));
        assert!(c.matches(Matcher::SystemPath, "/Library", None));
        assert!(!c.matches(Matcher::SystemPath, "/Libraryish", None));
        assert!(c.matches(Matcher::NetworkShare, "/Volumes/share-SMB", None));
        assert!(!c.matches(Matcher::NetworkShare, "/srv/smb", None));
        assert!(c.matches(Matcher::UnderMountRoot, "/Volumes/x", None));
        assert!(!c.matches(Matcher::UnderMountRoot, "/Volumes", None));
        assert!(!c.matches(Matcher::UnderMountRoot, "/VolumesX/y", None));
        assert!(c.matches(Matcher::Any, "anything", None));
    }

    #[test]
    fn root_is_always_internal() {
        let c = Classifier::from_config(&VolumesConfig {
            mount_root:      PathBuf::from("/"),
            system_prefixes: vec!["/".into()],
            ..VolumesConfig::default()
        });
        assert_eq!(c.classify("/"), Category::Internal);
        assert_eq!(c.classify_mount("/", Some("nfs4")), Category::Internal);
        assert_eq!(classifier().classify_mount("/", Some("cifs")), Category::Internal);
    }

    #[test]
    fn network_marker_beats_external() {
        let c = classifier();
        for name in ["smb", "NAS-smb", "AFP-share", "nfsroot", "old_cifs_box"] {
            let path = format!("/Volumes/{name}");
            assert_eq!(c.classify(&path), Category::Network, "path {path:?}");
        }
    }

    #[test]
    fn fs_type_overrides_name_heuristic() {
        let c = classifier();
        assert_eq!(c.classify_mount("/Volumes/smbfriends", Some("exfat")), Category::External);
        assert_eq!(c.classify_mount("/Volumes/Photos", Some("nfs4")), Category::Network);
        assert_eq!(c.classify_mount("/Volumes/Photos", Some("CIFS")), Category::Network);
        // An empty type is treated as unknown.
        assert_eq!(c.classify_mount("/Volumes/NAS-smb", Some("")), Category::Network);
        // Network mounts outside the mount root are not shares of ours.
        assert_eq!(c.classify_mount("/mnt/nas", Some("nfs")), Category::System);
    }

    #[test]
    fn classification_is_deterministic() {
        let c = classifier();
        for path in ["/", "/Volumes/NAS-smb", "/Volumes/Backup", "/opt", "/Volumes/Recovery"] {
            let first = c.classify(path);
            for _ in 0..10 {
                assert_eq!(c.classify(path), first);
            }
        }
    }

    #[test]
    fn icon_hints_follow_system_prefixes() {
        let c = classifier();
        let cases: &[(&str, IconTag)] = &[
            ("/System/Volumes/VM",  IconTag::Gearshape),
            ("/Library/Developer",  IconTag::Library),
            ("/private/var",        IconTag::Private),
            ("/Volumes/Recovery",   IconTag::Recovery),
            ("/dev",                IconTag::OpticalDisc),
            ("/opt",                IconTag::OpticalDisc),
        ];
        for (path, expected) in cases {
            assert_eq!(c.icon_hint(path, Category::System), *expected, "path {path:?}");
        }
        assert_eq!(c.icon_hint("/", Category::Internal), IconTag::InternalDrive);
        assert_eq!(c.icon_hint("/Volumes/x", Category::External), IconTag::ExternalDrive);
        assert_eq!(c.icon_hint("/Volumes/x-smb", Category::Network), IconTag::Network);
    }

    #[test]
    fn display_name_strips_mount_root() {
        let c = classifier();
        assert_eq!(c.display_name("/Volumes/Backup"), "Backup");
        assert_eq!(c.display_name("/Volumes/a/b"), "a/b");
        assert_eq!(c.display_name("/"), "/");
        assert_eq!(c.display_name("/boot/efi"), "/boot/efi");
    }

    #[test]
    fn trailing_slash_in_config_is_ignored() {
        let c = Classifier::from_config(&VolumesConfig {
            mount_root: PathBuf::from("/media/"),
            ..VolumesConfig::default()
        });
        assert_eq!(c.classify("/media/usb"), Category::External);
        assert_eq!(c.volume_name("/media/usb"), Some("usb"));
    }

    #[test]
    fn udisks_run_media_root_is_external() {
        let c = Classifier::from_config(&VolumesConfig {
            mount_root: PathBuf::from("/run/media/alice"),
            ..VolumesConfig::default()
        });
        assert_eq!(c.classify("/run/media/alice/USB STICK"), Category::External);
        assert_eq!(c.display_name("/run/media/alice/USB STICK"), "USB STICK");
        // Other /run mounts are not under the mount root and stay System.
        assert_eq!(c.classify("/run/user/1000/doc"), Category::System);
    }
}
