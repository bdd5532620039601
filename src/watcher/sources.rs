//! The two OS-level trigger sources.
//!
//! Both only enqueue [`Trigger`]s; refreshes happen on the dispatcher thread.

use super::Trigger;
use crate::collectors::mounts::{parse_mount_table, MountRecord};
use crate::error::WatcherSetupError;
use crossbeam_channel::Sender;
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::os::fd::AsFd;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, warn};

/// Upper bound on how long unsubscribing waits for the poll thread.
const POLL_INTERVAL_MS: u16 = 200;

/// Both sources, owned together. Dropping this unsubscribes from mount
/// notifications first and then releases the mount-root handle.
pub(crate) struct WatchSources {
    subscription: MountSubscription,
    root_signal:  Option<MountRootSignal>,
}

impl WatchSources {
    pub(crate) fn open(
        mount_root: &Path,
        mount_table: &Path,
        tx: Sender<Trigger>,
    ) -> Result<Self, WatcherSetupError> {
        let root_signal = match MountRootSignal::open(mount_root, tx.clone()) {
            Ok(signal) => Some(signal),
            Err(e) => {
                warn!("{e}; falling back to mount notifications only");
                None
            }
        };

        let subscription = match MountSubscription::open(mount_table, tx) {
            Ok(sub) => sub,
            Err(e) => {
                drop(root_signal);
                return Err(e);
            }
        };

        Ok(Self { subscription, root_signal })
    }

    pub(crate) fn watches_mount_root(&self) -> bool {
        self.root_signal.is_some()
    }
}

impl Drop for WatchSources {
    fn drop(&mut self) {
        self.subscription.unsubscribe();
        self.root_signal.take();
    }
}

// ── Mount-root change signal ──────────────────────────────────────────

/// inotify (or the platform equivalent) on the mount root directory.
struct MountRootSignal {
    _watcher: RecommendedWatcher,
}

impl MountRootSignal {
    fn open(path: &Path, tx: Sender<Trigger>) -> Result<Self, WatcherSetupError> {
        let setup_err = |source| WatcherSetupError::MountRoot { path: path.to_path_buf(), source };

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) if is_write_class(&event.kind) => {
                let _ = tx.try_send(Trigger::MountRootChanged);
            }
            Ok(_)  => {}
            Err(e) => warn!("mount root watcher error: {e}"),
        })
        .map_err(setup_err)?;

        // Only direct children matter: each one is a mount point.
        watcher.watch(path, RecursiveMode::NonRecursive).map_err(setup_err)?;
        debug!("watching {} for mount changes", path.display());
        Ok(Self { _watcher: watcher })
    }
}

fn is_write_class(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Create(_) | EventKind::Remove(_) | EventKind::Modify(_))
}

// ── Mount-table subscription ──────────────────────────────────────────

/// The kernel flags an open mount table with POLLPRI whenever a filesystem
/// is mounted or unmounted.
struct MountSubscription {
    stop:   Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl MountSubscription {
    fn open(table: &Path, tx: Sender<Trigger>) -> Result<Self, WatcherSetupError> {
        let subscribe_err = |source| WatcherSetupError::Subscribe { path: table.to_path_buf(), source };

        let mut file = File::open(table).map_err(subscribe_err)?;
        let known = read_mount_points(&mut file).map_err(subscribe_err)?;

        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let table_path = table.to_path_buf();
        let thread = std::thread::Builder::new()
            .name("volmon-mounts".to_owned())
            .spawn(move || poll_mount_table(file, table_path, known, tx, thread_stop))
            .map_err(WatcherSetupError::Spawn)?;

        debug!("subscribed to mount notifications via {}", table.display());
        Ok(Self { stop, thread: Some(thread) })
    }

    /// Blocks until the poll thread has exited.
    fn unsubscribe(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("mount notification thread panicked");
            }
        }
    }
}

impl Drop for MountSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

fn poll_mount_table(
    mut file: File,
    path: PathBuf,
    mut known: Vec<MountRecord>,
    tx: Sender<Trigger>,
    stop: Arc<AtomicBool>,
) {
    while !stop.load(Ordering::Acquire) {
        let changed = {
            let mut fds = [PollFd::new(file.as_fd(), PollFlags::POLLPRI)];
            match poll(&mut fds, PollTimeout::from(POLL_INTERVAL_MS)) {
                Ok(0) | Err(Errno::EINTR) => false,
                Ok(_) => {
                    let flagged = fds[0]
                        .revents()
                        .is_some_and(|r| r.intersects(PollFlags::POLLPRI | PollFlags::POLLERR));
                    // Plain files poll as always-readable and never raise POLLPRI.
                    if !flagged {
                        std::thread::sleep(Duration::from_millis(POLL_INTERVAL_MS.into()));
                    }
                    flagged
                }
                Err(e) => {
                    warn!("polling {} failed, mount notifications stopped: {e}", path.display());
                    return;
                }
            }
        };
        if !changed { continue; }

        // Reading the table to the end re-arms POLLPRI.
        let current = match read_mount_points(&mut file) {
            Ok(c)  => c,
            Err(e) => {
                warn!("re-reading {} failed: {e}", path.display());
                continue;
            }
        };
        for trigger in mount_table_triggers(&known, &current) {
            debug!("mount table change: {trigger:?}");
            let _ = tx.try_send(trigger);
        }
        known = current;
    }
}

/// Storage entries of the mount table, in table order.
fn read_mount_points(file: &mut File) -> std::io::Result<Vec<MountRecord>> {
    file.seek(SeekFrom::Start(0))?;
    let mut text = String::new();
    file.read_to_string(&mut text)?;
    Ok(parse_mount_table(&text)
        .into_iter()
        .filter(|r| r.is_storage())
        .collect())
}

/// Triggers for a change between two reads of the mount table. Any change to
/// the storage entries yields at least one trigger.
pub(crate) fn mount_table_triggers(known: &[MountRecord], current: &[MountRecord]) -> Vec<Trigger> {
    if known == current {
        return Vec::new();
    }
    let mut triggers = diff_mount_points(known, current);
    if triggers.is_empty() {
        // Same records, different order or multiplicity (e.g. one device
        // mounted twice at the same path).
        triggers.push(Trigger::MountTableChanged);
    }
    triggers
}

/// Records that appeared label their path `Mounted`; a path whose records
/// only vanished is `Unmounted`. A device swap at one path is a `Mounted`.
fn diff_mount_points(known: &[MountRecord], current: &[MountRecord]) -> Vec<Trigger> {
    let mounted: BTreeSet<&str> = current
        .iter()
        .filter(|r| !known.contains(r))
        .map(|r| r.mount.as_str())
        .collect();
    let unmounted: BTreeSet<&str> = known
        .iter()
        .filter(|r| !current.contains(r) && !mounted.contains(r.mount.as_str()))
        .map(|r| r.mount.as_str())
        .collect();

    let mounted = mounted.into_iter().map(|m| Trigger::Mounted(m.to_owned()));
    let unmounted = unmounted.into_iter().map(|m| Trigger::Unmounted(m.to_owned()));
    mounted.chain(unmounted).collect()
}
