//! Change watcher: turns mount/unmount activity into debounced refreshes.
//!
//! Two sources feed a single dispatcher thread:
//!
//! - a change signal on the mount root directory (best-effort; the watcher
//!   degrades to notification-only coverage when it cannot be installed), and
//! - a mount-table subscription that fires when filesystems come and go.
//!
//! The refresh callback only ever runs on the dispatcher thread, one call at
//! a time. Triggers that arrive during a refresh are folded into a single
//! follow-up (see [`Coalescer`]). After [`ChangeWatcher::stop`] returns the
//! callback is never invoked again.

mod coalesce;
mod sources;

pub use coalesce::Coalescer;

use crate::config::Config;
use crate::error::WatcherSetupError;
use crossbeam_channel::{bounded, select, Receiver, Sender};
use parking_lot::Mutex;
use sources::WatchSources;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Trigger queue depth. A full queue already guarantees a pending refresh,
/// so overflowing triggers are dropped.
const TRIGGER_QUEUE: usize = 64;

/// Why a refresh was requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// Something was created, removed or changed directly under the mount root.
    MountRootChanged,
    /// A filesystem was mounted at this path.
    Mounted(String),
    /// A filesystem was unmounted from this path.
    Unmounted(String),
    /// The mount table changed without a mount point to name.
    MountTableChanged,
    /// Explicit request, e.g. a retry after a failed probe.
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Idle,
    Watching,
    Refreshing,
    Stopped,
}

/// Which trigger sources are live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coverage {
    /// Mount-root signal and mount notifications.
    Full,
    /// The mount root could not be watched.
    NotificationOnly,
}

#[derive(Debug, Clone)]
pub struct WatcherOptions {
    pub mount_root:  PathBuf,
    pub mount_table: PathBuf,
    pub debounce:    Duration,
}

impl WatcherOptions {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            mount_root:  cfg.volumes.mount_root.clone(),
            mount_table: cfg.volumes.mount_table.clone(),
            debounce:    Duration::from_millis(cfg.general.debounce_ms),
        }
    }
}

/// Cloneable handle for injecting triggers from other threads.
#[derive(Debug, Clone)]
pub struct TriggerHandle {
    tx: Sender<Trigger>,
}

impl TriggerHandle {
    /// Queue a trigger. Ignored once the watcher has stopped.
    pub fn send(&self, trigger: Trigger) {
        let _ = self.tx.try_send(trigger);
    }
}

pub struct ChangeWatcher {
    tx:         Sender<Trigger>,
    stop_tx:    Sender<()>,
    stopping:   Arc<AtomicBool>,
    state:      Arc<Mutex<WatchState>>,
    coverage:   Coverage,
    sources:    Option<WatchSources>,
    dispatcher: Option<JoinHandle<()>>,
}

impl ChangeWatcher {
    /// Install both trigger sources and start the dispatcher.
    ///
    /// Fails only when the mount notification cannot be subscribed; in that
    /// case the mount-root handle has already been released.
    pub fn start<F>(opts: &WatcherOptions, on_refresh: F) -> Result<Self, WatcherSetupError>
    where
        F: FnMut() + Send + 'static,
    {
        let state = Arc::new(Mutex::new(WatchState::Idle));
        let (tx, rx) = bounded(TRIGGER_QUEUE);
        let (stop_tx, stop_rx) = bounded(1);

        let sources = WatchSources::open(&opts.mount_root, &opts.mount_table, tx.clone())?;
        let coverage = if sources.watches_mount_root() { Coverage::Full } else { Coverage::NotificationOnly };

        let stopping = Arc::new(AtomicBool::new(false));
        let dispatcher = Dispatcher {
            rx,
            stop_rx,
            debounce: opts.debounce,
            stopping: Arc::clone(&stopping),
            state:    Arc::clone(&state),
        };
        *state.lock() = WatchState::Watching;
        let handle = std::thread::Builder::new()
            .name("volmon-refresh".to_owned())
            .spawn(move || dispatcher.run(on_refresh))
            .map_err(WatcherSetupError::Spawn)?;

        info!("volume watcher started ({:?})", coverage);
        Ok(Self {
            tx,
            stop_tx,
            stopping,
            state,
            coverage,
            sources: Some(sources),
            dispatcher: Some(handle),
        })
    }

    pub fn state(&self) -> WatchState {
        *self.state.lock()
    }

    pub fn coverage(&self) -> Coverage {
        self.coverage
    }

    /// Ask for a refresh outside of any OS event.
    pub fn request_refresh(&self) {
        let _ = self.tx.try_send(Trigger::Manual);
    }

    pub fn trigger_handle(&self) -> TriggerHandle {
        TriggerHandle { tx: self.tx.clone() }
    }

    /// Unsubscribe, release the mount-root handle and wait for the
    /// dispatcher. A refresh already running is allowed to finish.
    ///
    /// Must not be called from inside the refresh callback.
    pub fn stop(&mut self) {
        if self.stopping.swap(true, Ordering::AcqRel) {
            return;
        }
        drop(self.sources.take());
        let _ = self.stop_tx.try_send(());
        if let Some(handle) = self.dispatcher.take() {
            if handle.join().is_err() {
                warn!("refresh thread panicked");
            }
        }
        *self.state.lock() = WatchState::Stopped;
        info!("volume watcher stopped");
    }
}

impl Drop for ChangeWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

// ── Dispatcher ────────────────────────────────────────────────────────

struct Dispatcher {
    rx:       Receiver<Trigger>,
    stop_rx:  Receiver<()>,
    debounce: Duration,
    stopping: Arc<AtomicBool>,
    state:    Arc<Mutex<WatchState>>,
}

impl Dispatcher {
    fn run<F: FnMut()>(self, mut on_refresh: F) {
        let mut coalescer = Coalescer::default();

        'watch: loop {
            let trigger = select! {
                recv(self.stop_rx) -> _ => break 'watch,
                recv(self.rx) -> msg => match msg {
                    Ok(t)  => t,
                    Err(_) => break 'watch,
                },
            };
            debug!("trigger: {trigger:?}");
            if !self.settle() {
                break 'watch;
            }
            let mut run = coalescer.trigger();
            while run {
                if self.stopping.load(Ordering::Acquire) {
                    break 'watch;
                }
                *self.state.lock() = WatchState::Refreshing;
                on_refresh();

                for t in self.rx.try_iter() {
                    debug!("trigger during refresh: {t:?}");
                    let started = coalescer.trigger();
                    debug_assert!(!started, "a refresh is still in flight");
                }
                run = coalescer.finish();
            }
            *self.state.lock() = WatchState::Watching;
        }
        debug!("dispatcher exiting");
    }

    /// Absorb further triggers until the debounce window has passed.
    /// Returns false if a stop was requested meanwhile.
    fn settle(&self) -> bool {
        let deadline = Instant::now() + self.debounce;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            select! {
                recv(self.stop_rx) -> _ => return false,
                recv(self.rx) -> msg => {
                    if msg.is_err() { return false; }
                }
                default(remaining) => return true,
            }
        }
    }
}
