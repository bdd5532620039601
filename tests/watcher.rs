//! ChangeWatcher behaviour with real threads and a scratch mount table.
use crossbeam_channel::{bounded, Receiver};
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use volmon::watcher::TriggerHandle;
use volmon::{ChangeWatcher, Coverage, Trigger, WatchState, WatcherOptions, WatcherSetupError};

struct Fixture {
    tmp:  TempDir,
    opts: WatcherOptions,
}

fn fixture(debounce_ms: u64) -> Fixture {
    let tmp = TempDir::new().unwrap();
    let mount_root = tmp.path().join("Volumes");
    fs::create_dir(&mount_root).unwrap();
    let mount_table = tmp.path().join("mounts");
    fs::write(&mount_table, "/dev/sda1 / ext4 rw 0 0\n").unwrap();
    let opts = WatcherOptions {
        mount_root,
        mount_table,
        debounce: Duration::from_millis(debounce_ms),
    };
    Fixture { tmp, opts }
}

/// A callback that counts invocations and reports each one on a channel.
fn counting() -> (Arc<AtomicUsize>, Receiver<usize>, impl FnMut() + Send + 'static) {
    let calls = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = bounded(64);
    let c = Arc::clone(&calls);
    let cb = move || {
        let n = c.fetch_add(1, Ordering::SeqCst) + 1;
        let _ = tx.try_send(n);
    };
    (calls, rx, cb)
}

fn wait_for_state(watcher: &ChangeWatcher, want: WatchState) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if watcher.state() == want { return true; }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

#[test]
fn manual_request_refreshes_once() {
    let f = fixture(0);
    let (calls, rx, cb) = counting();
    let mut watcher = ChangeWatcher::start(&f.opts, cb).unwrap();
    assert_eq!(watcher.coverage(), Coverage::Full);

    watcher.request_refresh();
    assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
    assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    watcher.stop();
}

#[test]
fn triggers_during_a_refresh_collapse_into_one_follow_up() {
    let f = fixture(0);
    let (started_tx, started_rx) = bounded::<()>(16);
    let (release_tx, release_rx) = bounded::<()>(16);
    let calls = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&calls);

    let mut watcher = ChangeWatcher::start(&f.opts, move || {
        c.fetch_add(1, Ordering::SeqCst);
        let _ = started_tx.send(());
        let _ = release_rx.recv_timeout(Duration::from_secs(5));
    })
    .unwrap();

    watcher.request_refresh();
    started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(watcher.state(), WatchState::Refreshing);

    for _ in 0..10 {
        watcher.request_refresh();
    }
    release_tx.send(()).unwrap();

    // Exactly one follow-up.
    started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    release_tx.send(()).unwrap();
    assert!(started_rx.recv_timeout(Duration::from_millis(500)).is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    assert!(wait_for_state(&watcher, WatchState::Watching));
    watcher.stop();
}

#[test]
fn burst_within_debounce_window_is_one_refresh() {
    let f = fixture(100);
    let (calls, rx, cb) = counting();
    let mut watcher = ChangeWatcher::start(&f.opts, cb).unwrap();

    for _ in 0..5 {
        watcher.request_refresh();
        std::thread::sleep(Duration::from_millis(10));
    }
    assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
    assert!(rx.recv_timeout(Duration::from_millis(400)).is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    watcher.stop();
}

#[test]
fn no_refresh_after_stop() {
    let f = fixture(0);
    let (calls, rx, cb) = counting();
    let mut watcher = ChangeWatcher::start(&f.opts, cb).unwrap();
    let handle: TriggerHandle = watcher.trigger_handle();

    watcher.stop();
    assert_eq!(watcher.state(), WatchState::Stopped);

    handle.send(Trigger::Manual);
    watcher.request_refresh();
    fs::create_dir(f.opts.mount_root.join("Late")).unwrap();
    assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    // Stopping twice is harmless.
    watcher.stop();
    assert_eq!(watcher.state(), WatchState::Stopped);
}

#[test]
fn new_entry_under_mount_root_triggers_refresh() {
    let f = fixture(20);
    let (_calls, rx, cb) = counting();
    let mut watcher = ChangeWatcher::start(&f.opts, cb).unwrap();

    fs::create_dir(f.opts.mount_root.join("USB")).unwrap();
    assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());

    watcher.stop();
}

#[test]
fn missing_mount_root_degrades_to_notifications_only() {
    let f = fixture(0);
    let opts = WatcherOptions { mount_root: f.tmp.path().join("absent"), ..f.opts.clone() };
    let (_calls, rx, cb) = counting();
    let mut watcher = ChangeWatcher::start(&opts, cb).unwrap();
    assert_eq!(watcher.coverage(), Coverage::NotificationOnly);

    watcher.request_refresh();
    assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
    watcher.stop();
}

#[test]
fn missing_mount_table_fails_setup() {
    let f = fixture(0);
    let opts = WatcherOptions { mount_table: f.tmp.path().join("absent"), ..f.opts.clone() };
    let (_calls, _rx, cb) = counting();
    match ChangeWatcher::start(&opts, cb) {
        Err(WatcherSetupError::Subscribe { path, .. }) => assert_eq!(path, opts.mount_table),
        Err(e) => panic!("unexpected error: {e}"),
        Ok(_) => panic!("watcher started without a mount table"),
    }
}

#[test]
fn dropping_the_watcher_stops_it() {
    let f = fixture(0);
    let (calls, rx, cb) = counting();
    let watcher = ChangeWatcher::start(&f.opts, cb).unwrap();
    let handle = watcher.trigger_handle();
    drop(watcher);

    handle.send(Trigger::Manual);
    assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}
