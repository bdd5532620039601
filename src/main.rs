use anyhow::Result;
use clap::Parser;
use crossbeam_channel::{never, select, unbounded, Receiver};
use parking_lot::Mutex;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use volmon::config::{Config, DisplayConfig};
use volmon::error::BuildError;
use volmon::util::report;
use volmon::{
    ChangeWatcher, Classifier, MountTableProbe, RefreshPipeline, Snapshot, SnapshotBuilder,
    SnapshotSink, WatcherOptions,
};

#[derive(Parser, Debug)]
#[command(name = "volmon", about = "Mounted volume monitor", version)]
struct Cli {
    /// Print a single snapshot and exit
    #[arg(long)]
    once: bool,

    /// Emit JSON instead of a text report
    #[arg(long)]
    json: bool,

    /// Also show system volumes
    #[arg(short, long)]
    all: bool,

    /// Hide the network storage section
    #[arg(long)]
    no_network: bool,

    /// Directory under which removable and network volumes are mounted
    #[arg(long)]
    mount_root: Option<PathBuf>,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long)]
    verbose: bool,

    /// Print config file path and current values, then exit
    #[arg(long)]
    print_config: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut cfg = Config::load();
    if let Some(root) = cli.mount_root { cfg.volumes.mount_root = root; }
    if cli.all        { cfg.display.show_system = true; }
    if cli.no_network { cfg.display.show_network = false; }

    if cli.print_config {
        return run_print_config(&cfg);
    }
    if cli.once {
        return run_once(&cfg, cli.json);
    }
    run_watch(&cfg, cli.json)
}

fn init_logging(verbose: bool) {
    let default = if verbose { "volmon=debug" } else { "volmon=info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn new_builder(cfg: &Config) -> SnapshotBuilder<MountTableProbe> {
    SnapshotBuilder::new(
        MountTableProbe::from_config(&cfg.volumes),
        Classifier::from_config(&cfg.volumes),
    )
}

fn render(snapshot: &Snapshot, display: &DisplayConfig, json: bool, pretty: bool) -> Result<String> {
    let view = snapshot.view();
    if !json {
        return Ok(report::generate(&view, display));
    }
    let mut text = if pretty { serde_json::to_string_pretty(&view)? } else { serde_json::to_string(&view)? };
    text.push('\n');
    Ok(text)
}

fn run_once(cfg: &Config, json: bool) -> Result<()> {
    let snapshot = new_builder(cfg).build()?;
    print!("{}", render(&snapshot, &cfg.display, json, true)?);
    Ok(())
}

/// Prints every snapshot it receives to stdout.
struct Printer {
    display: DisplayConfig,
    json:    bool,
}

impl SnapshotSink for Printer {
    fn accept(&mut self, snapshot: Snapshot) {
        match render(&snapshot, &self.display, self.json, false) {
            Ok(text) => {
                let mut out = io::stdout().lock();
                let _ = out.write_all(text.as_bytes());
                let _ = out.flush();
            }
            Err(e) => warn!("cannot render snapshot #{}: {e:#}", snapshot.generation()),
        }
    }

    fn unavailable(&mut self, error: &BuildError) {
        print!("{}", report::unavailable(&error.to_string()));
        let _ = io::stdout().flush();
    }
}

fn run_watch(cfg: &Config, json: bool) -> Result<()> {
    let printer = Printer { display: cfg.display.clone(), json };
    let pipeline = Arc::new(Mutex::new(RefreshPipeline::new(new_builder(cfg), printer)));
    // Each line on stdin is a manual refresh request.
    let mut requests = stdin_requests()?;

    // A failed first probe is reported by the sink; the next trigger retries.
    let _ = pipeline.lock().refresh();

    let refresher = Arc::clone(&pipeline);
    let watcher = ChangeWatcher::start(&WatcherOptions::from_config(cfg), move || {
        let _ = refresher.lock().refresh();
    });

    match watcher {
        Ok(watcher) => {
            info!("press Enter to refresh manually");
            for () in requests.iter() {
                watcher.request_refresh();
            }
            loop { std::thread::park(); }
        }
        Err(e) => {
            let every = Duration::from_secs(cfg.general.fallback_poll_sec.max(1));
            warn!("{e}; polling every {}s instead (press Enter to refresh now)", every.as_secs());
            loop {
                match next_poll(&requests, every) {
                    Wake::InputClosed => {
                        requests = never();
                        continue;
                    }
                    Wake::Manual | Wake::Interval => {}
                }
                let _ = pipeline.lock().refresh();
            }
        }
    }
}

/// Forward stdin lines as refresh requests. The channel disconnects at EOF.
fn stdin_requests() -> Result<Receiver<()>> {
    let (tx, rx) = unbounded();
    std::thread::Builder::new()
        .name("volmon-stdin".to_owned())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                if line.is_err() || tx.send(()).is_err() { break; }
            }
        })?;
    Ok(rx)
}

/// Why the polling fallback woke up.
#[derive(Debug, PartialEq, Eq)]
enum Wake {
    Interval,
    Manual,
    InputClosed,
}

fn next_poll(requests: &Receiver<()>, every: Duration) -> Wake {
    select! {
        recv(requests) -> msg => if msg.is_ok() { Wake::Manual } else { Wake::InputClosed },
        default(every) => Wake::Interval,
    }
}

fn run_print_config(cfg: &Config) -> Result<()> {
    let path = Config::config_path()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| "(unknown)".to_string());
    println!("Config: {}", path);
    println!();
    println!("[general]");
    println!("  debounce_ms       = {}", cfg.general.debounce_ms);
    println!("  fallback_poll_sec = {}", cfg.general.fallback_poll_sec);
    println!();
    println!("[volumes]");
    println!("  mount_root       = {}", cfg.volumes.mount_root.display());
    println!("  mount_table      = {}", cfg.volumes.mount_table.display());
    println!("  system_prefixes  = {:?}", cfg.volumes.system_prefixes);
    println!("  recovery_names   = {:?}", cfg.volumes.recovery_names);
    println!("  network_markers  = {:?}", cfg.volumes.network_markers);
    println!("  network_fs_types = {:?}", cfg.volumes.network_fs_types);
    println!();
    println!("[display]");
    println!("  show_system  = {}", cfg.display.show_system);
    println!("  show_network = {}", cfg.display.show_network);
    Ok(())
}
