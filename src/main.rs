//! # oink-sniffer
//!
//! Passive WiFi sniffer for Linux and macOS. Hops across the 2.4 GHz
//! channels, keeps a table of access points from their beacons, and records
//! every WPA EAPOL-Key message it sees in a text file that offline cracking
//! tools can read. A target BSSID can be locked and, with `--deauth`,
//! pushed with deauthentication frames so its clients reconnect. Enabling
//! deauth in the config file alone only permits it.
//!
//! ## Requirements
//!
//! Run as **root**. The adapter must support monitor mode (and injection
//! for `--deauth`). On Linux `iw` and `ip` are used; on macOS `ifconfig`.
//!
//! ## Examples
//!
//! ```text
//! sudo oink-sniffer
//! sudo oink-sniffer --interface wlan1 --config oink.toml
//! sudo oink-sniffer --target AA:BB:CC:DD:EE:FF --deauth -o capture.txt
//! ```

use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use oink_sniffer::capture::{self, LoopOptions};
use oink_sniffer::{platform, radio, Config, ConsoleSink, MacAddr, PcapRadio, Result, ScanSession};

#[derive(Parser)]
#[command(name = "oink-sniffer")]
#[command(version, about = "WiFi beacon and WPA handshake sniffer with channel hopping")]
struct Cli {
    /// Network interface to use. Auto-detected if omitted.
    #[arg(short, long)]
    interface: Option<String>,

    /// TOML config file. Flags below override its values.
    #[arg(short = 'C', long)]
    config: Option<PathBuf>,

    /// Channel to start on (1-14).
    #[arg(short, long)]
    channel: Option<u8>,

    /// Stay on the start channel instead of hopping.
    #[arg(long)]
    no_hop: bool,

    /// Channel hop interval in milliseconds.
    #[arg(long)]
    hop_interval: Option<u64>,

    /// Stop discovering new networks after this many milliseconds.
    #[arg(long)]
    scan_duration: Option<u64>,

    /// Maximum number of tracked networks.
    #[arg(long)]
    max_networks: Option<usize>,

    /// Lock onto this BSSID once it is seen beaconing.
    #[arg(short, long)]
    target: Option<MacAddr>,

    /// Allow deauthentication and start it once the target is locked.
    #[arg(long)]
    deauth: bool,

    /// Station to deauthenticate (broadcast if omitted).
    #[arg(long)]
    deauth_dest: Option<String>,

    /// Handshake output file (appended to).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Seconds between summaries and handshake flushes.
    #[arg(short, long, default_value_t = 5)]
    summary_secs: u64,

    /// List capture interfaces and exit.
    #[arg(long)]
    list_interfaces: bool,

    /// Print the effective config as TOML and exit.
    #[arg(long)]
    print_config: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();

    if cli.list_interfaces {
        if let Err(e) = radio::list_interfaces() {
            log::error!("Failed to list interfaces: {e}");
            process::exit(1);
        }
        return;
    }

    let cfg = match build_config(&cli) {
        Ok(cfg) => cfg,
        Err(e) => {
            log::error!("{e}");
            process::exit(1);
        }
    };

    if cli.print_config {
        print!("{}", cfg.to_toml_string());
        return;
    }

    // ── Platform setup ──────────────────────────────────────────────────
    let monitor = platform::create_monitor();

    let iface = match &cli.interface {
        Some(name) => name.clone(),
        None => match monitor.detect_interface() {
            Ok(name) => name,
            Err(e) => {
                log::error!("Failed to detect WiFi interface: {e}");
                process::exit(1);
            }
        },
    };

    if let Err(e) = monitor.enable_monitor_mode(&iface, cfg.scan.start_channel) {
        log::error!("Failed to enable monitor mode: {e}");
        log::error!("Make sure you are running as root and that your adapter supports monitor mode.");
        process::exit(1);
    }

    // ── Ctrl-C handler ──────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        if let Err(e) = ctrlc::set_handler(move || {
            log::info!("Interrupt received, shutting down");
            running.store(false, Ordering::Relaxed);
        }) {
            log::error!("Failed to set Ctrl-C handler: {e}");
            let _ = monitor.disable_monitor_mode(&iface);
            process::exit(1);
        }
    }

    // ── Capture loop ────────────────────────────────────────────────────
    let status = match run(&cli, cfg, &iface, running) {
        Ok(()) => 0,
        Err(e) => {
            log::error!("Capture failed: {e}");
            1
        }
    };

    // ── Teardown ────────────────────────────────────────────────────────
    if let Err(e) = monitor.disable_monitor_mode(&iface) {
        log::warn!("Cleanup error: {e}");
    }
    log::info!("Done.");
    process::exit(status);
}

/// Config file (if any) with command-line overrides applied.
fn build_config(cli: &Cli) -> Result<Config> {
    let mut cfg = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(ch) = cli.channel {
        cfg.scan.start_channel = ch;
    }
    if let Some(ms) = cli.hop_interval {
        cfg.scan.channel_hop_interval_ms = ms;
    }
    if let Some(ms) = cli.scan_duration {
        cfg.scan.scan_duration_ms = ms;
    }
    if let Some(n) = cli.max_networks {
        cfg.scan.max_networks = n;
    }
    if cli.deauth {
        cfg.deauth.enabled = true;
    }
    if let Some(dest) = &cli.deauth_dest {
        cfg.deauth.destination = Some(dest.clone());
    }
    if let Some(path) = &cli.output {
        cfg.capture.output = Some(path.clone());
    }
    cfg.validate()?;
    Ok(cfg)
}

fn run(cli: &Cli, cfg: Config, iface: &str, running: Arc<AtomicBool>) -> Result<()> {
    let radio = PcapRadio::open(iface, cfg.read_timeout(), platform::create_monitor())?;

    let opts = LoopOptions {
        interface: iface.to_string(),
        summary_interval: Duration::from_secs(cli.summary_secs.max(1)),
        output: cfg.output_path(),
        target: cli.target,
        deauth_target: cli.deauth,
        hop: !cli.no_hop,
    };

    let mut session = ScanSession::new(cfg, radio, ConsoleSink)?;
    capture::run(&mut session, &opts, running)
}
