//! Capture loop: feeds radio frames into the session until interrupted,
//! prints a periodic summary and flushes handshakes to disk as they come.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use colored::Colorize;

use crate::error::Result;
use crate::events::EventSink;
use crate::parser::MacAddr;
use crate::radio::Radio;
use crate::session::ScanSession;

/// Settings for the capture loop.
pub struct LoopOptions {
    pub interface: String,
    pub summary_interval: Duration,
    /// Handshake export file; pending records are appended every summary.
    pub output: PathBuf,
    /// Lock onto this BSSID as soon as it is seen beaconing.
    pub target: Option<MacAddr>,
    /// Start deauthing once the target is locked.
    pub deauth_target: bool,
    /// Hop channels while no target is locked; otherwise stay put.
    pub hop: bool,
}

/// Run the capture loop until `running` is cleared.
pub fn run<R: Radio, E: EventSink>(
    session: &mut ScanSession<R, E>,
    opts: &LoopOptions,
    running: Arc<AtomicBool>,
) -> Result<()> {
    let started = Instant::now();
    session.start(started)?;
    if !opts.hop {
        session.enable_channel_hop(false, started);
    }

    println!(
        "\n{}",
        format!(
            "  Oinking on {} from channel {}, saving handshakes to {}",
            opts.interface,
            session.current_channel(),
            opts.output.display()
        )
        .bold()
    );
    if let Some(target) = opts.target {
        println!("  Waiting for target {}", target.to_string().red().bold());
    }
    println!("  {}", "Press Ctrl-C to stop and restore the interface.\n".dimmed());

    let mut last_summary = Instant::now();

    while running.load(Ordering::Relaxed) {
        if let Err(e) = session.poll(Instant::now()) {
            log::error!("Capture error: {e}");
            break;
        }

        let now = Instant::now();
        session.tick(now);
        lock_requested_target(session, opts);

        if now.saturating_duration_since(last_summary) >= opts.summary_interval {
            session.print_summary(now);
            flush(session, opts);
            last_summary = now;
        }
    }

    session.stop();

    println!("\n{}", "  ── Final summary ──".bold().cyan());
    session.print_summary(Instant::now());
    flush(session, opts);

    Ok(())
}

fn lock_requested_target<R: Radio, E: EventSink>(
    session: &mut ScanSession<R, E>,
    opts: &LoopOptions,
) {
    let Some(target) = opts.target else {
        return;
    };
    if session.target().is_some() || session.networks().find(&target).is_none() {
        return;
    }
    if session.select_target(&target) && opts.deauth_target {
        session.start_deauth();
    }
}

fn flush<R: Radio, E: EventSink>(session: &mut ScanSession<R, E>, opts: &LoopOptions) {
    if session.store().pending() == 0 {
        return;
    }
    if let Err(e) = session.save_handshakes(&opts.output) {
        log::warn!("Could not write {}: {e}", opts.output.display());
    }
}
