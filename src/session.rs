//! The oink session: one owned context tying the radio, the registry, the
//! capture store and the scan controller together.
//!
//! Frames arrive through [`ScanSession::on_frame`] (or [`ScanSession::poll`],
//! which reads one from the radio first). Both take `&mut self`, so frame
//! processing and [`ScanSession::tick`] can never overlap and the radio's
//! channel is only ever changed from the thread that owns the session.

use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};

use colored::Colorize;

use crate::config::Config;
use crate::eapol::{self, Decline, HandshakeMessage};
use crate::error::Result;
use crate::events::{Event, EventSink};
use crate::parser::{
    parse_beacon, parse_data_frame, FrameKind, MacAddr, RawFrame, MAC_HEADER_LEN,
};
use crate::radio::{Radio, MAX_FRAME_LEN};
use crate::registry::{DetectedNetwork, NetworkRegistry, UpsertOutcome};
use crate::scan::{ScanAction, ScanController, ScanMode};
use crate::store::CaptureStore;

/// Counters for the periodic summary. Nothing here affects behaviour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub frames: u64,
    pub beacons: u64,
    pub data_frames: u64,
    pub eapol_frames: u64,
    pub malformed: u64,
    pub unclassified_eapol: u64,
    pub handshakes: u64,
    pub store_drops: u64,
    pub deauth_sent: u64,
    pub transmit_failures: u64,
    pub channel_failures: u64,
    pub networks_evicted: u64,
}

pub struct ScanSession<R: Radio, E: EventSink> {
    cfg: Config,
    radio: R,
    sink: E,
    registry: NetworkRegistry,
    store: CaptureStore,
    controller: ScanController,
    stats: SessionStats,
    running: bool,
    /// Beacon discovery open; new networks are only added while set.
    scanning: bool,
    scan_started: Option<Instant>,
    last_sweep: Option<Instant>,
    rx_buf: Vec<u8>,
}

impl<R: Radio, E: EventSink> ScanSession<R, E> {
    pub fn new(cfg: Config, radio: R, sink: E) -> Result<Self> {
        cfg.validate()?;
        let controller = ScanController::new(cfg.controller_config()?, cfg.scan.start_channel);
        Ok(Self {
            registry: NetworkRegistry::new(cfg.scan.max_networks),
            store: CaptureStore::new(cfg.capture.max_handshakes),
            controller,
            radio,
            sink,
            stats: SessionStats::default(),
            running: false,
            scanning: false,
            scan_started: None,
            last_sweep: None,
            rx_buf: vec![0u8; MAX_FRAME_LEN],
            cfg,
        })
    }

    /// Enter the mode: promiscuous receive on, hopping from the start
    /// channel, discovery window open.
    pub fn start(&mut self, now: Instant) -> Result<()> {
        self.radio.set_promiscuous(true)?;
        self.running = true;
        self.last_sweep = Some(now);
        self.start_scan(now);
        let action = self.controller.start(now);
        self.apply(action);
        log::info!(
            "Session started on channel {} (hop every {} ms, deauth {})",
            self.controller.channel(),
            self.cfg.scan.channel_hop_interval_ms,
            if self.controller.deauth_enabled() { "enabled" } else { "disabled" },
        );
        Ok(())
    }

    /// Leave the mode. Target and deauth are dropped; collected networks and
    /// handshakes are kept for export.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.controller.stop();
        self.registry.clear_target();
        self.running = false;
        self.scanning = false;
        if let Err(e) = self.radio.set_promiscuous(false) {
            log::debug!("Could not disable promiscuous receive: {e}");
        }
        log::info!("Session stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning
    }

    // -----------------------------------------------------------------------
    // Frame path
    // -----------------------------------------------------------------------

    /// Process one received frame. Never fails; anything unusable is counted
    /// and dropped.
    pub fn on_frame(&mut self, frame: &RawFrame<'_>, now: Instant) {
        if !self.running {
            return;
        }
        self.stats.frames += 1;
        if frame.len() < MAC_HEADER_LEN {
            self.stats.malformed += 1;
            return;
        }
        match frame.kind() {
            Some(FrameKind::Management) if frame.is_beacon() => self.on_beacon(frame, now),
            Some(FrameKind::Data) => self.on_data(frame, now),
            _ => {}
        }
    }

    fn on_beacon(&mut self, frame: &RawFrame<'_>, now: Instant) {
        self.stats.beacons += 1;
        let Some(mut beacon) = parse_beacon(frame.bytes(), frame.rssi) else {
            self.stats.malformed += 1;
            return;
        };
        // Outside the discovery window only known networks are refreshed.
        if !self.scanning && self.registry.find(&beacon.bssid).is_none() {
            return;
        }
        if beacon.channel == 0 {
            beacon.channel = self.controller.channel();
            beacon.features.channel = beacon.channel;
        }

        let (outcome, net) = self.registry.upsert(&beacon, now);
        if outcome == UpsertOutcome::Inserted {
            let event = Event::NewNetworkDiscovered {
                ssid: net.ssid,
                bssid: net.bssid,
                rssi: net.rssi,
                channel: net.channel,
            };
            self.sink.emit(event);
        }
    }

    fn on_data(&mut self, frame: &RawFrame<'_>, now: Instant) {
        self.stats.data_frames += 1;
        let Some(data) = parse_data_frame(frame.bytes(), frame.rssi) else {
            return;
        };
        self.stats.eapol_frames += 1;

        let registry = &self.registry;
        match eapol::correlate(&data, now, |bssid| registry.find(bssid).map(|n| n.ssid)) {
            Ok(msg) => {
                self.stats.handshakes += 1;
                self.store.push(msg);
                self.sink.emit(Event::HandshakeCaptured {
                    ssid: msg.ssid,
                    bssid: msg.bssid,
                    message: msg.message,
                });
            }
            Err(Decline::Malformed) => self.stats.malformed += 1,
            Err(Decline::Unclassified) => self.stats.unclassified_eapol += 1,
            Err(Decline::NotKey) => {}
        }
    }

    /// Read at most one frame from the radio and process it. Returns whether
    /// a frame was handled.
    pub fn poll(&mut self, now: Instant) -> Result<bool> {
        let mut buf = std::mem::take(&mut self.rx_buf);
        let received = self.radio.receive(&mut buf);
        let handled = match received {
            Ok(Some(rx)) => {
                let frame = RawFrame::new(&buf, rx.len, rx.rssi);
                self.on_frame(&frame, now);
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(e) => Err(e),
        };
        self.rx_buf = buf;
        handled
    }

    // -----------------------------------------------------------------------
    // Periodic work
    // -----------------------------------------------------------------------

    /// Hop or deauth as due, sweep stale networks, and close the discovery
    /// window once the configured scan duration has passed.
    pub fn tick(&mut self, now: Instant) {
        if !self.running {
            return;
        }
        if let Some(action) = self.controller.tick(now) {
            self.apply(action);
        }

        if due(self.last_sweep, now, self.cfg.sweep_interval()) {
            self.last_sweep = Some(now);
            let removed = self.registry.evict_stale(now, self.cfg.stale_after());
            if removed > 0 {
                log::debug!("Swept {removed} stale networks");
            }
            self.release_vanished_target(now);
        }

        if let (true, Some(limit), Some(started)) =
            (self.scanning, self.cfg.scan_duration(), self.scan_started)
        {
            if now.saturating_duration_since(started) >= limit {
                self.scanning = false;
                log::info!(
                    "Scan window closed after {} ms ({} networks)",
                    limit.as_millis(),
                    self.registry.len()
                );
            }
        }
    }

    fn release_vanished_target(&mut self, now: Instant) {
        if let Some(target) = self.controller.target() {
            if self.registry.find(&target).is_none() {
                log::warn!("Target {target} is no longer beaconing; resuming channel hop");
                self.controller.release(now);
            }
        }
    }

    /// Radio failures here are counted, never retried and never fatal.
    fn apply(&mut self, action: ScanAction) {
        match action {
            ScanAction::SetChannel(ch) => {
                if let Err(e) = self.radio.set_channel(ch) {
                    self.stats.channel_failures += 1;
                    log::debug!("Channel {ch} rejected: {e}");
                }
            }
            ScanAction::TransmitDeauth(frame) => match self.radio.transmit_raw(&frame) {
                Ok(()) => self.stats.deauth_sent += 1,
                Err(e) => {
                    self.stats.transmit_failures += 1;
                    log::debug!("Deauth transmit failed: {e}");
                }
            },
        }
    }

    // -----------------------------------------------------------------------
    // Control
    // -----------------------------------------------------------------------

    /// Open (or reopen) the beacon discovery window.
    pub fn start_scan(&mut self, now: Instant) {
        self.scanning = true;
        self.scan_started = Some(now);
    }

    pub fn stop_scan(&mut self) {
        self.scanning = false;
    }

    /// Lock onto a known network. Returns `false` if `bssid` is not in the
    /// registry.
    pub fn select_target(&mut self, bssid: &MacAddr) -> bool {
        if !self.registry.set_target(bssid) {
            return false;
        }
        let (ssid, channel) = match self.registry.find(bssid) {
            Some(net) => (net.ssid, net.channel),
            None => return false,
        };
        if let Some(action) = self.controller.lock_on(*bssid, channel) {
            self.apply(action);
        }
        log::info!("Target locked: {} ({bssid}) on channel {channel}", ssid.display_name());
        true
    }

    /// Lock onto the registry entry at `index` (insertion order).
    pub fn select_target_index(&mut self, index: usize) -> bool {
        match self.registry.get(index).map(|n| n.bssid) {
            Some(bssid) => self.select_target(&bssid),
            None => false,
        }
    }

    pub fn clear_target(&mut self, now: Instant) {
        self.registry.clear_target();
        self.controller.release(now);
    }

    pub fn start_deauth(&mut self) -> bool {
        let started = self.controller.start_deauth();
        if started {
            log::info!("Deauth started against {:?}", self.controller.target());
        } else if !self.controller.deauth_enabled() {
            log::warn!("Deauth is disabled in config");
        } else {
            log::warn!("Deauth needs a locked target");
        }
        started
    }

    /// Stop deauthing and release the target.
    pub fn stop_deauth(&mut self, now: Instant) -> bool {
        if !self.controller.stop_deauth(now) {
            return false;
        }
        self.registry.clear_target();
        log::info!("Deauth stopped; resuming channel hop");
        true
    }

    /// Toggle hopping. Has no effect while a target is locked.
    pub fn enable_channel_hop(&mut self, enabled: bool, now: Instant) -> bool {
        self.controller.enable_hop(enabled, now)
    }

    /// Manual tune; refused while deauthing.
    pub fn set_channel(&mut self, channel: u8) -> Result<()> {
        match self.controller.set_channel(channel)? {
            ScanAction::SetChannel(ch) => self.radio.set_channel(ch),
            other => {
                self.apply(other);
                Ok(())
            }
        }
    }

    // -----------------------------------------------------------------------
    // Accessors and export
    // -----------------------------------------------------------------------

    pub fn networks(&self) -> &NetworkRegistry {
        &self.registry
    }

    pub fn handshakes(&self) -> &[HandshakeMessage] {
        self.store.records()
    }

    pub fn store(&self) -> &CaptureStore {
        &self.store
    }

    pub fn target(&self) -> Option<&DetectedNetwork> {
        self.registry.target()
    }

    pub fn mode(&self) -> ScanMode {
        self.controller.mode()
    }

    pub fn current_channel(&self) -> u8 {
        self.controller.channel()
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            store_drops: self.store.dropped(),
            networks_evicted: self.registry.evicted(),
            ..self.stats
        }
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    /// Append handshakes not yet exported to `path`.
    pub fn save_handshakes(&mut self, path: &Path) -> Result<usize> {
        let n = self.store.save(path)?;
        if n > 0 {
            log::info!("Saved {n} handshake messages to {}", path.display());
        }
        Ok(n)
    }

    /// Write handshakes not yet exported to `out`.
    pub fn flush_handshakes<W: Write>(&mut self, out: &mut W) -> Result<usize> {
        Ok(self.store.write_pending_to(out)?)
    }

    pub fn print_summary(&self, now: Instant) {
        self.registry.print_summary(now);

        let s = self.stats();
        let mode = match self.mode() {
            ScanMode::Idle => "idle".normal(),
            ScanMode::Hopping => "hopping".green(),
            ScanMode::Locked { .. } => "locked".yellow(),
            ScanMode::Deauthing { .. } => "deauthing".red().bold(),
        };
        println!(
            "  CH {:>2}  {}  frames {}  beacons {}  EAPOL {}  handshakes {} (M1 {} M2 {} M3 {} M4 {}, {} pairs)  deauth {}",
            self.current_channel(),
            mode,
            s.frames,
            s.beacons,
            s.eapol_frames,
            s.handshakes.to_string().magenta().bold(),
            self.store.count_of(eapol::MessageNumber::M1),
            self.store.count_of(eapol::MessageNumber::M2),
            self.store.count_of(eapol::MessageNumber::M3),
            self.store.count_of(eapol::MessageNumber::M4),
            self.store.pairs(),
            s.deauth_sent,
        );
        if s.malformed + s.unclassified_eapol + s.transmit_failures + s.channel_failures > 0 {
            println!(
                "  {}",
                format!(
                    "malformed {}  unclassified {}  tx failures {}  channel failures {}  dropped {}",
                    s.malformed,
                    s.unclassified_eapol,
                    s.transmit_failures,
                    s.channel_failures,
                    s.store_drops,
                )
                .dimmed()
            );
        }
    }
}

fn due(since: Option<Instant>, now: Instant, interval: Duration) -> bool {
    since.map_or(true, |t| now.saturating_duration_since(t) >= interval)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    use crate::eapol::tests::{eapol_key, M1_INFO, M2_INFO};
    use crate::eapol::MessageNumber;
    use crate::error::Error;
    use crate::parser::tests::{beacon, beacon_with_elements, data_frame, AP, STA};
    use crate::parser::{element, Ssid};
    use crate::radio::Received;
    use crate::scan::build_deauth_frame;

    #[derive(Default)]
    struct MockRadio {
        channels: Vec<u8>,
        sent: Vec<Vec<u8>>,
        promiscuous: bool,
        rx: VecDeque<(Vec<u8>, i8)>,
        fail_tx: bool,
    }

    impl Radio for MockRadio {
        fn set_channel(&mut self, channel: u8) -> Result<()> {
            self.channels.push(channel);
            Ok(())
        }

        fn set_promiscuous(&mut self, enabled: bool) -> Result<()> {
            self.promiscuous = enabled;
            Ok(())
        }

        fn transmit_raw(&mut self, frame: &[u8]) -> Result<()> {
            if self.fail_tx {
                return Err(Error::Monitor("injection refused".into()));
            }
            self.sent.push(frame.to_vec());
            Ok(())
        }

        fn receive(&mut self, buf: &mut [u8]) -> Result<Option<Received>> {
            Ok(self.rx.pop_front().map(|(frame, rssi)| {
                let len = frame.len().min(buf.len());
                buf[..len].copy_from_slice(&frame[..len]);
                Received { len, rssi }
            }))
        }
    }

    type TestSession = ScanSession<MockRadio, Vec<Event>>;

    fn session_with(cfg: Config) -> (TestSession, Instant) {
        let mut s = ScanSession::new(cfg, MockRadio::default(), Vec::new()).unwrap();
        let t0 = Instant::now();
        s.start(t0).unwrap();
        (s, t0)
    }

    fn session() -> (TestSession, Instant) {
        session_with(Config::default())
    }

    fn deauth_session() -> (TestSession, Instant) {
        let mut cfg = Config::default();
        cfg.deauth.enabled = true;
        session_with(cfg)
    }

    fn feed(s: &mut TestSession, bytes: &[u8], rssi: i8, now: Instant) {
        s.on_frame(&RawFrame::new(bytes, bytes.len(), rssi), now);
    }

    /// M1 from the AP to the station, as an AP would send it.
    fn m1_from_ap() -> Vec<u8> {
        data_frame(0x08, 0x02, STA, AP, &eapol_key(M1_INFO, 121))
    }

    #[test]
    fn beacon_then_m1_produces_named_record() {
        let (mut s, t0) = session();
        feed(&mut s, &beacon(AP, "TestNet", 6), -40, t0);
        feed(&mut s, &m1_from_ap(), -42, t0);

        let records = s.handshakes();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message, MessageNumber::M1);
        assert_eq!(records[0].ssid, Ssid::new("TestNet"));
        assert_eq!(records[0].bssid, MacAddr(AP));
        assert_eq!(records[0].station, MacAddr(STA));

        assert_eq!(
            s.sink,
            vec![
                Event::NewNetworkDiscovered {
                    ssid: Ssid::new("TestNet"),
                    bssid: MacAddr(AP),
                    rssi: -40,
                    channel: 6,
                },
                Event::HandshakeCaptured {
                    ssid: Ssid::new("TestNet"),
                    bssid: MacAddr(AP),
                    message: MessageNumber::M1,
                },
            ]
        );

        let mut out = Vec::new();
        assert_eq!(s.flush_handshakes(&mut out).unwrap(), 1);
        assert!(out.starts_with(b"SSID:TestNet BSSID:AABBCCDDEEFF M1\n"));
        assert_eq!(s.flush_handshakes(&mut Vec::new()).unwrap(), 0);
    }

    #[test]
    fn repeated_beacons_announce_once() {
        let (mut s, t0) = session();
        for i in 0..5 {
            feed(&mut s, &beacon(AP, "TestNet", 6), -40 - i, t0 + Duration::from_millis(100 * i as u64));
        }
        assert_eq!(s.sink.len(), 1);
        assert_eq!(s.networks().len(), 1);
        let net = s.networks().find(&MacAddr(AP)).unwrap();
        assert_eq!(net.beacon_count, 5);
        assert_eq!(net.rssi, -44);
        assert_eq!(s.stats().beacons, 5);
    }

    #[test]
    fn m2_from_station_resolves_ap_roles() {
        let (mut s, t0) = session();
        feed(&mut s, &beacon(AP, "TestNet", 6), -40, t0);
        let m2 = data_frame(0x08, 0x01, AP, STA, &eapol_key(M2_INFO, 121));
        feed(&mut s, &m2, -50, t0);
        let rec = &s.handshakes()[0];
        assert_eq!(rec.message, MessageNumber::M2);
        assert_eq!(rec.bssid, MacAddr(AP));
        assert_eq!(rec.station, MacAddr(STA));
    }

    #[test]
    fn handshake_from_unknown_ap_has_empty_name() {
        let (mut s, t0) = session();
        feed(&mut s, &m1_from_ap(), -42, t0);
        assert_eq!(s.handshakes().len(), 1);
        assert!(s.handshakes()[0].ssid.is_empty());
    }

    #[test]
    fn junk_is_counted_not_fatal() {
        let (mut s, t0) = session();
        feed(&mut s, &[0x80, 0x00, 0x00], -40, t0);
        feed(&mut s, &beacon(AP, "TestNet", 6)[..30], -40, t0);
        let short_key = data_frame(0x08, 0x02, STA, AP, &eapol_key(M1_INFO, 60));
        feed(&mut s, &short_key, -40, t0);
        let odd_key = data_frame(0x08, 0x02, STA, AP, &eapol_key(0x0000, 121));
        feed(&mut s, &odd_key, -40, t0);

        let stats = s.stats();
        assert_eq!(stats.frames, 4);
        assert_eq!(stats.malformed, 3);
        assert_eq!(stats.unclassified_eapol, 1);
        assert!(s.handshakes().is_empty());
        assert!(s.networks().is_empty());
    }

    #[test]
    fn frames_before_start_are_ignored() {
        let mut s: TestSession =
            ScanSession::new(Config::default(), MockRadio::default(), Vec::new()).unwrap();
        let bytes = beacon(AP, "TestNet", 6);
        s.on_frame(&RawFrame::new(&bytes, bytes.len(), -40), Instant::now());
        assert!(s.networks().is_empty());
        assert_eq!(s.stats().frames, 0);
    }

    #[test]
    fn beacon_without_ds_element_takes_current_channel() {
        let (mut s, t0) = session();
        s.enable_channel_hop(false, t0);
        s.set_channel(9).unwrap();
        let ies = [element::SSID, 3, b'a', b'b', b'c'];
        feed(&mut s, &beacon_with_elements(AP, 0x0011, &ies), -40, t0);
        assert_eq!(s.networks().find(&MacAddr(AP)).unwrap().channel, 9);
    }

    #[test]
    fn start_tunes_and_hops() {
        let (mut s, t0) = session();
        assert!(s.radio().promiscuous);
        assert_eq!(s.radio().channels, vec![1]);
        s.tick(t0 + Duration::from_millis(501));
        s.tick(t0 + Duration::from_millis(1002));
        assert_eq!(s.radio().channels, vec![1, 6, 11]);
        assert_eq!(s.current_channel(), 11);
    }

    #[test]
    fn target_lock_and_deauth_cycle() {
        let (mut s, t0) = deauth_session();
        feed(&mut s, &beacon(AP, "TestNet", 6), -40, t0);

        assert!(!s.start_deauth());
        assert!(s.select_target(&MacAddr(AP)));
        assert_eq!(s.mode(), ScanMode::Locked { target: MacAddr(AP) });
        assert_eq!(s.radio().channels.last(), Some(&6));
        assert_eq!(s.target().map(|n| n.bssid), Some(MacAddr(AP)));

        assert!(s.start_deauth());
        s.tick(t0);
        s.tick(t0 + Duration::from_millis(50));
        s.tick(t0 + Duration::from_millis(101));
        assert_eq!(s.radio().sent.len(), 2);
        assert_eq!(s.radio().sent[0], build_deauth_frame(MacAddr::BROADCAST, MacAddr(AP), 7).to_vec());
        assert_eq!(s.stats().deauth_sent, 2);

        assert!(matches!(s.set_channel(1), Err(Error::ChannelLocked)));
        assert_eq!(s.current_channel(), 6);

        assert!(s.stop_deauth(t0 + Duration::from_millis(200)));
        assert_eq!(s.mode(), ScanMode::Hopping);
        assert!(s.target().is_none());
        s.tick(t0 + Duration::from_millis(400));
        assert_eq!(s.radio().sent.len(), 2);
    }

    #[test]
    fn deauth_disabled_in_config_is_a_no_op() {
        let (mut s, t0) = session();
        feed(&mut s, &beacon(AP, "TestNet", 6), -40, t0);
        assert!(s.select_target_index(0));
        assert!(!s.start_deauth());
        s.tick(t0 + Duration::from_secs(1));
        assert!(s.radio().sent.is_empty());
    }

    #[test]
    fn unknown_target_is_rejected() {
        let (mut s, _) = session();
        assert!(!s.select_target(&MacAddr(AP)));
        assert!(!s.select_target_index(3));
        assert_eq!(s.mode(), ScanMode::Hopping);
    }

    #[test]
    fn transmit_failures_are_counted() {
        let (mut s, t0) = deauth_session();
        s.radio.fail_tx = true;
        feed(&mut s, &beacon(AP, "TestNet", 6), -40, t0);
        s.select_target(&MacAddr(AP));
        s.start_deauth();
        s.tick(t0);
        let stats = s.stats();
        assert_eq!(stats.deauth_sent, 0);
        assert_eq!(stats.transmit_failures, 1);
        assert!(s.is_running());
    }

    #[test]
    fn sweep_evicts_stale_networks_and_releases_target() {
        let (mut s, t0) = session();
        feed(&mut s, &beacon(AP, "TestNet", 6), -40, t0);
        s.select_target(&MacAddr(AP));

        s.tick(t0 + Duration::from_secs(30));
        assert!(s.target().is_some());

        s.tick(t0 + Duration::from_secs(45));
        assert!(s.target().is_some());

        s.tick(t0 + Duration::from_secs(90));
        assert!(s.networks().is_empty());
        assert_eq!(s.mode(), ScanMode::Hopping);
        assert_eq!(s.stats().networks_evicted, 1);
    }

    #[test]
    fn closed_scan_window_only_refreshes_known_networks() {
        let mut cfg = Config::default();
        cfg.scan.scan_duration_ms = 1_000;
        let (mut s, t0) = session_with(cfg);
        feed(&mut s, &beacon(AP, "Known", 1), -40, t0);

        s.tick(t0 + Duration::from_millis(1_000));
        assert!(!s.is_scanning());

        let later = t0 + Duration::from_millis(1_500);
        feed(&mut s, &beacon(STA, "Late", 6), -40, later);
        feed(&mut s, &beacon(AP, "Known", 1), -40, later);
        assert_eq!(s.networks().len(), 1);
        assert_eq!(s.networks().find(&MacAddr(AP)).unwrap().beacon_count, 2);

        s.start_scan(later);
        feed(&mut s, &beacon(STA, "Late", 6), -40, later);
        assert_eq!(s.networks().len(), 2);
    }

    #[test]
    fn poll_reads_from_radio() {
        let (mut s, t0) = session();
        s.radio.rx.push_back((beacon(AP, "TestNet", 6), -40));
        assert!(s.poll(t0).unwrap());
        assert!(!s.poll(t0).unwrap());
        assert_eq!(s.networks().len(), 1);
    }

    #[test]
    fn stop_clears_target_and_keeps_captures() {
        let (mut s, t0) = session();
        feed(&mut s, &beacon(AP, "TestNet", 6), -40, t0);
        feed(&mut s, &m1_from_ap(), -42, t0);
        s.select_target(&MacAddr(AP));
        s.stop();
        assert!(!s.is_running());
        assert!(!s.radio().promiscuous);
        assert_eq!(s.mode(), ScanMode::Idle);
        assert!(s.target().is_none());
        assert_eq!(s.handshakes().len(), 1);
    }

    #[test]
    fn save_appends_pending_records() {
        let (mut s, t0) = session();
        feed(&mut s, &beacon(AP, "TestNet", 6), -40, t0);
        feed(&mut s, &m1_from_ap(), -42, t0);

        let path = std::env::temp_dir().join(format!("oink-save-{}.txt", std::process::id()));
        let _ = std::fs::remove_file(&path);
        assert_eq!(s.save_handshakes(&path).unwrap(), 1);
        assert_eq!(s.save_handshakes(&path).unwrap(), 0);
        let text = std::fs::read(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert!(text.starts_with(b"SSID:TestNet BSSID:AABBCCDDEEFF M1\n"));
    }
}
