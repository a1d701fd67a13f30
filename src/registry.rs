//! Access points discovered from beacons.
//!
//! Registry sizes are bounded by what is on the air (tens of entries), so a
//! linear scan by BSSID is cheaper than hashing. Storage is reserved up
//! front; once `capacity` is reached the stalest non-target entry makes room
//! for the newcomer instead of the newcomer being rejected.

use std::time::{Duration, Instant};

use crate::features::WiFiFeatures;
use crate::parser::{BeaconDescriptor, MacAddr, Ssid};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// One access point as seen from its beacons.
#[derive(Debug, Clone)]
pub struct DetectedNetwork {
    pub bssid: MacAddr,
    /// Empty for hidden networks.
    pub ssid: Ssid,
    /// Signal strength of the most recent beacon (dBm).
    pub rssi: i8,
    pub channel: u8,
    pub beacon_count: u32,
    pub first_seen: Instant,
    pub last_seen: Instant,
    /// Summary from the first beacon.
    pub features: WiFiFeatures,
    pub is_target: bool,
}

impl DetectedNetwork {
    fn from_beacon(beacon: &BeaconDescriptor, now: Instant) -> Self {
        Self {
            bssid: beacon.bssid,
            ssid: beacon.ssid,
            rssi: beacon.rssi,
            channel: beacon.channel,
            beacon_count: 1,
            first_seen: now,
            last_seen: now,
            features: beacon.features,
            is_target: false,
        }
    }

    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_seen)
    }
}

/// What `upsert` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// First sighting of this BSSID.
    Inserted,
    Updated,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

pub struct NetworkRegistry {
    networks: Vec<DetectedNetwork>,
    capacity: usize,
    evicted: u64,
}

impl NetworkRegistry {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            networks: Vec::with_capacity(capacity),
            capacity,
            evicted: 0,
        }
    }

    fn position(&self, bssid: &MacAddr) -> Option<usize> {
        self.networks.iter().position(|n| n.bssid == *bssid)
    }

    /// Record a beacon. New addresses are inserted; known ones get their
    /// signal, timestamp and sighting count refreshed.
    pub fn upsert(
        &mut self,
        beacon: &BeaconDescriptor,
        now: Instant,
    ) -> (UpsertOutcome, &DetectedNetwork) {
        if let Some(idx) = self.position(&beacon.bssid) {
            let net = &mut self.networks[idx];
            net.rssi = beacon.rssi;
            net.last_seen = now;
            net.beacon_count = net.beacon_count.saturating_add(1);
            return (UpsertOutcome::Updated, &self.networks[idx]);
        }

        if self.networks.len() >= self.capacity {
            self.evict_one();
        }
        self.networks.push(DetectedNetwork::from_beacon(beacon, now));
        let last = self.networks.len() - 1;
        (UpsertOutcome::Inserted, &self.networks[last])
    }

    /// Drop the least recently seen entry, sparing the target unless it is
    /// the only one left.
    fn evict_one(&mut self) {
        let victim = self
            .networks
            .iter()
            .enumerate()
            .filter(|(_, n)| !n.is_target)
            .min_by_key(|(_, n)| n.last_seen)
            .map(|(i, _)| i)
            .or_else(|| (!self.networks.is_empty()).then_some(0));

        if let Some(idx) = victim {
            let gone = self.networks.remove(idx);
            self.evicted += 1;
            log::debug!("Registry full, evicted {} ({})", gone.ssid.display_name(), gone.bssid);
        }
    }

    pub fn find(&self, bssid: &MacAddr) -> Option<&DetectedNetwork> {
        self.networks.iter().find(|n| n.bssid == *bssid)
    }

    /// Remove entries not seen for more than `max_age`. Returns how many
    /// were removed.
    pub fn evict_stale(&mut self, now: Instant, max_age: Duration) -> usize {
        let before = self.networks.len();
        self.networks.retain(|n| n.age(now) <= max_age);
        let removed = before - self.networks.len();
        self.evicted += removed as u64;
        removed
    }

    /// Mark `bssid` as the single target. Returns `false` (and leaves the
    /// current target alone) if the address is unknown.
    pub fn set_target(&mut self, bssid: &MacAddr) -> bool {
        let Some(idx) = self.position(bssid) else {
            return false;
        };
        self.clear_target();
        self.networks[idx].is_target = true;
        true
    }

    pub fn clear_target(&mut self) {
        for net in self.networks.iter_mut().filter(|n| n.is_target) {
            net.is_target = false;
        }
    }

    pub fn target(&self) -> Option<&DetectedNetwork> {
        self.networks.iter().find(|n| n.is_target)
    }

    /// Entry at `index` in insertion order (menus select by position).
    pub fn get(&self, index: usize) -> Option<&DetectedNetwork> {
        self.networks.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DetectedNetwork> {
        self.networks.iter()
    }

    pub fn len(&self) -> usize {
        self.networks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }

    /// Total entries removed by staleness or capacity eviction.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    /// Print a summary table to stdout, strongest signal first.
    pub fn print_summary(&self, now: Instant) {
        use colored::Colorize;

        if self.networks.is_empty() {
            println!("{}", "  No networks detected yet.".dimmed());
            return;
        }

        let mut rows: Vec<&DetectedNetwork> = self.networks.iter().collect();
        rows.sort_by(|a, b| b.rssi.cmp(&a.rssi));

        println!(
            "\n{}",
            format!("  ── Networks in range:  {} ──", rows.len()).bold().cyan()
        );
        println!(
            "  {:<32}  {:<17}  {:>3}  {:>8}  {:>5}  {:>7}  {}",
            "SSID".bold(),
            "BSSID".bold(),
            "CH".bold(),
            "RSSI".bold(),
            "SEC".bold(),
            "Beacons".bold(),
            "Seen".bold(),
        );

        for n in rows {
            let name = n.ssid.display_name();
            let name = if n.ssid.is_empty() {
                format!("{:<32}", name).dimmed()
            } else if n.is_target {
                format!("{:<32}", name).red().bold()
            } else {
                format!("{:<32}", name).normal()
            };
            println!(
                "  {}  {:<17}  {:>3}  {:>8}  {:>5}  {:>7}  {}s ago",
                name,
                n.bssid.to_string().yellow(),
                n.channel,
                format!("{} dBm", n.rssi).green(),
                n.features.security.to_string(),
                n.beacon_count,
                n.age(now).as_secs(),
            );
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_beacon;
    use crate::parser::tests::{beacon, AP};

    fn descriptor(bssid: [u8; 6], ssid: &str, channel: u8, rssi: i8) -> BeaconDescriptor {
        parse_beacon(&beacon(bssid, ssid, channel), rssi).unwrap()
    }

    #[test]
    fn same_bssid_updates_in_place() {
        let mut reg = NetworkRegistry::new(50);
        let t0 = Instant::now();
        let (first, _) = reg.upsert(&descriptor(AP, "TestNet", 6, -70), t0);
        let (second, net) = reg.upsert(&descriptor(AP, "TestNet", 6, -45), t0 + Duration::from_secs(1));
        assert_eq!(first, UpsertOutcome::Inserted);
        assert_eq!(second, UpsertOutcome::Updated);
        assert_eq!(net.rssi, -45);
        assert_eq!(net.beacon_count, 2);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn stale_entries_are_swept() {
        let mut reg = NetworkRegistry::new(50);
        let t0 = Instant::now();
        let max_age = Duration::from_secs(60);
        reg.upsert(&descriptor(AP, "TestNet", 6, -40), t0);

        assert_eq!(reg.evict_stale(t0 + max_age - Duration::from_millis(1), max_age), 0);
        assert!(reg.find(&MacAddr(AP)).is_some());

        assert_eq!(reg.evict_stale(t0 + max_age + Duration::from_millis(1), max_age), 1);
        assert!(reg.find(&MacAddr(AP)).is_none());
        assert_eq!(reg.evicted(), 1);
    }

    #[test]
    fn single_target() {
        let mut reg = NetworkRegistry::new(50);
        let now = Instant::now();
        let x = [1, 1, 1, 1, 1, 1];
        let y = [2, 2, 2, 2, 2, 2];
        reg.upsert(&descriptor(x, "X", 1, -40), now);
        reg.upsert(&descriptor(y, "Y", 11, -40), now);

        assert!(reg.set_target(&MacAddr(x)));
        assert!(reg.set_target(&MacAddr(y)));
        let targets: Vec<_> = reg.iter().filter(|n| n.is_target).collect();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].bssid, MacAddr(y));

        assert!(!reg.set_target(&MacAddr([9; 6])));
        assert_eq!(reg.target().map(|n| n.bssid), Some(MacAddr(y)));

        reg.clear_target();
        assert!(reg.target().is_none());
    }

    #[test]
    fn full_registry_evicts_stalest_non_target() {
        let mut reg = NetworkRegistry::new(2);
        let t0 = Instant::now();
        let a = [1, 0, 0, 0, 0, 1];
        let b = [1, 0, 0, 0, 0, 2];
        let c = [1, 0, 0, 0, 0, 3];
        reg.upsert(&descriptor(a, "A", 1, -40), t0);
        reg.upsert(&descriptor(b, "B", 6, -40), t0 + Duration::from_secs(1));
        reg.set_target(&MacAddr(a));

        let (outcome, _) = reg.upsert(&descriptor(c, "C", 11, -40), t0 + Duration::from_secs(2));
        assert_eq!(outcome, UpsertOutcome::Inserted);
        assert_eq!(reg.len(), 2);
        assert!(reg.find(&MacAddr(a)).is_some());
        assert!(reg.find(&MacAddr(b)).is_none());
        assert!(reg.find(&MacAddr(c)).is_some());
    }
}
