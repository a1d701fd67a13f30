//! Session configuration, read once at start.
//!
//! Everything has a default, so an absent file or a partial one is fine:
//!
//! ```toml
//! [scan]
//! channel_hop_interval_ms = 500
//! max_networks = 50
//!
//! [deauth]
//! enabled = true
//! destination = "11:22:33:44:55:66"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::parser::MacAddr;
use crate::scan::{is_valid_channel, ControllerConfig, REASON_CLASS3_FROM_NONASSOC};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scan: ScanConfig,
    pub deauth: DeauthConfig,
    pub capture: CaptureConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub channel_hop_interval_ms: u64,
    /// How long beacon discovery runs after a scan starts; 0 = until stopped.
    pub scan_duration_ms: u64,
    pub max_networks: usize,
    pub stale_after_secs: u64,
    pub sweep_interval_secs: u64,
    pub start_channel: u8,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            channel_hop_interval_ms: 500,
            scan_duration_ms: 0,
            max_networks: 50,
            stale_after_secs: 60,
            sweep_interval_secs: 30,
            start_channel: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeauthConfig {
    pub enabled: bool,
    pub interval_ms: u64,
    pub reason: u16,
    /// Unicast station to deauthenticate; broadcast when unset.
    pub destination: Option<String>,
}

impl Default for DeauthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_ms: 100,
            reason: REASON_CLASS3_FROM_NONASSOC,
            destination: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub max_handshakes: usize,
    /// pcap read timeout; bounds how late a hop or deauth tick can run.
    pub read_timeout_ms: u64,
    /// Handshake export file. A timestamped name is used when unset.
    pub output: Option<PathBuf>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            max_handshakes: 1024,
            read_timeout_ms: 50,
            output: None,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let cfg = Self::from_toml_str(&text)?;
        log::info!("Loaded config from {}", path.display());
        Ok(cfg)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let cfg: Config = toml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if !is_valid_channel(self.scan.start_channel) {
            return Err(Error::InvalidChannel(self.scan.start_channel));
        }
        if self.scan.channel_hop_interval_ms == 0 {
            return Err(Error::invalid_value("scan.channel_hop_interval_ms", "must be > 0"));
        }
        if self.scan.max_networks == 0 {
            return Err(Error::invalid_value("scan.max_networks", "must be > 0"));
        }
        if self.deauth.interval_ms == 0 {
            return Err(Error::invalid_value("deauth.interval_ms", "must be > 0"));
        }
        self.deauth_destination()?;
        Ok(())
    }

    pub fn deauth_destination(&self) -> Result<MacAddr> {
        match &self.deauth.destination {
            Some(s) => s.parse(),
            None => Ok(MacAddr::BROADCAST),
        }
    }

    pub fn controller_config(&self) -> Result<ControllerConfig> {
        Ok(ControllerConfig {
            hop_interval: Duration::from_millis(self.scan.channel_hop_interval_ms),
            deauth_enabled: self.deauth.enabled,
            deauth_interval: Duration::from_millis(self.deauth.interval_ms),
            deauth_reason: self.deauth.reason,
            deauth_destination: self.deauth_destination()?,
        })
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.scan.stale_after_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.scan.sweep_interval_secs)
    }

    /// `None` when discovery should run until stopped.
    pub fn scan_duration(&self) -> Option<Duration> {
        (self.scan.scan_duration_ms > 0).then(|| Duration::from_millis(self.scan.scan_duration_ms))
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.capture.read_timeout_ms)
    }

    /// Export path: configured, or `handshakes-<UTC timestamp>.txt`.
    pub fn output_path(&self) -> PathBuf {
        self.capture.output.clone().unwrap_or_else(|| {
            PathBuf::from(format!(
                "handshakes-{}.txt",
                chrono::Utc::now().format("%Y%m%d-%H%M%S")
            ))
        })
    }

    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}
