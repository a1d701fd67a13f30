//! Error types for operations that can actually fail.
//!
//! Frame parsing never produces an error: untrusted RF input degrades to
//! "ignore this frame". Only setup, radio control and export are fallible.

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from file export or a platform helper command.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// libpcap failure while opening, reading or injecting.
    #[error("capture error: {0}")]
    Pcap(#[from] pcap::Error),

    /// Config file could not be parsed.
    #[error("invalid config file: {0}")]
    Config(#[from] toml::de::Error),

    /// Config value out of range or malformed.
    #[error("invalid value for '{name}': {reason}")]
    InvalidValue { name: String, reason: String },

    /// Channel outside 1..=14.
    #[error("invalid channel {0} (expected 1-14)")]
    InvalidChannel(u8),

    /// Channel change refused because the controller is deauthing.
    #[error("channel is fixed while deauthing")]
    ChannelLocked,

    /// Interface is not delivering 802.11 frames.
    #[error("unsupported datalink type {dlt} ({name}); monitor mode is required")]
    UnsupportedDatalink { dlt: i32, name: &'static str },

    /// Platform monitor-mode helper failed.
    #[error("monitor mode: {0}")]
    Monitor(String),
}

impl Error {
    pub fn invalid_value(name: &str, reason: impl Into<String>) -> Self {
        Error::InvalidValue {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}
