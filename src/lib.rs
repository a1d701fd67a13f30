//! Passive 802.11 analysis: beacon discovery, EAPOL handshake capture and
//! an optional targeted deauthentication mode.
//!
//! [`session::ScanSession`] owns all state. Feed it frames through
//! [`session::ScanSession::on_frame`] (or let it read from a [`radio::Radio`]
//! via `poll`) and call `tick` periodically.

pub mod capture;
pub mod config;
pub mod eapol;
pub mod error;
pub mod events;
pub mod features;
pub mod parser;
pub mod platform;
pub mod radio;
pub mod radiotap;
pub mod registry;
pub mod scan;
pub mod session;
pub mod store;

pub use config::Config;
pub use error::{Error, Result};
pub use events::{ConsoleSink, Event, EventSink};
pub use parser::{MacAddr, RawFrame, Ssid};
pub use radio::{PcapRadio, Radio};
pub use session::{ScanSession, SessionStats};
