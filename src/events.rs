//! Notifications for whatever presents the session (mood engine, UI,
//! console). Delivery is fire-and-forget: sinks must not block.

use colored::Colorize;

use crate::eapol::MessageNumber;
use crate::parser::{MacAddr, Ssid};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Event {
    /// Emitted once per BSSID, on its first beacon.
    NewNetworkDiscovered { ssid: Ssid, bssid: MacAddr, rssi: i8, channel: u8 },
    /// Emitted for every classified EAPOL-Key message.
    HandshakeCaptured { ssid: Ssid, bssid: MacAddr, message: MessageNumber },
    /// Classifier output; produced by an external classifier, never by the
    /// session itself.
    MlPrediction { confidence: f32 },
}

pub trait EventSink {
    fn emit(&mut self, event: Event);
}

impl EventSink for Vec<Event> {
    fn emit(&mut self, event: Event) {
        self.push(event);
    }
}

/// Prints one colored line per event to stdout.
#[derive(Default)]
pub struct ConsoleSink;

impl EventSink for ConsoleSink {
    fn emit(&mut self, event: Event) {
        match event {
            Event::NewNetworkDiscovered { ssid, bssid, rssi, channel } => {
                let rand_tag = if bssid.is_randomized() {
                    " (randomized)".dimmed().to_string()
                } else {
                    String::new()
                };
                println!(
                    "  {} SSID={:?}  BSSID={}{}  CH={}  RSSI={} dBm",
                    "NEW".green().bold(),
                    ssid.display_name(),
                    bssid.to_string().yellow(),
                    rand_tag,
                    channel,
                    rssi,
                );
            }
            Event::HandshakeCaptured { ssid, bssid, message } => {
                println!(
                    "  {} {} captured  SSID={:?}  BSSID={}",
                    "EAPOL".magenta().bold(),
                    message.to_string().bold(),
                    ssid.display_name(),
                    bssid.to_string().yellow(),
                );
            }
            Event::MlPrediction { confidence } => {
                log::info!("Classifier confidence {:.2}", confidence);
            }
        }
    }
}
