//! Linux monitor-mode setup through `iw` and `ip`.
//!
//! The interface must be down to change type, so enabling monitor mode is
//! `ip link set down`, `iw dev <iface> set type monitor`, `ip link set up`,
//! then `iw dev <iface> set channel <N>`. Requires root or CAP_NET_ADMIN.

use std::io;

use super::{run, WifiMonitor};

pub struct LinuxMonitor;

impl LinuxMonitor {
    pub fn new() -> Self {
        Self
    }
}

/// First `Interface <name>` line of `iw dev` output.
fn first_interface(iw_dev: &str) -> Option<&str> {
    iw_dev
        .lines()
        .filter_map(|l| l.trim().strip_prefix("Interface "))
        .map(str::trim)
        .find(|name| !name.is_empty())
}

impl WifiMonitor for LinuxMonitor {
    fn detect_interface(&self) -> io::Result<String> {
        let output = run("iw", &["dev"])?;
        match first_interface(&output) {
            Some(name) => Ok(name.to_string()),
            None => {
                log::warn!("`iw dev` listed no wireless interfaces; falling back to wlan0");
                Ok("wlan0".to_string())
            }
        }
    }

    fn enable_monitor_mode(&self, iface: &str, channel: u8) -> io::Result<()> {
        log::info!("Bringing {iface} down");
        run("ip", &["link", "set", iface, "down"])?;

        log::info!("Enabling monitor mode on {iface}");
        run("iw", &["dev", iface, "set", "type", "monitor"])?;

        log::info!("Bringing {iface} up");
        run("ip", &["link", "set", iface, "up"])?;

        self.set_channel(iface, channel)
    }

    fn set_channel(&self, iface: &str, channel: u8) -> io::Result<()> {
        log::debug!("Setting channel {channel} on {iface}");
        let ch = channel.to_string();
        run("iw", &["dev", iface, "set", "channel", &ch]).map(drop)
    }

    fn disable_monitor_mode(&self, iface: &str) -> io::Result<()> {
        log::info!("Restoring managed mode on {iface}");
        let _ = run("ip", &["link", "set", iface, "down"]);
        let _ = run("iw", &["dev", iface, "set", "type", "managed"]);
        run("ip", &["link", "set", iface, "up"]).map(drop)
    }
}
