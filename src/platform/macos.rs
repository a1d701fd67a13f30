//! macOS monitor-mode setup through `ifconfig`.
//!
//! Monitor mode is `ifconfig <iface> down`, `monitor`, `channel <N>`, `up`.
//! Channel changes reuse `ifconfig <iface> channel <N>`, which some drivers
//! only honour while the interface is down, so retuning cycles it. Teardown
//! toggles Wi-Fi power via `networksetup` so the system re-associates.

use std::io;
use std::thread;
use std::time::Duration;

use super::{run, WifiMonitor};

pub struct MacOsMonitor;

impl MacOsMonitor {
    pub fn new() -> Self {
        Self
    }
}

/// Device of the "Wi-Fi" block in `networksetup -listallhardwareports`.
fn wifi_device(ports: &str) -> Option<&str> {
    let mut in_wifi = false;
    for line in ports.lines().map(str::trim) {
        if line.starts_with("Hardware Port:") {
            in_wifi = line.contains("Wi-Fi");
        } else if in_wifi {
            if let Some(dev) = line.strip_prefix("Device:") {
                return Some(dev.trim());
            }
        }
    }
    None
}

impl WifiMonitor for MacOsMonitor {
    fn detect_interface(&self) -> io::Result<String> {
        let output = run("networksetup", &["-listallhardwareports"])?;
        match wifi_device(&output) {
            Some(dev) => Ok(dev.to_string()),
            None => {
                log::warn!("Could not auto-detect WiFi interface; falling back to en0");
                Ok("en0".to_string())
            }
        }
    }

    fn enable_monitor_mode(&self, iface: &str, channel: u8) -> io::Result<()> {
        log::info!("Enabling monitor mode on {iface}");
        run("ifconfig", &[iface, "down"])?;
        run("ifconfig", &[iface, "monitor"])?;
        let ch = channel.to_string();
        run("ifconfig", &[iface, "channel", &ch])?;
        run("ifconfig", &[iface, "up"]).map(drop)
    }

    fn set_channel(&self, iface: &str, channel: u8) -> io::Result<()> {
        log::debug!("Setting channel {channel} on {iface}");
        let ch = channel.to_string();
        run("ifconfig", &[iface, "down"])?;
        let res = run("ifconfig", &[iface, "channel", &ch]).map(drop);
        run("ifconfig", &[iface, "up"])?;
        res
    }

    fn disable_monitor_mode(&self, iface: &str) -> io::Result<()> {
        log::info!("Removing monitor mode on {iface}");
        let _ = run("ifconfig", &[iface, "down"]);
        let _ = run("ifconfig", &[iface, "-monitor"]);
        let _ = run("ifconfig", &[iface, "up"]);

        log::info!("Cycling Wi-Fi power to re-associate");
        let _ = run("networksetup", &["-setairportpower", iface, "off"]);
        thread::sleep(Duration::from_secs(1));
        let _ = run("networksetup", &["-setairportpower", iface, "on"]);
        Ok(())
    }
}
