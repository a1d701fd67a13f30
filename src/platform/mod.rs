//! Platform-specific WiFi monitor-mode helpers.

#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(target_os = "macos")]
pub mod macos;

use std::io;
use std::process::Command;

/// Trait that each platform module implements.
pub trait WifiMonitor {
    /// Detect (or confirm) the WiFi interface name.
    fn detect_interface(&self) -> io::Result<String>;

    /// Put the interface into monitor mode on the given channel.
    fn enable_monitor_mode(&self, iface: &str, channel: u8) -> io::Result<()>;

    /// Retune an interface that is already in monitor mode.
    fn set_channel(&self, iface: &str, channel: u8) -> io::Result<()>;

    /// Restore the interface to managed (normal) mode.
    fn disable_monitor_mode(&self, iface: &str) -> io::Result<()>;
}

/// Return the platform-appropriate [`WifiMonitor`].
pub fn create_monitor() -> Box<dyn WifiMonitor + Send> {
    #[cfg(target_os = "linux")]
    {
        Box::new(linux::LinuxMonitor::new())
    }
    #[cfg(target_os = "macos")]
    {
        Box::new(macos::MacOsMonitor::new())
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        compile_error!("Unsupported platform: only Linux and macOS are supported");
    }
}

/// Run a command, returning an `io::Error` on non-zero exit.
pub(crate) fn run(cmd: &str, args: &[&str]) -> io::Result<String> {
    let output = Command::new(cmd).args(args).output()?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(io::Error::new(
            io::ErrorKind::Other,
            format!("`{cmd} {}` failed: {}", args.join(" "), stderr.trim()),
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
