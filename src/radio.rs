//! Radio abstraction and the libpcap-backed implementation.
//!
//! The session only ever talks to a [`Radio`]; tests substitute a
//! recording fake.

use std::time::Duration;

use pcap::{Active, Capture, Device, Linktype};

use crate::error::{Error, Result};
use crate::platform::WifiMonitor;
use crate::radiotap::{self, DLT_IEEE802_11, DLT_IEEE802_11_RADIO, TX_HEADER};

/// Largest 802.11 frame the receive path hands to the parsers.
pub const MAX_FRAME_LEN: usize = 2346;

/// One frame copied into the caller's buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Received {
    pub len: usize,
    pub rssi: i8,
}

pub trait Radio {
    fn set_channel(&mut self, channel: u8) -> Result<()>;

    /// Frames are dropped at the radio while promiscuous receive is off.
    fn set_promiscuous(&mut self, enabled: bool) -> Result<()>;

    /// Inject a bare 802.11 frame.
    fn transmit_raw(&mut self, frame: &[u8]) -> Result<()>;

    /// Copy the next bare 802.11 frame into `buf`. `Ok(None)` on timeout or
    /// when the packet carried no usable frame.
    fn receive(&mut self, buf: &mut [u8]) -> Result<Option<Received>>;
}

pub struct PcapRadio {
    iface: String,
    cap: Capture<Active>,
    dlt: i32,
    monitor: Box<dyn WifiMonitor + Send>,
    promiscuous: bool,
    tx_buf: Vec<u8>,
}

impl PcapRadio {
    /// Open `iface` (already in monitor mode) for radiotap capture.
    pub fn open(
        iface: &str,
        read_timeout: Duration,
        monitor: Box<dyn WifiMonitor + Send>,
    ) -> Result<Self> {
        let inactive = Capture::from_device(Device::from(iface))?
            .promisc(true)
            .snaplen(65535)
            .timeout(read_timeout.as_millis().clamp(1, i32::MAX as u128) as i32)
            .immediate_mode(true);

        log::info!("Requesting monitor mode (rfmon) via libpcap.");
        let mut cap = inactive.rfmon(true).open()?;

        let available: Vec<_> = cap
            .list_datalinks()
            .unwrap_or_default()
            .iter()
            .map(|l| (l.0, dlt_name(l.0)))
            .collect();
        log::info!("Available datalink types: {:?}", available);

        if let Err(e) = cap.set_datalink(Linktype(DLT_IEEE802_11_RADIO)) {
            log::debug!("Could not set DLT_IEEE802_11_RADIO (127): {e}");
            if let Err(e2) = cap.set_datalink(Linktype(DLT_IEEE802_11)) {
                log::debug!("Could not set DLT_IEEE802_11 (105): {e2}");
            }
        }

        let dlt = cap.get_datalink().0;
        log::info!("Active datalink type: {} ({})", dlt, dlt_name(dlt));
        if dlt != DLT_IEEE802_11_RADIO && dlt != DLT_IEEE802_11 {
            return Err(Error::UnsupportedDatalink { dlt, name: dlt_name(dlt) });
        }

        Ok(Self {
            iface: iface.to_string(),
            cap,
            dlt,
            monitor,
            promiscuous: true,
            tx_buf: Vec::with_capacity(TX_HEADER.len() + MAX_FRAME_LEN),
        })
    }
}

impl Radio for PcapRadio {
    fn set_channel(&mut self, channel: u8) -> Result<()> {
        self.monitor
            .set_channel(&self.iface, channel)
            .map_err(|e| Error::Monitor(e.to_string()))
    }

    fn set_promiscuous(&mut self, enabled: bool) -> Result<()> {
        self.promiscuous = enabled;
        Ok(())
    }

    fn transmit_raw(&mut self, frame: &[u8]) -> Result<()> {
        self.tx_buf.clear();
        self.tx_buf.extend_from_slice(&TX_HEADER);
        self.tx_buf.extend_from_slice(frame);
        self.cap.sendpacket(self.tx_buf.as_slice())?;
        Ok(())
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<Option<Received>> {
        match self.cap.next_packet() {
            Ok(_) if !self.promiscuous => Ok(None),
            Ok(packet) => {
                let Some((frame, rssi)) = radiotap::strip(packet.data, self.dlt) else {
                    return Ok(None);
                };
                let len = frame.len().min(buf.len());
                buf[..len].copy_from_slice(&frame[..len]);
                Ok(Some(Received { len, rssi }))
            }
            Err(pcap::Error::TimeoutExpired) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// List all pcap-visible interfaces with their descriptions.
pub fn list_interfaces() -> Result<()> {
    let devices = Device::list()?;
    if devices.is_empty() {
        println!("  No capture interfaces found. Is libpcap installed?");
        return Ok(());
    }
    println!("\n  {:<6} {:<45} {}", "#", "Name", "Description");
    println!("  {}", "-".repeat(90));
    for (i, dev) in devices.iter().enumerate() {
        let desc = dev.desc.as_deref().unwrap_or("(no description)");
        println!("  {:<6} {:<45} {}", i, dev.name, desc);
    }
    println!();
    Ok(())
}

/// Human-readable name for common DLT values.
pub fn dlt_name(dlt: i32) -> &'static str {
    match dlt {
        0 => "NULL/Loopback",
        1 => "Ethernet (EN10MB)",
        105 => "IEEE 802.11 (raw)",
        119 => "IEEE 802.11 PrismHeader",
        127 => "IEEE 802.11 Radiotap",
        _ => "Unknown",
    }
}
