//! 802.11 beacon and data frame parsing.
//!
//! Every read goes through [`Cursor`], which fails closed: a short buffer
//! yields `None` instead of touching bytes past the declared length. Nothing
//! in here logs; malformed frames are the normal case on a noisy channel.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::features::WiFiFeatures;

// ---------------------------------------------------------------------------
// Addresses and names
// ---------------------------------------------------------------------------

/// 6-byte hardware address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    pub const BROADCAST: MacAddr = MacAddr([0xFF; 6]);

    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    /// Bit 1 of the first octet is the U/L bit (1 = locally administered,
    /// which is what randomized client addresses use).
    pub fn is_randomized(&self) -> bool {
        self.0[0] & 0x02 != 0
    }

    /// Upper-case hex without separators, as used in capture records.
    pub fn to_compact_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02X}")).collect()
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            m[0], m[1], m[2], m[3], m[4], m[5]
        )
    }
}

impl fmt::Debug for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for MacAddr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut out = [0u8; 6];
        let mut parts = s.split([':', '-']);
        for byte in out.iter_mut() {
            let part = parts
                .next()
                .ok_or_else(|| Error::invalid_value("mac", format!("{s:?} has fewer than 6 octets")))?;
            *byte = u8::from_str_radix(part, 16)
                .map_err(|_| Error::invalid_value("mac", format!("bad octet {part:?} in {s:?}")))?;
        }
        if parts.next().is_some() {
            return Err(Error::invalid_value("mac", format!("{s:?} has more than 6 octets")));
        }
        Ok(MacAddr(out))
    }
}

/// Maximum SSID length allowed by 802.11.
pub const SSID_MAX_LEN: usize = 32;

/// Network name stored inline so beacon handling never allocates.
/// Empty means hidden.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct Ssid {
    bytes: [u8; SSID_MAX_LEN],
    len: u8,
}

impl Ssid {
    /// `None` if `raw` is longer than 32 bytes.
    pub fn from_bytes(raw: &[u8]) -> Option<Self> {
        if raw.len() > SSID_MAX_LEN {
            return None;
        }
        let mut bytes = [0u8; SSID_MAX_LEN];
        bytes[..raw.len()].copy_from_slice(raw);
        Some(Self {
            bytes,
            len: raw.len() as u8,
        })
    }

    /// Truncates to 32 bytes.
    pub fn new(name: &str) -> Self {
        let raw = name.as_bytes();
        let n = raw.len().min(SSID_MAX_LEN);
        Self::from_bytes(&raw[..n]).unwrap_or_default()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn to_str_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.as_bytes())
    }

    /// Name for display: the SSID, or `<hidden>`.
    pub fn display_name(&self) -> Cow<'_, str> {
        if self.is_empty() {
            Cow::Borrowed("<hidden>")
        } else {
            self.to_str_lossy()
        }
    }
}

impl fmt::Display for Ssid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_str_lossy())
    }
}

impl fmt::Debug for Ssid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_str_lossy())
    }
}

// ---------------------------------------------------------------------------
// Bounds-checked reader
// ---------------------------------------------------------------------------

/// Forward-only reader over a byte slice. A failed read leaves the position
/// unchanged and returns `None`.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Cursor positioned at `pos`, or `None` if `pos` is past the end.
    pub fn at(buf: &'a [u8], pos: usize) -> Option<Self> {
        (pos <= buf.len()).then_some(Self { buf, pos })
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn read_bytes(&mut self, n: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(n)?;
        let out = self.buf.get(self.pos..end)?;
        self.pos = end;
        Some(out)
    }

    pub fn read_array<const N: usize>(&mut self) -> Option<[u8; N]> {
        let raw = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(raw);
        Some(out)
    }

    pub fn read_u8(&mut self) -> Option<u8> {
        self.read_array::<1>().map(|[b]| b)
    }

    pub fn read_u16_le(&mut self) -> Option<u16> {
        self.read_array().map(u16::from_le_bytes)
    }

    pub fn read_u16_be(&mut self) -> Option<u16> {
        self.read_array().map(u16::from_be_bytes)
    }

    pub fn read_mac(&mut self) -> Option<MacAddr> {
        self.read_array().map(MacAddr)
    }

    pub fn skip(&mut self, n: usize) -> Option<()> {
        self.read_bytes(n).map(|_| ())
    }

    /// Everything from the current position to the end.
    pub fn rest(&mut self) -> &'a [u8] {
        let out = &self.buf[self.pos..];
        self.pos = self.buf.len();
        out
    }
}

/// Iterator over tag-length-value Information Elements. Stops (does not
/// skip) at the first element whose declared length runs past the buffer.
pub struct InformationElements<'a> {
    cursor: Cursor<'a>,
}

impl<'a> InformationElements<'a> {
    pub fn new(body: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(body),
        }
    }
}

impl<'a> Iterator for InformationElements<'a> {
    /// `(element id, element value)`
    type Item = (u8, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let mut ahead = self.cursor.clone();
        let element = ahead.read_array::<2>().and_then(|[id, len]| {
            ahead.read_bytes(len as usize).map(|value| (id, value))
        });
        match element {
            Some(e) => {
                self.cursor = ahead;
                Some(e)
            }
            None => {
                // Truncated or trailing garbage; consume nothing more.
                self.cursor = Cursor::at(self.cursor.buf, self.cursor.buf.len())?;
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Raw frames
// ---------------------------------------------------------------------------

/// Minimum 802.11 header (FC + Dur + Addr1 + Addr2 + Addr3 + SeqCtl).
pub const MAC_HEADER_LEN: usize = 24;

/// Header + timestamp(8) + interval(2) + capability(2).
pub const BEACON_MIN_LEN: usize = 36;

pub const DATA_FRAME_MIN_LEN: usize = 28;

const MGMT_SUBTYPE_BEACON: u8 = 0x08;

/// LLC/SNAP header carrying EtherType 0x888E (EAPOL).
pub const LLC_SNAP_EAPOL: [u8; 8] = [0xAA, 0xAA, 0x03, 0x00, 0x00, 0x00, 0x88, 0x8E];

/// Frame type from frame-control bits 2..3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Management,
    Control,
    Data,
    Extension,
}

impl FrameKind {
    pub fn from_frame_control(fc0: u8) -> Self {
        match (fc0 >> 2) & 0x03 {
            0 => FrameKind::Management,
            1 => FrameKind::Control,
            2 => FrameKind::Data,
            _ => FrameKind::Extension,
        }
    }
}

/// One received frame, borrowed from the capture buffer.
#[derive(Debug, Clone, Copy)]
pub struct RawFrame<'a> {
    bytes: &'a [u8],
    pub rssi: i8,
}

impl<'a> RawFrame<'a> {
    /// `len` is the length reported by the radio; it is clamped to the
    /// buffer so nothing past it is ever visible to the parsers.
    pub fn new(buf: &'a [u8], len: usize, rssi: i8) -> Self {
        Self {
            bytes: &buf[..len.min(buf.len())],
            rssi,
        }
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn kind(&self) -> Option<FrameKind> {
        self.bytes.first().map(|&fc0| FrameKind::from_frame_control(fc0))
    }

    pub fn is_beacon(&self) -> bool {
        match self.bytes.first() {
            Some(&fc0) => {
                FrameKind::from_frame_control(fc0) == FrameKind::Management
                    && (fc0 >> 4) & 0x0F == MGMT_SUBTYPE_BEACON
            }
            None => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Beacons
// ---------------------------------------------------------------------------

pub mod element {
    pub const SSID: u8 = 0;
    pub const SUPPORTED_RATES: u8 = 1;
    pub const DS_PARAMETER_SET: u8 = 3;
    pub const HT_CAPABILITIES: u8 = 45;
    pub const RSN: u8 = 48;
    pub const VHT_CAPABILITIES: u8 = 191;
    pub const VENDOR_SPECIFIC: u8 = 221;
}

/// Everything we keep from one beacon.
#[derive(Debug, Clone, Copy)]
pub struct BeaconDescriptor {
    pub bssid: MacAddr,
    /// Empty for hidden networks.
    pub ssid: Ssid,
    /// Channel from the DS Parameter Set, 0 if the element was absent.
    pub channel: u8,
    pub rssi: i8,
    pub features: WiFiFeatures,
}

impl BeaconDescriptor {
    pub fn is_hidden(&self) -> bool {
        self.features.is_hidden
    }
}

/// Parse a beacon frame. `None` for anything shorter than the fixed fields.
pub fn parse_beacon(buf: &[u8], rssi: i8) -> Option<BeaconDescriptor> {
    if buf.len() < BEACON_MIN_LEN {
        return None;
    }

    let mut header = Cursor::at(buf, 16)?;
    let bssid = header.read_mac()?;

    let mut fixed = Cursor::at(buf, 32)?;
    let beacon_interval = fixed.read_u16_le()?;
    let capability = fixed.read_u16_le()?;

    let mut features = WiFiFeatures::from_fixed_fields(rssi, beacon_interval, capability);
    let mut ssid = Ssid::default();
    let mut channel = 0u8;

    for (id, value) in InformationElements::new(&buf[BEACON_MIN_LEN..]) {
        match id {
            element::SSID => {
                if value.first().map_or(true, |&b| b == 0) {
                    features.is_hidden = true;
                } else if let Some(name) = Ssid::from_bytes(value) {
                    ssid = name;
                }
            }
            element::DS_PARAMETER_SET => {
                if let [ch] = value {
                    channel = *ch;
                }
            }
            _ => features.record_element(id, value),
        }
    }
    features.channel = channel;
    features.finish();

    Some(BeaconDescriptor {
        bssid,
        ssid,
        channel,
        rssi,
        features,
    })
}

// ---------------------------------------------------------------------------
// Data frames
// ---------------------------------------------------------------------------

/// A data frame whose payload is EAPOL.
#[derive(Debug, Clone, Copy)]
pub struct DataFrameDescriptor<'a> {
    /// Address 2.
    pub transmitter: MacAddr,
    /// Address 1.
    pub receiver: MacAddr,
    pub rssi: i8,
    /// EAPOL PDU following the LLC/SNAP header.
    pub eapol: &'a [u8],
}

/// Header length of a data frame: 24, +6 for the fourth address when both
/// ToDS and FromDS are set, +2 for the QoS control field.
pub fn data_header_len(fc0: u8, fc1: u8) -> usize {
    let mut len = MAC_HEADER_LEN;
    let to_ds = fc1 & 0x01 != 0;
    let from_ds = fc1 & 0x02 != 0;
    if to_ds && from_ds {
        len += 6;
    }
    if fc0 & 0x80 != 0 && fc0 & 0x08 != 0 {
        len += 2;
    }
    len
}

/// Parse a data frame carrying EAPOL. Anything else yields `None`.
pub fn parse_data_frame(buf: &[u8], rssi: i8) -> Option<DataFrameDescriptor<'_>> {
    if buf.len() < DATA_FRAME_MIN_LEN {
        return None;
    }

    let mut cur = Cursor::new(buf);
    let [fc0, fc1] = cur.read_array()?;
    cur.skip(2)?;
    let receiver = cur.read_mac()?;
    let transmitter = cur.read_mac()?;

    let mut payload = Cursor::at(buf, data_header_len(fc0, fc1))?;
    if payload.read_bytes(LLC_SNAP_EAPOL.len())? != LLC_SNAP_EAPOL {
        return None;
    }

    Some(DataFrameDescriptor {
        transmitter,
        receiver,
        rssi,
        eapol: payload.rest(),
    })
}
