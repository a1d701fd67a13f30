//! EAPOL-Key classification for the WPA four-way handshake.
//!
//! Each frame is classified on its own from the key-information bits. There
//! is no nonce or replay-counter matching against an ongoing exchange, so a
//! "handshake" is just whatever messages share a BSSID/station pair.

use std::fmt;
use std::time::Instant;

use chrono::{DateTime, Utc};

use crate::parser::{Cursor, DataFrameDescriptor, MacAddr, Ssid};

/// version(1) + type(1) + body length(2)
pub const EAPOL_HEADER_LEN: usize = 4;

/// Shortest EAPOL-Key PDU we accept: header plus a key descriptor up to and
/// including the key-data length field.
pub const EAPOL_KEY_MIN_LEN: usize = 99;

/// Bytes of each EAPOL PDU kept in a capture record.
pub const MAX_KEY_DESCRIPTOR_LEN: usize = 512;

const EAPOL_TYPE_KEY: u8 = 3;

/// Key information sits after the header and the descriptor-type byte.
const KEY_INFO_OFFSET: usize = 5;

pub mod key_info {
    pub const INSTALL: u16 = 0x0040;
    pub const ACK: u16 = 0x0080;
    pub const MIC: u16 = 0x0100;
    pub const SECURE: u16 = 0x0200;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MessageNumber {
    M1 = 1,
    M2 = 2,
    M3 = 3,
    M4 = 4,
}

impl MessageNumber {
    /// Rules are tried in order M1, M2, M3, M4; the first match wins. A
    /// frame with Secure set and Install clear matches the M2 rule first, so
    /// the common M4 encoding (0x030A) is reported as M2.
    pub fn from_key_info(info: u16) -> Option<Self> {
        let install = info & key_info::INSTALL != 0;
        let ack = info & key_info::ACK != 0;
        let mic = info & key_info::MIC != 0;
        let secure = info & key_info::SECURE != 0;

        if ack && !mic {
            Some(MessageNumber::M1)
        } else if !ack && mic && !install {
            Some(MessageNumber::M2)
        } else if ack && mic && install {
            Some(MessageNumber::M3)
        } else if !ack && mic && secure {
            Some(MessageNumber::M4)
        } else {
            None
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// M1 and M3 travel AP → station; M2 and M4 station → AP.
    pub fn sent_by_ap(self) -> bool {
        matches!(self, MessageNumber::M1 | MessageNumber::M3)
    }
}

impl fmt::Display for MessageNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "M{}", self.as_u8())
    }
}

/// Why a frame did not produce a handshake message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decline {
    /// Too short for the header or for a key descriptor.
    Malformed,
    /// EAPOL, but not EAPOL-Key.
    NotKey,
    /// Key-information bits match no handshake message.
    Unclassified,
}

/// EAPOL PDU copied into a fixed buffer, truncated to 512 bytes.
#[derive(Clone, Copy)]
pub struct KeyDescriptor {
    bytes: [u8; MAX_KEY_DESCRIPTOR_LEN],
    len: u16,
}

impl KeyDescriptor {
    pub fn copy_from(raw: &[u8]) -> Self {
        let n = raw.len().min(MAX_KEY_DESCRIPTOR_LEN);
        let mut bytes = [0u8; MAX_KEY_DESCRIPTOR_LEN];
        bytes[..n].copy_from_slice(&raw[..n]);
        Self {
            bytes,
            len: n as u16,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl fmt::Debug for KeyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyDescriptor({} bytes)", self.len)
    }
}

/// One captured EAPOL-Key frame with the roles already resolved.
#[derive(Debug, Clone, Copy)]
pub struct HandshakeMessage {
    pub bssid: MacAddr,
    pub station: MacAddr,
    pub message: MessageNumber,
    pub payload: KeyDescriptor,
    pub captured_at: Instant,
    pub captured_wall: DateTime<Utc>,
    /// Looked up from the registry; empty if the AP was never seen beaconing.
    pub ssid: Ssid,
}

/// Message number of an EAPOL PDU, or why there is none.
pub fn classify(eapol: &[u8]) -> Result<MessageNumber, Decline> {
    let mut cur = Cursor::new(eapol);
    let [_version, packet_type, _, _] = cur.read_array().ok_or(Decline::Malformed)?;
    if packet_type != EAPOL_TYPE_KEY {
        return Err(Decline::NotKey);
    }
    if eapol.len() < EAPOL_KEY_MIN_LEN {
        return Err(Decline::Malformed);
    }

    let info = Cursor::at(eapol, KEY_INFO_OFFSET)
        .and_then(|mut c| c.read_u16_be())
        .ok_or(Decline::Malformed)?;
    MessageNumber::from_key_info(info).ok_or(Decline::Unclassified)
}

/// Turn an EAPOL-carrying data frame into a handshake record.
///
/// `resolve` maps the AP address to its SSID; a miss leaves the name empty.
pub fn correlate<F>(
    frame: &DataFrameDescriptor<'_>,
    now: Instant,
    resolve: F,
) -> Result<HandshakeMessage, Decline>
where
    F: FnOnce(&MacAddr) -> Option<Ssid>,
{
    let message = classify(frame.eapol)?;

    let (bssid, station) = if message.sent_by_ap() {
        (frame.transmitter, frame.receiver)
    } else {
        (frame.receiver, frame.transmitter)
    };

    Ok(HandshakeMessage {
        bssid,
        station,
        message,
        payload: KeyDescriptor::copy_from(frame.eapol),
        captured_at: now,
        captured_wall: Utc::now(),
        ssid: resolve(&bssid).unwrap_or_default(),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::parser::tests::{AP, STA};

    /// EAPOL-Key PDU of `len` bytes with the given key-information field.
    pub fn eapol_key(info: u16, len: usize) -> Vec<u8> {
        let mut v = vec![0u8; len];
        v[0] = 0x02;
        v[1] = EAPOL_TYPE_KEY;
        v[2..4].copy_from_slice(&((len.saturating_sub(4)) as u16).to_be_bytes());
        if len > 4 {
            v[4] = 0x02;
        }
        if len >= 7 {
            v[5..7].copy_from_slice(&info.to_be_bytes());
        }
        v
    }

    pub const M1_INFO: u16 = 0x008A;
    pub const M2_INFO: u16 = 0x010A;
    pub const M3_INFO: u16 = 0x13CA;
    pub const M4_INFO: u16 = 0x030A;

    fn frame(ta: [u8; 6], ra: [u8; 6], eapol: &[u8]) -> DataFrameDescriptor<'_> {
        DataFrameDescriptor {
            transmitter: MacAddr(ta),
            receiver: MacAddr(ra),
            rssi: -40,
            eapol,
        }
    }

    #[test]
    fn key_info_rules() {
        use key_info::*;
        assert_eq!(MessageNumber::from_key_info(ACK), Some(MessageNumber::M1));
        assert_eq!(MessageNumber::from_key_info(ACK | INSTALL | SECURE), Some(MessageNumber::M1));
        assert_eq!(MessageNumber::from_key_info(MIC), Some(MessageNumber::M2));
        assert_eq!(MessageNumber::from_key_info(ACK | MIC | INSTALL), Some(MessageNumber::M3));
        assert_eq!(MessageNumber::from_key_info(MIC | SECURE), Some(MessageNumber::M2));
        assert_eq!(MessageNumber::from_key_info(MIC | SECURE | INSTALL), Some(MessageNumber::M4));
        assert_eq!(MessageNumber::from_key_info(MIC | INSTALL), None);
        assert_eq!(MessageNumber::from_key_info(0), None);
        assert_eq!(MessageNumber::from_key_info(INSTALL | SECURE), None);
        assert_eq!(MessageNumber::from_key_info(ACK | MIC | SECURE), None);
    }

    #[test]
    fn real_world_key_info_values() {
        assert_eq!(classify(&eapol_key(M1_INFO, 121)), Ok(MessageNumber::M1));
        assert_eq!(classify(&eapol_key(M2_INFO, 121)), Ok(MessageNumber::M2));
        assert_eq!(classify(&eapol_key(M3_INFO, 155)), Ok(MessageNumber::M3));
        // Secure with Install clear hits the M2 rule before the M4 rule.
        assert_eq!(classify(&eapol_key(M4_INFO, 99)), Ok(MessageNumber::M2));
        let m4_with_install = M4_INFO | key_info::INSTALL;
        assert_eq!(classify(&eapol_key(m4_with_install, 99)), Ok(MessageNumber::M4));
    }

    #[test]
    fn length_and_type_checks() {
        assert_eq!(classify(&[0x02, 0x03, 0x00]), Err(Decline::Malformed));
        assert_eq!(classify(&eapol_key(M1_INFO, 98)), Err(Decline::Malformed));
        assert_eq!(classify(&eapol_key(M1_INFO, 99)), Ok(MessageNumber::M1));

        let mut start = eapol_key(0, 120);
        start[1] = 0x01;
        assert_eq!(classify(&start), Err(Decline::NotKey));
        assert_eq!(classify(&eapol_key(0, 120)), Err(Decline::Unclassified));
    }

    #[test]
    fn roles_follow_message_direction() {
        let m1 = eapol_key(M1_INFO, 121);
        let hs = correlate(&frame(AP, STA, &m1), Instant::now(), |_| None).unwrap();
        assert_eq!(hs.bssid, MacAddr(AP));
        assert_eq!(hs.station, MacAddr(STA));

        let m2 = eapol_key(M2_INFO, 121);
        let hs = correlate(&frame(STA, AP, &m2), Instant::now(), |_| None).unwrap();
        assert_eq!(hs.message, MessageNumber::M2);
        assert_eq!(hs.bssid, MacAddr(AP));
        assert_eq!(hs.station, MacAddr(STA));
        assert!(hs.ssid.is_empty());
    }

    #[test]
    fn ssid_is_resolved_from_ap_address() {
        let m2 = eapol_key(M2_INFO, 121);
        let hs = correlate(&frame(STA, AP, &m2), Instant::now(), |bssid| {
            (*bssid == MacAddr(AP)).then(|| Ssid::new("TestNet"))
        })
        .unwrap();
        assert_eq!(hs.ssid.to_string(), "TestNet");
    }

    #[test]
    fn payload_is_bounded() {
        let big = eapol_key(M1_INFO, 700);
        let hs = correlate(&frame(AP, STA, &big), Instant::now(), |_| None).unwrap();
        assert_eq!(hs.payload.len(), MAX_KEY_DESCRIPTOR_LEN);
        assert_eq!(hs.payload.as_bytes(), &big[..MAX_KEY_DESCRIPTOR_LEN]);
    }
}
