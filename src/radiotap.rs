//! Radiotap header handling for monitor-mode capture and injection.

/// pcap datalink: radiotap + 802.11.
pub const DLT_IEEE802_11_RADIO: i32 = 127;
/// pcap datalink: bare 802.11, no signal information.
pub const DLT_IEEE802_11: i32 = 105;

/// Minimal header prepended to injected frames: version 0, length 8, no
/// fields. The driver picks rate and power.
pub const TX_HEADER: [u8; 8] = [0x00, 0x00, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00];

/// Flags field bit: frame includes a trailing 4-byte FCS.
const FLAG_FCS: u8 = 0x10;
const FCS_LEN: usize = 4;

/// RSSI reported when the capture carries no signal field.
pub const UNKNOWN_RSSI: i8 = -100;

const PRESENT_EXT: u32 = 1 << 31;

/// Field metadata: (bit index, size in bytes, alignment).
const FIELDS: &[(u8, usize, usize)] = &[
    (0, 8, 8),  // TSFT
    (1, 1, 1),  // Flags
    (2, 1, 1),  // Rate
    (3, 4, 2),  // Channel (freq u16 + flags u16)
    (4, 2, 1),  // FHSS
    (5, 1, 1),  // Antenna Signal dBm
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RadiotapInfo {
    /// Offset where the 802.11 frame begins.
    pub header_len: usize,
    pub flags: u8,
    pub signal_dbm: Option<i8>,
}

impl RadiotapInfo {
    pub fn has_fcs(&self) -> bool {
        self.flags & FLAG_FCS != 0
    }
}

fn align_up(offset: usize, align: usize) -> usize {
    (offset + align - 1) & !(align - 1)
}

pub fn parse(data: &[u8]) -> Option<RadiotapInfo> {
    if data.len() < 8 {
        return None;
    }
    if data[0] != 0 {
        log::warn!("Unsupported radiotap version {}", data[0]);
        return None;
    }
    let header_len = u16::from_le_bytes([data[2], data[3]]) as usize;
    if header_len < 8 || data.len() < header_len {
        return None;
    }
    let present = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);

    // Skip any extended present words.
    let mut offset = 8;
    let mut word = present;
    while word & PRESENT_EXT != 0 {
        if offset + 4 > header_len {
            return None;
        }
        word = u32::from_le_bytes([
            data[offset],
            data[offset + 1],
            data[offset + 2],
            data[offset + 3],
        ]);
        offset += 4;
    }

    let mut info = RadiotapInfo {
        header_len,
        ..RadiotapInfo::default()
    };

    for &(bit, size, align) in FIELDS {
        if present & (1 << bit) == 0 {
            continue;
        }
        offset = align_up(offset, align);
        if offset + size > header_len {
            break;
        }
        match bit {
            1 => info.flags = data[offset],
            5 => info.signal_dbm = Some(data[offset] as i8),
            _ => {}
        }
        offset += size;
    }

    Some(info)
}

/// Remove the link-layer header (and trailing FCS) from a captured packet.
/// Returns the bare 802.11 frame and its RSSI.
pub fn strip(data: &[u8], dlt: i32) -> Option<(&[u8], i8)> {
    match dlt {
        DLT_IEEE802_11_RADIO => {
            let rt = parse(data)?;
            let mut end = data.len();
            if rt.has_fcs() {
                end = end.checked_sub(FCS_LEN)?.max(rt.header_len);
            }
            Some((&data[rt.header_len..end], rt.signal_dbm.unwrap_or(UNKNOWN_RSSI)))
        }
        DLT_IEEE802_11 => Some((data, UNKNOWN_RSSI)),
        _ => {
            log::debug!("Unsupported datalink type {dlt}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Flags + Channel + Signal, as most drivers emit.
    fn header(flags: u8, freq: u16, signal: i8) -> Vec<u8> {
        let mut h = vec![0x00, 0x00, 0x00, 0x00];
        h.extend_from_slice(&((1u32 << 1) | (1 << 3) | (1 << 5)).to_le_bytes());
        h.push(flags); // offset 8
        h.push(0); // pad to 2-byte alignment for Channel
        h.extend_from_slice(&freq.to_le_bytes());
        h.extend_from_slice(&0u16.to_le_bytes());
        h.push(signal as u8);
        let len = h.len() as u16;
        h[2..4].copy_from_slice(&len.to_le_bytes());
        h
    }

    #[test]
    fn reads_signal_past_aligned_channel_field() {
        let h = header(0, 2437, -42);
        let info = parse(&h).unwrap();
        assert_eq!(info.header_len, h.len());
        assert_eq!(info.signal_dbm, Some(-42));
        assert!(!info.has_fcs());
    }

    #[test]
    fn strip_removes_header_and_fcs() {
        let mut pkt = header(FLAG_FCS, 2412, -60);
        pkt.extend_from_slice(&[0x80, 0x00, 0xAA, 0xBB]);
        pkt.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        let (frame, rssi) = strip(&pkt, DLT_IEEE802_11_RADIO).unwrap();
        assert_eq!(frame, &[0x80, 0x00, 0xAA, 0xBB]);
        assert_eq!(rssi, -60);
    }

    #[test]
    fn raw_dot11_passes_through() {
        let pkt = [0x80, 0x00, 0x01];
        assert_eq!(strip(&pkt, DLT_IEEE802_11), Some((&pkt[..], UNKNOWN_RSSI)));
        assert_eq!(strip(&pkt, 1), None);
    }

    #[test]
    fn rejects_bad_headers() {
        assert!(parse(&[0, 0, 8]).is_none());
        assert!(parse(&[1, 0, 8, 0, 0, 0, 0, 0]).is_none());
        // Declared length past the buffer.
        assert!(parse(&[0, 0, 32, 0, 0, 0, 0, 0]).is_none());
        assert_eq!(parse(&TX_HEADER).map(|i| i.header_len), Some(8));
    }
}
