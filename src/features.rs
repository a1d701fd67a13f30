//! Per-beacon feature summary attached to each tracked network.

use std::fmt;

use crate::parser::{element, Cursor};

/// Noise floor assumed when the radio does not report one (dBm).
pub const ASSUMED_NOISE_DBM: i8 = -95;

const CAP_ESS: u16 = 0x0001;
const CAP_PRIVACY: u16 = 0x0010;

const OUI_MICROSOFT: [u8; 3] = [0x00, 0x50, 0xF2];
const MS_TYPE_WPA: u8 = 0x01;
const MS_TYPE_WPS: u8 = 0x04;

const OUI_IEEE: [u8; 3] = [0x00, 0x0F, 0xAC];
const AKM_SAE: u8 = 8;
const AKM_FT_SAE: u8 = 9;

/// Strongest security advertised by the beacon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Security {
    #[default]
    Open,
    Wep,
    Wpa,
    Wpa2,
    Wpa3,
}

impl fmt::Display for Security {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Security::Open => "OPEN",
            Security::Wep => "WEP",
            Security::Wpa => "WPA",
            Security::Wpa2 => "WPA2",
            Security::Wpa3 => "WPA3",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WiFiFeatures {
    pub rssi: i8,
    pub noise: i8,
    pub snr: f32,
    pub channel: u8,
    /// Time units (1.024 ms).
    pub beacon_interval: u16,
    pub capability: u16,
    pub is_hidden: bool,
    pub has_wps: bool,
    pub has_wpa: bool,
    pub has_wpa2: bool,
    pub has_wpa3: bool,
    pub vendor_ie_count: u8,
    /// Length of the Supported Rates element.
    pub supported_rates: u8,
    pub ht_capable: bool,
    pub vht_capable: bool,
    pub security: Security,
}

impl WiFiFeatures {
    /// Seed from the fixed beacon fields. A cleared ESS bit is the fallback
    /// hidden signal; the SSID element can only add to it.
    pub fn from_fixed_fields(rssi: i8, beacon_interval: u16, capability: u16) -> Self {
        Self {
            rssi,
            noise: ASSUMED_NOISE_DBM,
            snr: f32::from(rssi) - f32::from(ASSUMED_NOISE_DBM),
            beacon_interval,
            capability,
            is_hidden: capability & CAP_ESS == 0,
            ..Self::default()
        }
    }

    /// Fold one Information Element into the summary. SSID and DS Parameter
    /// Set are handled by the beacon parser.
    pub fn record_element(&mut self, id: u8, value: &[u8]) {
        match id {
            element::SUPPORTED_RATES => self.supported_rates = value.len() as u8,
            element::HT_CAPABILITIES => self.ht_capable = true,
            element::VHT_CAPABILITIES => self.vht_capable = true,
            element::RSN => {
                self.has_wpa2 = true;
                if rsn_has_sae(value) {
                    self.has_wpa3 = true;
                }
            }
            element::VENDOR_SPECIFIC => {
                self.vendor_ie_count = self.vendor_ie_count.saturating_add(1);
                if let [a, b, c, kind, ..] = *value {
                    if [a, b, c] == OUI_MICROSOFT {
                        match kind {
                            MS_TYPE_WPS => self.has_wps = true,
                            MS_TYPE_WPA => self.has_wpa = true,
                            _ => {}
                        }
                    }
                }
            }
            _ => {}
        }
    }

    /// Derive `security` once all elements are seen.
    pub fn finish(&mut self) {
        self.security = if self.has_wpa3 {
            Security::Wpa3
        } else if self.has_wpa2 {
            Security::Wpa2
        } else if self.has_wpa {
            Security::Wpa
        } else if self.capability & CAP_PRIVACY != 0 {
            Security::Wep
        } else {
            Security::Open
        };
    }
}

/// Whether an RSN element lists an SAE AKM suite.
///
/// Layout: version(2) group(4) pairwise_count(2) pairwise(4n) akm_count(2)
/// akm(4m). A truncated element simply reports `false`.
fn rsn_has_sae(value: &[u8]) -> bool {
    fn walk(cur: &mut Cursor<'_>) -> Option<bool> {
        cur.skip(2 + 4)?;
        let pairwise = cur.read_u16_le()? as usize;
        cur.skip(pairwise.checked_mul(4)?)?;
        let akms = cur.read_u16_le()?;
        for _ in 0..akms {
            let [a, b, c, kind] = cur.read_array()?;
            if [a, b, c] == OUI_IEEE && (kind == AKM_SAE || kind == AKM_FT_SAE) {
                return Some(true);
            }
        }
        Some(false)
    }
    walk(&mut Cursor::new(value)).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_beacon;
    use crate::parser::tests::{beacon_with_elements, AP};

    fn rsn(akm: u8) -> Vec<u8> {
        let mut v = vec![element::RSN, 20, 1, 0];
        v.extend_from_slice(&[0x00, 0x0F, 0xAC, 0x04]);
        v.extend_from_slice(&[1, 0, 0x00, 0x0F, 0xAC, 0x04]);
        v.extend_from_slice(&[1, 0, 0x00, 0x0F, 0xAC, akm]);
        v.extend_from_slice(&[0, 0]);
        v
    }

    #[test]
    fn wps_vendor_element() {
        let ies = [221u8, 4, 0x00, 0x50, 0xF2, 0x04, 221, 3, 0x00, 0x50, 0xF2];
        let b = parse_beacon(&beacon_with_elements(AP, 0x0011, &ies), -60).unwrap();
        assert!(b.features.has_wps);
        assert_eq!(b.features.vendor_ie_count, 2);
    }

    #[test]
    fn capability_elements() {
        let ies = [1u8, 4, 0x82, 0x84, 0x8B, 0x96, 45, 2, 0, 0, 191, 1, 0];
        let b = parse_beacon(&beacon_with_elements(AP, 0x0001, &ies), -60).unwrap();
        assert_eq!(b.features.supported_rates, 4);
        assert!(b.features.ht_capable);
        assert!(b.features.vht_capable);
        assert_eq!(b.features.security, Security::Open);
    }

    #[test]
    fn security_classification() {
        let b = parse_beacon(&beacon_with_elements(AP, 0x0011, &rsn(2)), -60).unwrap();
        assert_eq!(b.features.security, Security::Wpa2);

        let b = parse_beacon(&beacon_with_elements(AP, 0x0011, &rsn(8)), -60).unwrap();
        assert_eq!(b.features.security, Security::Wpa3);

        let b = parse_beacon(&beacon_with_elements(AP, 0x0011, &[]), -60).unwrap();
        assert_eq!(b.features.security, Security::Wep);

        let wpa = [221u8, 4, 0x00, 0x50, 0xF2, 0x01];
        let b = parse_beacon(&beacon_with_elements(AP, 0x0011, &wpa), -60).unwrap();
        assert_eq!(b.features.security, Security::Wpa);
    }

    #[test]
    fn truncated_rsn_is_plain_wpa2() {
        assert!(!rsn_has_sae(&[1, 0, 0x00, 0x0F]));
        let ies = [element::RSN, 2, 1, 0];
        let b = parse_beacon(&beacon_with_elements(AP, 0x0011, &ies), -60).unwrap();
        assert_eq!(b.features.security, Security::Wpa2);
    }

    #[test]
    fn snr_uses_assumed_noise_floor() {
        let f = WiFiFeatures::from_fixed_fields(-40, 100, CAP_ESS);
        assert_eq!(f.snr, 55.0);
        assert!(!f.is_hidden);
    }
}
