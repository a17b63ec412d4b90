//! Six-octet hardware (MAC) addresses.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Error returned when a MAC address string cannot be parsed.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid MAC address '{0}'")]
pub struct MacParseError(pub String);

/// A 48-bit IEEE 802 hardware address.
///
/// Displayed the way the provisioning protocol expects it: six upper-case
/// hex octets joined by `-`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// All-zero addresses belong to loopback and virtual devices.
    pub fn is_unset(&self) -> bool {
        self.0 == [0; 6]
    }

    /// Bit 1 of the first octet marks a locally administered address
    /// (randomised, bridge, or container interfaces).
    pub fn is_locally_administered(&self) -> bool {
        self.0[0] & 0x02 != 0
    }

    /// `true` for addresses that identify real hardware.
    pub fn is_universal(&self) -> bool {
        !self.is_unset() && !self.is_locally_administered()
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}-{b:02X}-{c:02X}-{d:02X}-{e:02X}-{g:02X}")
    }
}

impl FromStr for MacAddress {
    type Err = MacParseError;

    /// Accepts `:` or `-` separated hex octets in either case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || MacParseError(s.to_string());
        let mut octets = [0u8; 6];
        let mut parts = s.trim().split([':', '-']);
        for slot in &mut octets {
            let part = parts.next().ok_or_else(err)?;
            if part.len() != 2 {
                return Err(err());
            }
            *slot = u8::from_str_radix(part, 16).map_err(|_| err())?;
        }
        if parts.next().is_some() {
            return Err(err());
        }
        Ok(Self(octets))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_uses_all_six_distinct_octets() {
        let mac = MacAddress::new([0x00, 0x1A, 0x2B, 0x3C, 0x4D, 0x5E]);
        assert_eq!(mac.to_string(), "00-1A-2B-3C-4D-5E");
    }

    #[test]
    fn test_locally_administered_bit_is_detected() {
        assert!(MacAddress::new([0x02, 0, 0, 0, 0, 1]).is_locally_administered());
        assert!(MacAddress::new([0xDA, 0x11, 0x22, 0x33, 0x44, 0x55]).is_locally_administered());
        assert!(!MacAddress::new([0x00, 0x1A, 0x2B, 0x3C, 0x4D, 0x5E]).is_locally_administered());
    }

    #[test]
    fn test_is_universal_excludes_unset_and_local() {
        assert!(!MacAddress::new([0; 6]).is_universal());
        assert!(!MacAddress::new([0x06, 1, 2, 3, 4, 5]).is_universal());
        assert!(MacAddress::new([0x3C, 0x22, 0xFB, 0x01, 0x02, 0x03]).is_universal());
    }

    #[test]
    fn test_parse_sysfs_and_wire_forms() {
        let expected = MacAddress::new([0x3C, 0x22, 0xFB, 0x01, 0x02, 0xAB]);
        assert_eq!("3c:22:fb:01:02:ab".parse::<MacAddress>().unwrap(), expected);
        assert_eq!("3C-22-FB-01-02-AB\n".parse::<MacAddress>().unwrap(), expected);
    }

    #[test]
    fn test_parse_rejects_wrong_length() {
        assert!("3c:22:fb:01:02".parse::<MacAddress>().is_err());
        assert!("3c:22:fb:01:02:ab:cd".parse::<MacAddress>().is_err());
        assert!("3c:22:fb:01:02:zz".parse::<MacAddress>().is_err());
    }
}
