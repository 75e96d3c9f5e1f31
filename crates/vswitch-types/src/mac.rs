//! MAC address type.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::VswitchError;

/// A 48-bit Ethernet MAC address.
///
/// Ordering is lexicographic over the raw bytes; the FDB learned set relies
/// on this to keep deterministic membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MacAddress {
    bytes: [u8; 6],
}

impl MacAddress {
    /// The all-zero address, used as the consolidated-flush marker.
    pub const ZERO: MacAddress = MacAddress { bytes: [0; 6] };

    /// The broadcast address.
    pub const BROADCAST: MacAddress = MacAddress { bytes: [0xff; 6] };

    pub const fn new(bytes: [u8; 6]) -> Self {
        Self { bytes }
    }

    pub const fn as_bytes(&self) -> &[u8; 6] {
        &self.bytes
    }

    pub fn is_zero(&self) -> bool {
        self.bytes == [0; 6]
    }

    /// True for group (multicast/broadcast) addresses, which are never
    /// learned as FDB sources.
    pub fn is_multicast(&self) -> bool {
        self.bytes[0] & 0x01 != 0
    }

    /// Reads an address from the first six bytes of a frame slice.
    pub fn from_slice(data: &[u8]) -> Option<Self> {
        let bytes: [u8; 6] = data.get(..6)?.try_into().ok()?;
        Some(Self { bytes })
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.bytes[0], self.bytes[1], self.bytes[2], self.bytes[3], self.bytes[4], self.bytes[5]
        )
    }
}

impl FromStr for MacAddress {
    type Err = VswitchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 6];
        let mut parts = s.split(':');
        for byte in bytes.iter_mut() {
            let part = parts
                .next()
                .ok_or_else(|| VswitchError::InvalidArgument(format!("bad mac address: {s}")))?;
            *byte = u8::from_str_radix(part, 16)
                .map_err(|_| VswitchError::InvalidArgument(format!("bad mac address: {s}")))?;
        }
        if parts.next().is_some() {
            return Err(VswitchError::InvalidArgument(format!("bad mac address: {s}")));
        }
        Ok(Self { bytes })
    }
}

impl Serialize for MacAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MacAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_display_round_trip() {
        let mac = MacAddress::new([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x01]);
        assert_eq!(mac.to_string(), "aa:bb:cc:dd:ee:01");
        assert_eq!("aa:bb:cc:dd:ee:01".parse::<MacAddress>().unwrap(), mac);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("aa:bb:cc".parse::<MacAddress>().is_err());
        assert!("aa:bb:cc:dd:ee:zz".parse::<MacAddress>().is_err());
        assert!("aa:bb:cc:dd:ee:01:02".parse::<MacAddress>().is_err());
        assert!("".parse::<MacAddress>().is_err());
    }

    #[test]
    fn test_ordering_is_bytewise() {
        let a = MacAddress::new([0, 0, 0, 0, 0, 1]);
        let b = MacAddress::new([0, 0, 0, 0, 1, 0]);
        assert!(a < b);
        assert!(MacAddress::ZERO < a);
    }

    #[test]
    fn test_multicast_bit() {
        assert!(MacAddress::BROADCAST.is_multicast());
        assert!("01:00:5e:00:00:01".parse::<MacAddress>().unwrap().is_multicast());
        assert!(!"aa:bb:cc:dd:ee:01".parse::<MacAddress>().unwrap().is_multicast());
    }

    #[test]
    fn test_from_slice() {
        let frame = [0xde, 0xad, 0xbe, 0xef, 0x00, 0x01, 0xff];
        let mac = MacAddress::from_slice(&frame).unwrap();
        assert_eq!(mac.to_string(), "de:ad:be:ef:00:01");
        assert!(MacAddress::from_slice(&frame[..5]).is_none());
    }
}
