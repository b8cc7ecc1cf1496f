//! 48-bit RDM device identifiers (manufacturer id + device id).

use crate::error::{DmxNetError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// An RDM UID: a 16-bit manufacturer id and a 32-bit device id.
///
/// Ordering is lexicographic on `(manufacturer_id, device_id)`, matching the
/// wire encoding (2 big-endian bytes of manufacturer, then 4 big-endian
/// bytes of device).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Uid {
    pub manufacturer_id: u16,
    pub device_id: u32,
}

impl Uid {
    pub const MIN: Uid = Uid {
        manufacturer_id: 0x0000,
        device_id: 0x0000_0000,
    };

    pub const MAX: Uid = Uid {
        manufacturer_id: 0xFFFF,
        device_id: 0xFFFF_FFFF,
    };

    pub fn new(manufacturer_id: u16, device_id: u32) -> Self {
        Self {
            manufacturer_id,
            device_id,
        }
    }

    /// Packs this UID into the 64-bit integer `(manu << 32) | dev`, as
    /// spec §9 recommends over arbitrary-precision arithmetic.
    pub fn to_u64(self) -> u64 {
        ((self.manufacturer_id as u64) << 32) | (self.device_id as u64)
    }

    pub fn from_u64(v: u64) -> Self {
        Self {
            manufacturer_id: (v >> 32) as u16,
            device_id: v as u32,
        }
    }

    /// 6-byte big-endian wire encoding.
    pub fn to_bytes(self) -> [u8; 6] {
        let manu = self.manufacturer_id.to_be_bytes();
        let dev = self.device_id.to_be_bytes();
        [manu[0], manu[1], dev[0], dev[1], dev[2], dev[3]]
    }

    pub fn from_bytes(b: &[u8]) -> Result<Self> {
        if b.len() != 6 {
            return Err(DmxNetError::range(format!(
                "UID must be exactly 6 bytes, got {}",
                b.len()
            )));
        }
        let manufacturer_id = u16::from_be_bytes([b[0], b[1]]);
        let device_id = u32::from_be_bytes([b[2], b[3], b[4], b[5]]);
        Ok(Self {
            manufacturer_id,
            device_id,
        })
    }

    /// Floor((lo+hi)/2) using 64-bit integer arithmetic. Fails if `hi < lo`.
    pub fn midpoint(lo: Uid, hi: Uid) -> Result<Uid> {
        if hi < lo {
            return Err(DmxNetError::range("midpoint: hi < lo"));
        }
        let mid = lo.to_u64() + (hi.to_u64() - lo.to_u64()) / 2;
        Ok(Uid::from_u64(mid))
    }

    /// Inclusive range containment.
    pub fn in_range(self, lo: Uid, hi: Uid) -> bool {
        lo <= self && self <= hi
    }

    /// Parses `"MMMM:DDDDDDDD"` (hex manufacturer, hex device), requiring
    /// exactly one `:`.
    pub fn parse(s: &str) -> Result<Uid> {
        let mut parts = s.split(':');
        let manu_s = parts
            .next()
            .ok_or_else(|| DmxNetError::range("missing manufacturer field"))?;
        let dev_s = parts
            .next()
            .ok_or_else(|| DmxNetError::range("missing device field"))?;
        if parts.next().is_some() {
            return Err(DmxNetError::range("UID string must contain exactly one ':'"));
        }
        let manufacturer_id = u16::from_str_radix(manu_s, 16)
            .map_err(|e| DmxNetError::range(format!("invalid manufacturer hex: {e}")))?;
        let device_id = u32::from_str_radix(dev_s, 16)
            .map_err(|e| DmxNetError::range(format!("invalid device hex: {e}")))?;
        Ok(Uid {
            manufacturer_id,
            device_id,
        })
    }
}

impl PartialOrd for Uid {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Uid {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.manufacturer_id, self.device_id).cmp(&(other.manufacturer_id, other.device_id))
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:08x}", self.manufacturer_id, self.device_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_lexicographic() {
        let a = Uid::new(1, 100);
        let b = Uid::new(1, 200);
        let c = Uid::new(2, 0);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn midpoint_is_between() {
        let lo = Uid::new(0, 0);
        let hi = Uid::new(0, 10);
        let mid = Uid::midpoint(lo, hi).unwrap();
        assert!(mid.in_range(lo, hi));
        assert_eq!(mid, Uid::new(0, 5));
    }

    #[test]
    fn midpoint_fails_when_hi_lt_lo() {
        let lo = Uid::new(0, 10);
        let hi = Uid::new(0, 0);
        assert!(Uid::midpoint(lo, hi).is_err());
    }

    #[test]
    fn round_trips_bytes() {
        let u = Uid::new(0x6574, 0x1234abcd);
        let bytes = u.to_bytes();
        assert_eq!(bytes, [0x65, 0x74, 0x12, 0x34, 0xab, 0xcd]);
        assert_eq!(Uid::from_bytes(&bytes).unwrap(), u);
    }

    #[test]
    fn display_format() {
        let u = Uid::new(0x6574, 0x1234abcd);
        assert_eq!(u.to_string(), "6574:1234abcd");
    }

    #[test]
    fn parse_requires_single_colon() {
        assert!(Uid::parse("6574:1234abcd").is_ok());
        assert!(Uid::parse("6574:1234abcd:extra").is_err());
        assert!(Uid::parse("6574").is_err());
    }

    #[test]
    fn min_max_constants() {
        assert_eq!(Uid::MIN, Uid::new(0, 0));
        assert_eq!(Uid::MAX, Uid::new(0xFFFF, 0xFFFF_FFFF));
    }
}
