//! Store keys: object-id keys and FDB entry keys.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::VswitchError;
use crate::mac::MacAddress;
use crate::oid::ObjectId;

/// Default VLAN for untagged traffic when a port has no explicit setting.
pub const DEFAULT_VLAN_ID: u16 = 1;

/// Key of a forwarding-database entry: (source MAC, VLAN id).
///
/// Total order is MAC bytes first, then VLAN id; the learned set and the
/// flush/aging scans rely on this being deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FdbKey {
    pub mac: MacAddress,
    pub vlan_id: u16,
}

impl FdbKey {
    pub fn new(mac: MacAddress, vlan_id: u16) -> Self {
        Self { mac, vlan_id }
    }
}

impl fmt::Display for FdbKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.mac, self.vlan_id)
    }
}

impl FromStr for FdbKey {
    type Err = VswitchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (mac, vlan) = s
            .split_once('@')
            .ok_or_else(|| VswitchError::InvalidArgument(format!("bad fdb key: {s}")))?;
        Ok(FdbKey {
            mac: mac.parse()?,
            vlan_id: vlan
                .parse()
                .map_err(|_| VswitchError::InvalidArgument(format!("bad fdb key: {s}")))?,
        })
    }
}

/// Serialized key of a store entry.
///
/// Most objects are addressed by their allocated object id; FDB entries are
/// addressed by (switch, MAC, VLAN). The `Display` form is the map key and
/// the warm-restart snapshot key, so it must never contain whitespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ObjectKey {
    Oid(ObjectId),
    Fdb { switch_id: ObjectId, key: FdbKey },
}

impl ObjectKey {
    pub fn oid(oid: ObjectId) -> Self {
        ObjectKey::Oid(oid)
    }

    pub fn fdb(switch_id: ObjectId, key: FdbKey) -> Self {
        ObjectKey::Fdb { switch_id, key }
    }

    /// The owning switch id encoded in the key.
    pub fn switch_id(&self) -> ObjectId {
        match self {
            ObjectKey::Oid(oid) => oid.switch_id(),
            ObjectKey::Fdb { switch_id, .. } => *switch_id,
        }
    }

    pub fn as_oid(&self) -> Option<ObjectId> {
        match self {
            ObjectKey::Oid(oid) => Some(*oid),
            ObjectKey::Fdb { .. } => None,
        }
    }

    pub fn as_fdb_key(&self) -> Option<FdbKey> {
        match self {
            ObjectKey::Oid(_) => None,
            ObjectKey::Fdb { key, .. } => Some(*key),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectKey::Oid(oid) => write!(f, "oid:{oid}"),
            ObjectKey::Fdb { switch_id, key } => write!(f, "fdb:{switch_id}:{key}"),
        }
    }
}

impl FromStr for ObjectKey {
    type Err = VswitchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(oid) = s.strip_prefix("oid:") {
            return Ok(ObjectKey::Oid(oid.parse()?));
        }
        if let Some(rest) = s.strip_prefix("fdb:") {
            let (switch, key) = rest
                .split_once(':')
                .ok_or_else(|| VswitchError::InvalidArgument(format!("bad object key: {s}")))?;
            return Ok(ObjectKey::Fdb {
                switch_id: switch.parse()?,
                key: key.parse()?,
            });
        }
        Err(VswitchError::InvalidArgument(format!("bad object key: {s}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_type::ObjectType;
    use pretty_assertions::assert_eq;

    fn mac(last: u8) -> MacAddress {
        MacAddress::new([0xaa, 0xbb, 0xcc, 0xdd, 0xee, last])
    }

    #[test]
    fn test_fdb_key_ordering_mac_then_vlan() {
        let a = FdbKey::new(mac(1), 200);
        let b = FdbKey::new(mac(2), 100);
        let c = FdbKey::new(mac(2), 200);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_fdb_key_round_trip() {
        let key = FdbKey::new(mac(1), 100);
        assert_eq!(key.to_string(), "aa:bb:cc:dd:ee:01@100");
        assert_eq!(key.to_string().parse::<FdbKey>().unwrap(), key);
    }

    #[test]
    fn test_object_key_round_trip() {
        let sw = ObjectId::construct(ObjectType::Switch, 0, 0, 0);
        let port = ObjectId::construct(ObjectType::Port, 0, 5, 0);

        let keys = [ObjectKey::oid(port), ObjectKey::fdb(sw, FdbKey::new(mac(7), 2))];
        for key in keys {
            let s = key.to_string();
            assert!(!s.contains(' '));
            assert_eq!(s.parse::<ObjectKey>().unwrap(), key);
        }
        assert!("bogus:1".parse::<ObjectKey>().is_err());
    }

    #[test]
    fn test_object_key_switch_id() {
        let sw = ObjectId::construct(ObjectType::Switch, 3, 3, 0);
        let vlan = ObjectId::construct(ObjectType::Vlan, 3, 9, 0);
        assert_eq!(ObjectKey::oid(vlan).switch_id(), sw);
        assert_eq!(ObjectKey::fdb(sw, FdbKey::new(mac(1), 1)).switch_id(), sw);
    }
}
