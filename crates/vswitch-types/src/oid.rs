//! 64-bit opaque object identifiers.
//!
//! Layout, most significant byte first:
//!
//! ```text
//! bits 63..56 - reserved (must be zero)
//! bits 55..48 - global context
//! bits 47..40 - switch index
//! bits 39..32 - object type
//! bits 31..0  - object index
//! ```
//!
//! Carrying the routing information inside the id avoids a side table from
//! id to switch/type; `object_type()` and `switch_id()` are called on every
//! API invocation and stay O(1) and lock-free.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::VswitchError;
use crate::object_type::ObjectType;

/// Raw 64-bit object id value.
pub type RawObjectId = u64;

pub const OBJECT_INDEX_BITS: u32 = 32;
pub const OBJECT_TYPE_BITS: u32 = 8;
pub const SWITCH_INDEX_BITS: u32 = 8;
pub const GLOBAL_CONTEXT_BITS: u32 = 8;

pub const OBJECT_INDEX_MAX: u64 = (1 << OBJECT_INDEX_BITS) - 1;
pub const OBJECT_TYPE_MAX: u64 = (1 << OBJECT_TYPE_BITS) - 1;
pub const SWITCH_INDEX_MAX: u64 = (1 << SWITCH_INDEX_BITS) - 1;
pub const GLOBAL_CONTEXT_MAX: u64 = (1 << GLOBAL_CONTEXT_BITS) - 1;

const OBJECT_TYPE_SHIFT: u32 = OBJECT_INDEX_BITS;
const SWITCH_INDEX_SHIFT: u32 = OBJECT_TYPE_SHIFT + OBJECT_TYPE_BITS;
const GLOBAL_CONTEXT_SHIFT: u32 = SWITCH_INDEX_SHIFT + SWITCH_INDEX_BITS;

/// An opaque 64-bit object handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ObjectId(RawObjectId);

impl ObjectId {
    /// The null object id.
    pub const NULL: ObjectId = ObjectId(0);

    pub const fn from_raw(raw: RawObjectId) -> Self {
        ObjectId(raw)
    }

    pub const fn as_raw(&self) -> RawObjectId {
        self.0
    }

    pub const fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// Builds an id from its fields. Callers validate ranges; the
    /// constructor masks to field width.
    pub fn construct(
        object_type: ObjectType,
        switch_index: u32,
        object_index: u64,
        global_context: u32,
    ) -> ObjectId {
        ObjectId(
            ((global_context as u64 & GLOBAL_CONTEXT_MAX) << GLOBAL_CONTEXT_SHIFT)
                | ((switch_index as u64 & SWITCH_INDEX_MAX) << SWITCH_INDEX_SHIFT)
                | (((object_type as u8) as u64) << OBJECT_TYPE_SHIFT)
                | (object_index & OBJECT_INDEX_MAX),
        )
    }

    /// Decodes the type field. The null id and out-of-range type fields
    /// decode to `ObjectType::Null`, never panic.
    pub fn object_type(&self) -> ObjectType {
        if self.is_null() {
            return ObjectType::Null;
        }
        ObjectType::from_u8(((self.0 >> OBJECT_TYPE_SHIFT) & OBJECT_TYPE_MAX) as u8)
    }

    pub fn object_index(&self) -> u32 {
        (self.0 & OBJECT_INDEX_MAX) as u32
    }

    pub fn switch_index(&self) -> u32 {
        ((self.0 >> SWITCH_INDEX_SHIFT) & SWITCH_INDEX_MAX) as u32
    }

    pub fn global_context(&self) -> u32 {
        ((self.0 >> GLOBAL_CONTEXT_SHIFT) & GLOBAL_CONTEXT_MAX) as u32
    }

    /// Rebuilds the owning switch id. A switch id is its own switch id;
    /// the null id and ids with an invalid type field yield `NULL`.
    pub fn switch_id(&self) -> ObjectId {
        match self.object_type() {
            ObjectType::Null => ObjectId::NULL,
            ObjectType::Switch => *self,
            _ => ObjectId::construct(
                ObjectType::Switch,
                self.switch_index(),
                self.switch_index() as u64,
                self.global_context(),
            ),
        }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016x}", self.0)
    }
}

impl FromStr for ObjectId {
    type Err = VswitchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s
            .strip_prefix("0x")
            .ok_or_else(|| VswitchError::InvalidArgument(format!("bad object id: {s}")))?;
        u64::from_str_radix(hex, 16)
            .map(ObjectId)
            .map_err(|_| VswitchError::InvalidArgument(format!("bad object id: {s}")))
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    // Field extraction self-check on a fixed pattern.
    const TEST_OID: ObjectId = ObjectId(0x0123_4567_89ab_cdef);

    #[test]
    fn test_field_extraction() {
        assert_eq!(TEST_OID.global_context(), 0x23);
        assert_eq!(TEST_OID.switch_index(), 0x45);
        assert_eq!((TEST_OID.as_raw() >> 32) & 0xff, 0x67);
        assert_eq!(TEST_OID.object_index(), 0x89ab_cdef);
    }

    #[test]
    fn test_construct_round_trip() {
        for (ty, swidx, idx, ctx) in [
            (ObjectType::Port, 0u32, 0u64, 0u32),
            (ObjectType::Vlan, 3, 1000, 7),
            (ObjectType::FdbEntry, 0xff, OBJECT_INDEX_MAX, 0xff),
        ] {
            let oid = ObjectId::construct(ty, swidx, idx, ctx);
            assert_eq!(oid.object_type(), ty);
            assert_eq!(oid.switch_index(), swidx);
            assert_eq!(oid.object_index() as u64, idx);
            assert_eq!(oid.global_context(), ctx);
        }
    }

    #[test]
    fn test_invalid_type_field_decodes_to_null() {
        // Type field 0x67 is out of range for ObjectType.
        assert_eq!(TEST_OID.object_type(), ObjectType::Null);
        assert_eq!(ObjectId::NULL.object_type(), ObjectType::Null);
        assert_eq!(TEST_OID.switch_id(), ObjectId::NULL);
    }

    #[test]
    fn test_switch_id_of_switch_is_itself() {
        let sw = ObjectId::construct(ObjectType::Switch, 2, 2, 0);
        assert_eq!(sw.switch_id(), sw);

        let port = ObjectId::construct(ObjectType::Port, 2, 17, 0);
        assert_eq!(port.switch_id(), sw);
    }

    #[test]
    fn test_display_round_trip() {
        let oid = ObjectId::construct(ObjectType::Bridge, 1, 42, 0);
        let s = oid.to_string();
        assert!(s.starts_with("0x"));
        assert_eq!(s.parse::<ObjectId>().unwrap(), oid);
        assert!("12345".parse::<ObjectId>().is_err());
    }
}
