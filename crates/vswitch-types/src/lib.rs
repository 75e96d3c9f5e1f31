//! Core types for the vswitch control-plane.
//!
//! This crate is the leaf of the workspace: it defines the vocabulary that
//! every other crate speaks, namely 64-bit object identifiers, object
//! types, typed attribute values, MAC addresses, FDB keys and the error
//! taxonomy.
//! It has no knowledge of the store, the event machinery or the forwarding
//! engine.

pub mod attr;
pub mod error;
pub mod key;
pub mod mac;
pub mod object_type;
pub mod oid;

pub use attr::{
    AttrId, AttrValue, BridgePortType, BridgeType, FdbEntryType, LearningMode, OperStatus,
    PacketAction, RifType,
};
pub use error::{Result, VswitchError};
pub use key::{FdbKey, ObjectKey, DEFAULT_VLAN_ID};
pub use mac::MacAddress;
pub use object_type::ObjectType;
pub use oid::{ObjectId, RawObjectId};
