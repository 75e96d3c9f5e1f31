//! Object types known to the vswitch core.

use std::fmt;
use std::str::FromStr;

use crate::error::VswitchError;

/// Closed set of object types the state store manages.
///
/// The discriminant is the 8-bit value embedded in object ids, so variants
/// must never be renumbered.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ObjectType {
    Null = 0,
    Switch = 1,
    Port = 2,
    Lag = 3,
    LagMember = 4,
    Vlan = 5,
    VlanMember = 6,
    Bridge = 7,
    BridgePort = 8,
    RouterInterface = 9,
    NextHop = 10,
    Route = 11,
    FdbEntry = 12,
    HostInterface = 13,
}

/// One past the largest valid discriminant.
pub const OBJECT_TYPE_MAX: u8 = 14;

impl ObjectType {
    /// All non-null types, in discriminant order.
    pub const ALL: [ObjectType; 13] = [
        ObjectType::Switch,
        ObjectType::Port,
        ObjectType::Lag,
        ObjectType::LagMember,
        ObjectType::Vlan,
        ObjectType::VlanMember,
        ObjectType::Bridge,
        ObjectType::BridgePort,
        ObjectType::RouterInterface,
        ObjectType::NextHop,
        ObjectType::Route,
        ObjectType::FdbEntry,
        ObjectType::HostInterface,
    ];

    /// Decodes an 8-bit type field. Out-of-range values decode to the
    /// `Null` sentinel, never panic.
    pub fn from_u8(value: u8) -> ObjectType {
        match value {
            1 => ObjectType::Switch,
            2 => ObjectType::Port,
            3 => ObjectType::Lag,
            4 => ObjectType::LagMember,
            5 => ObjectType::Vlan,
            6 => ObjectType::VlanMember,
            7 => ObjectType::Bridge,
            8 => ObjectType::BridgePort,
            9 => ObjectType::RouterInterface,
            10 => ObjectType::NextHop,
            11 => ObjectType::Route,
            12 => ObjectType::FdbEntry,
            13 => ObjectType::HostInterface,
            _ => ObjectType::Null,
        }
    }

    pub fn is_valid(&self) -> bool {
        *self != ObjectType::Null
    }

    /// True for types addressed by entry keys rather than allocated ids.
    pub fn is_entry_keyed(&self) -> bool {
        matches!(self, ObjectType::FdbEntry)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ObjectType::Null => "NULL",
            ObjectType::Switch => "SWITCH",
            ObjectType::Port => "PORT",
            ObjectType::Lag => "LAG",
            ObjectType::LagMember => "LAG_MEMBER",
            ObjectType::Vlan => "VLAN",
            ObjectType::VlanMember => "VLAN_MEMBER",
            ObjectType::Bridge => "BRIDGE",
            ObjectType::BridgePort => "BRIDGE_PORT",
            ObjectType::RouterInterface => "ROUTER_INTERFACE",
            ObjectType::NextHop => "NEXT_HOP",
            ObjectType::Route => "ROUTE",
            ObjectType::FdbEntry => "FDB_ENTRY",
            ObjectType::HostInterface => "HOST_INTERFACE",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ObjectType {
    type Err = VswitchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ObjectType::ALL
            .iter()
            .find(|t| t.name() == s)
            .copied()
            .ok_or_else(|| VswitchError::InvalidArgument(format!("unknown object type: {s}")))
    }
}
