//! Typed attributes: identifiers and values.
//!
//! Every object in the store carries a set of (attribute id, typed value)
//! records. The textual forms defined here double as the warm-restart
//! snapshot encoding, so `Display` output must round-trip through
//! `FromStr` exactly and the id/value forms must not contain whitespace
//! (free-form text is always the last field on a snapshot line).

use std::fmt;
use std::str::FromStr;

use crate::error::VswitchError;
use crate::mac::MacAddress;
use crate::oid::ObjectId;

macro_rules! named_enum {
    ($(#[$doc:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn name(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }

        impl FromStr for $name {
            type Err = VswitchError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    _ => Err(VswitchError::InvalidArgument(format!(
                        concat!("unknown ", stringify!($name), ": {}"), s))),
                }
            }
        }
    };
}

named_enum! {
    /// Bridge flavors: VLAN-aware .1Q or port-based .1D.
    BridgeType {
        Dot1Q => "DOT1Q",
        Dot1D => "DOT1D",
    }
}

named_enum! {
    /// Bridge-port flavors. A `SubPort` belongs to a .1D bridge.
    BridgePortType {
        Port => "PORT",
        SubPort => "SUB_PORT",
    }
}

named_enum! {
    /// FDB learning mode of a bridge port.
    LearningMode {
        Disabled => "DISABLED",
        HwLearning => "HW",
    }
}

named_enum! {
    /// Origin class of an FDB entry.
    FdbEntryType {
        Dynamic => "DYNAMIC",
        Static => "STATIC",
    }
}

named_enum! {
    /// Router-interface flavors; port- and sub-port-backed interfaces
    /// exclude their underlying port from MAC learning.
    RifType {
        Port => "PORT",
        SubPort => "SUB_PORT",
        Vlan => "VLAN",
        Loopback => "LOOPBACK",
    }
}

named_enum! {
    /// Operational state of a port.
    OperStatus {
        Unknown => "UNKNOWN",
        Up => "UP",
        Down => "DOWN",
    }
}

named_enum! {
    /// Forwarding action of a route.
    PacketAction {
        Forward => "FORWARD",
        Drop => "DROP",
        Trap => "TRAP",
    }
}

macro_rules! attr_ids {
    ($($variant:ident => $text:literal),+ $(,)?) => {
        /// Closed set of attribute identifiers.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum AttrId {
            $($variant),+
        }

        impl AttrId {
            pub const ALL: &'static [AttrId] = &[$(AttrId::$variant),+];

            pub fn name(&self) -> &'static str {
                match self {
                    $(AttrId::$variant => $text),+
                }
            }
        }

        impl fmt::Display for AttrId {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }

        impl FromStr for AttrId {
            type Err = VswitchError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(AttrId::$variant),)+
                    _ => Err(VswitchError::InvalidArgument(format!("unknown attribute id: {s}"))),
                }
            }
        }
    };
}

attr_ids! {
    // switch
    SwitchInit => "SWITCH_INIT",
    SwitchHardwareInfo => "SWITCH_HARDWARE_INFO",
    SwitchSrcMac => "SWITCH_SRC_MAC",
    SwitchFdbAgingTime => "SWITCH_FDB_AGING_TIME",
    SwitchPortList => "SWITCH_PORT_LIST",
    // port
    PortVlanId => "PORT_VLAN_ID",
    PortAdminState => "PORT_ADMIN_STATE",
    PortOperStatus => "PORT_OPER_STATUS",
    PortSpeed => "PORT_SPEED",
    PortMtu => "PORT_MTU",
    PortLanes => "PORT_LANES",
    // vlan
    VlanId => "VLAN_ID",
    // bridge
    BridgeType => "BRIDGE_TYPE",
    // bridge port
    BridgePortType => "BRIDGE_PORT_TYPE",
    BridgePortPortId => "BRIDGE_PORT_PORT_ID",
    BridgePortBridgeId => "BRIDGE_PORT_BRIDGE_ID",
    BridgePortFdbLearningMode => "BRIDGE_PORT_FDB_LEARNING_MODE",
    // vlan member
    VlanMemberVlanId => "VLAN_MEMBER_VLAN_ID",
    VlanMemberBridgePortId => "VLAN_MEMBER_BRIDGE_PORT_ID",
    // lag
    LagPortVlanId => "LAG_PORT_VLAN_ID",
    // lag member
    LagMemberLagId => "LAG_MEMBER_LAG_ID",
    LagMemberPortId => "LAG_MEMBER_PORT_ID",
    // router interface
    RouterInterfaceType => "ROUTER_INTERFACE_TYPE",
    RouterInterfacePortId => "ROUTER_INTERFACE_PORT_ID",
    // next hop
    NextHopIp => "NEXT_HOP_IP",
    NextHopRouterInterfaceId => "NEXT_HOP_ROUTER_INTERFACE_ID",
    // route
    RoutePacketAction => "ROUTE_PACKET_ACTION",
    RouteNextHopId => "ROUTE_NEXT_HOP_ID",
    // fdb entry
    FdbEntryType => "FDB_ENTRY_TYPE",
    FdbEntryBridgePortId => "FDB_ENTRY_BRIDGE_PORT_ID",
    // host interface
    HostInterfaceName => "HOST_INTERFACE_NAME",
    HostInterfacePortId => "HOST_INTERFACE_PORT_ID",
    HostInterfaceOperStatus => "HOST_INTERFACE_OPER_STATUS",
}

impl AttrId {
    /// True for attributes the store computes; they reject `set` through
    /// the management API.
    pub fn is_read_only(&self) -> bool {
        matches!(
            self,
            AttrId::SwitchPortList | AttrId::PortOperStatus | AttrId::HostInterfaceOperStatus
        )
    }
}

/// A typed attribute value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    Bool(bool),
    U16(u16),
    U32(u32),
    U64(u64),
    Mac(MacAddress),
    Oid(ObjectId),
    OidList(Vec<ObjectId>),
    U32List(Vec<u32>),
    Text(String),
    BridgeType(BridgeType),
    BridgePortType(BridgePortType),
    LearningMode(LearningMode),
    FdbEntryType(FdbEntryType),
    RifType(RifType),
    OperStatus(OperStatus),
    PacketAction(PacketAction),
}

macro_rules! typed_accessor {
    ($fn_name:ident, $variant:ident, $ty:ty) => {
        pub fn $fn_name(&self) -> crate::error::Result<$ty> {
            match self {
                AttrValue::$variant(v) => Ok(v.clone()),
                other => Err(VswitchError::InvalidArgument(format!(
                    concat!("expected ", stringify!($variant), " value, got {}"),
                    other.kind()
                ))),
            }
        }
    };
}

impl AttrValue {
    /// Tag of the value, used in error messages and the snapshot form.
    pub fn kind(&self) -> &'static str {
        match self {
            AttrValue::Bool(_) => "bool",
            AttrValue::U16(_) => "u16",
            AttrValue::U32(_) => "u32",
            AttrValue::U64(_) => "u64",
            AttrValue::Mac(_) => "mac",
            AttrValue::Oid(_) => "oid",
            AttrValue::OidList(_) => "oidlist",
            AttrValue::U32List(_) => "u32list",
            AttrValue::Text(_) => "text",
            AttrValue::BridgeType(_) => "bridge_type",
            AttrValue::BridgePortType(_) => "bridge_port_type",
            AttrValue::LearningMode(_) => "learning_mode",
            AttrValue::FdbEntryType(_) => "fdb_entry_type",
            AttrValue::RifType(_) => "rif_type",
            AttrValue::OperStatus(_) => "oper_status",
            AttrValue::PacketAction(_) => "packet_action",
        }
    }

    typed_accessor!(as_bool, Bool, bool);
    typed_accessor!(as_u16, U16, u16);
    typed_accessor!(as_u32, U32, u32);
    typed_accessor!(as_u64, U64, u64);
    typed_accessor!(as_mac, Mac, MacAddress);
    typed_accessor!(as_oid, Oid, ObjectId);
    typed_accessor!(as_oid_list, OidList, Vec<ObjectId>);
    typed_accessor!(as_u32_list, U32List, Vec<u32>);
    typed_accessor!(as_text, Text, String);
    typed_accessor!(as_bridge_type, BridgeType, BridgeType);
    typed_accessor!(as_bridge_port_type, BridgePortType, BridgePortType);
    typed_accessor!(as_learning_mode, LearningMode, LearningMode);
    typed_accessor!(as_fdb_entry_type, FdbEntryType, FdbEntryType);
    typed_accessor!(as_rif_type, RifType, RifType);
    typed_accessor!(as_oper_status, OperStatus, OperStatus);
    typed_accessor!(as_packet_action, PacketAction, PacketAction);
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Bool(v) => write!(f, "bool:{v}"),
            AttrValue::U16(v) => write!(f, "u16:{v}"),
            AttrValue::U32(v) => write!(f, "u32:{v}"),
            AttrValue::U64(v) => write!(f, "u64:{v}"),
            AttrValue::Mac(v) => write!(f, "mac:{v}"),
            AttrValue::Oid(v) => write!(f, "oid:{v}"),
            AttrValue::OidList(v) => {
                write!(f, "oidlist:")?;
                for (i, oid) in v.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{oid}")?;
                }
                Ok(())
            }
            AttrValue::U32List(v) => {
                write!(f, "u32list:")?;
                for (i, n) in v.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{n}")?;
                }
                Ok(())
            }
            AttrValue::Text(v) => write!(f, "text:{v}"),
            AttrValue::BridgeType(v) => write!(f, "bridge_type:{v}"),
            AttrValue::BridgePortType(v) => write!(f, "bridge_port_type:{v}"),
            AttrValue::LearningMode(v) => write!(f, "learning_mode:{v}"),
            AttrValue::FdbEntryType(v) => write!(f, "fdb_entry_type:{v}"),
            AttrValue::RifType(v) => write!(f, "rif_type:{v}"),
            AttrValue::OperStatus(v) => write!(f, "oper_status:{v}"),
            AttrValue::PacketAction(v) => write!(f, "packet_action:{v}"),
        }
    }
}

impl FromStr for AttrValue {
    type Err = VswitchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, raw) = s
            .split_once(':')
            .ok_or_else(|| VswitchError::InvalidArgument(format!("bad attribute value: {s}")))?;
        let bad = || VswitchError::InvalidArgument(format!("bad attribute value: {s}"));
        match kind {
            "bool" => raw.parse().map(AttrValue::Bool).map_err(|_| bad()),
            "u16" => raw.parse().map(AttrValue::U16).map_err(|_| bad()),
            "u32" => raw.parse().map(AttrValue::U32).map_err(|_| bad()),
            "u64" => raw.parse().map(AttrValue::U64).map_err(|_| bad()),
            "mac" => raw.parse().map(AttrValue::Mac),
            "oid" => raw.parse().map(AttrValue::Oid),
            "oidlist" => {
                if raw.is_empty() {
                    return Ok(AttrValue::OidList(Vec::new()));
                }
                raw.split(',')
                    .map(|p| p.parse())
                    .collect::<Result<Vec<ObjectId>, _>>()
                    .map(AttrValue::OidList)
            }
            "u32list" => {
                if raw.is_empty() {
                    return Ok(AttrValue::U32List(Vec::new()));
                }
                raw.split(',')
                    .map(|p| p.parse::<u32>().map_err(|_| bad()))
                    .collect::<Result<Vec<u32>, _>>()
                    .map(AttrValue::U32List)
            }
            "text" => Ok(AttrValue::Text(raw.to_string())),
            "bridge_type" => raw.parse().map(AttrValue::BridgeType),
            "bridge_port_type" => raw.parse().map(AttrValue::BridgePortType),
            "learning_mode" => raw.parse().map(AttrValue::LearningMode),
            "fdb_entry_type" => raw.parse().map(AttrValue::FdbEntryType),
            "rif_type" => raw.parse().map(AttrValue::RifType),
            "oper_status" => raw.parse().map(AttrValue::OperStatus),
            "packet_action" => raw.parse().map(AttrValue::PacketAction),
            _ => Err(bad()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_type::ObjectType;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_attr_id_round_trip() {
        for id in AttrId::ALL {
            assert_eq!(id.name().parse::<AttrId>().unwrap(), *id);
            assert!(!id.name().contains(' '));
        }
        assert!("NO_SUCH_ATTR".parse::<AttrId>().is_err());
    }

    #[test]
    fn test_value_round_trip() {
        let oid = ObjectId::construct(ObjectType::Port, 0, 1, 0);
        let values = vec![
            AttrValue::Bool(true),
            AttrValue::U16(100),
            AttrValue::U32(9000),
            AttrValue::U64(u64::MAX),
            AttrValue::Mac(MacAddress::new([1, 2, 3, 4, 5, 6])),
            AttrValue::Oid(oid),
            AttrValue::OidList(vec![oid, ObjectId::NULL]),
            AttrValue::OidList(Vec::new()),
            AttrValue::U32List(vec![25, 26, 27, 28]),
            AttrValue::U32List(Vec::new()),
            AttrValue::Text("Ethernet0".to_string()),
            AttrValue::Text(String::new()),
            AttrValue::BridgeType(BridgeType::Dot1Q),
            AttrValue::BridgePortType(BridgePortType::SubPort),
            AttrValue::LearningMode(LearningMode::HwLearning),
            AttrValue::FdbEntryType(FdbEntryType::Dynamic),
            AttrValue::RifType(RifType::Port),
            AttrValue::OperStatus(OperStatus::Up),
            AttrValue::PacketAction(PacketAction::Forward),
        ];
        for value in values {
            let text = value.to_string();
            assert_eq!(text.parse::<AttrValue>().unwrap(), value, "form: {text}");
        }
    }

    #[test]
    fn test_typed_accessor_mismatch() {
        let value = AttrValue::U32(5);
        assert_eq!(value.as_u32().unwrap(), 5);
        let err = value.as_oid().unwrap_err();
        assert!(matches!(err, VswitchError::InvalidArgument(_)));
    }

    #[test]
    fn test_read_only_attrs() {
        assert!(AttrId::PortOperStatus.is_read_only());
        assert!(AttrId::SwitchPortList.is_read_only());
        assert!(!AttrId::PortVlanId.is_read_only());
    }

    #[test]
    fn test_bad_value_forms() {
        assert!("".parse::<AttrValue>().is_err());
        assert!("u32:abc".parse::<AttrValue>().is_err());
        assert!("nosuch:1".parse::<AttrValue>().is_err());
        assert!("oid:123".parse::<AttrValue>().is_err());
    }
}
