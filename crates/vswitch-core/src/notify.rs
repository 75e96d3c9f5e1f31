//! Notifications emitted by the switch toward its management client.
//!
//! Core methods return the notifications they produced; the dispatcher
//! re-enqueues them and delivers through the registered callbacks outside
//! the global lock. Notifications carry state changes only, never errors.

use vswitch_types::{AttrId, AttrValue, FdbEntryType, MacAddress, ObjectId, OperStatus};

/// What happened to an FDB entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FdbEventKind {
    Learned,
    Aged,
    Moved,
    Flushed,
}

impl FdbEventKind {
    pub fn name(&self) -> &'static str {
        match self {
            FdbEventKind::Learned => "LEARNED",
            FdbEventKind::Aged => "AGED",
            FdbEventKind::Moved => "MOVED",
            FdbEventKind::Flushed => "FLUSHED",
        }
    }
}

/// One FDB event record.
///
/// A flushed event with the zero MAC is a consolidated record: it stands
/// for every entry of `entry_type` matching the non-null fields of the
/// record (`bv_id`, `bridge_port_id`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FdbEventData {
    pub kind: FdbEventKind,
    pub switch_id: ObjectId,
    pub mac: MacAddress,
    /// VLAN object for .1Q entries, bridge object for .1D entries.
    pub bv_id: ObjectId,
    pub bridge_port_id: ObjectId,
    pub entry_type: FdbEntryType,
}

impl FdbEventData {
    /// Consolidated-flush marker.
    pub fn is_consolidated(&self) -> bool {
        self.kind == FdbEventKind::Flushed && self.mac.is_zero()
    }
}

/// Asynchronous state-change reports, delivered in dispatcher drain order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchNotification {
    /// One or more FDB events produced by a single trigger (a learned
    /// frame, an aging sweep, a flush).
    FdbEvents(Vec<FdbEventData>),
    PortStateChange {
        port_id: ObjectId,
        status: OperStatus,
    },
    AttributeChange {
        object_id: ObjectId,
        attr_id: AttrId,
        value: AttrValue,
    },
}

/// Callbacks registered by the embedding daemon. Invoked on the dispatcher
/// thread with the global lock released; implementations may call back
/// into the management API.
pub trait SwitchEventCallbacks: Send + Sync {
    fn on_fdb_events(&self, _events: &[FdbEventData]) {}

    fn on_port_state_change(&self, _port_id: ObjectId, _status: OperStatus) {}

    fn on_attribute_change(&self, _object_id: ObjectId, _attr_id: AttrId, _value: &AttrValue) {}
}

/// Default callbacks: discard everything.
#[derive(Debug, Default)]
pub struct NullCallbacks;

impl SwitchEventCallbacks for NullCallbacks {}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_consolidated_flush_marker() {
        let flushed = FdbEventData {
            kind: FdbEventKind::Flushed,
            switch_id: ObjectId::NULL,
            mac: MacAddress::ZERO,
            bv_id: ObjectId::NULL,
            bridge_port_id: ObjectId::NULL,
            entry_type: FdbEntryType::Dynamic,
        };
        assert!(flushed.is_consolidated());

        let learned = FdbEventData {
            kind: FdbEventKind::Learned,
            mac: "aa:bb:cc:dd:ee:01".parse().unwrap(),
            ..flushed
        };
        assert!(!learned.is_consolidated());
    }

    #[test]
    fn test_event_kind_names() {
        assert_eq!(FdbEventKind::Learned.name(), "LEARNED");
        assert_eq!(FdbEventKind::Flushed.name(), "FLUSHED");
    }
}
