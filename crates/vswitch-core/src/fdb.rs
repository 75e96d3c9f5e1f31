//! MAC learning, aging and flush.
//!
//! The learning path consumes raw frames from host interfaces, resolves
//! the (MAC, VLAN) key and the owning bridge port, and maintains both the
//! learned-entry set and the FDB_ENTRY objects in the store. Aging runs a
//! full linear scan on every timer tick; entry counts here are small and
//! the scan keeps the logic obvious.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{debug, trace, warn};
use vswitch_types::{
    AttrId, AttrValue, BridgePortType, FdbEntryType, FdbKey, LearningMode, MacAddress, ObjectId,
    ObjectKey, ObjectType, Result,
};

use crate::engine::ForwardingEngine;
use crate::notify::{FdbEventData, FdbEventKind, SwitchNotification};
use crate::store::{AttrMap, SwitchState};

const ETHERTYPE_VLAN: u16 = 0x8100;
const VLAN_TCI_RESERVED: u16 = 0xfff;
/// Ethernet header plus two bytes of payload, the shortest frame we
/// accept for learning.
const MIN_FRAME_LEN: usize = 16;

/// One learned forwarding entry.
///
/// Ordering and equality use the (MAC, VLAN) key only; the timestamp is
/// refreshed in place by removing and re-inserting, so it must never
/// participate in the order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FdbInfo {
    pub key: FdbKey,
    pub switch_id: ObjectId,
    pub port_id: ObjectId,
    pub bridge_port_id: ObjectId,
    /// VLAN object for .1Q bridge ports, bridge object for .1D sub-ports.
    pub bv_id: ObjectId,
    /// Seconds since the epoch at learn or last refresh.
    pub timestamp: u64,
}

impl PartialEq for FdbInfo {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for FdbInfo {}

impl PartialOrd for FdbInfo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FdbInfo {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl FdbInfo {
    fn event(&self, kind: FdbEventKind) -> FdbEventData {
        FdbEventData {
            kind,
            switch_id: self.switch_id,
            mac: self.key.mac,
            bv_id: self.bv_id,
            bridge_port_id: self.bridge_port_id,
            entry_type: FdbEntryType::Dynamic,
        }
    }
}

/// Which entry types a flush covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlushScope {
    #[default]
    All,
    Dynamic,
    Static,
}

impl FlushScope {
    pub fn covers(&self, entry_type: FdbEntryType) -> bool {
        match self {
            FlushScope::All => true,
            FlushScope::Dynamic => entry_type == FdbEntryType::Dynamic,
            FlushScope::Static => entry_type == FdbEntryType::Static,
        }
    }
}

/// Flush predicate; `None` fields match everything.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FdbFlushFilter {
    pub scope: FlushScope,
    pub bridge_port_id: Option<ObjectId>,
    pub bv_id: Option<ObjectId>,
}

/// Source MAC and VLAN tag pulled out of a raw frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedFrame {
    pub src_mac: MacAddress,
    /// `None` for untagged and priority-tagged frames.
    pub vlan_id: Option<u16>,
}

/// Extracts the learning-relevant fields. Returns `None` for frames that
/// must not be learned from: runts, reserved VLAN 0xFFF.
pub fn parse_frame(frame: &[u8]) -> Option<ParsedFrame> {
    if frame.len() < MIN_FRAME_LEN {
        trace!(len = frame.len(), "frame too short for learning");
        return None;
    }
    let src_mac = MacAddress::from_slice(&frame[6..12])?;
    let ethertype = u16::from_be_bytes([frame[12], frame[13]]);
    if ethertype != ETHERTYPE_VLAN {
        return Some(ParsedFrame { src_mac, vlan_id: None });
    }
    let vlan = u16::from_be_bytes([frame[14], frame[15]]) & 0xfff;
    match vlan {
        VLAN_TCI_RESERVED => {
            trace!("reserved vlan 0xfff, frame dropped");
            None
        }
        // priority tag, treated as untagged
        0 => Some(ParsedFrame { src_mac, vlan_id: None }),
        _ => Some(ParsedFrame { src_mac, vlan_id: Some(vlan) }),
    }
}

fn oid_attr(attrs: &AttrMap, id: AttrId) -> Option<ObjectId> {
    match attrs.get(&id) {
        Some(AttrValue::Oid(oid)) => Some(*oid),
        _ => None,
    }
}

/// LAG the port belongs to, if any.
fn lag_for_port(state: &SwitchState, port_id: ObjectId) -> Option<ObjectId> {
    state.entries(ObjectType::LagMember).find_map(|(_, attrs)| {
        (oid_attr(attrs, AttrId::LagMemberPortId) == Some(port_id))
            .then(|| oid_attr(attrs, AttrId::LagMemberLagId))
            .flatten()
    })
}

/// Whether a router interface is bound to the port or LAG.
fn has_router_interface(state: &SwitchState, id: ObjectId) -> bool {
    state
        .entries(ObjectType::RouterInterface)
        .any(|(_, attrs)| oid_attr(attrs, AttrId::RouterInterfacePortId) == Some(id))
}

/// Untagged-frame VLAN of a port or LAG.
fn default_vlan(state: &SwitchState, id: ObjectId) -> u16 {
    let (object_type, attr_id) = if id.object_type() == ObjectType::Lag {
        (ObjectType::Lag, AttrId::LagPortVlanId)
    } else {
        (ObjectType::Port, AttrId::PortVlanId)
    };
    match state.attr(object_type, &ObjectKey::oid(id), attr_id) {
        Some(AttrValue::U16(vlan)) => *vlan,
        _ => vswitch_types::DEFAULT_VLAN_ID,
    }
}

/// VLAN object carrying `vlan_id`, if one exists.
fn vlan_object(state: &SwitchState, vlan_id: u16) -> Option<ObjectId> {
    state.entries(ObjectType::Vlan).find_map(|(key, attrs)| {
        matches!(attrs.get(&AttrId::VlanId), Some(AttrValue::U16(v)) if *v == vlan_id)
            .then(|| key.as_oid())
            .flatten()
    })
}

/// Bridge-port resolution for a learn: find the bridge port bound to the
/// port (or LAG) and derive the bv_id. A .1D sub-port yields its bridge;
/// a .1Q port yields the VLAN object matching the frame's VLAN.
fn resolve_bridge_port(
    state: &SwitchState,
    target: ObjectId,
    vlan_id: u16,
) -> Option<(ObjectId, ObjectId)> {
    for (key, attrs) in state.entries(ObjectType::BridgePort) {
        if oid_attr(attrs, AttrId::BridgePortPortId) != Some(target) {
            continue;
        }
        let bridge_port_id = key.as_oid()?;
        let port_type = match attrs.get(&AttrId::BridgePortType) {
            Some(AttrValue::BridgePortType(t)) => *t,
            _ => BridgePortType::Port,
        };
        let bv_id = match port_type {
            BridgePortType::SubPort => oid_attr(attrs, AttrId::BridgePortBridgeId)?,
            BridgePortType::Port => vlan_object(state, vlan_id)?,
        };
        return Some((bridge_port_id, bv_id));
    }
    None
}

fn learning_mode(state: &SwitchState, bridge_port_id: ObjectId) -> LearningMode {
    match state.attr(
        ObjectType::BridgePort,
        &ObjectKey::oid(bridge_port_id),
        AttrId::BridgePortFdbLearningMode,
    ) {
        Some(AttrValue::LearningMode(mode)) => *mode,
        _ => LearningMode::HwLearning,
    }
}

/// Upserts the FDB_ENTRY object mirroring a learned entry.
fn upsert_fdb_object(state: &mut SwitchState, info: &FdbInfo) -> Result<()> {
    let key = ObjectKey::fdb(info.switch_id, info.key);
    let mut attrs = AttrMap::new();
    attrs.insert(AttrId::FdbEntryType, AttrValue::FdbEntryType(FdbEntryType::Dynamic));
    attrs.insert(AttrId::FdbEntryBridgePortId, AttrValue::Oid(info.bridge_port_id));
    if state.exists(ObjectType::FdbEntry, &key) {
        for (id, value) in attrs {
            state.set(ObjectType::FdbEntry, &key, id, value)?;
        }
        Ok(())
    } else {
        state.create(ObjectType::FdbEntry, key, attrs)
    }
}

/// Runs one frame through the learning path. Returns the notifications it
/// produced (at most one learn event).
pub fn process_packet_for_fdb_event(
    state: &mut SwitchState,
    engine: &dyn ForwardingEngine,
    port_id: ObjectId,
    frame: &[u8],
    now: u64,
) -> Result<Vec<SwitchNotification>> {
    if !state.config().flavor.supports_mac_learning() {
        return Ok(Vec::new());
    }
    let Some(parsed) = parse_frame(frame) else {
        return Ok(Vec::new());
    };
    if parsed.src_mac.is_zero() || parsed.src_mac.is_multicast() {
        trace!(mac = %parsed.src_mac, "not learning multicast or zero source");
        return Ok(Vec::new());
    }

    // LAG members learn against the LAG; RIF-backed interfaces do not
    // learn at all.
    let lag = lag_for_port(state, port_id);
    let port_has_rif = has_router_interface(state, port_id);
    if let Some(lag_id) = lag {
        if port_has_rif {
            warn!(%port_id, %lag_id, "port is both a lag member and rif-backed");
        }
        if has_router_interface(state, lag_id) {
            debug!(%lag_id, "lag is rif-backed, skipping learn");
            return Ok(Vec::new());
        }
    } else if port_has_rif {
        debug!(%port_id, "port is rif-backed, skipping learn");
        return Ok(Vec::new());
    }
    let target = lag.unwrap_or(port_id);

    let vlan_id = parsed.vlan_id.unwrap_or_else(|| default_vlan(state, target));
    let key = FdbKey::new(parsed.src_mac, vlan_id);

    // Present entry: refresh the timestamp, keep the ordering key intact.
    let probe = FdbInfo {
        key,
        switch_id: state.switch_id(),
        port_id: target,
        bridge_port_id: ObjectId::NULL,
        bv_id: ObjectId::NULL,
        timestamp: now,
    };
    if let Some(mut existing) = state.remove_learned(&probe) {
        existing.timestamp = now;
        state.insert_learned(existing);
        trace!(%key, "refreshed fdb entry");
        return Ok(Vec::new());
    }

    let Some((bridge_port_id, bv_id)) = resolve_bridge_port(state, target, vlan_id) else {
        warn!(%target, vlan_id, "no bridge port for learn");
        return Ok(Vec::new());
    };
    match learning_mode(state, bridge_port_id) {
        LearningMode::Disabled => {
            trace!(%bridge_port_id, "learning disabled on bridge port");
            return Ok(Vec::new());
        }
        LearningMode::HwLearning => {}
    }

    let info = FdbInfo {
        key,
        switch_id: state.switch_id(),
        port_id: target,
        bridge_port_id,
        bv_id,
        timestamp: now,
    };
    upsert_fdb_object(state, &info)?;
    if let Err(err) = engine.program_fdb_entry(&key, target) {
        warn!(%key, %err, "forwarding engine rejected fdb entry");
    }
    let event = info.event(FdbEventKind::Learned);
    state.insert_learned(info);
    debug!(%key, %bridge_port_id, "learned fdb entry");
    Ok(vec![SwitchNotification::FdbEvents(vec![event])])
}

/// One aging sweep. `aging_secs` 0 disables aging entirely.
pub fn age_fdb_entries(
    state: &mut SwitchState,
    engine: &dyn ForwardingEngine,
    aging_secs: u32,
    now: u64,
) -> Result<Vec<SwitchNotification>> {
    if aging_secs == 0 {
        return Ok(Vec::new());
    }
    let deadline = now.saturating_sub(aging_secs as u64);
    let aged = state.drain_learned_matching(|info| info.timestamp <= deadline);
    if aged.is_empty() {
        return Ok(Vec::new());
    }

    let mut events = Vec::with_capacity(aged.len());
    for info in &aged {
        let key = ObjectKey::fdb(info.switch_id, info.key);
        if let Err(err) = state.remove(ObjectType::FdbEntry, &key) {
            warn!(%key, %err, "aged entry had no store object");
        }
        if let Err(err) = engine.unprogram_fdb_entry(&info.key) {
            warn!(key = %info.key, %err, "forwarding engine failed to unprogram");
        }
        debug!(key = %info.key, "aged out fdb entry");
        events.push(info.event(FdbEventKind::Aged));
    }
    Ok(vec![SwitchNotification::FdbEvents(events)])
}

fn entry_type_of(attrs: &AttrMap) -> FdbEntryType {
    match attrs.get(&AttrId::FdbEntryType) {
        Some(AttrValue::FdbEntryType(t)) => *t,
        _ => FdbEntryType::Dynamic,
    }
}

/// Flushes every FDB_ENTRY matching the filter, removing both the store
/// objects and the learned set entries. Emits one consolidated zero-MAC
/// flush event per entry-type group that had matches.
pub fn flush_fdb_entries(
    state: &mut SwitchState,
    engine: &dyn ForwardingEngine,
    filter: &FdbFlushFilter,
) -> Result<Vec<SwitchNotification>> {
    let mut matched: Vec<(ObjectKey, FdbEntryType)> = Vec::new();
    for (key, attrs) in state.entries(ObjectType::FdbEntry) {
        let entry_type = entry_type_of(attrs);
        if !filter.scope.covers(entry_type) {
            continue;
        }
        let bridge_port = oid_attr(attrs, AttrId::FdbEntryBridgePortId);
        if let Some(want) = filter.bridge_port_id {
            if bridge_port != Some(want) {
                continue;
            }
        }
        if let Some(want) = filter.bv_id {
            let fdb_key = key.as_fdb_key();
            let bv = fdb_key
                .and_then(|k| {
                    state.learned().iter().find(|info| info.key == k).map(|info| info.bv_id)
                })
                .or_else(|| fdb_key.and_then(|k| vlan_object(state, k.vlan_id)));
            if bv != Some(want) {
                continue;
            }
        }
        matched.push((*key, entry_type));
    }
    if matched.is_empty() {
        return Ok(Vec::new());
    }

    let mut saw_static = false;
    let mut saw_dynamic = false;
    for (key, entry_type) in &matched {
        state.remove(ObjectType::FdbEntry, key)?;
        if let Some(fdb_key) = key.as_fdb_key() {
            let probe = FdbInfo {
                key: fdb_key,
                switch_id: state.switch_id(),
                port_id: ObjectId::NULL,
                bridge_port_id: ObjectId::NULL,
                bv_id: ObjectId::NULL,
                timestamp: 0,
            };
            state.remove_learned(&probe);
        }
        match entry_type {
            FdbEntryType::Static => saw_static = true,
            FdbEntryType::Dynamic => saw_dynamic = true,
        }
    }
    if let Err(err) = engine.flush_fdb_entries(filter) {
        warn!(%err, "forwarding engine flush failed");
    }
    debug!(count = matched.len(), "flushed fdb entries");

    let mut events = Vec::new();
    for (present, entry_type) in
        [(saw_static, FdbEntryType::Static), (saw_dynamic, FdbEntryType::Dynamic)]
    {
        if present {
            events.push(FdbEventData {
                kind: FdbEventKind::Flushed,
                switch_id: state.switch_id(),
                mac: MacAddress::ZERO,
                bv_id: filter.bv_id.unwrap_or(ObjectId::NULL),
                bridge_port_id: filter.bridge_port_id.unwrap_or(ObjectId::NULL),
                entry_type,
            });
        }
    }
    Ok(vec![SwitchNotification::FdbEvents(events)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SwitchConfig;
    use crate::engine::{EngineCall, RecordingEngine};
    use crate::flavor::SwitchFlavor;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn switch_oid() -> ObjectId {
        ObjectId::construct(ObjectType::Switch, 0, 0, 0)
    }

    fn oid(ty: ObjectType, index: u64) -> ObjectId {
        ObjectId::construct(ty, 0, index, 0)
    }

    fn state(flavor: SwitchFlavor) -> SwitchState {
        SwitchState::new(switch_oid(), Arc::new(SwitchConfig::new(0, "", flavor))).unwrap()
    }

    fn add_object(state: &mut SwitchState, id: ObjectId, attrs: &[(AttrId, AttrValue)]) {
        let map: AttrMap = attrs.iter().cloned().collect();
        state.create(id.object_type(), ObjectKey::oid(id), map).unwrap();
    }

    /// One port, one .1Q bridge port on it, one VLAN 100 object.
    fn bridged_state() -> (SwitchState, ObjectId, ObjectId, ObjectId) {
        let mut state = state(SwitchFlavor::Bcm56850);
        let port = oid(ObjectType::Port, 1);
        let bridge_port = oid(ObjectType::BridgePort, 1);
        let vlan = oid(ObjectType::Vlan, 1);
        add_object(&mut state, port, &[(AttrId::PortVlanId, AttrValue::U16(100))]);
        add_object(&mut state, vlan, &[(AttrId::VlanId, AttrValue::U16(100))]);
        add_object(
            &mut state,
            bridge_port,
            &[
                (AttrId::BridgePortType, AttrValue::BridgePortType(BridgePortType::Port)),
                (AttrId::BridgePortPortId, AttrValue::Oid(port)),
            ],
        );
        (state, port, bridge_port, vlan)
    }

    fn untagged_frame(src: MacAddress) -> Vec<u8> {
        let mut frame = vec![0xff; 6];
        frame.extend_from_slice(src.as_bytes());
        frame.extend_from_slice(&[0x08, 0x00, 0x00, 0x00]);
        frame
    }

    fn tagged_frame(src: MacAddress, tci: u16) -> Vec<u8> {
        let mut frame = vec![0xff; 6];
        frame.extend_from_slice(src.as_bytes());
        frame.extend_from_slice(&[0x81, 0x00]);
        frame.extend_from_slice(&tci.to_be_bytes());
        frame.extend_from_slice(&[0x08, 0x00]);
        frame
    }

    fn mac(last: u8) -> MacAddress {
        MacAddress::new([0xaa, 0xbb, 0xcc, 0xdd, 0xee, last])
    }

    #[test]
    fn test_parse_frame() {
        assert_eq!(parse_frame(&[0u8; 10]), None);
        let parsed = parse_frame(&untagged_frame(mac(1))).unwrap();
        assert_eq!(parsed, ParsedFrame { src_mac: mac(1), vlan_id: None });
        let parsed = parse_frame(&tagged_frame(mac(1), 100)).unwrap();
        assert_eq!(parsed.vlan_id, Some(100));
        // priority tag counts as untagged
        let parsed = parse_frame(&tagged_frame(mac(1), 0xe000)).unwrap();
        assert_eq!(parsed.vlan_id, None);
        // reserved vlan never learns
        assert_eq!(parse_frame(&tagged_frame(mac(1), 0xfff)), None);
        // pcp bits are masked off the tci
        let parsed = parse_frame(&tagged_frame(mac(1), 0xe064)).unwrap();
        assert_eq!(parsed.vlan_id, Some(100));
    }

    #[test]
    fn test_learn_tagged_frame() {
        let (mut state, port, bridge_port, vlan) = bridged_state();
        let engine = RecordingEngine::new();

        let notes =
            process_packet_for_fdb_event(&mut state, &engine, port, &tagged_frame(mac(1), 100), 10)
                .unwrap();

        let SwitchNotification::FdbEvents(events) = &notes[0] else {
            panic!("expected fdb events");
        };
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, FdbEventKind::Learned);
        assert_eq!(events[0].mac, mac(1));
        assert_eq!(events[0].bv_id, vlan);
        assert_eq!(events[0].bridge_port_id, bridge_port);

        // learned set and store object both exist
        assert_eq!(state.learned().len(), 1);
        let key = ObjectKey::fdb(switch_oid(), FdbKey::new(mac(1), 100));
        assert!(state.exists(ObjectType::FdbEntry, &key));
        assert_eq!(
            engine.take_calls(),
            vec![EngineCall::Program { key: FdbKey::new(mac(1), 100), port_id: port }]
        );
    }

    #[test]
    fn test_learn_untagged_uses_port_vlan() {
        let (mut state, port, _, _) = bridged_state();
        let engine = RecordingEngine::new();
        process_packet_for_fdb_event(&mut state, &engine, port, &untagged_frame(mac(2)), 5)
            .unwrap();
        assert_eq!(state.learned().iter().next().unwrap().key, FdbKey::new(mac(2), 100));
    }

    #[test]
    fn test_refresh_updates_timestamp_without_event() {
        let (mut state, port, _, _) = bridged_state();
        let engine = RecordingEngine::new();
        let frame = tagged_frame(mac(1), 100);
        process_packet_for_fdb_event(&mut state, &engine, port, &frame, 10).unwrap();
        engine.take_calls();

        let notes = process_packet_for_fdb_event(&mut state, &engine, port, &frame, 50).unwrap();
        assert!(notes.is_empty());
        assert!(engine.take_calls().is_empty());
        assert_eq!(state.learned().len(), 1);
        assert_eq!(state.learned().iter().next().unwrap().timestamp, 50);
    }

    #[test]
    fn test_no_learn_without_bridge_port() {
        let mut state = state(SwitchFlavor::Bcm56850);
        let port = oid(ObjectType::Port, 1);
        add_object(&mut state, port, &[]);
        let engine = RecordingEngine::new();
        let notes =
            process_packet_for_fdb_event(&mut state, &engine, port, &tagged_frame(mac(1), 100), 1)
                .unwrap();
        assert!(notes.is_empty());
        assert!(state.learned().is_empty());
    }

    #[test]
    fn test_learning_disabled_skips_silently() {
        let (mut state, port, bridge_port, _) = bridged_state();
        state
            .set(
                ObjectType::BridgePort,
                &ObjectKey::oid(bridge_port),
                AttrId::BridgePortFdbLearningMode,
                AttrValue::LearningMode(LearningMode::Disabled),
            )
            .unwrap();
        let engine = RecordingEngine::new();
        let notes =
            process_packet_for_fdb_event(&mut state, &engine, port, &tagged_frame(mac(1), 100), 1)
                .unwrap();
        assert!(notes.is_empty());
        assert!(state.learned().is_empty());
    }

    #[test]
    fn test_phy_flavor_never_learns() {
        let mut state = state(SwitchFlavor::Bcm81724);
        let port = oid(ObjectType::Port, 1);
        add_object(&mut state, port, &[]);
        let engine = RecordingEngine::new();
        let notes =
            process_packet_for_fdb_event(&mut state, &engine, port, &tagged_frame(mac(1), 100), 1)
                .unwrap();
        assert!(notes.is_empty());
    }

    #[test]
    fn test_lag_member_learns_against_lag() {
        let (mut state, port, _, _) = bridged_state();
        let lag = oid(ObjectType::Lag, 1);
        let lag_bridge_port = oid(ObjectType::BridgePort, 2);
        add_object(&mut state, lag, &[(AttrId::LagPortVlanId, AttrValue::U16(100))]);
        add_object(
            &mut state,
            oid(ObjectType::LagMember, 1),
            &[
                (AttrId::LagMemberLagId, AttrValue::Oid(lag)),
                (AttrId::LagMemberPortId, AttrValue::Oid(port)),
            ],
        );
        add_object(
            &mut state,
            lag_bridge_port,
            &[
                (AttrId::BridgePortType, AttrValue::BridgePortType(BridgePortType::Port)),
                (AttrId::BridgePortPortId, AttrValue::Oid(lag)),
            ],
        );

        let engine = RecordingEngine::new();
        process_packet_for_fdb_event(&mut state, &engine, port, &untagged_frame(mac(3)), 1)
            .unwrap();
        let info = state.learned().iter().next().unwrap();
        assert_eq!(info.port_id, lag);
        assert_eq!(info.bridge_port_id, lag_bridge_port);
    }

    #[test]
    fn test_rif_backed_port_skips_learning() {
        let (mut state, port, _, _) = bridged_state();
        add_object(
            &mut state,
            oid(ObjectType::RouterInterface, 1),
            &[(AttrId::RouterInterfacePortId, AttrValue::Oid(port))],
        );
        let engine = RecordingEngine::new();
        let notes =
            process_packet_for_fdb_event(&mut state, &engine, port, &tagged_frame(mac(1), 100), 1)
                .unwrap();
        assert!(notes.is_empty());
        assert!(state.learned().is_empty());
    }

    #[test]
    fn test_dot1d_subport_uses_bridge_as_bv() {
        let mut state = state(SwitchFlavor::Bcm56850);
        let port = oid(ObjectType::Port, 1);
        let bridge = oid(ObjectType::Bridge, 1);
        let sub_port = oid(ObjectType::BridgePort, 1);
        add_object(&mut state, port, &[]);
        add_object(&mut state, bridge, &[]);
        add_object(
            &mut state,
            sub_port,
            &[
                (AttrId::BridgePortType, AttrValue::BridgePortType(BridgePortType::SubPort)),
                (AttrId::BridgePortPortId, AttrValue::Oid(port)),
                (AttrId::BridgePortBridgeId, AttrValue::Oid(bridge)),
            ],
        );

        let engine = RecordingEngine::new();
        let notes =
            process_packet_for_fdb_event(&mut state, &engine, port, &tagged_frame(mac(1), 100), 1)
                .unwrap();
        let SwitchNotification::FdbEvents(events) = &notes[0] else {
            panic!("expected fdb events");
        };
        assert_eq!(events[0].bv_id, bridge);
    }

    #[test]
    fn test_aging_removes_expired_entries() {
        let (mut state, port, _, _) = bridged_state();
        let engine = RecordingEngine::new();
        process_packet_for_fdb_event(&mut state, &engine, port, &tagged_frame(mac(1), 100), 10)
            .unwrap();
        process_packet_for_fdb_event(&mut state, &engine, port, &tagged_frame(mac(2), 100), 90)
            .unwrap();
        engine.take_calls();

        // only the first entry crossed the deadline
        let notes = age_fdb_entries(&mut state, &engine, 60, 100).unwrap();
        let SwitchNotification::FdbEvents(events) = &notes[0] else {
            panic!("expected fdb events");
        };
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, FdbEventKind::Aged);
        assert_eq!(events[0].mac, mac(1));
        assert_eq!(state.learned().len(), 1);
        assert!(!state.exists(
            ObjectType::FdbEntry,
            &ObjectKey::fdb(switch_oid(), FdbKey::new(mac(1), 100))
        ));
        assert_eq!(engine.take_calls(), vec![EngineCall::Unprogram {
            key: FdbKey::new(mac(1), 100)
        }]);
    }

    #[test]
    fn test_aging_disabled_with_zero() {
        let (mut state, port, _, _) = bridged_state();
        let engine = RecordingEngine::new();
        process_packet_for_fdb_event(&mut state, &engine, port, &tagged_frame(mac(1), 100), 0)
            .unwrap();
        let notes = age_fdb_entries(&mut state, &engine, 0, 1_000_000).unwrap();
        assert!(notes.is_empty());
        assert_eq!(state.learned().len(), 1);
    }

    #[test]
    fn test_flush_consolidated_notification() {
        let (mut state, port, bridge_port, _) = bridged_state();
        let engine = RecordingEngine::new();
        process_packet_for_fdb_event(&mut state, &engine, port, &tagged_frame(mac(1), 100), 1)
            .unwrap();
        process_packet_for_fdb_event(&mut state, &engine, port, &tagged_frame(mac(2), 100), 1)
            .unwrap();
        // one static entry created by the management client
        let static_key = ObjectKey::fdb(switch_oid(), FdbKey::new(mac(9), 100));
        let mut attrs = AttrMap::new();
        attrs.insert(AttrId::FdbEntryType, AttrValue::FdbEntryType(FdbEntryType::Static));
        attrs.insert(AttrId::FdbEntryBridgePortId, AttrValue::Oid(bridge_port));
        state.create(ObjectType::FdbEntry, static_key, attrs).unwrap();
        engine.take_calls();

        let filter = FdbFlushFilter::default();
        let notes = flush_fdb_entries(&mut state, &engine, &filter).unwrap();
        let SwitchNotification::FdbEvents(events) = &notes[0] else {
            panic!("expected fdb events");
        };
        // one consolidated zero-mac record per entry-type group
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.is_consolidated()));
        assert_eq!(events[0].entry_type, FdbEntryType::Static);
        assert_eq!(events[1].entry_type, FdbEntryType::Dynamic);

        assert_eq!(state.object_count(ObjectType::FdbEntry), 0);
        assert!(state.learned().is_empty());
        assert_eq!(engine.take_calls(), vec![EngineCall::Flush(filter)]);
    }

    #[test]
    fn test_flush_dynamic_only() {
        let (mut state, port, bridge_port, _) = bridged_state();
        let engine = RecordingEngine::new();
        process_packet_for_fdb_event(&mut state, &engine, port, &tagged_frame(mac(1), 100), 1)
            .unwrap();
        let static_key = ObjectKey::fdb(switch_oid(), FdbKey::new(mac(9), 100));
        let mut attrs = AttrMap::new();
        attrs.insert(AttrId::FdbEntryType, AttrValue::FdbEntryType(FdbEntryType::Static));
        attrs.insert(AttrId::FdbEntryBridgePortId, AttrValue::Oid(bridge_port));
        state.create(ObjectType::FdbEntry, static_key, attrs).unwrap();

        let filter = FdbFlushFilter { scope: FlushScope::Dynamic, ..Default::default() };
        let notes = flush_fdb_entries(&mut state, &engine, &filter).unwrap();
        let SwitchNotification::FdbEvents(events) = &notes[0] else {
            panic!("expected fdb events");
        };
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].entry_type, FdbEntryType::Dynamic);
        // static entry survives
        assert!(state.exists(ObjectType::FdbEntry, &static_key));
        assert!(state.learned().is_empty());
    }

    #[test]
    fn test_flush_by_bridge_port() {
        let (mut state, port, bridge_port, _) = bridged_state();
        let engine = RecordingEngine::new();
        process_packet_for_fdb_event(&mut state, &engine, port, &tagged_frame(mac(1), 100), 1)
            .unwrap();

        let other = oid(ObjectType::BridgePort, 9);
        let filter = FdbFlushFilter { bridge_port_id: Some(other), ..Default::default() };
        assert!(flush_fdb_entries(&mut state, &engine, &filter).unwrap().is_empty());
        assert_eq!(state.learned().len(), 1);

        let filter = FdbFlushFilter { bridge_port_id: Some(bridge_port), ..Default::default() };
        let notes = flush_fdb_entries(&mut state, &engine, &filter).unwrap();
        assert_eq!(notes.len(), 1);
        assert!(state.learned().is_empty());
    }

    #[test]
    fn test_flush_by_bv_id() {
        let (mut state, port, _, vlan) = bridged_state();
        let engine = RecordingEngine::new();
        process_packet_for_fdb_event(&mut state, &engine, port, &tagged_frame(mac(1), 100), 1)
            .unwrap();

        let filter =
            FdbFlushFilter { bv_id: Some(oid(ObjectType::Vlan, 77)), ..Default::default() };
        assert!(flush_fdb_entries(&mut state, &engine, &filter).unwrap().is_empty());

        let filter = FdbFlushFilter { bv_id: Some(vlan), ..Default::default() };
        let notes = flush_fdb_entries(&mut state, &engine, &filter).unwrap();
        let SwitchNotification::FdbEvents(events) = &notes[0] else {
            panic!("expected fdb events");
        };
        assert_eq!(events[0].bv_id, vlan);
        assert!(state.learned().is_empty());
    }
}
