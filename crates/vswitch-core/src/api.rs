//! Management API facade.
//!
//! [`VirtualSwitch`] is the single entry point the management channel and
//! the dispatcher call into. It owns the id manager, one [`SwitchState`]
//! per switch, and the forwarding-engine handle. Callers serialize access
//! through the runtime's global lock; nothing here locks internally.
//!
//! Mutations return the notifications they produced; the dispatcher
//! delivers those outside the lock. Notifications never carry errors.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};
use vswitch_types::{
    AttrId, AttrValue, MacAddress, ObjectId, ObjectKey, ObjectType, OperStatus, Result,
    VswitchError, DEFAULT_VLAN_ID,
};

use crate::config::SwitchConfigContainer;
use crate::engine::ForwardingEngine;
use crate::fdb::{self, FdbFlushFilter};
use crate::notify::SwitchNotification;
use crate::oid::ObjectIdManager;
use crate::store::{AttrMap, SwitchState};

const DEFAULT_PORT_SPEED_MBPS: u32 = 40_000;
const DEFAULT_PORT_MTU: u32 = 9100;

/// What the management client may do with one attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttrCapability {
    pub create: bool,
    pub set: bool,
    pub get: bool,
}

/// The complete control plane of one daemon instance.
pub struct VirtualSwitch {
    oid_manager: ObjectIdManager,
    container: Arc<SwitchConfigContainer>,
    engine: Box<dyn ForwardingEngine>,
    switches: BTreeMap<ObjectId, SwitchState>,
}

impl std::fmt::Debug for VirtualSwitch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualSwitch")
            .field("switches", &self.switches.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl VirtualSwitch {
    pub fn new(
        global_context: u32,
        container: Arc<SwitchConfigContainer>,
        engine: Box<dyn ForwardingEngine>,
    ) -> Result<Self> {
        let oid_manager = ObjectIdManager::new(global_context, Arc::clone(&container))?;
        Ok(Self { oid_manager, container, engine, switches: BTreeMap::new() })
    }

    pub fn switch_ids(&self) -> Vec<ObjectId> {
        self.switches.keys().copied().collect()
    }

    pub fn state(&self, switch_id: ObjectId) -> Result<&SwitchState> {
        self.switches
            .get(&switch_id)
            .ok_or_else(|| VswitchError::NotFound(format!("switch {switch_id}")))
    }

    fn state_mut(&mut self, switch_id: ObjectId) -> Result<&mut SwitchState> {
        self.switches
            .get_mut(&switch_id)
            .ok_or_else(|| VswitchError::NotFound(format!("switch {switch_id}")))
    }

    pub(crate) fn oid_manager_mut(&mut self) -> &mut ObjectIdManager {
        &mut self.oid_manager
    }

    pub(crate) fn container(&self) -> &Arc<SwitchConfigContainer> {
        &self.container
    }

    pub(crate) fn states(&self) -> impl Iterator<Item = &SwitchState> {
        self.switches.values()
    }

    pub(crate) fn insert_restored_switch(&mut self, state: SwitchState) {
        self.switches.insert(state.switch_id(), state);
    }

    pub(crate) fn state_mut_for_restore(&mut self, switch_id: ObjectId) -> Result<&mut SwitchState> {
        self.state_mut(switch_id)
    }

    fn reject_read_only(attrs: &AttrMap) -> Result<()> {
        if let Some(id) = attrs.keys().find(|id| id.is_read_only()) {
            return Err(VswitchError::InvalidArgument(format!("{id} is read-only")));
        }
        Ok(())
    }

    // --- switch lifecycle -------------------------------------------------

    /// Creates a switch and seeds its default state: one port per lane-map
    /// entry, the default VLAN, the default .1Q bridge, the flavor's
    /// aging time.
    pub fn create_switch(&mut self, mut attrs: AttrMap) -> Result<ObjectId> {
        Self::reject_read_only(&attrs)?;
        let hardware_info = match attrs.get(&AttrId::SwitchHardwareInfo) {
            Some(value) => value.as_text()?,
            None => String::new(),
        };
        let switch_id = self.oid_manager.allocate_switch(&hardware_info)?;
        let config = self
            .container
            .config_for_index(switch_id.switch_index())
            .ok_or_else(|| {
                VswitchError::InvariantViolation(format!(
                    "no config for allocated switch index {}",
                    switch_id.switch_index()
                ))
            })?;
        let flavor = config.flavor;
        let mut state = SwitchState::new(switch_id, config)?;

        // ports, one per lane-map entry
        let mut port_list = Vec::new();
        let lane_entries: Vec<(u32, Vec<u32>)> = state
            .config()
            .lane_map
            .iter()
            .map(|(port, lanes)| (port, lanes.to_vec()))
            .collect();
        for (_, lanes) in lane_entries {
            let port_id = self.oid_manager.allocate(ObjectType::Port, switch_id)?;
            let mut port_attrs = AttrMap::new();
            port_attrs.insert(AttrId::PortLanes, AttrValue::U32List(lanes));
            port_attrs.insert(AttrId::PortVlanId, AttrValue::U16(DEFAULT_VLAN_ID));
            port_attrs.insert(AttrId::PortAdminState, AttrValue::Bool(false));
            port_attrs.insert(AttrId::PortOperStatus, AttrValue::OperStatus(OperStatus::Unknown));
            port_attrs.insert(AttrId::PortSpeed, AttrValue::U32(DEFAULT_PORT_SPEED_MBPS));
            port_attrs.insert(AttrId::PortMtu, AttrValue::U32(DEFAULT_PORT_MTU));
            state.create(ObjectType::Port, ObjectKey::oid(port_id), port_attrs)?;
            port_list.push(port_id);
        }

        // default vlan
        let vlan_id = self.oid_manager.allocate(ObjectType::Vlan, switch_id)?;
        let mut vlan_attrs = AttrMap::new();
        vlan_attrs.insert(AttrId::VlanId, AttrValue::U16(DEFAULT_VLAN_ID));
        state.create(ObjectType::Vlan, ObjectKey::oid(vlan_id), vlan_attrs)?;

        // default .1Q bridge
        let bridge_id = self.oid_manager.allocate(ObjectType::Bridge, switch_id)?;
        let mut bridge_attrs = AttrMap::new();
        bridge_attrs.insert(
            AttrId::BridgeType,
            AttrValue::BridgeType(vswitch_types::BridgeType::Dot1Q),
        );
        state.create(ObjectType::Bridge, ObjectKey::oid(bridge_id), bridge_attrs)?;

        attrs.entry(AttrId::SwitchFdbAgingTime).or_insert_with(|| {
            AttrValue::U32(flavor.default_fdb_aging_secs())
        });
        attrs.entry(AttrId::SwitchSrcMac).or_insert_with(|| {
            AttrValue::Mac(MacAddress::new([
                0x52,
                0x54,
                0x00,
                0x00,
                0x00,
                switch_id.switch_index() as u8,
            ]))
        });
        attrs.insert(AttrId::SwitchPortList, AttrValue::OidList(port_list));
        state.create(ObjectType::Switch, ObjectKey::oid(switch_id), attrs)?;

        info!(%switch_id, %flavor, "created switch");
        self.switches.insert(switch_id, state);
        Ok(switch_id)
    }

    fn remove_switch(&mut self, switch_id: ObjectId) -> Result<()> {
        if self.switches.remove(&switch_id).is_none() {
            return Err(VswitchError::NotFound(format!("switch {switch_id}")));
        }
        self.oid_manager.release(switch_id)?;
        info!(%switch_id, "removed switch");
        Ok(())
    }

    // --- generic object operations ----------------------------------------

    /// Creates an oid-addressed object and returns its fresh id.
    pub fn create(
        &mut self,
        object_type: ObjectType,
        switch_id: ObjectId,
        attrs: AttrMap,
    ) -> Result<ObjectId> {
        if object_type == ObjectType::Switch {
            return Err(VswitchError::InvalidArgument(
                "switches are created through create_switch".to_string(),
            ));
        }
        if object_type.is_entry_keyed() {
            return Err(VswitchError::InvalidArgument(format!(
                "{object_type} is entry-keyed, use create_entry"
            )));
        }
        Self::reject_read_only(&attrs)?;
        // resolve the state first so a bad switch id does not burn an index
        self.state(switch_id)?;
        let oid = self.oid_manager.allocate(object_type, switch_id)?;
        let state = self.state_mut(switch_id)?;
        state.create(object_type, ObjectKey::oid(oid), attrs)?;
        if object_type == ObjectType::Port {
            Self::refresh_port_list(state)?;
        }
        Ok(oid)
    }

    /// Creates an entry-keyed object (FDB entries).
    pub fn create_entry(
        &mut self,
        object_type: ObjectType,
        key: ObjectKey,
        attrs: AttrMap,
    ) -> Result<()> {
        if !object_type.is_entry_keyed() {
            return Err(VswitchError::InvalidArgument(format!(
                "{object_type} is oid-keyed, use create"
            )));
        }
        let Some(fdb_key) = key.as_fdb_key() else {
            return Err(VswitchError::InvalidArgument(format!(
                "{object_type} requires an fdb key, got {key}"
            )));
        };
        Self::reject_read_only(&attrs)?;
        let bridge_port = match attrs.get(&AttrId::FdbEntryBridgePortId) {
            Some(value) => Some(value.as_oid()?),
            None => None,
        };
        let state = self.state_mut(key.switch_id())?;
        state.create(object_type, key, attrs)?;
        // program the engine against the bridge port's underlying port
        if let Some(bridge_port) = bridge_port {
            let port = state
                .attr(ObjectType::BridgePort, &ObjectKey::oid(bridge_port), AttrId::BridgePortPortId)
                .and_then(|v| v.as_oid().ok());
            if let Some(port) = port {
                if let Err(err) = self.engine.program_fdb_entry(&fdb_key, port) {
                    warn!(key = %fdb_key, %err, "forwarding engine rejected static fdb entry");
                }
            }
        }
        debug!(%key, "created fdb entry");
        Ok(())
    }

    pub fn remove(&mut self, object_type: ObjectType, key: ObjectKey) -> Result<()> {
        if object_type == ObjectType::Switch {
            let oid = key
                .as_oid()
                .ok_or_else(|| VswitchError::InvalidArgument(format!("bad switch key {key}")))?;
            return self.remove_switch(oid);
        }
        let state = self.state_mut(key.switch_id())?;
        state.remove(object_type, &key)?;
        if object_type == ObjectType::FdbEntry {
            if let Some(fdb_key) = key.as_fdb_key() {
                let probe = fdb::FdbInfo {
                    key: fdb_key,
                    switch_id: key.switch_id(),
                    port_id: ObjectId::NULL,
                    bridge_port_id: ObjectId::NULL,
                    bv_id: ObjectId::NULL,
                    timestamp: 0,
                };
                state.remove_learned(&probe);
                if let Err(err) = self.engine.unprogram_fdb_entry(&fdb_key) {
                    warn!(key = %fdb_key, %err, "forwarding engine failed to unprogram");
                }
            }
        } else if object_type == ObjectType::Port {
            Self::refresh_port_list(state)?;
        }
        Ok(())
    }

    pub fn set(
        &mut self,
        object_type: ObjectType,
        key: &ObjectKey,
        attr_id: AttrId,
        value: AttrValue,
    ) -> Result<()> {
        if attr_id.is_read_only() {
            return Err(VswitchError::InvalidArgument(format!("{attr_id} is read-only")));
        }
        let state = self.state_mut(key.switch_id())?;
        state.set(object_type, key, attr_id, value)?;
        Ok(())
    }

    pub fn get(
        &self,
        object_type: ObjectType,
        key: &ObjectKey,
        attr_ids: &[AttrId],
    ) -> Result<Vec<Result<AttrValue>>> {
        self.state(key.switch_id())?.get(object_type, key, attr_ids)
    }

    pub fn get_all(&self, object_type: ObjectType, key: &ObjectKey) -> Result<AttrMap> {
        Ok(self.state(key.switch_id())?.get_all(object_type, key)?.clone())
    }

    /// Recomputes the switch's read-only port list.
    fn refresh_port_list(state: &mut SwitchState) -> Result<()> {
        let ports: Vec<ObjectId> = state
            .entries(ObjectType::Port)
            .filter_map(|(key, _)| key.as_oid())
            .collect();
        let switch_key = ObjectKey::oid(state.switch_id());
        state.set(ObjectType::Switch, &switch_key, AttrId::SwitchPortList, AttrValue::OidList(ports))?;
        Ok(())
    }

    // --- bulk variants -----------------------------------------------------

    /// Per-element status, input order preserved; one failure never aborts
    /// the rest.
    pub fn bulk_create(
        &mut self,
        object_type: ObjectType,
        switch_id: ObjectId,
        attr_sets: Vec<AttrMap>,
    ) -> Vec<Result<ObjectId>> {
        attr_sets
            .into_iter()
            .map(|attrs| self.create(object_type, switch_id, attrs))
            .collect()
    }

    pub fn bulk_remove(&mut self, object_type: ObjectType, keys: &[ObjectKey]) -> Vec<Result<()>> {
        keys.iter().map(|key| self.remove(object_type, *key)).collect()
    }

    pub fn bulk_set(
        &mut self,
        object_type: ObjectType,
        sets: Vec<(ObjectKey, AttrId, AttrValue)>,
    ) -> Vec<Result<()>> {
        sets.into_iter()
            .map(|(key, attr_id, value)| self.set(object_type, &key, attr_id, value))
            .collect()
    }

    // --- stats --------------------------------------------------------------

    pub fn get_stats(&self, key: &ObjectKey, stat_ids: &[&str]) -> Result<Vec<u64>> {
        Ok(self.state(key.switch_id())?.get_stats(key, stat_ids))
    }

    pub fn set_stat(&mut self, key: ObjectKey, stat_id: &str, value: u64) -> Result<()> {
        self.state_mut(key.switch_id())?.set_stat(key, stat_id, value);
        Ok(())
    }

    pub fn clear_stats(&mut self, key: &ObjectKey, stat_ids: &[&str]) -> Result<()> {
        self.state_mut(key.switch_id())?.clear_stats(key, stat_ids);
        Ok(())
    }

    // --- capability --------------------------------------------------------

    pub fn query_attribute_capability(&self, attr_id: AttrId) -> AttrCapability {
        let writable = !attr_id.is_read_only();
        AttrCapability { create: writable, set: writable, get: true }
    }

    // --- fdb ----------------------------------------------------------------

    pub fn flush_fdb_entries(
        &mut self,
        switch_id: ObjectId,
        filter: &FdbFlushFilter,
    ) -> Result<Vec<SwitchNotification>> {
        let state = self
            .switches
            .get_mut(&switch_id)
            .ok_or_else(|| VswitchError::NotFound(format!("switch {switch_id}")))?;
        fdb::flush_fdb_entries(state, self.engine.as_ref(), filter)
    }

    /// Runs one received frame through the learning path. The owning
    /// switch is resolved from the port id.
    pub fn process_packet(
        &mut self,
        port_id: ObjectId,
        frame: &[u8],
        now: u64,
    ) -> Result<Vec<SwitchNotification>> {
        let switch_id = port_id.switch_id();
        let state = self
            .switches
            .get_mut(&switch_id)
            .ok_or_else(|| VswitchError::NotFound(format!("switch {switch_id}")))?;
        fdb::process_packet_for_fdb_event(state, self.engine.as_ref(), port_id, frame, now)
    }

    /// One aging sweep across every switch.
    pub fn age_fdb_entries(&mut self, now: u64) -> Vec<SwitchNotification> {
        let mut notes = Vec::new();
        for (switch_id, state) in self.switches.iter_mut() {
            let aging_secs = state
                .attr(ObjectType::Switch, &ObjectKey::oid(*switch_id), AttrId::SwitchFdbAgingTime)
                .and_then(|v| v.as_u32().ok())
                .unwrap_or(0);
            match fdb::age_fdb_entries(state, self.engine.as_ref(), aging_secs, now) {
                Ok(mut produced) => notes.append(&mut produced),
                Err(err) => warn!(%switch_id, %err, "fdb aging sweep failed"),
            }
        }
        notes
    }

    // --- link events --------------------------------------------------------

    /// Applies a kernel link state change to the host interface named
    /// `ifname` and its backing port.
    pub fn process_link_change(
        &mut self,
        ifname: &str,
        oper_up: bool,
    ) -> Result<Vec<SwitchNotification>> {
        let status = if oper_up { OperStatus::Up } else { OperStatus::Down };
        for state in self.switches.values_mut() {
            let found = state.entries(ObjectType::HostInterface).find_map(|(key, attrs)| {
                let name = attrs.get(&AttrId::HostInterfaceName)?;
                if !matches!(name, AttrValue::Text(n) if n == ifname) {
                    return None;
                }
                let port = attrs.get(&AttrId::HostInterfacePortId)?.as_oid().ok()?;
                Some((*key, port))
            });
            let Some((hostif_key, port_id)) = found else {
                continue;
            };
            state.set(
                ObjectType::HostInterface,
                &hostif_key,
                AttrId::HostInterfaceOperStatus,
                AttrValue::OperStatus(status),
            )?;
            let port_key = ObjectKey::oid(port_id);
            let previous = state.set(
                ObjectType::Port,
                &port_key,
                AttrId::PortOperStatus,
                AttrValue::OperStatus(status),
            )?;
            debug!(ifname, %port_id, %status, "link state change");
            if previous == Some(AttrValue::OperStatus(status)) {
                // no transition, nothing to report
                return Ok(Vec::new());
            }
            return Ok(vec![SwitchNotification::PortStateChange { port_id, status }]);
        }
        warn!(ifname, "link change for unknown host interface");
        Ok(Vec::new())
    }

    // --- teardown -----------------------------------------------------------

    /// Drops all switch state and id-allocation state.
    pub fn uninitialize(&mut self) {
        info!("uninitializing virtual switch");
        self.switches.clear();
        self.oid_manager.clear();
    }
}
