//! Object id allocation.
//!
//! The codec itself (bit layout and field extraction) lives on
//! [`ObjectId`]; this module owns the allocation state: one monotonic
//! 32-bit counter per object type, plus the set of switch indexes in use.
//! Counters are never reclaimed within a process lifetime; warm restart
//! re-seeds them through [`ObjectIdManager::adopt_warm_boot_oid`] so fresh
//! ids never collide with restored ones.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{debug, info};
use vswitch_types::oid::{GLOBAL_CONTEXT_MAX, OBJECT_INDEX_MAX, SWITCH_INDEX_MAX};
use vswitch_types::{ObjectId, ObjectType, Result, VswitchError};

use crate::config::SwitchConfigContainer;

/// Largest representable switch index.
pub const SWITCH_INDEX_LIMIT: u64 = SWITCH_INDEX_MAX;

/// Allocates object ids for one management-daemon instance (one global
/// context). Owned by the runtime context; never a process singleton, so
/// tests can run multiple independent instances.
#[derive(Debug)]
pub struct ObjectIdManager {
    global_context: u32,
    container: Arc<SwitchConfigContainer>,
    /// Next object index per type; counts from zero.
    indexer: BTreeMap<ObjectType, u64>,
    switch_indexes: BTreeSet<u32>,
}

impl ObjectIdManager {
    pub fn new(global_context: u32, container: Arc<SwitchConfigContainer>) -> Result<Self> {
        if global_context as u64 > GLOBAL_CONTEXT_MAX {
            return Err(VswitchError::InvalidArgument(format!(
                "global context 0x{global_context:x} > maximum 0x{GLOBAL_CONTEXT_MAX:x}"
            )));
        }
        Ok(Self {
            global_context,
            container,
            indexer: BTreeMap::new(),
            switch_indexes: BTreeSet::new(),
        })
    }

    pub fn global_context(&self) -> u32 {
        self.global_context
    }

    /// Allocates a fresh id for a non-switch object on `switch_id`.
    pub fn allocate(&mut self, object_type: ObjectType, switch_id: ObjectId) -> Result<ObjectId> {
        if !object_type.is_valid() {
            return Err(VswitchError::InvalidArgument(format!(
                "cannot allocate id for object type {object_type}"
            )));
        }
        if object_type == ObjectType::Switch {
            return Err(VswitchError::InvalidArgument(
                "switch ids are allocated through allocate_switch".to_string(),
            ));
        }
        if switch_id.object_type() != ObjectType::Switch {
            return Err(VswitchError::InvalidArgument(format!(
                "object {switch_id} is {}, should be SWITCH",
                switch_id.object_type()
            )));
        }

        let switch_index = switch_id.switch_index();
        let counter = self.indexer.entry(object_type).or_insert(0);
        let object_index = *counter;

        if object_index > OBJECT_INDEX_MAX {
            return Err(VswitchError::ResourceExhausted(format!(
                "no more object indexes available for {object_type}"
            )));
        }
        *counter += 1;

        let oid = ObjectId::construct(object_type, switch_index, object_index, self.global_context);
        debug!(%oid, %object_type, "allocated object id");
        Ok(oid)
    }

    /// Allocates the id of a new switch. The switch index comes from the
    /// configuration matching `hardware_info`; a switch id always has
    /// object index equal to its switch index.
    pub fn allocate_switch(&mut self, hardware_info: &str) -> Result<ObjectId> {
        let config = self.container.config_for_hardware_info(hardware_info).ok_or_else(|| {
            VswitchError::NotFound(format!("no switch config for hardware info '{hardware_info}'"))
        })?;

        let switch_index = config.switch_index;

        if !self.switch_indexes.insert(switch_index) {
            return Err(VswitchError::AlreadyExists(format!(
                "switch index {switch_index} already allocated"
            )));
        }

        let oid = ObjectId::construct(
            ObjectType::Switch,
            switch_index,
            switch_index as u64,
            self.global_context,
        );
        info!(%oid, hardware_info, "allocated switch id");
        Ok(oid)
    }

    /// Releases an id. Only switch ids carry reclaimable state (the
    /// switch index); for every other type this is a no-op.
    pub fn release(&mut self, oid: ObjectId) -> Result<()> {
        if oid.object_type() != ObjectType::Switch {
            return Ok(());
        }
        let index = oid.switch_index();
        if !self.switch_indexes.remove(&index) {
            return Err(VswitchError::InvariantViolation(format!(
                "releasing switch index {index} that was never allocated"
            )));
        }
        debug!(switch_index = index, "released switch index");
        Ok(())
    }

    /// Adopts an id restored from a warm-boot snapshot: bumps the
    /// per-type counter past its object index and, for switch ids, marks
    /// the switch index allocated.
    pub fn adopt_warm_boot_oid(&mut self, oid: ObjectId) -> Result<()> {
        let object_type = oid.object_type();
        if !object_type.is_valid() {
            return Err(VswitchError::InvariantViolation(format!(
                "invalid object type on warm boot id {oid}"
            )));
        }

        if object_type == ObjectType::Switch {
            self.switch_indexes.insert(oid.switch_index());
        }

        let index = oid.object_index() as u64;
        let counter = self.indexer.entry(object_type).or_insert(0);
        if *counter <= index {
            *counter = index + 1;
        }
        Ok(())
    }

    /// Drops all allocation state (uninitialize path).
    pub fn clear(&mut self) {
        info!("clearing object id allocation state");
        self.indexer.clear();
        self.switch_indexes.clear();
    }
}
