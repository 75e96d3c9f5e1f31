//! Static switch configuration.
//!
//! Everything here is loaded once at initialization by the embedding daemon
//! and treated as read-only by the core: the hardware-info to switch-index
//! map, per-type resource limits and the port lane map.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;
use vswitch_types::{ObjectType, Result, VswitchError};

use crate::flavor::SwitchFlavor;
use crate::oid::SWITCH_INDEX_LIMIT;

/// Per-object-type creation ceilings.
#[derive(Debug, Clone, Default)]
pub struct ResourceLimiter {
    limits: BTreeMap<ObjectType, usize>,
}

impl ResourceLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_limit(&mut self, object_type: ObjectType, limit: usize) {
        self.limits.insert(object_type, limit);
    }

    /// No configured limit means unlimited.
    pub fn limit(&self, object_type: ObjectType) -> Option<usize> {
        self.limits.get(&object_type).copied()
    }
}

/// Port index to physical lane assignment, read-only after load.
#[derive(Debug, Clone, Default)]
pub struct LaneMap {
    lanes: BTreeMap<u32, Vec<u32>>,
}

impl LaneMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, port_index: u32, lanes: Vec<u32>) {
        self.lanes.insert(port_index, lanes);
    }

    pub fn lanes(&self, port_index: u32) -> Option<&[u32]> {
        self.lanes.get(&port_index).map(|v| v.as_slice())
    }

    pub fn port_count(&self) -> usize {
        self.lanes.len()
    }

    /// Iterates (port index, lanes) in port-index order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &[u32])> {
        self.lanes.iter().map(|(port, lanes)| (*port, lanes.as_slice()))
    }

    /// Default map: `port_count` ports with four consecutive lanes each.
    pub fn default_map(port_count: u32) -> Self {
        let mut map = Self::new();
        for port in 0..port_count {
            map.insert(port, (port * 4..port * 4 + 4).collect());
        }
        map
    }
}

/// Configuration of one switch instance.
#[derive(Debug, Clone)]
pub struct SwitchConfig {
    /// Index embedded in every object id owned by this switch.
    pub switch_index: u32,
    /// Hardware info string used by the management client to address this
    /// switch at create time. Empty string is a valid value (single-switch
    /// deployments).
    pub hardware_info: String,
    pub flavor: SwitchFlavor,
    /// Whether frames arrive from host interfaces; learned-FDB snapshot
    /// records are only dumped when set.
    pub use_host_interfaces: bool,
    pub resource_limiter: Option<ResourceLimiter>,
    pub lane_map: LaneMap,
}

impl SwitchConfig {
    pub fn new(switch_index: u32, hardware_info: impl Into<String>, flavor: SwitchFlavor) -> Self {
        Self {
            switch_index,
            hardware_info: hardware_info.into(),
            flavor,
            use_host_interfaces: true,
            resource_limiter: None,
            lane_map: LaneMap::default_map(flavor.default_port_count()),
        }
    }
}

/// All configured switches, looked up by hardware info at switch create.
#[derive(Debug, Clone, Default)]
pub struct SwitchConfigContainer {
    configs: Vec<Arc<SwitchConfig>>,
}

impl SwitchConfigContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, config: SwitchConfig) -> Result<()> {
        if config.switch_index as u64 > SWITCH_INDEX_LIMIT {
            return Err(VswitchError::InvalidArgument(format!(
                "switch index {} out of range",
                config.switch_index
            )));
        }
        if self.configs.iter().any(|c| c.switch_index == config.switch_index) {
            return Err(VswitchError::AlreadyExists(format!(
                "switch index {}",
                config.switch_index
            )));
        }
        if self.configs.iter().any(|c| c.hardware_info == config.hardware_info) {
            return Err(VswitchError::AlreadyExists(format!(
                "hardware info '{}'",
                config.hardware_info
            )));
        }
        debug!(
            switch_index = config.switch_index,
            hardware_info = %config.hardware_info,
            "registered switch config"
        );
        self.configs.push(Arc::new(config));
        Ok(())
    }

    pub fn config_for_hardware_info(&self, hardware_info: &str) -> Option<Arc<SwitchConfig>> {
        self.configs
            .iter()
            .find(|c| c.hardware_info == hardware_info)
            .cloned()
    }

    pub fn config_for_index(&self, switch_index: u32) -> Option<Arc<SwitchConfig>> {
        self.configs
            .iter()
            .find(|c| c.switch_index == switch_index)
            .cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }
}
