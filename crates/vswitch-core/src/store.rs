//! Per-switch attribute store.
//!
//! One [`SwitchState`] per switch object. Objects live in a two-level map,
//! object type first, then [`ObjectKey`]; attribute maps are ordered so
//! snapshots and scans are deterministic. All methods assume the caller
//! holds the runtime's global lock.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{debug, warn};
use vswitch_types::{AttrId, AttrValue, ObjectId, ObjectKey, ObjectType, Result, VswitchError};

use crate::config::SwitchConfig;
use crate::fdb::FdbInfo;

pub type AttrMap = BTreeMap<AttrId, AttrValue>;

/// Complete control-plane state of one switch.
#[derive(Debug)]
pub struct SwitchState {
    switch_id: ObjectId,
    config: Arc<SwitchConfig>,
    objects: BTreeMap<ObjectType, BTreeMap<ObjectKey, AttrMap>>,
    /// Learned forwarding entries, ordered by (MAC, VLAN).
    learned: BTreeSet<FdbInfo>,
    /// Debug counters: object key -> stat id -> value.
    counters: BTreeMap<ObjectKey, BTreeMap<String, u64>>,
}

impl SwitchState {
    /// Creates the state with the switch's own entry pre-seeded empty, so
    /// attribute sets issued during switch bring-up always find it.
    pub fn new(switch_id: ObjectId, config: Arc<SwitchConfig>) -> Result<Self> {
        if switch_id.object_type() != ObjectType::Switch {
            return Err(VswitchError::InvariantViolation(format!(
                "switch state created for non-switch id {switch_id}"
            )));
        }
        let mut objects: BTreeMap<ObjectType, BTreeMap<ObjectKey, AttrMap>> = BTreeMap::new();
        objects
            .entry(ObjectType::Switch)
            .or_default()
            .insert(ObjectKey::oid(switch_id), AttrMap::new());
        Ok(Self {
            switch_id,
            config,
            objects,
            learned: BTreeSet::new(),
            counters: BTreeMap::new(),
        })
    }

    pub fn switch_id(&self) -> ObjectId {
        self.switch_id
    }

    pub fn config(&self) -> &Arc<SwitchConfig> {
        &self.config
    }

    fn limit_reached(&self, object_type: ObjectType) -> bool {
        let Some(limiter) = &self.config.resource_limiter else {
            return false;
        };
        let Some(limit) = limiter.limit(object_type) else {
            return false;
        };
        self.object_count(object_type) >= limit
    }

    /// Inserts a new object. The switch's own pre-seeded entry is the one
    /// duplicate that is allowed; its attributes are filled in place.
    pub fn create(&mut self, object_type: ObjectType, key: ObjectKey, attrs: AttrMap) -> Result<()> {
        let is_seed_fill = object_type == ObjectType::Switch && key == ObjectKey::oid(self.switch_id);

        if let Some(existing) = self.objects.get_mut(&object_type).and_then(|m| m.get_mut(&key)) {
            if is_seed_fill && existing.is_empty() {
                existing.extend(attrs);
                return Ok(());
            }
            return Err(VswitchError::AlreadyExists(format!("{object_type} {key}")));
        }
        if self.limit_reached(object_type) {
            warn!(%object_type, "resource limit reached");
            return Err(VswitchError::ResourceExhausted(format!(
                "{object_type} limit reached"
            )));
        }
        self.objects.entry(object_type).or_default().insert(key, attrs);
        debug!(%object_type, %key, "created object");
        Ok(())
    }

    pub fn remove(&mut self, object_type: ObjectType, key: &ObjectKey) -> Result<()> {
        let removed = self
            .objects
            .get_mut(&object_type)
            .and_then(|type_map| type_map.remove(key));
        if removed.is_none() {
            return Err(VswitchError::NotFound(format!("{object_type} {key}")));
        }
        self.counters.remove(key);
        debug!(%object_type, %key, "removed object");
        Ok(())
    }

    /// Replaces or inserts one attribute; returns the previous value.
    pub fn set(
        &mut self,
        object_type: ObjectType,
        key: &ObjectKey,
        attr_id: AttrId,
        value: AttrValue,
    ) -> Result<Option<AttrValue>> {
        let attrs = self
            .objects
            .get_mut(&object_type)
            .and_then(|type_map| type_map.get_mut(key))
            .ok_or_else(|| VswitchError::NotFound(format!("{object_type} {key}")))?;
        Ok(attrs.insert(attr_id, value))
    }

    /// Reads the requested attributes, input order preserved; each element
    /// fails independently.
    pub fn get(
        &self,
        object_type: ObjectType,
        key: &ObjectKey,
        attr_ids: &[AttrId],
    ) -> Result<Vec<Result<AttrValue>>> {
        let attrs = self
            .objects
            .get(&object_type)
            .and_then(|type_map| type_map.get(key))
            .ok_or_else(|| VswitchError::NotFound(format!("{object_type} {key}")))?;
        Ok(attr_ids
            .iter()
            .map(|id| {
                attrs
                    .get(id)
                    .cloned()
                    .ok_or_else(|| VswitchError::NotFound(format!("{id} on {key}")))
            })
            .collect())
    }

    /// Full attribute map of one object.
    pub fn get_all(&self, object_type: ObjectType, key: &ObjectKey) -> Result<&AttrMap> {
        self.objects
            .get(&object_type)
            .and_then(|type_map| type_map.get(key))
            .ok_or_else(|| VswitchError::NotFound(format!("{object_type} {key}")))
    }

    pub fn attr(&self, object_type: ObjectType, key: &ObjectKey, attr_id: AttrId) -> Option<&AttrValue> {
        self.objects.get(&object_type)?.get(key)?.get(&attr_id)
    }

    pub fn exists(&self, object_type: ObjectType, key: &ObjectKey) -> bool {
        self.objects
            .get(&object_type)
            .is_some_and(|type_map| type_map.contains_key(key))
    }

    pub fn object_count(&self, object_type: ObjectType) -> usize {
        self.objects.get(&object_type).map_or(0, |m| m.len())
    }

    /// Iterates every object of one type, key order.
    pub fn entries(&self, object_type: ObjectType) -> impl Iterator<Item = (&ObjectKey, &AttrMap)> {
        self.objects.get(&object_type).into_iter().flatten()
    }

    /// Iterates every (type, key, attrs) triple, type then key order. The
    /// snapshot dump depends on this ordering being stable.
    pub fn all_entries(
        &self,
    ) -> impl Iterator<Item = (ObjectType, &ObjectKey, &AttrMap)> {
        self.objects
            .iter()
            .flat_map(|(ty, type_map)| type_map.iter().map(move |(key, attrs)| (*ty, key, attrs)))
    }

    // --- debug counters ---------------------------------------------------

    pub fn get_stats(&self, key: &ObjectKey, stat_ids: &[&str]) -> Vec<u64> {
        let stats = self.counters.get(key);
        stat_ids
            .iter()
            .map(|id| stats.and_then(|s| s.get(*id)).copied().unwrap_or(0))
            .collect()
    }

    pub fn set_stat(&mut self, key: ObjectKey, stat_id: &str, value: u64) {
        self.counters.entry(key).or_default().insert(stat_id.to_string(), value);
    }

    pub fn clear_stats(&mut self, key: &ObjectKey, stat_ids: &[&str]) {
        if let Some(stats) = self.counters.get_mut(key) {
            for id in stat_ids {
                stats.insert((*id).to_string(), 0);
            }
        }
    }

    // --- learned-FDB set --------------------------------------------------

    pub fn learned(&self) -> &BTreeSet<FdbInfo> {
        &self.learned
    }

    pub fn learned_contains(&self, info: &FdbInfo) -> bool {
        self.learned.contains(info)
    }

    pub fn insert_learned(&mut self, info: FdbInfo) -> bool {
        self.learned.insert(info)
    }

    /// Removes the entry with the same (MAC, VLAN) key, returning it.
    pub fn remove_learned(&mut self, info: &FdbInfo) -> Option<FdbInfo> {
        self.learned.take(info)
    }

    /// Removes and returns every learned entry matching the predicate,
    /// set order preserved.
    pub fn drain_learned_matching<F>(&mut self, mut pred: F) -> Vec<FdbInfo>
    where
        F: FnMut(&FdbInfo) -> bool,
    {
        let matched: Vec<FdbInfo> = self.learned.iter().filter(|e| pred(e)).cloned().collect();
        for entry in &matched {
            self.learned.remove(entry);
        }
        matched
    }
}
