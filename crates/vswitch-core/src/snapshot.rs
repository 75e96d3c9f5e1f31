//! Warm-restart snapshot.
//!
//! Line-oriented text, one record per line:
//!
//! ```text
//! OBJECT_TYPE <key> <ATTR_ID> <value>
//! OBJECT_TYPE <key> NULL NULL
//! FDB_INFO <json>
//! ```
//!
//! One line per attribute; objects without attributes dump a `NULL NULL`
//! line so restore still recreates them. Learned FDB entries are carried
//! as JSON records. Restore re-seeds the id manager for every id it sees
//! before any new allocation can happen, so post-restore ids never collide
//! with restored ones.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use tracing::{info, warn};
use vswitch_types::{AttrId, ObjectKey, ObjectType, Result, VswitchError};

use crate::api::VirtualSwitch;
use crate::fdb::FdbInfo;
use crate::store::{AttrMap, SwitchState};

const FDB_INFO_TAG: &str = "FDB_INFO";
const NULL_FIELD: &str = "NULL";

/// Serializes the complete object state plus learned FDB entries.
pub fn dump(vs: &VirtualSwitch) -> Result<String> {
    let mut out = String::new();
    for state in vs.states() {
        for (object_type, key, attrs) in state.all_entries() {
            if attrs.is_empty() {
                let _ = writeln!(out, "{object_type} {key} {NULL_FIELD} {NULL_FIELD}");
                continue;
            }
            for (attr_id, value) in attrs {
                let _ = writeln!(out, "{object_type} {key} {attr_id} {value}");
            }
        }
        // learned entries only exist when frames actually arrive
        if state.config().use_host_interfaces {
            for info in state.learned() {
                let json = serde_json::to_string(info).map_err(|err| {
                    VswitchError::InvariantViolation(format!("fdb entry serialization: {err}"))
                })?;
                let _ = writeln!(out, "{FDB_INFO_TAG} {json}");
            }
        }
    }
    Ok(out)
}

fn bad_line(line_no: usize, line: &str) -> VswitchError {
    VswitchError::InvalidArgument(format!("snapshot line {line_no}: {line}"))
}

/// Rebuilds the object state from a snapshot. Every id in the snapshot is
/// adopted by the id manager first; switches already present under the
/// same id are replaced, which makes a repeated restore a no-op.
pub fn restore(vs: &mut VirtualSwitch, text: &str) -> Result<()> {
    let mut records: BTreeMap<(ObjectKey, ObjectType), AttrMap> = BTreeMap::new();
    let mut learned: Vec<FdbInfo> = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        if let Some(json) = line.strip_prefix(FDB_INFO_TAG) {
            let info: FdbInfo = serde_json::from_str(json.trim_start())
                .map_err(|_| bad_line(line_no, line))?;
            learned.push(info);
            continue;
        }
        let mut fields = line.splitn(4, ' ');
        let (Some(ty), Some(key), Some(attr), Some(value)) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(bad_line(line_no, line));
        };
        let object_type: ObjectType = ty.parse().map_err(|_| bad_line(line_no, line))?;
        let key: ObjectKey = key.parse().map_err(|_| bad_line(line_no, line))?;
        let attrs = records.entry((key, object_type)).or_default();
        if attr == NULL_FIELD && value == NULL_FIELD {
            continue;
        }
        let attr_id: AttrId = attr.parse().map_err(|_| bad_line(line_no, line))?;
        attrs.insert(attr_id, value.parse().map_err(|_| bad_line(line_no, line))?);
    }

    // seed the id manager before anything can allocate
    for (key, _) in records.keys() {
        match key {
            ObjectKey::Oid(oid) => vs.oid_manager_mut().adopt_warm_boot_oid(*oid)?,
            ObjectKey::Fdb { switch_id, .. } => {
                vs.oid_manager_mut().adopt_warm_boot_oid(*switch_id)?
            }
        }
    }

    // switches first; everything else hangs off them
    for ((key, object_type), attrs) in &records {
        if *object_type != ObjectType::Switch {
            continue;
        }
        let switch_id = key.as_oid().ok_or_else(|| {
            VswitchError::InvalidArgument(format!("switch record with non-oid key {key}"))
        })?;
        let config = vs
            .container()
            .config_for_index(switch_id.switch_index())
            .ok_or_else(|| {
                VswitchError::NotFound(format!(
                    "no switch config for restored index {}",
                    switch_id.switch_index()
                ))
            })?;
        let mut state = SwitchState::new(switch_id, config)?;
        state.create(ObjectType::Switch, *key, attrs.clone())?;
        vs.insert_restored_switch(state);
    }

    let mut object_count = 0usize;
    for ((key, object_type), attrs) in &records {
        if *object_type == ObjectType::Switch {
            continue;
        }
        let switch_id = key.switch_id();
        let state = vs.state_mut_for_restore(switch_id)?;
        state.create(*object_type, *key, attrs.clone())?;
        object_count += 1;
    }

    for info in learned {
        let state = vs.state_mut_for_restore(info.switch_id)?;
        state.insert_learned(info);
    }

    info!(objects = object_count, "restored warm-boot snapshot");
    Ok(())
}

/// Writes a snapshot file, replacing any previous one.
pub fn write_file(path: &Path, text: &str) -> Result<()> {
    fs::write(path, text).map_err(|err| {
        VswitchError::ExternalFailure(format!("writing snapshot {}: {err}", path.display()))
    })
}

/// Reads a snapshot file. A missing or unreadable file is a cold boot,
/// not an error.
pub fn read_file(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(text) => Some(text),
        Err(err) => {
            warn!(path = %path.display(), %err, "no usable snapshot, cold boot");
            None
        }
    }
}
