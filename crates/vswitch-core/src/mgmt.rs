//! Management channel.
//!
//! A synchronous request/reply layer over an mpsc pair. The embedding
//! daemon hands the receiver to the runtime, which serves requests on its
//! management thread under the global lock; clients block on a per-request
//! reply channel, so every call keeps create/remove/set/get semantics.

use std::sync::mpsc::{channel, Receiver, Sender};

use tracing::debug;
use vswitch_types::{AttrId, AttrValue, ObjectId, ObjectKey, ObjectType, Result, VswitchError};

use crate::api::VirtualSwitch;
use crate::fdb::FdbFlushFilter;
use crate::notify::SwitchNotification;
use crate::store::AttrMap;

/// One management operation.
#[derive(Debug)]
pub enum Operation {
    CreateSwitch {
        attrs: AttrMap,
    },
    Create {
        object_type: ObjectType,
        switch_id: ObjectId,
        attrs: AttrMap,
    },
    CreateEntry {
        object_type: ObjectType,
        key: ObjectKey,
        attrs: AttrMap,
    },
    Remove {
        object_type: ObjectType,
        key: ObjectKey,
    },
    Set {
        object_type: ObjectType,
        key: ObjectKey,
        attr_id: AttrId,
        value: AttrValue,
    },
    Get {
        object_type: ObjectType,
        key: ObjectKey,
        attr_ids: Vec<AttrId>,
    },
    FlushFdb {
        switch_id: ObjectId,
        filter: FdbFlushFilter,
    },
}

/// Reply matching the operation's natural return type.
#[derive(Debug)]
pub enum OperationReply {
    Oid(Result<ObjectId>),
    Unit(Result<()>),
    Values(Result<Vec<Result<AttrValue>>>),
}

/// A request in flight: the operation plus its reply channel.
#[derive(Debug)]
pub struct ManagementRequest {
    pub op: Operation,
    pub reply: Sender<OperationReply>,
}

/// Creates a connected client/server pair. The receiver goes to the
/// runtime, the client to the management transport.
pub fn management_channel() -> (ManagementClient, Receiver<ManagementRequest>) {
    let (tx, rx) = channel();
    (ManagementClient { tx }, rx)
}

/// Blocking client handle; cheap to clone, usable from any thread.
#[derive(Debug, Clone)]
pub struct ManagementClient {
    tx: Sender<ManagementRequest>,
}

impl ManagementClient {
    fn call(&self, op: Operation) -> Result<OperationReply> {
        let (reply_tx, reply_rx) = channel();
        self.tx
            .send(ManagementRequest { op, reply: reply_tx })
            .map_err(|_| VswitchError::ExternalFailure("management channel closed".to_string()))?;
        reply_rx
            .recv()
            .map_err(|_| VswitchError::ExternalFailure("management channel closed".to_string()))
    }

    fn expect_oid(reply: OperationReply) -> Result<ObjectId> {
        match reply {
            OperationReply::Oid(result) => result,
            other => Err(VswitchError::InvariantViolation(format!(
                "mismatched management reply: {other:?}"
            ))),
        }
    }

    fn expect_unit(reply: OperationReply) -> Result<()> {
        match reply {
            OperationReply::Unit(result) => result,
            other => Err(VswitchError::InvariantViolation(format!(
                "mismatched management reply: {other:?}"
            ))),
        }
    }

    pub fn create_switch(&self, attrs: AttrMap) -> Result<ObjectId> {
        Self::expect_oid(self.call(Operation::CreateSwitch { attrs })?)
    }

    pub fn create(
        &self,
        object_type: ObjectType,
        switch_id: ObjectId,
        attrs: AttrMap,
    ) -> Result<ObjectId> {
        Self::expect_oid(self.call(Operation::Create { object_type, switch_id, attrs })?)
    }

    pub fn create_entry(
        &self,
        object_type: ObjectType,
        key: ObjectKey,
        attrs: AttrMap,
    ) -> Result<()> {
        Self::expect_unit(self.call(Operation::CreateEntry { object_type, key, attrs })?)
    }

    pub fn remove(&self, object_type: ObjectType, key: ObjectKey) -> Result<()> {
        Self::expect_unit(self.call(Operation::Remove { object_type, key })?)
    }

    pub fn set(
        &self,
        object_type: ObjectType,
        key: ObjectKey,
        attr_id: AttrId,
        value: AttrValue,
    ) -> Result<()> {
        Self::expect_unit(self.call(Operation::Set { object_type, key, attr_id, value })?)
    }

    pub fn get(
        &self,
        object_type: ObjectType,
        key: ObjectKey,
        attr_ids: Vec<AttrId>,
    ) -> Result<Vec<Result<AttrValue>>> {
        match self.call(Operation::Get { object_type, key, attr_ids })? {
            OperationReply::Values(result) => result,
            other => Err(VswitchError::InvariantViolation(format!(
                "mismatched management reply: {other:?}"
            ))),
        }
    }

    pub fn flush_fdb(&self, switch_id: ObjectId, filter: FdbFlushFilter) -> Result<()> {
        Self::expect_unit(self.call(Operation::FlushFdb { switch_id, filter })?)
    }

    /// Fetches one attribute, a convenience over `get`.
    pub fn get_one(
        &self,
        object_type: ObjectType,
        key: ObjectKey,
        attr_id: AttrId,
    ) -> Result<AttrValue> {
        let mut values = self.get(object_type, key, vec![attr_id])?;
        values
            .pop()
            .unwrap_or_else(|| Err(VswitchError::NotFound(format!("{attr_id} on {key}"))))
    }
}

/// Applies one operation under the caller's lock. Returns the reply plus
/// any notifications the operation produced.
pub(crate) fn apply(
    vs: &mut VirtualSwitch,
    op: Operation,
) -> (OperationReply, Vec<SwitchNotification>) {
    debug!(?op, "management operation");
    match op {
        Operation::CreateSwitch { attrs } => {
            (OperationReply::Oid(vs.create_switch(attrs)), Vec::new())
        }
        Operation::Create { object_type, switch_id, attrs } => {
            (OperationReply::Oid(vs.create(object_type, switch_id, attrs)), Vec::new())
        }
        Operation::CreateEntry { object_type, key, attrs } => {
            (OperationReply::Unit(vs.create_entry(object_type, key, attrs)), Vec::new())
        }
        Operation::Remove { object_type, key } => {
            (OperationReply::Unit(vs.remove(object_type, key)), Vec::new())
        }
        Operation::Set { object_type, key, attr_id, value } => {
            (OperationReply::Unit(vs.set(object_type, &key, attr_id, value)), Vec::new())
        }
        Operation::Get { object_type, key, attr_ids } => {
            (OperationReply::Values(vs.get(object_type, &key, &attr_ids)), Vec::new())
        }
        Operation::FlushFdb { switch_id, filter } => {
            match vs.flush_fdb_entries(switch_id, &filter) {
                Ok(notes) => (OperationReply::Unit(Ok(())), notes),
                Err(err) => (OperationReply::Unit(Err(err)), Vec::new()),
            }
        }
    }
}
