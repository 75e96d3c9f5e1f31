//! Forwarding-engine boundary.
//!
//! The control plane treats the data plane as a black box behind this
//! trait. Engine failures surface as `ExternalFailure` and are logged by
//! the caller; they never corrupt control-plane state and are never
//! retried here.

use parking_lot::Mutex;
use vswitch_types::{FdbKey, ObjectId, Result};

use crate::fdb::FdbFlushFilter;

/// Data-plane programming interface.
pub trait ForwardingEngine: Send {
    /// Installs a MAC entry pointing at `port_id`.
    fn program_fdb_entry(&self, key: &FdbKey, port_id: ObjectId) -> Result<()>;

    /// Withdraws a MAC entry.
    fn unprogram_fdb_entry(&self, key: &FdbKey) -> Result<()>;

    /// Withdraws every entry matching the filter.
    fn flush_fdb_entries(&self, filter: &FdbFlushFilter) -> Result<()>;

    /// Reads one hardware counter for a port.
    fn query_port_stats(&self, port_id: ObjectId, stat_id: &str) -> Result<u64>;

    /// Transmits a raw frame out of `port_id`.
    fn send_frame(&self, port_id: ObjectId, frame: &[u8]) -> Result<()>;
}

/// Engine that accepts everything and does nothing. Used when the data
/// plane is absent (unit tests, dry runs).
#[derive(Debug, Default)]
pub struct NullEngine;

impl ForwardingEngine for NullEngine {
    fn program_fdb_entry(&self, _key: &FdbKey, _port_id: ObjectId) -> Result<()> {
        Ok(())
    }

    fn unprogram_fdb_entry(&self, _key: &FdbKey) -> Result<()> {
        Ok(())
    }

    fn flush_fdb_entries(&self, _filter: &FdbFlushFilter) -> Result<()> {
        Ok(())
    }

    fn query_port_stats(&self, _port_id: ObjectId, _stat_id: &str) -> Result<u64> {
        Ok(0)
    }

    fn send_frame(&self, _port_id: ObjectId, _frame: &[u8]) -> Result<()> {
        Ok(())
    }
}

/// Calls observed by a [`RecordingEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Program { key: FdbKey, port_id: ObjectId },
    Unprogram { key: FdbKey },
    Flush(FdbFlushFilter),
    SendFrame { port_id: ObjectId, len: usize },
}

/// Test double that records every call; shared across crates' tests.
#[derive(Debug, Default)]
pub struct RecordingEngine {
    calls: Mutex<Vec<EngineCall>>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take_calls(&self) -> Vec<EngineCall> {
        std::mem::take(&mut self.calls.lock())
    }
}

impl ForwardingEngine for RecordingEngine {
    fn program_fdb_entry(&self, key: &FdbKey, port_id: ObjectId) -> Result<()> {
        self.calls.lock().push(EngineCall::Program { key: *key, port_id });
        Ok(())
    }

    fn unprogram_fdb_entry(&self, key: &FdbKey) -> Result<()> {
        self.calls.lock().push(EngineCall::Unprogram { key: *key });
        Ok(())
    }

    fn flush_fdb_entries(&self, filter: &FdbFlushFilter) -> Result<()> {
        self.calls.lock().push(EngineCall::Flush(filter.clone()));
        Ok(())
    }

    fn query_port_stats(&self, _port_id: ObjectId, _stat_id: &str) -> Result<u64> {
        Ok(0)
    }

    fn send_frame(&self, port_id: ObjectId, frame: &[u8]) -> Result<()> {
        self.calls.lock().push(EngineCall::SendFrame { port_id, len: frame.len() });
        Ok(())
    }
}
