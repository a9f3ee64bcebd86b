//! Audit trail
//!
//! Every phase writes an `init`, `exec`, `done` and `ack` record. Writes are
//! best effort: a failing sink is logged and the transfer goes on.

use crate::Result;
use odap_protocol::Phase;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// Stage of a phase being recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditKind {
    /// Phase started
    Init,
    /// Side effect executing
    Exec,
    /// Phase processed
    Done,
    /// Ack sent or received
    Ack,
}

impl fmt::Display for AuditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AuditKind::Init => "init",
            AuditKind::Exec => "exec",
            AuditKind::Done => "done",
            AuditKind::Ack => "ack",
        })
    }
}

/// Audit record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    /// Session ID
    pub session_id: String,
    /// Session step at the time of writing
    pub step: u64,
    /// Phase
    pub phase: Phase,
    /// `<kind>-<operation>`, e.g. `done-lock`
    pub operation: String,
    /// `<source key>-><recipient key>`
    pub nodes: String,
}

impl AuditEntry {
    /// Storage key `<session>-<step>`
    pub fn key(&self) -> String {
        format!("{}-{}", self.session_id, self.step)
    }
}

/// Destination of audit records
pub trait AuditSink: Send + Sync {
    /// Write one record
    fn record(&self, entry: &AuditEntry) -> Result<()>;
}

/// Sink emitting records as tracing events
#[derive(Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, entry: &AuditEntry) -> Result<()> {
        info!(
            target: "odap::audit",
            key = %entry.key(),
            phase = %entry.phase,
            operation = %entry.operation,
            nodes = %entry.nodes,
            "audit"
        );
        Ok(())
    }
}

/// Sink keeping records in memory
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
    failing: Mutex<bool>,
}

impl MemoryAuditSink {
    /// Create empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Records written so far
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().clone()
    }

    /// Records for one session
    pub fn entries_for(&self, session_id: &str) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.session_id == session_id)
            .cloned()
            .collect()
    }

    /// Make every write fail until reset
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, entry: &AuditEntry) -> Result<()> {
        if *self.failing.lock() {
            return Err(crate::Error::Other("audit sink unavailable".to_string()));
        }
        self.entries.lock().push(entry.clone());
        Ok(())
    }
}
