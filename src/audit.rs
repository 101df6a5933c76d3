//! Change log for user-visible programme mutations.
//!
//! Sinks are fire-and-forget: [`AuditSink::record`] returns nothing, and an
//! implementation that cannot persist a record logs the failure and moves on
//! so the scheduling operation that emitted it still succeeds.

use crate::entry::{Actor, OwnerId};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    ProgrammeSaved,
    ProgrammeGenerated,
    ProgrammeRecalculated,
    EntrySplit,
    EntriesReordered,
    EntryPatched,
    EntryDeleted,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::ProgrammeSaved => "programme_saved",
            AuditAction::ProgrammeGenerated => "programme_generated",
            AuditAction::ProgrammeRecalculated => "programme_recalculated",
            AuditAction::EntrySplit => "entry_split",
            AuditAction::EntriesReordered => "entries_reordered",
            AuditAction::EntryPatched => "entry_patched",
            AuditAction::EntryDeleted => "entry_deleted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub owner_id: OwnerId,
    pub action: AuditAction,
    pub actor_id: String,
    pub actor_name: String,
    pub details: Value,
    pub recorded_at: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(owner_id: &OwnerId, action: AuditAction, actor: &Actor, details: Value) -> Self {
        Self {
            owner_id: owner_id.clone(),
            action,
            actor_id: actor.id.clone(),
            actor_name: actor.name.clone(),
            details,
            recorded_at: Utc::now(),
        }
    }
}

pub trait AuditSink: Send + Sync {
    fn record(&self, record: AuditRecord);
}

/// Writes audit records to the `audit` tracing target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, record: AuditRecord) {
        tracing::info!(
            target: "audit",
            owner = %record.owner_id,
            action = record.action.as_str(),
            actor = %record.actor_id,
            details = %record.details,
            "programme change"
        );
    }
}

/// Keeps records in memory; used by tests and the CLI.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().clone()
    }

    pub fn actions(&self) -> Vec<AuditAction> {
        self.records.lock().iter().map(|record| record.action).collect()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, record: AuditRecord) {
        self.records.lock().push(record);
    }
}
