//! Chained audit record models.
//!
//! Append-only: the repository exposes no update or delete for these
//! rows, and the table carries no `updated_at`.

use serde::Serialize;
use sqlx::FromRow;
use veritax_core::chain::ChainEntryView;
use veritax_core::types::{DbId, Timestamp};

/// A row from the `chained_audit_records` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ChainedAuditRecord {
    pub id: DbId,
    pub timestamp: Timestamp,
    pub action_type: String,
    pub actor: String,
    pub entity_ref: Option<String>,
    pub batch_ref: Option<String>,
    pub operation_ref: Option<String>,
    pub payload: serde_json::Value,
    pub previous_hash: String,
    pub current_hash: String,
    pub created_at: Timestamp,
}

impl From<ChainedAuditRecord> for ChainEntryView {
    fn from(record: ChainedAuditRecord) -> Self {
        ChainEntryView {
            id: record.id,
            timestamp: record.timestamp,
            action_type: record.action_type,
            actor: record.actor,
            entity_ref: record.entity_ref,
            batch_ref: record.batch_ref,
            operation_ref: record.operation_ref,
            payload: record.payload,
            previous_hash: record.previous_hash,
            current_hash: record.current_hash,
        }
    }
}

/// Input for appending a new chain record. Hashes and timestamp are
/// computed inside the append transaction, never supplied by callers.
#[derive(Debug, Clone)]
pub struct NewChainedRecord {
    pub action_type: String,
    pub actor: String,
    pub entity_ref: Option<String>,
    pub batch_ref: Option<String>,
    pub operation_ref: Option<String>,
    pub payload: serde_json::Value,
}
