//! Data-change record models: one row per create/update/delete of a
//! tracked entity, with masked before/after snapshots.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use veritax_core::types::{DbId, Timestamp};

/// A row from the `data_change_records` table. Append-only.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DataChangeRecord {
    pub id: DbId,
    pub timestamp: Timestamp,
    /// Links back to the triggering request's audit record, when known.
    pub correlation_id: Option<String>,
    /// `"CREATE"`, `"UPDATE"`, or `"DELETE"`.
    pub operation: String,
    pub entity_type: String,
    pub entity_id: String,
    /// Human-readable representation of the entity at change time.
    pub representation: String,
    /// Changed top-level scalar field names (UPDATE only).
    pub changed_fields: Option<serde_json::Value>,
    /// Masked snapshot before the change (UPDATE and DELETE).
    pub before_snapshot: Option<serde_json::Value>,
    /// Masked snapshot after the change (UPDATE and CREATE).
    pub after_snapshot: Option<serde_json::Value>,
    pub actor: Option<String>,
    pub created_at: Timestamp,
}

/// Filter parameters for querying data-change records.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DataChangeQuery {
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub operation: Option<String>,
    pub correlation_id: Option<String>,
    pub from: Option<Timestamp>,
    pub to: Option<Timestamp>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
