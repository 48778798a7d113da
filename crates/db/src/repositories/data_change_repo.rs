//! Repository for the append-only `data_change_records` table.
//!
//! [`DataChangeRepo::record`] is the write path business handlers call
//! when they create, update, or delete a tracked entity. It masks the
//! snapshots and computes the changed-field list before persisting, so
//! nothing sensitive ever reaches the table.

use sqlx::PgPool;
use veritax_core::data_change::{changed_scalar_fields, ChangeOperation};
use veritax_core::masking::mask;

use crate::models::data_change::{DataChangeQuery, DataChangeRecord};

const CHANGE_COLUMNS: &str = "\
    id, timestamp, correlation_id, operation, entity_type, entity_id, \
    representation, changed_fields, before_snapshot, after_snapshot, \
    actor, created_at";

/// Input for recording one entity change.
#[derive(Debug, Clone)]
pub struct NewDataChange<'a> {
    pub correlation_id: Option<&'a str>,
    pub operation: ChangeOperation,
    pub entity_type: &'a str,
    pub entity_id: &'a str,
    pub representation: &'a str,
    /// Raw (unmasked) snapshot before the change. Required for UPDATE
    /// and DELETE.
    pub before: Option<&'a serde_json::Value>,
    /// Raw (unmasked) snapshot after the change. Required for UPDATE
    /// and CREATE.
    pub after: Option<&'a serde_json::Value>,
    pub actor: Option<&'a str>,
}

/// Insert and query operations for data-change records. Append-only.
pub struct DataChangeRepo;

impl DataChangeRepo {
    /// Record one entity change with masked snapshots.
    ///
    /// UPDATE records carry the changed top-level scalar field list and
    /// both snapshots; CREATE records carry only "after", DELETE only
    /// "before".
    pub async fn record(
        pool: &PgPool,
        change: NewDataChange<'_>,
    ) -> Result<DataChangeRecord, sqlx::Error> {
        let changed_fields = match change.operation {
            ChangeOperation::Update => {
                let before = change.before.cloned().unwrap_or(serde_json::Value::Null);
                let after = change.after.cloned().unwrap_or(serde_json::Value::Null);
                Some(serde_json::json!(changed_scalar_fields(&before, &after)))
            }
            ChangeOperation::Create | ChangeOperation::Delete => None,
        };

        let before_snapshot = match change.operation {
            ChangeOperation::Create => None,
            _ => change.before.map(mask),
        };
        let after_snapshot = match change.operation {
            ChangeOperation::Delete => None,
            _ => change.after.map(mask),
        };

        let query = format!(
            "INSERT INTO data_change_records \
                 (timestamp, correlation_id, operation, entity_type, entity_id, \
                  representation, changed_fields, before_snapshot, after_snapshot, actor) \
             VALUES (NOW(), $1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {CHANGE_COLUMNS}"
        );
        sqlx::query_as::<_, DataChangeRecord>(&query)
            .bind(change.correlation_id)
            .bind(change.operation.as_str())
            .bind(change.entity_type)
            .bind(change.entity_id)
            .bind(change.representation)
            .bind(changed_fields)
            .bind(before_snapshot)
            .bind(after_snapshot)
            .bind(change.actor)
            .fetch_one(pool)
            .await
    }

    /// Query change records with filters and pagination, newest first.
    pub async fn query(
        pool: &PgPool,
        params: &DataChangeQuery,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<DataChangeRecord>, sqlx::Error> {
        let query = format!(
            "SELECT {CHANGE_COLUMNS} FROM data_change_records \
             WHERE ($1::TEXT IS NULL OR entity_type = $1) \
               AND ($2::TEXT IS NULL OR entity_id = $2) \
               AND ($3::TEXT IS NULL OR operation = $3) \
               AND ($4::TEXT IS NULL OR correlation_id = $4) \
               AND ($5::TIMESTAMPTZ IS NULL OR timestamp >= $5) \
               AND ($6::TIMESTAMPTZ IS NULL OR timestamp <= $6) \
             ORDER BY timestamp DESC LIMIT $7 OFFSET $8"
        );
        sqlx::query_as::<_, DataChangeRecord>(&query)
            .bind(&params.entity_type)
            .bind(&params.entity_id)
            .bind(&params.operation)
            .bind(&params.correlation_id)
            .bind(params.from)
            .bind(params.to)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }
}
