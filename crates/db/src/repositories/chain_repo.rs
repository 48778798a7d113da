//! Repository for the append-only `chained_audit_records` table.
//!
//! Appends are linearized with a transaction-scoped advisory lock so no
//! two records can ever read the same predecessor; without this a pair
//! of concurrent appends would fork the chain silently and the verifier
//! would later flag corruption that was never real tampering.

use chrono::Utc;
use sqlx::PgPool;
use veritax_core::chain::{canonical_content, compute_entry_hash, GENESIS_PREVIOUS_HASH};
use veritax_core::types::Timestamp;

use crate::models::chain::{ChainedAuditRecord, NewChainedRecord};

const CHAIN_COLUMNS: &str = "\
    id, timestamp, action_type, actor, entity_ref, batch_ref, \
    operation_ref, payload, previous_hash, current_hash, created_at";

/// Advisory lock key for chain appends. One logical chain per
/// deployment, so one key.
const CHAIN_LOCK_KEY: i64 = 0x5645_5254_4158;

/// Append and read operations for the audit chain. No update or delete
/// is exposed.
pub struct ChainRepo;

impl ChainRepo {
    /// Append one record to the chain.
    ///
    /// Runs a single transaction: take the chain advisory lock, read
    /// the most recent record's hash (the genesis value for an empty
    /// chain), compute this record's content hash, insert. The lock is
    /// released on commit.
    pub async fn append(
        pool: &PgPool,
        record: NewChainedRecord,
    ) -> Result<ChainedAuditRecord, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(CHAIN_LOCK_KEY)
            .execute(&mut *tx)
            .await?;

        let previous_hash: String = sqlx::query_scalar(
            "SELECT current_hash FROM chained_audit_records ORDER BY id DESC LIMIT 1",
        )
        .fetch_optional(&mut *tx)
        .await?
        .unwrap_or_else(|| GENESIS_PREVIOUS_HASH.to_string());

        let timestamp = Utc::now();
        let content = canonical_content(
            &record.action_type,
            &record.actor,
            record.entity_ref.as_deref(),
            record.batch_ref.as_deref(),
            record.operation_ref.as_deref(),
            timestamp,
            &record.payload,
        );
        let current_hash = compute_entry_hash(&content, &previous_hash);

        let query = format!(
            "INSERT INTO chained_audit_records \
                 (timestamp, action_type, actor, entity_ref, batch_ref, \
                  operation_ref, payload, previous_hash, current_hash) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {CHAIN_COLUMNS}"
        );
        let inserted = sqlx::query_as::<_, ChainedAuditRecord>(&query)
            .bind(timestamp)
            .bind(&record.action_type)
            .bind(&record.actor)
            .bind(&record.entity_ref)
            .bind(&record.batch_ref)
            .bind(&record.operation_ref)
            .bind(&record.payload)
            .bind(&previous_hash)
            .bind(&current_hash)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::debug!(
            chain_record_id = inserted.id,
            action_type = %inserted.action_type,
            "Chain record appended",
        );

        Ok(inserted)
    }

    /// Fetch records in append order, optionally bounded by timestamps.
    ///
    /// This is the verifier's input; it is read-only by construction.
    pub async fn fetch_range(
        pool: &PgPool,
        from: Option<Timestamp>,
        to: Option<Timestamp>,
    ) -> Result<Vec<ChainedAuditRecord>, sqlx::Error> {
        let query = format!(
            "SELECT {CHAIN_COLUMNS} FROM chained_audit_records \
             WHERE ($1::TIMESTAMPTZ IS NULL OR timestamp >= $1) \
               AND ($2::TIMESTAMPTZ IS NULL OR timestamp <= $2) \
             ORDER BY id ASC"
        );
        sqlx::query_as::<_, ChainedAuditRecord>(&query)
            .bind(from)
            .bind(to)
            .fetch_all(pool)
            .await
    }

    /// Whether any record exists before `from`. Used to decide whether
    /// a ranged walk starts at the genesis record.
    pub async fn has_records_before(pool: &PgPool, from: Timestamp) -> Result<bool, sqlx::Error> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM chained_audit_records WHERE timestamp < $1")
                .bind(from)
                .fetch_one(pool)
                .await?;
        Ok(row.0 > 0)
    }
}
