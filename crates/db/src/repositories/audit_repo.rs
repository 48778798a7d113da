//! Repository for the append-only `api_audit_records` table.

use sqlx::PgPool;
use veritax_core::types::Timestamp;

use crate::models::audit::{AuditRecord, AuditRecordQuery, CreateAuditRecord};

const AUDIT_COLUMNS: &str = "\
    id, correlation_id, timestamp, path, method, status_code, duration_ms, \
    client_ip, api_key_id, user_ref, request_headers, request_body, \
    response_body, error_type, error_message, created_at";

/// Provides insert and query operations for audit records. There is no
/// update: records are immutable once written.
pub struct AuditRepo;

impl AuditRepo {
    /// Insert one audit record.
    pub async fn insert(pool: &PgPool, record: &CreateAuditRecord) -> Result<AuditRecord, sqlx::Error> {
        let query = format!(
            "INSERT INTO api_audit_records \
                 (correlation_id, timestamp, path, method, status_code, duration_ms, \
                  client_ip, api_key_id, user_ref, request_headers, request_body, \
                  response_body, error_type, error_message) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
             RETURNING {AUDIT_COLUMNS}"
        );
        sqlx::query_as::<_, AuditRecord>(&query)
            .bind(&record.correlation_id)
            .bind(record.timestamp)
            .bind(&record.path)
            .bind(&record.method)
            .bind(record.status_code)
            .bind(record.duration_ms)
            .bind(&record.client_ip)
            .bind(record.api_key_id)
            .bind(&record.user_ref)
            .bind(&record.request_headers)
            .bind(&record.request_body)
            .bind(&record.response_body)
            .bind(&record.error_type)
            .bind(&record.error_message)
            .fetch_one(pool)
            .await
    }

    /// Query audit records with filters and pagination, newest first.
    pub async fn query(
        pool: &PgPool,
        params: &AuditRecordQuery,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AuditRecord>, sqlx::Error> {
        let query = format!(
            "SELECT {AUDIT_COLUMNS} FROM api_audit_records \
             WHERE ($1::TEXT IS NULL OR correlation_id = $1) \
               AND ($2::BIGINT IS NULL OR api_key_id = $2) \
               AND ($3::TEXT IS NULL OR path = $3) \
               AND ($4::TEXT IS NULL OR method = $4) \
               AND ($5::SMALLINT IS NULL OR status_code = $5) \
               AND ($6::TIMESTAMPTZ IS NULL OR timestamp >= $6) \
               AND ($7::TIMESTAMPTZ IS NULL OR timestamp <= $7) \
             ORDER BY timestamp DESC LIMIT $8 OFFSET $9"
        );
        sqlx::query_as::<_, AuditRecord>(&query)
            .bind(&params.correlation_id)
            .bind(params.api_key_id)
            .bind(&params.path)
            .bind(&params.method)
            .bind(params.status_code)
            .bind(params.from)
            .bind(params.to)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Count audit records matching the same filters as [`query`](Self::query).
    pub async fn count(pool: &PgPool, params: &AuditRecordQuery) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM api_audit_records \
             WHERE ($1::TEXT IS NULL OR correlation_id = $1) \
               AND ($2::BIGINT IS NULL OR api_key_id = $2) \
               AND ($3::TEXT IS NULL OR path = $3) \
               AND ($4::TEXT IS NULL OR method = $4) \
               AND ($5::SMALLINT IS NULL OR status_code = $5) \
               AND ($6::TIMESTAMPTZ IS NULL OR timestamp >= $6) \
               AND ($7::TIMESTAMPTZ IS NULL OR timestamp <= $7)",
        )
        .bind(&params.correlation_id)
        .bind(params.api_key_id)
        .bind(&params.path)
        .bind(&params.method)
        .bind(params.status_code)
        .bind(params.from)
        .bind(params.to)
        .fetch_one(pool)
        .await?;
        Ok(row.0)
    }

    /// Delete records older than `cutoff`. Returns the number purged.
    /// Used by the retention background job.
    pub async fn delete_older_than(pool: &PgPool, cutoff: Timestamp) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM api_audit_records WHERE timestamp < $1")
            .bind(cutoff)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
