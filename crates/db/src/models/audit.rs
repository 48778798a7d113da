//! Audit record models and DTOs.
//!
//! One [`AuditRecord`] is written per completed request, append-only
//! (no `updated_at`). Captured bodies and headers are masked before
//! they reach this layer.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use veritax_core::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Audit record entity
// ---------------------------------------------------------------------------

/// A single request audit record. Immutable once created.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AuditRecord {
    pub id: DbId,
    pub correlation_id: String,
    pub timestamp: Timestamp,
    pub path: String,
    pub method: String,
    pub status_code: i16,
    pub duration_ms: i32,
    pub client_ip: Option<String>,
    /// Authenticated API key, when the actor was a key.
    pub api_key_id: Option<DbId>,
    /// Authenticated user reference, when the actor was a person.
    /// Mutually exclusive with `api_key_id`; both may be absent.
    pub user_ref: Option<String>,
    pub request_headers: Option<serde_json::Value>,
    pub request_body: Option<serde_json::Value>,
    pub response_body: Option<serde_json::Value>,
    pub error_type: Option<String>,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Create DTO
// ---------------------------------------------------------------------------

/// DTO for inserting a new audit record.
#[derive(Debug, Clone)]
pub struct CreateAuditRecord {
    pub correlation_id: String,
    pub timestamp: Timestamp,
    pub path: String,
    pub method: String,
    pub status_code: i16,
    pub duration_ms: i32,
    pub client_ip: Option<String>,
    pub api_key_id: Option<DbId>,
    pub user_ref: Option<String>,
    pub request_headers: Option<serde_json::Value>,
    pub request_body: Option<serde_json::Value>,
    pub response_body: Option<serde_json::Value>,
    pub error_type: Option<String>,
    pub error_message: Option<String>,
}

// ---------------------------------------------------------------------------
// Query parameters
// ---------------------------------------------------------------------------

/// Filter parameters for querying audit records.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditRecordQuery {
    pub correlation_id: Option<String>,
    pub api_key_id: Option<DbId>,
    pub path: Option<String>,
    pub method: Option<String>,
    pub status_code: Option<i16>,
    pub from: Option<Timestamp>,
    pub to: Option<Timestamp>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Paginated response for audit record queries.
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecordPage {
    pub items: Vec<AuditRecord>,
    pub total: i64,
}
