//! Admin handlers for audit record and data-change queries.
//!
//! Read-only: audit records are written by the recorder middleware and
//! data changes by the business layer's explicit recording calls. Both
//! endpoints are audit-exempt (see the recorder) to avoid recursive
//! logging.

use axum::extract::{Extension, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use veritax_core::data_change::ChangeOperation;
use veritax_core::types::{DbId, Timestamp};
use veritax_db::models::audit::{AuditRecordPage, AuditRecordQuery};
use veritax_db::models::data_change::DataChangeQuery;
use veritax_db::repositories::data_change_repo::NewDataChange;
use veritax_db::repositories::{AuditRepo, DataChangeRepo};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::RequireAdminKey;
use crate::middleware::recorder::CorrelationId;
use crate::query::{clamp_limit, clamp_offset, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Query parameter types
// ---------------------------------------------------------------------------

/// Query parameters for audit record queries.
#[derive(Debug, Deserialize)]
pub struct AuditRecordParams {
    pub correlation_id: Option<String>,
    pub api_key_id: Option<DbId>,
    pub path: Option<String>,
    pub method: Option<String>,
    pub status_code: Option<i16>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Query parameters for data-change queries.
#[derive(Debug, Deserialize)]
pub struct DataChangeParams {
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub operation: Option<String>,
    pub correlation_id: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parse an optional ISO 8601 timestamp parameter.
pub fn parse_timestamp(s: &Option<String>) -> AppResult<Option<Timestamp>> {
    s.as_deref()
        .map(|v| {
            v.parse::<Timestamp>()
                .map_err(|_| AppError::BadRequest("Invalid date format; expected ISO 8601".into()))
        })
        .transpose()
}

// ---------------------------------------------------------------------------
// Audit records
// ---------------------------------------------------------------------------

/// GET /api/v1/admin/audit-records
///
/// Query audit records with filters and pagination. Admin only.
pub async fn query_audit_records(
    _admin: RequireAdminKey,
    State(state): State<AppState>,
    Query(params): Query<AuditRecordParams>,
) -> AppResult<impl IntoResponse> {
    let query = AuditRecordQuery {
        correlation_id: params.correlation_id,
        api_key_id: params.api_key_id,
        path: params.path,
        method: params.method,
        status_code: params.status_code,
        from: parse_timestamp(&params.from)?,
        to: parse_timestamp(&params.to)?,
        limit: params.limit,
        offset: params.offset,
    };

    let limit = clamp_limit(query.limit, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT);
    let offset = clamp_offset(query.offset);

    let items = AuditRepo::query(&state.pool, &query, limit, offset).await?;
    let total = AuditRepo::count(&state.pool, &query).await?;

    Ok(Json(DataResponse {
        data: AuditRecordPage { items, total },
    }))
}

// ---------------------------------------------------------------------------
// Data changes
// ---------------------------------------------------------------------------

/// GET /api/v1/admin/data-changes
///
/// Query data-change records with filters and pagination. Admin only.
pub async fn query_data_changes(
    _admin: RequireAdminKey,
    State(state): State<AppState>,
    Query(params): Query<DataChangeParams>,
) -> AppResult<impl IntoResponse> {
    if let Some(op) = params.operation.as_deref() {
        if ChangeOperation::parse(op).is_none() {
            return Err(AppError::BadRequest(format!(
                "Unknown operation: '{op}'. Valid operations: CREATE, UPDATE, DELETE"
            )));
        }
    }

    let query = DataChangeQuery {
        entity_type: params.entity_type,
        entity_id: params.entity_id,
        operation: params.operation,
        correlation_id: params.correlation_id,
        from: parse_timestamp(&params.from)?,
        to: parse_timestamp(&params.to)?,
        limit: params.limit,
        offset: params.offset,
    };

    let limit = clamp_limit(query.limit, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT);
    let offset = clamp_offset(query.offset);

    let records = DataChangeRepo::query(&state.pool, &query, limit, offset).await?;

    Ok(Json(DataResponse { data: records }))
}

/// DTO for recording an entity change from a business handler.
#[derive(Debug, Deserialize)]
pub struct RecordDataChange {
    /// `"CREATE"`, `"UPDATE"`, or `"DELETE"`.
    pub operation: String,
    pub entity_type: String,
    pub entity_id: String,
    pub representation: String,
    /// Raw snapshot before the change (UPDATE and DELETE).
    pub before: Option<serde_json::Value>,
    /// Raw snapshot after the change (UPDATE and CREATE).
    pub after: Option<serde_json::Value>,
    /// Acting identity; defaults to the calling key's label.
    pub actor: Option<String>,
}

/// POST /api/v1/admin/data-changes
///
/// Record one tracked-entity change. Snapshots are masked and the
/// changed-field list computed before anything is persisted; the
/// record links back to this request's correlation ID.
pub async fn record_data_change(
    RequireAdminKey(admin): RequireAdminKey,
    State(state): State<AppState>,
    Extension(CorrelationId(correlation_id)): Extension<CorrelationId>,
    Json(input): Json<RecordDataChange>,
) -> AppResult<impl IntoResponse> {
    let Some(operation) = ChangeOperation::parse(&input.operation) else {
        return Err(AppError::BadRequest(format!(
            "Unknown operation: '{}'. Valid operations: CREATE, UPDATE, DELETE",
            input.operation
        )));
    };
    if input.entity_type.trim().is_empty() || input.entity_id.trim().is_empty() {
        return Err(AppError::BadRequest(
            "entity_type and entity_id must not be empty".into(),
        ));
    }
    match operation {
        ChangeOperation::Create if input.after.is_none() => {
            return Err(AppError::BadRequest("CREATE requires an after snapshot".into()));
        }
        ChangeOperation::Delete if input.before.is_none() => {
            return Err(AppError::BadRequest("DELETE requires a before snapshot".into()));
        }
        ChangeOperation::Update if input.before.is_none() || input.after.is_none() => {
            return Err(AppError::BadRequest(
                "UPDATE requires both before and after snapshots".into(),
            ));
        }
        _ => {}
    }

    let actor = input.actor.clone().unwrap_or_else(|| admin.label());
    let record = DataChangeRepo::record(
        &state.pool,
        NewDataChange {
            correlation_id: Some(&correlation_id),
            operation,
            entity_type: input.entity_type.trim(),
            entity_id: input.entity_id.trim(),
            representation: &input.representation,
            before: input.before.as_ref(),
            after: input.after.as_ref(),
            actor: Some(&actor),
        },
    )
    .await?;

    tracing::info!(
        data_change_id = record.id,
        operation = %record.operation,
        entity_type = %record.entity_type,
        entity_id = %record.entity_id,
        "Data change recorded",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: record })))
}
