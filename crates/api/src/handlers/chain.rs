//! Admin handler for audit-chain verification.
//!
//! The verifier is read-only: a detected break is reported (and
//! optionally emailed to operators), never repaired.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use veritax_core::chain::{verify_records, ChainEntryView};
use veritax_db::models::chain::NewChainedRecord;
use veritax_db::repositories::ChainRepo;
use veritax_events::{AlertMailer, EmailConfig};

use crate::error::{AppError, AppResult};
use crate::handlers::audit::parse_timestamp;
use crate::middleware::auth::RequireAdminKey;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Append
// ---------------------------------------------------------------------------

/// DTO for appending a chain record from a privileged-operation
/// handler (fleet imports, bulk edits).
#[derive(Debug, Deserialize)]
pub struct AppendChainRecord {
    pub action_type: String,
    /// Acting identity; defaults to the calling key's label.
    pub actor: Option<String>,
    pub entity_ref: Option<String>,
    pub batch_ref: Option<String>,
    pub operation_ref: Option<String>,
    pub payload: Option<serde_json::Value>,
}

/// POST /api/v1/admin/audit-chain/records
///
/// Append one record to the tamper-evident chain. Hashes and the
/// predecessor link are computed inside the serialized append; callers
/// only describe the action.
pub async fn append_record(
    RequireAdminKey(admin): RequireAdminKey,
    State(state): State<AppState>,
    Json(input): Json<AppendChainRecord>,
) -> AppResult<impl IntoResponse> {
    if input.action_type.trim().is_empty() {
        return Err(AppError::BadRequest("action_type must not be empty".into()));
    }

    let record = ChainRepo::append(
        &state.pool,
        NewChainedRecord {
            action_type: input.action_type.trim().to_string(),
            actor: input.actor.unwrap_or_else(|| admin.label()),
            entity_ref: input.entity_ref,
            batch_ref: input.batch_ref,
            operation_ref: input.operation_ref,
            payload: input.payload.unwrap_or_else(|| serde_json::json!({})),
        },
    )
    .await?;

    tracing::info!(
        chain_record_id = record.id,
        action_type = %record.action_type,
        admin = %admin.label(),
        "Chain record appended",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: record })))
}

// ---------------------------------------------------------------------------
// Verify
// ---------------------------------------------------------------------------

/// Query parameters for chain verification.
#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    /// Inclusive start of the verified range (ISO 8601). Absent = from
    /// the genesis record.
    pub from: Option<String>,
    /// Inclusive end of the verified range (ISO 8601). Absent = up to
    /// the newest record.
    pub to: Option<String>,
    /// Send an operator alert email when issues are found.
    #[serde(default)]
    pub alert: bool,
}

/// GET /api/v1/admin/audit-chain/verify
///
/// Walk the chain (optionally time-bounded), recompute every hash and
/// link, and return the structured tamper report. Admin only.
pub async fn verify_chain(
    RequireAdminKey(admin): RequireAdminKey,
    State(state): State<AppState>,
    Query(params): Query<VerifyParams>,
) -> AppResult<impl IntoResponse> {
    let from = parse_timestamp(&params.from)?;
    let to = parse_timestamp(&params.to)?;

    let rows = ChainRepo::fetch_range(&state.pool, from, to).await?;

    // A ranged walk only enforces the genesis previous-hash when no
    // record predates the range.
    let from_genesis = match from {
        Some(from) => !ChainRepo::has_records_before(&state.pool, from).await?,
        None => true,
    };

    let records: Vec<ChainEntryView> = rows.into_iter().map(Into::into).collect();
    let verification = verify_records(&records, from_genesis);

    if !verification.is_valid {
        tracing::error!(
            checked = verification.checked,
            issues = verification.issues.len(),
            admin = %admin.label(),
            "Audit chain verification found integrity issues",
        );

        if params.alert {
            match (EmailConfig::from_env(), state.config.alert_email.as_deref()) {
                (Some(config), Some(to_email)) => {
                    // Alerting is best-effort; the report itself is the
                    // authoritative output.
                    if let Err(e) = AlertMailer::new(config)
                        .send_chain_alert(to_email, &verification)
                        .await
                    {
                        tracing::error!(error = %e, "Failed to send chain integrity alert");
                    }
                }
                _ => {
                    tracing::warn!(
                        "Chain alert requested but SMTP_HOST or ALERT_EMAIL is not configured"
                    );
                }
            }
        }
    } else {
        tracing::info!(
            checked = verification.checked,
            admin = %admin.label(),
            "Audit chain verified clean",
        );
    }

    Ok(Json(DataResponse { data: verification }))
}
