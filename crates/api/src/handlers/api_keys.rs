//! Admin handlers for API key management.
//!
//! All endpoints require an admin-scoped key via [`RequireAdminKey`].
//! The plaintext key is returned **only** on creation and rotation;
//! subsequent queries expose only the `key_prefix` for identification.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use veritax_core::api_keys::{generate_api_key, validate_scope};
use veritax_core::error::CoreError;
use veritax_core::types::{DbId, Timestamp};
use veritax_db::models::api_key::{ApiKeyCreatedResponse, CreateApiKey, UpdateApiKey};
use veritax_db::repositories::ApiKeyRepo;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::RequireAdminKey;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/admin/api-keys
///
/// Generate a new API key. The plaintext key is returned exactly once.
pub async fn create_api_key(
    RequireAdminKey(admin): RequireAdminKey,
    State(state): State<AppState>,
    Json(input): Json<CreateApiKey>,
) -> AppResult<impl IntoResponse> {
    if input.name.trim().is_empty() {
        return Err(AppError::BadRequest("name must not be empty".into()));
    }
    validate_scope(&input.scope)?;

    let expires_at = input
        .expires_at
        .as_deref()
        .map(|s| s.parse::<Timestamp>())
        .transpose()
        .map_err(|_| AppError::BadRequest("Invalid expires_at; expected ISO 8601".into()))?;

    let generated = generate_api_key();

    let key = ApiKeyRepo::create(
        &state.pool,
        input.name.trim(),
        input.description.as_deref(),
        &generated.hash,
        &generated.prefix,
        &input.scope,
        input.owner.as_deref(),
        input.hourly_limit,
        input.daily_limit,
        expires_at,
    )
    .await?;

    tracing::info!(
        api_key_id = key.id,
        key_prefix = %generated.prefix,
        scope = %input.scope,
        admin = %admin.label(),
        "API key created",
    );

    let response = ApiKeyCreatedResponse {
        id: key.id,
        name: key.name,
        key_prefix: generated.prefix,
        plaintext_key: generated.plaintext,
        scope: input.scope,
        created_at: key.created_at,
    };

    Ok((StatusCode::CREATED, Json(DataResponse { data: response })))
}

/// GET /api/v1/admin/api-keys
///
/// List all API keys. Shows prefix only, never the full key.
pub async fn list_api_keys(
    _admin: RequireAdminKey,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let keys = ApiKeyRepo::list(&state.pool).await?;
    Ok(Json(DataResponse { data: keys }))
}

/// PUT /api/v1/admin/api-keys/{id}
///
/// Update API key settings (name, description, rate budgets, active flag).
pub async fn update_api_key(
    RequireAdminKey(admin): RequireAdminKey,
    State(state): State<AppState>,
    Path(key_id): Path<DbId>,
    Json(input): Json<UpdateApiKey>,
) -> AppResult<impl IntoResponse> {
    let updated = ApiKeyRepo::update(
        &state.pool,
        key_id,
        input.name.as_deref(),
        input.description.as_deref(),
        input.hourly_limit,
        input.daily_limit,
        input.is_active,
    )
    .await?
    .ok_or(AppError::Core(CoreError::NotFound {
        entity: "ApiKey",
        id: key_id,
    }))?;

    tracing::info!(
        api_key_id = key_id,
        admin = %admin.label(),
        "API key updated",
    );

    Ok(Json(DataResponse { data: updated }))
}

/// POST /api/v1/admin/api-keys/{id}/rotate
///
/// Rotate an API key: generate a new key, replace hash and prefix.
/// Returns the new plaintext key (shown once).
pub async fn rotate_api_key(
    RequireAdminKey(admin): RequireAdminKey,
    State(state): State<AppState>,
    Path(key_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let existing = ApiKeyRepo::find_by_id(&state.pool, key_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "ApiKey",
            id: key_id,
        }))?;

    let generated = generate_api_key();

    let rotated = ApiKeyRepo::rotate(&state.pool, key_id, &generated.hash, &generated.prefix)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "ApiKey",
            id: key_id,
        }))?;

    tracing::info!(
        api_key_id = key_id,
        old_prefix = %existing.key_prefix,
        new_prefix = %generated.prefix,
        admin = %admin.label(),
        "API key rotated",
    );

    let response = ApiKeyCreatedResponse {
        id: rotated.id,
        name: rotated.name,
        key_prefix: generated.prefix,
        plaintext_key: generated.plaintext,
        scope: rotated.scope,
        created_at: rotated.created_at,
    };

    Ok(Json(DataResponse { data: response }))
}

/// POST /api/v1/admin/api-keys/{id}/revoke
///
/// Instantly revoke an API key. Sets `revoked_at` and `is_active = false`.
pub async fn revoke_api_key(
    RequireAdminKey(admin): RequireAdminKey,
    State(state): State<AppState>,
    Path(key_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let revoked = ApiKeyRepo::revoke(&state.pool, key_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "ApiKey",
            id: key_id,
        }))?;

    tracing::info!(
        api_key_id = key_id,
        key_prefix = %revoked.key_prefix,
        admin = %admin.label(),
        "API key revoked",
    );

    Ok(Json(DataResponse { data: revoked }))
}
