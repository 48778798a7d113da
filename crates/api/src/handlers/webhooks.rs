//! Admin handlers for webhook subscription management.
//!
//! All endpoints require an admin-scoped key via [`RequireAdminKey`].
//! Provides subscription CRUD, delivery history, and test deliveries.
//! Subscriptions are deactivated rather than deleted so delivery
//! history survives.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use veritax_core::error::CoreError;
use veritax_core::types::DbId;
use veritax_db::models::webhook::{CreateSubscription, UpdateSubscription};
use veritax_db::repositories::WebhookRepo;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::RequireAdminKey;
use crate::query::{clamp_limit, clamp_offset, PaginationParams, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Subscription CRUD
// ---------------------------------------------------------------------------

/// POST /api/v1/admin/webhooks
///
/// Create a new webhook subscription.
pub async fn create_subscription(
    RequireAdminKey(admin): RequireAdminKey,
    State(state): State<AppState>,
    Json(input): Json<CreateSubscription>,
) -> AppResult<impl IntoResponse> {
    if input.name.trim().is_empty() {
        return Err(AppError::BadRequest("name must not be empty".into()));
    }
    if !input.url.starts_with("http://") && !input.url.starts_with("https://") {
        return Err(AppError::BadRequest(
            "url must be an http(s) endpoint".into(),
        ));
    }
    if input.secret.is_empty() {
        return Err(AppError::BadRequest("secret must not be empty".into()));
    }

    let event_types_json = serde_json::json!(input.event_types);

    let subscription = WebhookRepo::create(
        &state.pool,
        input.name.trim(),
        input.url.trim(),
        &input.secret,
        &event_types_json,
        input.is_active.unwrap_or(true),
        input.owner.as_deref(),
    )
    .await?;

    tracing::info!(
        subscription_id = subscription.id,
        url = %subscription.url,
        admin = %admin.label(),
        "Webhook subscription created",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: subscription })))
}

/// GET /api/v1/admin/webhooks
///
/// List all subscriptions.
pub async fn list_subscriptions(
    _admin: RequireAdminKey,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let subscriptions = WebhookRepo::list(&state.pool).await?;
    Ok(Json(DataResponse {
        data: subscriptions,
    }))
}

/// PUT /api/v1/admin/webhooks/{id}
///
/// Update a subscription's settings (name, URL, secret, event types,
/// active flag).
pub async fn update_subscription(
    RequireAdminKey(admin): RequireAdminKey,
    State(state): State<AppState>,
    Path(subscription_id): Path<DbId>,
    Json(input): Json<UpdateSubscription>,
) -> AppResult<impl IntoResponse> {
    let event_types_json = input.event_types.as_ref().map(|et| serde_json::json!(et));

    let updated = WebhookRepo::update(
        &state.pool,
        subscription_id,
        input.name.as_deref(),
        input.url.as_deref(),
        input.secret.as_deref(),
        event_types_json.as_ref(),
        input.is_active,
    )
    .await?
    .ok_or(AppError::Core(CoreError::NotFound {
        entity: "WebhookSubscription",
        id: subscription_id,
    }))?;

    tracing::info!(
        subscription_id,
        admin = %admin.label(),
        "Webhook subscription updated",
    );

    Ok(Json(DataResponse { data: updated }))
}

/// DELETE /api/v1/admin/webhooks/{id}
///
/// Deactivate a subscription. Delivery history is preserved.
pub async fn deactivate_subscription(
    RequireAdminKey(admin): RequireAdminKey,
    State(state): State<AppState>,
    Path(subscription_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let deactivated = WebhookRepo::deactivate(&state.pool, subscription_id).await?;

    if !deactivated {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "WebhookSubscription",
            id: subscription_id,
        }));
    }

    tracing::info!(
        subscription_id,
        admin = %admin.label(),
        "Webhook subscription deactivated",
    );

    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Delivery management
// ---------------------------------------------------------------------------

/// GET /api/v1/admin/webhooks/{id}/deliveries
///
/// List delivery history for a specific subscription.
pub async fn list_deliveries(
    _admin: RequireAdminKey,
    State(state): State<AppState>,
    Path(subscription_id): Path<DbId>,
    Query(params): Query<PaginationParams>,
) -> AppResult<impl IntoResponse> {
    // Verify the subscription exists
    WebhookRepo::find_by_id(&state.pool, subscription_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "WebhookSubscription",
            id: subscription_id,
        }))?;

    let limit = clamp_limit(params.limit, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT);
    let offset = clamp_offset(params.offset);

    let deliveries =
        WebhookRepo::list_deliveries_for_subscription(&state.pool, subscription_id, limit, offset)
            .await?;

    Ok(Json(DataResponse { data: deliveries }))
}

/// POST /api/v1/admin/webhooks/{id}/test
///
/// Create and enqueue a test delivery to verify connectivity.
pub async fn test_subscription(
    RequireAdminKey(admin): RequireAdminKey,
    State(state): State<AppState>,
    Path(subscription_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let subscription = WebhookRepo::find_by_id(&state.pool, subscription_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "WebhookSubscription",
            id: subscription_id,
        }))?;

    let payload = serde_json::json!({
        "event": "webhook.test",
        "subscription_id": subscription.id,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "message": "This is a test delivery to verify webhook connectivity.",
    });

    let delivery = state
        .dispatcher
        .dispatch_to_subscription(&subscription, "webhook.test", &payload)
        .await?;

    tracing::info!(
        subscription_id,
        delivery_id = delivery.id,
        admin = %admin.label(),
        "Test webhook delivery created",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: delivery })))
}
