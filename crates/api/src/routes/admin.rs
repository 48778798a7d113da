//! Route definitions for the admin governance surface.
//!
//! All handlers mounted here require an admin-scoped API key via
//! [`RequireAdminKey`](crate::middleware::auth::RequireAdminKey).

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::{api_keys, audit, chain, webhooks};
use crate::state::AppState;

/// Admin API key management routes mounted at `/admin/api-keys`.
pub fn api_keys_router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(api_keys::list_api_keys).post(api_keys::create_api_key),
        )
        .route("/{id}", put(api_keys::update_api_key))
        .route("/{id}/rotate", post(api_keys::rotate_api_key))
        .route("/{id}/revoke", post(api_keys::revoke_api_key))
}

/// Admin webhook management routes mounted at `/admin/webhooks`.
pub fn webhooks_router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(webhooks::list_subscriptions).post(webhooks::create_subscription),
        )
        .route(
            "/{id}",
            put(webhooks::update_subscription).delete(webhooks::deactivate_subscription),
        )
        .route("/{id}/deliveries", get(webhooks::list_deliveries))
        .route("/{id}/test", post(webhooks::test_subscription))
}

/// Audit record query routes mounted at `/admin/audit-records`.
pub fn audit_records_router() -> Router<AppState> {
    Router::new().route("/", get(audit::query_audit_records))
}

/// Data-change routes mounted at `/admin/data-changes`.
pub fn data_changes_router() -> Router<AppState> {
    Router::new().route(
        "/",
        get(audit::query_data_changes).post(audit::record_data_change),
    )
}

/// Chain routes mounted at `/admin/audit-chain`.
pub fn audit_chain_router() -> Router<AppState> {
    Router::new()
        .route("/records", post(chain::append_record))
        .route("/verify", get(chain::verify_chain))
}
