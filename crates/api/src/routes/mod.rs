//! Route definitions.

pub mod admin;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /admin/api-keys                      list, create (admin key only)
/// /admin/api-keys/{id}                 update
/// /admin/api-keys/{id}/rotate          rotate (POST)
/// /admin/api-keys/{id}/revoke          revoke (POST)
///
/// /admin/webhooks                      list, create
/// /admin/webhooks/{id}                 update, deactivate
/// /admin/webhooks/{id}/deliveries      delivery history
/// /admin/webhooks/{id}/test            test delivery (POST)
///
/// /admin/audit-records                 filtered audit query
/// /admin/data-changes                  record (POST), filtered query
/// /admin/audit-chain/records           append chain record (POST)
/// /admin/audit-chain/verify            integrity verification
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/admin/api-keys", admin::api_keys_router())
        .nest("/admin/webhooks", admin::webhooks_router())
        .nest("/admin/audit-records", admin::audit_records_router())
        .nest("/admin/data-changes", admin::data_changes_router())
        .nest("/admin/audit-chain", admin::audit_chain_router())
}
