//! Health check handler.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::state::AppState;

/// GET /health
///
/// Liveness plus a best-effort database round-trip. Always returns 200:
/// a degraded database is reported in the body, not as an error, so
/// load balancers can distinguish "down" from "up but degraded".
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_healthy = veritax_db::health_check(&state.pool).await.is_ok();

    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "db_healthy": db_healthy,
    }))
}
