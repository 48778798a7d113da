use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use veritax_core::rate_limit::{InMemoryWindowStore, RateLimiter};
use veritax_events::WebhookDispatcher;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: veritax_db::DbPool,
    /// Server configuration (accessed by middleware and handlers).
    pub config: Arc<ServerConfig>,
    /// Shared sliding-window rate limiter.
    pub limiter: Arc<RateLimiter<InMemoryWindowStore>>,
    /// Webhook dispatcher for domain-event fan-out.
    pub dispatcher: Arc<WebhookDispatcher>,
    /// Prometheus render handle for the pull-based metrics endpoint.
    pub metrics: PrometheusHandle,
}
