//! Pull-based request metrics.
//!
//! A process-wide Prometheus recorder backs the `metrics` facade; the
//! `/metrics` route renders its snapshot in the Prometheus text
//! format. Counters and histograms are keyed by endpoint, method,
//! status, error code, and actor.

use ::metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Duration;

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the process-wide Prometheus recorder (idempotent) and return
/// the render handle.
pub fn prometheus_handle() -> PrometheusHandle {
    HANDLE
        .get_or_init(|| {
            PrometheusBuilder::new()
                .install_recorder()
                .expect("Failed to install Prometheus metrics recorder")
        })
        .clone()
}

/// Record one completed request: a total counter, a duration histogram,
/// and an error counter for statuses >= 400.
pub fn record_request(
    endpoint: &str,
    method: &str,
    status: u16,
    actor: &str,
    error_code: Option<&str>,
    duration: Duration,
) {
    counter!(
        "api_requests_total",
        "endpoint" => endpoint.to_string(),
        "method" => method.to_string(),
        "status" => status.to_string(),
        "actor" => actor.to_string()
    )
    .increment(1);

    histogram!(
        "api_request_duration_seconds",
        "endpoint" => endpoint.to_string(),
        "method" => method.to_string(),
        "status" => status.to_string(),
        "actor" => actor.to_string()
    )
    .record(duration.as_secs_f64());

    if status >= 400 {
        let code = error_code
            .map(str::to_string)
            .unwrap_or_else(|| format!("http_{status}"));
        counter!(
            "api_errors_total",
            "endpoint" => endpoint.to_string(),
            "method" => method.to_string(),
            "status" => status.to_string(),
            "actor" => actor.to_string(),
            "error_code" => code
        )
        .increment(1);
    }
}

/// Record one throttled (429) request.
pub fn record_rate_limited(endpoint: &str, method: &str, actor: &str) {
    counter!(
        "api_rate_limited_total",
        "endpoint" => endpoint.to_string(),
        "method" => method.to_string(),
        "actor" => actor.to_string()
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_install_is_idempotent() {
        let first = prometheus_handle();
        let _second = prometheus_handle();
        record_request("/health", "GET", 200, "anonymous", None, Duration::from_millis(3));
        assert!(first.render().contains("api_requests_total"));
    }

    #[test]
    fn recorded_requests_appear_in_render() {
        let handle = prometheus_handle();
        record_request(
            "/api/v1/admin/api-keys",
            "GET",
            401,
            "anonymous",
            Some("UNAUTHORIZED"),
            Duration::from_millis(1),
        );
        let rendered = handle.render();
        assert!(rendered.contains("api_requests_total"));
        assert!(rendered.contains("api_errors_total"));
    }
}
