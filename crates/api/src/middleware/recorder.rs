//! Correlation & audit recorder middleware.
//!
//! Wraps every request: resolves the correlation ID, times the call,
//! captures and masks request/response bodies, writes one audit record,
//! and emits the request metrics. All side effects are best-effort --
//! a failed audit write or metric emission is logged and swallowed,
//! never surfaced to the caller whose response is already prepared.
//!
//! The correlation ID is always echoed on the response header, and
//! injected as a `correlationId` field into 2xx JSON object bodies that
//! do not already carry one.

use std::time::Instant;

use axum::body::{to_bytes, Body, Bytes};
use axum::extract::{Request, State};
use axum::http::header::CONTENT_LENGTH;
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;
use serde_json::Value;
use veritax_core::correlation::{self, CORRELATION_FIELD, CORRELATION_HEADER};
use veritax_core::masking::mask;
use veritax_db::models::audit::CreateAuditRecord;
use veritax_db::repositories::AuditRepo;

use crate::middleware::auth::ActorContext;
use crate::middleware::rate_limit::{quota_header_values, QuotaSnapshot};
use crate::state::AppState;

/// Paths whose requests are not audited, to avoid recursive logging of
/// the audit and metrics surfaces themselves.
pub const AUDIT_EXEMPT_PREFIXES: &[&str] = &[
    "/metrics",
    "/api/v1/admin/audit-records",
    "/api/v1/admin/data-changes",
];

/// The request's resolved correlation ID, available to handlers via
/// request extensions (e.g. to link data-change records).
#[derive(Debug, Clone)]
pub struct CorrelationId(pub String);

/// Whether a path is exempt from audit recording.
pub fn is_audit_exempt(path: &str) -> bool {
    AUDIT_EXEMPT_PREFIXES.iter().any(|p| path.starts_with(p))
}

// ---------------------------------------------------------------------------
// Middleware
// ---------------------------------------------------------------------------

/// Record one request end-to-end. Always runs to completion on both
/// success and error responses.
pub async fn record_request(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let started = Instant::now();
    let timestamp = Utc::now();

    let method = req.method().as_str().to_string();
    let path = req.uri().path().to_string();
    let query = req.uri().query().map(str::to_string);
    let correlation_id = correlation::resolve(
        req.headers()
            .get(CORRELATION_HEADER)
            .and_then(|v| v.to_str().ok()),
    );
    let client_ip = client_ip(req.headers());
    let masked_headers = mask(&headers_to_json(req.headers()));

    // Buffer the request body so it can be captured and replayed to the
    // inner handler unchanged.
    let (parts, body) = req.into_parts();
    let request_bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, path = %path, "Failed to buffer request body");
            Bytes::new()
        }
    };
    let mut req = Request::from_parts(parts, Body::from(request_bytes.clone()));
    req.extensions_mut()
        .insert(CorrelationId(correlation_id.clone()));

    let response = next.run(req).await;

    let status = response.status();
    let actor = response.extensions().get::<ActorContext>().cloned();
    let quota = response.extensions().get::<QuotaSnapshot>().copied();

    // Buffer the response body for capture and possible rewriting.
    let (mut parts, body) = response.into_parts();
    let response_bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, path = %path, "Failed to buffer response body");
            Bytes::new()
        }
    };
    let mut response_json: Option<Value> = serde_json::from_slice(&response_bytes).ok();

    // Inject the correlation ID into successful JSON object bodies.
    let mut out_bytes = response_bytes;
    if status.is_success() {
        if let Some(Value::Object(map)) = response_json.as_mut() {
            if !map.contains_key(CORRELATION_FIELD) {
                map.insert(
                    CORRELATION_FIELD.to_string(),
                    Value::String(correlation_id.clone()),
                );
            }
            if let Ok(rewritten) = serde_json::to_vec(&map) {
                out_bytes = Bytes::from(rewritten);
            }
        }
    }
    // Keep the declared length in sync with the possibly-rewritten
    // body; bodyless responses (204, 304) stay without one.
    if !out_bytes.is_empty() || parts.headers.contains_key(CONTENT_LENGTH) {
        parts
            .headers
            .insert(CONTENT_LENGTH, HeaderValue::from(out_bytes.len() as u64));
    }

    // Correlation header on every response.
    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        parts.headers.insert(CORRELATION_HEADER, value);
    }

    // Quota headers for admitted, rate-limited-eligible requests (429
    // responses already carry theirs).
    if let Some(q) = quota {
        for (name, value) in quota_header_values(q.limit, q.remaining, q.reset_secs) {
            parts.headers.insert(name, value);
        }
    }

    let duration = started.elapsed();
    let actor_label = actor
        .as_ref()
        .map(ActorContext::label)
        .unwrap_or_else(|| "anonymous".to_string());

    let (error_type, error_message) = if status.as_u16() >= 400 {
        extract_error_fields(response_json.as_ref())
    } else {
        (None, None)
    };

    if !is_audit_exempt(&path) {
        crate::metrics::record_request(
            &path,
            &method,
            status.as_u16(),
            &actor_label,
            error_type.as_deref(),
            duration,
        );

        let record = CreateAuditRecord {
            correlation_id: correlation_id.clone(),
            timestamp,
            path,
            method,
            status_code: status.as_u16() as i16,
            duration_ms: duration.as_millis().min(i32::MAX as u128) as i32,
            client_ip,
            api_key_id: actor.as_ref().and_then(ActorContext::api_key_id),
            user_ref: actor.as_ref().and_then(ActorContext::user_ref),
            request_headers: Some(masked_headers),
            request_body: capture_request_body(&request_bytes, query.as_deref()),
            response_body: response_json.as_ref().map(mask),
            error_type,
            error_message,
        };

        // Fail-open: the response is already prepared, a lost audit
        // record must not alter it.
        let pool = state.pool.clone();
        tokio::spawn(async move {
            if let Err(e) = AuditRepo::insert(&pool, &record).await {
                tracing::warn!(
                    error = %e,
                    correlation_id = %record.correlation_id,
                    "Failed to persist audit record",
                );
            }
        });
    }

    Response::from_parts(parts, Body::from(out_bytes))
}

// ---------------------------------------------------------------------------
// Capture helpers
// ---------------------------------------------------------------------------

/// Best-effort masked snapshot of the request body: parsed JSON when
/// possible, otherwise the query parameters.
fn capture_request_body(bytes: &[u8], query: Option<&str>) -> Option<Value> {
    if let Ok(json) = serde_json::from_slice::<Value>(bytes) {
        return Some(mask(&json));
    }
    query.map(|q| mask(&query_params_json(q)))
}

/// Render a query string as a flat JSON object.
fn query_params_json(query: &str) -> Value {
    let mut map = serde_json::Map::new();
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        map.insert(key.to_string(), Value::String(value.to_string()));
    }
    Value::Object(map)
}

/// Render request headers as a JSON object for masking and storage.
fn headers_to_json(headers: &HeaderMap) -> Value {
    let mut map = serde_json::Map::new();
    for (name, value) in headers {
        map.insert(
            name.as_str().to_string(),
            Value::String(String::from_utf8_lossy(value.as_bytes()).into_owned()),
        );
    }
    Value::Object(map)
}

/// Client IP from forwarding headers, best-effort.
fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        })
}

/// Pull the structured error code/message out of an error response
/// body, when it follows the `{ "error": ..., "code": ... }` shape.
fn extract_error_fields(body: Option<&Value>) -> (Option<String>, Option<String>) {
    let Some(body) = body else {
        return (None, None);
    };
    let code = body.get("code").and_then(Value::as_str).map(str::to_string);
    let message = body
        .get("error")
        .and_then(Value::as_str)
        .map(str::to_string);
    (code, message)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn metrics_and_audit_paths_are_exempt() {
        assert!(is_audit_exempt("/metrics"));
        assert!(is_audit_exempt("/api/v1/admin/audit-records"));
        assert!(is_audit_exempt("/api/v1/admin/data-changes"));
        assert!(!is_audit_exempt("/api/v1/vehicles"));
        assert!(!is_audit_exempt("/health"));
    }

    #[test]
    fn sensitive_headers_are_masked() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer abc123".parse().unwrap());
        headers.insert("x-api-key", "plainkey".parse().unwrap());
        headers.insert("accept", "application/json".parse().unwrap());

        let masked = mask(&headers_to_json(&headers));
        assert_eq!(masked["authorization"], "********");
        assert_eq!(masked["x-api-key"], "********");
        assert_eq!(masked["accept"], "application/json");
    }

    #[test]
    fn query_params_become_object() {
        let value = query_params_json("plate=1234&status=active&flag");
        assert_eq!(value["plate"], "1234");
        assert_eq!(value["status"], "active");
        assert_eq!(value["flag"], "");
    }

    #[test]
    fn json_request_body_is_captured_masked() {
        let bytes = serde_json::to_vec(&json!({"nif": "1234567890123"})).unwrap();
        let captured = capture_request_body(&bytes, None).unwrap();
        assert_eq!(captured["nif"], "********90123");
    }

    #[test]
    fn non_json_body_falls_back_to_query() {
        let captured = capture_request_body(b"not-json", Some("q=abc")).unwrap();
        assert_eq!(captured["q"], "abc");
    }

    #[test]
    fn error_fields_come_from_problem_body() {
        let body = json!({"error": "Invalid API key", "code": "UNAUTHORIZED"});
        let (code, message) = extract_error_fields(Some(&body));
        assert_eq!(code.as_deref(), Some("UNAUTHORIZED"));
        assert_eq!(message.as_deref(), Some("Invalid API key"));
    }

    #[test]
    fn forwarded_ip_takes_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.9, 10.0.0.1".parse().unwrap());
        assert_eq!(client_ip(&headers).as_deref(), Some("203.0.113.9"));
    }
}
