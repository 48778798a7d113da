//! Per-key rate limiting middleware.
//!
//! Runs after [`authenticate`](crate::middleware::auth::authenticate):
//! requests carrying a resolved API key are checked against both
//! sliding windows with the key's own budgets. Keyless requests are not
//! subject to the limiter (they either failed auth already or target a
//! public route).

use axum::extract::{Request, State};
use axum::http::{HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::Utc;

use crate::error::AppError;
use crate::middleware::auth::ActorContext;
use crate::state::AppState;

/// Quota metadata from the binding window, attached to admitted
/// responses so the recorder can emit the rate-limit headers.
#[derive(Debug, Clone, Copy)]
pub struct QuotaSnapshot {
    pub limit: u32,
    pub remaining: u32,
    pub reset_secs: i64,
}

/// Build the `X-RateLimit-*` header triple.
pub fn quota_header_values(
    limit: u32,
    remaining: u32,
    reset_secs: i64,
) -> Vec<(HeaderName, HeaderValue)> {
    let numeric = |v: String| {
        HeaderValue::from_str(&v).expect("numeric strings are valid header values")
    };
    vec![
        (
            HeaderName::from_static("x-ratelimit-limit"),
            numeric(limit.to_string()),
        ),
        (
            HeaderName::from_static("x-ratelimit-remaining"),
            numeric(remaining.to_string()),
        ),
        (
            HeaderName::from_static("x-ratelimit-reset"),
            numeric(reset_secs.max(0).to_string()),
        ),
    ]
}

/// Check the caller's budgets and reject with 429 when exhausted.
pub async fn enforce_rate_limit(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let Some(ActorContext::ApiKey {
        id, prefix, quota, ..
    }) = req.extensions().get::<ActorContext>().cloned()
    else {
        return next.run(req).await;
    };

    let outcome = state
        .limiter
        .check_and_record(&format!("key:{id}"), quota, Utc::now());
    let binding = outcome.binding();

    if !outcome.allowed() {
        crate::metrics::record_rate_limited(
            req.uri().path(),
            req.method().as_str(),
            &format!("key:{prefix}"),
        );
        tracing::warn!(
            api_key_id = id,
            key_prefix = %prefix,
            limit = binding.limit,
            reset_secs = binding.reset_secs,
            "Request rate limited",
        );
        return AppError::RateLimited {
            limit: binding.limit,
            remaining: binding.remaining,
            reset_secs: binding.reset_secs,
        }
        .into_response();
    }

    let snapshot = QuotaSnapshot {
        limit: binding.limit,
        remaining: binding.remaining,
        reset_secs: binding.reset_secs,
    };

    let mut response = next.run(req).await;
    response.extensions_mut().insert(snapshot);
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_headers_render_numeric_values() {
        let headers = quota_header_values(1000, 41, 732);
        let rendered: Vec<(String, String)> = headers
            .into_iter()
            .map(|(n, v)| (n.to_string(), v.to_str().unwrap().to_string()))
            .collect();
        assert_eq!(
            rendered,
            vec![
                ("x-ratelimit-limit".to_string(), "1000".to_string()),
                ("x-ratelimit-remaining".to_string(), "41".to_string()),
                ("x-ratelimit-reset".to_string(), "732".to_string()),
            ]
        );
    }

    #[test]
    fn negative_reset_is_clamped_to_zero() {
        let headers = quota_header_values(10, 0, -3);
        assert_eq!(headers[2].1.to_str().unwrap(), "0");
    }
}
