//! HTTP transport for webhook delivery attempts.
//!
//! The [`WebhookTransport`] trait is the single network seam in the
//! delivery path, so the worker's classification and retry logic can be
//! exercised against a scripted transport in tests while production
//! uses the reqwest client with a hard timeout.

use std::time::Duration;

use async_trait::async_trait;
use veritax_core::webhooks::{
    DELIVERY_TIMEOUT_SECS, EVENT_TYPE_HEADER, SIGNATURE_HEADER, TIMESTAMP_HEADER,
};

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for transport-level delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The request did not complete within the delivery timeout.
    #[error("delivery request timed out")]
    Timeout,
}

// ---------------------------------------------------------------------------
// Request / response shapes
// ---------------------------------------------------------------------------

/// One signed outbound request.
#[derive(Debug, Clone, Copy)]
pub struct SignedRequest<'a> {
    pub url: &'a str,
    /// Hex HMAC-SHA256 over `body`.
    pub signature: &'a str,
    pub event_type: &'a str,
    /// Unix timestamp of this attempt.
    pub unix_timestamp: i64,
    /// Canonical JSON body. Receivers recompute the HMAC over exactly
    /// these bytes.
    pub body: &'a str,
}

/// What the worker needs to classify a completed request.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

// ---------------------------------------------------------------------------
// Transport trait + reqwest implementation
// ---------------------------------------------------------------------------

/// Executes one delivery POST.
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    async fn post(&self, request: SignedRequest<'_>) -> Result<TransportResponse, TransportError>;
}

/// Production transport: reqwest client with a pre-configured hard
/// timeout per request.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DELIVERY_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self { client }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WebhookTransport for HttpTransport {
    async fn post(&self, request: SignedRequest<'_>) -> Result<TransportResponse, TransportError> {
        let response = self
            .client
            .post(request.url)
            .header("content-type", "application/json")
            .header(SIGNATURE_HEADER, request.signature)
            .header(EVENT_TYPE_HEADER, request.event_type)
            .header(TIMESTAMP_HEADER, request.unix_timestamp.to_string())
            .body(request.body.to_string())
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Ok(TransportResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_does_not_panic() {
        let _transport = HttpTransport::new();
    }

    #[test]
    fn two_hundreds_are_success() {
        for status in [200, 201, 204, 299] {
            let resp = TransportResponse {
                status,
                body: String::new(),
            };
            assert!(resp.is_success(), "{status} should count as success");
        }
    }

    #[test]
    fn other_statuses_are_not_success() {
        for status in [199, 301, 400, 429, 500, 503] {
            let resp = TransportResponse {
                status,
                body: String::new(),
            };
            assert!(!resp.is_success(), "{status} should not count as success");
        }
    }

    #[test]
    fn transport_error_display_timeout() {
        let err = TransportError::Timeout;
        assert_eq!(err.to_string(), "delivery request timed out");
    }
}
