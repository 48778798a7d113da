//! Webhook delivery vocabulary and retry policy.
//!
//! Shared between the dispatcher, the in-process delivery queue, and
//! the standalone worker binary so all of them agree on status strings,
//! attempt caps, and backoff delays.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Delivery status
// ---------------------------------------------------------------------------

/// Lifecycle of a delivery. Transitions are monotonic:
/// `Pending -> Success` or `Pending -> Failed`, never backward. A
/// `Failed` delivery with a scheduled next attempt is not yet terminal;
/// terminal failure clears the next-attempt timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Success,
    Failed,
}

impl DeliveryStatus {
    /// String representation for display, logging, and database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    /// Parse a stored status string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Retry policy
// ---------------------------------------------------------------------------

/// Maximum delivery attempts before a delivery is terminally failed.
pub const MAX_DELIVERY_ATTEMPTS: i16 = 3;

/// Fixed backoff schedule in seconds, indexed by `attempt_count - 1`.
pub const RETRY_SCHEDULE_SECS: [i64; 3] = [5, 30, 120];

/// Hard timeout for a single delivery HTTP request, in seconds.
pub const DELIVERY_TIMEOUT_SECS: u64 = 10;

/// Stored response bodies are truncated to this many characters.
pub const RESPONSE_BODY_CAP: usize = 4000;

/// Delay before the next attempt, given the attempt count just
/// recorded. Clamped to the last schedule entry once attempts exceed
/// the schedule length. Returns `None` when the attempt cap is reached
/// (terminal failure, no further retries).
pub fn retry_delay_secs(attempt_count: i16) -> Option<i64> {
    if attempt_count >= MAX_DELIVERY_ATTEMPTS {
        return None;
    }
    let index = (attempt_count.max(1) as usize - 1).min(RETRY_SCHEDULE_SECS.len() - 1);
    Some(RETRY_SCHEDULE_SECS[index])
}

/// Truncate a response body to [`RESPONSE_BODY_CAP`] characters.
pub fn truncate_response_body(body: &str) -> String {
    body.chars().take(RESPONSE_BODY_CAP).collect()
}

// ---------------------------------------------------------------------------
// Signature headers
// ---------------------------------------------------------------------------

/// Header carrying the hex HMAC-SHA256 signature.
pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

/// Header carrying the event type name.
pub const EVENT_TYPE_HEADER: &str = "x-webhook-event";

/// Header carrying the Unix timestamp of the attempt.
pub const TIMESTAMP_HEADER: &str = "x-webhook-timestamp";

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
