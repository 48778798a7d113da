//! Webhook subscription and delivery models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use veritax_core::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// A row from the `webhook_subscriptions` table.
///
/// Subscriptions are deactivated rather than deleted so delivery
/// history stays attributable.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WebhookSubscription {
    pub id: DbId,
    pub name: String,
    pub url: String,
    /// Shared HMAC secret. Never serialized, never transmitted.
    #[serde(skip_serializing)]
    pub secret: String,
    /// JSON array of subscribed event type names; empty means all.
    pub event_types: serde_json::Value,
    pub is_active: bool,
    pub owner: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl WebhookSubscription {
    /// Whether this subscription should receive `event_type`: an empty
    /// subscribed set means every event.
    pub fn accepts_event(&self, event_type: &str) -> bool {
        match self.event_types.as_array() {
            Some(types) if !types.is_empty() => {
                types.iter().any(|t| t.as_str() == Some(event_type))
            }
            _ => true,
        }
    }
}

/// DTO for creating a new subscription.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSubscription {
    pub name: String,
    pub url: String,
    pub secret: String,
    /// Event type names to subscribe to; empty means all events.
    #[serde(default)]
    pub event_types: Vec<String>,
    pub is_active: Option<bool>,
    pub owner: Option<String>,
}

/// DTO for updating an existing subscription.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateSubscription {
    pub name: Option<String>,
    pub url: Option<String>,
    pub secret: Option<String>,
    pub event_types: Option<Vec<String>>,
    pub is_active: Option<bool>,
}

// ---------------------------------------------------------------------------
// Delivery
// ---------------------------------------------------------------------------

/// A row from the `webhook_deliveries` table.
///
/// One row per (subscription, event) attempt lineage. `attempt_count`
/// only increases; a failed delivery with `next_attempt_at` set is
/// still retrying, terminal failure leaves it NULL.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WebhookDelivery {
    pub id: DbId,
    pub subscription_id: DbId,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub signature: String,
    pub status: String,
    pub attempt_count: i16,
    pub next_attempt_at: Option<Timestamp>,
    pub response_status_code: Option<i16>,
    /// Last response body, truncated to the storage cap.
    pub response_body: Option<String>,
    pub last_error: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn subscription(event_types: serde_json::Value) -> WebhookSubscription {
        WebhookSubscription {
            id: 1,
            name: "tax-office".to_string(),
            url: "https://example.org/hook".to_string(),
            secret: "s3cret".to_string(),
            event_types,
            is_active: true,
            owner: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn empty_event_set_accepts_everything() {
        let sub = subscription(json!([]));
        assert!(sub.accepts_event("api_version.published"));
        assert!(sub.accepts_event("webhook.test"));
    }

    #[test]
    fn listed_event_is_accepted() {
        let sub = subscription(json!(["fleet.imported"]));
        assert!(sub.accepts_event("fleet.imported"));
    }

    #[test]
    fn unlisted_event_is_rejected() {
        let sub = subscription(json!(["fleet.imported"]));
        assert!(!sub.accepts_event("webhook.test"));
    }
}
