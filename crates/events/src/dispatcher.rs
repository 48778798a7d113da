//! Webhook dispatcher: fan an event out to matching subscriptions.
//!
//! Dispatch is the explicit call business handlers make when a domain
//! event occurs ("API version published", a privileged fleet action, a
//! test event). It creates the delivery records and hands them to the
//! queue; the network attempts happen elsewhere, so dispatch never
//! blocks the caller on I/O.

use std::sync::Arc;
use std::time::Duration;

use veritax_core::canonical::canonicalize;
use veritax_core::signing::compute_signature;

use crate::queue::DeliveryQueue;
use crate::store::WebhookStore;

/// Creates signed delivery records for every active, matching
/// subscription and enqueues the attempts.
pub struct WebhookDispatcher {
    store: Arc<dyn WebhookStore>,
    queue: DeliveryQueue,
}

impl WebhookDispatcher {
    pub fn new(store: Arc<dyn WebhookStore>, queue: DeliveryQueue) -> Self {
        Self { store, queue }
    }

    /// Dispatch `event_type` with `payload` to all matching
    /// subscriptions. Returns the number of deliveries created.
    ///
    /// Store failures are logged per subscription and do not abort the
    /// fan-out to the remaining subscriptions; the caller is
    /// fire-and-forget and never notified synchronously.
    pub async fn dispatch(&self, event_type: &str, payload: &serde_json::Value) -> usize {
        let subscriptions = match self.store.list_active_subscriptions().await {
            Ok(subs) => subs,
            Err(e) => {
                tracing::error!(error = %e, event_type, "Failed to load webhook subscriptions");
                return 0;
            }
        };

        let canonical = canonicalize(payload);
        let mut created = 0;

        for subscription in subscriptions {
            if !subscription.accepts_event(event_type) {
                continue;
            }

            let signature = compute_signature(&subscription.secret, &canonical);

            match self
                .store
                .create_delivery(subscription.id, event_type, payload, &signature)
                .await
            {
                Ok(delivery) => {
                    self.queue.enqueue(delivery.id, Duration::ZERO);
                    created += 1;
                    tracing::debug!(
                        delivery_id = delivery.id,
                        subscription_id = subscription.id,
                        event_type,
                        "Webhook delivery enqueued",
                    );
                }
                Err(e) => {
                    tracing::error!(
                        subscription_id = subscription.id,
                        event_type,
                        error = %e,
                        "Failed to create webhook delivery",
                    );
                }
            }
        }

        created
    }

    /// Create and enqueue a delivery for one specific subscription,
    /// bypassing the event-type filter. Used by the admin "test
    /// delivery" endpoint to verify connectivity.
    pub async fn dispatch_to_subscription(
        &self,
        subscription: &veritax_db::models::webhook::WebhookSubscription,
        event_type: &str,
        payload: &serde_json::Value,
    ) -> Result<veritax_db::models::webhook::WebhookDelivery, sqlx::Error> {
        let canonical = canonicalize(payload);
        let signature = compute_signature(&subscription.secret, &canonical);
        let delivery = self
            .store
            .create_delivery(subscription.id, event_type, payload, &signature)
            .await?;
        self.queue.enqueue(delivery.id, Duration::ZERO);
        Ok(delivery)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
