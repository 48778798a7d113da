//! Delivery worker: executes one webhook attempt and schedules retries.
//!
//! [`DeliveryWorker::attempt`] is safe to re-invoke for the same
//! delivery at any time -- it re-reads current state and skips anything
//! already terminal, which is what makes the at-least-once queue and
//! the polling recovery path composable without double-finalizing.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use veritax_core::canonical::canonicalize;
use veritax_core::signing::compute_signature;
use veritax_core::types::DbId;
use veritax_core::webhooks::{retry_delay_secs, truncate_response_body, DeliveryStatus};

use crate::queue::{DeliveryQueue, QueuedDelivery};
use crate::store::WebhookStore;
use crate::transport::{SignedRequest, TransportResponse, WebhookTransport};

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// What one invocation of [`DeliveryWorker::attempt`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The subscriber acknowledged with a 2xx; the delivery is final.
    Succeeded { status: u16 },
    /// The attempt failed and a retry is scheduled after `delay_secs`.
    Retrying { delay_secs: i64 },
    /// The attempt failed and the attempt cap is reached; no retry.
    TerminallyFailed,
    /// Nothing to do: unknown ID, already terminal, or the
    /// subscription was deactivated out-of-band.
    Skipped,
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

/// Executes delivery attempts against the injected store and transport.
pub struct DeliveryWorker {
    store: Arc<dyn WebhookStore>,
    transport: Arc<dyn WebhookTransport>,
    queue: DeliveryQueue,
}

impl DeliveryWorker {
    pub fn new(
        store: Arc<dyn WebhookStore>,
        transport: Arc<dyn WebhookTransport>,
        queue: DeliveryQueue,
    ) -> Self {
        Self {
            store,
            transport,
            queue,
        }
    }

    /// Execute one delivery attempt.
    pub async fn attempt(&self, delivery_id: DbId) -> Result<AttemptOutcome, sqlx::Error> {
        let Some((delivery, subscription)) = self.store.load_delivery(delivery_id).await? else {
            tracing::warn!(delivery_id, "Delivery not found, skipping attempt");
            return Ok(AttemptOutcome::Skipped);
        };

        // Already finalized: success, or failed with no retry scheduled.
        match DeliveryStatus::parse(&delivery.status) {
            Some(DeliveryStatus::Success) => return Ok(AttemptOutcome::Skipped),
            Some(DeliveryStatus::Failed) if delivery.next_attempt_at.is_none() => {
                return Ok(AttemptOutcome::Skipped)
            }
            _ => {}
        }

        // Retries are cancelled out-of-band by deactivating the
        // subscription.
        if !subscription.is_active {
            tracing::info!(
                delivery_id,
                subscription_id = subscription.id,
                "Subscription deactivated, skipping delivery"
            );
            return Ok(AttemptOutcome::Skipped);
        }

        // Recompute the signature from the stored payload and persist
        // it if the payload changed since the delivery was created.
        let body = canonicalize(&delivery.payload);
        let signature = compute_signature(&subscription.secret, &body);
        if signature != delivery.signature {
            self.store.update_signature(delivery.id, &signature).await?;
        }

        let request = SignedRequest {
            url: &subscription.url,
            signature: &signature,
            event_type: &delivery.event_type,
            unix_timestamp: Utc::now().timestamp(),
            body: &body,
        };

        match self.transport.post(request).await {
            Ok(response) if response.is_success() => {
                self.store
                    .mark_success(delivery.id, response.status as i16)
                    .await?;
                tracing::info!(
                    delivery_id = delivery.id,
                    subscription_id = subscription.id,
                    status = response.status,
                    attempt = delivery.attempt_count + 1,
                    "Webhook delivered",
                );
                Ok(AttemptOutcome::Succeeded {
                    status: response.status,
                })
            }
            Ok(response) => {
                let error = format!("Webhook returned HTTP {}", response.status);
                self.record_failure(&delivery, Some(&response), &error).await
            }
            Err(e) => {
                let error = e.to_string();
                self.record_failure(&delivery, None, &error).await
            }
        }
    }

    /// Persist a failed attempt and schedule the retry when the cap
    /// allows one.
    async fn record_failure(
        &self,
        delivery: &veritax_db::models::webhook::WebhookDelivery,
        response: Option<&TransportResponse>,
        error: &str,
    ) -> Result<AttemptOutcome, sqlx::Error> {
        let attempts_after = delivery.attempt_count + 1;
        let delay_secs = retry_delay_secs(attempts_after);
        let next_attempt_at = delay_secs.map(|d| Utc::now() + chrono::Duration::seconds(d));

        let response_body = response.map(|r| truncate_response_body(&r.body));
        self.store
            .mark_failure(
                delivery.id,
                response.map(|r| r.status as i16),
                response_body.as_deref(),
                error,
                next_attempt_at,
            )
            .await?;

        match delay_secs {
            Some(delay) => {
                tracing::warn!(
                    delivery_id = delivery.id,
                    attempt = attempts_after,
                    delay_secs = delay,
                    error,
                    "Webhook delivery failed, retry scheduled",
                );
                self.queue
                    .enqueue(delivery.id, Duration::from_secs(delay as u64));
                Ok(AttemptOutcome::Retrying { delay_secs: delay })
            }
            None => {
                tracing::error!(
                    delivery_id = delivery.id,
                    attempt = attempts_after,
                    error,
                    "Webhook delivery failed terminally",
                );
                Ok(AttemptOutcome::TerminallyFailed)
            }
        }
    }

    /// Drain the delivery queue until cancelled.
    ///
    /// Each queued item is handled on its own task so one slow
    /// subscriber cannot stall the queue; the per-item delay is the
    /// retry backoff.
    pub async fn run(
        self: Arc<Self>,
        mut rx: mpsc::UnboundedReceiver<QueuedDelivery>,
        cancel: CancellationToken,
    ) {
        tracing::info!("Delivery worker started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Delivery worker stopping");
                    break;
                }
                item = rx.recv() => {
                    let Some(QueuedDelivery { delivery_id, delay }) = item else {
                        tracing::info!("Delivery queue closed, worker shutting down");
                        break;
                    };
                    let worker = Arc::clone(&self);
                    tokio::spawn(async move {
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                        if let Err(e) = worker.attempt(delivery_id).await {
                            tracing::error!(
                                delivery_id,
                                error = %e,
                                "Delivery attempt errored",
                            );
                        }
                    });
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;
    use veritax_core::webhooks::{MAX_DELIVERY_ATTEMPTS, RESPONSE_BODY_CAP};

    use crate::dispatcher::WebhookDispatcher;
    use crate::store::InMemoryWebhookStore;
    use crate::transport::TransportError;

    // -- Mock transport ----------------------------------------------------

    #[derive(Debug, Clone)]
    struct RecordedRequest {
        url: String,
        signature: String,
        event_type: String,
        body: String,
    }

    /// Transport scripted with a queue of responses; records every
    /// request it sees.
    #[derive(Default)]
    struct MockTransport {
        responses: Mutex<VecDeque<Result<TransportResponse, TransportError>>>,
        requests: Mutex<Vec<RecordedRequest>>,
    }

    impl MockTransport {
        fn respond_with(&self, response: Result<TransportResponse, TransportError>) {
            self.responses.lock().unwrap().push_back(response);
        }

        fn ok(&self, status: u16) {
            self.respond_with(Ok(TransportResponse {
                status,
                body: "ok".to_string(),
            }));
        }

        fn requests(&self) -> Vec<RecordedRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl WebhookTransport for MockTransport {
        async fn post(
            &self,
            request: SignedRequest<'_>,
        ) -> Result<TransportResponse, TransportError> {
            self.requests.lock().unwrap().push(RecordedRequest {
                url: request.url.to_string(),
                signature: request.signature.to_string(),
                event_type: request.event_type.to_string(),
                body: request.body.to_string(),
            });
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| {
                    Ok(TransportResponse {
                        status: 500,
                        body: "unscripted".to_string(),
                    })
                })
        }
    }

    // -- Harness -----------------------------------------------------------

    struct Harness {
        store: Arc<InMemoryWebhookStore>,
        transport: Arc<MockTransport>,
        worker: DeliveryWorker,
        queue_rx: mpsc::UnboundedReceiver<QueuedDelivery>,
    }

    fn harness() -> Harness {
        let store = Arc::new(InMemoryWebhookStore::new());
        let transport = Arc::new(MockTransport::default());
        let (queue, queue_rx) = DeliveryQueue::new();
        let worker = DeliveryWorker::new(
            Arc::clone(&store) as Arc<dyn WebhookStore>,
            Arc::clone(&transport) as Arc<dyn WebhookTransport>,
            queue,
        );
        Harness {
            store,
            transport,
            worker,
            queue_rx,
        }
    }

    async fn seed_delivery(store: &InMemoryWebhookStore, secret: &str) -> DbId {
        let subscription_id =
            store.add_subscription("sub", "https://example.org/hook", secret, vec![], true);
        let payload = json!({"message": "hi"});
        let signature = compute_signature(secret, &canonicalize(&payload));
        store
            .create_delivery(subscription_id, "test.event", &payload, &signature)
            .await
            .unwrap()
            .id
    }

    // -- Success path ------------------------------------------------------

    #[tokio::test]
    async fn successful_attempt_finalizes_delivery() {
        let h = harness();
        let delivery_id = seed_delivery(&h.store, "s3cret").await;
        h.transport.ok(200);

        let outcome = h.worker.attempt(delivery_id).await.unwrap();
        assert_eq!(outcome, AttemptOutcome::Succeeded { status: 200 });

        let delivery = h.store.delivery(delivery_id).unwrap();
        assert_eq!(delivery.status, "success");
        assert_eq!(delivery.attempt_count, 1);
        assert_eq!(delivery.next_attempt_at, None);
        assert_eq!(delivery.last_error, None);
        assert_eq!(delivery.response_status_code, Some(200));
    }

    #[tokio::test]
    async fn request_carries_signature_event_and_canonical_body() {
        let h = harness();
        let delivery_id = seed_delivery(&h.store, "s3cret").await;
        h.transport.ok(200);

        h.worker.attempt(delivery_id).await.unwrap();

        let requests = h.transport.requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.url, "https://example.org/hook");
        assert_eq!(request.event_type, "test.event");
        assert_eq!(request.body, r#"{"message":"hi"}"#);
        assert_eq!(
            request.signature,
            compute_signature("s3cret", r#"{"message":"hi"}"#)
        );
    }

    // -- Retry path --------------------------------------------------------

    #[tokio::test]
    async fn failing_subscriber_walks_the_backoff_schedule() {
        let mut h = harness();
        let delivery_id = seed_delivery(&h.store, "s3cret").await;

        // Attempt 1: retry in 5 s.
        h.transport.ok(500);
        let outcome = h.worker.attempt(delivery_id).await.unwrap();
        assert_eq!(outcome, AttemptOutcome::Retrying { delay_secs: 5 });
        let delivery = h.store.delivery(delivery_id).unwrap();
        assert_eq!(delivery.status, "failed");
        assert_eq!(delivery.attempt_count, 1);
        assert!(delivery.next_attempt_at.is_some());

        // Attempt 2: retry in 30 s.
        h.transport.ok(500);
        let outcome = h.worker.attempt(delivery_id).await.unwrap();
        assert_eq!(outcome, AttemptOutcome::Retrying { delay_secs: 30 });
        assert_eq!(h.store.delivery(delivery_id).unwrap().attempt_count, 2);

        // Attempt 3: terminal.
        h.transport.ok(500);
        let outcome = h.worker.attempt(delivery_id).await.unwrap();
        assert_eq!(outcome, AttemptOutcome::TerminallyFailed);

        let delivery = h.store.delivery(delivery_id).unwrap();
        assert_eq!(delivery.status, "failed");
        assert_eq!(delivery.attempt_count, MAX_DELIVERY_ATTEMPTS);
        assert_eq!(delivery.next_attempt_at, None);

        // The retries re-entered the queue with their backoff delays.
        let first = h.queue_rx.recv().await.unwrap();
        assert_eq!(first.delay, Duration::from_secs(5));
        let second = h.queue_rx.recv().await.unwrap();
        assert_eq!(second.delay, Duration::from_secs(30));
        // No fourth attempt was queued.
        assert!(h.queue_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn terminal_delivery_is_not_reattempted() {
        let h = harness();
        let delivery_id = seed_delivery(&h.store, "s3cret").await;
        for _ in 0..3 {
            h.transport.ok(500);
            h.worker.attempt(delivery_id).await.unwrap();
        }

        // A stray re-invocation after terminal failure is a no-op.
        let outcome = h.worker.attempt(delivery_id).await.unwrap();
        assert_eq!(outcome, AttemptOutcome::Skipped);
        assert_eq!(
            h.store.delivery(delivery_id).unwrap().attempt_count,
            MAX_DELIVERY_ATTEMPTS
        );
    }

    #[tokio::test]
    async fn delivery_succeeds_on_retry_after_failure() {
        let h = harness();
        let delivery_id = seed_delivery(&h.store, "s3cret").await;

        h.transport.ok(503);
        h.worker.attempt(delivery_id).await.unwrap();
        h.transport.ok(204);
        let outcome = h.worker.attempt(delivery_id).await.unwrap();

        assert_eq!(outcome, AttemptOutcome::Succeeded { status: 204 });
        let delivery = h.store.delivery(delivery_id).unwrap();
        assert_eq!(delivery.status, "success");
        assert_eq!(delivery.attempt_count, 2);
        assert_eq!(delivery.last_error, None);
    }

    #[tokio::test]
    async fn transport_errors_are_recorded_and_retried() {
        let h = harness();
        let delivery_id = seed_delivery(&h.store, "s3cret").await;
        h.transport.respond_with(Err(TransportError::Timeout));

        let outcome = h.worker.attempt(delivery_id).await.unwrap();
        assert_eq!(outcome, AttemptOutcome::Retrying { delay_secs: 5 });

        let delivery = h.store.delivery(delivery_id).unwrap();
        assert_eq!(delivery.status, "failed");
        assert_eq!(
            delivery.last_error.as_deref(),
            Some("delivery request timed out")
        );
        assert_eq!(delivery.response_status_code, None);
    }

    #[tokio::test]
    async fn stored_response_bodies_are_truncated() {
        let h = harness();
        let delivery_id = seed_delivery(&h.store, "s3cret").await;
        h.transport.respond_with(Ok(TransportResponse {
            status: 500,
            body: "e".repeat(RESPONSE_BODY_CAP + 1000),
        }));

        h.worker.attempt(delivery_id).await.unwrap();

        let delivery = h.store.delivery(delivery_id).unwrap();
        assert_eq!(
            delivery.response_body.as_ref().map(String::len),
            Some(RESPONSE_BODY_CAP)
        );
    }

    // -- Skips -------------------------------------------------------------

    #[tokio::test]
    async fn unknown_delivery_is_skipped() {
        let h = harness();
        let outcome = h.worker.attempt(9999).await.unwrap();
        assert_eq!(outcome, AttemptOutcome::Skipped);
    }

    #[tokio::test]
    async fn succeeded_delivery_is_not_resent() {
        let h = harness();
        let delivery_id = seed_delivery(&h.store, "s3cret").await;
        h.transport.ok(200);
        h.worker.attempt(delivery_id).await.unwrap();

        let outcome = h.worker.attempt(delivery_id).await.unwrap();
        assert_eq!(outcome, AttemptOutcome::Skipped);
        assert_eq!(h.transport.requests().len(), 1);
    }

    // -- End-to-end scenario -----------------------------------------------

    #[tokio::test]
    async fn dispatch_then_delivery_round_trip() {
        let store = Arc::new(InMemoryWebhookStore::new());
        store.add_subscription("all", "https://example.org/hook", "s3cret", vec![], true);
        let transport = Arc::new(MockTransport::default());
        let (queue, mut rx) = DeliveryQueue::new();
        let dispatcher =
            WebhookDispatcher::new(Arc::clone(&store) as Arc<dyn WebhookStore>, queue.clone());
        let worker = DeliveryWorker::new(
            Arc::clone(&store) as Arc<dyn WebhookStore>,
            Arc::clone(&transport) as Arc<dyn WebhookTransport>,
            queue,
        );

        let created = dispatcher.dispatch("test.event", &json!({"message": "hi"})).await;
        assert_eq!(created, 1);

        let pending = store.deliveries();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].status, "pending");
        assert!(!pending[0].signature.is_empty());

        transport.ok(200);
        let queued = rx.recv().await.unwrap();
        let outcome = worker.attempt(queued.delivery_id).await.unwrap();
        assert_eq!(outcome, AttemptOutcome::Succeeded { status: 200 });

        let delivery = store.delivery(queued.delivery_id).unwrap();
        assert_eq!(delivery.status, "success");
        assert_eq!(delivery.attempt_count, 1);
        assert_eq!(delivery.next_attempt_at, None);
    }

    // -- Queue consumer ----------------------------------------------------

    #[tokio::test]
    async fn run_drains_queue_until_cancelled() {
        let store = Arc::new(InMemoryWebhookStore::new());
        let delivery_id = seed_delivery(&store, "s3cret").await;
        let transport = Arc::new(MockTransport::default());
        transport.ok(200);

        let (queue, rx) = DeliveryQueue::new();
        let worker = Arc::new(DeliveryWorker::new(
            Arc::clone(&store) as Arc<dyn WebhookStore>,
            Arc::clone(&transport) as Arc<dyn WebhookTransport>,
            queue.clone(),
        ));

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(Arc::clone(&worker).run(rx, cancel.clone()));

        queue.enqueue(delivery_id, Duration::ZERO);

        // Wait for the spawned attempt to finalize the delivery.
        for _ in 0..50 {
            if store.delivery(delivery_id).unwrap().status == "success" {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(store.delivery(delivery_id).unwrap().status, "success");

        cancel.cancel();
        handle.await.unwrap();
    }
}
