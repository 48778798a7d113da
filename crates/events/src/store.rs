//! Persistence seam for webhook dispatch and delivery.
//!
//! [`WebhookStore`] abstracts the subscription/delivery tables so the
//! dispatcher and worker run unchanged against Postgres in production
//! ([`PgWebhookStore`] over the repositories) or the mutex-guarded
//! [`InMemoryWebhookStore`] in tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use veritax_core::types::{DbId, Timestamp};
use veritax_core::webhooks::DeliveryStatus;
use veritax_db::models::webhook::{WebhookDelivery, WebhookSubscription};
use veritax_db::repositories::WebhookRepo;
use veritax_db::DbPool;

// ---------------------------------------------------------------------------
// Store trait
// ---------------------------------------------------------------------------

/// Subscription and delivery persistence as the dispatcher and worker
/// consume it.
#[async_trait]
pub trait WebhookStore: Send + Sync {
    /// Active subscriptions, the dispatcher's fan-out set.
    async fn list_active_subscriptions(&self) -> Result<Vec<WebhookSubscription>, sqlx::Error>;

    /// Insert a `pending` delivery with the next attempt due now.
    async fn create_delivery(
        &self,
        subscription_id: DbId,
        event_type: &str,
        payload: &serde_json::Value,
        signature: &str,
    ) -> Result<WebhookDelivery, sqlx::Error>;

    /// Load a delivery together with its subscription.
    async fn load_delivery(
        &self,
        delivery_id: DbId,
    ) -> Result<Option<(WebhookDelivery, WebhookSubscription)>, sqlx::Error>;

    /// Persist a recomputed signature.
    async fn update_signature(&self, delivery_id: DbId, signature: &str)
        -> Result<(), sqlx::Error>;

    /// Finalize a successful delivery.
    async fn mark_success(&self, delivery_id: DbId, status_code: i16) -> Result<(), sqlx::Error>;

    /// Record a failed attempt; `next_attempt_at = None` is terminal.
    async fn mark_failure(
        &self,
        delivery_id: DbId,
        status_code: Option<i16>,
        response_body: Option<&str>,
        error: &str,
        next_attempt_at: Option<Timestamp>,
    ) -> Result<(), sqlx::Error>;

    /// Non-terminal deliveries whose next attempt is due.
    async fn list_due(&self, limit: i64) -> Result<Vec<WebhookDelivery>, sqlx::Error>;
}

// ---------------------------------------------------------------------------
// Postgres implementation
// ---------------------------------------------------------------------------

/// Production store delegating to the repositories.
pub struct PgWebhookStore {
    pool: DbPool,
}

impl PgWebhookStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WebhookStore for PgWebhookStore {
    async fn list_active_subscriptions(&self) -> Result<Vec<WebhookSubscription>, sqlx::Error> {
        WebhookRepo::list_active(&self.pool).await
    }

    async fn create_delivery(
        &self,
        subscription_id: DbId,
        event_type: &str,
        payload: &serde_json::Value,
        signature: &str,
    ) -> Result<WebhookDelivery, sqlx::Error> {
        WebhookRepo::create_delivery(&self.pool, subscription_id, event_type, payload, signature)
            .await
    }

    async fn load_delivery(
        &self,
        delivery_id: DbId,
    ) -> Result<Option<(WebhookDelivery, WebhookSubscription)>, sqlx::Error> {
        let Some(delivery) = WebhookRepo::find_delivery_by_id(&self.pool, delivery_id).await?
        else {
            return Ok(None);
        };
        let Some(subscription) =
            WebhookRepo::find_by_id(&self.pool, delivery.subscription_id).await?
        else {
            return Ok(None);
        };
        Ok(Some((delivery, subscription)))
    }

    async fn update_signature(
        &self,
        delivery_id: DbId,
        signature: &str,
    ) -> Result<(), sqlx::Error> {
        WebhookRepo::update_signature(&self.pool, delivery_id, signature).await
    }

    async fn mark_success(&self, delivery_id: DbId, status_code: i16) -> Result<(), sqlx::Error> {
        WebhookRepo::mark_success(&self.pool, delivery_id, status_code).await
    }

    async fn mark_failure(
        &self,
        delivery_id: DbId,
        status_code: Option<i16>,
        response_body: Option<&str>,
        error: &str,
        next_attempt_at: Option<Timestamp>,
    ) -> Result<(), sqlx::Error> {
        WebhookRepo::mark_failure(
            &self.pool,
            delivery_id,
            status_code,
            response_body,
            error,
            next_attempt_at,
        )
        .await
    }

    async fn list_due(&self, limit: i64) -> Result<Vec<WebhookDelivery>, sqlx::Error> {
        WebhookRepo::list_due_deliveries(&self.pool, limit).await
    }
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

/// Mutex-guarded in-memory store for tests and local experimentation.
#[derive(Default)]
pub struct InMemoryWebhookStore {
    inner: Mutex<InMemoryState>,
}

#[derive(Default)]
struct InMemoryState {
    subscriptions: Vec<WebhookSubscription>,
    deliveries: HashMap<DbId, WebhookDelivery>,
    next_delivery_id: DbId,
}

impl InMemoryWebhookStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a subscription, returning its assigned ID.
    pub fn add_subscription(
        &self,
        name: &str,
        url: &str,
        secret: &str,
        event_types: Vec<String>,
        is_active: bool,
    ) -> DbId {
        let mut state = self.inner.lock().expect("store lock poisoned");
        let id = state.subscriptions.len() as DbId + 1;
        state.subscriptions.push(WebhookSubscription {
            id,
            name: name.to_string(),
            url: url.to_string(),
            secret: secret.to_string(),
            event_types: serde_json::json!(event_types),
            is_active,
            owner: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        });
        id
    }

    /// Snapshot a delivery row for assertions.
    pub fn delivery(&self, delivery_id: DbId) -> Option<WebhookDelivery> {
        self.inner
            .lock()
            .expect("store lock poisoned")
            .deliveries
            .get(&delivery_id)
            .cloned()
    }

    /// All delivery rows, ordered by ID.
    pub fn deliveries(&self) -> Vec<WebhookDelivery> {
        let state = self.inner.lock().expect("store lock poisoned");
        let mut rows: Vec<WebhookDelivery> = state.deliveries.values().cloned().collect();
        rows.sort_by_key(|d| d.id);
        rows
    }
}

#[async_trait]
impl WebhookStore for InMemoryWebhookStore {
    async fn list_active_subscriptions(&self) -> Result<Vec<WebhookSubscription>, sqlx::Error> {
        let state = self.inner.lock().expect("store lock poisoned");
        Ok(state
            .subscriptions
            .iter()
            .filter(|s| s.is_active)
            .cloned()
            .collect())
    }

    async fn create_delivery(
        &self,
        subscription_id: DbId,
        event_type: &str,
        payload: &serde_json::Value,
        signature: &str,
    ) -> Result<WebhookDelivery, sqlx::Error> {
        let mut state = self.inner.lock().expect("store lock poisoned");
        state.next_delivery_id += 1;
        let id = state.next_delivery_id;
        let now = Utc::now();
        let delivery = WebhookDelivery {
            id,
            subscription_id,
            event_type: event_type.to_string(),
            payload: payload.clone(),
            signature: signature.to_string(),
            status: DeliveryStatus::Pending.as_str().to_string(),
            attempt_count: 0,
            next_attempt_at: Some(now),
            response_status_code: None,
            response_body: None,
            last_error: None,
            created_at: now,
            updated_at: now,
        };
        state.deliveries.insert(id, delivery.clone());
        Ok(delivery)
    }

    async fn load_delivery(
        &self,
        delivery_id: DbId,
    ) -> Result<Option<(WebhookDelivery, WebhookSubscription)>, sqlx::Error> {
        let state = self.inner.lock().expect("store lock poisoned");
        let Some(delivery) = state.deliveries.get(&delivery_id).cloned() else {
            return Ok(None);
        };
        let Some(subscription) = state
            .subscriptions
            .iter()
            .find(|s| s.id == delivery.subscription_id)
            .cloned()
        else {
            return Ok(None);
        };
        Ok(Some((delivery, subscription)))
    }

    async fn update_signature(
        &self,
        delivery_id: DbId,
        signature: &str,
    ) -> Result<(), sqlx::Error> {
        let mut state = self.inner.lock().expect("store lock poisoned");
        if let Some(delivery) = state.deliveries.get_mut(&delivery_id) {
            delivery.signature = signature.to_string();
            delivery.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn mark_success(&self, delivery_id: DbId, status_code: i16) -> Result<(), sqlx::Error> {
        let mut state = self.inner.lock().expect("store lock poisoned");
        if let Some(delivery) = state.deliveries.get_mut(&delivery_id) {
            delivery.status = DeliveryStatus::Success.as_str().to_string();
            delivery.attempt_count += 1;
            delivery.next_attempt_at = None;
            delivery.response_status_code = Some(status_code);
            delivery.last_error = None;
            delivery.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn mark_failure(
        &self,
        delivery_id: DbId,
        status_code: Option<i16>,
        response_body: Option<&str>,
        error: &str,
        next_attempt_at: Option<Timestamp>,
    ) -> Result<(), sqlx::Error> {
        let mut state = self.inner.lock().expect("store lock poisoned");
        if let Some(delivery) = state.deliveries.get_mut(&delivery_id) {
            delivery.status = DeliveryStatus::Failed.as_str().to_string();
            delivery.attempt_count += 1;
            delivery.next_attempt_at = next_attempt_at;
            delivery.response_status_code = status_code;
            delivery.response_body = response_body.map(str::to_string);
            delivery.last_error = Some(error.to_string());
            delivery.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn list_due(&self, limit: i64) -> Result<Vec<WebhookDelivery>, sqlx::Error> {
        let now = Utc::now();
        let state = self.inner.lock().expect("store lock poisoned");
        let mut due: Vec<WebhookDelivery> = state
            .deliveries
            .values()
            .filter(|d| {
                d.status != DeliveryStatus::Success.as_str()
                    && d.next_attempt_at.map(|at| at <= now).unwrap_or(false)
            })
            .cloned()
            .collect();
        due.sort_by_key(|d| d.next_attempt_at);
        due.truncate(limit as usize);
        Ok(due)
    }
}
