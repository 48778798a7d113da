//! Repository for the `webhook_subscriptions` and `webhook_deliveries`
//! tables.

use sqlx::PgPool;
use veritax_core::types::{DbId, Timestamp};
use veritax_core::webhooks::DeliveryStatus;

use crate::models::webhook::{WebhookDelivery, WebhookSubscription};

// ---------------------------------------------------------------------------
// Column lists
// ---------------------------------------------------------------------------

const SUBSCRIPTION_COLUMNS: &str = "\
    id, name, url, secret, event_types, is_active, owner, created_at, updated_at";

const DELIVERY_COLUMNS: &str = "\
    id, subscription_id, event_type, payload, signature, status, \
    attempt_count, next_attempt_at, response_status_code, response_body, \
    last_error, created_at, updated_at";

/// Provides CRUD operations for webhook subscriptions and deliveries.
pub struct WebhookRepo;

impl WebhookRepo {
    // -----------------------------------------------------------------------
    // Subscription CRUD
    // -----------------------------------------------------------------------

    /// Create a new subscription.
    pub async fn create(
        pool: &PgPool,
        name: &str,
        url: &str,
        secret: &str,
        event_types: &serde_json::Value,
        is_active: bool,
        owner: Option<&str>,
    ) -> Result<WebhookSubscription, sqlx::Error> {
        let query = format!(
            "INSERT INTO webhook_subscriptions \
                 (name, url, secret, event_types, is_active, owner) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {SUBSCRIPTION_COLUMNS}"
        );
        sqlx::query_as::<_, WebhookSubscription>(&query)
            .bind(name)
            .bind(url)
            .bind(secret)
            .bind(event_types)
            .bind(is_active)
            .bind(owner)
            .fetch_one(pool)
            .await
    }

    /// List all subscriptions ordered by creation date (newest first).
    pub async fn list(pool: &PgPool) -> Result<Vec<WebhookSubscription>, sqlx::Error> {
        let query =
            format!("SELECT {SUBSCRIPTION_COLUMNS} FROM webhook_subscriptions ORDER BY created_at DESC");
        sqlx::query_as::<_, WebhookSubscription>(&query)
            .fetch_all(pool)
            .await
    }

    /// List active subscriptions, the dispatcher's working set.
    pub async fn list_active(pool: &PgPool) -> Result<Vec<WebhookSubscription>, sqlx::Error> {
        let query = format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM webhook_subscriptions \
             WHERE is_active = TRUE ORDER BY id ASC"
        );
        sqlx::query_as::<_, WebhookSubscription>(&query)
            .fetch_all(pool)
            .await
    }

    /// Find a subscription by ID.
    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<WebhookSubscription>, sqlx::Error> {
        let query = format!("SELECT {SUBSCRIPTION_COLUMNS} FROM webhook_subscriptions WHERE id = $1");
        sqlx::query_as::<_, WebhookSubscription>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Update a subscription's settings.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        name: Option<&str>,
        url: Option<&str>,
        secret: Option<&str>,
        event_types: Option<&serde_json::Value>,
        is_active: Option<bool>,
    ) -> Result<Option<WebhookSubscription>, sqlx::Error> {
        let query = format!(
            "UPDATE webhook_subscriptions SET \
                 name = COALESCE($2, name), \
                 url = COALESCE($3, url), \
                 secret = COALESCE($4, secret), \
                 event_types = COALESCE($5, event_types), \
                 is_active = COALESCE($6, is_active), \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {SUBSCRIPTION_COLUMNS}"
        );
        sqlx::query_as::<_, WebhookSubscription>(&query)
            .bind(id)
            .bind(name)
            .bind(url)
            .bind(secret)
            .bind(event_types)
            .bind(is_active)
            .fetch_optional(pool)
            .await
    }

    /// Deactivate a subscription. Delivery history is preserved;
    /// subscriptions are never hard-deleted.
    pub async fn deactivate(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE webhook_subscriptions SET is_active = FALSE, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    // -----------------------------------------------------------------------
    // Delivery operations
    // -----------------------------------------------------------------------

    /// Create a new delivery record in `pending` with the next attempt
    /// due immediately.
    pub async fn create_delivery(
        pool: &PgPool,
        subscription_id: DbId,
        event_type: &str,
        payload: &serde_json::Value,
        signature: &str,
    ) -> Result<WebhookDelivery, sqlx::Error> {
        let query = format!(
            "INSERT INTO webhook_deliveries \
                 (subscription_id, event_type, payload, signature, status, next_attempt_at) \
             VALUES ($1, $2, $3, $4, 'pending', NOW()) \
             RETURNING {DELIVERY_COLUMNS}"
        );
        sqlx::query_as::<_, WebhookDelivery>(&query)
            .bind(subscription_id)
            .bind(event_type)
            .bind(payload)
            .bind(signature)
            .fetch_one(pool)
            .await
    }

    /// Find a delivery by ID.
    pub async fn find_delivery_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<WebhookDelivery>, sqlx::Error> {
        let query = format!("SELECT {DELIVERY_COLUMNS} FROM webhook_deliveries WHERE id = $1");
        sqlx::query_as::<_, WebhookDelivery>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List non-terminal deliveries whose next attempt is due.
    ///
    /// The standalone worker polls this to pick up deliveries stranded
    /// by a crash or scheduled for a later retry.
    pub async fn list_due_deliveries(
        pool: &PgPool,
        limit: i64,
    ) -> Result<Vec<WebhookDelivery>, sqlx::Error> {
        let query = format!(
            "SELECT {DELIVERY_COLUMNS} FROM webhook_deliveries \
             WHERE status != 'success' \
               AND next_attempt_at IS NOT NULL \
               AND next_attempt_at <= NOW() \
             ORDER BY next_attempt_at ASC LIMIT $1"
        );
        sqlx::query_as::<_, WebhookDelivery>(&query)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// List deliveries for a specific subscription with pagination.
    pub async fn list_deliveries_for_subscription(
        pool: &PgPool,
        subscription_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<WebhookDelivery>, sqlx::Error> {
        let query = format!(
            "SELECT {DELIVERY_COLUMNS} FROM webhook_deliveries \
             WHERE subscription_id = $1 \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, WebhookDelivery>(&query)
            .bind(subscription_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Persist a recomputed signature (defensive consistency check when
    /// the payload changed since the delivery row was created).
    pub async fn update_signature(
        pool: &PgPool,
        delivery_id: DbId,
        signature: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE webhook_deliveries SET signature = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(delivery_id)
        .bind(signature)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Finalize a successful delivery: status `success`, next attempt
    /// cleared, prior error cleared, attempt count bumped.
    pub async fn mark_success(
        pool: &PgPool,
        delivery_id: DbId,
        response_status_code: i16,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE webhook_deliveries SET \
                 status = $2, \
                 attempt_count = attempt_count + 1, \
                 next_attempt_at = NULL, \
                 response_status_code = $3, \
                 last_error = NULL, \
                 updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(delivery_id)
        .bind(DeliveryStatus::Success.as_str())
        .bind(response_status_code)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Record a failed attempt. `next_attempt_at` is NULL for a
    /// terminal failure, or the scheduled retry time otherwise.
    pub async fn mark_failure(
        pool: &PgPool,
        delivery_id: DbId,
        response_status_code: Option<i16>,
        response_body: Option<&str>,
        last_error: &str,
        next_attempt_at: Option<Timestamp>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE webhook_deliveries SET \
                 status = $2, \
                 attempt_count = attempt_count + 1, \
                 next_attempt_at = $3, \
                 response_status_code = $4, \
                 response_body = $5, \
                 last_error = $6, \
                 updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(delivery_id)
        .bind(DeliveryStatus::Failed.as_str())
        .bind(next_attempt_at)
        .bind(response_status_code)
        .bind(response_body)
        .bind(last_error)
        .execute(pool)
        .await?;
        Ok(())
    }
}
