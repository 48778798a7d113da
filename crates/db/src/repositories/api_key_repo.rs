//! Repository for the `api_keys` table.

use sqlx::PgPool;
use veritax_core::types::{DbId, Timestamp};

use crate::models::api_key::ApiKey;

const API_KEY_COLUMNS: &str = "\
    id, name, description, key_hash, key_prefix, scope, owner, \
    hourly_limit, daily_limit, is_active, last_used_at, expires_at, \
    revoked_at, created_at, updated_at";

/// Provides CRUD operations for API keys.
pub struct ApiKeyRepo;

impl ApiKeyRepo {
    /// Create a new API key row from generated key material.
    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        pool: &PgPool,
        name: &str,
        description: Option<&str>,
        key_hash: &str,
        key_prefix: &str,
        scope: &str,
        owner: Option<&str>,
        hourly_limit: Option<i32>,
        daily_limit: Option<i32>,
        expires_at: Option<Timestamp>,
    ) -> Result<ApiKey, sqlx::Error> {
        let query = format!(
            "INSERT INTO api_keys \
                 (name, description, key_hash, key_prefix, scope, owner, \
                  hourly_limit, daily_limit, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {API_KEY_COLUMNS}"
        );
        sqlx::query_as::<_, ApiKey>(&query)
            .bind(name)
            .bind(description)
            .bind(key_hash)
            .bind(key_prefix)
            .bind(scope)
            .bind(owner)
            .bind(hourly_limit)
            .bind(daily_limit)
            .bind(expires_at)
            .fetch_one(pool)
            .await
    }

    /// List all API keys ordered by creation date (newest first).
    pub async fn list(pool: &PgPool) -> Result<Vec<ApiKey>, sqlx::Error> {
        let query = format!("SELECT {API_KEY_COLUMNS} FROM api_keys ORDER BY created_at DESC");
        sqlx::query_as::<_, ApiKey>(&query).fetch_all(pool).await
    }

    /// Find an API key by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<ApiKey>, sqlx::Error> {
        let query = format!("SELECT {API_KEY_COLUMNS} FROM api_keys WHERE id = $1");
        sqlx::query_as::<_, ApiKey>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find an API key by the SHA-256 hash of its plaintext.
    ///
    /// This is the authentication lookup: the caller hashes the
    /// presented key and matches on the stored digest.
    pub async fn find_by_hash(pool: &PgPool, key_hash: &str) -> Result<Option<ApiKey>, sqlx::Error> {
        let query = format!("SELECT {API_KEY_COLUMNS} FROM api_keys WHERE key_hash = $1");
        sqlx::query_as::<_, ApiKey>(&query)
            .bind(key_hash)
            .fetch_optional(pool)
            .await
    }

    /// Update an API key's settings.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        name: Option<&str>,
        description: Option<&str>,
        hourly_limit: Option<i32>,
        daily_limit: Option<i32>,
        is_active: Option<bool>,
    ) -> Result<Option<ApiKey>, sqlx::Error> {
        let query = format!(
            "UPDATE api_keys SET \
                 name = COALESCE($2, name), \
                 description = COALESCE($3, description), \
                 hourly_limit = COALESCE($4, hourly_limit), \
                 daily_limit = COALESCE($5, daily_limit), \
                 is_active = COALESCE($6, is_active), \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {API_KEY_COLUMNS}"
        );
        sqlx::query_as::<_, ApiKey>(&query)
            .bind(id)
            .bind(name)
            .bind(description)
            .bind(hourly_limit)
            .bind(daily_limit)
            .bind(is_active)
            .fetch_optional(pool)
            .await
    }

    /// Rotate a key: replace hash and prefix with freshly generated
    /// material. The old plaintext stops authenticating immediately.
    pub async fn rotate(
        pool: &PgPool,
        id: DbId,
        new_hash: &str,
        new_prefix: &str,
    ) -> Result<Option<ApiKey>, sqlx::Error> {
        let query = format!(
            "UPDATE api_keys SET \
                 key_hash = $2, \
                 key_prefix = $3, \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {API_KEY_COLUMNS}"
        );
        sqlx::query_as::<_, ApiKey>(&query)
            .bind(id)
            .bind(new_hash)
            .bind(new_prefix)
            .fetch_optional(pool)
            .await
    }

    /// Instantly revoke a key: set `revoked_at` and deactivate.
    pub async fn revoke(pool: &PgPool, id: DbId) -> Result<Option<ApiKey>, sqlx::Error> {
        let query = format!(
            "UPDATE api_keys SET \
                 revoked_at = NOW(), \
                 is_active = FALSE, \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {API_KEY_COLUMNS}"
        );
        sqlx::query_as::<_, ApiKey>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Update `last_used_at` after a successful authentication.
    pub async fn touch_last_used(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE api_keys SET last_used_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }
}
