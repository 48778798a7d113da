//! API key entity models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use veritax_core::api_keys::{DEFAULT_DAILY_LIMIT, DEFAULT_HOURLY_LIMIT};
use veritax_core::rate_limit::KeyQuota;
use veritax_core::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// API Key
// ---------------------------------------------------------------------------

/// A row from the `api_keys` table.
///
/// **Note:** `key_hash` is never serialized to responses. The
/// `key_prefix` field is used for human-readable identification.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ApiKey {
    pub id: DbId,
    pub name: String,
    pub description: Option<String>,
    #[serde(skip_serializing)]
    pub key_hash: String,
    pub key_prefix: String,
    /// Scope name: `"read_only"`, `"full_access"`, `"admin"`.
    pub scope: String,
    pub owner: Option<String>,
    /// Requests-per-hour override; NULL means the system default.
    pub hourly_limit: Option<i32>,
    /// Requests-per-day override; NULL means the system default.
    pub daily_limit: Option<i32>,
    pub is_active: bool,
    pub last_used_at: Option<Timestamp>,
    pub expires_at: Option<Timestamp>,
    pub revoked_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ApiKey {
    /// Whether the key's expiry timestamp has passed.
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .map(|at| at <= chrono::Utc::now())
            .unwrap_or(false)
    }

    /// Whether the key may authenticate a request right now: active,
    /// not revoked, not expired.
    pub fn is_usable(&self) -> bool {
        self.is_active && self.revoked_at.is_none() && !self.is_expired()
    }

    /// Resolve the key's rate budgets, falling back to the system
    /// defaults for unset columns.
    pub fn quota(&self) -> KeyQuota {
        KeyQuota {
            hourly_limit: self
                .hourly_limit
                .map(|v| v.max(0) as u32)
                .unwrap_or(DEFAULT_HOURLY_LIMIT),
            daily_limit: self
                .daily_limit
                .map(|v| v.max(0) as u32)
                .unwrap_or(DEFAULT_DAILY_LIMIT),
        }
    }
}

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// Response returned when a new API key is created or rotated.
/// Includes the plaintext key (shown exactly once).
#[derive(Debug, Clone, Serialize)]
pub struct ApiKeyCreatedResponse {
    pub id: DbId,
    pub name: String,
    pub key_prefix: String,
    /// The full plaintext key. Shown **once** and never stored.
    pub plaintext_key: String,
    pub scope: String,
    pub created_at: Timestamp,
}

/// DTO for creating a new API key.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateApiKey {
    pub name: String,
    pub description: Option<String>,
    /// Scope name: `"read_only"`, `"full_access"`, `"admin"`.
    pub scope: String,
    pub owner: Option<String>,
    pub hourly_limit: Option<i32>,
    pub daily_limit: Option<i32>,
    /// Optional expiry timestamp (ISO 8601).
    pub expires_at: Option<String>,
}

/// DTO for updating an existing API key.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateApiKey {
    pub name: Option<String>,
    pub description: Option<String>,
    pub hourly_limit: Option<i32>,
    pub daily_limit: Option<i32>,
    pub is_active: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn sample_key() -> ApiKey {
        ApiKey {
            id: 1,
            name: "fleet-import".to_string(),
            description: None,
            key_hash: "hash".to_string(),
            key_prefix: "abcdefgh".to_string(),
            scope: "full_access".to_string(),
            owner: Some("ops".to_string()),
            hourly_limit: None,
            daily_limit: None,
            is_active: true,
            last_used_at: None,
            expires_at: None,
            revoked_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn key_without_expiry_is_not_expired() {
        assert!(!sample_key().is_expired());
        assert!(sample_key().is_usable());
    }

    #[test]
    fn past_expiry_makes_key_unusable() {
        let mut key = sample_key();
        key.expires_at = Some(Utc::now() - Duration::hours(1));
        assert!(key.is_expired());
        assert!(!key.is_usable());
    }

    #[test]
    fn revoked_key_is_unusable() {
        let mut key = sample_key();
        key.revoked_at = Some(Utc::now());
        assert!(!key.is_usable());
    }

    #[test]
    fn quota_falls_back_to_defaults() {
        let quota = sample_key().quota();
        assert_eq!(quota.hourly_limit, DEFAULT_HOURLY_LIMIT);
        assert_eq!(quota.daily_limit, DEFAULT_DAILY_LIMIT);
    }

    #[test]
    fn quota_uses_key_overrides() {
        let mut key = sample_key();
        key.hourly_limit = Some(50);
        key.daily_limit = Some(200);
        let quota = key.quota();
        assert_eq!(quota.hourly_limit, 50);
        assert_eq!(quota.daily_limit, 200);
    }
}
