//! API-key authentication.
//!
//! The [`authenticate`] middleware resolves the `X-Api-Key` header to a
//! stored key: it hashes the presented plaintext, looks the digest up,
//! and rejects unknown (401) or expired/revoked/inactive (403) keys.
//! The resolved [`ActorContext`] is attached to the request for inner
//! layers and echoed on the response for the audit recorder.
//!
//! Keyless requests pass through unauthenticated; route-level
//! extractors ([`RequireApiKey`], [`RequireAdminKey`]) decide whether
//! that is acceptable.

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use veritax_core::api_keys::{hash_api_key, scopes};
use veritax_core::error::CoreError;
use veritax_core::rate_limit::KeyQuota;
use veritax_core::types::DbId;
use veritax_db::repositories::ApiKeyRepo;

use crate::error::AppError;
use crate::state::AppState;

/// Header carrying the caller's API key.
pub const API_KEY_HEADER: &str = "x-api-key";

// ---------------------------------------------------------------------------
// Actor context
// ---------------------------------------------------------------------------

/// Who is making the request. At most one variant per request: an API
/// key, or an authenticated user injected by the (external) session
/// layer. Absent for anonymous requests.
#[derive(Debug, Clone)]
pub enum ActorContext {
    ApiKey {
        id: DbId,
        prefix: String,
        scope: String,
        quota: KeyQuota,
    },
    User(String),
}

impl ActorContext {
    /// Metrics/audit label: never the credential itself.
    pub fn label(&self) -> String {
        match self {
            Self::ApiKey { prefix, .. } => format!("key:{prefix}"),
            Self::User(user_ref) => format!("user:{user_ref}"),
        }
    }

    /// API key ID for the audit record's actor column.
    pub fn api_key_id(&self) -> Option<DbId> {
        match self {
            Self::ApiKey { id, .. } => Some(*id),
            Self::User(_) => None,
        }
    }

    /// User reference for the audit record's actor column.
    pub fn user_ref(&self) -> Option<String> {
        match self {
            Self::ApiKey { .. } => None,
            Self::User(user_ref) => Some(user_ref.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// Middleware
// ---------------------------------------------------------------------------

/// Resolve the caller's API key, if any, and attach the actor context.
pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let presented = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let actor = match presented {
        None => None,
        Some(key) => {
            let key_hash = hash_api_key(&key);
            match ApiKeyRepo::find_by_hash(&state.pool, &key_hash).await {
                Ok(Some(api_key)) => {
                    if !api_key.is_usable() {
                        let reason = if api_key.revoked_at.is_some() {
                            "API key has been revoked"
                        } else if api_key.is_expired() {
                            "API key has expired"
                        } else {
                            "API key is inactive"
                        };
                        tracing::warn!(
                            api_key_id = api_key.id,
                            key_prefix = %api_key.key_prefix,
                            reason,
                            "Rejected unusable API key",
                        );
                        return AppError::Core(CoreError::Forbidden(reason.into()))
                            .into_response();
                    }

                    // Best-effort usage stamp; never blocks the request.
                    let pool = state.pool.clone();
                    let key_id = api_key.id;
                    tokio::spawn(async move {
                        if let Err(e) = ApiKeyRepo::touch_last_used(&pool, key_id).await {
                            tracing::debug!(api_key_id = key_id, error = %e, "Failed to touch last_used_at");
                        }
                    });

                    Some(ActorContext::ApiKey {
                        id: api_key.id,
                        prefix: api_key.key_prefix.clone(),
                        scope: api_key.scope.clone(),
                        quota: api_key.quota(),
                    })
                }
                Ok(None) => {
                    return AppError::Core(CoreError::Unauthorized("Invalid API key".into()))
                        .into_response();
                }
                Err(e) => {
                    tracing::error!(error = %e, "API key lookup failed");
                    return AppError::Database(e).into_response();
                }
            }
        }
    };

    if let Some(actor) = &actor {
        req.extensions_mut().insert(actor.clone());
    }

    let mut response = next.run(req).await;

    // Echo the actor on the response so the outer recorder layer can
    // attribute the audit record.
    if let Some(actor) = actor {
        response.extensions_mut().insert(actor);
    }
    response
}

// ---------------------------------------------------------------------------
// Extractors
// ---------------------------------------------------------------------------

/// Requires an authenticated API key (any scope). Rejects with 401
/// otherwise.
pub struct RequireApiKey(pub ActorContext);

impl FromRequestParts<AppState> for RequireApiKey {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let actor = parts
            .extensions
            .get::<ActorContext>()
            .cloned()
            .ok_or_else(|| AppError::Core(CoreError::Unauthorized("Missing API key".into())))?;
        Ok(RequireApiKey(actor))
    }
}

/// Requires an API key with the `admin` scope. Rejects with 403 for
/// lesser scopes, 401 when unauthenticated.
pub struct RequireAdminKey(pub ActorContext);

impl FromRequestParts<AppState> for RequireAdminKey {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireApiKey(actor) = RequireApiKey::from_request_parts(parts, state).await?;
        match &actor {
            ActorContext::ApiKey { scope, .. } if scope == scopes::ADMIN => {
                Ok(RequireAdminKey(actor))
            }
            _ => Err(AppError::Core(CoreError::Forbidden(
                "Admin scope required".into(),
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_label_uses_prefix_not_credential() {
        let actor = ActorContext::ApiKey {
            id: 7,
            prefix: "abcdefgh".to_string(),
            scope: scopes::READ_ONLY.to_string(),
            quota: KeyQuota {
                hourly_limit: 10,
                daily_limit: 100,
            },
        };
        assert_eq!(actor.label(), "key:abcdefgh");
        assert_eq!(actor.api_key_id(), Some(7));
        assert_eq!(actor.user_ref(), None);
    }

    #[test]
    fn user_label_carries_reference() {
        let actor = ActorContext::User("agent-12".to_string());
        assert_eq!(actor.label(), "user:agent-12");
        assert_eq!(actor.api_key_id(), None);
        assert_eq!(actor.user_ref(), Some("agent-12".to_string()));
    }
}
