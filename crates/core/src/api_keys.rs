//! API key generation, hashing, and default rate budgets.
//!
//! This module lives in `core` (zero internal deps) so it can be used
//! by both the API/repository layer and any future worker or CLI
//! tooling.

use rand::Rng;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Length of the generated API key string (alphanumeric characters).
pub const KEY_LENGTH: usize = 48;

/// Number of leading characters stored as a human-visible prefix.
pub const KEY_PREFIX_LENGTH: usize = 8;

/// Default requests-per-hour budget when a key has no override.
pub const DEFAULT_HOURLY_LIMIT: u32 = 1000;

/// Default requests-per-day budget when a key has no override.
pub const DEFAULT_DAILY_LIMIT: u32 = 10_000;

// ---------------------------------------------------------------------------
// Scope name constants
// ---------------------------------------------------------------------------

/// Known API key scope names.
pub mod scopes {
    pub const READ_ONLY: &str = "read_only";
    pub const FULL_ACCESS: &str = "full_access";
    pub const ADMIN: &str = "admin";
}

/// All valid scope names.
pub const VALID_SCOPES: &[&str] = &[scopes::READ_ONLY, scopes::FULL_ACCESS, scopes::ADMIN];

/// Validate that a scope string is one of the known scopes.
pub fn validate_scope(scope: &str) -> Result<(), crate::error::CoreError> {
    if VALID_SCOPES.contains(&scope) {
        Ok(())
    } else {
        Err(crate::error::CoreError::Validation(format!(
            "Unknown scope: '{scope}'. Valid scopes: {}",
            VALID_SCOPES.join(", ")
        )))
    }
}

// ---------------------------------------------------------------------------
// API key generation
// ---------------------------------------------------------------------------

/// The result of generating a new API key.
pub struct GeneratedApiKey {
    /// The plaintext key (shown to the user exactly once, never stored).
    pub plaintext: String,
    /// The first [`KEY_PREFIX_LENGTH`] characters of the key for display.
    pub prefix: String,
    /// The SHA-256 hex digest of the plaintext key (stored in the database).
    pub hash: String,
}

/// Generate a new random API key.
///
/// Returns the plaintext (shown once), prefix (for identification), and
/// SHA-256 hash (for storage). The plaintext must never be persisted.
pub fn generate_api_key() -> GeneratedApiKey {
    let key: String = rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(KEY_LENGTH)
        .map(char::from)
        .collect();

    let prefix = key[..KEY_PREFIX_LENGTH].to_string();
    let hash = hash_api_key(&key);

    GeneratedApiKey {
        plaintext: key,
        prefix,
        hash,
    }
}

// ---------------------------------------------------------------------------
// Hashing
// ---------------------------------------------------------------------------

/// Compute the SHA-256 hex digest of an API key.
///
/// Used both during key creation (to store the hash) and during
/// authentication (to look up the key by hash).
pub fn hash_api_key(key: &str) -> String {
    crate::hashing::sha256_hex(key.as_bytes())
}

/// Extract the prefix from a plaintext API key.
pub fn extract_prefix(key: &str) -> &str {
    &key[..KEY_PREFIX_LENGTH.min(key.len())]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_key_has_correct_length() {
        let key = generate_api_key();
        assert_eq!(key.plaintext.len(), KEY_LENGTH);
    }

    #[test]
    fn generated_key_prefix_matches_start() {
        let key = generate_api_key();
        assert_eq!(&key.plaintext[..KEY_PREFIX_LENGTH], key.prefix);
    }

    #[test]
    fn generated_key_hash_is_sha256_hex() {
        let key = generate_api_key();
        assert_eq!(key.hash.len(), 64, "SHA-256 hex digest should be 64 chars");
        assert!(
            key.hash.chars().all(|c| c.is_ascii_hexdigit()),
            "Hash should be hex characters only"
        );
    }

    #[test]
    fn hash_matches_regeneration() {
        let key = generate_api_key();
        let rehash = hash_api_key(&key.plaintext);
        assert_eq!(key.hash, rehash);
    }

    #[test]
    fn different_keys_produce_different_hashes() {
        let a = generate_api_key();
        let b = generate_api_key();
        assert_ne!(a.plaintext, b.plaintext);
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn generated_key_is_alphanumeric() {
        let key = generate_api_key();
        assert!(
            key.plaintext.chars().all(|c| c.is_ascii_alphanumeric()),
            "Key should be purely alphanumeric"
        );
    }

    #[test]
    fn extract_prefix_returns_correct_substring() {
        let key = "abcdefghijklmnop";
        assert_eq!(extract_prefix(key), "abcdefgh");
    }

    #[test]
    fn extract_prefix_handles_short_key() {
        let key = "abc";
        assert_eq!(extract_prefix(key), "abc");
    }

    #[test]
    fn known_scopes_are_accepted() {
        assert!(validate_scope("read_only").is_ok());
        assert!(validate_scope("full_access").is_ok());
        assert!(validate_scope("admin").is_ok());
    }

    #[test]
    fn unknown_scope_is_rejected() {
        assert!(validate_scope("superuser").is_err());
        assert!(validate_scope("").is_err());
    }
}
