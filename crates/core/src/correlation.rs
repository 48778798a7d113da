//! Correlation-ID validation and generation.
//!
//! Every request carries an opaque correlation identifier end-to-end:
//! echoed in the response header, injected into 2xx JSON bodies, and
//! stored on the audit record so support can look a request up later.
//! Callers may supply their own via the inbound header; anything
//! malformed is replaced rather than propagated.

use uuid::Uuid;

/// Header used to read and echo the correlation ID.
pub const CORRELATION_HEADER: &str = "x-correlation-id";

/// JSON field injected into 2xx object responses.
pub const CORRELATION_FIELD: &str = "correlationId";

/// Minimum accepted length for a caller-supplied ID.
const MIN_LEN: usize = 8;

/// Maximum accepted length for a caller-supplied ID.
const MAX_LEN: usize = 128;

/// Generate a fresh correlation ID: 128 bits of randomness as 32 hex
/// characters (UUIDv4, simple form).
pub fn generate() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Whether a caller-supplied correlation ID is acceptable.
///
/// Accepts 8–128 characters of `[A-Za-z0-9_-]`. Anything else is
/// discarded so hostile callers cannot smuggle arbitrary bytes into
/// response headers or audit storage.
pub fn is_well_formed(candidate: &str) -> bool {
    (MIN_LEN..=MAX_LEN).contains(&candidate.len())
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Resolve the effective correlation ID for a request: the inbound
/// value when well-formed, a freshly generated one otherwise.
pub fn resolve(inbound: Option<&str>) -> String {
    match inbound {
        Some(id) if is_well_formed(id) => id.to_string(),
        _ => generate(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_32_hex_chars() {
        let id = generate();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(generate(), generate());
    }

    #[test]
    fn well_formed_inbound_id_is_kept() {
        assert_eq!(resolve(Some("client-trace-001")), "client-trace-001");
    }

    #[test]
    fn malformed_inbound_id_is_replaced() {
        let resolved = resolve(Some("bad id with spaces"));
        assert_ne!(resolved, "bad id with spaces");
        assert!(is_well_formed(&resolved));
    }

    #[test]
    fn too_short_id_is_replaced() {
        assert!(!is_well_formed("abc"));
    }

    #[test]
    fn too_long_id_is_replaced() {
        let long = "a".repeat(129);
        assert!(!is_well_formed(&long));
    }

    #[test]
    fn missing_id_generates_one() {
        let resolved = resolve(None);
        assert!(is_well_formed(&resolved));
    }
}
