//! HMAC-SHA256 payload signing for outbound webhooks.
//!
//! The signature is computed over the canonical JSON body (see
//! [`crate::canonical`]) with the subscription's secret as the key, and
//! rendered as lowercase hex. Receivers recompute the HMAC over the raw
//! body they were sent and compare in constant time.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Compute an HMAC-SHA256 signature for a webhook payload.
///
/// The `secret` is the subscription-specific signing secret; `payload`
/// is the canonical JSON body being delivered. Returns the hex-encoded
/// signature string.
pub fn compute_signature(secret: &str, payload: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(payload.as_bytes());
    hex_encode(mac.finalize().into_bytes())
}

/// Verify a signature against a payload in constant time.
pub fn verify_signature(expected_hex: &str, secret: &str, payload: &str) -> bool {
    let computed = compute_signature(secret, payload);
    expected_hex
        .as_bytes()
        .ct_eq(computed.as_bytes())
        .into()
}

/// Encode bytes as a lowercase hex string.
fn hex_encode(bytes: impl AsRef<[u8]>) -> String {
    bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_hex_string() {
        let sig = compute_signature("my_secret", r#"{"event":"test"}"#);
        assert_eq!(sig.len(), 64, "HMAC-SHA256 hex should be 64 chars");
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn signature_is_deterministic() {
        let a = compute_signature("secret", "payload");
        let b = compute_signature("secret", "payload");
        assert_eq!(a, b);
    }

    #[test]
    fn signature_differs_with_different_secret() {
        let a = compute_signature("secret_a", "payload");
        let b = compute_signature("secret_b", "payload");
        assert_ne!(a, b);
    }

    #[test]
    fn signature_differs_with_different_payload() {
        let a = compute_signature("secret", "payload_a");
        let b = compute_signature("secret", "payload_b");
        assert_ne!(a, b);
    }

    #[test]
    fn verify_accepts_matching_signature() {
        let sig = compute_signature("s3cret", r#"{"message":"hi"}"#);
        assert!(verify_signature(&sig, "s3cret", r#"{"message":"hi"}"#));
    }

    #[test]
    fn verify_rejects_tampered_payload() {
        let sig = compute_signature("s3cret", r#"{"message":"hi"}"#);
        assert!(!verify_signature(&sig, "s3cret", r#"{"message":"HI"}"#));
    }

    #[test]
    fn verify_rejects_wrong_secret() {
        let sig = compute_signature("s3cret", "body");
        assert!(!verify_signature(&sig, "other", "body"));
    }
}
