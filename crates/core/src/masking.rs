//! Sensitive-field masking engine.
//!
//! [`mask`] walks a JSON payload and redacts values whose keys match a
//! fixed, case-insensitive set of sensitive field names. The walk keeps
//! the payload's structure intact and recurses through objects and
//! arrays, so masked output can be stored in audit records and compared
//! field-by-field against the original shape.
//!
//! Masking is a pure function: deterministic for a given input and free
//! of side effects, and idempotent (`mask(mask(x)) == mask(x)`).

use serde_json::Value;

// ---------------------------------------------------------------------------
// Sensitive key sets
// ---------------------------------------------------------------------------

/// Keys holding tax identification numbers. Matched exactly (lowercased).
pub const TAX_ID_KEYS: &[&str] = &["nif", "tax_id", "taxid", "tin"];

/// Keys holding phone numbers. Matched exactly (lowercased).
pub const PHONE_KEYS: &[&str] = &["phone", "phone_number", "telephone", "mobile", "msisdn"];

/// Keys holding email addresses. Matched exactly (lowercased).
pub const EMAIL_KEYS: &[&str] = &["email", "email_address", "mail"];

/// Substrings marking credential-like keys. Matched with `contains` so
/// `access_token`, `api_key_secret`, etc. are all caught.
pub const CREDENTIAL_KEY_FRAGMENTS: &[&str] = &[
    "password",
    "passwd",
    "secret",
    "token",
    "api_key",
    "api-key",
    "private_key",
    "authorization",
    "credential",
    "cookie",
];

/// Fixed replacement for credential-like values, regardless of length.
pub const CREDENTIAL_MASK: &str = "********";

/// Trailing digits preserved on tax identifiers.
const TAX_ID_VISIBLE_DIGITS: usize = 5;

/// Trailing digits preserved on phone numbers.
const PHONE_VISIBLE_DIGITS: usize = 4;

// ---------------------------------------------------------------------------
// Public entry point
// ---------------------------------------------------------------------------

/// Return a redacted copy of `value` with all sensitive fields masked.
///
/// Objects and arrays are walked recursively; scalars under
/// non-sensitive keys pass through unchanged.
pub fn mask(value: &Value) -> Value {
    mask_value(value, None)
}

fn mask_value(value: &Value, key: Option<&str>) -> Value {
    match value {
        Value::Object(map) => {
            let mut masked = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                masked.insert(k.clone(), mask_value(v, Some(k)));
            }
            Value::Object(masked)
        }
        Value::Array(items) => {
            // The element inherits no key: array items under a sensitive
            // key are containers/scalars in their own right.
            Value::Array(items.iter().map(|v| mask_value(v, key)).collect())
        }
        scalar => match key.map(classify_key) {
            Some(SensitiveKind::TaxId) => mask_scalar(scalar, mask_tax_id),
            Some(SensitiveKind::Phone) => mask_scalar(scalar, mask_phone),
            Some(SensitiveKind::Email) => mask_scalar(scalar, mask_email),
            Some(SensitiveKind::Credential) => Value::String(CREDENTIAL_MASK.to_string()),
            Some(SensitiveKind::None) | None => scalar.clone(),
        },
    }
}

// ---------------------------------------------------------------------------
// Key classification
// ---------------------------------------------------------------------------

enum SensitiveKind {
    TaxId,
    Phone,
    Email,
    Credential,
    None,
}

fn classify_key(key: &str) -> SensitiveKind {
    let lower = key.to_lowercase();
    if TAX_ID_KEYS.contains(&lower.as_str()) {
        SensitiveKind::TaxId
    } else if PHONE_KEYS.contains(&lower.as_str()) {
        SensitiveKind::Phone
    } else if EMAIL_KEYS.contains(&lower.as_str()) {
        SensitiveKind::Email
    } else if CREDENTIAL_KEY_FRAGMENTS.iter().any(|f| lower.contains(f)) {
        SensitiveKind::Credential
    } else {
        SensitiveKind::None
    }
}

/// Apply a string-masking rule to a scalar. Numbers are stringified
/// first so a numeric tax ID masks like its string form; null and
/// booleans pass through.
fn mask_scalar(scalar: &Value, rule: fn(&str) -> String) -> Value {
    match scalar {
        Value::String(s) => Value::String(rule(s)),
        Value::Number(n) => Value::String(rule(&n.to_string())),
        other => other.clone(),
    }
}

// ---------------------------------------------------------------------------
// Field-specific rules
// ---------------------------------------------------------------------------

/// Strip non-digits and mask all but the last five digits.
pub fn mask_tax_id(raw: &str) -> String {
    mask_digits(raw, TAX_ID_VISIBLE_DIGITS)
}

/// Strip non-digits and mask all but the last four digits.
pub fn mask_phone(raw: &str) -> String {
    mask_digits(raw, PHONE_VISIBLE_DIGITS)
}

fn mask_digits(raw: &str, visible: usize) -> String {
    // '*' counts as an already-masked digit so the rule is idempotent on
    // its own output.
    let digits: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '*')
        .collect();
    if digits.len() <= visible {
        return digits;
    }
    let masked_len = digits.len() - visible;
    let mut out = "*".repeat(masked_len);
    out.push_str(&digits[masked_len..]);
    out
}

/// Mask the local part of an email, preserving the domain.
///
/// Local parts of two characters or fewer are masked entirely; longer
/// ones keep their first and last character. A value without `@` gets
/// the local-part rule applied to the whole string.
pub fn mask_email(raw: &str) -> String {
    match raw.split_once('@') {
        Some((local, domain)) => format!("{}@{domain}", mask_local_part(local)),
        None => mask_local_part(raw),
    }
}

fn mask_local_part(local: &str) -> String {
    let chars: Vec<char> = local.chars().collect();
    if chars.len() <= 2 {
        return "*".repeat(chars.len());
    }
    let mut out = String::with_capacity(chars.len());
    out.push(chars[0]);
    out.push_str(&"*".repeat(chars.len() - 2));
    out.push(chars[chars.len() - 1]);
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
