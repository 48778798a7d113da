//! Canonical JSON serialization.
//!
//! Webhook signatures and chain content hashes must be computed over a
//! byte-stable rendering of a payload: object keys sorted, compact
//! separators, no trailing whitespace. `serde_json` already serializes
//! compactly; [`canonicalize`] adds the recursive key ordering.

use serde_json::{Map, Value};

/// Render a JSON value as a canonical string: recursive key sort,
/// compact separators.
///
/// Two structurally equal values always produce identical bytes, which
/// is what signature verification on the receiving end recomputes over.
pub fn canonicalize(value: &Value) -> String {
    sort_keys(value).to_string()
}

/// Return a copy of `value` with all object keys sorted recursively.
fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut sorted = Map::with_capacity(entries.len());
            for (k, v) in entries {
                sorted.insert(k.clone(), sort_keys(v));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        scalar => scalar.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keys_are_sorted() {
        let value = json!({"b": 1, "a": 2});
        assert_eq!(canonicalize(&value), r#"{"a":2,"b":1}"#);
    }

    #[test]
    fn nested_keys_are_sorted() {
        let value = json!({"outer": {"z": true, "a": false}});
        assert_eq!(canonicalize(&value), r#"{"outer":{"a":false,"z":true}}"#);
    }

    #[test]
    fn arrays_preserve_order() {
        let value = json!([3, 1, 2]);
        assert_eq!(canonicalize(&value), "[3,1,2]");
    }

    #[test]
    fn structurally_equal_values_produce_identical_bytes() {
        let a = json!({"x": 1, "y": {"m": "v", "k": "w"}});
        let b = json!({"y": {"k": "w", "m": "v"}, "x": 1});
        assert_eq!(canonicalize(&a), canonicalize(&b));
    }

    #[test]
    fn output_is_compact() {
        let value = json!({"message": "hi"});
        assert_eq!(canonicalize(&value), r#"{"message":"hi"}"#);
        assert!(!canonicalize(&value).contains(' '));
    }
}
