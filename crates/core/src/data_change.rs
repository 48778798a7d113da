//! Top-level scalar diffing for data-change records.
//!
//! UPDATE change records carry the before/after value of every
//! top-level scalar field that differs between two entity snapshots.
//! Nested objects and arrays are compared for equality but their
//! internals are not walked; the full masked snapshots sit alongside
//! the changed-field list on the record.

use serde_json::{Map, Value};

/// The operations a data-change record can describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOperation {
    Create,
    Update,
    Delete,
}

impl ChangeOperation {
    /// String representation for display, logging, and database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }

    /// Parse a stored operation string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CREATE" => Some(Self::Create),
            "UPDATE" => Some(Self::Update),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }
}

impl std::fmt::Display for ChangeOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// List the top-level fields whose scalar values differ between two
/// object snapshots, sorted by field name.
///
/// A field missing on one side counts as changed. Non-object inputs
/// yield an empty list (there are no fields to compare).
pub fn changed_scalar_fields(before: &Value, after: &Value) -> Vec<String> {
    let (Some(before), Some(after)) = (before.as_object(), after.as_object()) else {
        return Vec::new();
    };

    let mut changed: Vec<String> = Vec::new();

    for (key, old) in before {
        match after.get(key) {
            Some(new) if scalar_eq(old, new) => {}
            _ => changed.push(key.clone()),
        }
    }
    for key in after.keys() {
        if !before.contains_key(key) {
            changed.push(key.clone());
        }
    }

    changed.sort();
    changed.dedup();
    changed
}

/// Scalar comparison: containers are compared wholesale, scalars by
/// value.
fn scalar_eq(a: &Value, b: &Value) -> bool {
    a == b
}

/// Extract the before/after pair for each changed field, for the
/// record's snapshot columns.
pub fn field_snapshots(
    before: &Value,
    after: &Value,
    changed: &[String],
) -> (Map<String, Value>, Map<String, Value>) {
    let empty = Map::new();
    let before_map = before.as_object().unwrap_or(&empty);
    let after_map = after.as_object().unwrap_or(&empty);

    let mut before_out = Map::new();
    let mut after_out = Map::new();
    for field in changed {
        if let Some(v) = before_map.get(field) {
            before_out.insert(field.clone(), v.clone());
        }
        if let Some(v) = after_map.get(field) {
            after_out.insert(field.clone(), v.clone());
        }
    }
    (before_out, after_out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identical_snapshots_report_no_changes() {
        let snapshot = json!({"plate": "1234 TBA", "status": "active"});
        assert!(changed_scalar_fields(&snapshot, &snapshot).is_empty());
    }

    #[test]
    fn changed_scalar_is_reported() {
        let before = json!({"plate": "1234 TBA", "status": "active"});
        let after = json!({"plate": "1234 TBA", "status": "suspended"});
        assert_eq!(changed_scalar_fields(&before, &after), vec!["status"]);
    }

    #[test]
    fn added_and_removed_fields_count_as_changed() {
        let before = json!({"a": 1});
        let after = json!({"b": 2});
        assert_eq!(changed_scalar_fields(&before, &after), vec!["a", "b"]);
    }

    #[test]
    fn output_is_sorted() {
        let before = json!({"z": 1, "a": 1});
        let after = json!({"z": 2, "a": 2});
        assert_eq!(changed_scalar_fields(&before, &after), vec!["a", "z"]);
    }

    #[test]
    fn non_object_inputs_yield_empty_list() {
        assert!(changed_scalar_fields(&json!("str"), &json!({"a": 1})).is_empty());
    }

    #[test]
    fn snapshots_carry_both_sides_of_each_change() {
        let before = json!({"status": "active", "owner": "Rakoto"});
        let after = json!({"status": "suspended", "owner": "Rakoto"});
        let changed = changed_scalar_fields(&before, &after);
        let (b, a) = field_snapshots(&before, &after, &changed);
        assert_eq!(b["status"], "active");
        assert_eq!(a["status"], "suspended");
        assert!(!b.contains_key("owner"));
    }
}
