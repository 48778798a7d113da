//! Tamper-evident audit chain: content hashing and integrity
//! verification.
//!
//! Every privileged action (fleet imports, bulk edits) appends one
//! record whose hash covers its own content plus the previous record's
//! hash, so a retroactive edit anywhere breaks every later link. The
//! persistence layer serializes appends; this module owns the pure
//! parts: canonical content, entry hashing, and the read-only verifier.

use serde::Serialize;
use serde_json::Value;

use crate::canonical::canonicalize;
use crate::hashing::sha256_hex;
use crate::types::{DbId, Timestamp};

/// `previous_hash` of the first record ever appended.
pub const GENESIS_PREVIOUS_HASH: &str = "";

// ---------------------------------------------------------------------------
// Content + hash computation
// ---------------------------------------------------------------------------

/// Build the canonical content string a chain record is hashed over.
///
/// Absent references render as empty fields so the layout is stable:
/// `action|actor|entity|batch|operation|timestamp|payload`.
pub fn canonical_content(
    action_type: &str,
    actor: &str,
    entity_ref: Option<&str>,
    batch_ref: Option<&str>,
    operation_ref: Option<&str>,
    timestamp: Timestamp,
    payload: &Value,
) -> String {
    format!(
        "{}|{}|{}|{}|{}|{}|{}",
        action_type,
        actor,
        entity_ref.unwrap_or(""),
        batch_ref.unwrap_or(""),
        operation_ref.unwrap_or(""),
        timestamp.to_rfc3339(),
        canonicalize(payload),
    )
}

/// Compute a record's hash: SHA-256 over its content joined with the
/// previous record's hash.
pub fn compute_entry_hash(content: &str, previous_hash: &str) -> String {
    sha256_hex(format!("{content}|{previous_hash}").as_bytes())
}

// ---------------------------------------------------------------------------
// Verifier input
// ---------------------------------------------------------------------------

/// A stored chain record as the verifier sees it.
///
/// The persistence model maps into this view so verification stays free
/// of database concerns.
#[derive(Debug, Clone)]
pub struct ChainEntryView {
    pub id: DbId,
    pub timestamp: Timestamp,
    pub action_type: String,
    pub actor: String,
    pub entity_ref: Option<String>,
    pub batch_ref: Option<String>,
    pub operation_ref: Option<String>,
    pub payload: Value,
    pub previous_hash: String,
    pub current_hash: String,
}

impl ChainEntryView {
    /// Recompute this record's hash from its stored content and stored
    /// `previous_hash`.
    pub fn recomputed_hash(&self) -> String {
        let content = canonical_content(
            &self.action_type,
            &self.actor,
            self.entity_ref.as_deref(),
            self.batch_ref.as_deref(),
            self.operation_ref.as_deref(),
            self.timestamp,
            &self.payload,
        );
        compute_entry_hash(&content, &self.previous_hash)
    }
}

// ---------------------------------------------------------------------------
// Tamper report
// ---------------------------------------------------------------------------

/// The two distinct ways a record can fail verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainIssueKind {
    /// The record's stored hash does not match its recomputed content
    /// hash: the record itself was altered.
    ContentMismatch,
    /// The record's stored `previous_hash` does not match its
    /// predecessor's hash: the link is broken.
    LinkMismatch,
}

/// One verification failure, tied to the offending record.
#[derive(Debug, Clone, Serialize)]
pub struct ChainIssue {
    pub log_id: DbId,
    pub timestamp: Timestamp,
    pub action_type: String,
    pub kind: ChainIssueKind,
    pub message: String,
    pub expected: String,
    pub actual: String,
}

/// Result of walking a chain range.
#[derive(Debug, Clone, Serialize)]
pub struct ChainVerification {
    pub is_valid: bool,
    pub checked: i64,
    pub issues: Vec<ChainIssue>,
}

// ---------------------------------------------------------------------------
// Verifier
// ---------------------------------------------------------------------------

/// Verify a range of chain records in append order.
///
/// For each record the content hash is recomputed and compared to the
/// stored value, and the stored `previous_hash` is compared to the
/// *recomputed* hash of the prior record -- so an altered record is
/// reported both on itself and on its successor's broken link. When
/// `from_genesis` is set the first record must carry the empty
/// previous-hash. Read-only: records are never repaired.
pub fn verify_records(records: &[ChainEntryView], from_genesis: bool) -> ChainVerification {
    let mut issues = Vec::new();
    let mut expected_previous: Option<String> =
        from_genesis.then(|| GENESIS_PREVIOUS_HASH.to_string());

    for record in records {
        let recomputed = record.recomputed_hash();

        if recomputed != record.current_hash {
            issues.push(ChainIssue {
                log_id: record.id,
                timestamp: record.timestamp,
                action_type: record.action_type.clone(),
                kind: ChainIssueKind::ContentMismatch,
                message: format!(
                    "stored hash does not match recomputed content hash for record {}",
                    record.id
                ),
                expected: recomputed.clone(),
                actual: record.current_hash.clone(),
            });
        }

        if let Some(expected) = &expected_previous {
            if record.previous_hash != *expected {
                issues.push(ChainIssue {
                    log_id: record.id,
                    timestamp: record.timestamp,
                    action_type: record.action_type.clone(),
                    kind: ChainIssueKind::LinkMismatch,
                    message: format!(
                        "previous-hash link broken at record {}",
                        record.id
                    ),
                    expected: expected.clone(),
                    actual: record.previous_hash.clone(),
                });
            }
        }

        expected_previous = Some(recomputed);
    }

    ChainVerification {
        is_valid: issues.is_empty(),
        checked: records.len() as i64,
        issues,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    /// Build a well-formed chain of `n` records.
    fn build_chain(n: usize) -> Vec<ChainEntryView> {
        let mut records = Vec::with_capacity(n);
        let mut previous_hash = GENESIS_PREVIOUS_HASH.to_string();

        for i in 0..n {
            let timestamp = Utc::now();
            let action_type = "import_batch".to_string();
            let actor = format!("admin-{i}");
            let payload = json!({"rows": i * 10});

            let content = canonical_content(
                &action_type,
                &actor,
                Some("fleet-42"),
                None,
                None,
                timestamp,
                &payload,
            );
            let current_hash = compute_entry_hash(&content, &previous_hash);

            records.push(ChainEntryView {
                id: i as DbId + 1,
                timestamp,
                action_type,
                actor,
                entity_ref: Some("fleet-42".to_string()),
                batch_ref: None,
                operation_ref: None,
                payload,
                previous_hash: previous_hash.clone(),
                current_hash: current_hash.clone(),
            });
            previous_hash = current_hash;
        }
        records
    }

    #[test]
    fn empty_chain_is_valid() {
        let result = verify_records(&[], true);
        assert!(result.is_valid);
        assert_eq!(result.checked, 0);
    }

    #[test]
    fn intact_chain_verifies_clean() {
        let records = build_chain(5);
        let result = verify_records(&records, true);
        assert!(result.is_valid);
        assert_eq!(result.checked, 5);
        assert!(result.issues.is_empty());
    }

    #[test]
    fn hash_is_deterministic() {
        let a = compute_entry_hash("content", "prev");
        let b = compute_entry_hash("content", "prev");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn hash_depends_on_previous() {
        let a = compute_entry_hash("content", "prev_a");
        let b = compute_entry_hash("content", "prev_b");
        assert_ne!(a, b);
    }

    #[test]
    fn tampered_content_reports_record_and_broken_successor_link() {
        let mut records = build_chain(4);
        // Alter record 2's payload after the fact.
        records[1].payload = json!({"rows": 9999});

        let result = verify_records(&records, true);
        assert!(!result.is_valid);
        assert_eq!(result.issues.len(), 2);

        let content = &result.issues[0];
        assert_eq!(content.kind, ChainIssueKind::ContentMismatch);
        assert_eq!(content.log_id, 2);
        assert_ne!(content.expected, content.actual);

        let link = &result.issues[1];
        assert_eq!(link.kind, ChainIssueKind::LinkMismatch);
        assert_eq!(link.log_id, 3);
    }

    #[test]
    fn tampered_last_record_reports_single_issue() {
        let mut records = build_chain(3);
        records[2].actor = "intruder".to_string();

        let result = verify_records(&records, true);
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].log_id, 3);
        assert_eq!(result.issues[0].kind, ChainIssueKind::ContentMismatch);
    }

    #[test]
    fn rewritten_hash_breaks_successor_link_only() {
        let mut records = build_chain(3);
        // An attacker recomputes record 2's hash to cover their edit but
        // cannot fix record 3's stored previous-hash.
        records[1].payload = json!({"rows": 9999});
        records[1].current_hash = records[1].recomputed_hash();

        let result = verify_records(&records, true);
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].log_id, 3);
        assert_eq!(result.issues[0].kind, ChainIssueKind::LinkMismatch);
    }

    #[test]
    fn first_record_must_start_from_genesis_when_walking_full_history() {
        let mut records = build_chain(2);
        records[0].previous_hash = "deadbeef".to_string();

        let result = verify_records(&records, true);
        assert!(!result.is_valid);
        // The forged previous-hash changes the recomputed hash too, so
        // both the link and the content checks fire on record 1.
        assert!(result
            .issues
            .iter()
            .any(|i| i.log_id == 1 && i.kind == ChainIssueKind::LinkMismatch));
    }

    #[test]
    fn ranged_walk_skips_genesis_check() {
        let records = build_chain(5);
        // Verify a mid-chain slice: the first record's predecessor is
        // outside the range, so only internal links are checked.
        let result = verify_records(&records[2..], false);
        assert!(result.is_valid);
        assert_eq!(result.checked, 3);
    }
}
