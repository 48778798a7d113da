//! Veritax core domain logic.
//!
//! This crate holds the governance-layer building blocks that have no
//! internal dependencies, so they can be used by the API server, the
//! delivery worker, and any future CLI tooling alike:
//!
//! - [`masking`] — recursive sensitive-field redaction for audit capture.
//! - [`canonical`] — canonical JSON serialization (stable key order) used
//!   for webhook signing and chain content.
//! - [`correlation`] — correlation-ID validation and generation.
//! - [`rate_limit`] — per-key sliding-window rate limiting over an
//!   injected window store.
//! - [`chain`] — hash-chain content building, entry hashing, and the
//!   read-only integrity verifier.
//! - [`webhooks`] — delivery status vocabulary and the retry policy.
//! - [`api_keys`] — key generation, hashing, and default budgets.
//! - [`signing`] — HMAC-SHA256 payload signatures.
//! - [`data_change`] — top-level scalar diffing for change records.

pub mod api_keys;
pub mod canonical;
pub mod chain;
pub mod correlation;
pub mod data_change;
pub mod error;
pub mod hashing;
pub mod masking;
pub mod rate_limit;
pub mod signing;
pub mod types;
pub mod webhooks;
