//! Request middleware: API-key authentication, rate limiting, and the
//! correlation/audit recorder.
//!
//! The layers run outside-in as recorder → auth → rate limit, so every
//! response (including 401s and 429s produced by the inner layers) is
//! timed, audited, and stamped with a correlation ID.

pub mod auth;
pub mod rate_limit;
pub mod recorder;
