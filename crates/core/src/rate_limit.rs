//! Per-key sliding-window rate limiting.
//!
//! Each API key owns two independent budgets: requests per trailing hour
//! and requests per trailing day. A request is throttled when either
//! window is exhausted. Window state lives behind the [`WindowStore`]
//! trait so the limiter can run against the in-memory store here or any
//! other concurrency-safe backing.
//!
//! The store contract is atomic per `(key, kind)`: pruning, counting,
//! and recording happen under one critical section, so two concurrent
//! requests can never both take the last remaining slot.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Window kinds
// ---------------------------------------------------------------------------

/// The two independent budget windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowKind {
    Hour,
    Day,
}

impl WindowKind {
    /// Window length in seconds.
    pub fn duration_secs(&self) -> i64 {
        match self {
            Self::Hour => 3600,
            Self::Day => 86_400,
        }
    }

    /// String representation for logging and metrics labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hour => "hour",
            Self::Day => "day",
        }
    }
}

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

/// Outcome of consulting one window.
#[derive(Debug, Clone, Copy)]
pub struct WindowDecision {
    pub allowed: bool,
    pub limit: u32,
    /// Slots left after this request (0 when denied).
    pub remaining: u32,
    /// Seconds until the window resets: measured from the oldest
    /// retained entry, or the full window length when empty.
    pub reset_secs: i64,
}

/// Combined outcome across both windows for one request.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitOutcome {
    pub hour: WindowDecision,
    pub day: WindowDecision,
}

impl RateLimitOutcome {
    /// Whether the request is admitted (both windows allowed it).
    pub fn allowed(&self) -> bool {
        self.hour.allowed && self.day.allowed
    }

    /// The window whose quota headers the response should carry: the
    /// denying window when throttled, otherwise the one with the fewest
    /// remaining slots.
    pub fn binding(&self) -> WindowDecision {
        if !self.hour.allowed {
            self.hour
        } else if !self.day.allowed {
            self.day
        } else if self.hour.remaining <= self.day.remaining {
            self.hour
        } else {
            self.day
        }
    }
}

/// Per-key budgets, resolved from the key row with system defaults as
/// fallback.
#[derive(Debug, Clone, Copy)]
pub struct KeyQuota {
    pub hourly_limit: u32,
    pub daily_limit: u32,
}

// ---------------------------------------------------------------------------
// Store abstraction
// ---------------------------------------------------------------------------

/// Concurrency-safe storage for window timestamps.
///
/// Implementations must make [`check_and_record`](WindowStore::check_and_record)
/// atomic per `(key, kind)`.
pub trait WindowStore: Send + Sync {
    /// Prune expired entries, then admit and record the request if the
    /// window has a free slot.
    fn check_and_record(
        &self,
        key: &str,
        kind: WindowKind,
        limit: u32,
        now: Timestamp,
    ) -> WindowDecision;

    /// Inspect a window without recording anything. Used to report the
    /// secondary window's quota when the primary already denied.
    fn peek(&self, key: &str, kind: WindowKind, limit: u32, now: Timestamp) -> WindowDecision;
}

// ---------------------------------------------------------------------------
// Limiter
// ---------------------------------------------------------------------------

/// Sliding-window limiter over an injected store.
pub struct RateLimiter<S: WindowStore> {
    store: S,
}

impl<S: WindowStore> RateLimiter<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Check and record one request against both windows.
    ///
    /// The hourly window is consulted first; when it denies, the daily
    /// window is only peeked so the rejected request does not consume a
    /// daily slot.
    pub fn check_and_record(&self, key: &str, quota: KeyQuota, now: Timestamp) -> RateLimitOutcome {
        let hour = self
            .store
            .check_and_record(key, WindowKind::Hour, quota.hourly_limit, now);

        let day = if hour.allowed {
            self.store
                .check_and_record(key, WindowKind::Day, quota.daily_limit, now)
        } else {
            self.store
                .peek(key, WindowKind::Day, quota.daily_limit, now)
        };

        RateLimitOutcome { hour, day }
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Mutex-guarded in-memory window store.
///
/// This is the shared counter store for a single-node deployment and
/// the backing used by tests. All mutation happens inside one lock
/// acquisition, which satisfies the atomic read-modify-write contract.
#[derive(Default)]
pub struct InMemoryWindowStore {
    windows: Mutex<HashMap<(String, WindowKind), Vec<Timestamp>>>,
}

impl InMemoryWindowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Build a decision for a pruned window of `len` entries.
fn decide(entries: &[Timestamp], limit: u32, kind: WindowKind, now: Timestamp) -> WindowDecision {
    let window = chrono::Duration::seconds(kind.duration_secs());
    let len = entries.len() as u32;

    if len < limit {
        let reset_secs = match entries.first() {
            Some(oldest) => (*oldest + window - now).num_seconds(),
            None => kind.duration_secs(),
        };
        WindowDecision {
            allowed: true,
            limit,
            remaining: limit - len - 1,
            reset_secs,
        }
    } else {
        // Full: reset when the oldest entry leaves the window.
        let oldest = entries.first().copied().unwrap_or(now);
        WindowDecision {
            allowed: false,
            limit,
            remaining: 0,
            reset_secs: (oldest + window - now).num_seconds().max(0),
        }
    }
}

impl WindowStore for InMemoryWindowStore {
    fn check_and_record(
        &self,
        key: &str,
        kind: WindowKind,
        limit: u32,
        now: Timestamp,
    ) -> WindowDecision {
        let cutoff = now - chrono::Duration::seconds(kind.duration_secs());

        let mut windows = self.windows.lock().expect("window store lock poisoned");
        let entries = windows.entry((key.to_string(), kind)).or_default();
        entries.retain(|t| *t > cutoff);

        let decision = decide(entries, limit, kind, now);
        if decision.allowed {
            entries.push(now);
        }
        decision
    }

    fn peek(&self, key: &str, kind: WindowKind, limit: u32, now: Timestamp) -> WindowDecision {
        let cutoff = now - chrono::Duration::seconds(kind.duration_secs());

        let mut windows = self.windows.lock().expect("window store lock poisoned");
        let entries = windows.entry((key.to_string(), kind)).or_default();
        entries.retain(|t| *t > cutoff);

        let mut decision = decide(entries, limit, kind, now);
        if decision.allowed {
            // A peek does not consume the slot it would have taken.
            decision.remaining = limit - entries.len() as u32;
        }
        decision
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn quota(hourly: u32, daily: u32) -> KeyQuota {
        KeyQuota {
            hourly_limit: hourly,
            daily_limit: daily,
        }
    }

    #[test]
    fn admits_up_to_limit_then_denies() {
        let limiter = RateLimiter::new(InMemoryWindowStore::new());
        let now = Utc::now();

        for i in 0..5 {
            let outcome = limiter.check_and_record("key-a", quota(5, 100), now);
            assert!(outcome.allowed(), "request {i} should be admitted");
        }

        let denied = limiter.check_and_record("key-a", quota(5, 100), now);
        assert!(!denied.allowed());
        assert_eq!(denied.hour.remaining, 0);
    }

    #[test]
    fn remaining_counts_down() {
        let limiter = RateLimiter::new(InMemoryWindowStore::new());
        let now = Utc::now();

        let first = limiter.check_and_record("key-b", quota(3, 100), now);
        assert_eq!(first.hour.remaining, 2);
        let second = limiter.check_and_record("key-b", quota(3, 100), now);
        assert_eq!(second.hour.remaining, 1);
        let third = limiter.check_and_record("key-b", quota(3, 100), now);
        assert_eq!(third.hour.remaining, 0);
    }

    #[test]
    fn window_slides_past_old_entries() {
        let limiter = RateLimiter::new(InMemoryWindowStore::new());
        let start = Utc::now();

        for _ in 0..2 {
            assert!(limiter.check_and_record("key-c", quota(2, 100), start).allowed());
        }
        assert!(!limiter.check_and_record("key-c", quota(2, 100), start).allowed());

        // One second past the hour, the oldest entries have expired.
        let later = start + Duration::seconds(3601);
        assert!(limiter.check_and_record("key-c", quota(2, 100), later).allowed());
    }

    #[test]
    fn denied_request_reports_time_until_oldest_exits() {
        let limiter = RateLimiter::new(InMemoryWindowStore::new());
        let start = Utc::now();

        assert!(limiter.check_and_record("key-d", quota(1, 100), start).allowed());

        let denied = limiter.check_and_record("key-d", quota(1, 100), start + Duration::seconds(600));
        assert!(!denied.allowed());
        assert_eq!(denied.hour.reset_secs, 3000);
    }

    #[test]
    fn empty_window_resets_after_full_duration() {
        let limiter = RateLimiter::new(InMemoryWindowStore::new());
        let outcome = limiter.check_and_record("key-e", quota(10, 100), Utc::now());
        assert_eq!(outcome.hour.reset_secs, 3600);
    }

    #[test]
    fn daily_window_denies_independently() {
        let limiter = RateLimiter::new(InMemoryWindowStore::new());
        let now = Utc::now();

        // Generous hourly budget, daily budget of 2.
        assert!(limiter.check_and_record("key-f", quota(100, 2), now).allowed());
        assert!(limiter.check_and_record("key-f", quota(100, 2), now).allowed());

        let denied = limiter.check_and_record("key-f", quota(100, 2), now);
        assert!(!denied.allowed());
        assert!(denied.hour.allowed);
        assert!(!denied.day.allowed);
        assert_eq!(denied.binding().remaining, 0);
    }

    #[test]
    fn hourly_denial_does_not_consume_daily_slot() {
        let limiter = RateLimiter::new(InMemoryWindowStore::new());
        let now = Utc::now();

        assert!(limiter.check_and_record("key-g", quota(1, 2), now).allowed());
        // Denied by the hour window; the day window is only peeked.
        assert!(!limiter.check_and_record("key-g", quota(1, 2), now).allowed());

        // Day window still has one slot left for the next hour.
        let later = now + Duration::seconds(3601);
        assert!(limiter.check_and_record("key-g", quota(1, 2), later).allowed());
    }

    #[test]
    fn keys_are_isolated() {
        let limiter = RateLimiter::new(InMemoryWindowStore::new());
        let now = Utc::now();

        assert!(limiter.check_and_record("key-h", quota(1, 10), now).allowed());
        assert!(!limiter.check_and_record("key-h", quota(1, 10), now).allowed());
        assert!(limiter.check_and_record("key-i", quota(1, 10), now).allowed());
    }

    #[test]
    fn binding_window_is_the_more_constrained_one() {
        let limiter = RateLimiter::new(InMemoryWindowStore::new());
        let now = Utc::now();

        let outcome = limiter.check_and_record("key-j", quota(100, 5), now);
        assert!(outcome.allowed());
        assert_eq!(outcome.binding().limit, 5);
    }

    #[test]
    fn concurrent_requests_admit_exactly_limit() {
        use std::sync::Arc;

        let limiter = Arc::new(RateLimiter::new(InMemoryWindowStore::new()));
        let now = Utc::now();
        let mut handles = Vec::new();

        for _ in 0..8 {
            let limiter = Arc::clone(&limiter);
            handles.push(std::thread::spawn(move || {
                let mut admitted = 0u32;
                for _ in 0..25 {
                    if limiter.check_and_record("shared", quota(50, 1000), now).allowed() {
                        admitted += 1;
                    }
                }
                admitted
            }));
        }

        let total: u32 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, 50, "exactly the hourly limit must be admitted");
    }
}
