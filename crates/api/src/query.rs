//! Shared query parameter types for API handlers.

use serde::Deserialize;

/// Default number of rows per page for list endpoints.
pub const DEFAULT_PAGE_LIMIT: i64 = 50;

/// Maximum number of rows per page for list endpoints.
pub const MAX_PAGE_LIMIT: i64 = 200;

/// Generic pagination parameters (`?limit=&offset=`).
///
/// Used by any handler that supports paginated listing. Values are
/// clamped via [`clamp_limit`] / [`clamp_offset`] before reaching the
/// repository layer.
#[derive(Debug, Deserialize)]
pub struct PaginationParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Clamp a requested page size into `[1, max]`, defaulting when absent.
pub fn clamp_limit(limit: Option<i64>, default: i64, max: i64) -> i64 {
    limit.unwrap_or(default).clamp(1, max)
}

/// Clamp a requested offset to be non-negative.
pub fn clamp_offset(offset: Option<i64>) -> i64 {
    offset.unwrap_or(0).max(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_limit_uses_default() {
        assert_eq!(clamp_limit(None, 50, 200), 50);
    }

    #[test]
    fn oversized_limit_is_capped() {
        assert_eq!(clamp_limit(Some(10_000), 50, 200), 200);
    }

    #[test]
    fn zero_limit_becomes_one() {
        assert_eq!(clamp_limit(Some(0), 50, 200), 1);
    }

    #[test]
    fn negative_offset_becomes_zero() {
        assert_eq!(clamp_offset(Some(-5)), 0);
    }
}
