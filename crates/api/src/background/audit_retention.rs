//! Periodic purge of expired audit records.
//!
//! Spawns a background task that deletes rows from `api_audit_records`
//! older than the configured retention period. Runs on a fixed interval
//! using `tokio::time::interval`.

use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use veritax_db::repositories::AuditRepo;

/// How often the cleanup job runs.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(3600); // 1 hour

/// Run the audit retention cleanup loop.
///
/// Deletes audit records older than `retention_days`. Runs until
/// `cancel` is triggered. Failures are logged and retried on the next
/// tick; retention is housekeeping, never on the request path.
pub async fn run(pool: PgPool, retention_days: i64, cancel: CancellationToken) {
    tracing::info!(
        retention_days,
        interval_secs = CLEANUP_INTERVAL.as_secs(),
        "Audit retention job started"
    );

    let mut interval = tokio::time::interval(CLEANUP_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Audit retention job stopping");
                break;
            }
            _ = interval.tick() => {
                let cutoff = Utc::now() - chrono::Duration::days(retention_days);
                match AuditRepo::delete_older_than(&pool, cutoff).await {
                    Ok(deleted) => {
                        if deleted > 0 {
                            tracing::info!(deleted, "Audit retention: purged old records");
                        } else {
                            tracing::debug!("Audit retention: no records to purge");
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Audit retention: cleanup failed");
                    }
                }
            }
        }
    }
}
