//! Standalone webhook delivery worker.
//!
//! Polls the delivery table for due attempts and executes them. This is
//! the recovery path for deliveries stranded by an API-server crash and
//! the scheduled-retry executor when run instead of (or alongside) the
//! in-process queue -- re-running an attempt that another worker already
//! finalized is safe, the worker re-reads state and skips it.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use veritax_events::store::WebhookStore;
use veritax_events::{DeliveryQueue, DeliveryWorker, HttpTransport, PgWebhookStore};

/// How often the worker polls for due deliveries.
const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Maximum deliveries picked up per poll.
const POLL_BATCH: i64 = 50;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "veritax_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = veritax_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    veritax_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Worker connected to database");

    // Polling-only mode: retries are picked up when their
    // next_attempt_at comes due, so the in-process queue stays closed.
    let (queue, rx) = DeliveryQueue::new();
    drop(rx);

    let store = Arc::new(PgWebhookStore::new(pool));
    let worker = DeliveryWorker::new(
        Arc::clone(&store) as Arc<dyn WebhookStore>,
        Arc::new(HttpTransport::new()),
        queue,
    );

    tracing::info!(
        poll_secs = POLL_INTERVAL.as_secs(),
        batch = POLL_BATCH,
        "Delivery worker polling for due webhooks"
    );

    // Cancel on SIGINT/SIGTERM; the poll loop drains its current batch
    // before exiting.
    let cancel = tokio_util::sync::CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            tracing::info!("Shutdown signal received, worker stopping");
            cancel.cancel();
        }
    });

    let mut interval = tokio::time::interval(POLL_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                break;
            }
            _ = interval.tick() => {
                let due = match store.list_due(POLL_BATCH).await {
                    Ok(due) => due,
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to poll due deliveries");
                        continue;
                    }
                };

                for delivery in due {
                    if let Err(e) = worker.attempt(delivery.id).await {
                        tracing::error!(
                            delivery_id = delivery.id,
                            error = %e,
                            "Delivery attempt errored",
                        );
                    }
                }
            }
        }
    }
}

/// Wait for a termination signal (SIGINT or SIGTERM on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
