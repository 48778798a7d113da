//! In-process delivery queue.
//!
//! Dispatch must never block the caller on network I/O, so it only
//! pushes delivery IDs onto this queue; a consumer task owned by the
//! server (or the standalone worker) picks them up and runs the actual
//! HTTP attempts. Retries re-enter the same queue with their backoff
//! delay attached.

use std::time::Duration;

use tokio::sync::mpsc;
use veritax_core::types::DbId;

/// One queued delivery attempt.
#[derive(Debug, Clone, Copy)]
pub struct QueuedDelivery {
    pub delivery_id: DbId,
    /// How long the consumer waits before attempting.
    pub delay: Duration,
}

/// Cloneable enqueue handle backed by an unbounded channel.
///
/// Unbounded is deliberate: enqueue is fire-and-forget from the request
/// path and must not apply backpressure there; the attempt cap bounds
/// total work per delivery.
#[derive(Clone)]
pub struct DeliveryQueue {
    tx: mpsc::UnboundedSender<QueuedDelivery>,
}

impl DeliveryQueue {
    /// Create the queue, returning the enqueue handle and the receiver
    /// the consumer task drains.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<QueuedDelivery>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Enqueue a delivery attempt. A closed channel (consumer shut
    /// down) is logged and swallowed: the standalone worker will pick
    /// the delivery up from its `next_attempt_at` instead.
    pub fn enqueue(&self, delivery_id: DbId, delay: Duration) {
        if self
            .tx
            .send(QueuedDelivery { delivery_id, delay })
            .is_err()
        {
            tracing::debug!(
                delivery_id,
                "Delivery queue closed; attempt left to the polling worker"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn enqueued_items_arrive_in_order() {
        let (queue, mut rx) = DeliveryQueue::new();
        queue.enqueue(1, Duration::ZERO);
        queue.enqueue(2, Duration::from_secs(5));

        let first = rx.recv().await.unwrap();
        assert_eq!(first.delivery_id, 1);
        assert_eq!(first.delay, Duration::ZERO);

        let second = rx.recv().await.unwrap();
        assert_eq!(second.delivery_id, 2);
        assert_eq!(second.delay, Duration::from_secs(5));
    }

    #[test]
    fn enqueue_after_receiver_dropped_does_not_panic() {
        let (queue, rx) = DeliveryQueue::new();
        drop(rx);
        queue.enqueue(7, Duration::ZERO);
    }
}
