//! Bounded, ordered delivery of outbound worker messages.
//!
//! A queue instance is bound to exactly one worker for its lifetime. The
//! producer side suspends when the queue is full, so a producer that emits
//! faster than the consumer drains is slowed down instead of growing an
//! unbounded mailbox or dropping messages. Delivery is strictly FIFO.

use tokio::sync::mpsc;

use crate::error::SyncError;

/// Default queue depth for worker event queues.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Producer handle of a bounded FIFO queue.
#[derive(Clone)]
pub struct BackpressureQueue<M> {
    tx: mpsc::Sender<M>,
}

/// Create a queue with the given capacity. The receiver belongs to the
/// queue's single consumer (the worker's drain loop).
pub fn channel<M>(capacity: usize) -> (BackpressureQueue<M>, mpsc::Receiver<M>) {
    let (tx, rx) = mpsc::channel(capacity);
    (BackpressureQueue { tx }, rx)
}

impl<M> BackpressureQueue<M> {
    /// Enqueue a message, waiting for capacity if the consumer is behind.
    pub async fn send(&self, message: M) -> Result<(), SyncError> {
        self.tx.send(message).await.map_err(|_| SyncError::QueueClosed)
    }

    /// Enqueue without waiting. Callers that must not block use this and
    /// treat `QueueFull` as a signal to back off.
    pub fn try_send(&self, message: M) -> Result<(), SyncError> {
        self.tx.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SyncError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => SyncError::QueueClosed,
        })
    }

    /// Whether the consumer side has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn fifo_order_preserved_under_slow_consumer() {
        let (queue, mut rx) = channel::<u32>(2);

        let producer = tokio::spawn(async move {
            for n in 1..=10u32 {
                queue.send(n).await.unwrap();
            }
        });

        // Slow consumer: drain one message per 10 ms of virtual time.
        let mut received = Vec::new();
        while received.len() < 10 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            if let Some(n) = rx.recv().await {
                received.push(n);
            }
        }

        producer.await.unwrap();
        assert_eq!(received, (1..=10).collect::<Vec<_>>());
    }

    #[tokio::test(start_paused = true)]
    async fn producer_suspends_when_full() {
        let (queue, mut rx) = channel::<u32>(1);

        queue.send(1).await.unwrap();
        // Queue is now full; try_send must refuse rather than drop.
        assert!(matches!(queue.try_send(2), Err(SyncError::QueueFull)));

        assert_eq!(rx.recv().await, Some(1));
        queue.try_send(2).unwrap();
        assert_eq!(rx.recv().await, Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn send_fails_after_consumer_drops() {
        let (queue, rx) = channel::<u32>(4);
        drop(rx);
        assert!(queue.is_closed());
        assert!(matches!(queue.send(1).await, Err(SyncError::QueueClosed)));
        assert!(matches!(queue.try_send(1), Err(SyncError::QueueClosed)));
    }
}
