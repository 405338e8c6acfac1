//! Bounded message queue (C5).
//!
//! A multi-producer/multi-consumer FIFO of `RowFingerprint` batches with capacity in batches,
//! backed by `tokio::sync::mpsc`. Blocking `put` gives the sole backpressure path the
//! Extractor relies on; timed `poll` lets the Loader periodically check for completion
//! without busy-waiting.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

use crate::model::RowFingerprint;

/// One unit of queue traffic: a non-empty batch of fingerprints, or the empty sentinel batch
/// an Extractor enqueues on end-of-cursor.
pub type Batch = Vec<RowFingerprint>;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("queue closed: all senders dropped")]
    Closed,
}

/// Bounded, cloneable producer handle.
#[derive(Clone)]
pub struct QueueSender {
    inner: mpsc::Sender<Batch>,
}

impl QueueSender {
    /// Blocking put: suspends the caller until capacity is available. This is the backpressure
    /// path extractors stall on when the queue is full.
    pub async fn put(&self, batch: Batch) -> Result<(), QueueError> {
        self.inner.send(batch).await.map_err(|_| QueueError::Closed)
    }
}

/// Single-owner consumer handle (the Loader drains it).
pub struct QueueReceiver {
    inner: mpsc::Receiver<Batch>,
}

impl QueueReceiver {
    /// Poll with a timeout; `Ok(None)` means the timeout elapsed with nothing available,
    /// `Err(QueueError::Closed)` means every producer has dropped and the queue has drained.
    pub async fn poll(&mut self, timeout: Duration) -> Result<Option<Batch>, QueueError> {
        match tokio::time::timeout(timeout, self.inner.recv()).await {
            Ok(Some(batch)) => Ok(Some(batch)),
            Ok(None) => Err(QueueError::Closed),
            Err(_elapsed) => Ok(None),
        }
    }
}

/// A receiver shared by several Loader tasks draining the same side's queue. `tokio::sync::mpsc`
/// is single-consumer; wrapping it in a mutex is the standard way to fan a bounded channel out
/// to `loader-threads` consumers while keeping FIFO-per-producer delivery (C5's "multi-consumer"
/// requirement).
pub type SharedReceiver = Arc<Mutex<QueueReceiver>>;

/// A bounded queue of batches, with capacity expressed in number of batches
/// (`message-queue-size`).
pub struct BoundedQueue;

impl BoundedQueue {
    /// Build a connected sender/receiver pair with the given capacity.
    pub fn channel(capacity: usize) -> (QueueSender, QueueReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (QueueSender { inner: tx }, QueueReceiver { inner: rx })
    }

    /// Build a sender/shared-receiver pair, for the common case of several Loaders draining
    /// one side's queue concurrently.
    pub fn channel_shared(capacity: usize) -> (QueueSender, SharedReceiver) {
        let (tx, rx) = Self::channel(capacity);
        (tx, Arc::new(Mutex::new(rx)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RowFingerprint;
    use std::collections::BTreeMap;

    fn sample_row(pk: &str) -> RowFingerprint {
        RowFingerprint {
            tid: 1,
            pk_hash: format!("{:032x}", pk.len()),
            column_hash: "0".repeat(32),
            pk: BTreeMap::from([("id".to_string(), pk.to_string())]),
        }
    }

    #[tokio::test]
    async fn test_put_poll_roundtrip() {
        let (tx, mut rx) = BoundedQueue::channel(2);
        tx.put(vec![sample_row("1")]).await.unwrap();
        let batch = rx.poll(Duration::from_millis(100)).await.unwrap();
        assert_eq!(batch.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_poll_timeout_returns_none() {
        let (_tx, mut rx) = BoundedQueue::channel(2);
        let batch = rx.poll(Duration::from_millis(10)).await.unwrap();
        assert!(batch.is_none());
    }

    #[tokio::test]
    async fn test_backpressure_blocks_when_full() {
        let (tx, mut rx) = BoundedQueue::channel(1);
        tx.put(vec![sample_row("1")]).await.unwrap();

        let tx2 = tx.clone();
        let put_task = tokio::spawn(async move { tx2.put(vec![sample_row("2")]).await });

        // The second put should not have completed yet: the channel is full.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!put_task.is_finished());

        // Draining one batch unblocks it.
        rx.poll(Duration::from_millis(100)).await.unwrap();
        put_task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_closed_after_all_senders_dropped() {
        let (tx, mut rx) = BoundedQueue::channel(1);
        drop(tx);
        let result = rx.poll(Duration::from_millis(10)).await;
        assert!(matches!(result, Err(QueueError::Closed)));
    }
}
