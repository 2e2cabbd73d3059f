//! Fan-out of the broker's tick stream to subscribers - distilled spec
//! section 4.A. Ticks are commodity: a slow subscriber drops batches rather
//! than applying backpressure to the broker's WS reader.

use model::TickBatch;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use tokio::sync::mpsc;
use tracing::warn;

/// Fans a single tick stream out to N bounded subscriber queues.
///
/// Subscription changes take a write lock; `publish` takes a read lock, so
/// many publishes and few (re)subscriptions can proceed without contending
/// on each other - subscribers are expected to attach once, at startup.
#[derive(Debug, Default)]
pub struct TickBroadcaster {
    subscribers: RwLock<Vec<mpsc::Sender<TickBatch>>>,
    dropped: AtomicU64,
}

impl TickBroadcaster {
    /// Creates an empty broadcaster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new subscriber with a bounded queue of `buffer_size`.
    /// Returns the receiving half; every batch published after this call
    /// is delivered to it, subject to the drop-on-full policy.
    pub fn subscribe(&self, buffer_size: usize) -> mpsc::Receiver<TickBatch> {
        let (tx, rx) = mpsc::channel(buffer_size);
        self.subscribers
            .write()
            .unwrap_or_else(|e| {
                tracing::error!("subscriber list lock poisoned: {e}");
                std::process::exit(1);
            })
            .push(tx);
        rx
    }

    /// Delivers `batch` to every current subscriber using try-send;
    /// subscribers whose queue is full simply miss this batch.
    pub fn publish(&self, batch: TickBatch) {
        let subscribers = self.subscribers.read().unwrap_or_else(|e| {
            tracing::error!("subscriber list lock poisoned: {e}");
            std::process::exit(1);
        });
        for subscriber in subscribers.iter() {
            if subscriber.try_send(batch.clone()).is_err() {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("dropped tick batch for a slow subscriber");
            }
        }
    }

    /// Total number of batches dropped across all subscribers since start.
    /// Counted for observability only - never surfaced as an error.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Number of currently attached subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(|e| {
                tracing::error!("subscriber list lock poisoned: {e}");
                std::process::exit(1);
            })
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::Tick;
    use rust_decimal_macros::dec;

    fn batch(token: u32) -> TickBatch {
        TickBatch::single(Tick {
            instrument_token: token,
            last_price: dec!(100),
        })
    }

    #[tokio::test]
    async fn subscriber_receives_batches_published_after_subscribe() {
        let broadcaster = TickBroadcaster::new();
        let mut rx = broadcaster.subscribe(4);
        broadcaster.publish(batch(1));
        let received = rx.recv().await.unwrap();
        assert_eq!(received.ticks[0].instrument_token, 1);
    }

    #[tokio::test]
    async fn full_queue_drops_instead_of_blocking() {
        let broadcaster = TickBroadcaster::new();
        let mut rx = broadcaster.subscribe(1);
        broadcaster.publish(batch(1));
        broadcaster.publish(batch(2));
        assert_eq!(broadcaster.dropped_count(), 1);
        let received = rx.recv().await.unwrap();
        assert_eq!(received.ticks[0].instrument_token, 1);
    }

    #[tokio::test]
    async fn each_subscriber_sees_its_own_fifo_view() {
        let broadcaster = TickBroadcaster::new();
        let mut a = broadcaster.subscribe(4);
        let mut b = broadcaster.subscribe(4);
        broadcaster.publish(batch(1));
        broadcaster.publish(batch(2));
        assert_eq!(a.recv().await.unwrap().ticks[0].instrument_token, 1);
        assert_eq!(a.recv().await.unwrap().ticks[0].instrument_token, 2);
        assert_eq!(b.recv().await.unwrap().ticks[0].instrument_token, 1);
        assert_eq!(b.recv().await.unwrap().ticks[0].instrument_token, 2);
    }
}
