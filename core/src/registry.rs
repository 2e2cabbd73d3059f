//! Authoritative mapping of tracked instruments - distilled spec section
//! 4.C. Readers (the signal engine) vastly outnumber writers (HTTP
//! handlers, the scheduler, fills), so a single `RwLock<HashMap>` is used
//! rather than per-entry locking: every mutator holds the write side for
//! the entire read-modify-write, exactly as the contract requires.

use model::{BasePriceUpdater, TokenSubscriber, TrackedStock};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// The in-memory tracking registry.
///
/// Holds an injected `TokenSubscriber` so `Add`/`Remove` can drive the
/// broker's subscription set without the registry depending on the broker
/// adapter's concrete type.
pub struct TrackingRegistry {
    stocks: RwLock<HashMap<u32, TrackedStock>>,
    subscriber: Arc<dyn TokenSubscriber>,
}

impl std::fmt::Debug for TrackingRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackingRegistry")
            .field("count", &self.count())
            .finish()
    }
}

impl TrackingRegistry {
    /// Creates an empty registry wired to the given broker token-subscriber
    /// capability.
    pub fn new(subscriber: Arc<dyn TokenSubscriber>) -> Self {
        TrackingRegistry {
            stocks: RwLock::new(HashMap::new()),
            subscriber,
        }
    }

    /// Inserts or replaces the entry for `stock.token`; idempotent.
    /// Triggers a broker subscribe for the token.
    pub fn add(&self, stock: TrackedStock) {
        let token = stock.token;
        self.stocks
            .write()
            .unwrap_or_else(|e| {
                tracing::error!("registry lock poisoned: {e}");
                std::process::exit(1);
            })
            .insert(token, stock);
        self.subscriber.subscribe_token(token);
    }

    /// Replaces `target`, `stop_loss`, and `quantity` of an existing entry,
    /// preserving `base_price`. No-op if the token is absent.
    pub fn update(&self, token: u32, target: Decimal, stop_loss: Decimal, quantity: u32) {
        if let Some(stock) = self
            .stocks
            .write()
            .unwrap_or_else(|e| {
                tracing::error!("registry lock poisoned: {e}");
                std::process::exit(1);
            })
            .get_mut(&token)
        {
            stock.target = target;
            stock.stop_loss = stop_loss;
            stock.quantity = quantity;
        }
    }

    /// Removes the entry for `token`. Triggers a broker unsubscribe.
    pub fn remove(&self, token: u32) {
        self.stocks
            .write()
            .unwrap_or_else(|e| {
                tracing::error!("registry lock poisoned: {e}");
                std::process::exit(1);
            })
            .remove(&token);
        self.subscriber.unsubscribe_token(token);
    }

    /// Returns a clone of the tracked stock for `token`, if present.
    pub fn get(&self, token: u32) -> Option<TrackedStock> {
        self.stocks
            .read()
            .unwrap_or_else(|e| {
                tracing::error!("registry lock poisoned: {e}");
                std::process::exit(1);
            })
            .get(&token)
            .cloned()
    }

    /// Number of currently tracked instruments.
    pub fn count(&self) -> usize {
        self.stocks
            .read()
            .unwrap_or_else(|e| {
                tracing::error!("registry lock poisoned: {e}");
                std::process::exit(1);
            })
            .len()
    }

    /// A snapshot of every tracked stock.
    pub fn all(&self) -> Vec<TrackedStock> {
        self.stocks
            .read()
            .unwrap_or_else(|e| {
                tracing::error!("registry lock poisoned: {e}");
                std::process::exit(1);
            })
            .values()
            .cloned()
            .collect()
    }
}

impl BasePriceUpdater for TrackingRegistry {
    fn update_base_price(&self, token: u32, price: Decimal) {
        if let Some(stock) = self
            .stocks
            .write()
            .unwrap_or_else(|e| {
                tracing::error!("registry lock poisoned: {e}");
                std::process::exit(1);
            })
            .get_mut(&token)
        {
            stock.base_price = price;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct RecordingSubscriber {
        subscribed: AtomicUsize,
        unsubscribed: AtomicUsize,
    }

    impl TokenSubscriber for RecordingSubscriber {
        fn subscribe_token(&self, _token: u32) {
            self.subscribed.fetch_add(1, Ordering::SeqCst);
        }
        fn unsubscribe_token(&self, _token: u32) {
            self.unsubscribed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn stock(token: u32) -> TrackedStock {
        TrackedStock::new(token, "INFY", "NSE", dec!(0), dec!(5), dec!(3), 10).unwrap()
    }

    #[test]
    fn add_then_remove_then_add_leaves_exactly_one_subscribe_in_effect() {
        let subscriber = Arc::new(RecordingSubscriber::default());
        let registry = TrackingRegistry::new(subscriber.clone());
        registry.add(stock(42));
        registry.remove(42);
        registry.add(stock(42));
        assert_eq!(subscriber.subscribed.load(Ordering::SeqCst), 2);
        assert_eq!(subscriber.unsubscribed.load(Ordering::SeqCst), 1);
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn update_never_mutates_base_price() {
        let subscriber = Arc::new(RecordingSubscriber::default());
        let registry = TrackingRegistry::new(subscriber);
        registry.add(stock(42));
        registry.update_base_price(42, dec!(150));
        registry.update(42, dec!(10), dec!(6), 20);
        let updated = registry.get(42).unwrap();
        assert_eq!(updated.base_price, dec!(150));
        assert_eq!(updated.target, dec!(10));
        assert_eq!(updated.stop_loss, dec!(6));
        assert_eq!(updated.quantity, 20);
    }

    #[test]
    fn update_base_price_never_mutates_trigger_parameters() {
        let subscriber = Arc::new(RecordingSubscriber::default());
        let registry = TrackingRegistry::new(subscriber);
        registry.add(stock(42));
        registry.update_base_price(42, dec!(150));
        let updated = registry.get(42).unwrap();
        assert_eq!(updated.target, dec!(5));
        assert_eq!(updated.stop_loss, dec!(3));
        assert_eq!(updated.quantity, 10);
    }

    #[test]
    fn update_and_update_base_price_are_no_ops_when_absent() {
        let subscriber = Arc::new(RecordingSubscriber::default());
        let registry = TrackingRegistry::new(subscriber);
        registry.update(42, dec!(10), dec!(6), 20);
        registry.update_base_price(42, dec!(150));
        assert!(registry.get(42).is_none());
    }
}
