//! Minute-scoped dedup buffer between the signal engine and the order
//! engine - distilled spec section 4.E. A single mutex covers the signal
//! list, the processed-token set, and the current-minute marker together,
//! since the contract requires all three to move atomically.

use crate::market_time::{minute_of_day, now_ist};
use model::TradeSignal;
use std::collections::HashSet;
use std::sync::Mutex;

struct State {
    signals: Vec<TradeSignal>,
    processed: HashSet<u32>,
    current_minute: u32,
}

/// Minute-scoped signal buffer. See module docs for the locking contract.
pub struct SignalQueue {
    state: Mutex<State>,
}

impl std::fmt::Debug for SignalQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalQueue").finish()
    }
}

impl Default for SignalQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalQueue {
    /// Creates an empty queue, anchored to the current IST minute.
    pub fn new() -> Self {
        SignalQueue {
            state: Mutex::new(State {
                signals: Vec::new(),
                processed: HashSet::new(),
                current_minute: minute_of_day(now_ist()),
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| {
            tracing::error!("signal queue lock poisoned: {e}");
            std::process::exit(1);
        })
    }

    fn roll_minute_boundary(state: &mut State) {
        let minute = minute_of_day(now_ist());
        if minute != state.current_minute {
            state.processed.clear();
            state.current_minute = minute;
        }
    }

    /// Pushes `signal` unless its token was already processed this minute.
    /// Returns `true` if the signal was added.
    pub fn push(&self, signal: TradeSignal) -> bool {
        let mut state = self.lock();
        Self::roll_minute_boundary(&mut state);
        if !state.processed.insert(signal.token) {
            return false;
        }
        state.signals.push(signal);
        true
    }

    /// Takes and returns every queued signal, clearing the queue and the
    /// processed set. Called exactly once per minute by the order engine.
    pub fn flush(&self) -> Vec<TradeSignal> {
        let mut state = self.lock();
        let signals = std::mem::take(&mut state.signals);
        state.processed.clear();
        state.current_minute = minute_of_day(now_ist());
        signals
    }

    /// A snapshot of currently queued signals, without removing them.
    pub fn peek(&self) -> Vec<TradeSignal> {
        self.lock().signals.clone()
    }

    /// Number of signals currently queued.
    pub fn len(&self) -> usize {
        self.lock().signals.len()
    }

    /// Whether the queue currently holds no signals.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `token` has already produced a signal this minute.
    pub fn was_processed(&self, token: u32) -> bool {
        let mut state = self.lock();
        Self::roll_minute_boundary(&mut state);
        state.processed.contains(&token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn signal(token: u32) -> TradeSignal {
        TradeSignal {
            token,
            symbol: "INFY".to_string(),
            exchange: "NSE".to_string(),
            quantity: 10,
            kind: model::SignalKind::TargetHit,
            trigger_price: dec!(106),
            base_price: dec!(100),
            target: dec!(5),
            stop_loss: dec!(3),
            minute: now_ist(),
        }
    }

    #[test]
    fn push_returns_true_at_most_once_per_token_per_minute() {
        let queue = SignalQueue::new();
        assert!(queue.push(signal(42)));
        assert!(!queue.push(signal(42)));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn flush_clears_signals_and_processed_set() {
        let queue = SignalQueue::new();
        queue.push(signal(42));
        let flushed = queue.flush();
        assert_eq!(flushed.len(), 1);
        assert!(queue.is_empty());
        assert!(!queue.was_processed(42));
    }

    #[test]
    fn peek_does_not_remove_signals() {
        let queue = SignalQueue::new();
        queue.push(signal(42));
        assert_eq!(queue.peek().len(), 1);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn different_tokens_do_not_interfere() {
        let queue = SignalQueue::new();
        assert!(queue.push(signal(1)));
        assert!(queue.push(signal(2)));
        assert_eq!(queue.len(), 2);
    }
}
