//! Tick-driven trigger detection - distilled spec section 4.D. Subscribes
//! to the broadcaster at queue depth 100 and, for each tick, evaluates the
//! registry's trigger parameters and pushes at most one signal per token
//! per minute onto the signal queue.

use crate::broadcaster::TickBroadcaster;
use crate::registry::TrackingRegistry;
use crate::signal_queue::SignalQueue;
use model::{SignalKind, Tick, TradeSignal};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::info;

const SUBSCRIPTION_DEPTH: usize = 100;

struct RunningHandle {
    stop_tx: oneshot::Sender<()>,
    join: JoinHandle<()>,
}

/// Evaluates ticks against the tracking registry and feeds the signal queue.
pub struct SignalEngine {
    broadcaster: Arc<TickBroadcaster>,
    registry: Arc<TrackingRegistry>,
    queue: Arc<SignalQueue>,
    running: AtomicBool,
    handle: Mutex<Option<RunningHandle>>,
}

impl std::fmt::Debug for SignalEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalEngine")
            .field("running", &self.is_running())
            .finish()
    }
}

impl SignalEngine {
    /// Constructs an engine over the given broadcaster, registry, and
    /// signal queue. Does not start consuming ticks until [`Self::start`].
    pub fn new(
        broadcaster: Arc<TickBroadcaster>,
        registry: Arc<TrackingRegistry>,
        queue: Arc<SignalQueue>,
    ) -> Self {
        SignalEngine {
            broadcaster,
            registry,
            queue,
            running: AtomicBool::new(false),
            handle: Mutex::new(None),
        }
    }

    /// Whether the engine is currently consuming ticks.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Starts the processing loop. A second call while running is a no-op.
    pub async fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let mut rx = self.broadcaster.subscribe(SUBSCRIPTION_DEPTH);
        let (stop_tx, mut stop_rx) = oneshot::channel();
        let engine = self.clone();

        let join = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    batch = rx.recv() => {
                        match batch {
                            Some(batch) => {
                                for tick in &batch.ticks {
                                    engine.process_tick(tick);
                                }
                            }
                            None => break,
                        }
                    }
                }
            }
        });

        *self.handle.lock().await = Some(RunningHandle { stop_tx, join });
        info!("signal engine started");
    }

    /// Stops the processing loop, waiting for in-flight tick processing to
    /// drain. A call while not running is a no-op.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.handle.lock().await.take() {
            let _ = handle.stop_tx.send(());
            let _ = handle.join.await;
        }
        info!("signal engine stopped");
    }

    fn process_tick(&self, tick: &Tick) {
        let Some(stock) = self.registry.get(tick.instrument_token) else {
            return;
        };
        if self.queue.was_processed(tick.instrument_token) {
            return;
        }
        if tick.last_price.is_zero() {
            return;
        }
        if !stock.is_primed() {
            // Open question 9.1: a stock loaded by MarketOpen starts with
            // base_price = 0 and is not primed until the Order Service's
            // fill callback sets a real cost basis.
            return;
        }

        let target_price = stock.target_price();
        let stop_price = stock.stop_price();

        let kind = if tick.last_price >= target_price {
            SignalKind::TargetHit
        } else if tick.last_price <= stop_price {
            SignalKind::StoplossHit
        } else {
            return;
        };

        let signal = TradeSignal {
            token: stock.token,
            symbol: stock.symbol.clone(),
            exchange: stock.exchange.clone(),
            quantity: stock.quantity,
            kind,
            trigger_price: tick.last_price,
            base_price: stock.base_price,
            target: stock.target,
            stop_loss: stock.stop_loss,
            minute: crate::market_time::now_ist(),
        };
        self.queue.push(signal);
    }
}
