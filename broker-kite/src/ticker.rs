//! Streaming connection adapter - distilled spec section 4.B "Broker WS
//! Adapter". Owns the single websocket to Kite's ticker endpoint, decodes
//! its binary tick frames and JSON order-update frames, and forwards each
//! to the runtime's tick broadcaster / order service. Reconnects on any
//! socket error; the subscribed-token set is replayed on every reconnect so
//! a drop never silently stops a tracked stock's ticks.

use crate::KiteBroker;
use core::broadcaster::TickBroadcaster;
use core::order_service::OrderService;
use futures_util::{SinkExt, StreamExt};
use model::{BrokerOrderUpdate, OrderStatus, Tick, TickBatch, TokenSubscriber, TransactionType};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{info, warn};

const RECONNECT_DELAY: std::time::Duration = std::time::Duration::from_secs(3);

#[derive(Debug, Clone, Copy)]
enum TickerCommand {
    Subscribe(u32),
    Unsubscribe(u32),
}

struct RunningHandle {
    stop_tx: oneshot::Sender<()>,
    join: JoinHandle<()>,
}

/// Live market-data and order-update stream. Constructed once at startup
/// and handed to the tracking registry as its [`TokenSubscriber`].
///
/// `broadcaster`/`order_service` are bound via [`Self::bind`] rather than at
/// construction: the runtime supervisor that owns them is itself constructed
/// from a subscriber, so the ticker must exist before they do. The bind call
/// happens immediately after the supervisor is built and before either side
/// is started.
pub struct KiteTicker {
    broker: Arc<KiteBroker>,
    broadcaster: OnceLock<Arc<TickBroadcaster>>,
    order_service: OnceLock<Arc<OrderService>>,
    command_tx: mpsc::UnboundedSender<TickerCommand>,
    command_rx: Mutex<Option<mpsc::UnboundedReceiver<TickerCommand>>>,
    running: AtomicBool,
    handle: Mutex<Option<RunningHandle>>,
}

impl std::fmt::Debug for KiteTicker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KiteTicker")
            .field("running", &self.running.load(Ordering::SeqCst))
            .finish()
    }
}

impl KiteTicker {
    /// Builds a ticker bound to `broker`, whose current session supplies the
    /// websocket endpoint. Connecting is deferred until [`Self::start`] is
    /// called, by which point the broker may or may not be authenticated yet
    /// - see [`Self::run`].
    pub fn new(broker: Arc<KiteBroker>) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        KiteTicker {
            broker,
            broadcaster: OnceLock::new(),
            order_service: OnceLock::new(),
            command_tx,
            command_rx: Mutex::new(Some(command_rx)),
            running: AtomicBool::new(false),
            handle: Mutex::new(None),
        }
    }

    /// Binds the runtime components the ticker forwards to. Must be called
    /// before [`Self::start`]; a second call is a no-op.
    pub fn bind(&self, broadcaster: Arc<TickBroadcaster>, order_service: Arc<OrderService>) {
        let _ = self.broadcaster.set(broadcaster);
        let _ = self.order_service.set(order_service);
    }

    /// Starts the connect/reconnect loop. A second call while running is a
    /// no-op.
    pub async fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let Some(command_rx) = self.command_rx.lock().await.take() else {
            return;
        };
        let (stop_tx, stop_rx) = oneshot::channel();
        let ticker = self.clone();
        let join = tokio::spawn(async move { ticker.run(command_rx, stop_rx).await });
        *self.handle.lock().await = Some(RunningHandle { stop_tx, join });
        info!("kite ticker started");
    }

    /// Stops the connect/reconnect loop. A call while not running is a
    /// no-op.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.handle.lock().await.take() {
            let _ = handle.stop_tx.send(());
            let _ = handle.join.await;
        }
        info!("kite ticker stopped");
    }

    async fn run(self: Arc<Self>, mut command_rx: mpsc::UnboundedReceiver<TickerCommand>, mut stop_rx: oneshot::Receiver<()>) {
        let mut subscribed: HashSet<u32> = HashSet::new();
        loop {
            let Some(url) = self.broker.ws_url() else {
                tokio::select! {
                    _ = &mut stop_rx => return,
                    () = tokio::time::sleep(RECONNECT_DELAY) => {}
                }
                continue;
            };
            tokio::select! {
                _ = &mut stop_rx => return,
                connected = tokio_tungstenite::connect_async(url.as_str()) => {
                    match connected {
                        Ok((stream, _response)) => {
                            let (mut write, mut read) = stream.split();
                            for token in subscribed.iter().copied() {
                                send_command(&mut write, TickerCommand::Subscribe(token)).await;
                            }

                            'connection: loop {
                                tokio::select! {
                                    _ = &mut stop_rx => return,
                                    command = command_rx.recv() => {
                                        match command {
                                            Some(TickerCommand::Subscribe(token)) => {
                                                subscribed.insert(token);
                                                send_command(&mut write, TickerCommand::Subscribe(token)).await;
                                            }
                                            Some(TickerCommand::Unsubscribe(token)) => {
                                                subscribed.remove(&token);
                                                send_command(&mut write, TickerCommand::Unsubscribe(token)).await;
                                            }
                                            None => return,
                                        }
                                    }
                                    message = read.next() => {
                                        match message {
                                            Some(Ok(message)) => self.handle_message(message).await,
                                            Some(Err(error)) => {
                                                warn!(%error, "kite ticker socket error, reconnecting");
                                                break 'connection;
                                            }
                                            None => {
                                                warn!("kite ticker socket closed, reconnecting");
                                                break 'connection;
                                            }
                                        }
                                    }
                                }
                            }
                        }
                        Err(error) => {
                            warn!(%error, "kite ticker connect failed, retrying");
                        }
                    }
                }
            }
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    }

    async fn handle_message(&self, message: Message) {
        match message {
            Message::Binary(data) => {
                let Some(broadcaster) = self.broadcaster.get() else {
                    warn!("tick received before ticker was bound to a broadcaster, dropping");
                    return;
                };
                if let Some(batch) = decode_tick_frame(&data) {
                    broadcaster.publish(batch);
                }
            }
            Message::Text(text) => {
                let Some(order_service) = self.order_service.get() else {
                    warn!("order update received before ticker was bound to an order service, dropping");
                    return;
                };
                if let Some(update) = decode_order_update(&text) {
                    if let Err(error) = order_service.process_order_update(update).await {
                        warn!(%error, "failed to process order update");
                    }
                }
            }
            _ => {}
        }
    }
}

impl TokenSubscriber for KiteTicker {
    fn subscribe_token(&self, token: u32) {
        let _ = self.command_tx.send(TickerCommand::Subscribe(token));
    }

    fn unsubscribe_token(&self, token: u32) {
        let _ = self.command_tx.send(TickerCommand::Unsubscribe(token));
    }
}

async fn send_command<S>(write: &mut S, command: TickerCommand)
where
    S: futures_util::Sink<Message> + Unpin,
{
    let (action, token) = match command {
        TickerCommand::Subscribe(token) => ("subscribe", token),
        TickerCommand::Unsubscribe(token) => ("unsubscribe", token),
    };
    let frame = serde_json::json!({ "a": action, "v": [token] }).to_string();
    let _ = write.send(Message::Text(frame)).await;
}

/// Decodes one websocket binary frame into a batch of ticks, per Kite's
/// documented wire layout: a big-endian u16 packet count, then for each
/// packet a big-endian u16 length followed by that many payload bytes. Only
/// the LTP-mode 8-byte packet (token + last price in paise) is decoded;
/// fuller quote/full modes are out of scope - see `SPEC_FULL.md` section 4.B.
fn decode_tick_frame(data: &[u8]) -> Option<TickBatch> {
    let packet_count = u16::from_be_bytes(data.get(0..2)?.try_into().ok()?);
    let mut offset = 2usize;
    let mut ticks = Vec::new();
    for _ in 0..packet_count {
        let length = u16::from_be_bytes(data.get(offset..offset.checked_add(2)?)?.try_into().ok()?) as usize;
        offset = offset.checked_add(2)?;
        let packet = data.get(offset..offset.checked_add(length)?)?;
        offset = offset.checked_add(length)?;
        if let Some(tick) = decode_ltp_packet(packet) {
            ticks.push(tick);
        }
    }
    if ticks.is_empty() {
        None
    } else {
        Some(TickBatch { ticks })
    }
}

fn decode_ltp_packet(packet: &[u8]) -> Option<Tick> {
    if packet.len() < 8 {
        return None;
    }
    let instrument_token = u32::from_be_bytes(packet.get(0..4)?.try_into().ok()?);
    let last_price_paise = i32::from_be_bytes(packet.get(4..8)?.try_into().ok()?);
    let last_price = Decimal::new(i64::from(last_price_paise), 2);
    Some(Tick {
        instrument_token,
        last_price,
    })
}

#[derive(Debug, Deserialize)]
struct OrderUpdatePayload {
    order_id: String,
    exchange_order_id: Option<String>,
    parent_order_id: Option<String>,
    transaction_type: String,
    exchange: String,
    product: String,
    status: String,
    average_price: Option<Decimal>,
    status_message: Option<String>,
    exchange_update_timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OrderUpdateMessage {
    #[serde(rename = "type")]
    message_type: String,
    data: OrderUpdatePayload,
}

fn decode_order_update(text: &str) -> Option<BrokerOrderUpdate> {
    let message: OrderUpdateMessage = serde_json::from_str(text).ok()?;
    if message.message_type != "order" {
        return None;
    }
    let exchange_update_at = message
        .data
        .exchange_update_timestamp
        .as_deref()
        .and_then(|ts| chrono::NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S").ok())
        .unwrap_or_else(|| chrono::Utc::now().naive_utc());

    Some(BrokerOrderUpdate {
        broker_order_id: message.data.order_id,
        exchange_order_id: message.data.exchange_order_id,
        parent_order_id: message.data.parent_order_id,
        transaction_type: kite_transaction_type(&message.data.transaction_type),
        exchange: message.data.exchange,
        product: message.data.product,
        status: kite_status_to_order_status(&message.data.status),
        average_price: message.data.average_price,
        status_message: message.data.status_message,
        exchange_update_at,
    })
}

/// Maps Kite's own order-status vocabulary onto [`OrderStatus`]. Anything
/// unrecognised (e.g. an intermediate `OPEN`/`TRIGGER PENDING` state) stays
/// `Pending` rather than being treated as terminal.
fn kite_status_to_order_status(status: &str) -> OrderStatus {
    match status {
        "COMPLETE" => OrderStatus::Completed,
        "CANCELLED" => OrderStatus::Cancelled,
        "REJECTED" => OrderStatus::Rejected,
        _ => OrderStatus::Pending,
    }
}

/// Maps Kite's `transaction_type` field. Defaults to `Buy` for an
/// unrecognised value rather than failing the whole update - this runtime
/// only ever places buy orders, so `SELL` is not expected here.
fn kite_transaction_type(transaction_type: &str) -> TransactionType {
    match transaction_type {
        "SELL" => TransactionType::Sell,
        _ => TransactionType::Buy,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn decodes_a_single_ltp_packet_frame() {
        let mut data = Vec::new();
        data.extend_from_slice(&1u16.to_be_bytes()); // one packet
        data.extend_from_slice(&8u16.to_be_bytes()); // packet length
        data.extend_from_slice(&408065u32.to_be_bytes()); // instrument token
        data.extend_from_slice(&10050i32.to_be_bytes()); // last price, paise

        let batch = decode_tick_frame(&data).unwrap();
        assert_eq!(batch.ticks.len(), 1);
        assert_eq!(batch.ticks[0].instrument_token, 408065);
        assert_eq!(batch.ticks[0].last_price, dec!(100.50));
    }

    #[test]
    fn truncated_frame_decodes_to_nothing_rather_than_panicking() {
        let data = vec![0, 1, 0, 8, 1, 2];
        assert!(decode_tick_frame(&data).is_none());
    }

    #[test]
    fn order_update_maps_kite_vocabulary_to_order_status() {
        let text = r#"{"type":"order","data":{"order_id":"151220000000000","exchange_order_id":"1100000000000","parent_order_id":null,"transaction_type":"BUY","exchange":"NSE","product":"MIS","status":"COMPLETE","average_price":100.5,"status_message":null,"exchange_update_timestamp":"2026-07-28 09:20:00"}}"#;
        let update = decode_order_update(text).unwrap();
        assert_eq!(update.broker_order_id, "151220000000000");
        assert_eq!(update.exchange_order_id.as_deref(), Some("1100000000000"));
        assert_eq!(update.transaction_type, TransactionType::Buy);
        assert_eq!(update.exchange, "NSE");
        assert_eq!(update.product, "MIS");
        assert_eq!(update.status, OrderStatus::Completed);
        assert_eq!(update.average_price, Some(dec!(100.5)));
    }

    #[test]
    fn non_order_messages_are_ignored() {
        let text = r#"{"type":"message","data":{"order_id":"x","transaction_type":"BUY","exchange":"NSE","product":"MIS","status":"COMPLETE","average_price":null,"status_message":null,"exchange_update_timestamp":null}}"#;
        assert!(decode_order_update(text).is_none());
    }
}
