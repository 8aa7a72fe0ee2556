//! One pooled WebSocket connection and its read-loop task.
//!
//! Each connection owns its socket: a single reader task produces raw frames
//! onto the shared queue, and all writes are serialized through the
//! connection's writer mutex (the underlying socket accepts one writer).
//! The task redials forever with capped exponential backoff until shutdown.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::role::ConnectionRole;
use super::waiters::{CommandReply, CommandWaiters};
use crate::config::ConnectionManagerConfig;
use crate::domain::now_micros;
use crate::error::{Error, Result};
use crate::exchange::messages::{SubscribeParams, UnsubscribeParams, WsCommand, WsEnvelope};
use crate::exchange::{SignedDialer, WsStream};
use crate::monitor::Metrics;

/// One frame off the wire, stamped at read time.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub connection_id: u64,
    pub role: ConnectionRole,
    pub bytes: Vec<u8>,
    pub received_at: i64,
}

/// Connection state transitions observed by the manager task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ConnEvent {
    Up(u64),
    Down(u64),
}

type WsSink = SplitSink<WsStream, Message>;

pub(super) struct Connection {
    pub(super) id: u64,
    pub(super) role: ConnectionRole,
    writer: Mutex<Option<WsSink>>,
    pub(super) waiters: CommandWaiters,
    next_cmd_id: AtomicU64,
    last_activity_us: AtomicI64,
    connected: AtomicBool,
}

impl Connection {
    pub(super) fn new(id: u64, role: ConnectionRole) -> Arc<Self> {
        Arc::new(Self {
            id,
            role,
            writer: Mutex::new(None),
            waiters: CommandWaiters::default(),
            next_cmd_id: AtomicU64::new(1),
            last_activity_us: AtomicI64::new(0),
            connected: AtomicBool::new(false),
        })
    }

    pub(super) fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    fn touch(&self) {
        self.last_activity_us.store(now_micros(), Ordering::Relaxed);
    }

    fn silent_for(&self) -> Duration {
        let last = self.last_activity_us.load(Ordering::Relaxed);
        Duration::from_micros((now_micros() - last).max(0) as u64)
    }

    async fn send_message(&self, message: Message) -> Result<()> {
        let mut writer = self.writer.lock().await;
        match writer.as_mut() {
            Some(sink) => Ok(sink.send(message).await?),
            None => Err(Error::ConnectionUnavailable(self.id)),
        }
    }

    /// Send a command and await its correlated response.
    async fn command(&self, build: impl FnOnce(u64) -> WsCommand, timeout: Duration) -> Result<CommandReply> {
        let cmd_id = self.next_cmd_id.fetch_add(1, Ordering::Relaxed);
        // Waiter goes in before the bytes leave, so a fast response can't
        // miss the map.
        let rx = self.waiters.register(cmd_id);

        let command = build(cmd_id);
        let text = match serde_json::to_string(&command) {
            Ok(text) => text,
            Err(e) => {
                self.waiters.evict(cmd_id);
                return Err(e.into());
            }
        };

        if let Err(e) = self.send_message(Message::Text(text)).await {
            self.waiters.evict(cmd_id);
            return Err(e);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(Error::ConnectionUnavailable(self.id)),
            Err(_) => {
                self.waiters.evict(cmd_id);
                Err(Error::CommandTimeout(timeout))
            }
        }
    }

    /// Subscribe to a channel, optionally scoped to a ticker batch. Returns
    /// the SID assigned by the exchange.
    pub(super) async fn subscribe(
        &self,
        channel: &str,
        tickers: Option<Vec<String>>,
        timeout: Duration,
    ) -> Result<u64> {
        let channel_owned = channel.to_string();
        let reply = self
            .command(
                move |id| WsCommand::Subscribe {
                    id,
                    params: SubscribeParams {
                        channels: vec![channel_owned],
                        market_ticker: None,
                        market_tickers: tickers,
                    },
                },
                timeout,
            )
            .await?;

        match reply {
            CommandReply::Subscribed { sid, .. } => Ok(sid),
            CommandReply::Error { code, message } => Err(Error::Subscribe { code, message }),
            other => Err(Error::Parse(format!(
                "unexpected reply to subscribe: {other:?}"
            ))),
        }
    }

    pub(super) async fn unsubscribe(&self, sids: Vec<u64>, timeout: Duration) -> Result<()> {
        let reply = self
            .command(
                move |id| WsCommand::Unsubscribe {
                    id,
                    params: UnsubscribeParams { sids },
                },
                timeout,
            )
            .await?;

        match reply {
            CommandReply::Unsubscribed | CommandReply::Ok => Ok(()),
            CommandReply::Error { code, message } => Err(Error::Subscribe { code, message }),
            other => Err(Error::Parse(format!(
                "unexpected reply to unsubscribe: {other:?}"
            ))),
        }
    }

    /// Send a close frame and drop the sink.
    async fn close_writer(&self) {
        let mut writer = self.writer.lock().await;
        if let Some(mut sink) = writer.take() {
            let _ = sink.send(Message::Close(None)).await;
        }
    }
}

enum ExitReason {
    Shutdown,
    Stale,
    Closed,
    ReadError,
}

/// Dial-read-redial loop for one pooled connection.
pub(super) async fn run_connection(
    conn: Arc<Connection>,
    dialer: SignedDialer,
    config: Arc<ConnectionManagerConfig>,
    raw_tx: mpsc::Sender<RawFrame>,
    events_tx: mpsc::UnboundedSender<ConnEvent>,
    metrics: Arc<Metrics>,
    mut shutdown: watch::Receiver<bool>,
) {
    let base_wait = Duration::from_secs(config.reconnect_base_wait_secs.max(1));
    let max_wait = Duration::from_secs(config.reconnect_max_wait_secs.max(1));
    let mut backoff = base_wait;

    loop {
        if *shutdown.borrow() {
            break;
        }

        match dialer.dial().await {
            Ok(stream) => {
                backoff = base_wait;
                let (sink, read) = stream.split();
                *conn.writer.lock().await = Some(sink);
                conn.connected.store(true, Ordering::Relaxed);
                conn.touch();
                metrics.websocket_connections.inc();
                let _ = events_tx.send(ConnEvent::Up(conn.id));
                info!(connection_id = conn.id, role = conn.role.as_str(), "Connection up");

                let reason =
                    read_until_exit(&conn, read, &config, &raw_tx, &metrics, &mut shutdown).await;

                conn.connected.store(false, Ordering::Relaxed);
                conn.close_writer().await;
                conn.waiters.fail_all();
                metrics.websocket_connections.dec();
                let _ = events_tx.send(ConnEvent::Down(conn.id));

                match reason {
                    ExitReason::Shutdown => break,
                    ExitReason::Stale => {
                        warn!(connection_id = conn.id, "Connection stale, reconnecting")
                    }
                    ExitReason::Closed => {
                        info!(connection_id = conn.id, "Server closed connection")
                    }
                    ExitReason::ReadError => {}
                }
            }
            Err(e) => {
                warn!(connection_id = conn.id, error = %e, "Dial failed");
            }
        }

        metrics
            .websocket_reconnects_total
            .with_label_values(&[conn.role.as_str()])
            .inc();

        tokio::select! {
            () = tokio::time::sleep(backoff) => {}
            _ = async {
                while !*shutdown.borrow() {
                    if shutdown.changed().await.is_err() {
                        break;
                    }
                }
            } => break,
        }
        backoff = (backoff * 2).min(max_wait);
    }

    debug!(connection_id = conn.id, "Connection task stopped");
}

/// Pump frames until the socket fails, goes stale, or shutdown lands.
async fn read_until_exit(
    conn: &Arc<Connection>,
    mut read: SplitStream<WsStream>,
    config: &ConnectionManagerConfig,
    raw_tx: &mpsc::Sender<RawFrame>,
    metrics: &Metrics,
    shutdown: &mut watch::Receiver<bool>,
) -> ExitReason {
    let ping_timeout = Duration::from_secs(config.ping_timeout_secs);
    let mut keepalive = tokio::time::interval(Duration::from_secs(
        config.keepalive_interval_secs.max(1),
    ));
    keepalive.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            frame = read.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        handle_frame(conn, text.into_bytes(), raw_tx, metrics);
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        handle_frame(conn, bytes, raw_tx, metrics);
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        conn.touch();
                        let _ = conn.send_message(Message::Pong(payload)).await;
                    }
                    Some(Ok(Message::Pong(_))) => {
                        conn.touch();
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        return ExitReason::Closed;
                    }
                    Some(Ok(Message::Frame(_))) => {}
                    Some(Err(e)) => {
                        // One error record, then the read loop terminates.
                        warn!(connection_id = conn.id, error = %e, "Read error");
                        return ExitReason::ReadError;
                    }
                }
            }
            _ = keepalive.tick() => {
                if conn.silent_for() > ping_timeout {
                    return ExitReason::Stale;
                }
                let _ = conn.send_message(Message::Ping(Vec::new())).await;
            }
            _ = async {
                while !*shutdown.borrow() {
                    if shutdown.changed().await.is_err() {
                        break;
                    }
                }
            } => {
                return ExitReason::Shutdown;
            }
        }
    }
}

/// Route one inbound frame: command responses go to the waiter map, data
/// frames go to the central queue. The push is non-blocking; a full queue
/// drops the frame and counts it, because blocking here would back up into
/// the socket and take the connection down.
fn handle_frame(conn: &Connection, bytes: Vec<u8>, raw_tx: &mpsc::Sender<RawFrame>, metrics: &Metrics) {
    conn.touch();

    // Cheap pre-check before a full parse: only command responses carry "id".
    if contains_id_key(&bytes) {
        if let Ok(envelope) = serde_json::from_slice::<WsEnvelope>(&bytes) {
            if envelope.is_command_response() {
                conn.waiters.complete(&envelope);
                return;
            }
        }
    }

    let frame = RawFrame {
        connection_id: conn.id,
        role: conn.role,
        bytes,
        received_at: now_micros(),
    };
    if raw_tx.try_send(frame).is_err() {
        metrics.manager_messages_dropped_total.inc();
    }
}

fn contains_id_key(bytes: &[u8]) -> bool {
    bytes.windows(5).any(|w| w == b"\"id\":")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_key_scan_finds_responses() {
        assert!(contains_id_key(br#"{"id":4,"type":"subscribed"}"#));
        assert!(!contains_id_key(
            br#"{"type":"trade","sid":9,"msg":{"market_ticker":"A"}}"#
        ));
    }
}
