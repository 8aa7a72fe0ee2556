//! Raw-frame demultiplexer.
//!
//! Consumes the central queue fed by every connection's read loop, parses
//! envelopes, and fans typed records out to the per-sink channels. Every
//! send is non-blocking: a full channel drops the record and counts it,
//! because the recovery paths (REST snapshot poll, cross-gatherer
//! redundancy) are cheaper than backpressure into the socket.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::domain::{
    micros_from_ts_value, BookDelta, BookSnapshot, Price, PriceLevel, Side, SnapshotSource,
    Ticker, TickerUpdate, Trade,
};
use crate::error::Result;
use crate::exchange::messages::{DeltaMsg, SnapshotMsg, TickerMsg, TradeMsg, WsEnvelope};
use crate::manager::{ConnectionRole, RawFrame, SequenceTracker};
use crate::monitor::Metrics;

/// A routed orderbook delta with its sequence observation.
///
/// The gap flag rides the envelope rather than the record: the store keeps
/// only the semantic delta, while gap accounting feeds metrics and logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaEnvelope {
    pub delta: BookDelta,
    pub seq_gap: bool,
    pub gap_size: i64,
}

/// Sender side of the typed per-sink channels.
pub struct RouterOutputs {
    pub deltas: mpsc::Sender<DeltaEnvelope>,
    pub trades: mpsc::Sender<Trade>,
    pub tickers: mpsc::Sender<TickerUpdate>,
    pub snapshots: mpsc::Sender<BookSnapshot>,
    /// Raw lifecycle frames for the market registry.
    pub lifecycle: mpsc::Sender<Vec<u8>>,
}

/// Consume raw frames until the queue closes or shutdown lands.
pub async fn run_router(
    mut raw_rx: mpsc::Receiver<RawFrame>,
    outputs: RouterOutputs,
    seq: Arc<SequenceTracker>,
    metrics: Arc<Metrics>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let frame = tokio::select! {
            frame = raw_rx.recv() => frame,
            _ = shutdown.wait_for(|stop| *stop) => break,
        };
        let Some(frame) = frame else { break };

        route_frame(frame, &outputs, &seq, &metrics);
    }

    debug!("Router stopped");
}

fn route_frame(
    frame: RawFrame,
    outputs: &RouterOutputs,
    seq: &SequenceTracker,
    metrics: &Metrics,
) {
    // Lifecycle connections carry only lifecycle data frames once command
    // responses are peeled off in the read loop; the registry parses them.
    if frame.role == ConnectionRole::Lifecycle {
        metrics
            .router_messages_total
            .with_label_values(&["lifecycle"])
            .inc();
        if outputs.lifecycle.try_send(frame.bytes).is_err() {
            metrics
                .router_messages_dropped_total
                .with_label_values(&["lifecycle"])
                .inc();
            warn!("Lifecycle queue full, dropping frame");
        }
        return;
    }

    let envelope: WsEnvelope = match serde_json::from_slice(&frame.bytes) {
        Ok(envelope) => envelope,
        Err(_) => {
            metrics.router_parse_errors_total.inc();
            return;
        }
    };

    match envelope.kind.as_str() {
        "orderbook_delta" => match build_delta(&frame, &envelope, seq, metrics) {
            Ok(delta) => {
                metrics
                    .router_messages_total
                    .with_label_values(&["orderbook"])
                    .inc();
                if outputs.deltas.try_send(delta).is_err() {
                    metrics
                        .router_messages_dropped_total
                        .with_label_values(&["orderbook"])
                        .inc();
                    warn!("Orderbook channel full, dropping delta");
                }
            }
            Err(_) => metrics.router_parse_errors_total.inc(),
        },
        "orderbook_snapshot" => match build_snapshot(&frame, &envelope, seq) {
            Ok(snapshot) => {
                metrics
                    .router_messages_total
                    .with_label_values(&["snapshot"])
                    .inc();
                if outputs.snapshots.try_send(snapshot).is_err() {
                    metrics
                        .router_messages_dropped_total
                        .with_label_values(&["snapshot"])
                        .inc();
                    warn!("Snapshot channel full, dropping snapshot");
                }
            }
            Err(_) => metrics.router_parse_errors_total.inc(),
        },
        "trade" => match build_trade(&frame, &envelope) {
            Ok(trade) => {
                metrics
                    .router_messages_total
                    .with_label_values(&["trade"])
                    .inc();
                if outputs.trades.try_send(trade).is_err() {
                    metrics
                        .router_messages_dropped_total
                        .with_label_values(&["trade"])
                        .inc();
                    warn!("Trade channel full, dropping trade");
                }
            }
            Err(_) => metrics.router_parse_errors_total.inc(),
        },
        "ticker" => match build_ticker(&frame, &envelope) {
            Ok(update) => {
                metrics
                    .router_messages_total
                    .with_label_values(&["ticker"])
                    .inc();
                if outputs.tickers.try_send(update).is_err() {
                    metrics
                        .router_messages_dropped_total
                        .with_label_values(&["ticker"])
                        .inc();
                }
            }
            Err(_) => metrics.router_parse_errors_total.inc(),
        },
        "market_lifecycle" => {
            // Doubled global roles can surface lifecycle frames on non-
            // lifecycle connections after a reconnect race; forward anyway.
            let _ = outputs.lifecycle.try_send(frame.bytes);
        }
        _ => {
            metrics.router_unknown_type_total.inc();
        }
    }
}

/// Observe the envelope sequence for this frame's subscription stream.
fn observe_seq(
    frame: &RawFrame,
    envelope: &WsEnvelope,
    seq: &SequenceTracker,
) -> (bool, i64) {
    match (envelope.sid, envelope.seq) {
        (Some(sid), Some(seq_no)) => {
            let obs = seq.observe(frame.connection_id, sid, seq_no);
            (obs.gap, obs.gap_size)
        }
        _ => (false, 0),
    }
}

fn build_delta(
    frame: &RawFrame,
    envelope: &WsEnvelope,
    seq: &SequenceTracker,
    metrics: &Metrics,
) -> Result<DeltaEnvelope> {
    let msg: DeltaMsg = serde_json::from_value(envelope.msg.clone())?;
    let (seq_gap, gap_size) = observe_seq(frame, envelope, seq);
    if seq_gap {
        metrics.sequence_gaps_total.inc();
        warn!(
            connection_id = frame.connection_id,
            sid = envelope.sid.unwrap_or_default(),
            gap_size,
            ticker = %msg.market_ticker,
            "Sequence gap"
        );
    }

    let price = match &msg.price_dollars {
        Some(dollars) => Price::parse_dollars(dollars),
        None => Price::from_cents(msg.price),
    };

    Ok(DeltaEnvelope {
        delta: BookDelta {
            exchange_ts: micros_from_ts_value(&msg.ts),
            received_at: frame.received_at,
            ticker: Ticker::new(msg.market_ticker),
            side: Side::parse(&msg.side),
            price,
            size_delta: msg.delta,
            seq: envelope.seq.unwrap_or_default(),
        },
        seq_gap,
        gap_size,
    })
}

fn build_snapshot(
    frame: &RawFrame,
    envelope: &WsEnvelope,
    seq: &SequenceTracker,
) -> Result<BookSnapshot> {
    let msg: SnapshotMsg = serde_json::from_value(envelope.msg.clone())?;
    // Snapshots begin each subscription stream; seed the tracker so the
    // following delta is judged against the snapshot's sequence.
    let _ = observe_seq(frame, envelope, seq);

    let to_levels = |levels: &[(i64, i64)]| -> Vec<PriceLevel> {
        levels
            .iter()
            .map(|&(cents, size)| PriceLevel::new(Price::from_cents(cents), size))
            .collect()
    };

    let exchange_ts = micros_from_ts_value(&msg.ts);
    Ok(BookSnapshot::from_levels(
        frame.received_at,
        (exchange_ts != 0).then_some(exchange_ts),
        Ticker::new(msg.market_ticker),
        SnapshotSource::Ws,
        to_levels(&msg.yes),
        vec![],
        to_levels(&msg.no),
        vec![],
    ))
}

fn build_trade(frame: &RawFrame, envelope: &WsEnvelope) -> Result<Trade> {
    let msg: TradeMsg = serde_json::from_value(envelope.msg.clone())?;
    let trade_id = uuid::Uuid::parse_str(&msg.trade_id)
        .map_err(|e| crate::error::Error::Parse(format!("bad trade id: {e}")))?;

    let price = match &msg.yes_price_dollars {
        Some(dollars) => Price::parse_dollars(dollars),
        None => Price::from_cents(msg.yes_price),
    };

    Ok(Trade {
        trade_id,
        exchange_ts: micros_from_ts_value(&msg.ts),
        received_at: frame.received_at,
        ticker: Ticker::new(msg.market_ticker),
        price,
        size: msg.count,
        taker_side_yes: !msg.taker_side.eq_ignore_ascii_case("no"),
    })
}

fn build_ticker(frame: &RawFrame, envelope: &WsEnvelope) -> Result<TickerUpdate> {
    let msg: TickerMsg = serde_json::from_value(envelope.msg.clone())?;
    Ok(TickerUpdate {
        exchange_ts: micros_from_ts_value(&msg.ts),
        received_at: frame.received_at,
        ticker: Ticker::new(msg.market_ticker),
        yes_bid: Price::from_cents(msg.yes_bid),
        yes_ask: Price::from_cents(msg.yes_ask),
        last_price: Price::from_cents(msg.price),
        volume: msg.volume,
        open_interest: msg.open_interest,
    })
}
