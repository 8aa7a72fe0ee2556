//! WebSocket wire types.
//!
//! Commands sent to the exchange and the envelope/payload shapes received
//! from it. Data payloads keep their raw `ts` values; normalization to
//! microseconds happens when records are built.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Channels a connection can subscribe to.
pub const CHANNEL_TICKER: &str = "ticker";
pub const CHANNEL_TRADE: &str = "trade";
pub const CHANNEL_LIFECYCLE: &str = "market_lifecycle";
pub const CHANNEL_ORDERBOOK: &str = "orderbook_delta";

/// Command sent to the server; `id` correlates the response.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum WsCommand {
    Subscribe { id: u64, params: SubscribeParams },
    Unsubscribe { id: u64, params: UnsubscribeParams },
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscribeParams {
    pub channels: Vec<String>,
    /// Single-market form.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_ticker: Option<String>,
    /// Multi-market form; one SID covers the whole batch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_tickers: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnsubscribeParams {
    pub sids: Vec<u64>,
}

/// Envelope of every frame received from the server.
///
/// Command responses carry `id`; data frames carry `sid` and (for sequenced
/// channels) `seq`. The payload stays raw until the frame's type is known.
#[derive(Debug, Clone, Deserialize)]
pub struct WsEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub sid: Option<u64>,
    #[serde(default)]
    pub seq: Option<i64>,
    #[serde(default)]
    pub msg: Value,
}

/// Frame types that answer commands rather than carry data.
pub const RESPONSE_TYPES: [&str; 4] = ["subscribed", "unsubscribed", "ok", "error"];

impl WsEnvelope {
    pub fn is_command_response(&self) -> bool {
        RESPONSE_TYPES.contains(&self.kind.as_str())
    }
}

/// `subscribed` payload.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscribedMsg {
    pub channel: String,
    pub sid: u64,
}

/// `error` payload.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorMsg {
    #[serde(default)]
    pub code: u32,
    #[serde(default, alias = "message")]
    pub msg: String,
}

/// `orderbook_snapshot` payload: levels are `[price_cents, quantity]`.
#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotMsg {
    pub market_ticker: String,
    #[serde(default)]
    pub yes: Vec<(i64, i64)>,
    #[serde(default)]
    pub no: Vec<(i64, i64)>,
    #[serde(default)]
    pub ts: Value,
}

/// `orderbook_delta` payload.
///
/// `ts` may be integer Unix seconds or an ISO-8601 microsecond string; both
/// appear in production traffic and both must parse.
#[derive(Debug, Clone, Deserialize)]
pub struct DeltaMsg {
    pub market_ticker: String,
    #[serde(default)]
    pub price: i64,
    #[serde(default)]
    pub price_dollars: Option<String>,
    pub delta: i64,
    pub side: String,
    #[serde(default)]
    pub ts: Value,
}

/// `trade` payload.
#[derive(Debug, Clone, Deserialize)]
pub struct TradeMsg {
    pub market_ticker: String,
    pub trade_id: String,
    #[serde(default)]
    pub count: i64,
    #[serde(default)]
    pub yes_price: i64,
    #[serde(default)]
    pub no_price: i64,
    #[serde(default)]
    pub yes_price_dollars: Option<String>,
    #[serde(default)]
    pub no_price_dollars: Option<String>,
    pub taker_side: String,
    #[serde(default)]
    pub ts: Value,
}

/// `ticker` payload (no `seq` on this channel).
#[derive(Debug, Clone, Deserialize)]
pub struct TickerMsg {
    pub market_ticker: String,
    #[serde(default)]
    pub price: i64,
    #[serde(default)]
    pub yes_bid: i64,
    #[serde(default)]
    pub yes_ask: i64,
    #[serde(default)]
    pub volume: i64,
    #[serde(default)]
    pub open_interest: i64,
    #[serde(default)]
    pub dollar_volume: i64,
    #[serde(default)]
    pub dollar_open_interest: i64,
    #[serde(default)]
    pub ts: Value,
}

/// `market_lifecycle` payload.
#[derive(Debug, Clone, Deserialize)]
pub struct LifecycleMsg {
    pub market_ticker: String,
    pub event_type: String,
    #[serde(default)]
    pub old_status: Option<String>,
    #[serde(default)]
    pub new_status: Option<String>,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub ts: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_command_serializes_multi_ticker_form() {
        let cmd = WsCommand::Subscribe {
            id: 7,
            params: SubscribeParams {
                channels: vec![CHANNEL_ORDERBOOK.into()],
                market_ticker: None,
                market_tickers: Some(vec!["MKT-A".into(), "MKT-B".into()]),
            },
        };
        let json = serde_json::to_value(&cmd).unwrap();

        assert_eq!(json["cmd"], "subscribe");
        assert_eq!(json["id"], 7);
        assert_eq!(json["params"]["channels"][0], "orderbook_delta");
        assert_eq!(json["params"]["market_tickers"][1], "MKT-B");
        assert!(json["params"].get("market_ticker").is_none());
    }

    #[test]
    fn envelope_distinguishes_responses_from_data() {
        let response: WsEnvelope = serde_json::from_str(
            r#"{"id":3,"type":"subscribed","msg":{"channel":"trade","sid":12}}"#,
        )
        .unwrap();
        assert!(response.is_command_response());
        assert_eq!(response.id, Some(3));

        let data: WsEnvelope = serde_json::from_str(
            r#"{"type":"orderbook_delta","sid":12,"seq":44,"msg":{"market_ticker":"MKT-A","price":52,"delta":-10,"side":"yes","ts":1709294400}}"#,
        )
        .unwrap();
        assert!(!data.is_command_response());
        assert_eq!(data.sid, Some(12));
        assert_eq!(data.seq, Some(44));
    }

    #[test]
    fn delta_payload_accepts_both_ts_forms() {
        let int_ts: DeltaMsg = serde_json::from_str(
            r#"{"market_ticker":"MKT-A","price":52,"delta":5,"side":"no","ts":1709294400}"#,
        )
        .unwrap();
        assert!(int_ts.ts.is_number());

        let str_ts: DeltaMsg = serde_json::from_str(
            r#"{"market_ticker":"MKT-A","price":52,"price_dollars":"0.5250","delta":5,"side":"no","ts":"2024-03-01T12:00:00.000250Z"}"#,
        )
        .unwrap();
        assert!(str_ts.ts.is_string());
        assert_eq!(str_ts.price_dollars.as_deref(), Some("0.5250"));
    }
}
