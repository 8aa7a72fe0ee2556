//! Top-of-book ticker updates.

use super::ids::Ticker;
use super::price::Price;

/// One update from the `ticker` channel.
///
/// Dedup key: `(ticker, exchange_ts)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickerUpdate {
    pub exchange_ts: i64,
    pub received_at: i64,
    pub ticker: Ticker,
    pub yes_bid: Price,
    pub yes_ask: Price,
    pub last_price: Price,
    pub volume: i64,
    pub open_interest: i64,
}
