//! Executed-trade records.

use uuid::Uuid;

use super::ids::Ticker;
use super::price::Price;

/// One executed trade as reported on the `trade` channel.
///
/// Dedup key: `trade_id`. Three gatherers observing the same print all carry
/// the same exchange-assigned id, so the central store keeps exactly one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trade {
    pub trade_id: Uuid,
    /// Exchange-assigned time, microseconds.
    pub exchange_ts: i64,
    /// Local clock at read time, microseconds.
    pub received_at: i64,
    pub ticker: Ticker,
    /// YES-side price of the print.
    pub price: Price,
    /// Contract count.
    pub size: i64,
    /// True when the taker bought YES.
    pub taker_side_yes: bool,
}
