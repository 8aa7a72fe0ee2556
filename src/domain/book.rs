//! Orderbook delta and snapshot records.
//!
//! The exchange quotes a single book per market with YES and NO sides. Bids
//! are explicit; the opposing ask at a level is implied by the complement
//! price, so the best YES ask derives from the best NO bid.

use serde::{Deserialize, Serialize};

use super::ids::Ticker;
use super::price::Price;

/// Which side of the book a level belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Yes,
    No,
}

impl Side {
    /// Parse the wire form; anything other than `"no"` reads as YES.
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("no") {
            Self::No
        } else {
            Self::Yes
        }
    }

    /// Boolean column form: true == YES.
    pub fn is_yes(self) -> bool {
        self == Self::Yes
    }

    pub fn from_bool(yes: bool) -> Self {
        if yes {
            Self::Yes
        } else {
            Self::No
        }
    }
}

/// One incremental book level change.
///
/// Dedup key: `(ticker, exchange_ts, price, side)`. `seq` is per-subscription
/// and never participates in dedup: two gatherers assign different sequences
/// to the same logical delta.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookDelta {
    pub exchange_ts: i64,
    pub received_at: i64,
    pub ticker: Ticker,
    pub side: Side,
    pub price: Price,
    /// Positive adds contracts at the level, negative removes them.
    pub size_delta: i64,
    /// Per-subscription sequence observed on the wire.
    pub seq: i64,
}

/// A single price level with resting size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Price,
    pub size: i64,
}

impl PriceLevel {
    pub fn new(price: Price, size: i64) -> Self {
        Self { price, size }
    }
}

/// Where a snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotSource {
    /// Pushed by the exchange on (re)subscribe.
    Ws,
    /// Fetched by the periodic REST poller.
    Rest,
}

impl SnapshotSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ws => "ws",
            Self::Rest => "rest",
        }
    }

    pub fn parse(s: &str) -> Self {
        if s == "rest" {
            Self::Rest
        } else {
            Self::Ws
        }
    }
}

/// Full book state at an instant.
///
/// Dedup key: `(ticker, snapshot_ts, source)`. REST and WS snapshots never
/// collide because the source differs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookSnapshot {
    /// Local capture time, microseconds; part of the dedup key.
    pub snapshot_ts: i64,
    /// Exchange-assigned time when the source provides one.
    pub exchange_ts: Option<i64>,
    pub ticker: Ticker,
    pub source: SnapshotSource,
    pub yes_bids: Vec<PriceLevel>,
    pub yes_asks: Vec<PriceLevel>,
    pub no_bids: Vec<PriceLevel>,
    pub no_asks: Vec<PriceLevel>,
    pub best_yes_bid: Option<Price>,
    pub best_yes_ask: Option<Price>,
    /// `best_yes_ask - best_yes_bid` when both sides are present, else 0.
    pub spread: i64,
}

impl BookSnapshot {
    /// Build a snapshot from raw levels, deriving best prices and spread.
    ///
    /// The best YES ask is the complement of the best NO bid: a NO bid at C
    /// is an offer to sell YES at `1 - C`.
    pub fn from_levels(
        snapshot_ts: i64,
        exchange_ts: Option<i64>,
        ticker: Ticker,
        source: SnapshotSource,
        yes_bids: Vec<PriceLevel>,
        yes_asks: Vec<PriceLevel>,
        no_bids: Vec<PriceLevel>,
        no_asks: Vec<PriceLevel>,
    ) -> Self {
        let best_yes_bid = yes_bids.iter().map(|l| l.price).max();
        let best_no_bid = no_bids.iter().map(|l| l.price).max();
        let best_yes_ask = best_no_bid.map(Price::complement);

        let spread = match (best_yes_bid, best_yes_ask) {
            (Some(bid), Some(ask)) => ask - bid,
            _ => 0,
        };

        Self {
            snapshot_ts,
            exchange_ts,
            ticker,
            source,
            yes_bids,
            yes_asks,
            no_bids,
            no_asks,
            best_yes_bid,
            best_yes_ask,
            spread,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn levels(raw: &[(i64, i64)]) -> Vec<PriceLevel> {
        raw.iter()
            .map(|&(cents, size)| PriceLevel::new(Price::from_cents(cents), size))
            .collect()
    }

    #[test]
    fn best_yes_ask_derives_from_best_no_bid() {
        let snap = BookSnapshot::from_levels(
            1,
            None,
            Ticker::new("MKT-A"),
            SnapshotSource::Ws,
            levels(&[(40, 100), (39, 50)]),
            vec![],
            levels(&[(55, 200), (54, 80)]),
            vec![],
        );

        // Best NO bid at 55c implies YES offered at 45c.
        assert_eq!(snap.best_yes_bid, Some(Price::from_cents(40)));
        assert_eq!(snap.best_yes_ask, Some(Price::from_cents(45)));
        assert_eq!(snap.spread, 5_000);
    }

    #[test]
    fn one_sided_book_has_zero_spread() {
        let snap = BookSnapshot::from_levels(
            1,
            None,
            Ticker::new("MKT-B"),
            SnapshotSource::Rest,
            levels(&[(40, 100)]),
            vec![],
            vec![],
            vec![],
        );

        assert_eq!(snap.best_yes_bid, Some(Price::from_cents(40)));
        assert_eq!(snap.best_yes_ask, None);
        assert_eq!(snap.spread, 0);
    }

    #[test]
    fn side_parses_wire_strings() {
        assert_eq!(Side::parse("yes"), Side::Yes);
        assert_eq!(Side::parse("no"), Side::No);
        assert_eq!(Side::parse("NO"), Side::No);
        assert!(Side::Yes.is_yes());
        assert!(!Side::No.is_yes());
    }
}
