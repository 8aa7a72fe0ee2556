//! Database model types for Diesel ORM.
//!
//! Row structs double as the read and write forms: the sync engine moves
//! them between stores verbatim, so a row read from a gatherer database can
//! be inserted into the central one unchanged.

use diesel::prelude::*;
use uuid::Uuid;

use super::schema::{
    events, markets, orderbook_deltas, orderbook_snapshots, series, sync_cursors, ticker_updates,
    trades,
};
use crate::domain::{
    BookDelta, BookSnapshot, Event, Market, Price, PriceLevel, Series, Side, SnapshotSource,
    Ticker, TickerUpdate, Trade,
};
use crate::error::{Error, Result};

#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = trades)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct TradeRow {
    pub trade_id: String,
    pub exchange_ts: i64,
    pub received_at: i64,
    pub ticker: String,
    pub price: i64,
    pub size: i64,
    pub taker_side_yes: bool,
}

impl From<&Trade> for TradeRow {
    fn from(trade: &Trade) -> Self {
        Self {
            trade_id: trade.trade_id.to_string(),
            exchange_ts: trade.exchange_ts,
            received_at: trade.received_at,
            ticker: trade.ticker.to_string(),
            price: trade.price.raw(),
            size: trade.size,
            taker_side_yes: trade.taker_side_yes,
        }
    }
}

impl TradeRow {
    pub fn into_domain(self) -> Result<Trade> {
        Ok(Trade {
            trade_id: Uuid::parse_str(&self.trade_id)
                .map_err(|e| Error::Parse(format!("bad trade id {}: {e}", self.trade_id)))?,
            exchange_ts: self.exchange_ts,
            received_at: self.received_at,
            ticker: Ticker::new(self.ticker),
            price: Price::from_raw(self.price),
            size: self.size,
            taker_side_yes: self.taker_side_yes,
        })
    }
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = orderbook_deltas)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct DeltaRow {
    pub ticker: String,
    pub exchange_ts: i64,
    pub price: i64,
    pub side_yes: bool,
    pub received_at: i64,
    pub size_delta: i64,
    pub seq: i64,
}

impl From<&BookDelta> for DeltaRow {
    fn from(delta: &BookDelta) -> Self {
        Self {
            ticker: delta.ticker.to_string(),
            exchange_ts: delta.exchange_ts,
            price: delta.price.raw(),
            side_yes: delta.side.is_yes(),
            received_at: delta.received_at,
            size_delta: delta.size_delta,
            seq: delta.seq,
        }
    }
}

impl DeltaRow {
    pub fn into_domain(self) -> BookDelta {
        BookDelta {
            exchange_ts: self.exchange_ts,
            received_at: self.received_at,
            ticker: Ticker::new(self.ticker),
            side: Side::from_bool(self.side_yes),
            price: Price::from_raw(self.price),
            size_delta: self.size_delta,
            seq: self.seq,
        }
    }
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = orderbook_snapshots)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SnapshotRow {
    pub ticker: String,
    pub snapshot_ts: i64,
    pub source: String,
    pub exchange_ts: Option<i64>,
    pub received_at: i64,
    pub yes_bids: String,
    pub yes_asks: String,
    pub no_bids: String,
    pub no_asks: String,
    pub best_yes_bid: Option<i64>,
    pub best_yes_ask: Option<i64>,
    pub spread: i64,
}

impl SnapshotRow {
    /// Book levels are stored as JSON arrays of `{price, size}` objects.
    pub fn from_domain(snapshot: &BookSnapshot) -> Result<Self> {
        Ok(Self {
            ticker: snapshot.ticker.to_string(),
            snapshot_ts: snapshot.snapshot_ts,
            source: snapshot.source.as_str().to_string(),
            exchange_ts: snapshot.exchange_ts,
            received_at: snapshot.snapshot_ts,
            yes_bids: serde_json::to_string(&snapshot.yes_bids)?,
            yes_asks: serde_json::to_string(&snapshot.yes_asks)?,
            no_bids: serde_json::to_string(&snapshot.no_bids)?,
            no_asks: serde_json::to_string(&snapshot.no_asks)?,
            best_yes_bid: snapshot.best_yes_bid.map(Price::raw),
            best_yes_ask: snapshot.best_yes_ask.map(Price::raw),
            spread: snapshot.spread,
        })
    }

    pub fn into_domain(self) -> Result<BookSnapshot> {
        let parse_levels = |s: &str| -> Result<Vec<PriceLevel>> {
            serde_json::from_str(s).map_err(Error::from)
        };

        Ok(BookSnapshot {
            snapshot_ts: self.snapshot_ts,
            exchange_ts: self.exchange_ts,
            ticker: Ticker::new(self.ticker),
            source: SnapshotSource::parse(&self.source),
            yes_bids: parse_levels(&self.yes_bids)?,
            yes_asks: parse_levels(&self.yes_asks)?,
            no_bids: parse_levels(&self.no_bids)?,
            no_asks: parse_levels(&self.no_asks)?,
            best_yes_bid: self.best_yes_bid.map(Price::from_raw),
            best_yes_ask: self.best_yes_ask.map(Price::from_raw),
            spread: self.spread,
        })
    }
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = ticker_updates)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct TickerRow {
    pub ticker: String,
    pub exchange_ts: i64,
    pub received_at: i64,
    pub yes_bid: i64,
    pub yes_ask: i64,
    pub last_price: i64,
    pub volume: i64,
    pub open_interest: i64,
}

impl From<&TickerUpdate> for TickerRow {
    fn from(update: &TickerUpdate) -> Self {
        Self {
            ticker: update.ticker.to_string(),
            exchange_ts: update.exchange_ts,
            received_at: update.received_at,
            yes_bid: update.yes_bid.raw(),
            yes_ask: update.yes_ask.raw(),
            last_price: update.last_price.raw(),
            volume: update.volume,
            open_interest: update.open_interest,
        }
    }
}

#[derive(Queryable, Selectable, Insertable, AsChangeset, Debug, Clone, PartialEq)]
#[diesel(table_name = markets)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct MarketRow {
    pub ticker: String,
    pub event_ticker: String,
    pub title: String,
    pub subtitle: String,
    pub market_status: String,
    pub trading_status: String,
    pub market_type: String,
    pub result: String,
    pub volume: i64,
    pub volume_24h: i64,
    pub open_interest: i64,
    pub liquidity: i64,
    pub open_time_us: i64,
    pub close_time_us: i64,
    pub expiration_time_us: i64,
    pub created_time_us: i64,
}

impl MarketRow {
    /// Row for the central `markets` table: the eight gatherer-level states
    /// collapse into the four production values.
    pub fn from_market_production(market: &Market) -> Self {
        Self {
            market_status: market.market_status.to_production().as_str().to_string(),
            ..Self::from_market_raw(market)
        }
    }

    fn from_market_raw(market: &Market) -> Self {
        Self {
            ticker: market.ticker.to_string(),
            event_ticker: market.event_ticker.to_string(),
            title: market.title.clone(),
            subtitle: market.subtitle.clone(),
            market_status: market.market_status.as_str().to_string(),
            trading_status: market.trading_status.clone(),
            market_type: market.market_type.as_str().to_string(),
            result: market.result.clone(),
            volume: market.volume,
            volume_24h: market.volume_24h,
            open_interest: market.open_interest,
            liquidity: market.liquidity,
            open_time_us: market.open_time_us,
            close_time_us: market.close_time_us,
            expiration_time_us: market.expiration_time_us,
            created_time_us: market.created_time_us,
        }
    }
}

#[derive(Queryable, Selectable, Insertable, AsChangeset, Debug, Clone, PartialEq)]
#[diesel(table_name = events)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct EventRow {
    pub event_ticker: String,
    pub series_ticker: String,
    pub title: String,
    pub sub_title: String,
    pub category: String,
}

impl From<&Event> for EventRow {
    fn from(event: &Event) -> Self {
        Self {
            event_ticker: event.event_ticker.to_string(),
            series_ticker: event.series_ticker.to_string(),
            title: event.title.clone(),
            sub_title: event.sub_title.clone(),
            category: event.category.clone(),
        }
    }
}

#[derive(Queryable, Selectable, Insertable, AsChangeset, Debug, Clone, PartialEq)]
#[diesel(table_name = series)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SeriesRow {
    pub series_ticker: String,
    pub title: String,
    pub category: String,
    pub frequency: String,
}

impl From<&Series> for SeriesRow {
    fn from(s: &Series) -> Self {
        Self {
            series_ticker: s.series_ticker.to_string(),
            title: s.title.clone(),
            category: s.category.clone(),
            frequency: s.frequency.clone(),
        }
    }
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = sync_cursors)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CursorRow {
    pub gatherer_id: String,
    pub table_name: String,
    pub last_received_at_us: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::now_micros;

    #[test]
    fn snapshot_row_round_trips_levels_and_best_prices() {
        let snapshot = BookSnapshot::from_levels(
            now_micros(),
            Some(1_709_294_400_000_000),
            Ticker::new("MKT-A"),
            SnapshotSource::Rest,
            vec![
                PriceLevel::new(Price::from_cents(40), 100),
                PriceLevel::new(Price::from_cents(39), 25),
            ],
            vec![],
            vec![PriceLevel::new(Price::from_cents(55), 60)],
            vec![],
        );

        let row = SnapshotRow::from_domain(&snapshot).unwrap();
        assert_eq!(row.source, "rest");
        assert_eq!(row.best_yes_bid, Some(40_000));
        assert_eq!(row.best_yes_ask, Some(45_000));

        let restored = row.into_domain().unwrap();
        assert_eq!(restored, snapshot);
    }

    #[test]
    fn trade_row_round_trips_through_text_uuid() {
        let trade = Trade {
            trade_id: uuid::Uuid::from_u128(42),
            exchange_ts: 1_000,
            received_at: 1_100,
            ticker: Ticker::new("MKT-A"),
            price: Price::from_cents(52),
            size: 7,
            taker_side_yes: false,
        };

        let row = TradeRow::from(&trade);
        assert_eq!(row.trade_id, trade.trade_id.to_string());
        assert_eq!(row.into_domain().unwrap(), trade);
    }

    #[test]
    fn bad_trade_uuid_is_a_parse_error() {
        let row = TradeRow {
            trade_id: "not-a-uuid".to_string(),
            exchange_ts: 0,
            received_at: 0,
            ticker: "MKT-A".to_string(),
            price: 0,
            size: 0,
            taker_side_yes: true,
        };
        assert!(row.into_domain().is_err());
    }

    #[test]
    fn delta_row_preserves_side_and_seq() {
        let delta = BookDelta {
            exchange_ts: 5,
            received_at: 6,
            ticker: Ticker::new("MKT-A"),
            side: Side::No,
            price: Price::from_cents(48),
            size_delta: -15,
            seq: 99,
        };

        let row = DeltaRow::from(&delta);
        assert!(!row.side_yes);
        assert_eq!(row.seq, 99);
        assert_eq!(row.into_domain(), delta);
    }
}
