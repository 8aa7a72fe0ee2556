//! Exchange-agnostic domain types for the capture pipeline.

mod book;
mod ids;
mod market;
mod price;
mod ticker;
mod time;
mod trade;

pub use book::{BookDelta, BookSnapshot, PriceLevel, Side, SnapshotSource};
pub use ids::{EventTicker, SeriesTicker, Ticker};
pub use market::{Event, Market, MarketStatus, MarketType, ProductionStatus, Series};
pub use price::Price;
pub use ticker::TickerUpdate;
pub use time::{micros_from_ts_value, now_micros, parse_datetime_micros};
pub use trade::Trade;
