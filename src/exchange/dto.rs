//! REST response shapes.
//!
//! Thin serde structs mirroring the exchange's JSON; conversion into domain
//! types happens here so the rest of the pipeline never sees wire forms.

use serde::Deserialize;

use crate::domain::{
    parse_datetime_micros, Event, Market, MarketStatus, MarketType, Series,
};

/// `GET /exchange/status`
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeStatus {
    pub exchange_active: bool,
    #[serde(default)]
    pub trading_active: bool,
    #[serde(default)]
    pub exchange_estimated_resume_time: Option<String>,
}

/// One market as returned by `GET /markets`.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketDto {
    pub ticker: String,
    #[serde(default)]
    pub event_ticker: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub trading_status: String,
    #[serde(default)]
    pub market_type: String,
    #[serde(default)]
    pub result: String,
    #[serde(default)]
    pub volume: i64,
    #[serde(default)]
    pub volume_24h: i64,
    #[serde(default)]
    pub open_interest: i64,
    #[serde(default)]
    pub liquidity: i64,
    #[serde(default)]
    pub open_time: String,
    #[serde(default)]
    pub close_time: String,
    #[serde(default)]
    pub expiration_time: String,
    #[serde(default)]
    pub created_time: String,
}

impl MarketDto {
    pub fn into_domain(self) -> Market {
        Market {
            ticker: self.ticker.into(),
            event_ticker: self.event_ticker.into(),
            title: self.title,
            subtitle: self.subtitle,
            market_status: MarketStatus::parse(&self.status),
            trading_status: self.trading_status,
            market_type: MarketType::parse(&self.market_type),
            result: self.result,
            volume: self.volume,
            volume_24h: self.volume_24h,
            open_interest: self.open_interest,
            liquidity: self.liquidity,
            open_time_us: parse_datetime_micros(&self.open_time),
            close_time_us: parse_datetime_micros(&self.close_time),
            expiration_time_us: parse_datetime_micros(&self.expiration_time),
            created_time_us: parse_datetime_micros(&self.created_time),
        }
    }
}

/// Paginated `GET /markets` page.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketsResponse {
    #[serde(default)]
    pub markets: Vec<MarketDto>,
    #[serde(default)]
    pub cursor: Option<String>,
}

/// `GET /markets/{ticker}` wrapper.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketResponse {
    pub market: MarketDto,
}

/// One event as returned by `GET /events`.
#[derive(Debug, Clone, Deserialize)]
pub struct EventDto {
    pub event_ticker: String,
    #[serde(default)]
    pub series_ticker: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub sub_title: String,
    #[serde(default)]
    pub category: String,
}

impl EventDto {
    pub fn into_domain(self) -> Event {
        Event {
            event_ticker: self.event_ticker.into(),
            series_ticker: self.series_ticker.into(),
            title: self.title,
            sub_title: self.sub_title,
            category: self.category,
        }
    }
}

/// Paginated `GET /events` page.
#[derive(Debug, Clone, Deserialize)]
pub struct EventsResponse {
    #[serde(default)]
    pub events: Vec<EventDto>,
    #[serde(default)]
    pub cursor: Option<String>,
}

/// `GET /events/{ticker}` wrapper.
#[derive(Debug, Clone, Deserialize)]
pub struct EventResponse {
    pub event: EventDto,
}

/// One series as returned by `GET /series/{ticker}`.
#[derive(Debug, Clone, Deserialize)]
pub struct SeriesDto {
    pub ticker: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub frequency: String,
}

impl SeriesDto {
    pub fn into_domain(self) -> Series {
        Series {
            series_ticker: self.ticker.into(),
            title: self.title,
            category: self.category,
            frequency: self.frequency,
        }
    }
}

/// `GET /series/{ticker}` wrapper.
#[derive(Debug, Clone, Deserialize)]
pub struct SeriesResponse {
    pub series: SeriesDto,
}

/// Book levels as `[price_cents, quantity]` pairs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderbookDto {
    #[serde(default)]
    pub yes: Vec<(i64, i64)>,
    #[serde(default)]
    pub no: Vec<(i64, i64)>,
}

/// `GET /markets/{ticker}/orderbook` wrapper.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderbookResponse {
    #[serde(default)]
    pub orderbook: OrderbookDto,
}
