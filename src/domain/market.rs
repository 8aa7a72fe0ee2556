//! Market, event, and series metadata entities.

use serde::{Deserialize, Serialize};

use super::ids::{EventTicker, SeriesTicker, Ticker};

/// Gatherer-level market status, mirroring the exchange's lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketStatus {
    Initialized,
    Inactive,
    Active,
    Closed,
    Disputed,
    Determined,
    Amended,
    Finalized,
}

impl MarketStatus {
    /// Parse the exchange's string form; unknown strings map to `Initialized`
    /// so reconciliation can correct them later.
    pub fn parse(s: &str) -> Self {
        match s {
            "initialized" => Self::Initialized,
            "inactive" => Self::Inactive,
            "active" => Self::Active,
            "closed" => Self::Closed,
            "disputed" => Self::Disputed,
            "determined" => Self::Determined,
            "amended" => Self::Amended,
            "finalized" => Self::Finalized,
            _ => Self::Initialized,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initialized => "initialized",
            Self::Inactive => "inactive",
            Self::Active => "active",
            Self::Closed => "closed",
            Self::Disputed => "disputed",
            Self::Determined => "determined",
            Self::Amended => "amended",
            Self::Finalized => "finalized",
        }
    }

    /// True when the market accepts trading data.
    pub fn is_active(self) -> bool {
        self == Self::Active
    }

    /// Collapse into the four-value production status.
    pub fn to_production(self) -> ProductionStatus {
        match self {
            Self::Initialized | Self::Inactive => ProductionStatus::Unopened,
            Self::Active => ProductionStatus::Open,
            Self::Closed | Self::Disputed => ProductionStatus::Closed,
            Self::Determined | Self::Amended | Self::Finalized => ProductionStatus::Settled,
        }
    }
}

/// Four-value status written to the central `markets` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductionStatus {
    Unopened,
    Open,
    Closed,
    Settled,
}

impl ProductionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unopened => "unopened",
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Settled => "settled",
        }
    }
}

/// Market payout structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketType {
    Binary,
    Scalar,
}

impl MarketType {
    pub fn parse(s: &str) -> Self {
        match s {
            "scalar" => Self::Scalar,
            _ => Self::Binary,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Binary => "binary",
            Self::Scalar => "scalar",
        }
    }
}

/// One tradeable market.
#[derive(Debug, Clone)]
pub struct Market {
    pub ticker: Ticker,
    pub event_ticker: EventTicker,
    pub title: String,
    pub subtitle: String,
    pub market_status: MarketStatus,
    /// Exchange-level trading gate; data still flows while this is false.
    pub trading_status: String,
    pub market_type: MarketType,
    /// Settlement result, empty until settled.
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

/// An event groups related markets.
#[derive(Debug, Clone)]
pub struct Event {
    pub event_ticker: EventTicker,
    pub series_ticker: SeriesTicker,
    pub title: String,
    pub sub_title: String,
    pub category: String,
}

/// A series groups recurring events.
#[derive(Debug, Clone)]
pub struct Series {
    pub series_ticker: SeriesTicker,
    pub title: String,
    pub category: String,
    pub frequency: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_maps_to_production_values() {
        assert_eq!(
            MarketStatus::Initialized.to_production(),
            ProductionStatus::Unopened
        );
        assert_eq!(
            MarketStatus::Inactive.to_production(),
            ProductionStatus::Unopened
        );
        assert_eq!(MarketStatus::Active.to_production(), ProductionStatus::Open);
        assert_eq!(MarketStatus::Closed.to_production(), ProductionStatus::Closed);
        assert_eq!(
            MarketStatus::Disputed.to_production(),
            ProductionStatus::Closed
        );
        assert_eq!(
            MarketStatus::Determined.to_production(),
            ProductionStatus::Settled
        );
        assert_eq!(
            MarketStatus::Amended.to_production(),
            ProductionStatus::Settled
        );
        assert_eq!(
            MarketStatus::Finalized.to_production(),
            ProductionStatus::Settled
        );
    }

    #[test]
    fn status_string_round_trip() {
        for status in [
            MarketStatus::Initialized,
            MarketStatus::Inactive,
            MarketStatus::Active,
            MarketStatus::Closed,
            MarketStatus::Disputed,
            MarketStatus::Determined,
            MarketStatus::Amended,
            MarketStatus::Finalized,
        ] {
            assert_eq!(MarketStatus::parse(status.as_str()), status);
        }
    }

    #[test]
    fn unknown_status_defaults_to_initialized() {
        assert_eq!(MarketStatus::parse("bogus"), MarketStatus::Initialized);
    }
}
