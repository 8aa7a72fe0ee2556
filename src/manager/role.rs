//! Connection roles within the fixed pool.

use crate::exchange::messages::{
    CHANNEL_LIFECYCLE, CHANNEL_ORDERBOOK, CHANNEL_TICKER, CHANNEL_TRADE,
};

/// What a pooled connection subscribes to.
///
/// The first six slots carry the doubled global channels; every remaining
/// slot carries a disjoint slice of the orderbook universe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionRole {
    /// Global top-of-book stream; subscribes once, receives all tickers.
    Ticker,
    /// Global trade stream.
    Trade,
    /// Global market-lifecycle stream.
    Lifecycle,
    /// Per-market orderbook deltas.
    Orderbook,
}

impl ConnectionRole {
    /// Role layout by slot index: 2x ticker, 2x trade, 2x lifecycle, rest
    /// orderbook.
    pub fn for_slot(index: usize) -> Self {
        match index {
            0 | 1 => Self::Ticker,
            2 | 3 => Self::Trade,
            4 | 5 => Self::Lifecycle,
            _ => Self::Orderbook,
        }
    }

    /// Channel name used in subscribe commands.
    pub fn channel(self) -> &'static str {
        match self {
            Self::Ticker => CHANNEL_TICKER,
            Self::Trade => CHANNEL_TRADE,
            Self::Lifecycle => CHANNEL_LIFECYCLE,
            Self::Orderbook => CHANNEL_ORDERBOOK,
        }
    }

    /// Global roles subscribe to everything with one command and carry no
    /// per-market state.
    pub fn is_global(self) -> bool {
        !matches!(self, Self::Orderbook)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ticker => "ticker",
            Self::Trade => "trade",
            Self::Lifecycle => "lifecycle",
            Self::Orderbook => "orderbook",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_layout_matches_topology() {
        let roles: Vec<_> = (0..8).map(ConnectionRole::for_slot).collect();
        assert_eq!(
            roles,
            vec![
                ConnectionRole::Ticker,
                ConnectionRole::Ticker,
                ConnectionRole::Trade,
                ConnectionRole::Trade,
                ConnectionRole::Lifecycle,
                ConnectionRole::Lifecycle,
                ConnectionRole::Orderbook,
                ConnectionRole::Orderbook,
            ]
        );
        // Everything past the global slots is orderbook.
        assert_eq!(ConnectionRole::for_slot(149), ConnectionRole::Orderbook);
    }
}
