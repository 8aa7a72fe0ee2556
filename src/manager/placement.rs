//! Subscription placement and tracking maps.
//!
//! Three maps, all keyed fine-grained so subscribe traffic doesn't serialize
//! behind one lock: market -> placement, connection -> market set, and
//! (connection, sid) -> subscription record. Both market-side updates happen
//! before the subscribe command is sent, and roll back if it fails, so a
//! response can never observe half-tracked state.

use std::collections::HashSet;

use dashmap::DashMap;

use crate::domain::Ticker;

/// Where a market's orderbook subscription lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct MarketPlacement {
    pub connection_id: u64,
    /// Assigned once the subscribe command is acknowledged.
    pub sid: Option<u64>,
}

/// One acknowledged subscription (global or batch).
#[derive(Debug, Clone)]
pub(super) struct SubscriptionRecord {
    pub sid: u64,
    pub connection_id: u64,
    pub channel: String,
    pub tickers: Vec<Ticker>,
}

#[derive(Default)]
pub(super) struct PlacementMap {
    market_conn: DashMap<Ticker, MarketPlacement>,
    conn_markets: DashMap<u64, HashSet<Ticker>>,
    subs: DashMap<(u64, u64), SubscriptionRecord>,
}

impl PlacementMap {
    /// Markets currently tracked on a connection.
    pub(super) fn load(&self, connection_id: u64) -> usize {
        self.conn_markets
            .get(&connection_id)
            .map(|set| set.len())
            .unwrap_or(0)
    }

    /// Pick the least-loaded of the given connections.
    pub(super) fn pick_min_load(&self, candidates: impl Iterator<Item = u64>) -> Option<u64> {
        candidates.min_by_key(|id| self.load(*id))
    }

    /// True when the market already has (or is acquiring) a placement.
    pub(super) fn is_placed(&self, ticker: &Ticker) -> bool {
        self.market_conn.contains_key(ticker)
    }

    /// Track tickers against a connection ahead of the subscribe send.
    pub(super) fn reserve(&self, connection_id: u64, tickers: &[Ticker]) {
        let mut set = self.conn_markets.entry(connection_id).or_default();
        for ticker in tickers {
            self.market_conn.insert(
                ticker.clone(),
                MarketPlacement {
                    connection_id,
                    sid: None,
                },
            );
            set.insert(ticker.clone());
        }
    }

    /// Undo a reservation after a failed subscribe.
    pub(super) fn rollback(&self, connection_id: u64, tickers: &[Ticker]) {
        if let Some(mut set) = self.conn_markets.get_mut(&connection_id) {
            for ticker in tickers {
                set.remove(ticker);
            }
        }
        for ticker in tickers {
            // Only clear entries still pointing at this connection; a racing
            // re-placement may have claimed the ticker already.
            self.market_conn.remove_if(ticker, |_, placement| {
                placement.connection_id == connection_id
            });
        }
    }

    /// Record the acknowledged SID for a reservation.
    pub(super) fn commit(
        &self,
        connection_id: u64,
        sid: u64,
        channel: &str,
        tickers: Vec<Ticker>,
    ) {
        for ticker in &tickers {
            if let Some(mut placement) = self.market_conn.get_mut(ticker) {
                if placement.connection_id == connection_id {
                    placement.sid = Some(sid);
                }
            }
        }
        self.subs.insert(
            (connection_id, sid),
            SubscriptionRecord {
                sid,
                connection_id,
                channel: channel.to_string(),
                tickers,
            },
        );
    }

    /// Remove one market from tracking. Returns its placement and whether
    /// the owning SID covered only this market (safe to unsubscribe).
    pub(super) fn remove_market(&self, ticker: &Ticker) -> Option<(MarketPlacement, bool)> {
        let (_, placement) = self.market_conn.remove(ticker)?;
        if let Some(mut set) = self.conn_markets.get_mut(&placement.connection_id) {
            set.remove(ticker);
        }

        let mut sole_subscription = false;
        if let Some(sid) = placement.sid {
            let key = (placement.connection_id, sid);
            if let Some(mut record) = self.subs.get_mut(&key) {
                record.tickers.retain(|t| t != ticker);
                sole_subscription = record.tickers.is_empty();
            }
            if sole_subscription {
                self.subs.remove(&key);
            }
        }
        Some((placement, sole_subscription))
    }

    /// Strip all tracking for a failed connection, returning its markets for
    /// redistribution.
    pub(super) fn remove_connection(&self, connection_id: u64) -> Vec<Ticker> {
        let orphans: Vec<Ticker> = self
            .conn_markets
            .remove(&connection_id)
            .map(|(_, set)| set.into_iter().collect())
            .unwrap_or_default();

        for ticker in &orphans {
            self.market_conn.remove_if(ticker, |_, placement| {
                placement.connection_id == connection_id
            });
        }
        self.subs.retain(|(conn, _), _| *conn != connection_id);

        orphans
    }

    pub(super) fn subscription_count(&self) -> usize {
        self.subs.len()
    }

    pub(super) fn market_count(&self) -> usize {
        self.market_conn.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tickers(names: &[&str]) -> Vec<Ticker> {
        names.iter().map(|n| Ticker::new(*n)).collect()
    }

    #[test]
    fn min_load_prefers_emptiest_connection() {
        let map = PlacementMap::default();
        map.reserve(7, &tickers(&["A", "B", "C"]));
        map.reserve(8, &tickers(&["D"]));

        assert_eq!(map.pick_min_load([7, 8, 9].into_iter()), Some(9));
        map.reserve(9, &tickers(&["E", "F"]));
        assert_eq!(map.pick_min_load([7, 8, 9].into_iter()), Some(8));
    }

    #[test]
    fn rollback_restores_previous_state() {
        let map = PlacementMap::default();
        map.reserve(7, &tickers(&["A", "B"]));
        map.rollback(7, &tickers(&["A", "B"]));

        assert_eq!(map.load(7), 0);
        assert!(!map.is_placed(&Ticker::new("A")));
    }

    #[test]
    fn commit_then_remove_market_reports_sole_sid() {
        let map = PlacementMap::default();
        map.reserve(7, &tickers(&["A"]));
        map.commit(7, 42, "orderbook_delta", tickers(&["A"]));

        let (placement, sole) = map.remove_market(&Ticker::new("A")).unwrap();
        assert_eq!(placement.connection_id, 7);
        assert_eq!(placement.sid, Some(42));
        assert!(sole);
        assert_eq!(map.subscription_count(), 0);
    }

    #[test]
    fn batch_member_removal_keeps_sid_alive() {
        let map = PlacementMap::default();
        map.reserve(7, &tickers(&["A", "B"]));
        map.commit(7, 42, "orderbook_delta", tickers(&["A", "B"]));

        let (_, sole) = map.remove_market(&Ticker::new("A")).unwrap();
        assert!(!sole);
        assert_eq!(map.subscription_count(), 1);
    }

    #[test]
    fn remove_connection_returns_orphans_and_clears_subs() {
        let map = PlacementMap::default();
        map.reserve(7, &tickers(&["A", "B"]));
        map.commit(7, 42, "orderbook_delta", tickers(&["A", "B"]));
        map.reserve(8, &tickers(&["C"]));

        let mut orphans = map.remove_connection(7);
        orphans.sort();
        assert_eq!(orphans, tickers(&["A", "B"]));
        assert_eq!(map.market_count(), 1);
        assert_eq!(map.subscription_count(), 0);
        assert!(map.is_placed(&Ticker::new("C")));
    }
}
