//! In-memory market registry.
//!
//! Owns the set of known markets, publishes a change stream that drives the
//! connection manager's subscription lifecycle, and heals itself against the
//! REST API on a timer. Writes go through the registry task only; readers
//! take the read lock.

mod service;

pub use service::{run_lifecycle_loop, run_reconcile_loop};

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::domain::{Event, EventTicker, Market, MarketStatus, Ticker};
use crate::monitor::Metrics;

/// What happened to a market.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    StatusChange {
        old: MarketStatus,
        new: MarketStatus,
    },
    Settled,
}

/// One entry on the change stream.
#[derive(Debug, Clone)]
pub struct MarketChange {
    pub ticker: Ticker,
    pub kind: ChangeKind,
    /// Snapshot of the market after the change was applied.
    pub market: Market,
}

pub struct MarketRegistry {
    markets: RwLock<HashMap<Ticker, Market>>,
    events: RwLock<HashMap<EventTicker, Event>>,
    changes_tx: mpsc::Sender<MarketChange>,
    metrics: Arc<Metrics>,
}

impl MarketRegistry {
    /// Build the registry and hand back the change-stream receiver.
    pub fn new(
        change_buffer_size: usize,
        metrics: Arc<Metrics>,
    ) -> (Arc<Self>, mpsc::Receiver<MarketChange>) {
        let (changes_tx, changes_rx) = mpsc::channel(change_buffer_size);
        let registry = Arc::new(Self {
            markets: RwLock::new(HashMap::new()),
            events: RwLock::new(HashMap::new()),
            changes_tx,
            metrics,
        });
        (registry, changes_rx)
    }

    pub fn len(&self) -> usize {
        self.markets.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.markets.read().is_empty()
    }

    pub fn get(&self, ticker: &Ticker) -> Option<Market> {
        self.markets.read().get(ticker).cloned()
    }

    /// Tickers currently in active status.
    pub fn active_tickers(&self) -> Vec<Ticker> {
        self.markets
            .read()
            .values()
            .filter(|m| m.market_status.is_active())
            .map(|m| m.ticker.clone())
            .collect()
    }

    pub fn event(&self, ticker: &EventTicker) -> Option<Event> {
        self.events.read().get(ticker).cloned()
    }

    pub(crate) fn cache_events(&self, events: Vec<Event>) {
        let mut cache = self.events.write();
        for event in events {
            cache.insert(event.event_ticker.clone(), event);
        }
    }

    /// Insert a market discovered by sweep or lifecycle; emits `Created` when
    /// the market is new and active.
    pub(crate) fn insert_market(&self, market: Market) {
        let ticker = market.ticker.clone();
        let is_new = {
            let mut markets = self.markets.write();
            markets.insert(ticker.clone(), market.clone()).is_none()
        };
        self.update_gauge();

        if is_new && market.market_status.is_active() {
            self.publish(MarketChange {
                ticker,
                kind: ChangeKind::Created,
                market,
            });
        }
    }

    /// Apply a status transition observed on the lifecycle stream or by
    /// reconciliation. Unknown tickers are ignored (the next sweep inserts
    /// them).
    pub(crate) fn apply_status(&self, ticker: &Ticker, new_status: MarketStatus) {
        let change = {
            let mut markets = self.markets.write();
            match markets.get_mut(ticker) {
                Some(market) if market.market_status != new_status => {
                    let old = market.market_status;
                    market.market_status = new_status;
                    Some(MarketChange {
                        ticker: ticker.clone(),
                        kind: ChangeKind::StatusChange {
                            old,
                            new: new_status,
                        },
                        market: market.clone(),
                    })
                }
                _ => None,
            }
        };

        if let Some(change) = change {
            self.publish(change);
        }
    }

    /// Record a settlement result.
    pub(crate) fn apply_settlement(&self, ticker: &Ticker, result: &str) {
        let change = {
            let mut markets = self.markets.write();
            match markets.get_mut(ticker) {
                Some(market) => {
                    market.result = result.to_string();
                    if market.market_status == MarketStatus::Active {
                        market.market_status = MarketStatus::Determined;
                    }
                    Some(MarketChange {
                        ticker: ticker.clone(),
                        kind: ChangeKind::Settled,
                        market: market.clone(),
                    })
                }
                None => {
                    debug!(ticker = %ticker, "Settlement for unknown market");
                    None
                }
            }
        };

        if let Some(change) = change {
            self.publish(change);
        }
    }

    /// Non-blocking publish; a full stream drops the new change and counts
    /// it. Reconciliation resweeps within one interval, so the loss heals.
    fn publish(&self, change: MarketChange) {
        if let Err(mpsc::error::TrySendError::Full(change)) = self.changes_tx.try_send(change) {
            self.metrics.registry_changes_dropped_total.inc();
            warn!(ticker = %change.ticker, "Change stream full, dropping change");
        }
    }

    fn update_gauge(&self) {
        self.metrics.registry_markets.set(self.len() as i64);
    }

    pub(crate) fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MarketType;

    fn market(ticker: &str, status: MarketStatus) -> Market {
        Market {
            ticker: ticker.into(),
            event_ticker: "EVT-1".into(),
            title: "Example".into(),
            subtitle: String::new(),
            market_status: status,
            trading_status: "trading".into(),
            market_type: MarketType::Binary,
            result: String::new(),
            volume: 0,
            volume_24h: 0,
            open_interest: 0,
            liquidity: 0,
            open_time_us: 0,
            close_time_us: 0,
            expiration_time_us: 0,
            created_time_us: 0,
        }
    }

    fn registry(buffer: usize) -> (Arc<MarketRegistry>, mpsc::Receiver<MarketChange>) {
        let metrics = Arc::new(Metrics::new().unwrap());
        MarketRegistry::new(buffer, metrics)
    }

    #[test]
    fn new_active_market_emits_created() {
        let (registry, mut changes) = registry(16);
        registry.insert_market(market("MKT-A", MarketStatus::Active));

        let change = changes.try_recv().expect("created change queued");
        assert_eq!(change.kind, ChangeKind::Created);
        assert_eq!(change.ticker.as_str(), "MKT-A");
    }

    #[test]
    fn inactive_market_is_tracked_silently() {
        let (registry, mut changes) = registry(16);
        registry.insert_market(market("MKT-A", MarketStatus::Initialized));

        assert_eq!(registry.len(), 1);
        assert!(changes.try_recv().is_err());
    }

    #[test]
    fn status_change_carries_old_and_new() {
        let (registry, mut changes) = registry(16);
        registry.insert_market(market("MKT-A", MarketStatus::Active));
        let _ = changes.try_recv();

        registry.apply_status(&"MKT-A".into(), MarketStatus::Closed);
        let change = changes.try_recv().expect("status change queued");
        assert_eq!(
            change.kind,
            ChangeKind::StatusChange {
                old: MarketStatus::Active,
                new: MarketStatus::Closed,
            }
        );
        assert_eq!(change.market.market_status, MarketStatus::Closed);

        // Idempotent transitions are suppressed.
        registry.apply_status(&"MKT-A".into(), MarketStatus::Closed);
        assert!(changes.try_recv().is_err());
    }

    #[test]
    fn settlement_records_result() {
        let (registry, mut changes) = registry(16);
        registry.insert_market(market("MKT-A", MarketStatus::Active));
        let _ = changes.try_recv();

        registry.apply_settlement(&"MKT-A".into(), "yes");
        let change = changes.try_recv().expect("settled change queued");
        assert_eq!(change.kind, ChangeKind::Settled);
        assert_eq!(change.market.result, "yes");
    }

    #[test]
    fn full_stream_drops_new_changes() {
        let (registry, mut changes) = registry(1);
        registry.insert_market(market("MKT-A", MarketStatus::Active));
        registry.insert_market(market("MKT-B", MarketStatus::Active));

        // Only the first change fit; the second was dropped, not queued.
        assert_eq!(changes.try_recv().unwrap().ticker.as_str(), "MKT-A");
        assert!(changes.try_recv().is_err());
    }

    #[test]
    fn active_tickers_filters_status() {
        let (registry, _changes) = registry(16);
        registry.insert_market(market("MKT-A", MarketStatus::Active));
        registry.insert_market(market("MKT-B", MarketStatus::Closed));

        let active = registry.active_tickers();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].as_str(), "MKT-A");
    }
}
