//! Periodic REST orderbook snapshot poller.
//!
//! Every poll interval, fetch the full book for every active market with
//! bounded concurrency and push the results at the snapshot writer. These
//! rows backfill WebSocket gaps: replaying deltas from the latest snapshot
//! reconstructs current book state, and the `rest` source keeps them from
//! ever colliding with WS snapshots.

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::SnapshotPollerConfig;
use crate::domain::{now_micros, BookSnapshot, Price, PriceLevel, SnapshotSource, Ticker};
use crate::exchange::RestClient;
use crate::monitor::Metrics;
use crate::registry::MarketRegistry;

pub async fn run_snapshot_poller(
    registry: Arc<MarketRegistry>,
    rest: Arc<RestClient>,
    config: SnapshotPollerConfig,
    snapshots: mpsc::Sender<BookSnapshot>,
    metrics: Arc<Metrics>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(Duration::from_secs(config.poll_interval_secs.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.wait_for(|stop| *stop) => break,
        }

        let markets = registry.active_tickers();
        metrics
            .snapshot_poller_markets_polled
            .set(markets.len() as i64);
        if markets.is_empty() {
            continue;
        }

        let start = std::time::Instant::now();
        let request_timeout = Duration::from_secs(config.request_timeout_secs);

        let fetches = stream::iter(markets.into_iter().map(|ticker| {
            let rest = Arc::clone(&rest);
            async move {
                let result = tokio::time::timeout(
                    request_timeout,
                    rest.orderbook(ticker.as_str(), None),
                )
                .await;
                (ticker, result)
            }
        }))
        .buffer_unordered(config.concurrency.max(1));

        let mut fetched: u64 = 0;
        let mut errors: u64 = 0;
        let mut write_errors: u64 = 0;

        futures_util::pin_mut!(fetches);
        while let Some((ticker, result)) = fetches.next().await {
            match result {
                Ok(Ok(response)) => {
                    fetched += 1;
                    let snapshot = snapshot_from_rest(ticker, &response.orderbook);
                    if snapshots.try_send(snapshot).is_err() {
                        write_errors += 1;
                    }
                }
                Ok(Err(e)) => {
                    errors += 1;
                    debug!(ticker = %ticker, error = %e, "Orderbook fetch failed");
                }
                Err(_) => {
                    errors += 1;
                    debug!(ticker = %ticker, "Orderbook fetch timed out");
                }
            }
        }

        metrics.snapshot_poller_fetched_total.inc_by(fetched);
        metrics.snapshot_poller_fetch_errors_total.inc_by(errors);
        metrics
            .snapshot_poller_write_errors_total
            .inc_by(write_errors);
        metrics
            .snapshot_poller_poll_duration_seconds
            .observe(start.elapsed().as_secs_f64());

        if errors > 0 || write_errors > 0 {
            warn!(fetched, errors, write_errors, "Snapshot poll finished with failures");
        } else {
            info!(fetched, duration_secs = start.elapsed().as_secs(), "Snapshot poll finished");
        }
    }

    debug!("Snapshot poller stopped");
}

fn snapshot_from_rest(ticker: Ticker, book: &crate::exchange::OrderbookDto) -> BookSnapshot {
    let to_levels = |levels: &[(i64, i64)]| -> Vec<PriceLevel> {
        levels
            .iter()
            .map(|&(cents, size)| PriceLevel::new(Price::from_cents(cents), size))
            .collect()
    };

    BookSnapshot::from_levels(
        now_micros(),
        None,
        ticker,
        SnapshotSource::Rest,
        to_levels(&book.yes),
        vec![],
        to_levels(&book.no),
        vec![],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::OrderbookDto;

    #[test]
    fn rest_snapshot_has_rest_source_and_derived_prices() {
        let book = OrderbookDto {
            yes: vec![(40, 100), (38, 10)],
            no: vec![(55, 60)],
        };
        let snapshot = snapshot_from_rest(Ticker::new("MKT-A"), &book);

        assert_eq!(snapshot.source, SnapshotSource::Rest);
        assert_eq!(snapshot.best_yes_bid, Some(Price::from_cents(40)));
        assert_eq!(snapshot.best_yes_ask, Some(Price::from_cents(45)));
        assert!(snapshot.snapshot_ts > 0);
    }
}
