//! Periodic metadata refresh from the exchange REST API.
//!
//! Markets and events are swept every interval and upserted into the central
//! relational tables with the production status mapping applied. Series are
//! fetched lazily, only when an event references one the store hasn't seen.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::exchange::{MarketFilter, RestClient};
use crate::monitor::Metrics;
use crate::store::metadata::{series_exists, upsert_events, upsert_markets, upsert_series};
use crate::store::model::{EventRow, MarketRow, SeriesRow};
use crate::store::DbPool;

pub async fn run_metadata_sync(
    central: DbPool,
    rest: Arc<RestClient>,
    sync_interval: Duration,
    metrics: Arc<Metrics>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(sync_interval.max(Duration::from_secs(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.wait_for(|stop| *stop) => break,
        }

        match sync_metadata(&central, &rest, &metrics).await {
            Ok((markets, events, series)) => {
                info!(markets, events, series, "Metadata sync finished");
            }
            Err(e) => {
                metrics.metadata_errors_total.inc();
                warn!(error = %e, "Metadata sync failed");
            }
        }
    }

    debug!("Metadata sync stopped");
}

async fn sync_metadata(
    central: &DbPool,
    rest: &RestClient,
    metrics: &Metrics,
) -> Result<(usize, usize, usize)> {
    let market_rows: Vec<MarketRow> = rest
        .all_markets(&MarketFilter::default())
        .await?
        .into_iter()
        .map(|dto| MarketRow::from_market_production(&dto.into_domain()))
        .collect();

    let events = rest.all_events().await?;
    let event_rows: Vec<EventRow> = events
        .iter()
        .cloned()
        .map(|dto| EventRow::from(&dto.into_domain()))
        .collect();

    let referenced_series: HashSet<String> = events
        .iter()
        .filter(|e| !e.series_ticker.is_empty())
        .map(|e| e.series_ticker.clone())
        .collect();

    let markets_written;
    let events_written;
    let mut missing_series = Vec::new();
    {
        let mut conn = central.get().map_err(|e| Error::Pool(e.to_string()))?;
        markets_written = upsert_markets(&mut conn, &market_rows)?;
        events_written = upsert_events(&mut conn, &event_rows)?;

        for series_ticker in referenced_series {
            if !series_exists(&mut conn, &series_ticker)? {
                missing_series.push(series_ticker);
            }
        }
    }

    // Series fetched on demand, one REST call per unseen ticker.
    let mut series_written = 0;
    for series_ticker in missing_series {
        match rest.series(&series_ticker).await {
            Ok(dto) => {
                let row = SeriesRow::from(&dto.into_domain());
                let mut conn = central.get().map_err(|e| Error::Pool(e.to_string()))?;
                series_written += upsert_series(&mut conn, &row)?;
            }
            Err(e) => {
                warn!(series = %series_ticker, error = %e, "Series fetch failed");
            }
        }
    }

    metrics
        .metadata_upserts_total
        .with_label_values(&["markets"])
        .inc_by(markets_written as u64);
    metrics
        .metadata_upserts_total
        .with_label_values(&["events"])
        .inc_by(events_written as u64);
    metrics
        .metadata_upserts_total
        .with_label_values(&["series"])
        .inc_by(series_written as u64);

    Ok((markets_written, events_written, series_written))
}
