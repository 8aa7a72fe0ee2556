//! Registry startup, lifecycle application, and reconciliation tasks.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::MarketRegistry;
use crate::domain::{Market, MarketStatus, Ticker};
use crate::error::{Error, Result};
use crate::exchange::messages::{LifecycleMsg, WsEnvelope};
use crate::exchange::{MarketFilter, RestClient};

/// Delay between exchange-status probes while the exchange is inactive.
const STATUS_PROBE_DELAY: Duration = Duration::from_secs(10);

impl MarketRegistry {
    /// Populate the registry from REST at startup.
    ///
    /// Waits for `exchange_active` (trading may still be halted; data flows
    /// regardless), then sweeps markets and events. Failure after the
    /// client-level retries is fatal for the gatherer.
    pub async fn initial_load(&self, rest: &RestClient, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;

        loop {
            let status = rest.exchange_status().await?;
            if status.exchange_active {
                if !status.trading_active {
                    info!("Exchange active with trading halted, proceeding");
                }
                break;
            }
            if Instant::now() + STATUS_PROBE_DELAY >= deadline {
                return Err(Error::Startup(
                    "exchange inactive past the initial load deadline".into(),
                ));
            }
            warn!(
                resume_time = status.exchange_estimated_resume_time.as_deref().unwrap_or("unknown"),
                "Exchange inactive, waiting"
            );
            tokio::time::sleep(STATUS_PROBE_DELAY).await;
        }

        let markets = rest.all_markets(&MarketFilter::default()).await?;
        let total = markets.len();
        for dto in markets {
            self.insert_market(dto.into_domain());
        }
        info!(markets = total, active = self.active_tickers().len(), "Initial market sweep done");

        let events = rest.all_events().await?;
        let event_count = events.len();
        self.cache_events(events.into_iter().map(|dto| dto.into_domain()).collect());
        info!(events = event_count, "Event cache loaded");

        Ok(())
    }

    /// Diff a reconciliation sweep against memory, emitting synthetic
    /// changes. Returns the number of changes applied.
    pub(crate) fn apply_sweep(&self, markets: Vec<Market>) -> usize {
        let mut changes = 0;
        for market in markets {
            match self.get(&market.ticker) {
                None => {
                    let counts = market.market_status.is_active();
                    self.insert_market(market);
                    if counts {
                        changes += 1;
                    }
                }
                Some(existing) => {
                    if existing.market_status != market.market_status {
                        self.apply_status(&market.ticker, market.market_status);
                        changes += 1;
                    }
                    if existing.result.is_empty() && !market.result.is_empty() {
                        self.apply_settlement(&market.ticker, &market.result);
                        changes += 1;
                    }
                }
            }
        }
        changes
    }
}

/// Consume raw lifecycle frames pushed in by the router.
///
/// Parse errors are counted and dropped; the periodic reconciliation sweep
/// heals whatever a bad frame would have told us.
pub async fn run_lifecycle_loop(
    registry: Arc<MarketRegistry>,
    rest: Arc<RestClient>,
    mut frames: mpsc::Receiver<Vec<u8>>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let frame = tokio::select! {
            frame = frames.recv() => frame,
            _ = shutdown.wait_for(|stop| *stop) => break,
        };
        let Some(frame) = frame else { break };

        let msg = match parse_lifecycle(&frame) {
            Ok(msg) => msg,
            Err(e) => {
                registry.metrics().registry_lifecycle_parse_errors_total.inc();
                debug!(error = %e, "Dropping unparseable lifecycle frame");
                continue;
            }
        };

        apply_lifecycle(&registry, &rest, msg).await;
    }

    debug!("Lifecycle loop stopped");
}

fn parse_lifecycle(frame: &[u8]) -> Result<LifecycleMsg> {
    let envelope: WsEnvelope = serde_json::from_slice(frame)?;
    Ok(serde_json::from_value(envelope.msg)?)
}

async fn apply_lifecycle(registry: &Arc<MarketRegistry>, rest: &RestClient, msg: LifecycleMsg) {
    let ticker = Ticker::new(msg.market_ticker.clone());

    match msg.event_type.as_str() {
        "created" => {
            // Lifecycle frames don't carry the full market; fetch it.
            match rest.market(ticker.as_str()).await {
                Ok(dto) => registry.insert_market(dto.into_domain()),
                Err(e) => {
                    warn!(ticker = %ticker, error = %e, "Market fetch after create failed");
                }
            }
        }
        "status_change" => {
            let Some(new_status) = msg.new_status.as_deref() else {
                registry.metrics().registry_lifecycle_parse_errors_total.inc();
                return;
            };
            registry.apply_status(&ticker, MarketStatus::parse(new_status));
        }
        "settled" => {
            registry.apply_settlement(&ticker, msg.result.as_deref().unwrap_or_default());
        }
        other => {
            debug!(event_type = other, "Ignoring unknown lifecycle event");
        }
    }
}

/// Periodic REST sweep that diffs the exchange against memory.
pub async fn run_reconcile_loop(
    registry: Arc<MarketRegistry>,
    rest: Arc<RestClient>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately; skip it, startup just swept.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.wait_for(|stop| *stop) => break,
        }

        match rest.all_markets(&MarketFilter::default()).await {
            Ok(markets) => {
                let changes =
                    registry.apply_sweep(markets.into_iter().map(|dto| dto.into_domain()).collect());
                registry
                    .metrics()
                    .registry_reconcile_changes_total
                    .inc_by(changes as u64);
                if changes > 0 {
                    info!(changes, "Reconciliation applied changes");
                }
            }
            Err(e) => {
                error!(error = %e, "Reconciliation sweep failed");
            }
        }
    }

    debug!("Reconcile loop stopped");
}
