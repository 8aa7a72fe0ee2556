//! Gatherer node wiring.
//!
//! Startup order: store, signing, REST sweep (fatal on failure), then the
//! connection pool, router, writers, and pollers, all sharing one shutdown
//! signal. Shutdown reverses it: stop producing, drain the router and
//! writers, close sockets, close the store.

use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio::sync::{mpsc, watch};
use tracing::{error, info};

use super::{join_with_deadline, SHUTDOWN_DEADLINE};
use crate::config::Config;
use crate::error::Result;
use crate::exchange::{RequestSigner, RestClient, SignedDialer};
use crate::manager::ConnectionManager;
use crate::monitor::{self, HealthState, Metrics};
use crate::poller::run_snapshot_poller;
use crate::registry::{run_lifecycle_loop, run_reconcile_loop, MarketRegistry};
use crate::router::{run_router, RouterOutputs};
use crate::store;
use crate::writer::{run_delta_writer, run_snapshot_writer, run_ticker_writer, run_trade_writer};

pub async fn run(config: Config) -> Result<()> {
    config.validate_for_gatherer()?;

    let metrics = Arc::new(Metrics::new()?);
    let health = HealthState::new();

    let pool = store::create_pool(&config.store.database_path, config.store.pool_size)?;
    store::run_migrations(&pool)?;
    health.set_store(true, store::ping_millis(&pool)?);
    info!(database = %config.store.database_path.display(), "Local store ready");

    let signer = Arc::new(RequestSigner::from_key_file(
        &config.api.key_id,
        &config.api.private_key_path,
    )?);
    let rest = Arc::new(RestClient::new(
        &config.api,
        Arc::clone(&signer),
        config.market_registry.page_size,
    )?);
    let dialer = SignedDialer::new(config.api.ws_url.clone(), signer)?;

    let (registry, changes_rx) = MarketRegistry::new(
        config.market_registry.change_buffer_size,
        Arc::clone(&metrics),
    );

    // The initial sweep is the one failure that takes the node down; the
    // orchestrator restarts it.
    let load_timeout = Duration::from_secs(config.market_registry.initial_load_timeout_secs);
    if let Err(e) = registry.initial_load(&rest, load_timeout).await {
        error!(error = %e, "Initial market sweep failed");
        return Err(e);
    }
    health.set_registry_markets(registry.len());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let (manager, raw_rx) = ConnectionManager::new(
        config.connection_manager.clone(),
        dialer,
        Arc::clone(&metrics),
        Arc::clone(&health),
    );
    let mut handles = Arc::clone(&manager)
        .start(changes_rx, registry.active_tickers(), shutdown_rx.clone())
        .await;

    let (deltas_tx, deltas_rx) = mpsc::channel(config.router.orderbook_buffer_size);
    let (trades_tx, trades_rx) = mpsc::channel(config.router.trade_buffer_size);
    let (tickers_tx, tickers_rx) = mpsc::channel(config.router.ticker_buffer_size);
    let (snapshots_tx, snapshots_rx) = mpsc::channel(config.router.snapshot_buffer_size);
    let (lifecycle_tx, lifecycle_rx) = mpsc::channel(config.router.trade_buffer_size);

    handles.push(tokio::spawn(run_router(
        raw_rx,
        RouterOutputs {
            deltas: deltas_tx,
            trades: trades_tx,
            tickers: tickers_tx,
            snapshots: snapshots_tx.clone(),
            lifecycle: lifecycle_tx,
        },
        manager.sequence_tracker(),
        Arc::clone(&metrics),
        shutdown_rx.clone(),
    )));

    handles.push(tokio::spawn(run_lifecycle_loop(
        Arc::clone(&registry),
        Arc::clone(&rest),
        lifecycle_rx,
        shutdown_rx.clone(),
    )));
    handles.push(tokio::spawn(run_reconcile_loop(
        Arc::clone(&registry),
        Arc::clone(&rest),
        Duration::from_secs(config.market_registry.reconcile_interval_secs),
        shutdown_rx.clone(),
    )));

    handles.push(tokio::spawn(run_trade_writer(
        pool.clone(),
        trades_rx,
        config.writers.trade_params(),
        Arc::clone(&metrics),
        shutdown_rx.clone(),
    )));
    handles.push(tokio::spawn(run_delta_writer(
        pool.clone(),
        deltas_rx,
        config.writers.orderbook_params(),
        Arc::clone(&metrics),
        shutdown_rx.clone(),
    )));
    handles.push(tokio::spawn(run_ticker_writer(
        pool.clone(),
        tickers_rx,
        config.writers.ticker_params(),
        Arc::clone(&metrics),
        shutdown_rx.clone(),
    )));
    handles.push(tokio::spawn(run_snapshot_writer(
        pool.clone(),
        snapshots_rx,
        Arc::clone(&metrics),
        shutdown_rx.clone(),
    )));

    handles.push(tokio::spawn(run_snapshot_poller(
        Arc::clone(&registry),
        Arc::clone(&rest),
        config.snapshot_poller.clone(),
        snapshots_tx,
        Arc::clone(&metrics),
        shutdown_rx.clone(),
    )));

    handles.push(tokio::spawn(health_refresher(
        pool.clone(),
        Arc::clone(&registry),
        Arc::clone(&health),
        shutdown_rx.clone(),
    )));

    if config.server.enabled {
        let bind_addr = config.server.bind_addr.clone();
        let health = Arc::clone(&health);
        let metrics = Arc::clone(&metrics);
        let server_shutdown = shutdown_rx.clone();
        handles.push(tokio::spawn(async move {
            if let Err(e) = monitor::serve(&bind_addr, health, metrics, server_shutdown).await {
                error!(error = %e, "Observability endpoint failed");
            }
        }));
    }

    info!(
        gatherer_id = %config.gatherer_id,
        markets = registry.len(),
        connections = config.connection_manager.max_connections,
        "Gatherer running"
    );

    signal::ctrl_c().await?;
    info!("Shutdown signal received");

    // Gate-close first: the watch flip stops the read loops producing, the
    // router and writers drain what's buffered, then sockets and the store
    // close as their tasks unwind.
    let _ = shutdown_tx.send(true);
    join_with_deadline(handles, SHUTDOWN_DEADLINE).await;

    info!("Gatherer stopped");
    Ok(())
}

/// Keep the health snapshot's store and registry figures current.
async fn health_refresher(
    pool: store::DbPool,
    registry: Arc<MarketRegistry>,
    health: Arc<HealthState>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(Duration::from_secs(10));
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.wait_for(|stop| *stop) => break,
        }

        match store::ping_millis(&pool) {
            Ok(ping) => health.set_store(true, ping),
            Err(_) => health.set_store(false, 0.0),
        }
        health.set_registry_markets(registry.len());
    }
}
