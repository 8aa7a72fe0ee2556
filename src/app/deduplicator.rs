//! Deduplicator node wiring.
//!
//! One sync loop per (gatherer, table) pair plus the metadata refresher, all
//! writing into the central store. Gatherer stores are opened independently
//! so one unreachable node never stalls the others.

use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

use super::{join_with_deadline, SHUTDOWN_DEADLINE};
use crate::config::{Config, TableSyncParams};
use crate::error::Result;
use crate::exchange::{RequestSigner, RestClient};
use crate::monitor::{self, HealthState, Metrics};
use crate::store;
use crate::sync::{run_metadata_sync, run_table_sync, run_table_sync_serial, SyncTable};

pub async fn run(config: Config) -> Result<()> {
    config.validate_for_dedup()?;

    let metrics = Arc::new(Metrics::new()?);
    let health = HealthState::new();

    let central = store::create_pool(
        &config.dedup.production.database_path,
        config.dedup.production.pool_size,
    )?;
    store::run_migrations(&central)?;
    health.set_store(true, store::ping_millis(&central)?);
    info!(
        database = %config.dedup.production.database_path.display(),
        "Central store ready"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut handles = Vec::new();

    // Lazy pools: a gatherer's file may not exist yet, and the sync loops
    // tolerate an unreachable store per cycle.
    let sources: Vec<(String, store::DbPool)> = config
        .dedup
        .gatherers
        .iter()
        .map(|source| {
            (
                source.id.clone(),
                store::connection::create_pool_lazy(&source.database_path, 2),
            )
        })
        .collect();

    for table in SyncTable::ALL {
        let params = table_params(&config, table);
        if params.parallel {
            for (gatherer_id, pool) in &sources {
                handles.push(tokio::spawn(run_table_sync(
                    central.clone(),
                    pool.clone(),
                    gatherer_id.clone(),
                    table,
                    params,
                    Arc::clone(&metrics),
                    Arc::clone(&health),
                    shutdown_rx.clone(),
                )));
            }
        } else {
            handles.push(tokio::spawn(run_table_sync_serial(
                central.clone(),
                sources.clone(),
                table,
                params,
                Arc::clone(&metrics),
                Arc::clone(&health),
                shutdown_rx.clone(),
            )));
        }
    }

    let signer = Arc::new(RequestSigner::from_key_file(
        &config.api.key_id,
        &config.api.private_key_path,
    )?);
    let rest = Arc::new(RestClient::new(
        &config.api,
        signer,
        config.market_registry.page_size,
    )?);
    handles.push(tokio::spawn(run_metadata_sync(
        central.clone(),
        rest,
        Duration::from_secs(config.dedup.api_sync_interval_secs),
        Arc::clone(&metrics),
        shutdown_rx.clone(),
    )));

    handles.push(tokio::spawn(health_refresher(
        central.clone(),
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
        gatherers = config.dedup.gatherers.len(),
        tables = SyncTable::ALL.len(),
        "Deduplicator running"
    );

    signal::ctrl_c().await?;
    info!("Shutdown signal received");

    let _ = shutdown_tx.send(true);
    join_with_deadline(handles, SHUTDOWN_DEADLINE).await;

    info!("Deduplicator stopped");
    Ok(())
}

fn table_params(config: &Config, table: SyncTable) -> TableSyncParams {
    match table {
        SyncTable::Trades => config.dedup.tables.trades,
        SyncTable::Deltas => config.dedup.tables.orderbook_deltas,
        SyncTable::Snapshots => config.dedup.tables.orderbook_snapshots,
        SyncTable::Tickers => config.dedup.tables.ticker_updates,
    }
}

async fn health_refresher(
    central: store::DbPool,
    health: Arc<HealthState>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(Duration::from_secs(10));
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.wait_for(|stop| *stop) => break,
        }

        match store::ping_millis(&central) {
            Ok(ping) => health.set_store(true, ping),
            Err(_) => health.set_store(false, 0.0),
        }
    }
}
