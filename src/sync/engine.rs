//! Per-(gatherer, table) cursor sync.
//!
//! Each loop reads its cursor from the central store, range-reads the
//! gatherer's rows past it, and commits the conflict-ignore insert together
//! with the cursor advance in one central transaction. A crash anywhere
//! repeats at most one batch, and the dedup-key primary keys absorb the
//! repeat.

use std::sync::Arc;
use std::time::Duration;

use diesel::prelude::*;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

use crate::config::TableSyncParams;
use crate::domain::now_micros;
use crate::error::{Error, Result};
use crate::monitor::{HealthState, Metrics};
use crate::store::model::{DeltaRow, SnapshotRow, TickerRow, TradeRow};
use crate::store::timeseries::{
    deltas_after, insert_deltas, insert_snapshots, insert_tickers, insert_trades, snapshots_after,
    tickers_after, trades_after,
};
use crate::store::{
    cursor, DbPool, InsertOutcome, TABLE_DELTAS, TABLE_SNAPSHOTS, TABLE_TICKERS, TABLE_TRADES,
};

/// The four time-series tables the deduplicator drains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTable {
    Trades,
    Deltas,
    Snapshots,
    Tickers,
}

impl SyncTable {
    pub const ALL: [Self; 4] = [Self::Trades, Self::Deltas, Self::Snapshots, Self::Tickers];

    pub fn name(self) -> &'static str {
        match self {
            Self::Trades => TABLE_TRADES,
            Self::Deltas => TABLE_DELTAS,
            Self::Snapshots => TABLE_SNAPSHOTS,
            Self::Tickers => TABLE_TICKERS,
        }
    }
}

/// Outcome of one sync cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncCycle {
    pub rows_read: usize,
    pub inserted: usize,
    pub conflicts: usize,
    /// Cursor after the cycle; unchanged when nothing was read.
    pub cursor: i64,
}

/// Run one cursor batch for (gatherer, table).
pub fn sync_once(
    central: &DbPool,
    gatherer_conn: &mut SqliteConnection,
    gatherer_id: &str,
    table: SyncTable,
    batch_size: i64,
) -> Result<SyncCycle> {
    match table {
        SyncTable::Trades => sync_rows(
            central,
            gatherer_conn,
            gatherer_id,
            table,
            batch_size,
            trades_after,
            insert_trades,
            |row: &TradeRow| row.received_at,
        ),
        SyncTable::Deltas => sync_rows(
            central,
            gatherer_conn,
            gatherer_id,
            table,
            batch_size,
            deltas_after,
            insert_deltas,
            |row: &DeltaRow| row.received_at,
        ),
        SyncTable::Snapshots => sync_rows(
            central,
            gatherer_conn,
            gatherer_id,
            table,
            batch_size,
            snapshots_after,
            insert_snapshots,
            |row: &SnapshotRow| row.received_at,
        ),
        SyncTable::Tickers => sync_rows(
            central,
            gatherer_conn,
            gatherer_id,
            table,
            batch_size,
            tickers_after,
            insert_tickers,
            |row: &TickerRow| row.received_at,
        ),
    }
}

#[allow(clippy::too_many_arguments)]
fn sync_rows<Row>(
    central: &DbPool,
    gatherer_conn: &mut SqliteConnection,
    gatherer_id: &str,
    table: SyncTable,
    batch_size: i64,
    read: impl Fn(&mut SqliteConnection, i64, i64) -> Result<Vec<Row>>,
    insert: impl Fn(&mut SqliteConnection, &[Row]) -> Result<InsertOutcome>,
    received_at: impl Fn(&Row) -> i64,
) -> Result<SyncCycle> {
    let mut central_conn = central.get().map_err(|e| Error::Pool(e.to_string()))?;
    let cursor_value = cursor::read_cursor(&mut central_conn, gatherer_id, table.name())?;

    let rows = read(gatherer_conn, cursor_value, batch_size)?;
    if rows.is_empty() {
        return Ok(SyncCycle {
            cursor: cursor_value,
            ..SyncCycle::default()
        });
    }

    let new_cursor = rows.iter().map(&received_at).max().unwrap_or(cursor_value);

    // Insert and cursor advance commit or roll back together.
    let outcome = central_conn.transaction::<InsertOutcome, Error, _>(|conn| {
        let outcome = insert(conn, &rows)?;
        cursor::advance_cursor(conn, gatherer_id, table.name(), new_cursor)?;
        Ok(outcome)
    })?;

    Ok(SyncCycle {
        rows_read: rows.len(),
        inserted: outcome.inserted,
        conflicts: outcome.conflicts(),
        cursor: new_cursor,
    })
}

/// Serial variant: one loop per table draining every gatherer in turn.
///
/// Used when a table's `parallel` flag is off, trading throughput for a
/// single writer into that central table.
#[allow(clippy::too_many_arguments)]
pub async fn run_table_sync_serial(
    central: DbPool,
    sources: Vec<(String, DbPool)>,
    table: SyncTable,
    params: TableSyncParams,
    metrics: Arc<Metrics>,
    health: Arc<HealthState>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(Duration::from_millis(params.poll_interval_ms.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.wait_for(|stop| *stop) => break,
        }

        for (gatherer_id, pool) in &sources {
            sync_tick(
                &central, pool, gatherer_id, table, params.batch_size, &metrics, &health,
            );
        }
    }

    debug!(table = table.name(), "Serial sync loop stopped");
}

/// Long-running sync loop for one (gatherer, table) pair.
#[allow(clippy::too_many_arguments)]
pub async fn run_table_sync(
    central: DbPool,
    gatherer_pool: DbPool,
    gatherer_id: String,
    table: SyncTable,
    params: TableSyncParams,
    metrics: Arc<Metrics>,
    health: Arc<HealthState>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(Duration::from_millis(params.poll_interval_ms.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.wait_for(|stop| *stop) => break,
        }

        sync_tick(
            &central,
            &gatherer_pool,
            &gatherer_id,
            table,
            params.batch_size,
            &metrics,
            &health,
        );
    }

    debug!(gatherer = %gatherer_id, table = table.name(), "Sync loop stopped");
}

/// One metered cycle: acquire the gatherer store, run the batch, publish
/// counters and lag.
fn sync_tick(
    central: &DbPool,
    gatherer_pool: &DbPool,
    gatherer_id: &str,
    table: SyncTable,
    batch_size: i64,
    metrics: &Metrics,
    health: &HealthState,
) {
    let labels = [gatherer_id, table.name()];

    // An unreachable gatherer only skips this cycle; the others keep
    // draining.
    let mut gatherer_conn = match gatherer_pool.get() {
        Ok(conn) => conn,
        Err(e) => {
            metrics
                .sync_gatherer_unreachable_total
                .with_label_values(&[gatherer_id])
                .inc();
            warn!(gatherer = %gatherer_id, error = %e, "Gatherer store unreachable");
            return;
        }
    };

    match sync_once(central, &mut gatherer_conn, gatherer_id, table, batch_size) {
        Ok(cycle) => {
            if cycle.rows_read > 0 {
                metrics
                    .sync_rows_read_total
                    .with_label_values(&labels)
                    .inc_by(cycle.rows_read as u64);
                metrics
                    .sync_rows_inserted_total
                    .with_label_values(&labels)
                    .inc_by(cycle.inserted as u64);
                metrics
                    .sync_conflicts_total
                    .with_label_values(&labels)
                    .inc_by(cycle.conflicts as u64);
            }
            let lag_us = if cycle.cursor > 0 {
                (now_micros() - cycle.cursor).max(0)
            } else {
                0
            };
            metrics
                .sync_lag_seconds
                .with_label_values(&labels)
                .set(lag_us / 1_000_000);
            health.set_sync_lag(gatherer_id, table.name(), lag_us);
        }
        Err(e) => {
            // Central-store failures roll the transaction back; the cursor
            // is untouched and the next tick re-reads the batch.
            metrics.sync_errors_total.with_label_values(&labels).inc();
            warn!(gatherer = %gatherer_id, table = table.name(), error = %e, "Sync cycle failed");
        }
    }
}
