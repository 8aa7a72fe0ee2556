//! Batched store writers.
//!
//! One writer per sink. A batch flushes when it reaches `batch_size` or when
//! `flush_interval` has elapsed since its first record, whichever comes
//! first. Inserts are conflict-ignore on the dedup key; transient store
//! errors retry inside the flush, constraint errors drop the batch (an
//! operator problem, not a retryable one).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::config::WriterParams;
use crate::domain::{BookSnapshot, TickerUpdate, Trade};
use crate::error::Result;
use crate::monitor::Metrics;
use crate::router::DeltaEnvelope;
use crate::store::model::{DeltaRow, SnapshotRow, TickerRow, TradeRow};
use crate::store::timeseries::{
    insert_deltas, insert_snapshots, insert_tickers, insert_trades, is_constraint_error,
};
use crate::store::{DbPool, InsertOutcome};

/// In-flush retry schedule for transient store errors.
const FLUSH_RETRIES: u32 = 3;
const FLUSH_RETRY_BASE: Duration = Duration::from_millis(100);

pub async fn run_trade_writer(
    pool: DbPool,
    mut rx: mpsc::Receiver<Trade>,
    params: WriterParams,
    metrics: Arc<Metrics>,
    shutdown: watch::Receiver<bool>,
) {
    run_batched(
        "trade",
        &mut rx,
        params,
        &metrics,
        shutdown,
        |trade: &Trade| TradeRow::from(trade),
        |rows| flush_with_retry(&pool, rows, insert_trades),
    )
    .await;
}

pub async fn run_delta_writer(
    pool: DbPool,
    mut rx: mpsc::Receiver<DeltaEnvelope>,
    params: WriterParams,
    metrics: Arc<Metrics>,
    shutdown: watch::Receiver<bool>,
) {
    run_batched(
        "orderbook",
        &mut rx,
        params,
        &metrics,
        shutdown,
        |envelope: &DeltaEnvelope| DeltaRow::from(&envelope.delta),
        |rows| flush_with_retry(&pool, rows, insert_deltas),
    )
    .await;
}

pub async fn run_ticker_writer(
    pool: DbPool,
    mut rx: mpsc::Receiver<TickerUpdate>,
    params: WriterParams,
    metrics: Arc<Metrics>,
    shutdown: watch::Receiver<bool>,
) {
    run_batched(
        "ticker",
        &mut rx,
        params,
        &metrics,
        shutdown,
        |update: &TickerUpdate| TickerRow::from(update),
        |rows| flush_with_retry(&pool, rows, insert_tickers),
    )
    .await;
}

/// Snapshot rows are large (JSON book levels) and arrive at low rate, so
/// this writer is synchronous: one row per insert, no batching.
pub async fn run_snapshot_writer(
    pool: DbPool,
    mut rx: mpsc::Receiver<BookSnapshot>,
    metrics: Arc<Metrics>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let snapshot = tokio::select! {
            snapshot = rx.recv() => snapshot,
            _ = shutdown.wait_for(|stop| *stop) => break,
        };
        let Some(snapshot) = snapshot else { break };

        metrics
            .writer_received_total
            .with_label_values(&["snapshot"])
            .inc();

        let row = match SnapshotRow::from_domain(&snapshot) {
            Ok(row) => row,
            Err(e) => {
                metrics
                    .writer_errors_total
                    .with_label_values(&["snapshot"])
                    .inc();
                warn!(error = %e, "Snapshot encode failed");
                continue;
            }
        };

        match flush_with_retry(&pool, vec![row], insert_snapshots) {
            Ok(outcome) => {
                metrics
                    .writer_inserted_total
                    .with_label_values(&["snapshot"])
                    .inc_by(outcome.inserted as u64);
                metrics
                    .writer_conflicts_total
                    .with_label_values(&["snapshot"])
                    .inc_by(outcome.conflicts() as u64);
            }
            Err(e) => {
                metrics
                    .writer_errors_total
                    .with_label_values(&["snapshot"])
                    .inc();
                error!(error = %e, "Snapshot insert failed");
            }
        }
    }

    // Drain whatever arrived before the channel closed.
    while let Ok(snapshot) = rx.try_recv() {
        if let Ok(row) = SnapshotRow::from_domain(&snapshot) {
            let _ = flush_with_retry(&pool, vec![row], insert_snapshots);
        }
    }

    debug!("Snapshot writer stopped");
}

/// Shared batch loop: accumulate, flush on size or age, drain on shutdown.
async fn run_batched<T, Row>(
    name: &'static str,
    rx: &mut mpsc::Receiver<T>,
    params: WriterParams,
    metrics: &Metrics,
    mut shutdown: watch::Receiver<bool>,
    to_row: impl Fn(&T) -> Row,
    mut flush: impl FnMut(Vec<Row>) -> Result<InsertOutcome>,
) {
    let flush_interval = Duration::from_millis(params.flush_interval_ms.max(1));
    let mut batch: Vec<Row> = Vec::with_capacity(params.batch_size);
    // Armed when the batch holds its first record.
    let mut batch_deadline: Option<Instant> = None;

    loop {
        let deadline = batch_deadline.unwrap_or_else(|| Instant::now() + flush_interval);

        tokio::select! {
            item = rx.recv() => {
                let Some(item) = item else { break };
                metrics.writer_received_total.with_label_values(&[name]).inc();
                if batch.is_empty() {
                    batch_deadline = Some(Instant::now() + flush_interval);
                }
                batch.push(to_row(&item));
                if batch.len() >= params.batch_size {
                    flush_batch(name, &mut batch, &mut batch_deadline, metrics, &mut flush);
                }
            }
            () = tokio::time::sleep_until(deadline), if batch_deadline.is_some() => {
                flush_batch(name, &mut batch, &mut batch_deadline, metrics, &mut flush);
            }
            _ = shutdown.wait_for(|stop| *stop) => break,
        }
    }

    // Shutdown drain: accept what's already queued, then flush the remainder.
    while let Ok(item) = rx.try_recv() {
        metrics.writer_received_total.with_label_values(&[name]).inc();
        batch.push(to_row(&item));
    }
    if !batch.is_empty() {
        flush_batch(name, &mut batch, &mut batch_deadline, metrics, &mut flush);
    }

    debug!(writer = name, "Writer stopped");
}

fn flush_batch<Row>(
    name: &'static str,
    batch: &mut Vec<Row>,
    batch_deadline: &mut Option<Instant>,
    metrics: &Metrics,
    flush: &mut impl FnMut(Vec<Row>) -> Result<InsertOutcome>,
) {
    *batch_deadline = None;
    if batch.is_empty() {
        return;
    }

    let rows = std::mem::take(batch);
    let size = rows.len();
    let start = std::time::Instant::now();

    match flush(rows) {
        Ok(outcome) => {
            metrics
                .writer_inserted_total
                .with_label_values(&[name])
                .inc_by(outcome.inserted as u64);
            metrics
                .writer_conflicts_total
                .with_label_values(&[name])
                .inc_by(outcome.conflicts() as u64);
            metrics
                .writer_batch_size
                .with_label_values(&[name])
                .observe(size as f64);
            metrics
                .writer_flush_duration_seconds
                .with_label_values(&[name])
                .observe(start.elapsed().as_secs_f64());
        }
        Err(e) => {
            metrics.writer_errors_total.with_label_values(&[name]).inc();
            error!(writer = name, rows = size, error = %e, "Batch dropped");
        }
    }
}

/// Run one insert with bounded retries on transient errors. Constraint
/// errors surface immediately so the caller drops the batch.
fn flush_with_retry<Row>(
    pool: &DbPool,
    rows: Vec<Row>,
    insert: impl Fn(&mut diesel::SqliteConnection, &[Row]) -> Result<InsertOutcome>,
) -> Result<InsertOutcome> {
    let mut attempt = 0;
    loop {
        let result = pool
            .get()
            .map_err(|e| crate::error::Error::Pool(e.to_string()))
            .and_then(|mut conn| insert(&mut conn, &rows));

        match result {
            Ok(outcome) => return Ok(outcome),
            Err(e) if is_constraint_error(&e) => return Err(e),
            Err(e) if attempt < FLUSH_RETRIES => {
                attempt += 1;
                warn!(attempt, error = %e, "Flush retry");
                std::thread::sleep(FLUSH_RETRY_BASE * 2u32.saturating_pow(attempt - 1));
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Price, Ticker};
    use crate::store::connection::{create_pool, run_migrations};
    use crate::store::schema::trades;
    use diesel::prelude::*;
    use std::path::PathBuf;
    use uuid::Uuid;

    fn trade(n: u128, received_at: i64) -> Trade {
        Trade {
            trade_id: Uuid::from_u128(n),
            exchange_ts: received_at - 10,
            received_at,
            ticker: Ticker::new("MKT-A"),
            price: Price::from_cents(52),
            size: 5,
            taker_side_yes: true,
        }
    }

    fn test_pool() -> DbPool {
        let pool = create_pool(&PathBuf::from(":memory:"), 1).unwrap();
        run_migrations(&pool).unwrap();
        pool
    }

    fn count_trades(pool: &DbPool) -> i64 {
        let mut conn = pool.get().unwrap();
        trades::table.count().get_result(&mut conn).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn flushes_when_batch_size_reached() {
        let pool = test_pool();
        let metrics = Arc::new(Metrics::new().unwrap());
        let (tx, rx) = mpsc::channel(16);
        let (_stop_tx, stop_rx) = watch::channel(false);

        let params = WriterParams {
            batch_size: 3,
            flush_interval_ms: 60_000,
        };
        let writer = tokio::spawn(run_trade_writer(
            pool.clone(),
            rx,
            params,
            Arc::clone(&metrics),
            stop_rx,
        ));

        for n in 0..3 {
            tx.send(trade(n, 100 + n as i64)).await.unwrap();
        }
        tokio::task::yield_now().await;
        drop(tx);
        writer.await.unwrap();

        assert_eq!(count_trades(&pool), 3);
        assert_eq!(
            metrics
                .writer_inserted_total
                .with_label_values(&["trade"])
                .get(),
            3
        );
    }

    #[tokio::test(start_paused = true)]
    async fn flushes_on_interval_before_batch_fills() {
        let pool = test_pool();
        let metrics = Arc::new(Metrics::new().unwrap());
        let (tx, rx) = mpsc::channel(16);
        let (_stop_tx, stop_rx) = watch::channel(false);

        let params = WriterParams {
            batch_size: 1_000,
            flush_interval_ms: 250,
        };
        let writer = tokio::spawn(run_trade_writer(
            pool.clone(),
            rx,
            params,
            Arc::clone(&metrics),
            stop_rx,
        ));

        tx.send(trade(1, 100)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        tokio::task::yield_now().await;

        assert_eq!(count_trades(&pool), 1);

        drop(tx);
        writer.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_records_count_as_conflicts() {
        let pool = test_pool();
        let metrics = Arc::new(Metrics::new().unwrap());
        let (tx, rx) = mpsc::channel(16);
        let (_stop_tx, stop_rx) = watch::channel(false);

        let params = WriterParams {
            batch_size: 2,
            flush_interval_ms: 60_000,
        };
        let writer = tokio::spawn(run_trade_writer(
            pool.clone(),
            rx,
            params,
            Arc::clone(&metrics),
            stop_rx,
        ));

        // Same trade delivered twice (doubled global connections).
        tx.send(trade(7, 100)).await.unwrap();
        tx.send(trade(7, 101)).await.unwrap();
        tokio::task::yield_now().await;
        drop(tx);
        writer.await.unwrap();

        assert_eq!(count_trades(&pool), 1);
        assert_eq!(
            metrics
                .writer_conflicts_total
                .with_label_values(&["trade"])
                .get(),
            1
        );
    }
}
