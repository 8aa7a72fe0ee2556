//! Sync-engine coverage for the delta, snapshot, and ticker tables, plus
//! cross-table cursor independence.

use diesel::prelude::*;
use tempfile::TempDir;

use driftnet::domain::{BookSnapshot, Price, PriceLevel, SnapshotSource, Ticker};
use driftnet::store::connection::{create_pool, run_migrations, DbPool};
use driftnet::store::cursor::read_cursor;
use driftnet::store::model::{DeltaRow, SnapshotRow, TickerRow};
use driftnet::store::schema::{orderbook_deltas, orderbook_snapshots, ticker_updates};
use driftnet::store::timeseries::{insert_deltas, insert_snapshots, insert_tickers};
use driftnet::store::{TABLE_DELTAS, TABLE_TICKERS};
use driftnet::sync::{sync_once, SyncTable};

fn pair() -> (TempDir, DbPool, DbPool) {
    let dir = TempDir::new().expect("temp dir");
    let central = create_pool(&dir.path().join("central.db"), 2).unwrap();
    run_migrations(&central).unwrap();
    let gatherer = create_pool(&dir.path().join("gatherer.db"), 2).unwrap();
    run_migrations(&gatherer).unwrap();
    (dir, central, gatherer)
}

fn delta_row(ticker: &str, exchange_ts: i64, price: i64, side_yes: bool, seq: i64) -> DeltaRow {
    DeltaRow {
        ticker: ticker.to_string(),
        exchange_ts,
        price,
        side_yes,
        received_at: exchange_ts + 50,
        size_delta: 10,
        seq,
    }
}

#[test]
fn delta_sync_collapses_same_logical_delta_from_two_gatherers() {
    let dir = TempDir::new().expect("temp dir");
    let central = create_pool(&dir.path().join("central.db"), 2).unwrap();
    run_migrations(&central).unwrap();

    for (n, seq_base) in [(0, 100), (1, 900)] {
        let pool = create_pool(&dir.path().join(format!("g{n}.db")), 2).unwrap();
        run_migrations(&pool).unwrap();
        {
            let mut conn = pool.get().unwrap();
            // Same three logical deltas; per-subscription sequences differ.
            let rows = vec![
                delta_row("MKT-A", 1_000, 52_000, true, seq_base),
                delta_row("MKT-A", 1_000, 52_000, false, seq_base + 1),
                delta_row("MKT-A", 2_000, 51_000, true, seq_base + 2),
            ];
            insert_deltas(&mut conn, &rows).unwrap();
        }

        let mut conn = pool.get().unwrap();
        sync_once(&central, &mut conn, &format!("g{n}"), SyncTable::Deltas, 100).unwrap();
    }

    let mut conn = central.get().unwrap();
    let count: i64 = orderbook_deltas::table.count().get_result(&mut conn).unwrap();
    assert_eq!(count, 3);

    // Both gatherers have their own cursor rows for the same table.
    assert!(read_cursor(&mut conn, "g0", TABLE_DELTAS).unwrap() > 0);
    assert!(read_cursor(&mut conn, "g1", TABLE_DELTAS).unwrap() > 0);
}

#[test]
fn snapshot_sync_moves_rows_intact() {
    let (_dir, central, gatherer) = pair();

    let ws = BookSnapshot::from_levels(
        5_000,
        Some(4_900),
        Ticker::new("MKT-A"),
        SnapshotSource::Ws,
        vec![PriceLevel::new(Price::from_cents(40), 100)],
        vec![],
        vec![PriceLevel::new(Price::from_cents(55), 50)],
        vec![],
    );
    // Same instant from the REST poller: distinct source, no collision.
    let rest = BookSnapshot {
        source: SnapshotSource::Rest,
        ..ws.clone()
    };

    {
        let mut conn = gatherer.get().unwrap();
        let rows = vec![
            SnapshotRow::from_domain(&ws).unwrap(),
            SnapshotRow::from_domain(&rest).unwrap(),
        ];
        insert_snapshots(&mut conn, &rows).unwrap();
    }

    let mut gatherer_conn = gatherer.get().unwrap();
    let cycle = sync_once(
        &central,
        &mut gatherer_conn,
        "g0",
        SyncTable::Snapshots,
        100,
    )
    .unwrap();
    assert_eq!(cycle.inserted, 2);

    let mut conn = central.get().unwrap();
    let rows: Vec<SnapshotRow> = orderbook_snapshots::table.load(&mut conn).unwrap();
    assert_eq!(rows.len(), 2);
    for row in rows {
        let snapshot = row.into_domain().unwrap();
        assert_eq!(snapshot.best_yes_ask, Some(Price::from_cents(45)));
        assert_eq!(snapshot.spread, 5_000);
    }
}

#[test]
fn cursors_are_independent_across_tables() {
    let (_dir, central, gatherer) = pair();

    {
        let mut conn = gatherer.get().unwrap();
        insert_deltas(&mut conn, &[delta_row("MKT-A", 1_000, 52_000, true, 1)]).unwrap();
        insert_tickers(
            &mut conn,
            &[TickerRow {
                ticker: "MKT-A".to_string(),
                exchange_ts: 9_000,
                received_at: 9_050,
                yes_bid: 40_000,
                yes_ask: 45_000,
                last_price: 42_000,
                volume: 1_000,
                open_interest: 500,
            }],
        )
        .unwrap();
    }

    let mut gatherer_conn = gatherer.get().unwrap();
    sync_once(&central, &mut gatherer_conn, "g0", SyncTable::Deltas, 100).unwrap();

    let mut conn = central.get().unwrap();
    assert_eq!(read_cursor(&mut conn, "g0", TABLE_DELTAS).unwrap(), 1_050);
    // The ticker table hasn't synced yet; its cursor is untouched.
    assert_eq!(read_cursor(&mut conn, "g0", TABLE_TICKERS).unwrap(), 0);

    sync_once(&central, &mut gatherer_conn, "g0", SyncTable::Tickers, 100).unwrap();
    assert_eq!(read_cursor(&mut conn, "g0", TABLE_TICKERS).unwrap(), 9_050);

    let tickers: i64 = ticker_updates::table.count().get_result(&mut conn).unwrap();
    assert_eq!(tickers, 1);
}

#[test]
fn empty_gatherer_leaves_cursor_at_zero() {
    let (_dir, central, gatherer) = pair();

    let mut gatherer_conn = gatherer.get().unwrap();
    let cycle = sync_once(&central, &mut gatherer_conn, "g0", SyncTable::Trades, 100).unwrap();
    assert_eq!(cycle.rows_read, 0);
    assert_eq!(cycle.cursor, 0);

    let mut conn = central.get().unwrap();
    assert_eq!(read_cursor(&mut conn, "g0", "trades").unwrap(), 0);
}
