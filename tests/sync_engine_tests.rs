//! End-to-end tests of the deduplicator's cursor-sync engine against real
//! SQLite stores.

use diesel::prelude::*;
use tempfile::TempDir;

use driftnet::store::connection::{create_pool, run_migrations, DbPool};
use driftnet::store::cursor::{advance_cursor, read_cursor};
use driftnet::store::model::TradeRow;
use driftnet::store::schema::{sync_cursors, trades};
use driftnet::store::timeseries::insert_trades;
use driftnet::store::TABLE_TRADES;
use driftnet::sync::{sync_once, SyncTable};

struct TestStores {
    _dir: TempDir,
    central: DbPool,
    gatherers: Vec<DbPool>,
}

fn stores(gatherer_count: usize) -> TestStores {
    let dir = TempDir::new().expect("temp dir");

    let central = create_pool(&dir.path().join("central.db"), 2).unwrap();
    run_migrations(&central).unwrap();

    let gatherers = (0..gatherer_count)
        .map(|n| {
            let pool = create_pool(&dir.path().join(format!("gatherer-{n}.db")), 2).unwrap();
            run_migrations(&pool).unwrap();
            pool
        })
        .collect();

    TestStores {
        _dir: dir,
        central,
        gatherers,
    }
}

fn trade_row(id: &str, received_at: i64) -> TradeRow {
    TradeRow {
        trade_id: id.to_string(),
        exchange_ts: received_at - 25,
        received_at,
        ticker: "MKT-A".to_string(),
        price: 52_000,
        size: 10,
        taker_side_yes: true,
    }
}

fn central_trade_count(central: &DbPool) -> i64 {
    let mut conn = central.get().unwrap();
    trades::table.count().get_result(&mut conn).unwrap()
}

#[test]
fn three_gatherers_dedup_to_one_copy() {
    let stores = stores(3);

    // All three gatherers captured the same ten trades; local inserts see no
    // conflicts because each store holds one copy.
    let rows: Vec<TradeRow> = (1..=10)
        .map(|n| trade_row(&format!("t{n}"), 1_000 + n))
        .collect();
    for pool in &stores.gatherers {
        let mut conn = pool.get().unwrap();
        let outcome = insert_trades(&mut conn, &rows).unwrap();
        assert_eq!(outcome.conflicts(), 0);
    }

    let mut total_conflicts = 0;
    for (n, pool) in stores.gatherers.iter().enumerate() {
        let mut gatherer_conn = pool.get().unwrap();
        let cycle = sync_once(
            &stores.central,
            &mut gatherer_conn,
            &format!("gatherer-{n}"),
            SyncTable::Trades,
            100,
        )
        .unwrap();
        assert_eq!(cycle.rows_read, 10);
        total_conflicts += cycle.conflicts;
    }

    // First gatherer inserted all ten; the other two were pure duplicates.
    assert_eq!(central_trade_count(&stores.central), 10);
    assert_eq!(total_conflicts, 20);
}

#[test]
fn cursor_advances_with_data_and_survives_rollback() {
    let stores = stores(1);
    let gatherer = &stores.gatherers[0];

    {
        let mut conn = gatherer.get().unwrap();
        insert_trades(
            &mut conn,
            &[trade_row("t1", 100), trade_row("t2", 200), trade_row("t3", 300)],
        )
        .unwrap();
    }

    // Simulated crash between insert and commit: the transaction rolls back,
    // leaving both the data and the cursor untouched.
    {
        let mut central_conn = stores.central.get().unwrap();
        let result = central_conn.transaction::<(), diesel::result::Error, _>(|conn| {
            diesel::insert_or_ignore_into(trades::table)
                .values(&trade_row("t1", 100))
                .execute(conn)?;
            Err(diesel::result::Error::RollbackTransaction)
        });
        assert!(result.is_err());
        assert_eq!(read_cursor(&mut central_conn, "gatherer-0", TABLE_TRADES).unwrap(), 0);
    }
    assert_eq!(central_trade_count(&stores.central), 0);

    // The next cycle re-reads the same batch and lands it exactly once.
    let mut gatherer_conn = gatherer.get().unwrap();
    let cycle = sync_once(
        &stores.central,
        &mut gatherer_conn,
        "gatherer-0",
        SyncTable::Trades,
        100,
    )
    .unwrap();
    assert_eq!(cycle.rows_read, 3);
    assert_eq!(cycle.inserted, 3);
    assert_eq!(cycle.cursor, 300);

    let mut central_conn = stores.central.get().unwrap();
    assert_eq!(
        read_cursor(&mut central_conn, "gatherer-0", TABLE_TRADES).unwrap(),
        300
    );
    assert_eq!(central_trade_count(&stores.central), 3);
}

#[test]
fn rerunning_from_an_older_cursor_is_idempotent() {
    let stores = stores(1);
    let gatherer = &stores.gatherers[0];

    {
        let mut conn = gatherer.get().unwrap();
        let rows: Vec<TradeRow> = (1..=5)
            .map(|n| trade_row(&format!("t{n}"), n * 100))
            .collect();
        insert_trades(&mut conn, &rows).unwrap();
    }

    let mut gatherer_conn = gatherer.get().unwrap();
    let first = sync_once(
        &stores.central,
        &mut gatherer_conn,
        "gatherer-0",
        SyncTable::Trades,
        100,
    )
    .unwrap();
    assert_eq!(first.inserted, 5);

    // Caught up: the next cycle reads nothing and leaves the cursor alone.
    let idle = sync_once(
        &stores.central,
        &mut gatherer_conn,
        "gatherer-0",
        SyncTable::Trades,
        100,
    )
    .unwrap();
    assert_eq!(idle.rows_read, 0);
    assert_eq!(idle.cursor, 500);

    // Winding the cursor back replays the batch; conflict-ignore absorbs it.
    {
        let mut central_conn = stores.central.get().unwrap();
        advance_cursor(&mut central_conn, "gatherer-0", TABLE_TRADES, 0).unwrap();
    }
    let replay = sync_once(
        &stores.central,
        &mut gatherer_conn,
        "gatherer-0",
        SyncTable::Trades,
        100,
    )
    .unwrap();
    assert_eq!(replay.rows_read, 5);
    assert_eq!(replay.inserted, 0);
    assert_eq!(replay.conflicts, 5);
    assert_eq!(central_trade_count(&stores.central), 5);
}

#[test]
fn batched_cursor_walk_reaches_head() {
    let stores = stores(1);
    let gatherer = &stores.gatherers[0];

    {
        let mut conn = gatherer.get().unwrap();
        let rows: Vec<TradeRow> = (1..=25)
            .map(|n| trade_row(&format!("t{n}"), n * 10))
            .collect();
        insert_trades(&mut conn, &rows).unwrap();
    }

    let mut gatherer_conn = gatherer.get().unwrap();
    let mut cycles = 0;
    loop {
        let cycle = sync_once(
            &stores.central,
            &mut gatherer_conn,
            "gatherer-0",
            SyncTable::Trades,
            10,
        )
        .unwrap();
        if cycle.rows_read == 0 {
            break;
        }
        cycles += 1;
        assert!(cycles <= 3, "should drain in ceil(25/10) cycles");
    }

    assert_eq!(central_trade_count(&stores.central), 25);

    // Cursor rows are keyed per (gatherer, table).
    let mut central_conn = stores.central.get().unwrap();
    let cursor_rows: i64 = sync_cursors::table
        .count()
        .get_result(&mut central_conn)
        .unwrap();
    assert_eq!(cursor_rows, 1);
    assert_eq!(
        read_cursor(&mut central_conn, "gatherer-0", TABLE_TRADES).unwrap(),
        250
    );
}
