//! Time-series inserts and cursor-scoped range reads.
//!
//! All bulk inserts use `INSERT OR IGNORE` against the table's dedup-key
//! primary key, so re-delivery and cross-gatherer duplicates are absorbed
//! silently; the insert count tells the caller how many rows were new.

use diesel::prelude::*;

use super::model::{DeltaRow, SnapshotRow, TickerRow, TradeRow};
use super::schema::{orderbook_deltas, orderbook_snapshots, ticker_updates, trades};
use crate::error::Result;

/// Rows per INSERT statement, kept under SQLite's bind-variable cap.
const INSERT_CHUNK: usize = 2_000;

/// Outcome of one bulk insert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertOutcome {
    pub attempted: usize,
    pub inserted: usize,
}

impl InsertOutcome {
    /// Rows skipped by conflict-ignore.
    pub fn conflicts(self) -> usize {
        self.attempted - self.inserted
    }
}

pub fn insert_trades(conn: &mut SqliteConnection, rows: &[TradeRow]) -> Result<InsertOutcome> {
    let mut inserted = 0;
    for chunk in rows.chunks(INSERT_CHUNK) {
        inserted += diesel::insert_or_ignore_into(trades::table)
            .values(chunk)
            .execute(conn)?;
    }
    Ok(InsertOutcome {
        attempted: rows.len(),
        inserted,
    })
}

pub fn insert_deltas(conn: &mut SqliteConnection, rows: &[DeltaRow]) -> Result<InsertOutcome> {
    let mut inserted = 0;
    for chunk in rows.chunks(INSERT_CHUNK) {
        inserted += diesel::insert_or_ignore_into(orderbook_deltas::table)
            .values(chunk)
            .execute(conn)?;
    }
    Ok(InsertOutcome {
        attempted: rows.len(),
        inserted,
    })
}

pub fn insert_snapshots(conn: &mut SqliteConnection, rows: &[SnapshotRow]) -> Result<InsertOutcome> {
    let mut inserted = 0;
    for chunk in rows.chunks(INSERT_CHUNK) {
        inserted += diesel::insert_or_ignore_into(orderbook_snapshots::table)
            .values(chunk)
            .execute(conn)?;
    }
    Ok(InsertOutcome {
        attempted: rows.len(),
        inserted,
    })
}

pub fn insert_tickers(conn: &mut SqliteConnection, rows: &[TickerRow]) -> Result<InsertOutcome> {
    let mut inserted = 0;
    for chunk in rows.chunks(INSERT_CHUNK) {
        inserted += diesel::insert_or_ignore_into(ticker_updates::table)
            .values(chunk)
            .execute(conn)?;
    }
    Ok(InsertOutcome {
        attempted: rows.len(),
        inserted,
    })
}

/// Rows with `received_at` strictly after the cursor, oldest first.
pub fn trades_after(
    conn: &mut SqliteConnection,
    cursor_us: i64,
    limit: i64,
) -> Result<Vec<TradeRow>> {
    Ok(trades::table
        .filter(trades::received_at.gt(cursor_us))
        .order(trades::received_at.asc())
        .limit(limit)
        .load(conn)?)
}

pub fn deltas_after(
    conn: &mut SqliteConnection,
    cursor_us: i64,
    limit: i64,
) -> Result<Vec<DeltaRow>> {
    Ok(orderbook_deltas::table
        .filter(orderbook_deltas::received_at.gt(cursor_us))
        .order(orderbook_deltas::received_at.asc())
        .limit(limit)
        .load(conn)?)
}

pub fn snapshots_after(
    conn: &mut SqliteConnection,
    cursor_us: i64,
    limit: i64,
) -> Result<Vec<SnapshotRow>> {
    Ok(orderbook_snapshots::table
        .filter(orderbook_snapshots::received_at.gt(cursor_us))
        .order(orderbook_snapshots::received_at.asc())
        .limit(limit)
        .load(conn)?)
}

pub fn tickers_after(
    conn: &mut SqliteConnection,
    cursor_us: i64,
    limit: i64,
) -> Result<Vec<TickerRow>> {
    Ok(ticker_updates::table
        .filter(ticker_updates::received_at.gt(cursor_us))
        .order(ticker_updates::received_at.asc())
        .limit(limit)
        .load(conn)?)
}

/// True when the failure is a schema/constraint problem rather than a
/// transient one; such batches are dropped, not retried.
pub fn is_constraint_error(error: &crate::error::Error) -> bool {
    matches!(
        error,
        crate::error::Error::Database(diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::NotNullViolation
                | diesel::result::DatabaseErrorKind::CheckViolation
                | diesel::result::DatabaseErrorKind::ForeignKeyViolation
                | diesel::result::DatabaseErrorKind::UniqueViolation,
            _,
        ))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::connection::{create_pool, run_migrations};
    use std::path::PathBuf;

    fn memory_pool() -> crate::store::connection::DbPool {
        let pool = create_pool(&PathBuf::from(":memory:"), 1).unwrap();
        run_migrations(&pool).unwrap();
        pool
    }

    fn trade_row(id: &str, received_at: i64) -> TradeRow {
        TradeRow {
            trade_id: id.to_string(),
            exchange_ts: received_at - 50,
            received_at,
            ticker: "MKT-A".to_string(),
            price: 52_000,
            size: 10,
            taker_side_yes: true,
        }
    }

    #[test]
    fn conflict_ignore_counts_duplicates() {
        let pool = memory_pool();
        let mut conn = pool.get().unwrap();

        let rows = vec![trade_row("t1", 100), trade_row("t2", 200)];
        let first = insert_trades(&mut conn, &rows).unwrap();
        assert_eq!(first.inserted, 2);
        assert_eq!(first.conflicts(), 0);

        let second = insert_trades(&mut conn, &rows).unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.conflicts(), 2);
    }

    #[test]
    fn range_read_is_exclusive_and_ordered() {
        let pool = memory_pool();
        let mut conn = pool.get().unwrap();

        let rows = vec![
            trade_row("t1", 300),
            trade_row("t2", 100),
            trade_row("t3", 200),
        ];
        insert_trades(&mut conn, &rows).unwrap();

        let after = trades_after(&mut conn, 100, 10).unwrap();
        let ids: Vec<_> = after.iter().map(|r| r.trade_id.as_str()).collect();
        assert_eq!(ids, vec!["t3", "t1"]);

        let limited = trades_after(&mut conn, 0, 2).unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].trade_id, "t2");
    }

    #[test]
    fn delta_dedup_key_ignores_seq() {
        let pool = memory_pool();
        let mut conn = pool.get().unwrap();

        let base = DeltaRow {
            ticker: "MKT-A".to_string(),
            exchange_ts: 1_000,
            price: 52_000,
            side_yes: true,
            received_at: 1_100,
            size_delta: 5,
            seq: 7,
        };
        // Same logical delta observed by another gatherer with another seq.
        let mut other = base.clone();
        other.seq = 99;
        other.received_at = 1_150;

        assert_eq!(insert_deltas(&mut conn, &[base]).unwrap().inserted, 1);
        let outcome = insert_deltas(&mut conn, &[other]).unwrap();
        assert_eq!(outcome.inserted, 0);
        assert_eq!(outcome.conflicts(), 1);
    }
}
