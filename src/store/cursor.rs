//! Sync-cursor rows.
//!
//! A cursor is the high-watermark of `received_at` already merged into the
//! central store for one (gatherer, table) pair. The advance MUST run inside
//! the same transaction as the batch it covers: a crash then repeats at most
//! one batch, and conflict-ignore absorbs the repeats.

use diesel::prelude::*;

use super::model::CursorRow;
use super::schema::sync_cursors;
use crate::error::Result;

/// Read a cursor; a missing row reads as zero (sync from the beginning).
pub fn read_cursor(conn: &mut SqliteConnection, gatherer_id: &str, table: &str) -> Result<i64> {
    let row: Option<CursorRow> = sync_cursors::table
        .find((gatherer_id, table))
        .first(conn)
        .optional()?;
    Ok(row.map(|r| r.last_received_at_us).unwrap_or(0))
}

/// Upsert the cursor row. Callers invoke this inside the data transaction.
pub fn advance_cursor(
    conn: &mut SqliteConnection,
    gatherer_id: &str,
    table: &str,
    last_received_at_us: i64,
) -> Result<()> {
    let row = CursorRow {
        gatherer_id: gatherer_id.to_string(),
        table_name: table.to_string(),
        last_received_at_us,
    };
    diesel::replace_into(sync_cursors::table)
        .values(&row)
        .execute(conn)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::connection::{create_pool, run_migrations};
    use std::path::PathBuf;

    #[test]
    fn missing_cursor_reads_as_zero() {
        let pool = create_pool(&PathBuf::from(":memory:"), 1).unwrap();
        run_migrations(&pool).unwrap();
        let mut conn = pool.get().unwrap();

        assert_eq!(read_cursor(&mut conn, "gatherer-a", "trades").unwrap(), 0);
    }

    #[test]
    fn advance_and_read_round_trip() {
        let pool = create_pool(&PathBuf::from(":memory:"), 1).unwrap();
        run_migrations(&pool).unwrap();
        let mut conn = pool.get().unwrap();

        advance_cursor(&mut conn, "gatherer-a", "trades", 1_234).unwrap();
        assert_eq!(read_cursor(&mut conn, "gatherer-a", "trades").unwrap(), 1_234);

        // Cursors are scoped per (gatherer, table).
        assert_eq!(read_cursor(&mut conn, "gatherer-b", "trades").unwrap(), 0);
        assert_eq!(
            read_cursor(&mut conn, "gatherer-a", "orderbook_deltas").unwrap(),
            0
        );

        advance_cursor(&mut conn, "gatherer-a", "trades", 9_999).unwrap();
        assert_eq!(read_cursor(&mut conn, "gatherer-a", "trades").unwrap(), 9_999);
    }
}
