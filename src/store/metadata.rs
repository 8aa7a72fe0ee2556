//! Relational metadata upserts (markets, events, series).

use diesel::prelude::*;

use super::model::{EventRow, MarketRow, SeriesRow};
use super::schema::{events, markets, series};
use crate::error::Result;

/// Upsert markets into the central table; statuses arrive already mapped to
/// production values by the caller.
pub fn upsert_markets(conn: &mut SqliteConnection, rows: &[MarketRow]) -> Result<usize> {
    let mut written = 0;
    for row in rows {
        written += diesel::replace_into(markets::table)
            .values(row)
            .execute(conn)?;
    }
    Ok(written)
}

pub fn upsert_events(conn: &mut SqliteConnection, rows: &[EventRow]) -> Result<usize> {
    let mut written = 0;
    for row in rows {
        written += diesel::replace_into(events::table)
            .values(row)
            .execute(conn)?;
    }
    Ok(written)
}

pub fn upsert_series(conn: &mut SqliteConnection, row: &SeriesRow) -> Result<usize> {
    Ok(diesel::replace_into(series::table).values(row).execute(conn)?)
}

/// True when the series is already present (skips a REST fetch).
pub fn series_exists(conn: &mut SqliteConnection, series_ticker: &str) -> Result<bool> {
    let count: i64 = series::table
        .filter(series::series_ticker.eq(series_ticker))
        .count()
        .get_result(conn)?;
    Ok(count > 0)
}

/// Read one market's status, for tests and diagnostics.
pub fn market_status(conn: &mut SqliteConnection, ticker: &str) -> Result<Option<String>> {
    Ok(markets::table
        .find(ticker)
        .select(markets::market_status)
        .first(conn)
        .optional()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Market, MarketStatus, MarketType};
    use crate::store::connection::{create_pool, run_migrations};
    use crate::store::model::MarketRow;
    use std::path::PathBuf;

    fn market(ticker: &str, status: MarketStatus) -> Market {
        Market {
            ticker: ticker.into(),
            event_ticker: "EVT-1".into(),
            title: "Example market".into(),
            subtitle: String::new(),
            market_status: status,
            trading_status: "trading".into(),
            market_type: MarketType::Binary,
            result: String::new(),
            volume: 0,
            volume_24h: 0,
            open_interest: 0,
            liquidity: 0,
            open_time_us: 0,
            close_time_us: 0,
            expiration_time_us: 0,
            created_time_us: 0,
        }
    }

    #[test]
    fn upsert_maps_status_to_production_form() {
        let pool = create_pool(&PathBuf::from(":memory:"), 1).unwrap();
        run_migrations(&pool).unwrap();
        let mut conn = pool.get().unwrap();

        let row = MarketRow::from_market_production(&market("MKT-A", MarketStatus::Determined));
        upsert_markets(&mut conn, &[row]).unwrap();

        assert_eq!(
            market_status(&mut conn, "MKT-A").unwrap().as_deref(),
            Some("settled")
        );

        // A later sweep with a different status overwrites in place.
        let row = MarketRow::from_market_production(&market("MKT-A", MarketStatus::Active));
        upsert_markets(&mut conn, &[row]).unwrap();
        assert_eq!(
            market_status(&mut conn, "MKT-A").unwrap().as_deref(),
            Some("open")
        );
    }
}
