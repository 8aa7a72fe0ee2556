//! Database connection management using Diesel ORM.
//!
//! Provides connection pooling, migration support, and SQLite pragmas for
//! the gatherer-local and central databases.

use std::path::Path;

use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool};
use diesel::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use crate::error::{Error, Result};

/// Embedded database migrations compiled from the migrations/ directory.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Type alias for a SQLite connection pool.
pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;

#[derive(Debug, Clone, Copy)]
struct SqlitePragmas;

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for SqlitePragmas {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> std::result::Result<(), diesel::r2d2::Error> {
        // WAL keeps readers (the deduplicator) from blocking writer batches.
        diesel::sql_query("PRAGMA journal_mode=WAL")
            .execute(conn)
            .map_err(diesel::r2d2::Error::QueryError)?;
        diesel::sql_query("PRAGMA busy_timeout=5000")
            .execute(conn)
            .map_err(diesel::r2d2::Error::QueryError)?;
        diesel::sql_query("PRAGMA synchronous=NORMAL")
            .execute(conn)
            .map_err(diesel::r2d2::Error::QueryError)?;
        Ok(())
    }
}

/// Create a connection pool for the given database path.
pub fn create_pool(database_path: &Path, pool_size: u32) -> Result<DbPool> {
    let url = database_path.to_string_lossy();
    let manager = ConnectionManager::<SqliteConnection>::new(url.as_ref());
    Pool::builder()
        .max_size(pool_size)
        .connection_customizer(Box::new(SqlitePragmas))
        .build(manager)
        .map_err(|e| Error::Pool(e.to_string()))
}

/// Create a pool without probing a connection up front.
///
/// Used for gatherer stores on the deduplicator: the file may not exist yet
/// when the deduplicator starts, and the sync loops tolerate (and count)
/// unreachable stores per cycle.
pub fn create_pool_lazy(database_path: &Path, pool_size: u32) -> DbPool {
    let url = database_path.to_string_lossy();
    let manager = ConnectionManager::<SqliteConnection>::new(url.as_ref());
    Pool::builder()
        .max_size(pool_size)
        .connection_customizer(Box::new(SqlitePragmas))
        .build_unchecked(manager)
}

/// Run all pending database migrations.
pub fn run_migrations(pool: &DbPool) -> Result<()> {
    let mut conn = pool.get().map_err(|e| Error::Pool(e.to_string()))?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| Error::Pool(e.to_string()))?;
    Ok(())
}

/// Round-trip latency of a trivial query, for the health snapshot.
pub fn ping_millis(pool: &DbPool) -> Result<f64> {
    let mut conn = pool.get().map_err(|e| Error::Pool(e.to_string()))?;
    let start = std::time::Instant::now();
    diesel::sql_query("SELECT 1").execute(&mut conn)?;
    Ok(start.elapsed().as_secs_f64() * 1_000.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn create_pool_with_memory_db() {
        let pool = create_pool(&PathBuf::from(":memory:"), 1);
        assert!(pool.is_ok());
    }

    #[test]
    fn run_migrations_creates_tables() {
        let pool = create_pool(&PathBuf::from(":memory:"), 1).unwrap();
        run_migrations(&pool).unwrap();

        let mut conn = pool.get().unwrap();
        diesel::sql_query("SELECT trade_id FROM trades LIMIT 1")
            .execute(&mut conn)
            .expect("trades table exists");
    }
}
