//! Persisted station store.
//!
//! One SQLite file holds everything the process knows: station records,
//! price quotes, availability statuses and the per-region refresh cursors.
//! The refresh scheduler is the only writer; request handlers read
//! concurrently through the same pool. WAL journal mode means readers see
//! a consistent snapshot and are never blocked by an in-flight commit.
//!
//! Write rules, enforced here rather than trusted to callers:
//!
//! - a station row must exist before prices or statuses referencing it
//! - a write whose timestamp is older than the stored row's is discarded
//!   (freshest data wins regardless of arrival order)
//! - everything a region refresh produced is committed in one transaction

mod error;
mod read;
mod write;

pub use error::StoreError;
pub use read::{StationSnapshot, StoreStats};
pub use write::RegionCommit;

pub(crate) use read::cutoff;

use std::path::PathBuf;
use std::time::Duration;

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use tracing::info;

/// Schema bootstrap. Additive only: statements are safe to re-run against
/// an existing database, and readers name their columns so that columns
/// added by a later version never break an older reader.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS stations (
        pool_id TEXT PRIMARY KEY,
        latitude REAL NOT NULL,
        longitude REAL NOT NULL,
        cpo_id TEXT,
        charge_point_count INTEGER NOT NULL,
        charge_points_ac TEXT NOT NULL,
        charge_points_dc TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS prices (
        pool_id TEXT NOT NULL,
        power_type TEXT NOT NULL,
        power INTEGER NOT NULL,
        tariff_id TEXT NOT NULL,
        charge_point_id TEXT NOT NULL,
        currency TEXT NOT NULL,
        energy_price REAL NOT NULL,
        session_fee REAL NOT NULL,
        blocking_fee REAL,
        blocking_after_mins INTEGER,
        fetched_at TEXT NOT NULL,
        PRIMARY KEY (pool_id, power_type, power, tariff_id)
    )",
    "CREATE TABLE IF NOT EXISTS statuses (
        pool_id TEXT PRIMARY KEY,
        state TEXT NOT NULL,
        observed_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS refresh_cursors (
        region_key TEXT PRIMARY KEY,
        last_refreshed_at TEXT,
        refreshed_count INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS update_log (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        region_key TEXT NOT NULL,
        success INTEGER NOT NULL,
        error TEXT,
        duration_ms INTEGER,
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_stations_coords ON stations (latitude, longitude)",
    "CREATE INDEX IF NOT EXISTS idx_stations_updated ON stations (updated_at)",
    "CREATE INDEX IF NOT EXISTS idx_prices_pool ON prices (pool_id)",
    "CREATE INDEX IF NOT EXISTS idx_cursors_refreshed ON refresh_cursors (last_refreshed_at)",
];

/// Configuration for opening the store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Path of the database file. Created (with parent directories) on
    /// first run.
    pub path: PathBuf,
    /// Connection pool size. One writer plus a handful of readers is
    /// plenty for a single-process deployment.
    pub max_connections: u32,
}

impl StoreConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_connections: 8,
        }
    }

    pub fn with_max_connections(mut self, n: u32) -> Self {
        self.max_connections = n;
        self
    }
}

/// Handle to the persisted store.
///
/// Cheap to clone; clones share the connection pool. Created once at
/// process start and injected into the scheduler and the read API — the
/// store has no global instance.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if missing) the database file and bootstrap the
    /// schema. Failure here is fatal to the process: without the store
    /// there is nothing to serve.
    pub async fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| StoreError::Corrupt {
                    message: format!("cannot create database directory: {e}"),
                })?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(&config.path)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5))
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;

        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }

        info!(path = %config.path.display(), "station store opened");

        Ok(Self { pool })
    }

    /// The database file path is an operational detail; expose the pool
    /// only within the store module.
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Check the store answers queries (used by the health endpoint).
    pub async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

/// Open a store under a fresh temporary directory. Test helper.
#[cfg(test)]
pub(crate) async fn test_store() -> (tempfile::TempDir, Store) {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(&StoreConfig::new(dir.path().join("stations.db")))
        .await
        .unwrap();
    (dir, store)
}
