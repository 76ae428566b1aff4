//! SQLite persistence for the symbol snapshot, fetched price histories and
//! forecast bundles
//!
//! Every table holds JSON documents next to a unix-seconds timestamp, so a
//! restart can warm the in-memory cache and reuse a recent symbol universe
//! without touching the upstream provider.

use chrono::{DateTime, Utc};
use forecast_core::{ForecastBundle, ForecastError, Lookback, PriceSeries, Symbol, SymbolSet};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

/// Store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(String),
}

impl From<StoreError> for ForecastError {
    fn from(e: StoreError) -> Self {
        ForecastError::storage(e.to_string())
    }
}

/// SQLite-backed store shared by the cache and the registry
pub struct ForecastStore {
    conn: Mutex<Connection>,
}

impl ForecastStore {
    /// Open (or create) the database at `db_path`
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, StoreError> {
        let path = db_path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
            }
        }

        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;

        info!("Forecast store opened at {:?}", path);
        Ok(store)
    }

    /// In-memory database, for tests
    pub fn new_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS symbol_snapshots (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                data JSON NOT NULL,
                symbol_count INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS forecast_bundles (
                symbol TEXT PRIMARY KEY,
                data JSON NOT NULL,
                computed_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_forecast_bundles_computed
            ON forecast_bundles(computed_at);

            CREATE TABLE IF NOT EXISTS price_history (
                symbol TEXT NOT NULL,
                range TEXT NOT NULL,
                data JSON NOT NULL,
                bar_count INTEGER NOT NULL,
                fetched_at INTEGER NOT NULL,
                PRIMARY KEY (symbol, range)
            );
            "#,
        )?;
        Ok(())
    }

    // ========================================================================
    // Symbol snapshot
    // ========================================================================

    /// Replace the stored symbol snapshot
    pub fn save_symbol_set(
        &self,
        set: &SymbolSet,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let data = serde_json::to_string(set)?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO symbol_snapshots (id, data, symbol_count, updated_at)
             VALUES (1, ?1, ?2, ?3)",
            params![data, set.len() as i64, updated_at.timestamp()],
        )?;
        Ok(())
    }

    /// The stored symbol snapshot and when it was written
    pub fn load_symbol_set(&self) -> Result<Option<(SymbolSet, DateTime<Utc>)>, StoreError> {
        let conn = self.conn.lock();
        let row: Option<(String, i64)> = conn
            .query_row(
                "SELECT data, updated_at FROM symbol_snapshots WHERE id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            Some((data, updated_at)) => {
                let set: SymbolSet = serde_json::from_str(&data)?;
                let updated_at = DateTime::from_timestamp(updated_at, 0).unwrap_or_default();
                Ok(Some((set, updated_at)))
            }
            None => Ok(None),
        }
    }

    // ========================================================================
    // Price history
    // ========================================================================

    /// Insert or replace the history fetched for `series.symbol` over `lookback`
    pub fn save_history(
        &self,
        series: &PriceSeries,
        lookback: Lookback,
        fetched_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let data = serde_json::to_string(series)?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO price_history (symbol, range, data, bar_count, fetched_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                series.symbol.as_str(),
                lookback.as_range(),
                data,
                series.len() as i64,
                fetched_at.timestamp()
            ],
        )?;
        Ok(())
    }

    /// The stored history for `symbol` over `lookback` and when it was fetched
    pub fn load_history(
        &self,
        symbol: &Symbol,
        lookback: Lookback,
    ) -> Result<Option<(PriceSeries, DateTime<Utc>)>, StoreError> {
        let conn = self.conn.lock();
        let row: Option<(String, i64)> = conn
            .query_row(
                "SELECT data, fetched_at FROM price_history WHERE symbol = ?1 AND range = ?2",
                params![symbol.as_str(), lookback.as_range()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            Some((data, fetched_at)) => {
                let series: PriceSeries = serde_json::from_str(&data)?;
                let fetched_at = DateTime::from_timestamp(fetched_at, 0).unwrap_or_default();
                Ok(Some((series, fetched_at)))
            }
            None => Ok(None),
        }
    }

    // ========================================================================
    // Forecast bundles
    // ========================================================================

    /// Insert or replace the bundle stored for its symbol
    pub fn save_bundle(&self, bundle: &ForecastBundle) -> Result<(), StoreError> {
        let data = serde_json::to_string(bundle)?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO forecast_bundles (symbol, data, computed_at)
             VALUES (?1, ?2, ?3)",
            params![bundle.symbol.as_str(), data, bundle.computed_at.timestamp()],
        )?;
        Ok(())
    }

    /// Every stored bundle. Rows that no longer decode are skipped.
    pub fn load_bundles(&self) -> Result<Vec<ForecastBundle>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT symbol, data FROM forecast_bundles ORDER BY symbol")?;
        let rows = stmt.query_map([], |row| {
            let symbol: String = row.get(0)?;
            let data: String = row.get(1)?;
            Ok((symbol, data))
        })?;

        let mut bundles = Vec::new();
        for (symbol, data) in rows.flatten() {
            match serde_json::from_str::<ForecastBundle>(&data) {
                Ok(bundle) => bundles.push(bundle),
                Err(e) => warn!("Skipping undecodable bundle for {}: {}", symbol, e),
            }
        }
        Ok(bundles)
    }

    pub fn bundle_count(&self) -> Result<usize, StoreError> {
        let conn = self.conn.lock();
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM forecast_bundles", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
