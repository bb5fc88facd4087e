//! SQLite persistence for the ticker universe, daily rows, scores and the
//! pipeline ledger.
//!
//! Every batch write runs in its own transaction so an interrupted stage loses
//! at most the batch in flight. Query methods are grouped by table in the
//! submodules, each adding an `impl Store` block.

mod daily_metrics;
mod reset;
mod runs;
mod schema;
mod scores;
mod steps;
mod sync_log;
mod tickers;

pub use daily_metrics::PriceFilter;
pub use reset::ResetSummary;
pub use schema::SCHEMA_VERSION;

use rusqlite::Connection;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("cannot create database directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid value in {column}: '{value}'")]
    InvalidValue { column: &'static str, value: String },

    #[error("pipeline run {0} is missing or already finalized")]
    RunNotActive(i64),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Handle to the pipeline database.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (creating if needed) the database at `path` and apply migrations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Fresh in-memory database, for tests and dry runs.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        let store = Self { conn };
        let applied = store.migrate()?;
        if applied > 0 {
            tracing::info!(applied, version = SCHEMA_VERSION, "database schema migrated");
        }
        Ok(store)
    }

    /// Open an existing database without creating it.
    ///
    /// Returns `Ok(None)` when no file exists at `path`.
    pub fn open_existing(path: impl AsRef<Path>) -> Result<Option<Self>, StoreError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Ok(None);
        }
        Self::open(path).map(Some)
    }
}

fn count(value: i64) -> u64 {
    value.max(0) as u64
}
