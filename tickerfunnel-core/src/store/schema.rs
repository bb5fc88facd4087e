//! Versioned schema migrations.

use super::{Store, StoreError};
use chrono::Utc;
use rusqlite::{params, OptionalExtension};

struct Migration {
    version: i64,
    description: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "universe, daily metrics, scores, pipeline ledger",
        sql: r#"
            CREATE TABLE IF NOT EXISTS tickers (
                symbol      TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                exchange    TEXT NOT NULL,
                is_etf      INTEGER NOT NULL DEFAULT 0,
                first_seen  TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS daily_metrics (
                symbol               TEXT NOT NULL,
                date                 TEXT NOT NULL,
                price                REAL,
                volume               INTEGER,
                market_cap           REAL,
                dividend_yield       REAL,
                beta                 REAL,
                rsi_14               REAL,
                ma_200               REAL,
                ma_50                REAL,
                pe_ratio             REAL,
                forward_pe           REAL,
                price_to_book        REAL,
                peg_ratio            REAL,
                enterprise_value     REAL,
                week_52_high         REAL,
                week_52_low          REAL,
                avg_volume_10day     INTEGER,
                short_ratio          REAL,
                short_percent_float  REAL,
                debt_to_equity       REAL,
                current_ratio        REAL,
                quick_ratio          REAL,
                profit_margin        REAL,
                operating_margin     REAL,
                return_on_equity     REAL,
                return_on_assets     REAL,
                revenue_growth       REAL,
                earnings_growth      REAL,
                target_mean_price    REAL,
                recommendation_mean  REAL,
                num_analyst_opinions INTEGER,
                shares_outstanding   INTEGER,
                float_shares         INTEGER,
                sector               TEXT,
                industry             TEXT,
                fundamentals_at      TEXT,
                PRIMARY KEY (symbol, date)
            );
            CREATE INDEX IF NOT EXISTS idx_daily_metrics_date ON daily_metrics(date);

            CREATE TABLE IF NOT EXISTS strategy_scores (
                symbol                TEXT NOT NULL,
                date                  TEXT NOT NULL,
                dividend_daddy_score  INTEGER NOT NULL,
                moon_shot_score       INTEGER NOT NULL,
                falling_knife_score   INTEGER NOT NULL,
                over_hyped_score      INTEGER NOT NULL,
                inst_whale_score      INTEGER NOT NULL,
                PRIMARY KEY (symbol, date)
            );

            CREATE TABLE IF NOT EXISTS pipeline_steps (
                step_name          TEXT NOT NULL,
                run_date           TEXT NOT NULL,
                status             TEXT NOT NULL,
                tickers_processed  INTEGER NOT NULL DEFAULT 0,
                started_at         TEXT NOT NULL,
                updated_at         TEXT NOT NULL,
                completed_at       TEXT,
                error_message      TEXT,
                PRIMARY KEY (step_name, run_date)
            );

            CREATE TABLE IF NOT EXISTS pipeline_runs (
                id                     INTEGER PRIMARY KEY AUTOINCREMENT,
                run_date               TEXT NOT NULL,
                started_at             TEXT NOT NULL,
                finished_at            TEXT,
                status                 TEXT NOT NULL,
                listing_reachable      INTEGER NOT NULL,
                market_data_reachable  INTEGER NOT NULL,
                failed_stage           TEXT,
                error_message          TEXT,
                stage_timings          TEXT NOT NULL DEFAULT '{}',
                total_requests         INTEGER NOT NULL DEFAULT 0,
                total_failures         INTEGER NOT NULL DEFAULT 0,
                total_bytes            INTEGER NOT NULL DEFAULT 0,
                artifact_hash          TEXT
            );

            CREATE TABLE IF NOT EXISTS sync_history (
                sync_date       TEXT PRIMARY KEY,
                tickers_synced  INTEGER NOT NULL,
                synced_at       TEXT NOT NULL
            );
        "#,
    },
    Migration {
        version: 2,
        description: "per-ticker fetch audit trail",
        sql: r#"
            CREATE TABLE IF NOT EXISTS ticker_sync_log (
                id             INTEGER PRIMARY KEY AUTOINCREMENT,
                run_id         INTEGER NOT NULL REFERENCES pipeline_runs(id),
                symbol         TEXT NOT NULL,
                stage          TEXT NOT NULL,
                batch          INTEGER NOT NULL,
                success        INTEGER NOT NULL,
                error_message  TEXT,
                recorded_at    TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_ticker_sync_log_run ON ticker_sync_log(run_id);
        "#,
    },
];

/// Latest schema version this build knows about.
pub const SCHEMA_VERSION: i64 = 2;

impl Store {
    /// Apply pending migrations in order. Returns how many were applied.
    pub(super) fn migrate(&self) -> Result<usize, StoreError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version      INTEGER PRIMARY KEY,
                description  TEXT NOT NULL,
                applied_at   TEXT NOT NULL
            );",
        )?;

        let current = self.schema_version()?;
        let mut applied = 0;
        for m in MIGRATIONS.iter().filter(|m| m.version > current) {
            let tx = self.conn.unchecked_transaction()?;
            tx.execute_batch(m.sql)?;
            tx.execute(
                "INSERT INTO schema_migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
                params![m.version, m.description, Utc::now()],
            )?;
            tx.commit()?;
            tracing::debug!(version = m.version, description = m.description, "applied migration");
            applied += 1;
        }
        Ok(applied)
    }

    /// Highest applied migration, 0 for an empty database.
    pub fn schema_version(&self) -> Result<i64, StoreError> {
        let version: Option<i64> = self
            .conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |r| r.get(0))
            .optional()?
            .flatten();
        Ok(version.unwrap_or(0))
    }
}
