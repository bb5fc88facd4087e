//! `ticker_sync_log` (per-symbol audit trail) and `sync_history`
//! (the once-per-day directory sync marker).

use super::{Store, StoreError};
use crate::domain::{Stage, TickerSyncRecord};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, OptionalExtension};

impl Store {
    /// Append one batch of fetch attempts.
    pub fn record_sync_attempts(
        &self,
        records: &[TickerSyncRecord],
        now: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO ticker_sync_log
                     (run_id, symbol, stage, batch, success, error_message, recorded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for r in records {
                stmt.execute(params![
                    r.run_id,
                    r.symbol,
                    r.stage.step_name(),
                    r.batch,
                    r.success,
                    r.error_message,
                    now
                ])?;
            }
        }
        tx.commit()?;
        Ok(records.len())
    }

    /// Audit trail for one run, in insertion order.
    pub fn sync_attempts(&self, run_id: i64) -> Result<Vec<TickerSyncRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT run_id, symbol, stage, batch, success, error_message
             FROM ticker_sync_log WHERE run_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![run_id], |r| {
                Ok((
                    r.get::<_, i64>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, u32>(3)?,
                    r.get::<_, bool>(4)?,
                    r.get::<_, Option<String>>(5)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(run_id, symbol, stage, batch, success, error_message)| {
                let stage = Stage::from_step_name(&stage).ok_or(StoreError::InvalidValue {
                    column: "ticker_sync_log.stage",
                    value: stage,
                })?;
                Ok(TickerSyncRecord {
                    run_id,
                    symbol,
                    stage,
                    batch,
                    success,
                    error_message,
                })
            })
            .collect()
    }

    /// Record that the directory was synced on `date`.
    pub fn mark_synced(
        &self,
        date: NaiveDate,
        tickers_synced: u64,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO sync_history (sync_date, tickers_synced, synced_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(sync_date) DO UPDATE SET
                 tickers_synced = excluded.tickers_synced,
                 synced_at = excluded.synced_at",
            params![date, tickers_synced as i64, now],
        )?;
        Ok(())
    }

    /// Tickers added by the sync on `date`, if one ran.
    pub fn synced_on(&self, date: NaiveDate) -> Result<Option<u64>, StoreError> {
        let n: Option<i64> = self
            .conn
            .query_row(
                "SELECT tickers_synced FROM sync_history WHERE sync_date = ?1",
                params![date],
                |r| r.get(0),
            )
            .optional()?;
        Ok(n.map(|n| n.max(0) as u64))
    }
}
