//! Explicit reset of one day's pipeline output.

use super::{Store, StoreError};
use chrono::NaiveDate;
use rusqlite::params;

/// Rows removed by [`Store::reset_date`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResetSummary {
    pub daily_metrics: usize,
    pub scores: usize,
    pub steps: usize,
    pub sync_markers: usize,
}

impl Store {
    /// Delete `date`'s daily rows, scores, step ledger and sync marker.
    ///
    /// The ticker universe, run history and generated artifacts are untouched.
    pub fn reset_date(&self, date: NaiveDate) -> Result<ResetSummary, StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        let summary = ResetSummary {
            daily_metrics: tx.execute("DELETE FROM daily_metrics WHERE date = ?1", params![date])?,
            scores: tx.execute("DELETE FROM strategy_scores WHERE date = ?1", params![date])?,
            steps: tx.execute("DELETE FROM pipeline_steps WHERE run_date = ?1", params![date])?,
            sync_markers: tx.execute("DELETE FROM sync_history WHERE sync_date = ?1", params![date])?,
        };
        tx.commit()?;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Quote, Stage, Ticker};
    use chrono::Utc;

    #[test]
    fn reset_only_touches_one_day() {
        let store = Store::open_in_memory().unwrap();
        let today = NaiveDate::from_ymd_opt(2024, 10, 17).unwrap();
        let yesterday = today.pred_opt().unwrap();
        store
            .insert_tickers(&[Ticker::new("AAPL", "Apple Inc.", "NASDAQ", yesterday)])
            .unwrap();
        let q = [Quote {
            symbol: "AAPL".into(),
            price: 150.0,
            volume: 1_000_000,
        }];
        store.upsert_quotes(today, &q).unwrap();
        store.upsert_quotes(yesterday, &q).unwrap();
        store.complete_step(Stage::Prices, today, 1, Utc::now()).unwrap();
        store.mark_synced(today, 1, Utc::now()).unwrap();

        let summary = store.reset_date(today).unwrap();
        assert_eq!(
            summary,
            ResetSummary {
                daily_metrics: 1,
                scores: 0,
                steps: 1,
                sync_markers: 1,
            }
        );
        assert_eq!(store.priced_count(today).unwrap(), 0);
        assert_eq!(store.priced_count(yesterday).unwrap(), 1);
        assert_eq!(store.ticker_count().unwrap(), 1);
    }
}
