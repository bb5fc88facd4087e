//! `pipeline_steps`: the resumability ledger.
//!
//! A stage is done for a date iff a `completed` row exists for it.

use super::{Store, StoreError};
use crate::domain::{PipelineStep, Stage, StepStatus};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, OptionalExtension, Row};

struct StepRow {
    step_name: String,
    run_date: NaiveDate,
    status: String,
    tickers_processed: i64,
    started_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    error_message: Option<String>,
}

const STEP_COLUMNS: &str = "step_name, run_date, status, tickers_processed, started_at, \
                            updated_at, completed_at, error_message";

impl StepRow {
    fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            step_name: r.get(0)?,
            run_date: r.get(1)?,
            status: r.get(2)?,
            tickers_processed: r.get(3)?,
            started_at: r.get(4)?,
            updated_at: r.get(5)?,
            completed_at: r.get(6)?,
            error_message: r.get(7)?,
        })
    }

    fn into_step(self) -> Result<PipelineStep, StoreError> {
        let stage = Stage::from_step_name(&self.step_name).ok_or_else(|| StoreError::InvalidValue {
            column: "pipeline_steps.step_name",
            value: self.step_name.clone(),
        })?;
        let status = StepStatus::parse(&self.status).ok_or_else(|| StoreError::InvalidValue {
            column: "pipeline_steps.status",
            value: self.status.clone(),
        })?;
        Ok(PipelineStep {
            stage,
            run_date: self.run_date,
            status,
            tickers_processed: self.tickers_processed.max(0) as u64,
            started_at: self.started_at,
            updated_at: self.updated_at,
            completed_at: self.completed_at,
            error_message: self.error_message,
        })
    }
}

impl Store {
    /// Mark a stage in progress with zero processed, restarting any prior row.
    pub fn start_step(
        &self,
        stage: Stage,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO pipeline_steps
                 (step_name, run_date, status, tickers_processed, started_at, updated_at)
             VALUES (?1, ?2, ?3, 0, ?4, ?4)
             ON CONFLICT(step_name, run_date) DO UPDATE SET
                 status = excluded.status,
                 tickers_processed = 0,
                 started_at = excluded.started_at,
                 updated_at = excluded.updated_at,
                 completed_at = NULL,
                 error_message = NULL",
            params![stage.step_name(), date, StepStatus::InProgress.as_str(), now],
        )?;
        Ok(())
    }

    /// Record progress at a batch boundary.
    pub fn update_step_progress(
        &self,
        stage: Stage,
        date: NaiveDate,
        processed: u64,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "UPDATE pipeline_steps SET tickers_processed = ?3, updated_at = ?4
             WHERE step_name = ?1 AND run_date = ?2",
            params![stage.step_name(), date, processed as i64, now],
        )?;
        Ok(())
    }

    /// Mark a stage completed with its final processed count.
    pub fn complete_step(
        &self,
        stage: Stage,
        date: NaiveDate,
        processed: u64,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO pipeline_steps
                 (step_name, run_date, status, tickers_processed, started_at, updated_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5, ?5)
             ON CONFLICT(step_name, run_date) DO UPDATE SET
                 status = excluded.status,
                 tickers_processed = excluded.tickers_processed,
                 updated_at = excluded.updated_at,
                 completed_at = excluded.completed_at,
                 error_message = NULL",
            params![
                stage.step_name(),
                date,
                StepStatus::Completed.as_str(),
                processed as i64,
                now
            ],
        )?;
        Ok(())
    }

    /// Mark a stage failed, keeping whatever progress it recorded.
    pub fn fail_step(
        &self,
        stage: Stage,
        date: NaiveDate,
        error: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO pipeline_steps
                 (step_name, run_date, status, tickers_processed, started_at, updated_at, error_message)
             VALUES (?1, ?2, ?3, 0, ?4, ?4, ?5)
             ON CONFLICT(step_name, run_date) DO UPDATE SET
                 status = excluded.status,
                 updated_at = excluded.updated_at,
                 completed_at = NULL,
                 error_message = excluded.error_message",
            params![stage.step_name(), date, StepStatus::Failed.as_str(), now, error],
        )?;
        Ok(())
    }

    pub fn get_step(&self, stage: Stage, date: NaiveDate) -> Result<Option<PipelineStep>, StoreError> {
        let row = self
            .conn
            .query_row(
                &format!(
                    "SELECT {STEP_COLUMNS} FROM pipeline_steps WHERE step_name = ?1 AND run_date = ?2"
                ),
                params![stage.step_name(), date],
                StepRow::from_row,
            )
            .optional()?;
        row.map(StepRow::into_step).transpose()
    }

    /// The step row for `stage` on `date`, only if it completed.
    pub fn completed_step(
        &self,
        stage: Stage,
        date: NaiveDate,
    ) -> Result<Option<PipelineStep>, StoreError> {
        Ok(self
            .get_step(stage, date)?
            .filter(|s| s.status == StepStatus::Completed))
    }

    /// All step rows for `date`, most recently updated first.
    pub fn steps_for_date(&self, date: NaiveDate) -> Result<Vec<PipelineStep>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {STEP_COLUMNS} FROM pipeline_steps WHERE run_date = ?1
             ORDER BY updated_at DESC, rowid DESC"
        ))?;
        let rows = stmt
            .query_map(params![date], StepRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(StepRow::into_step).collect()
    }

    /// Latest date on which every required stage completed.
    pub fn last_successful_date(&self) -> Result<Option<NaiveDate>, StoreError> {
        let placeholders = Stage::ALL
            .iter()
            .enumerate()
            .map(|(i, _)| format!("?{}", i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let names: Vec<&str> = Stage::ALL.iter().map(|s| s.step_name()).collect();
        let date = self
            .conn
            .query_row(
                &format!(
                    "SELECT run_date FROM pipeline_steps
                     WHERE status = 'completed' AND step_name IN ({placeholders})
                     GROUP BY run_date
                     HAVING COUNT(DISTINCT step_name) = {}
                     ORDER BY run_date DESC LIMIT 1",
                    Stage::ALL.len()
                ),
                rusqlite::params_from_iter(names),
                |r| r.get(0),
            )
            .optional()?;
        Ok(date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 10, 17).unwrap()
    }

    #[test]
    fn step_lifecycle() {
        let store = Store::open_in_memory().unwrap();
        let t0 = Utc::now();
        assert!(store.get_step(Stage::Prices, date()).unwrap().is_none());

        store.start_step(Stage::Prices, date(), t0).unwrap();
        let s = store.get_step(Stage::Prices, date()).unwrap().unwrap();
        assert_eq!(s.status, StepStatus::InProgress);
        assert_eq!(s.tickers_processed, 0);
        assert!(s.completed_at.is_none());

        store
            .update_step_progress(Stage::Prices, date(), 200, t0 + Duration::seconds(1))
            .unwrap();
        assert_eq!(store.get_step(Stage::Prices, date()).unwrap().unwrap().tickers_processed, 200);

        store
            .complete_step(Stage::Prices, date(), 250, t0 + Duration::seconds(2))
            .unwrap();
        let s = store.get_step(Stage::Prices, date()).unwrap().unwrap();
        assert_eq!(s.status, StepStatus::Completed);
        assert_eq!(s.tickers_processed, 250);
        assert!(s.completed_at.is_some());
        assert_eq!(s.started_at, t0);
    }

    #[test]
    fn fail_keeps_progress_and_restart_clears_error() {
        let store = Store::open_in_memory().unwrap();
        let t0 = Utc::now();
        store.start_step(Stage::Fundamentals, date(), t0).unwrap();
        store
            .update_step_progress(Stage::Fundamentals, date(), 50, t0)
            .unwrap();
        store
            .fail_step(Stage::Fundamentals, date(), "backoff limit exceeded", t0)
            .unwrap();

        let s = store.get_step(Stage::Fundamentals, date()).unwrap().unwrap();
        assert_eq!(s.status, StepStatus::Failed);
        assert_eq!(s.tickers_processed, 50);
        assert_eq!(s.error_message.as_deref(), Some("backoff limit exceeded"));

        store.start_step(Stage::Fundamentals, date(), t0).unwrap();
        let s = store.get_step(Stage::Fundamentals, date()).unwrap().unwrap();
        assert_eq!(s.status, StepStatus::InProgress);
        assert_eq!(s.error_message, None);
    }

    #[test]
    fn completed_step_ignores_open_rows() {
        let store = Store::open_in_memory().unwrap();
        let t0 = Utc::now();
        assert!(store.completed_step(Stage::Prices, date()).unwrap().is_none());

        store.start_step(Stage::Prices, date(), t0).unwrap();
        assert!(store.completed_step(Stage::Prices, date()).unwrap().is_none());

        store.complete_step(Stage::Prices, date(), 42, t0).unwrap();
        let done = store.completed_step(Stage::Prices, date()).unwrap().unwrap();
        assert_eq!(done.tickers_processed, 42);

        store
            .fail_step(Stage::Prices, date(), "limit", t0 + Duration::seconds(1))
            .unwrap();
        assert!(store.completed_step(Stage::Prices, date()).unwrap().is_none());
    }

    #[test]
    fn fail_without_prior_row_inserts_one() {
        let store = Store::open_in_memory().unwrap();
        store
            .fail_step(Stage::Sync, date(), "listing unparseable", Utc::now())
            .unwrap();
        let s = store.get_step(Stage::Sync, date()).unwrap().unwrap();
        assert_eq!(s.status, StepStatus::Failed);
        assert_eq!(s.tickers_processed, 0);
    }

    #[test]
    fn steps_ordered_by_recency() {
        let store = Store::open_in_memory().unwrap();
        let t0 = Utc::now();
        store.complete_step(Stage::Sync, date(), 10, t0).unwrap();
        store
            .start_step(Stage::Prices, date(), t0 + Duration::seconds(5))
            .unwrap();
        let steps = store.steps_for_date(date()).unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].stage, Stage::Prices);
        assert_eq!(steps[1].stage, Stage::Sync);
    }

    #[test]
    fn last_successful_date_requires_every_stage() {
        let store = Store::open_in_memory().unwrap();
        let now = Utc::now();
        let earlier = date() - Duration::days(1);
        for stage in Stage::ALL {
            store.complete_step(stage, earlier, 1, now).unwrap();
        }
        for stage in &Stage::ALL[..3] {
            store.complete_step(*stage, date(), 1, now).unwrap();
        }
        assert_eq!(store.last_successful_date().unwrap(), Some(earlier));

        store.complete_step(Stage::Build, date(), 1, now).unwrap();
        assert_eq!(store.last_successful_date().unwrap(), Some(date()));
    }
}
