//! `pipeline_runs`: one row per orchestrator invocation.

use super::{Store, StoreError};
use crate::domain::{PipelineRun, Reachability, RunOutcome, RunStatus, Stage};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, OptionalExtension, Row};
use std::collections::BTreeMap;

const RUN_COLUMNS: &str = "id, run_date, started_at, finished_at, status, listing_reachable, \
                           market_data_reachable, failed_stage, error_message, stage_timings, \
                           total_requests, total_failures, total_bytes, artifact_hash";

struct RunRow {
    id: i64,
    run_date: NaiveDate,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    status: String,
    listing_reachable: bool,
    market_data_reachable: bool,
    failed_stage: Option<String>,
    error_message: Option<String>,
    stage_timings: String,
    total_requests: i64,
    total_failures: i64,
    total_bytes: i64,
    artifact_hash: Option<String>,
}

impl RunRow {
    fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: r.get(0)?,
            run_date: r.get(1)?,
            started_at: r.get(2)?,
            finished_at: r.get(3)?,
            status: r.get(4)?,
            listing_reachable: r.get(5)?,
            market_data_reachable: r.get(6)?,
            failed_stage: r.get(7)?,
            error_message: r.get(8)?,
            stage_timings: r.get(9)?,
            total_requests: r.get(10)?,
            total_failures: r.get(11)?,
            total_bytes: r.get(12)?,
            artifact_hash: r.get(13)?,
        })
    }

    fn into_run(self) -> Result<PipelineRun, StoreError> {
        let status = RunStatus::parse(&self.status).ok_or_else(|| StoreError::InvalidValue {
            column: "pipeline_runs.status",
            value: self.status.clone(),
        })?;
        let failed_stage = match self.failed_stage {
            Some(name) => Some(Stage::from_step_name(&name).ok_or(StoreError::InvalidValue {
                column: "pipeline_runs.failed_stage",
                value: name,
            })?),
            None => None,
        };
        let stage_timings_ms: BTreeMap<String, u64> = serde_json::from_str(&self.stage_timings)?;

        Ok(PipelineRun {
            id: self.id,
            run_date: self.run_date,
            started_at: self.started_at,
            finished_at: self.finished_at,
            status,
            reachability: Reachability {
                listing: self.listing_reachable,
                market_data: self.market_data_reachable,
            },
            failed_stage,
            error_message: self.error_message,
            stage_timings_ms,
            total_requests: self.total_requests.max(0) as u64,
            total_failures: self.total_failures.max(0) as u64,
            total_bytes: self.total_bytes.max(0) as u64,
            artifact_hash: self.artifact_hash,
        })
    }
}

impl Store {
    /// Open a run record in `running` state. Returns its id.
    pub fn insert_run(
        &self,
        run_date: NaiveDate,
        started_at: DateTime<Utc>,
        reachability: Reachability,
    ) -> Result<i64, StoreError> {
        self.conn.execute(
            "INSERT INTO pipeline_runs
                 (run_date, started_at, status, listing_reachable, market_data_reachable)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                run_date,
                started_at,
                RunStatus::Running.as_str(),
                reachability.listing,
                reachability.market_data
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Apply the single terminal update to a running run record.
    pub fn finish_run(
        &self,
        id: i64,
        status: RunStatus,
        outcome: &RunOutcome,
        finished_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let timings = serde_json::to_string(&outcome.stage_timings_ms)?;
        let updated = self.conn.execute(
            "UPDATE pipeline_runs SET
                 status = ?2, finished_at = ?3, failed_stage = ?4, error_message = ?5,
                 stage_timings = ?6, total_requests = ?7, total_failures = ?8,
                 total_bytes = ?9, artifact_hash = ?10
             WHERE id = ?1 AND status = 'running'",
            params![
                id,
                status.as_str(),
                finished_at,
                outcome.failed_stage.map(|s| s.step_name()),
                outcome.error_message,
                timings,
                outcome.total_requests as i64,
                outcome.total_failures as i64,
                outcome.total_bytes as i64,
                outcome.artifact_hash
            ],
        )?;
        if updated == 0 {
            return Err(StoreError::RunNotActive(id));
        }
        Ok(())
    }

    pub fn get_run(&self, id: i64) -> Result<Option<PipelineRun>, StoreError> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {RUN_COLUMNS} FROM pipeline_runs WHERE id = ?1"),
                params![id],
                RunRow::from_row,
            )
            .optional()?;
        row.map(RunRow::into_run).transpose()
    }

    pub fn latest_run(&self) -> Result<Option<PipelineRun>, StoreError> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {RUN_COLUMNS} FROM pipeline_runs ORDER BY id DESC LIMIT 1"),
                [],
                RunRow::from_row,
            )
            .optional()?;
        row.map(RunRow::into_run).transpose()
    }
}
