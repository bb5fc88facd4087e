//! Pipeline bookkeeping: stages, step ledger rows, run records.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The pipeline's ordered units of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stage {
    Sync,
    Prices,
    Fundamentals,
    Build,
}

impl Stage {
    /// All required stages, in execution order.
    pub const ALL: [Stage; 4] = [Stage::Sync, Stage::Prices, Stage::Fundamentals, Stage::Build];

    /// Name used as the `step_name` key of the step ledger.
    pub fn step_name(&self) -> &'static str {
        match self {
            Stage::Sync => "sync-directory",
            Stage::Prices => "extract-prices",
            Stage::Fundamentals => "extract-metadata",
            Stage::Build => "build",
        }
    }

    pub fn from_step_name(name: &str) -> Option<Self> {
        Stage::ALL.into_iter().find(|s| s.step_name() == name)
    }

    pub fn description(&self) -> &'static str {
        match self {
            Stage::Sync => "Sync ticker universe from the exchange directory",
            Stage::Prices => "Pass 1: extract price and volume",
            Stage::Fundamentals => "Pass 2: extract fundamentals for filtered tickers",
            Stage::Build => "Score tickers and build search assets",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.step_name())
    }
}

/// Status of one (stage, date) entry in the step ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepStatus {
    InProgress,
    Completed,
    Failed,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::InProgress => "in_progress",
            StepStatus::Completed => "completed",
            StepStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "in_progress" => Some(StepStatus::InProgress),
            "completed" => Some(StepStatus::Completed),
            "failed" => Some(StepStatus::Failed),
            _ => None,
        }
    }
}

/// A row of the step ledger, keyed by (stage, run_date).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineStep {
    pub stage: Stage,
    pub run_date: NaiveDate,
    pub status: StepStatus,
    pub tickers_processed: u64,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

/// Terminal state of one orchestrator invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(RunStatus::Running),
            "completed" => Some(RunStatus::Completed),
            "failed" => Some(RunStatus::Failed),
            _ => None,
        }
    }
}

/// Upstream reachability measured before any stage runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reachability {
    pub listing: bool,
    pub market_data: bool,
}

impl Reachability {
    pub fn all_reachable(&self) -> bool {
        self.listing && self.market_data
    }
}

/// One row of `pipeline_runs`. Inserted at start, updated once at termination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    pub id: i64,
    pub run_date: NaiveDate,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub reachability: Reachability,
    pub failed_stage: Option<Stage>,
    pub error_message: Option<String>,
    /// Wall-clock milliseconds per executed stage, keyed by step name.
    pub stage_timings_ms: BTreeMap<String, u64>,
    pub total_requests: u64,
    pub total_failures: u64,
    pub total_bytes: u64,
    pub artifact_hash: Option<String>,
}

/// Terminal update applied to a run record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOutcome {
    pub failed_stage: Option<Stage>,
    pub error_message: Option<String>,
    pub stage_timings_ms: BTreeMap<String, u64>,
    pub total_requests: u64,
    pub total_failures: u64,
    pub total_bytes: u64,
    pub artifact_hash: Option<String>,
}

/// One per-symbol fetch attempt within a run, for the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerSyncRecord {
    pub run_id: i64,
    pub symbol: String,
    pub stage: Stage,
    pub batch: u32,
    pub success: bool,
    pub error_message: Option<String>,
}

impl TickerSyncRecord {
    pub fn ok(run_id: i64, symbol: &str, stage: Stage, batch: u32) -> Self {
        Self {
            run_id,
            symbol: symbol.to_string(),
            stage,
            batch,
            success: true,
            error_message: None,
        }
    }

    pub fn failed(run_id: i64, symbol: &str, stage: Stage, batch: u32, error: impl Into<String>) -> Self {
        Self {
            run_id,
            symbol: symbol.to_string(),
            stage,
            batch,
            success: false,
            error_message: Some(error.into()),
        }
    }
}
