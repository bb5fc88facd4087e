//! Runs the stages in order against one date, with a run record per invocation.

use crate::config::PipelineConfig;
use crate::context::{Collaborators, RunContext};
use crate::error::PipelineError;
use crate::stages::{self, StageReport};
use crate::state::{PipelineState, PipelineStatus, StateStore};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use tickerfunnel_core::data::{probe, RequestTotals};
use tickerfunnel_core::domain::{Reachability, RunOutcome, RunStatus, Stage};
use tickerfunnel_core::store::Store;

/// Options for [`Orchestrator::run_all`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub date: NaiveDate,
    /// Re-run stages that already completed for the date.
    pub force: bool,
    /// Report state and pending work without fetching or writing.
    pub dry_run: bool,
}

impl RunOptions {
    pub fn for_date(date: NaiveDate) -> Self {
        Self {
            date,
            force: false,
            dry_run: false,
        }
    }
}

/// Pending work for one stage, as reported by a dry run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedStage {
    pub stage: Stage,
    pub completed: bool,
    pub pending: u64,
}

/// Result of one `run_all` invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Run record id; `None` for dry runs.
    pub run_id: Option<i64>,
    pub date: NaiveDate,
    pub reachability: Reachability,
    /// State read before any stage ran.
    pub initial_state: PipelineState,
    pub stages: Vec<StageReport>,
    pub skipped: Vec<Stage>,
    pub planned: Vec<PlannedStage>,
    pub stage_timings_ms: BTreeMap<String, u64>,
    pub requests: RequestTotals,
    pub artifact_hash: Option<String>,
}

pub struct Orchestrator<'a> {
    config: &'a PipelineConfig,
    store: &'a Store,
    collaborators: &'a Collaborators,
}

impl<'a> Orchestrator<'a> {
    pub fn new(config: &'a PipelineConfig, store: &'a Store, collaborators: &'a Collaborators) -> Self {
        Self {
            config,
            store,
            collaborators,
        }
    }

    pub fn state_store(&self) -> StateStore<'a> {
        StateStore::new(self.store, self.config.filter.price_filter())
    }

    /// TCP-probe the upstream hosts. Reporting only; never gates a stage.
    pub fn check_reachability(&self) -> Reachability {
        let metrics = self.collaborators.metrics.as_ref();
        let timeout = self.config.endpoints.probe_timeout();
        let mut reach = Reachability::default();
        for target in &self.collaborators.probes {
            let ok = probe(target, timeout, metrics);
            tracing::info!(service = %target.service, host = %target.host, reachable = ok, "probe");
            match target.service.as_str() {
                "nasdaq" => reach.listing = ok,
                _ => reach.market_data = ok,
            }
        }
        reach
    }

    /// Run a single stage outside a run record, marking its step failed on error.
    pub fn run_stage(&self, stage: Stage, date: NaiveDate, force: bool) -> Result<StageReport, PipelineError> {
        let ctx = RunContext::new(self.config, self.store, self.collaborators, date);
        let result = stages::run_stage(&ctx, stage, force);
        if let Err(e) = &result {
            self.record_step_failure(stage, date, e);
        }
        tracing::info!(requests = %self.collaborators.metrics.summary(), "request metrics");
        result.map_err(|e| e.in_stage(stage))
    }

    fn record_step_failure(&self, stage: Stage, date: NaiveDate, err: &PipelineError) {
        tracing::error!(stage = %stage, error = %err, "stage failed");
        if let Err(e) = self
            .store
            .fail_step(stage, date, &err.root_message(), Utc::now())
        {
            tracing::error!(stage = %stage, error = %e, "could not record failed step");
        }
    }

    /// Report state and pending counts without touching upstream or the store.
    fn plan(&self, ctx: &RunContext<'_>) -> Result<Vec<PlannedStage>, PipelineError> {
        Stage::ALL
            .into_iter()
            .map(|stage| {
                let completed = self.store.completed_step(stage, ctx.date)?.is_some();
                Ok(PlannedStage {
                    stage,
                    completed,
                    pending: stages::pending_count(ctx, stage)?,
                })
            })
            .collect()
    }

    /// Run every stage that has not completed for the date, in order.
    pub fn run_all(&self, options: RunOptions) -> Result<RunSummary, PipelineError> {
        let metrics = self.collaborators.metrics.as_ref();
        metrics.reset();

        let reachability = self.check_reachability();
        let initial_state = self.state_store().get_state(options.date)?;
        tracing::info!(
            date = %options.date,
            status = %initial_state.status,
            force = options.force,
            dry_run = options.dry_run,
            "pipeline state"
        );

        let mut summary = RunSummary {
            run_id: None,
            date: options.date,
            reachability,
            initial_state,
            stages: Vec::new(),
            skipped: Vec::new(),
            planned: Vec::new(),
            stage_timings_ms: BTreeMap::new(),
            requests: RequestTotals::default(),
            artifact_hash: None,
        };

        if options.dry_run {
            let ctx = RunContext::new(self.config, self.store, self.collaborators, options.date);
            summary.planned = self.plan(&ctx)?;
            for p in &summary.planned {
                tracing::info!(stage = %p.stage, completed = p.completed, pending = p.pending, "dry run");
            }
            return Ok(summary);
        }

        if summary.initial_state.status == PipelineStatus::Failed {
            tracing::warn!(
                stage = ?summary.initial_state.current_step,
                error = summary.initial_state.error_message.as_deref().unwrap_or(""),
                "previous attempt failed, restarting"
            );
        }

        let run_id = self.store.insert_run(options.date, Utc::now(), reachability)?;
        summary.run_id = Some(run_id);
        let ctx = RunContext::new(self.config, self.store, self.collaborators, options.date)
            .with_run_id(run_id);

        for stage in Stage::ALL {
            if !options.force && summary.initial_state.completed_steps.contains(&stage) {
                tracing::info!(stage = %stage, "already completed, skipping");
                summary.skipped.push(stage);
                continue;
            }

            tracing::info!(stage = %stage, description = stage.description(), "starting stage");
            let started = Instant::now();
            let result = stages::run_stage(&ctx, stage, options.force);
            summary
                .stage_timings_ms
                .insert(stage.step_name().to_string(), started.elapsed().as_millis() as u64);

            match result {
                Ok(report) => {
                    if report.artifact_hash.is_some() {
                        summary.artifact_hash = report.artifact_hash.clone();
                    }
                    summary.stages.push(report);
                }
                Err(e) => {
                    self.record_step_failure(stage, options.date, &e);
                    summary.requests = metrics.totals();
                    let outcome = RunOutcome {
                        failed_stage: Some(stage),
                        error_message: Some(e.root_message()),
                        stage_timings_ms: summary.stage_timings_ms.clone(),
                        total_requests: summary.requests.requests,
                        total_failures: summary.requests.failures,
                        total_bytes: summary.requests.bytes,
                        artifact_hash: summary.artifact_hash.clone(),
                    };
                    if let Err(store_err) =
                        self.store.finish_run(run_id, RunStatus::Failed, &outcome, Utc::now())
                    {
                        tracing::error!(run_id, error = %store_err, "could not finalize run");
                    }
                    tracing::info!(requests = %metrics.summary(), "request metrics");
                    return Err(e.in_stage(stage));
                }
            }
        }

        summary.requests = metrics.totals();
        let outcome = RunOutcome {
            failed_stage: None,
            error_message: None,
            stage_timings_ms: summary.stage_timings_ms.clone(),
            total_requests: summary.requests.requests,
            total_failures: summary.requests.failures,
            total_bytes: summary.requests.bytes,
            artifact_hash: summary.artifact_hash.clone(),
        };
        self.store
            .finish_run(run_id, RunStatus::Completed, &outcome, Utc::now())?;
        tracing::info!(
            run_id,
            ran = summary.stages.len(),
            skipped = summary.skipped.len(),
            requests = %metrics.summary(),
            "pipeline complete"
        );
        Ok(summary)
    }
}
