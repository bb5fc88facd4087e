//! Pipeline state derived from the step ledger.
//!
//! Nothing here is cached: every answer is recomputed from the persisted step
//! rows, which is what lets `run-all` be re-invoked blindly after a crash.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use tickerfunnel_core::domain::{PipelineStep, Stage, StepStatus};
use tickerfunnel_core::store::{PriceFilter, Store, StoreError};

/// Overall status of one date's pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    Idle,
    InProgress,
    Failed,
    Completed,
    Partial,
}

impl PipelineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStatus::Idle => "idle",
            PipelineStatus::InProgress => "in_progress",
            PipelineStatus::Failed => "failed",
            PipelineStatus::Completed => "completed",
            PipelineStatus::Partial => "partial",
        }
    }

    pub fn recommendation(&self) -> Recommendation {
        match self {
            PipelineStatus::Idle => Recommendation::Run,
            PipelineStatus::InProgress | PipelineStatus::Partial => Recommendation::Resume,
            PipelineStatus::Failed => Recommendation::Restart,
            PipelineStatus::Completed => Recommendation::Nothing,
        }
    }
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the operator should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Run,
    Resume,
    /// The last attempt failed; re-running is the operator's acknowledgement.
    Restart,
    Nothing,
}

/// Processed vs. expected items for a running stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub current: u64,
    pub total: u64,
}

impl Progress {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.current as f64 / self.total as f64 * 100.0).min(100.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    pub date: NaiveDate,
    pub status: PipelineStatus,
    /// The in-progress or failed stage, if any.
    pub current_step: Option<Stage>,
    pub progress: Option<Progress>,
    /// Completed stages, in pipeline order.
    pub completed_steps: Vec<Stage>,
    pub error_message: Option<String>,
    pub recommendation: Recommendation,
}

/// Single stage to run next, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextStep {
    pub stage: Option<Stage>,
    pub reason: String,
}

/// Read-only view over the step ledger.
pub struct StateStore<'a> {
    store: &'a Store,
    filter: PriceFilter,
}

impl<'a> StateStore<'a> {
    pub fn new(store: &'a Store, filter: PriceFilter) -> Self {
        Self { store, filter }
    }

    /// Items a stage is expected to process for `date`.
    pub fn expected_total(&self, stage: Stage, date: NaiveDate) -> Result<u64, StoreError> {
        match stage {
            Stage::Sync => self.store.ticker_count(),
            Stage::Prices => self.store.non_etf_count(),
            Stage::Fundamentals => self.store.filtered_count(date, &self.filter),
            Stage::Build => self.store.enriched_count(date, &self.filter),
        }
    }

    pub fn get_state(&self, date: NaiveDate) -> Result<PipelineState, StoreError> {
        let steps = self.store.steps_for_date(date)?;

        let completed_steps: Vec<Stage> = Stage::ALL
            .into_iter()
            .filter(|stage| {
                steps
                    .iter()
                    .any(|s| s.stage == *stage && s.status == StepStatus::Completed)
            })
            .collect();

        let mut state = PipelineState {
            date,
            status: PipelineStatus::Idle,
            current_step: None,
            progress: None,
            completed_steps,
            error_message: None,
            recommendation: Recommendation::Run,
        };

        if steps.is_empty() {
            return Ok(state);
        }

        // Rows are most-recent first
        let open = steps.iter().find(|s| s.status != StepStatus::Completed);
        state.status = match open {
            _ if state.completed_steps.len() == Stage::ALL.len() => PipelineStatus::Completed,
            Some(step) if step.status == StepStatus::InProgress => {
                state.current_step = Some(step.stage);
                state.progress = Some(Progress {
                    current: step.tickers_processed,
                    total: self.expected_total(step.stage, date)?,
                });
                PipelineStatus::InProgress
            }
            Some(step) => {
                state.current_step = Some(step.stage);
                state.error_message = step.error_message.clone();
                PipelineStatus::Failed
            }
            None => PipelineStatus::Partial,
        };
        state.recommendation = state.status.recommendation();
        Ok(state)
    }

    /// Latest date on which all required stages completed.
    pub fn last_successful_run(&self) -> Result<Option<NaiveDate>, StoreError> {
        self.store.last_successful_date()
    }

    pub fn step_summary(&self, stage: Stage, date: NaiveDate) -> Result<Option<PipelineStep>, StoreError> {
        self.store.get_step(stage, date)
    }

    pub fn recommend_next_step(&self, date: NaiveDate) -> Result<NextStep, StoreError> {
        let state = self.get_state(date)?;
        let next = match (state.status, state.current_step) {
            (PipelineStatus::Completed, _) => NextStep {
                stage: None,
                reason: format!("pipeline complete for {date}"),
            },
            (PipelineStatus::Failed, Some(stage)) => NextStep {
                stage: Some(stage),
                reason: format!(
                    "{stage} failed: {}",
                    state.error_message.as_deref().unwrap_or("unknown error")
                ),
            },
            (PipelineStatus::InProgress, Some(stage)) => NextStep {
                stage: Some(stage),
                reason: format!("{stage} was interrupted"),
            },
            _ => {
                let stage = Stage::ALL
                    .into_iter()
                    .find(|s| !state.completed_steps.contains(s));
                NextStep {
                    stage,
                    reason: match stage {
                        Some(s) => format!("{s} has not completed: {}", s.description()),
                        None => format!("pipeline complete for {date}"),
                    },
                }
            }
        };
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use tickerfunnel_core::domain::{Quote, Ticker};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 10, 17).unwrap()
    }

    fn store() -> Store {
        Store::open_in_memory().unwrap()
    }

    #[test]
    fn idle_without_rows() {
        let store = store();
        let state = StateStore::new(&store, PriceFilter::default())
            .get_state(date())
            .unwrap();
        assert_eq!(state.status, PipelineStatus::Idle);
        assert_eq!(state.recommendation, Recommendation::Run);
        assert!(state.completed_steps.is_empty());
    }

    #[test]
    fn in_progress_reports_progress_against_expected_total() {
        let store = store();
        let tickers: Vec<Ticker> = ["AAA", "BBB", "CCC", "DDD"]
            .iter()
            .map(|s| Ticker::new(*s, format!("{s} Corp"), "NYSE", date()))
            .collect();
        store.insert_tickers(&tickers).unwrap();
        let now = Utc::now();
        store.complete_step(Stage::Sync, date(), 4, now).unwrap();
        store
            .start_step(Stage::Prices, date(), now + Duration::seconds(1))
            .unwrap();
        store
            .update_step_progress(Stage::Prices, date(), 2, now + Duration::seconds(2))
            .unwrap();

        let state = StateStore::new(&store, PriceFilter::default())
            .get_state(date())
            .unwrap();
        assert_eq!(state.status, PipelineStatus::InProgress);
        assert_eq!(state.current_step, Some(Stage::Prices));
        assert_eq!(state.progress, Some(Progress { current: 2, total: 4 }));
        assert_eq!(state.completed_steps, vec![Stage::Sync]);
        assert_eq!(state.recommendation, Recommendation::Resume);
    }

    #[test]
    fn failed_requires_restart() {
        let store = store();
        let now = Utc::now();
        store.complete_step(Stage::Sync, date(), 10, now).unwrap();
        store.complete_step(Stage::Prices, date(), 10, now).unwrap();
        store
            .fail_step(
                Stage::Fundamentals,
                date(),
                "backoff limit exceeded",
                now + Duration::seconds(1),
            )
            .unwrap();

        let states = StateStore::new(&store, PriceFilter::default());
        let state = states.get_state(date()).unwrap();
        assert_eq!(state.status, PipelineStatus::Failed);
        assert_eq!(state.current_step, Some(Stage::Fundamentals));
        assert_eq!(state.recommendation, Recommendation::Restart);
        assert_eq!(state.error_message.as_deref(), Some("backoff limit exceeded"));

        let next = states.recommend_next_step(date()).unwrap();
        assert_eq!(next.stage, Some(Stage::Fundamentals));
        assert!(next.reason.contains("backoff limit exceeded"));
    }

    #[test]
    fn partial_between_stages() {
        let store = store();
        let now = Utc::now();
        store.complete_step(Stage::Sync, date(), 10, now).unwrap();
        store.complete_step(Stage::Prices, date(), 10, now).unwrap();

        let states = StateStore::new(&store, PriceFilter::default());
        let state = states.get_state(date()).unwrap();
        assert_eq!(state.status, PipelineStatus::Partial);
        assert_eq!(state.recommendation, Recommendation::Resume);
        assert_eq!(
            states.recommend_next_step(date()).unwrap().stage,
            Some(Stage::Fundamentals)
        );
    }

    #[test]
    fn completed_when_every_stage_done() {
        let store = store();
        let now = Utc::now();
        for stage in Stage::ALL {
            store.complete_step(stage, date(), 1, now).unwrap();
        }
        let states = StateStore::new(&store, PriceFilter::default());
        let state = states.get_state(date()).unwrap();
        assert_eq!(state.status, PipelineStatus::Completed);
        assert_eq!(state.recommendation, Recommendation::Nothing);
        assert_eq!(states.recommend_next_step(date()).unwrap().stage, None);
        assert_eq!(states.last_successful_run().unwrap(), Some(date()));
    }

    #[test]
    fn expected_totals_follow_the_funnel() {
        let store = store();
        store
            .insert_tickers(&[
                Ticker::new("AAPL", "Apple Inc.", "NASDAQ", date()),
                Ticker::new("PENNY", "Penny Corp", "NASDAQ", date()),
            ])
            .unwrap();
        store
            .upsert_quotes(
                date(),
                &[
                    Quote {
                        symbol: "AAPL".into(),
                        price: 150.0,
                        volume: 50_000_000,
                    },
                    Quote {
                        symbol: "PENNY".into(),
                        price: 2.0,
                        volume: 10_000_000,
                    },
                ],
            )
            .unwrap();

        let states = StateStore::new(&store, PriceFilter::default());
        assert_eq!(states.expected_total(Stage::Sync, date()).unwrap(), 2);
        assert_eq!(states.expected_total(Stage::Prices, date()).unwrap(), 2);
        assert_eq!(states.expected_total(Stage::Fundamentals, date()).unwrap(), 1);
        assert_eq!(states.expected_total(Stage::Build, date()).unwrap(), 0);
    }
}
