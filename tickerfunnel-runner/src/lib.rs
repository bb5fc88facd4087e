//! TickerFunnel Runner — stage runners, pipeline state, orchestration, configuration.
//!
//! This crate builds on `tickerfunnel-core` to provide:
//! - TOML pipeline configuration with defaults and validation
//! - Per-run context (store, collaborators, backoff tracker)
//! - The four stage runners: directory sync, prices, fundamentals, build
//! - Pipeline state derived from the step ledger
//! - The orchestrator that sequences stages under a run record

pub mod config;
pub mod context;
pub mod error;
pub mod orchestrator;
pub mod stages;
pub mod state;

pub use config::{ConfigError, PipelineConfig};
pub use context::{Collaborators, RunContext};
pub use error::PipelineError;
pub use orchestrator::{Orchestrator, PlannedStage, RunOptions, RunSummary};
pub use stages::{run_stage, StageReport};
pub use state::{NextStep, PipelineState, PipelineStatus, Progress, Recommendation, StateStore};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn config_is_send_sync() {
        assert_send::<PipelineConfig>();
        assert_sync::<PipelineConfig>();
    }

    #[test]
    fn reports_are_send_sync() {
        assert_send::<StageReport>();
        assert_sync::<StageReport>();
        assert_send::<RunSummary>();
        assert_sync::<RunSummary>();
        assert_send::<PipelineState>();
        assert_sync::<PipelineState>();
    }

    #[test]
    fn collaborators_are_send_sync() {
        assert_send::<Collaborators>();
        assert_sync::<Collaborators>();
    }

    #[test]
    fn pipeline_error_is_send_sync() {
        assert_send::<PipelineError>();
        assert_sync::<PipelineError>();
    }
}
