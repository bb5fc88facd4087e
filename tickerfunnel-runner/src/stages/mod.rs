//! Stage runners.
//!
//! Every stage follows the same shape: compute the pending set from rows that
//! lack the stage's output, mark the step in progress, work through the
//! pending set in fixed-size batches (one transaction each), record progress
//! at each batch boundary and mark the step completed at the end. Once a
//! completed row exists the stage is a no-op unless forced. A
//! [`BackoffLimitExceeded`](tickerfunnel_core::data::BackoffLimitExceeded)
//! escapes as an error and leaves the step in progress.

pub mod build;
pub mod fundamentals;
pub mod prices;
pub mod sync;

use crate::context::RunContext;
use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use tickerfunnel_core::domain::Stage;

/// What one stage invocation did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: Stage,
    /// Final processed count written to the step ledger.
    pub processed: u64,
    /// Items fetched or written by this invocation.
    pub written: u64,
    /// Pending items skipped after a non-transient failure.
    pub skipped: u64,
    /// True when the stage found nothing to do and made no writes.
    pub no_op: bool,
    /// BLAKE3 content hash of the artifacts, for builds that wrote them.
    pub artifact_hash: Option<String>,
}

impl StageReport {
    pub(crate) fn new(stage: Stage) -> Self {
        Self {
            stage,
            processed: 0,
            written: 0,
            skipped: 0,
            no_op: false,
            artifact_hash: None,
        }
    }

    pub(crate) fn no_op(stage: Stage, processed: u64) -> Self {
        Self {
            processed,
            no_op: true,
            ..Self::new(stage)
        }
    }
}

/// Run one stage for the context's date.
pub fn run_stage(ctx: &RunContext<'_>, stage: Stage, force: bool) -> Result<StageReport, PipelineError> {
    match stage {
        Stage::Sync => sync::run(ctx, force),
        Stage::Prices => prices::run(ctx, force),
        Stage::Fundamentals => fundamentals::run(ctx, force),
        Stage::Build => build::run(ctx, force),
    }
}

/// Number of items a stage would work on if run now.
pub fn pending_count(ctx: &RunContext<'_>, stage: Stage) -> Result<u64, PipelineError> {
    let n = match stage {
        Stage::Sync => u64::from(ctx.store.synced_on(ctx.date)?.is_none()),
        Stage::Prices => ctx.store.pending_price_symbols(ctx.date)?.len() as u64,
        Stage::Fundamentals => ctx
            .store
            .pending_fundamentals_symbols(ctx.date, &ctx.filter())?
            .len() as u64,
        Stage::Build => ctx.store.enriched_count(ctx.date, &ctx.filter())?,
    };
    Ok(n)
}
