//! Build: percentile scores and the static search artifacts.
//!
//! Scores are replaced wholesale for the date, so a rebuild never leaves
//! rows for symbols that dropped out of the filtered universe.

use super::StageReport;
use crate::context::RunContext;
use crate::error::PipelineError;
use chrono::Utc;
use tickerfunnel_core::artifacts::{artifacts_exist, build_metadata, build_prefix_index, write_artifacts};
use tickerfunnel_core::domain::{Stage, StrategyScores};
use tickerfunnel_core::scoring::score_universe;

const STAGE: Stage = Stage::Build;

pub fn run(ctx: &RunContext<'_>, force: bool) -> Result<StageReport, PipelineError> {
    let inputs = ctx.store.scoring_inputs(ctx.date, &ctx.filter())?;
    let output_dir = &ctx.config.paths.output_dir;

    if !force
        && ctx.store.score_count(ctx.date)? == inputs.len() as u64
        && artifacts_exist(output_dir)
        && ctx.store.completed_step(STAGE, ctx.date)?.is_some()
    {
        tracing::info!(stage = %STAGE, scored = inputs.len(), "scores and artifacts up to date");
        return Ok(StageReport::no_op(STAGE, inputs.len() as u64));
    }

    ctx.store.start_step(STAGE, ctx.date, Utc::now())?;
    let mut report = StageReport::new(STAGE);

    let scores = score_universe(&inputs);
    let rows: Vec<(String, StrategyScores)> = inputs
        .iter()
        .zip(&scores)
        .map(|(input, s)| (input.symbol.clone(), *s))
        .collect();
    report.written = ctx.store.replace_scores(ctx.date, &rows)? as u64;
    ctx.store
        .update_step_progress(STAGE, ctx.date, report.written, Utc::now())?;

    let index = build_prefix_index(inputs.iter().map(|i| (i.symbol.as_str(), i.name.as_str())));
    let metadata = build_metadata(&inputs, &scores);
    let summary = write_artifacts(output_dir, &index, &metadata)?;

    report.processed = report.written;
    report.artifact_hash = Some(summary.content_hash.clone());
    ctx.store
        .complete_step(STAGE, ctx.date, report.processed, Utc::now())?;
    tracing::info!(
        stage = %STAGE,
        scored = report.processed,
        prefixes = summary.prefix_count,
        bytes = summary.bytes_written,
        hash = %summary.content_hash,
        dir = %output_dir.display(),
        "artifacts written"
    );
    Ok(report)
}
