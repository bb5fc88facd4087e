//! Pass 2: fundamentals and price-history indicators for Pass 1 survivors.
//!
//! Each symbol is fetched on its own and backs off on its own topic, so one
//! rate-limited symbol does not stall its batch-mates' backoff state.

use super::StageReport;
use crate::context::RunContext;
use crate::error::PipelineError;
use chrono::Utc;
use tickerfunnel_core::data::DataError;
use tickerfunnel_core::domain::{Fundamentals, Stage};
use tickerfunnel_core::indicators::{Indicator, Rsi, Sma};

const STAGE: Stage = Stage::Fundamentals;

/// Fill the indicator fields from a close series, oldest first.
pub fn apply_indicators(f: &mut Fundamentals, closes: &[f64]) {
    f.ma_200 = Sma::new(200).latest(closes);
    f.ma_50 = Sma::new(50).latest(closes);
    f.rsi_14 = Rsi::new(14).latest(closes);
}

/// Retry `op` on `topic` while it fails transiently. `Ok(Err(_))` is a
/// non-transient failure.
fn with_backoff<T>(
    ctx: &RunContext<'_>,
    topic: &str,
    mut op: impl FnMut() -> Result<T, DataError>,
) -> Result<Result<T, DataError>, PipelineError> {
    loop {
        match op() {
            Ok(value) => {
                ctx.backoff.record_success(topic);
                return Ok(Ok(value));
            }
            Err(e) if e.is_transient() => {
                tracing::debug!(stage = %STAGE, topic, error = %e, "transient failure");
                ctx.backoff.record_failure(topic)?;
            }
            Err(e) => return Ok(Err(e)),
        }
    }
}

/// Summary, then history, each retried on its own. A non-transient history
/// failure keeps the summary with null indicators.
///
/// `Ok(Err(_))` is a skipped symbol.
fn fetch_symbol(
    ctx: &RunContext<'_>,
    symbol: &str,
) -> Result<Result<Fundamentals, DataError>, PipelineError> {
    let topic = format!("fundamentals:{symbol}");
    let mut fundamentals = match with_backoff(ctx, &topic, || ctx.market.fetch_summary(symbol))? {
        Ok(f) => f,
        Err(e) => {
            tracing::debug!(stage = %STAGE, symbol, error = %e, "skipping symbol");
            return Ok(Err(e));
        }
    };
    match with_backoff(ctx, &topic, || ctx.market.fetch_history(symbol))? {
        Ok(closes) => apply_indicators(&mut fundamentals, &closes),
        Err(e) => tracing::debug!(stage = %STAGE, symbol, error = %e, "no price history"),
    }
    Ok(Ok(fundamentals))
}

pub fn run(ctx: &RunContext<'_>, force: bool) -> Result<StageReport, PipelineError> {
    if !force {
        if let Some(done) = ctx.store.completed_step(STAGE, ctx.date)? {
            tracing::info!(stage = %STAGE, enriched = done.tickers_processed, "fundamentals already extracted");
            return Ok(StageReport::no_op(STAGE, done.tickers_processed));
        }
    }

    let filter = ctx.filter();
    let pending = ctx.store.pending_fundamentals_symbols(ctx.date, &filter)?;

    ctx.store.start_step(STAGE, ctx.date, Utc::now())?;
    let mut report = StageReport::new(STAGE);
    let batch_size = ctx.config.batching.metadata_batch_size;
    let batches = pending.len().div_ceil(batch_size);
    tracing::info!(
        stage = %STAGE,
        pending = pending.len(),
        batches,
        total = ctx.store.filtered_count(ctx.date, &filter)?,
        "extracting fundamentals"
    );

    for (i, chunk) in pending.chunks(batch_size).enumerate() {
        let batch = i as u32 + 1;
        if i > 0 {
            ctx.pause_between_batches();
        }

        let mut rows = Vec::with_capacity(chunk.len());
        let mut outcomes = Vec::with_capacity(chunk.len());
        for symbol in chunk {
            match fetch_symbol(ctx, symbol)? {
                Ok(f) => {
                    rows.push((symbol.clone(), f));
                    outcomes.push((symbol.clone(), None));
                }
                Err(e) => {
                    report.skipped += 1;
                    outcomes.push((symbol.clone(), Some(e.to_string())));
                }
            }
        }

        report.written += ctx.store.write_fundamentals(ctx.date, &rows, Utc::now())? as u64;
        ctx.audit(STAGE, batch, &outcomes)?;

        let processed = ctx.store.enriched_count(ctx.date, &filter)?;
        ctx.store
            .update_step_progress(STAGE, ctx.date, processed, Utc::now())?;
        tracing::info!(stage = %STAGE, batch, batches, processed, "batch done");
    }

    report.processed = ctx.store.enriched_count(ctx.date, &filter)?;
    ctx.store
        .complete_step(STAGE, ctx.date, report.processed, Utc::now())?;
    tracing::info!(
        stage = %STAGE,
        enriched = report.processed,
        written = report.written,
        skipped = report.skipped,
        "fundamentals extraction complete"
    );
    Ok(report)
}
