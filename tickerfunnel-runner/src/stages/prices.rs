//! Pass 1: last price and volume for every non-ETF ticker.
//!
//! A failed batch backs off on the shared `quote_batch` topic and the loop
//! moves on. Symbols left unpriced are retried by a resumed (in-progress or
//! failed) step or a forced run, never behind a completed one.

use super::StageReport;
use crate::context::RunContext;
use crate::error::PipelineError;
use chrono::Utc;
use tickerfunnel_core::domain::Stage;

const STAGE: Stage = Stage::Prices;
const BATCH_TOPIC: &str = "quote_batch";

pub fn run(ctx: &RunContext<'_>, force: bool) -> Result<StageReport, PipelineError> {
    if !force {
        if let Some(done) = ctx.store.completed_step(STAGE, ctx.date)? {
            tracing::info!(stage = %STAGE, priced = done.tickers_processed, "prices already extracted");
            return Ok(StageReport::no_op(STAGE, done.tickers_processed));
        }
    }

    let pending = ctx.store.pending_price_symbols(ctx.date)?;

    ctx.store.start_step(STAGE, ctx.date, Utc::now())?;
    let mut report = StageReport::new(STAGE);
    let batch_size = ctx.config.batching.price_batch_size;
    let batches = pending.len().div_ceil(batch_size);
    tracing::info!(stage = %STAGE, pending = pending.len(), batches, "extracting prices");

    for (i, chunk) in pending.chunks(batch_size).enumerate() {
        let batch = i as u32 + 1;
        if i > 0 {
            ctx.pause_between_batches();
        }

        match ctx.market.fetch_quotes(chunk) {
            Ok(result) => {
                ctx.backoff.record_success(BATCH_TOPIC);
                ctx.store.upsert_quotes(ctx.date, &result.quotes)?;
                report.written += result.quotes.len() as u64;
                report.skipped += result.missing.len() as u64;

                for (symbol, reason) in &result.missing {
                    tracing::debug!(stage = %STAGE, symbol = %symbol, reason = %reason, "no quote");
                }
                let outcomes: Vec<(String, Option<String>)> = result
                    .quotes
                    .iter()
                    .map(|q| (q.symbol.clone(), None))
                    .chain(
                        result
                            .missing
                            .iter()
                            .map(|(s, reason)| (s.clone(), Some(reason.clone()))),
                    )
                    .collect();
                ctx.audit(STAGE, batch, &outcomes)?;
            }
            Err(e) => {
                tracing::warn!(stage = %STAGE, batch, symbols = chunk.len(), error = %e, "quote batch failed");
                ctx.backoff.record_failure(BATCH_TOPIC)?;
            }
        }

        let processed = ctx.store.priced_count(ctx.date)?;
        ctx.store
            .update_step_progress(STAGE, ctx.date, processed, Utc::now())?;
        tracing::info!(stage = %STAGE, batch, batches, processed, "batch done");
    }

    report.processed = ctx.store.priced_count(ctx.date)?;
    ctx.store
        .complete_step(STAGE, ctx.date, report.processed, Utc::now())?;
    tracing::info!(
        stage = %STAGE,
        priced = report.processed,
        written = report.written,
        missing = report.skipped,
        "price extraction complete"
    );
    Ok(report)
}
