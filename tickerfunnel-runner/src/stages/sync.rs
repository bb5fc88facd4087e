//! Directory Sync: grow the ticker universe from the exchange directory.
//!
//! Runs at most once per day. Each feed is downloaded and parsed in full
//! before any of its rows are inserted, so an unparseable feed inserts nothing.

use super::StageReport;
use crate::context::RunContext;
use crate::error::PipelineError;
use chrono::Utc;
use tickerfunnel_core::data::{parse_listing, screen_listing};
use tickerfunnel_core::domain::{ListingFeed, Stage};

const STAGE: Stage = Stage::Sync;

/// Download one feed, backing off on transient failures.
fn download(ctx: &RunContext<'_>, feed: ListingFeed) -> Result<String, PipelineError> {
    let topic = format!("listing:{}", feed.file_name());
    loop {
        match ctx.listing.fetch_listing(feed) {
            Ok(text) => {
                ctx.backoff.record_success(&topic);
                return Ok(text);
            }
            Err(e) if e.is_transient() => {
                tracing::warn!(feed = feed.file_name(), error = %e, "listing download failed, retrying");
                ctx.backoff.record_failure(&topic)?;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

pub fn run(ctx: &RunContext<'_>, force: bool) -> Result<StageReport, PipelineError> {
    if !force {
        if let Some(synced) = ctx.store.synced_on(ctx.date)? {
            tracing::info!(stage = %STAGE, date = %ctx.date, synced, "directory already synced today");
            if ctx.store.completed_step(STAGE, ctx.date)?.is_none() {
                ctx.store.complete_step(STAGE, ctx.date, synced, Utc::now())?;
            }
            return Ok(StageReport::no_op(STAGE, synced));
        }
    }

    ctx.store.start_step(STAGE, ctx.date, Utc::now())?;
    let mut report = StageReport::new(STAGE);

    for feed in ListingFeed::ALL {
        let text = download(ctx, feed)?;
        let entries = parse_listing(feed, &text)?;
        let listed = entries.len();
        let screen = screen_listing(entries, ctx.date);
        let inserted = ctx.store.insert_tickers(&screen.accepted)? as u64;

        report.written += inserted;
        report.skipped += screen.rejected as u64;
        ctx.store
            .update_step_progress(STAGE, ctx.date, report.written, Utc::now())?;
        tracing::info!(
            stage = %STAGE,
            feed = feed.file_name(),
            listed,
            accepted = screen.accepted.len(),
            rejected = screen.rejected,
            inserted,
            "listing feed processed"
        );
    }

    report.processed = report.written;
    ctx.store.mark_synced(ctx.date, report.written, Utc::now())?;
    ctx.store
        .complete_step(STAGE, ctx.date, report.processed, Utc::now())?;
    tracing::info!(
        stage = %STAGE,
        new_tickers = report.written,
        universe = ctx.store.ticker_count()?,
        "directory sync complete"
    );
    Ok(report)
}
