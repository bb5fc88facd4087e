//! Per-run state handed to every stage.

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use chrono::NaiveDate;
use std::sync::Arc;
use tickerfunnel_core::data::{
    BackoffTracker, ListingSource, MarketDataProvider, NasdaqDirectory, ProbeTarget,
    RequestMetrics, YahooProvider,
};
use tickerfunnel_core::domain::{Stage, TickerSyncRecord};
use tickerfunnel_core::store::{PriceFilter, Store};

/// Upstream services, plus the request counters they record into.
pub struct Collaborators {
    pub listing: Box<dyn ListingSource>,
    pub market: Box<dyn MarketDataProvider>,
    pub metrics: Arc<RequestMetrics>,
    /// Hosts checked before a run; empty skips the reachability probe.
    pub probes: Vec<ProbeTarget>,
}

impl Collaborators {
    /// Production HTTP clients for the exchange directory and market data.
    pub fn http(config: &PipelineConfig) -> Result<Self, PipelineError> {
        let endpoints = &config.endpoints;
        let metrics = Arc::new(RequestMetrics::new());
        let listing = NasdaqDirectory::new(
            endpoints.listing_base_url.as_str(),
            endpoints.http_timeout(),
            Arc::clone(&metrics),
        )?;
        let market = YahooProvider::new(
            endpoints.quote_base_url.as_str(),
            endpoints.summary_base_url.as_str(),
            endpoints.http_timeout(),
            endpoints.quote_workers,
            Arc::clone(&metrics),
        )?;
        let probes = vec![
            ProbeTarget::new("nasdaq", endpoints.listing_probe_host.as_str(), endpoints.probe_port),
            ProbeTarget::new("yahoo", endpoints.market_probe_host.as_str(), endpoints.probe_port),
        ];

        Ok(Self {
            listing: Box::new(listing),
            market: Box::new(market),
            metrics,
            probes,
        })
    }
}

/// Everything a stage needs for one date.
///
/// The backoff tracker lives here so retry state never outlives the run.
pub struct RunContext<'a> {
    pub config: &'a PipelineConfig,
    pub store: &'a Store,
    pub listing: &'a dyn ListingSource,
    pub market: &'a dyn MarketDataProvider,
    pub metrics: &'a RequestMetrics,
    pub backoff: BackoffTracker,
    pub date: NaiveDate,
    /// Set when running under a run record; enables the per-symbol audit trail.
    pub run_id: Option<i64>,
}

impl<'a> RunContext<'a> {
    pub fn new(
        config: &'a PipelineConfig,
        store: &'a Store,
        collaborators: &'a Collaborators,
        date: NaiveDate,
    ) -> Self {
        Self {
            config,
            store,
            listing: collaborators.listing.as_ref(),
            market: collaborators.market.as_ref(),
            metrics: collaborators.metrics.as_ref(),
            backoff: BackoffTracker::new(config.backoff.to_backoff_config()),
            date,
            run_id: None,
        }
    }

    pub fn with_run_id(mut self, run_id: i64) -> Self {
        self.run_id = Some(run_id);
        self
    }

    pub fn filter(&self) -> PriceFilter {
        self.config.filter.price_filter()
    }

    /// Pause between batches; a zero delay skips the sleep.
    pub fn pause_between_batches(&self) {
        let delay = self.config.batching.inter_batch_delay();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
    }

    /// Append audit rows for one batch. No-op outside a run record.
    pub(crate) fn audit(
        &self,
        stage: Stage,
        batch: u32,
        outcomes: &[(String, Option<String>)],
    ) -> Result<(), PipelineError> {
        let Some(run_id) = self.run_id else {
            return Ok(());
        };
        let records: Vec<TickerSyncRecord> = outcomes
            .iter()
            .map(|(symbol, error)| match error {
                None => TickerSyncRecord::ok(run_id, symbol, stage, batch),
                Some(e) => TickerSyncRecord::failed(run_id, symbol, stage, batch, e.as_str()),
            })
            .collect();
        self.store
            .record_sync_attempts(&records, chrono::Utc::now())?;
        Ok(())
    }
}
