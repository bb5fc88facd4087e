//! NASDAQ Trader symbol directory.
//!
//! Serves `nasdaqlisted.txt` and `otherlisted.txt`, refreshed once per
//! trading day.

use super::provider::{DataError, ListingSource};
use super::request_metrics::RequestMetrics;
use crate::domain::ListingFeed;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_LISTING_BASE_URL: &str = "https://www.nasdaqtrader.com/dynamic/SymDir";

const SERVICE: &str = "nasdaq";

/// HTTP client for the exchange directory.
pub struct NasdaqDirectory {
    client: reqwest::blocking::Client,
    base_url: String,
    metrics: Arc<RequestMetrics>,
}

impl NasdaqDirectory {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        metrics: Arc<RequestMetrics>,
    ) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            metrics,
        })
    }

    fn feed_url(&self, feed: ListingFeed) -> String {
        format!("{}/{}", self.base_url, feed.file_name())
    }

    fn download(&self, feed: ListingFeed) -> Result<String, DataError> {
        let resp = self.client.get(self.feed_url(feed)).send()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(DataError::from_status(status.as_u16(), None));
        }
        let text = resp.text()?;
        self.metrics
            .record_bytes(SERVICE, feed.file_name(), text.len() as u64);
        Ok(text)
    }
}

impl ListingSource for NasdaqDirectory {
    fn name(&self) -> &str {
        "nasdaq_trader"
    }

    fn fetch_listing(&self, feed: ListingFeed) -> Result<String, DataError> {
        self.metrics.record_request(SERVICE, feed.file_name());
        let result = self.download(feed);
        if let Err(e) = &result {
            self.metrics.record_failure(SERVICE, feed.file_name());
            tracing::debug!(feed = feed.file_name(), error = %e, "listing download failed");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_urls() {
        let dir = NasdaqDirectory::new(
            "https://example.test/SymDir/",
            Duration::from_secs(5),
            Arc::new(RequestMetrics::new()),
        )
        .unwrap();
        assert_eq!(
            dir.feed_url(ListingFeed::Primary),
            "https://example.test/SymDir/nasdaqlisted.txt"
        );
        assert_eq!(
            dir.feed_url(ListingFeed::Other),
            "https://example.test/SymDir/otherlisted.txt"
        );
    }
}
