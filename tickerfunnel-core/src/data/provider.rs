//! Collaborator traits and structured error types.
//!
//! The listing directory and the market-data service sit behind traits so the
//! stage runners can be driven by mocks in tests. Providers make exactly one
//! attempt per call; retry policy lives with the caller and its
//! [`BackoffTracker`](super::backoff::BackoffTracker).

use crate::domain::{Fundamentals, ListingFeed, Quote};
use thiserror::Error;

/// Structured error types for data operations.
#[derive(Debug, Clone, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider")]
    RateLimited,

    #[error("upstream server error: HTTP {status}")]
    ServerError { status: u16 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("missing data for {symbol}: {detail}")]
    MissingData { symbol: String, detail: String },

    #[error("data error: {0}")]
    Other(String),
}

impl DataError {
    /// True for failures worth retrying after a backoff wait.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DataError::NetworkUnreachable(_) | DataError::RateLimited | DataError::ServerError { .. }
        )
    }

    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, symbol: Option<&str>) -> Self {
        match (status, symbol) {
            (429, _) => DataError::RateLimited,
            (500..=599, _) => DataError::ServerError { status },
            (404, Some(symbol)) => DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            },
            _ => DataError::Other(format!("HTTP {status}")),
        }
    }
}

impl From<reqwest::Error> for DataError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            DataError::ResponseFormatChanged(e.to_string())
        } else if let Some(status) = e.status() {
            DataError::from_status(status.as_u16(), None)
        } else {
            DataError::NetworkUnreachable(e.to_string())
        }
    }
}

/// Result of one bulk quote call.
///
/// Symbols that could not be priced are listed in `missing` with a reason;
/// they do not fail the batch.
#[derive(Debug, Clone, Default)]
pub struct QuoteBatch {
    pub quotes: Vec<Quote>,
    pub missing: Vec<(String, String)>,
}

/// Source of the exchange-directory feeds.
pub trait ListingSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Download the raw pipe-delimited text of one feed.
    fn fetch_listing(&self, feed: ListingFeed) -> Result<String, DataError>;
}

/// Per-symbol market data: bulk quotes, fundamentals, daily history.
pub trait MarketDataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Last price and volume for many symbols in one blocking call.
    ///
    /// Returns `Err` only when the batch as a whole failed.
    fn fetch_quotes(&self, symbols: &[String]) -> Result<QuoteBatch, DataError>;

    /// Summary fundamentals for one symbol. Indicator fields are left `None`.
    fn fetch_summary(&self, symbol: &str) -> Result<Fundamentals, DataError>;

    /// About one year of daily closes, oldest first.
    fn fetch_history(&self, symbol: &str) -> Result<Vec<f64>, DataError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(DataError::NetworkUnreachable("timeout".into()).is_transient());
        assert!(DataError::RateLimited.is_transient());
        assert!(DataError::ServerError { status: 503 }.is_transient());
        assert!(!DataError::ResponseFormatChanged("x".into()).is_transient());
        assert!(!DataError::SymbolNotFound { symbol: "X".into() }.is_transient());
        assert!(!DataError::Other("x".into()).is_transient());
    }

    #[test]
    fn status_classification() {
        assert!(matches!(DataError::from_status(429, None), DataError::RateLimited));
        assert!(matches!(
            DataError::from_status(502, None),
            DataError::ServerError { status: 502 }
        ));
        assert!(matches!(
            DataError::from_status(404, Some("ZZZ")),
            DataError::SymbolNotFound { .. }
        ));
        assert!(matches!(DataError::from_status(404, None), DataError::Other(_)));
        assert!(!DataError::from_status(401, Some("X")).is_transient());
    }
}
