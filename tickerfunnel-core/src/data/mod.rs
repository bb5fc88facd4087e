//! Upstream collaborators: exchange directory, market data, retry policy, accounting

pub mod backoff;
pub mod listing;
pub mod nasdaq;
pub mod probe;
pub mod provider;
pub mod request_metrics;
pub mod symbols;
pub mod yahoo;

pub use backoff::{BackoffConfig, BackoffLimitExceeded, BackoffTracker, TopicStats};
pub use listing::{parse_listing, screen_listing, ListingEntry, ListingScreen};
pub use nasdaq::NasdaqDirectory;
pub use probe::{probe, ProbeTarget};
pub use provider::{DataError, ListingSource, MarketDataProvider, QuoteBatch};
pub use request_metrics::{RequestCount, RequestMetrics, RequestTotals};
pub use symbols::{is_derivative_name, is_valid_symbol};
pub use yahoo::YahooProvider;
