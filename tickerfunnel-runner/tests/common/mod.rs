//! Shared fixtures: in-memory collaborators and a quiet pipeline config.

#![allow(dead_code)]

use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tickerfunnel_core::data::{
    DataError, ListingSource, MarketDataProvider, QuoteBatch, RequestMetrics,
};
use tickerfunnel_core::domain::{Fundamentals, ListingFeed, Quote};
use tickerfunnel_runner::{Collaborators, PipelineConfig};

pub const PRIMARY_FEED: &str = "\
Symbol|Security Name|Market Category|Test Issue|Financial Status|Round Lot Size|ETF|NextShares
AAPL|Apple Inc. - Common Stock|Q|N|N|100|N|N
PENNY|Penny Stock Corp - Common Stock|S|N|N|100|N|N
AACBU|Artius II Acquisition Inc. - Units|G|N|N|100|N|N
QQQ|Invesco QQQ Trust, Series 1|G|N|N|100|Y|N
File Creation Time: 1017202412:00|||||||
";

pub const OTHER_FEED: &str = "\
ACT Symbol|Security Name|Exchange|CQS Symbol|ETF|Round Lot Size|Test Issue|NASDAQ Symbol
IBM|International Business Machines Corporation Common Stock|N|IBM|N|100|N|IBM
GLD|SPDR Gold Trust|P|GLD|Y|100|N|GLD
TEST|Test Common Stock|N|TEST|N|100|N|TEST
File Creation Time: 1017202412:00|||||||
";

pub fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 10, 17).unwrap()
}

/// Config with no inter-batch pause and microsecond backoff.
pub fn test_config(output_dir: &Path) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.paths.output_dir = output_dir.to_path_buf();
    config.batching.inter_batch_delay_ms = 0;
    config.backoff.initial_delay_ms = 1;
    config.backoff.max_delay_ms = 4;
    config
}

// ── Listing ──────────────────────────────────────────────────────────

/// Serves fixed feed text; can fail every download of one feed.
pub struct StaticListing {
    feeds: HashMap<ListingFeed, String>,
    failing: Option<(ListingFeed, DataError)>,
    pub calls: Arc<AtomicUsize>,
}

impl StaticListing {
    pub fn new(primary: &str, other: &str) -> Self {
        Self {
            feeds: HashMap::from([
                (ListingFeed::Primary, primary.to_string()),
                (ListingFeed::Other, other.to_string()),
            ]),
            failing: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn standard() -> Self {
        Self::new(PRIMARY_FEED, OTHER_FEED)
    }

    pub fn failing(mut self, feed: ListingFeed, err: DataError) -> Self {
        self.failing = Some((feed, err));
        self
    }
}

impl ListingSource for StaticListing {
    fn name(&self) -> &str {
        "static"
    }

    fn fetch_listing(&self, feed: ListingFeed) -> Result<String, DataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some((f, e)) = &self.failing {
            if *f == feed {
                return Err(e.clone());
            }
        }
        Ok(self.feeds.get(&feed).cloned().unwrap_or_default())
    }
}

// ── Market data ──────────────────────────────────────────────────────

#[derive(Default)]
struct Script {
    quotes: HashMap<String, (f64, i64)>,
    fundamentals: HashMap<String, Fundamentals>,
    history: Vec<f64>,
    /// Quote calls allowed to succeed before every later call is rate limited.
    quote_budget: Option<usize>,
    /// Remaining transient summary failures per symbol.
    flaky: HashMap<String, usize>,
    /// Symbols whose summary is always rate limited.
    throttled: HashSet<String>,
    /// Symbols whose summary is structurally broken.
    broken: HashSet<String>,
    /// Remaining transient history failures per symbol.
    flaky_history: HashMap<String, usize>,
}

/// Market data served from a script, with a log of every request.
#[derive(Clone, Default)]
pub struct ScriptedMarket {
    script: Arc<Mutex<Script>>,
    pub quote_requests: Arc<Mutex<Vec<String>>>,
    pub quote_calls: Arc<AtomicUsize>,
    pub summary_requests: Arc<Mutex<Vec<String>>>,
    pub history_requests: Arc<Mutex<Vec<String>>>,
}

impl ScriptedMarket {
    pub fn new() -> Self {
        let history: Vec<f64> = (0..252).map(|i| 100.0 + (i as f64 * 0.3).sin() * 5.0).collect();
        let market = Self::default();
        market.script.lock().unwrap().history = history;
        market
    }

    pub fn quote(self, symbol: &str, price: f64, volume: i64) -> Self {
        self.script
            .lock()
            .unwrap()
            .quotes
            .insert(symbol.to_string(), (price, volume));
        self
    }

    pub fn fundamentals(self, symbol: &str, f: Fundamentals) -> Self {
        self.script
            .lock()
            .unwrap()
            .fundamentals
            .insert(symbol.to_string(), f);
        self
    }

    pub fn quote_budget(self, calls: usize) -> Self {
        self.script.lock().unwrap().quote_budget = Some(calls);
        self
    }

    pub fn flaky(self, symbol: &str, failures: usize) -> Self {
        self.script
            .lock()
            .unwrap()
            .flaky
            .insert(symbol.to_string(), failures);
        self
    }

    pub fn throttled(self, symbol: &str) -> Self {
        self.script
            .lock()
            .unwrap()
            .throttled
            .insert(symbol.to_string());
        self
    }

    pub fn broken(self, symbol: &str) -> Self {
        self.script.lock().unwrap().broken.insert(symbol.to_string());
        self
    }

    pub fn flaky_history(self, symbol: &str, failures: usize) -> Self {
        self.script
            .lock()
            .unwrap()
            .flaky_history
            .insert(symbol.to_string(), failures);
        self
    }

    pub fn quoted_symbols(&self) -> Vec<String> {
        self.quote_requests.lock().unwrap().clone()
    }

    pub fn summary_symbols(&self) -> Vec<String> {
        self.summary_requests.lock().unwrap().clone()
    }

    pub fn history_symbols(&self) -> Vec<String> {
        self.history_requests.lock().unwrap().clone()
    }
}

impl MarketDataProvider for ScriptedMarket {
    fn name(&self) -> &str {
        "scripted"
    }

    fn fetch_quotes(&self, symbols: &[String]) -> Result<QuoteBatch, DataError> {
        let call = self.quote_calls.fetch_add(1, Ordering::SeqCst);
        let script = self.script.lock().unwrap();
        if script.quote_budget.is_some_and(|budget| call >= budget) {
            return Err(DataError::RateLimited);
        }
        self.quote_requests
            .lock()
            .unwrap()
            .extend(symbols.iter().cloned());

        let mut batch = QuoteBatch::default();
        for symbol in symbols {
            match script.quotes.get(symbol) {
                Some(&(price, volume)) => batch.quotes.push(Quote {
                    symbol: symbol.clone(),
                    price,
                    volume,
                }),
                None => batch
                    .missing
                    .push((symbol.clone(), "no quote returned".to_string())),
            }
        }
        Ok(batch)
    }

    fn fetch_summary(&self, symbol: &str) -> Result<Fundamentals, DataError> {
        self.summary_requests.lock().unwrap().push(symbol.to_string());
        let mut script = self.script.lock().unwrap();
        if script.throttled.contains(symbol) {
            return Err(DataError::RateLimited);
        }
        if script.broken.contains(symbol) {
            return Err(DataError::ResponseFormatChanged(format!("{symbol}: no summary")));
        }
        if let Some(left) = script.flaky.get_mut(symbol) {
            if *left > 0 {
                *left -= 1;
                return Err(DataError::ServerError { status: 503 });
            }
        }
        Ok(script.fundamentals.get(symbol).cloned().unwrap_or_default())
    }

    fn fetch_history(&self, symbol: &str) -> Result<Vec<f64>, DataError> {
        self.history_requests.lock().unwrap().push(symbol.to_string());
        let mut script = self.script.lock().unwrap();
        if let Some(left) = script.flaky_history.get_mut(symbol) {
            if *left > 0 {
                *left -= 1;
                return Err(DataError::ServerError { status: 502 });
            }
        }
        Ok(script.history.clone())
    }
}

pub fn collaborators(listing: StaticListing, market: ScriptedMarket) -> Collaborators {
    Collaborators {
        listing: Box::new(listing),
        market: Box::new(market),
        metrics: Arc::new(RequestMetrics::new()),
        probes: Vec::new(),
    }
}

/// AAPL passes the price/volume filter; PENNY and IBM do not.
pub fn funnel_market() -> ScriptedMarket {
    ScriptedMarket::new()
        .quote("AAPL", 150.0, 50_000_000)
        .quote("PENNY", 2.0, 10_000_000)
        .quote("IBM", 180.0, 90_000)
        .fundamentals(
            "AAPL",
            Fundamentals {
                market_cap: Some(3.0e12),
                dividend_yield: Some(0.0044),
                beta: Some(1.2),
                sector: Some("Technology".into()),
                industry: Some("Consumer Electronics".into()),
                ..Default::default()
            },
        )
}
