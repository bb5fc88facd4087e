//! Daily price rows and the fundamentals Pass 2 fills in.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Last traded price and volume for one symbol, as returned by a bulk quote call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub price: f64,
    pub volume: i64,
}

/// Optional fundamental fields attached to a daily row by Pass 2.
///
/// Every field may be missing upstream; `None` is stored as SQL NULL and
/// defaulted to a neutral value only at scoring time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fundamentals {
    pub market_cap: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub beta: Option<f64>,
    pub rsi_14: Option<f64>,
    pub ma_200: Option<f64>,
    pub ma_50: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub forward_pe: Option<f64>,
    pub price_to_book: Option<f64>,
    pub peg_ratio: Option<f64>,
    pub enterprise_value: Option<f64>,
    pub week_52_high: Option<f64>,
    pub week_52_low: Option<f64>,
    pub avg_volume_10day: Option<i64>,
    pub short_ratio: Option<f64>,
    pub short_percent_float: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub current_ratio: Option<f64>,
    pub quick_ratio: Option<f64>,
    pub profit_margin: Option<f64>,
    pub operating_margin: Option<f64>,
    pub return_on_equity: Option<f64>,
    pub return_on_assets: Option<f64>,
    pub revenue_growth: Option<f64>,
    pub earnings_growth: Option<f64>,
    pub target_mean_price: Option<f64>,
    pub recommendation_mean: Option<f64>,
    pub num_analyst_opinions: Option<i64>,
    pub shares_outstanding: Option<i64>,
    pub float_shares: Option<i64>,
    pub sector: Option<String>,
    pub industry: Option<String>,
}

/// One row of `daily_metrics`, keyed by (symbol, date).
///
/// A row with `price` set and `fundamentals_at == None` is the normal state
/// between Pass 1 and Pass 2.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyMetric {
    pub symbol: String,
    pub date: NaiveDate,
    pub price: Option<f64>,
    pub volume: Option<i64>,
    pub fundamentals: Fundamentals,
    pub fundamentals_at: Option<DateTime<Utc>>,
}

impl DailyMetric {
    /// True once Pass 2 has written this row.
    pub fn has_fundamentals(&self) -> bool {
        self.fundamentals_at.is_some()
    }
}

/// A filtered, fully-enriched row joined with its ticker, ready for scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringInput {
    pub symbol: String,
    pub name: String,
    pub exchange: String,
    pub price: f64,
    pub volume: i64,
    pub fundamentals: Fundamentals,
}
