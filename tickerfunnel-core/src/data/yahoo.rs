//! Yahoo Finance market-data provider.
//!
//! Quotes and history come from the v8 chart API; fundamentals come from the
//! v10 quoteSummary API. Bulk quotes fan out one chart call per symbol on a
//! small dedicated thread pool and return a single aggregate result.
//!
//! Yahoo Finance has no official API and is subject to unannounced format
//! changes; parse failures surface as [`DataError::ResponseFormatChanged`].

use super::provider::{DataError, MarketDataProvider, QuoteBatch};
use super::request_metrics::RequestMetrics;
use crate::domain::{Fundamentals, Quote};
use rayon::prelude::*;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_CHART_BASE_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
pub const DEFAULT_SUMMARY_BASE_URL: &str =
    "https://query2.finance.yahoo.com/v10/finance/quoteSummary";

const SERVICE: &str = "yahoo";
const SUMMARY_MODULES: &str = "price,summaryDetail,defaultKeyStatistics,financialData,assetProfile";

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<i64>>,
}

/// One trading day from a chart response.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ChartPoint {
    close: f64,
    volume: i64,
}

/// Yahoo Finance v10 quoteSummary API response.
#[derive(Debug, Deserialize)]
struct SummaryResponse {
    #[serde(rename = "quoteSummary")]
    quote_summary: SummaryResult,
}

#[derive(Debug, Deserialize)]
struct SummaryResult {
    result: Option<Vec<SummaryModules>>,
    error: Option<ApiError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryModules {
    price: Option<PriceModule>,
    summary_detail: Option<SummaryDetail>,
    default_key_statistics: Option<KeyStatistics>,
    financial_data: Option<FinancialData>,
    asset_profile: Option<AssetProfile>,
}

/// Yahoo wraps numbers as `{"raw": 1.23, "fmt": "1.23"}`; empty objects mean missing.
#[derive(Debug, Default, Deserialize)]
struct Raw {
    raw: Option<f64>,
}

type Field = Option<Raw>;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceModule {
    market_cap: Field,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryDetail {
    market_cap: Field,
    dividend_yield: Field,
    beta: Field,
    #[serde(rename = "trailingPE")]
    trailing_pe: Field,
    #[serde(rename = "forwardPE")]
    forward_pe: Field,
    fifty_two_week_high: Field,
    fifty_two_week_low: Field,
    average_volume10days: Field,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyStatistics {
    price_to_book: Field,
    peg_ratio: Field,
    enterprise_value: Field,
    short_ratio: Field,
    short_percent_of_float: Field,
    shares_outstanding: Field,
    float_shares: Field,
    beta: Field,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FinancialData {
    debt_to_equity: Field,
    current_ratio: Field,
    quick_ratio: Field,
    profit_margins: Field,
    operating_margins: Field,
    return_on_equity: Field,
    return_on_assets: Field,
    revenue_growth: Field,
    earnings_growth: Field,
    target_mean_price: Field,
    recommendation_mean: Field,
    number_of_analyst_opinions: Field,
}

#[derive(Debug, Default, Deserialize)]
struct AssetProfile {
    sector: Option<String>,
    industry: Option<String>,
}

fn raw(field: &Field) -> Option<f64> {
    field.as_ref().and_then(|r| r.raw).filter(|v| v.is_finite())
}

fn raw_int(field: &Field) -> Option<i64> {
    raw(field).map(|v| v.round() as i64)
}

fn api_error(symbol: &str, err: Option<ApiError>) -> DataError {
    match err {
        Some(e) if e.code == "Not Found" => DataError::SymbolNotFound {
            symbol: symbol.to_string(),
        },
        Some(e) => DataError::ResponseFormatChanged(format!("{}: {}", e.code, e.description)),
        None => DataError::ResponseFormatChanged("empty result with no error".into()),
    }
}

/// Yahoo Finance data provider.
pub struct YahooProvider {
    client: reqwest::blocking::Client,
    chart_base: String,
    summary_base: String,
    metrics: Arc<RequestMetrics>,
    pool: rayon::ThreadPool,
}

impl YahooProvider {
    pub fn new(
        chart_base: impl Into<String>,
        summary_base: impl Into<String>,
        timeout: Duration,
        workers: usize,
        metrics: Arc<RequestMetrics>,
    ) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("quote-worker-{i}"))
            .build()
            .map_err(|e| DataError::Other(format!("failed to build quote pool: {e}")))?;

        Ok(Self {
            client,
            chart_base: chart_base.into().trim_end_matches('/').to_string(),
            summary_base: summary_base.into().trim_end_matches('/').to_string(),
            metrics,
            pool,
        })
    }

    fn chart_url(&self, symbol: &str, range: &str) -> String {
        format!("{}/{symbol}?range={range}&interval=1d", self.chart_base)
    }

    fn summary_url(&self, symbol: &str) -> String {
        format!("{}/{symbol}?modules={SUMMARY_MODULES}", self.summary_base)
    }

    /// One GET with request, byte and failure accounting.
    fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        operation: &str,
        symbol: &str,
    ) -> Result<T, DataError> {
        self.metrics.record_request(SERVICE, operation);
        let result = self.get_json_inner(url, operation, symbol);
        if result.is_err() {
            self.metrics.record_failure(SERVICE, operation);
        }
        result
    }

    fn get_json_inner<T: DeserializeOwned>(
        &self,
        url: &str,
        operation: &str,
        symbol: &str,
    ) -> Result<T, DataError> {
        let resp = self.client.get(url).send()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(DataError::from_status(status.as_u16(), Some(symbol)));
        }
        let body = resp.bytes()?;
        self.metrics.record_bytes(SERVICE, operation, body.len() as u64);
        serde_json::from_slice(&body).map_err(|e| {
            DataError::ResponseFormatChanged(format!("failed to parse {operation} for {symbol}: {e}"))
        })
    }

    fn fetch_chart(&self, symbol: &str, range: &str) -> Result<Vec<ChartPoint>, DataError> {
        let resp: ChartResponse = self.get_json(&self.chart_url(symbol, range), "chart", symbol)?;
        parse_chart(symbol, resp)
    }

    fn fetch_quote(&self, symbol: &str) -> Result<Quote, DataError> {
        let points = self.fetch_chart(symbol, "5d")?;
        let last = points.last().ok_or_else(|| DataError::MissingData {
            symbol: symbol.to_string(),
            detail: "no recent close".into(),
        })?;
        Ok(Quote {
            symbol: symbol.to_string(),
            price: last.close,
            volume: last.volume,
        })
    }
}

/// Extract trading days with a close from a chart response.
fn parse_chart(symbol: &str, resp: ChartResponse) -> Result<Vec<ChartPoint>, DataError> {
    let data = match resp.chart.result {
        Some(results) => results
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("result array is empty".into()))?,
        None => return Err(api_error(symbol, resp.chart.error)),
    };

    let quote = data
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| DataError::ResponseFormatChanged("no quote data".into()))?;

    // Skip days without a close (holidays, halted sessions)
    let points = quote
        .close
        .iter()
        .enumerate()
        .filter_map(|(i, close)| {
            let close = (*close)?;
            let volume = quote.volume.get(i).copied().flatten().unwrap_or(0);
            Some(ChartPoint { close, volume })
        })
        .collect();

    Ok(points)
}

/// Map a quoteSummary response onto [`Fundamentals`].
fn parse_summary(symbol: &str, resp: SummaryResponse) -> Result<Fundamentals, DataError> {
    let modules = match resp.quote_summary.result {
        Some(results) => results.into_iter().next().ok_or_else(|| DataError::MissingData {
            symbol: symbol.to_string(),
            detail: "empty quoteSummary result".into(),
        })?,
        None => return Err(api_error(symbol, resp.quote_summary.error)),
    };

    let price = modules.price.unwrap_or_default();
    let detail = modules.summary_detail.unwrap_or_default();
    let stats = modules.default_key_statistics.unwrap_or_default();
    let fin = modules.financial_data.unwrap_or_default();
    let profile = modules.asset_profile.unwrap_or_default();

    Ok(Fundamentals {
        market_cap: raw(&detail.market_cap).or_else(|| raw(&price.market_cap)),
        dividend_yield: raw(&detail.dividend_yield),
        beta: raw(&detail.beta).or_else(|| raw(&stats.beta)),
        pe_ratio: raw(&detail.trailing_pe),
        forward_pe: raw(&detail.forward_pe),
        price_to_book: raw(&stats.price_to_book),
        peg_ratio: raw(&stats.peg_ratio),
        enterprise_value: raw(&stats.enterprise_value),
        week_52_high: raw(&detail.fifty_two_week_high),
        week_52_low: raw(&detail.fifty_two_week_low),
        avg_volume_10day: raw_int(&detail.average_volume10days),
        short_ratio: raw(&stats.short_ratio),
        short_percent_float: raw(&stats.short_percent_of_float),
        debt_to_equity: raw(&fin.debt_to_equity),
        current_ratio: raw(&fin.current_ratio),
        quick_ratio: raw(&fin.quick_ratio),
        profit_margin: raw(&fin.profit_margins),
        operating_margin: raw(&fin.operating_margins),
        return_on_equity: raw(&fin.return_on_equity),
        return_on_assets: raw(&fin.return_on_assets),
        revenue_growth: raw(&fin.revenue_growth),
        earnings_growth: raw(&fin.earnings_growth),
        target_mean_price: raw(&fin.target_mean_price),
        recommendation_mean: raw(&fin.recommendation_mean),
        num_analyst_opinions: raw_int(&fin.number_of_analyst_opinions),
        shares_outstanding: raw_int(&stats.shares_outstanding),
        float_shares: raw_int(&stats.float_shares),
        sector: profile.sector.filter(|s| !s.is_empty()),
        industry: profile.industry.filter(|s| !s.is_empty()),
        ..Fundamentals::default()
    })
}

impl MarketDataProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch_quotes(&self, symbols: &[String]) -> Result<QuoteBatch, DataError> {
        if symbols.is_empty() {
            return Ok(QuoteBatch::default());
        }

        let results: Vec<(String, Result<Quote, DataError>)> = self.pool.install(|| {
            symbols
                .par_iter()
                .map(|s| (s.clone(), self.fetch_quote(s)))
                .collect()
        });

        let mut batch = QuoteBatch::default();
        let mut first_transient = None;
        for (symbol, result) in results {
            match result {
                Ok(quote) => batch.quotes.push(quote),
                Err(e) => {
                    if e.is_transient() && first_transient.is_none() {
                        first_transient = Some(e.clone());
                    }
                    batch.missing.push((symbol, e.to_string()));
                }
            }
        }

        // Nothing priced and the upstream looked unhealthy: fail the batch as a whole
        if batch.quotes.is_empty() {
            if let Some(e) = first_transient {
                return Err(e);
            }
        }

        Ok(batch)
    }

    fn fetch_summary(&self, symbol: &str) -> Result<Fundamentals, DataError> {
        let resp: SummaryResponse = self.get_json(&self.summary_url(symbol), "summary", symbol)?;
        parse_summary(symbol, resp)
    }

    fn fetch_history(&self, symbol: &str) -> Result<Vec<f64>, DataError> {
        let points = self.fetch_chart(symbol, "1y")?;
        Ok(points.into_iter().map(|p| p.close).collect())
    }
}
