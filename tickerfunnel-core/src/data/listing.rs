//! Exchange-directory feed parsing and screening.
//!
//! Both feeds are pipe-delimited with a header row and a trailing
//! `File Creation Time: ...` line. Columns are looked up by header name so
//! reordering upstream does not silently shift fields; a missing required
//! column or a short row fails the whole feed.

use super::provider::DataError;
use super::symbols::{is_derivative_name, is_etn_name, is_valid_symbol};
use crate::domain::{ListingFeed, Ticker};
use chrono::NaiveDate;

const TRAILER_PREFIX: &str = "File Creation Time";

/// Exchange name for every row of the primary feed.
pub const PRIMARY_EXCHANGE: &str = "NASDAQ";

/// One raw row of a listing feed.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingEntry {
    pub symbol: String,
    pub name: String,
    pub exchange: String,
    pub is_etf: bool,
    pub is_test: bool,
    /// Primary feed only; `N` means normal.
    pub financial_status: Option<String>,
}

/// Map an other-listed exchange code to a display name.
///
/// Unknown codes are kept verbatim.
pub fn exchange_name(code: &str) -> String {
    match code {
        "A" => "NYSE MKT",
        "N" => "NYSE",
        "P" => "NYSE ARCA",
        "Z" => "BATS",
        "V" => "IEX",
        other => other,
    }
    .to_string()
}

struct Columns {
    symbol: usize,
    name: usize,
    test_issue: usize,
    etf: usize,
    exchange: Option<usize>,
    financial_status: Option<usize>,
}

impl Columns {
    fn locate(feed: ListingFeed, headers: &csv::StringRecord) -> Result<Self, DataError> {
        let find = |name: &str| headers.iter().position(|h| h.trim() == name);
        let require = |name: &str| {
            find(name).ok_or_else(|| {
                DataError::ResponseFormatChanged(format!(
                    "{} is missing column '{name}'",
                    feed.file_name()
                ))
            })
        };

        match feed {
            ListingFeed::Primary => Ok(Self {
                symbol: require("Symbol")?,
                name: require("Security Name")?,
                test_issue: require("Test Issue")?,
                etf: require("ETF")?,
                exchange: None,
                financial_status: find("Financial Status"),
            }),
            ListingFeed::Other => Ok(Self {
                symbol: require("ACT Symbol")?,
                name: require("Security Name")?,
                test_issue: require("Test Issue")?,
                etf: require("ETF")?,
                exchange: Some(require("Exchange")?),
                financial_status: None,
            }),
        }
    }
}

/// Parse a complete feed. Fails without returning any rows if the feed is
/// structurally broken.
pub fn parse_listing(feed: ListingFeed, text: &str) -> Result<Vec<ListingEntry>, DataError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'|')
        .has_headers(true)
        .flexible(true)
        .quoting(false)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| DataError::ResponseFormatChanged(format!("{}: {e}", feed.file_name())))?
        .clone();
    if headers.len() < 2 {
        return Err(DataError::ResponseFormatChanged(format!(
            "{} has no header row",
            feed.file_name()
        )));
    }
    let cols = Columns::locate(feed, &headers)?;

    let mut entries = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record
            .map_err(|e| DataError::ResponseFormatChanged(format!("{}: {e}", feed.file_name())))?;

        let first = record.get(0).unwrap_or_default();
        if first.starts_with(TRAILER_PREFIX) {
            continue;
        }
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }

        let field = |idx: usize| {
            record.get(idx).map(str::trim).ok_or_else(|| {
                DataError::ResponseFormatChanged(format!(
                    "{} row {} has {} fields, expected at least {}",
                    feed.file_name(),
                    i + 2,
                    record.len(),
                    idx + 1
                ))
            })
        };

        let exchange = match (feed, cols.exchange) {
            (ListingFeed::Other, Some(idx)) => exchange_name(field(idx)?),
            _ => PRIMARY_EXCHANGE.to_string(),
        };
        let financial_status = match cols.financial_status {
            Some(idx) => Some(field(idx)?.to_string()),
            None => None,
        };

        entries.push(ListingEntry {
            symbol: field(cols.symbol)?.to_string(),
            name: field(cols.name)?.to_string(),
            exchange,
            is_etf: field(cols.etf)? == "Y",
            is_test: field(cols.test_issue)? == "Y",
            financial_status,
        });
    }

    Ok(entries)
}

impl ListingEntry {
    /// Flag, keyword and symbol-shape screening for common stock.
    pub fn is_common_stock(&self) -> bool {
        if self.is_test || self.is_etf || is_etn_name(&self.name) {
            return false;
        }
        if let Some(status) = &self.financial_status {
            if status != "N" {
                return false;
            }
        }
        !is_derivative_name(&self.name) && is_valid_symbol(&self.symbol)
    }
}

/// Outcome of screening one feed.
#[derive(Debug, Clone, Default)]
pub struct ListingScreen {
    pub accepted: Vec<Ticker>,
    pub rejected: usize,
}

/// Apply the common-stock screen and turn survivors into tickers.
pub fn screen_listing(entries: Vec<ListingEntry>, first_seen: NaiveDate) -> ListingScreen {
    let mut screen = ListingScreen::default();
    for entry in entries {
        if entry.is_common_stock() {
            screen.accepted.push(Ticker::new(
                entry.symbol.trim(),
                entry.name,
                entry.exchange,
                first_seen,
            ));
        } else {
            screen.rejected += 1;
        }
    }
    screen
}
