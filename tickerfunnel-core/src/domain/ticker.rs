//! Ticker — a member of the daily symbol universe.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A listed security known to the system.
///
/// Rows are insert-if-absent: once a symbol is in the universe its name,
/// exchange and first-seen date are never rewritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub symbol: String,
    pub name: String,
    pub exchange: String,
    pub is_etf: bool,
    pub first_seen: NaiveDate,
}

impl Ticker {
    pub fn new(
        symbol: impl Into<String>,
        name: impl Into<String>,
        exchange: impl Into<String>,
        first_seen: NaiveDate,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
            exchange: exchange.into(),
            is_etf: false,
            first_seen,
        }
    }
}

/// The two exchange-directory feeds the universe is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ListingFeed {
    /// NASDAQ-listed securities (`nasdaqlisted.txt`).
    Primary,
    /// Securities listed on other exchanges (`otherlisted.txt`).
    Other,
}

impl ListingFeed {
    pub const ALL: [ListingFeed; 2] = [ListingFeed::Primary, ListingFeed::Other];

    /// File name of the feed on the directory server.
    pub fn file_name(&self) -> &'static str {
        match self {
            ListingFeed::Primary => "nasdaqlisted.txt",
            ListingFeed::Other => "otherlisted.txt",
        }
    }
}
