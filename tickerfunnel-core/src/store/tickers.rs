//! `tickers`: the symbol universe.

use super::{count, Store, StoreError};
use crate::domain::Ticker;
use rusqlite::{params, OptionalExtension};

impl Store {
    /// Insert tickers that are not already known. Existing rows are never
    /// touched. Returns the number of new rows.
    pub fn insert_tickers(&self, tickers: &[Ticker]) -> Result<usize, StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO tickers (symbol, name, exchange, is_etf, first_seen)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for t in tickers {
                inserted += stmt.execute(params![t.symbol, t.name, t.exchange, t.is_etf, t.first_seen])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    pub fn get_ticker(&self, symbol: &str) -> Result<Option<Ticker>, StoreError> {
        let ticker = self
            .conn
            .query_row(
                "SELECT symbol, name, exchange, is_etf, first_seen FROM tickers WHERE symbol = ?1",
                params![symbol],
                |r| {
                    Ok(Ticker {
                        symbol: r.get(0)?,
                        name: r.get(1)?,
                        exchange: r.get(2)?,
                        is_etf: r.get(3)?,
                        first_seen: r.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(ticker)
    }

    /// All known symbols, sorted.
    pub fn all_symbols(&self) -> Result<Vec<String>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT symbol FROM tickers ORDER BY symbol")?;
        let symbols = stmt
            .query_map([], |r| r.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(symbols)
    }

    pub fn ticker_count(&self) -> Result<u64, StoreError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM tickers", [], |r| r.get(0))?;
        Ok(count(n))
    }

    /// Tickers eligible for price extraction.
    pub fn non_etf_count(&self) -> Result<u64, StoreError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM tickers WHERE is_etf = 0", [], |r| r.get(0))?;
        Ok(count(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 10, d).unwrap()
    }

    #[test]
    fn insert_if_absent_never_updates() {
        let store = Store::open_in_memory().unwrap();
        let first = vec![
            Ticker::new("AAPL", "Apple Inc.", "NASDAQ", day(1)),
            Ticker::new("IBM", "IBM", "NYSE", day(1)),
        ];
        assert_eq!(store.insert_tickers(&first).unwrap(), 2);

        let again = vec![
            Ticker::new("AAPL", "Renamed", "NYSE", day(2)),
            Ticker::new("MSFT", "Microsoft", "NASDAQ", day(2)),
        ];
        assert_eq!(store.insert_tickers(&again).unwrap(), 1);

        let aapl = store.get_ticker("AAPL").unwrap().unwrap();
        assert_eq!(aapl.name, "Apple Inc.");
        assert_eq!(aapl.first_seen, day(1));
        assert_eq!(store.ticker_count().unwrap(), 3);
        assert_eq!(store.all_symbols().unwrap(), vec!["AAPL", "IBM", "MSFT"]);
    }

    #[test]
    fn etfs_excluded_from_non_etf_count() {
        let store = Store::open_in_memory().unwrap();
        let mut spy = Ticker::new("SPY", "SPDR S&P 500", "NYSE ARCA", day(1));
        spy.is_etf = true;
        store
            .insert_tickers(&[spy, Ticker::new("AAPL", "Apple Inc.", "NASDAQ", day(1))])
            .unwrap();
        assert_eq!(store.ticker_count().unwrap(), 2);
        assert_eq!(store.non_etf_count().unwrap(), 1);
        assert!(store.get_ticker("SPY").unwrap().unwrap().is_etf);
        assert!(store.get_ticker("NOPE").unwrap().is_none());
    }
}
