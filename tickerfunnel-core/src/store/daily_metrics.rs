//! `daily_metrics`: one row per (symbol, date), priced by Pass 1 and
//! enriched in place by Pass 2.

use super::{count, Store, StoreError};
use crate::domain::{DailyMetric, Fundamentals, Quote, ScoringInput};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

/// Price/volume thresholds separating Pass 1 survivors from the rest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceFilter {
    pub min_price: f64,
    pub min_volume: i64,
}

impl Default for PriceFilter {
    fn default() -> Self {
        Self {
            min_price: 5.0,
            min_volume: 100_000,
        }
    }
}

/// Fundamental columns, in the order `fundamentals_values` emits them.
const FUNDAMENTAL_COLUMNS: [&str; 32] = [
    "market_cap",
    "dividend_yield",
    "beta",
    "rsi_14",
    "ma_200",
    "ma_50",
    "pe_ratio",
    "forward_pe",
    "price_to_book",
    "peg_ratio",
    "enterprise_value",
    "week_52_high",
    "week_52_low",
    "avg_volume_10day",
    "short_ratio",
    "short_percent_float",
    "debt_to_equity",
    "current_ratio",
    "quick_ratio",
    "profit_margin",
    "operating_margin",
    "return_on_equity",
    "return_on_assets",
    "revenue_growth",
    "earnings_growth",
    "target_mean_price",
    "recommendation_mean",
    "num_analyst_opinions",
    "shares_outstanding",
    "float_shares",
    "sector",
    "industry",
];

/// Text layout rusqlite uses for `DateTime<Utc>`.
const TIMESTAMP_FORMAT: &str = "%F %T%.f%:z";

const FILTER_CLAUSE: &str = "d.date = ?1 AND d.price >= ?2 AND d.volume >= ?3";

fn fundamentals_values(f: &Fundamentals) -> Vec<Value> {
    vec![
        f.market_cap.into(),
        f.dividend_yield.into(),
        f.beta.into(),
        f.rsi_14.into(),
        f.ma_200.into(),
        f.ma_50.into(),
        f.pe_ratio.into(),
        f.forward_pe.into(),
        f.price_to_book.into(),
        f.peg_ratio.into(),
        f.enterprise_value.into(),
        f.week_52_high.into(),
        f.week_52_low.into(),
        f.avg_volume_10day.into(),
        f.short_ratio.into(),
        f.short_percent_float.into(),
        f.debt_to_equity.into(),
        f.current_ratio.into(),
        f.quick_ratio.into(),
        f.profit_margin.into(),
        f.operating_margin.into(),
        f.return_on_equity.into(),
        f.return_on_assets.into(),
        f.revenue_growth.into(),
        f.earnings_growth.into(),
        f.target_mean_price.into(),
        f.recommendation_mean.into(),
        f.num_analyst_opinions.into(),
        f.shares_outstanding.into(),
        f.float_shares.into(),
        f.sector.clone().into(),
        f.industry.clone().into(),
    ]
}

fn fundamentals_from_row(r: &Row<'_>) -> rusqlite::Result<Fundamentals> {
    Ok(Fundamentals {
        market_cap: r.get("market_cap")?,
        dividend_yield: r.get("dividend_yield")?,
        beta: r.get("beta")?,
        rsi_14: r.get("rsi_14")?,
        ma_200: r.get("ma_200")?,
        ma_50: r.get("ma_50")?,
        pe_ratio: r.get("pe_ratio")?,
        forward_pe: r.get("forward_pe")?,
        price_to_book: r.get("price_to_book")?,
        peg_ratio: r.get("peg_ratio")?,
        enterprise_value: r.get("enterprise_value")?,
        week_52_high: r.get("week_52_high")?,
        week_52_low: r.get("week_52_low")?,
        avg_volume_10day: r.get("avg_volume_10day")?,
        short_ratio: r.get("short_ratio")?,
        short_percent_float: r.get("short_percent_float")?,
        debt_to_equity: r.get("debt_to_equity")?,
        current_ratio: r.get("current_ratio")?,
        quick_ratio: r.get("quick_ratio")?,
        profit_margin: r.get("profit_margin")?,
        operating_margin: r.get("operating_margin")?,
        return_on_equity: r.get("return_on_equity")?,
        return_on_assets: r.get("return_on_assets")?,
        revenue_growth: r.get("revenue_growth")?,
        earnings_growth: r.get("earnings_growth")?,
        target_mean_price: r.get("target_mean_price")?,
        recommendation_mean: r.get("recommendation_mean")?,
        num_analyst_opinions: r.get("num_analyst_opinions")?,
        shares_outstanding: r.get("shares_outstanding")?,
        float_shares: r.get("float_shares")?,
        sector: r.get("sector")?,
        industry: r.get("industry")?,
    })
}

fn fundamental_select_list(alias: &str) -> String {
    FUNDAMENTAL_COLUMNS
        .iter()
        .map(|c| format!("{alias}.{c}"))
        .collect::<Vec<_>>()
        .join(", ")
}

impl Store {
    /// Non-ETF tickers without a priced row for `date`, sorted by symbol.
    pub fn pending_price_symbols(&self, date: NaiveDate) -> Result<Vec<String>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT t.symbol FROM tickers t
             WHERE t.is_etf = 0
               AND NOT EXISTS (
                   SELECT 1 FROM daily_metrics d
                   WHERE d.symbol = t.symbol AND d.date = ?1 AND d.price IS NOT NULL
               )
             ORDER BY t.symbol",
        )?;
        let symbols = stmt
            .query_map(params![date], |r| r.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(symbols)
    }

    /// Write one batch of quotes. Existing fundamentals on the row are kept.
    pub fn upsert_quotes(&self, date: NaiveDate, quotes: &[Quote]) -> Result<usize, StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO daily_metrics (symbol, date, price, volume) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(symbol, date) DO UPDATE SET
                     price = excluded.price,
                     volume = excluded.volume",
            )?;
            for q in quotes {
                stmt.execute(params![q.symbol, date, q.price, q.volume])?;
            }
        }
        tx.commit()?;
        Ok(quotes.len())
    }

    /// Rows with a price for `date`.
    pub fn priced_count(&self, date: NaiveDate) -> Result<u64, StoreError> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM daily_metrics WHERE date = ?1 AND price IS NOT NULL",
            params![date],
            |r| r.get(0),
        )?;
        Ok(count(n))
    }

    /// Rows passing the filter that Pass 2 has not written yet, sorted by symbol.
    pub fn pending_fundamentals_symbols(
        &self,
        date: NaiveDate,
        filter: &PriceFilter,
    ) -> Result<Vec<String>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT d.symbol FROM daily_metrics d
             WHERE {FILTER_CLAUSE} AND d.fundamentals_at IS NULL
             ORDER BY d.symbol"
        ))?;
        let symbols = stmt
            .query_map(params![date, filter.min_price, filter.min_volume], |r| r.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(symbols)
    }

    /// Rows passing the filter for `date`.
    pub fn filtered_count(&self, date: NaiveDate, filter: &PriceFilter) -> Result<u64, StoreError> {
        let n: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM daily_metrics d WHERE {FILTER_CLAUSE}"),
            params![date, filter.min_price, filter.min_volume],
            |r| r.get(0),
        )?;
        Ok(count(n))
    }

    /// Rows passing the filter that carry fundamentals.
    pub fn enriched_count(&self, date: NaiveDate, filter: &PriceFilter) -> Result<u64, StoreError> {
        let n: i64 = self.conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM daily_metrics d
                 WHERE {FILTER_CLAUSE} AND d.fundamentals_at IS NOT NULL"
            ),
            params![date, filter.min_price, filter.min_volume],
            |r| r.get(0),
        )?;
        Ok(count(n))
    }

    /// Write one batch of fundamentals onto existing rows and stamp them.
    ///
    /// Returns how many rows were updated; symbols without a row are ignored.
    pub fn write_fundamentals(
        &self,
        date: NaiveDate,
        batch: &[(String, Fundamentals)],
        at: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let assignments = FUNDAMENTAL_COLUMNS
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{c} = ?{}", i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let n = FUNDAMENTAL_COLUMNS.len();
        let sql = format!(
            "UPDATE daily_metrics SET {assignments}, fundamentals_at = ?{}
             WHERE symbol = ?{} AND date = ?{}",
            n + 1,
            n + 2,
            n + 3
        );

        let tx = self.conn.unchecked_transaction()?;
        let mut updated = 0;
        {
            let mut stmt = tx.prepare_cached(&sql)?;
            for (symbol, f) in batch {
                let mut values = fundamentals_values(f);
                values.push(Value::Text(at.format(TIMESTAMP_FORMAT).to_string()));
                values.push(Value::Text(symbol.clone()));
                values.push(Value::Text(date.format("%F").to_string()));
                updated += stmt.execute(params_from_iter(values))?;
            }
        }
        tx.commit()?;
        Ok(updated)
    }

    pub fn get_daily_metric(
        &self,
        symbol: &str,
        date: NaiveDate,
    ) -> Result<Option<DailyMetric>, StoreError> {
        let sql = format!(
            "SELECT d.symbol, d.date, d.price, d.volume, d.fundamentals_at, {}
             FROM daily_metrics d WHERE d.symbol = ?1 AND d.date = ?2",
            fundamental_select_list("d")
        );
        let metric = self
            .conn
            .query_row(&sql, params![symbol, date], |r| {
                Ok(DailyMetric {
                    symbol: r.get("symbol")?,
                    date: r.get("date")?,
                    price: r.get("price")?,
                    volume: r.get("volume")?,
                    fundamentals_at: r.get("fundamentals_at")?,
                    fundamentals: fundamentals_from_row(r)?,
                })
            })
            .optional()?;
        Ok(metric)
    }

    /// Filter-passing, enriched rows joined with their tickers, sorted by symbol.
    pub fn scoring_inputs(
        &self,
        date: NaiveDate,
        filter: &PriceFilter,
    ) -> Result<Vec<ScoringInput>, StoreError> {
        let sql = format!(
            "SELECT d.symbol, t.name, t.exchange, d.price, d.volume, {}
             FROM daily_metrics d JOIN tickers t ON t.symbol = d.symbol
             WHERE {FILTER_CLAUSE} AND d.fundamentals_at IS NOT NULL
             ORDER BY d.symbol",
            fundamental_select_list("d")
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let inputs = stmt
            .query_map(params![date, filter.min_price, filter.min_volume], |r| {
                Ok(ScoringInput {
                    symbol: r.get("symbol")?,
                    name: r.get("name")?,
                    exchange: r.get("exchange")?,
                    price: r.get("price")?,
                    volume: r.get("volume")?,
                    fundamentals: fundamentals_from_row(r)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(inputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Ticker;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 10, 17).unwrap()
    }

    fn seeded() -> Store {
        let store = Store::open_in_memory().unwrap();
        let mut etf = Ticker::new("SPY", "SPDR S&P 500", "NYSE ARCA", date());
        etf.is_etf = true;
        store
            .insert_tickers(&[
                Ticker::new("AAPL", "Apple Inc.", "NASDAQ", date()),
                Ticker::new("PENNY", "Penny Corp", "NASDAQ", date()),
                Ticker::new("THIN", "Thinly Traded Inc", "NYSE", date()),
                etf,
            ])
            .unwrap();
        store
    }

    fn quote(symbol: &str, price: f64, volume: i64) -> Quote {
        Quote {
            symbol: symbol.into(),
            price,
            volume,
        }
    }

    #[test]
    fn pending_prices_excludes_etfs_and_priced_rows() {
        let store = seeded();
        assert_eq!(store.pending_price_symbols(date()).unwrap(), vec!["AAPL", "PENNY", "THIN"]);

        store.upsert_quotes(date(), &[quote("AAPL", 150.0, 50_000_000)]).unwrap();
        assert_eq!(store.pending_price_symbols(date()).unwrap(), vec!["PENNY", "THIN"]);
        assert_eq!(store.priced_count(date()).unwrap(), 1);

        // Another day starts fresh
        let tomorrow = date().succ_opt().unwrap();
        assert_eq!(store.pending_price_symbols(tomorrow).unwrap().len(), 3);
    }

    #[test]
    fn filter_and_fundamentals_lifecycle() {
        let store = seeded();
        let filter = PriceFilter::default();
        store
            .upsert_quotes(
                date(),
                &[
                    quote("AAPL", 150.0, 50_000_000),
                    quote("PENNY", 2.0, 10_000_000),
                    quote("THIN", 20.0, 99_999),
                ],
            )
            .unwrap();

        assert_eq!(store.pending_fundamentals_symbols(date(), &filter).unwrap(), vec!["AAPL"]);
        assert_eq!(store.filtered_count(date(), &filter).unwrap(), 1);
        assert_eq!(store.enriched_count(date(), &filter).unwrap(), 0);
        assert!(store.scoring_inputs(date(), &filter).unwrap().is_empty());

        let f = Fundamentals {
            market_cap: Some(3.0e12),
            beta: Some(1.2),
            num_analyst_opinions: Some(38),
            sector: Some("Technology".into()),
            ..Default::default()
        };
        let updated = store
            .write_fundamentals(
                date(),
                &[("AAPL".to_string(), f.clone()), ("GHOST".to_string(), f.clone())],
                Utc::now(),
            )
            .unwrap();
        assert_eq!(updated, 1);

        assert!(store.pending_fundamentals_symbols(date(), &filter).unwrap().is_empty());
        assert_eq!(store.enriched_count(date(), &filter).unwrap(), 1);

        let row = store.get_daily_metric("AAPL", date()).unwrap().unwrap();
        assert!(row.has_fundamentals());
        assert_eq!(row.fundamentals, f);
        assert_eq!(row.price, Some(150.0));

        let inputs = store.scoring_inputs(date(), &filter).unwrap();
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].name, "Apple Inc.");
        assert_eq!(inputs[0].fundamentals.sector.as_deref(), Some("Technology"));
    }

    #[test]
    fn requoting_keeps_fundamentals() {
        let store = seeded();
        store.upsert_quotes(date(), &[quote("AAPL", 150.0, 50_000_000)]).unwrap();
        let f = Fundamentals {
            beta: Some(1.1),
            ..Default::default()
        };
        store
            .write_fundamentals(date(), &[("AAPL".to_string(), f)], Utc::now())
            .unwrap();
        store.upsert_quotes(date(), &[quote("AAPL", 151.0, 51_000_000)]).unwrap();

        let row = store.get_daily_metric("AAPL", date()).unwrap().unwrap();
        assert_eq!(row.price, Some(151.0));
        assert_eq!(row.fundamentals.beta, Some(1.1));
        assert!(row.has_fundamentals());
    }
}
