//! `strategy_scores`: overwritten on every build.

use super::{count, Store, StoreError};
use crate::domain::StrategyScores;
use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension};

impl Store {
    /// Replace the scores for `date` with `scores` in one transaction.
    ///
    /// Rows for symbols no longer in the scored universe are removed so the
    /// table only ever reflects the latest build.
    pub fn replace_scores(
        &self,
        date: NaiveDate,
        scores: &[(String, StrategyScores)],
    ) -> Result<usize, StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM strategy_scores WHERE date = ?1", params![date])?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO strategy_scores (
                     symbol, date, dividend_daddy_score, moon_shot_score,
                     falling_knife_score, over_hyped_score, inst_whale_score
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(symbol, date) DO UPDATE SET
                     dividend_daddy_score = excluded.dividend_daddy_score,
                     moon_shot_score = excluded.moon_shot_score,
                     falling_knife_score = excluded.falling_knife_score,
                     over_hyped_score = excluded.over_hyped_score,
                     inst_whale_score = excluded.inst_whale_score",
            )?;
            for (symbol, s) in scores {
                stmt.execute(params![
                    symbol,
                    date,
                    s.dividend_daddy,
                    s.moon_shot,
                    s.falling_knife,
                    s.over_hyped,
                    s.inst_whale
                ])?;
            }
        }
        tx.commit()?;
        Ok(scores.len())
    }

    pub fn score_count(&self, date: NaiveDate) -> Result<u64, StoreError> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM strategy_scores WHERE date = ?1",
            params![date],
            |r| r.get(0),
        )?;
        Ok(count(n))
    }

    pub fn get_scores(
        &self,
        symbol: &str,
        date: NaiveDate,
    ) -> Result<Option<StrategyScores>, StoreError> {
        let scores = self
            .conn
            .query_row(
                "SELECT dividend_daddy_score, moon_shot_score, falling_knife_score,
                        over_hyped_score, inst_whale_score
                 FROM strategy_scores WHERE symbol = ?1 AND date = ?2",
                params![symbol, date],
                |r| {
                    Ok(StrategyScores {
                        dividend_daddy: r.get(0)?,
                        moon_shot: r.get(1)?,
                        falling_knife: r.get(2)?,
                        over_hyped: r.get(3)?,
                        inst_whale: r.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(scores)
    }

    /// Symbols scored for `date`, sorted.
    pub fn scored_symbols(&self, date: NaiveDate) -> Result<Vec<String>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT symbol FROM strategy_scores WHERE date = ?1 ORDER BY symbol")?;
        let symbols = stmt
            .query_map(params![date], |r| r.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(symbols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rebuild_overwrites_instead_of_accumulating() {
        let store = Store::open_in_memory().unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 10, 17).unwrap();
        let s = |v: u8| StrategyScores {
            dividend_daddy: v,
            moon_shot: v,
            falling_knife: v,
            over_hyped: v,
            inst_whale: v,
        };

        store
            .replace_scores(date, &[("A".into(), s(10)), ("B".into(), s(90))])
            .unwrap();
        store.replace_scores(date, &[("A".into(), s(55))]).unwrap();

        assert_eq!(store.score_count(date).unwrap(), 1);
        assert_eq!(store.get_scores("A", date).unwrap(), Some(s(55)));
        assert_eq!(store.get_scores("B", date).unwrap(), None);
        assert_eq!(store.scored_symbols(date).unwrap(), vec!["A"]);
    }
}
