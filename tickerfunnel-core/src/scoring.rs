//! Composite strategy scores and percentile ranking.
//!
//! Raw scores are computed per symbol with neutral defaults for missing
//! fundamentals, then rescaled to a 0..=100 percentile across the day's
//! filtered universe.
//!
//! Percentile convention: tied values share their average 1-based rank `r`;
//! with `n` ranked values the score is `floor((r - 1) * 100 / (n - 1))`.
//! The lowest value scores 0, the highest 100, and a single value or an
//! all-equal column scores 50. Non-finite raw values are left out of the
//! ranking and score 50.

use crate::domain::{Fundamentals, ScoreKind, ScoringInput, StrategyScores};

/// Score assigned to unrankable values.
pub const NEUTRAL_PERCENTILE: u8 = 50;

/// Raw, pre-percentile scores for one symbol.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawScores {
    pub dividend_daddy: f64,
    pub moon_shot: f64,
    pub falling_knife: f64,
    pub over_hyped: f64,
    pub inst_whale: f64,
}

impl RawScores {
    pub fn get(&self, kind: ScoreKind) -> f64 {
        match kind {
            ScoreKind::DividendDaddy => self.dividend_daddy,
            ScoreKind::MoonShot => self.moon_shot,
            ScoreKind::FallingKnife => self.falling_knife,
            ScoreKind::OverHyped => self.over_hyped,
            ScoreKind::InstWhale => self.inst_whale,
        }
    }
}

/// Compute the five raw scores.
pub fn raw_scores(price: f64, f: &Fundamentals) -> RawScores {
    let rsi = f.rsi_14.unwrap_or(50.0);
    let ma_200 = f.ma_200.unwrap_or(price);

    RawScores {
        // High yield, low volatility
        dividend_daddy: f.dividend_yield.unwrap_or(0.0) * 100.0
            + (100.0 - f.beta.unwrap_or(1.0).abs() * 50.0),
        // High beta, not yet overbought
        moon_shot: f.beta.unwrap_or(0.0) * 50.0 + (100.0 - rsi),
        // Oversold and trading below the 200-day average
        falling_knife: (100.0 - rsi) + (ma_200 - price) / price * 100.0,
        over_hyped: rsi,
        inst_whale: f.market_cap.unwrap_or(1.0).log10(),
    }
}

/// Percentile-rank a column of raw values. Output is aligned with the input.
pub fn percentile_ranks(values: &[f64]) -> Vec<u8> {
    let mut out = vec![NEUTRAL_PERCENTILE; values.len()];

    let mut ranked: Vec<usize> = (0..values.len()).filter(|&i| values[i].is_finite()).collect();
    let n = ranked.len();
    if n < 2 {
        return out;
    }
    ranked.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut start = 0;
    while start < n {
        let mut end = start + 1;
        while end < n && values[ranked[end]] == values[ranked[start]] {
            end += 1;
        }
        // Ranks start+1..=end share their mean
        let avg_rank = (start + 1 + end) as f64 / 2.0;
        let pct = ((avg_rank - 1.0) * 100.0 / (n - 1) as f64).floor();
        let score = pct.clamp(0.0, 100.0) as u8;
        for &i in &ranked[start..end] {
            out[i] = score;
        }
        start = end;
    }

    out
}

/// Score a filtered universe. Output is aligned with `inputs`.
pub fn score_universe(inputs: &[ScoringInput]) -> Vec<StrategyScores> {
    let raws: Vec<RawScores> = inputs
        .iter()
        .map(|i| raw_scores(i.price, &i.fundamentals))
        .collect();

    let mut scores = vec![StrategyScores::default(); inputs.len()];
    for kind in ScoreKind::ALL {
        let column: Vec<f64> = raws.iter().map(|r| r.get(kind)).collect();
        for (score, pct) in scores.iter_mut().zip(percentile_ranks(&column)) {
            score.set(kind, pct);
        }
    }
    scores
}
