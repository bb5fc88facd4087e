//! Relative Strength Index (RSI).
//!
//! Simple-mean approximation of Wilder smoothing over the last `period`
//! close-to-close deltas, where the first close contributes a zero delta.
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss)
//! Edge cases: fewer than `period` closes → None; avg_loss == 0 → None.

use super::Indicator;

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    name: String,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "RSI period must be >= 1");
        Self {
            period,
            name: format!("rsi_{period}"),
        }
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn latest(&self, closes: &[f64]) -> Option<f64> {
        let n = closes.len();
        if n < self.period {
            return None;
        }

        let mut gain = 0.0;
        let mut loss = 0.0;
        for i in (n - self.period)..n {
            // The oldest close has no predecessor
            let change = if i == 0 { 0.0 } else { closes[i] - closes[i - 1] };
            if !change.is_finite() {
                return None;
            }
            if change > 0.0 {
                gain += change;
            } else {
                loss -= change;
            }
        }

        let avg_gain = gain / self.period as f64;
        let avg_loss = loss / self.period as f64;
        if avg_loss == 0.0 {
            return None;
        }

        let rs = avg_gain / avg_loss;
        Some(100.0 - 100.0 / (1.0 + rs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    fn ramp(start: f64, step: f64, n: usize) -> Vec<f64> {
        (0..n).map(|i| start + step * i as f64).collect()
    }

    #[test]
    fn rsi_mostly_gains() {
        // 13 up days then one down day of equal size
        let mut closes = ramp(100.0, 1.0, 14);
        closes.push(112.0);
        let v = Rsi::new(14).latest(&closes).unwrap();
        assert_approx(v, 100.0 - 100.0 / 14.0, DEFAULT_EPSILON);
    }

    #[test]
    fn rsi_all_losses_is_zero() {
        let closes = ramp(200.0, -1.0, 30);
        let v = Rsi::new(14).latest(&closes).unwrap();
        assert_approx(v, 0.0, DEFAULT_EPSILON);
    }

    #[test]
    fn rsi_no_losses_is_undefined() {
        assert_eq!(Rsi::new(14).latest(&ramp(100.0, 1.0, 30)), None);
        assert_eq!(Rsi::new(14).latest(&vec![50.0; 30]), None);
    }

    #[test]
    fn rsi_too_few_closes() {
        assert_eq!(Rsi::new(14).latest(&ramp(100.0, -1.0, 13)), None);
    }

    #[test]
    fn rsi_exactly_period_closes_counts_leading_zero_delta() {
        // 14 closes: deltas are [0, -1 x 13]
        let v = Rsi::new(14).latest(&ramp(100.0, -1.0, 14)).unwrap();
        assert_approx(v, 0.0, DEFAULT_EPSILON);
    }

    #[test]
    fn rsi_balanced_is_fifty() {
        let closes: Vec<f64> = (0..30).map(|i| if i % 2 == 0 { 100.0 } else { 101.0 }).collect();
        let v = Rsi::new(14).latest(&closes).unwrap();
        assert_approx(v, 50.0, DEFAULT_EPSILON);
    }
}
