//! Simple Moving Average (SMA).
//!
//! Mean of the trailing `period` closes. `None` with fewer closes than the
//! period or a non-finite close inside the window.

use super::Indicator;

#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    name: String,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "SMA period must be >= 1");
        Self {
            period,
            name: format!("sma_{period}"),
        }
    }
}

impl Indicator for Sma {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn latest(&self, closes: &[f64]) -> Option<f64> {
        if closes.len() < self.period {
            return None;
        }
        let window = &closes[closes.len() - self.period..];
        if window.iter().any(|c| !c.is_finite()) {
            return None;
        }
        Some(window.iter().sum::<f64>() / self.period as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn sma_uses_trailing_window() {
        let sma = Sma::new(5);
        let v = sma.latest(&[10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0]).unwrap();
        // mean(12,13,14,15,16)
        assert_approx(v, 14.0, DEFAULT_EPSILON);
    }

    #[test]
    fn sma_exact_length() {
        let v = Sma::new(3).latest(&[1.0, 2.0, 6.0]).unwrap();
        assert_approx(v, 3.0, DEFAULT_EPSILON);
    }

    #[test]
    fn sma_too_few_closes() {
        assert_eq!(Sma::new(200).latest(&vec![100.0; 199]), None);
        assert!(Sma::new(200).latest(&vec![100.0; 200]).is_some());
    }

    #[test]
    fn sma_nan_in_window() {
        assert_eq!(Sma::new(3).latest(&[1.0, f64::NAN, 2.0, 3.0]), None);
        // NaN outside the window is ignored
        assert!(Sma::new(2).latest(&[f64::NAN, 2.0, 3.0]).is_some());
    }

    #[test]
    fn sma_name_and_lookback() {
        let sma = Sma::new(50);
        assert_eq!(sma.name(), "sma_50");
        assert_eq!(sma.lookback(), 50);
    }
}
