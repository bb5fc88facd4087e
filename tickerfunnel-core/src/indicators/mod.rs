//! Price-history indicators derived during Pass 2.
//!
//! Only the latest value of each indicator is persisted, so indicators here
//! reduce a close series (oldest first) to a single optional reading.
//! `None` means the history was too short or the value is undefined.

pub mod rsi;
pub mod sma;

pub use rsi::Rsi;
pub use sma::Sma;

/// A reduction of a close series to its most recent indicator value.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "sma_200", "rsi_14").
    fn name(&self) -> &str;

    /// Minimum number of closes needed for a value.
    fn lookback(&self) -> usize;

    /// Indicator value as of the last close.
    fn latest(&self, closes: &[f64]) -> Option<f64>;
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
