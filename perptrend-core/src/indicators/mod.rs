//! Indicator primitives.
//!
//! All primitives are pure: bar history in, a series of the same length
//! out, with the warm-up prefix `None`. No value at bar t depends on data
//! from bar t+1 or later; every indicator must pass the truncated-vs-full
//! series test.

pub mod adx;
pub mod atr;
pub mod donchian;
pub mod ema;

pub use adx::Adx;
pub use atr::Atr;
pub use donchian::DonchianHigh;
pub use ema::Ema;

use crate::domain::Bar;

/// Trait for indicators.
///
/// `compute` returns a series of the same length as `bars`; the first
/// `lookback()` entries are `None` (warm-up).
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g. "ema_20", "atr_14").
    fn name(&self) -> &str;

    /// Number of bars consumed before the first defined output.
    fn lookback(&self) -> usize;

    /// Compute the indicator for the entire bar series.
    fn compute(&self, bars: &[Bar]) -> Vec<Option<f64>>;
}

/// Create synthetic bars from close prices for testing.
///
/// Generates plausible OHLCV on an hourly grid: open = prev close (or close
/// for the first bar), high/low bracket open and close by 1.0.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            let high = open.max(close) + 1.0;
            let low = (open.min(close) - 1.0).max(0.01);
            Bar::from_millis(
                i as i64 * 3_600_000,
                (i as i64 + 1) * 3_600_000,
                open,
                high,
                low,
                close,
                1000.0,
            )
        })
        .collect()
}

/// Create synthetic bars from (open, high, low, close) tuples.
#[cfg(test)]
pub fn make_ohlc_bars(data: &[(f64, f64, f64, f64)]) -> Vec<Bar> {
    data.iter()
        .enumerate()
        .map(|(i, &(open, high, low, close))| {
            Bar::from_millis(
                i as i64 * 3_600_000,
                (i as i64 + 1) * 3_600_000,
                open,
                high,
                low,
                close,
                1000.0,
            )
        })
        .collect()
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
