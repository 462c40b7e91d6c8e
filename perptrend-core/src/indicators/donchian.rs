//! Donchian high — highest high over strictly preceding bars.
//!
//! Value at bar t is max(high[t-period..t]) clamped to available history:
//! the window never includes bar t itself, so a close above the channel is
//! a genuine breakout of already-closed bars. Undefined at t = 0 only.
//!
//! Lookback: 1.

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct DonchianHigh {
    period: usize,
    name: String,
}

impl DonchianHigh {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "Donchian period must be >= 1");
        Self { period, name: format!("donchian_high_{period}") }
    }
}

impl Indicator for DonchianHigh {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        1
    }

    fn compute(&self, bars: &[Bar]) -> Vec<Option<f64>> {
        let n = bars.len();
        let mut result = vec![None; n];

        for i in 1..n {
            let start = i.saturating_sub(self.period);
            let mut max_high = f64::NEG_INFINITY;
            for bar in &bars[start..i] {
                if bar.high > max_high {
                    max_high = bar.high;
                }
            }
            result[i] = Some(max_high);
        }

        result
    }
}
