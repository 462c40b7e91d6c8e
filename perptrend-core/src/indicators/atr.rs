//! Average True Range (ATR), Wilder.
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|).
//! Seed: ATR[period] = mean(TR[1..=period]) — TR[0] has no previous close
//! and is excluded from the seed. Thereafter
//! ATR[t] = (ATR[t-1]*(period-1) + TR[t]) / period.
//! Lookback: period.

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    name: String,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ATR period must be >= 1");
        Self { period, name: format!("atr_{period}") }
    }
}

/// True Range series.
/// TR[0] = high[0] - low[0] (no previous close).
/// TR[t] = max(high[t]-low[t], |high[t]-close[t-1]|, |low[t]-close[t-1]|).
pub fn true_range(bars: &[Bar]) -> Vec<f64> {
    let n = bars.len();
    let mut tr = Vec::with_capacity(n);

    if n == 0 {
        return tr;
    }

    tr.push(bars[0].high - bars[0].low);
    for i in 1..n {
        let h = bars[i].high;
        let l = bars[i].low;
        let pc = bars[i - 1].close;
        tr.push((h - l).max((h - pc).abs()).max((l - pc).abs()));
    }

    tr
}

impl Indicator for Atr {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<Option<f64>> {
        let n = bars.len();
        let p = self.period;
        let mut result = vec![None; n];

        if n < p + 1 {
            return result;
        }

        let tr = true_range(bars);

        // Seed over TR[1..=p]; TR[0] is not a proper true range.
        let seed: f64 = tr[1..=p].iter().sum::<f64>() / p as f64;
        result[p] = Some(seed);

        let mut prev = seed;
        for i in (p + 1)..n {
            let atr = (prev * (p as f64 - 1.0) + tr[i]) / p as f64;
            result[i] = Some(atr);
            prev = atr;
        }

        result
    }
}
