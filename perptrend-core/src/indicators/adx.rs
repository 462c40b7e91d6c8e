//! ADX / ±DI — Average Directional Index (strict Wilder).
//!
//! Steps:
//! 1. +DM/-DM from consecutive bars; when both candidates are positive the
//!    larger wins and the smaller is zeroed; exact ties zero both.
//! 2. Wilder running smooth of TR, +DM, -DM: seed at index `period` as the
//!    sum over bars 1..=period, then S[t] = S[t-1] - S[t-1]/period + x[t].
//! 3. +DI = 100 * smoothed(+DM) / smoothed(TR), likewise -DI. A zero
//!    smoothed TR maps to zero DIs (never NaN).
//! 4. DX = 100 * |+DI - -DI| / (+DI + -DI), zero when the denominator is 0.
//! 5. ADX seeded at index 2*period - 1 as mean(DX[period..=2*period-1]),
//!    then ADX[t] = (ADX[t-1]*(period-1) + DX[t]) / period.
//!
//! Lookback: 2 * period - 1.

use super::atr::true_range;
use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Adx {
    period: usize,
    name: String,
}

impl Adx {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ADX period must be >= 1");
        Self { period, name: format!("adx_{period}") }
    }
}

/// Directional movement per bar. Index 0 is zero (no predecessor).
fn directional_movement(bars: &[Bar]) -> (Vec<f64>, Vec<f64>) {
    let n = bars.len();
    let mut plus_dm = vec![0.0; n];
    let mut minus_dm = vec![0.0; n];

    for i in 1..n {
        let high_diff = bars[i].high - bars[i - 1].high;
        let low_diff = bars[i - 1].low - bars[i].low;

        if high_diff > low_diff && high_diff > 0.0 {
            plus_dm[i] = high_diff;
        }
        if low_diff > high_diff && low_diff > 0.0 {
            minus_dm[i] = low_diff;
        }
    }

    (plus_dm, minus_dm)
}

/// Wilder running smooth. Seed at index `period` with the sum of
/// `values[1..=period]`; undefined before that.
fn wilder_running_sum(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let n = values.len();
    let mut result = vec![None; n];

    if n < period + 1 {
        return result;
    }

    let seed: f64 = values[1..=period].iter().sum();
    result[period] = Some(seed);

    let mut prev = seed;
    for i in (period + 1)..n {
        let s = prev - prev / period as f64 + values[i];
        result[i] = Some(s);
        prev = s;
    }

    result
}

/// ±DI series. Defined from index `period`.
pub fn di_series(bars: &[Bar], period: usize) -> (Vec<Option<f64>>, Vec<Option<f64>>) {
    let n = bars.len();
    let tr = true_range(bars);
    let (plus_dm, minus_dm) = directional_movement(bars);

    let smooth_tr = wilder_running_sum(&tr, period);
    let smooth_plus = wilder_running_sum(&plus_dm, period);
    let smooth_minus = wilder_running_sum(&minus_dm, period);

    let mut plus_di = vec![None; n];
    let mut minus_di = vec![None; n];

    for i in 0..n {
        let (Some(tr_s), Some(p_s), Some(m_s)) = (smooth_tr[i], smooth_plus[i], smooth_minus[i])
        else {
            continue;
        };
        if tr_s == 0.0 {
            plus_di[i] = Some(0.0);
            minus_di[i] = Some(0.0);
        } else {
            plus_di[i] = Some(100.0 * p_s / tr_s);
            minus_di[i] = Some(100.0 * m_s / tr_s);
        }
    }

    (plus_di, minus_di)
}

/// ADX series. Defined from index `2*period - 1`.
pub fn adx_series(bars: &[Bar], period: usize) -> Vec<Option<f64>> {
    let n = bars.len();
    let p = period;
    let mut result = vec![None; n];

    let (plus_di, minus_di) = di_series(bars, p);

    let mut dx = vec![None; n];
    for i in 0..n {
        let (Some(plus), Some(minus)) = (plus_di[i], minus_di[i]) else {
            continue;
        };
        let di_sum = plus + minus;
        dx[i] = Some(if di_sum == 0.0 { 0.0 } else { 100.0 * (plus - minus).abs() / di_sum });
    }

    let first = 2 * p - 1;
    if n <= first {
        return result;
    }

    // Seed: mean of DX over indices p..=2p-1 (p values, all defined).
    let mut seed_sum = 0.0;
    for value in dx[p..=first].iter() {
        match value {
            Some(v) => seed_sum += v,
            None => return result,
        }
    }
    let seed = seed_sum / p as f64;
    result[first] = Some(seed);

    let mut prev = seed;
    for i in (first + 1)..n {
        let Some(dx_i) = dx[i] else { return result };
        let adx = (prev * (p as f64 - 1.0) + dx_i) / p as f64;
        result[i] = Some(adx);
        prev = adx;
    }

    result
}

impl Indicator for Adx {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        2 * self.period - 1
    }

    fn compute(&self, bars: &[Bar]) -> Vec<Option<f64>> {
        adx_series(bars, self.period)
    }
}
