//! Data-quality validation for fetched bar series.
//!
//! Fatal in backtests: a series that fails here never reaches the engine.
//! Checks ordering, duplicates, per-bar OHLC sanity (with a small relative
//! epsilon for feed rounding), and gaps against the modal bar interval.

use perptrend_core::domain::{Bar, Timeframe};
use std::collections::HashMap;
use thiserror::Error;

/// Relative tolerance for open/close sitting just outside [low, high].
const RANGE_EPSILON: f64 = 1e-9;

/// A gap wider than this multiple of the modal interval is an error.
const MAX_GAP_MULTIPLE: i64 = 3;

#[derive(Debug, Error)]
pub enum DataQualityError {
    #[error("{symbol} {timeframe}: empty series")]
    Empty { symbol: String, timeframe: Timeframe },

    #[error("{symbol} {timeframe}: duplicate bar at open_time {open_ms}")]
    DuplicateBar { symbol: String, timeframe: Timeframe, open_ms: i64 },

    #[error("{symbol} {timeframe}: non-monotonic open_time at index {index}")]
    NonMonotonic { symbol: String, timeframe: Timeframe, index: usize },

    #[error("{symbol} {timeframe}: bar {index} has high {high} < low {low}")]
    InvalidRange { symbol: String, timeframe: Timeframe, index: usize, high: f64, low: f64 },

    #[error("{symbol} {timeframe}: bar {index} has open/close outside [low, high]")]
    OhlcOutOfRange { symbol: String, timeframe: Timeframe, index: usize },

    #[error("{symbol} {timeframe}: bar {index} has a non-positive or non-finite price")]
    BadPrice { symbol: String, timeframe: Timeframe, index: usize },

    #[error(
        "{symbol} {timeframe}: gap of {gap_ms}ms before index {index} (modal interval {modal_ms}ms)"
    )]
    ExcessiveGap {
        symbol: String,
        timeframe: Timeframe,
        index: usize,
        gap_ms: i64,
        modal_ms: i64,
    },
}

/// Validate one fetched series. Reported per symbol.
pub fn validate_series(
    symbol: &str,
    timeframe: Timeframe,
    bars: &[Bar],
) -> Result<(), DataQualityError> {
    let sym = || symbol.to_string();

    if bars.is_empty() {
        return Err(DataQualityError::Empty { symbol: sym(), timeframe });
    }

    for (index, bar) in bars.iter().enumerate() {
        if !(bar.open.is_finite() && bar.high.is_finite() && bar.low.is_finite() && bar.close.is_finite())
            || bar.open <= 0.0
            || bar.high <= 0.0
            || bar.low <= 0.0
            || bar.close <= 0.0
        {
            return Err(DataQualityError::BadPrice { symbol: sym(), timeframe, index });
        }
        if bar.high < bar.low {
            return Err(DataQualityError::InvalidRange {
                symbol: sym(),
                timeframe,
                index,
                high: bar.high,
                low: bar.low,
            });
        }
        let tolerance = bar.high.abs() * RANGE_EPSILON;
        let below = bar.low - tolerance;
        let above = bar.high + tolerance;
        if bar.open < below || bar.open > above || bar.close < below || bar.close > above {
            return Err(DataQualityError::OhlcOutOfRange { symbol: sym(), timeframe, index });
        }
    }

    for index in 1..bars.len() {
        let prev = bars[index - 1].open_time;
        let cur = bars[index].open_time;
        if cur == prev {
            return Err(DataQualityError::DuplicateBar {
                symbol: sym(),
                timeframe,
                open_ms: cur.timestamp_millis(),
            });
        }
        if cur < prev {
            return Err(DataQualityError::NonMonotonic { symbol: sym(), timeframe, index });
        }
    }

    if let Some(modal_ms) = modal_interval_ms(bars) {
        for index in 1..bars.len() {
            let gap_ms = (bars[index].open_time - bars[index - 1].open_time).num_milliseconds();
            if gap_ms > modal_ms * MAX_GAP_MULTIPLE {
                return Err(DataQualityError::ExcessiveGap {
                    symbol: sym(),
                    timeframe,
                    index,
                    gap_ms,
                    modal_ms,
                });
            }
        }
    }

    Ok(())
}

/// Most frequent open-to-open interval.
fn modal_interval_ms(bars: &[Bar]) -> Option<i64> {
    let mut counts: HashMap<i64, usize> = HashMap::new();
    for pair in bars.windows(2) {
        let gap = (pair[1].open_time - pair[0].open_time).num_milliseconds();
        *counts.entry(gap).or_insert(0) += 1;
    }
    counts.into_iter().max_by_key(|&(gap, count)| (count, std::cmp::Reverse(gap))).map(|(gap, _)| gap)
}
