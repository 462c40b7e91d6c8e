//! Single OHLCV bar, closed at its close time.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A closed OHLCV bar on one timeframe.
///
/// `open_time` and `close_time` bound the sampling interval; a bar only
/// exists once it has closed. Bars of a timeframe are totally ordered by
/// `open_time`, strictly increasing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub open_time: DateTime<Utc>,
    pub close_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(
        open_time: DateTime<Utc>,
        close_time: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self { open_time, close_time, open, high, low, close, volume }
    }

    /// Build a bar from exchange-style millisecond epochs.
    pub fn from_millis(
        open_ms: i64,
        close_ms: i64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            open_time: Utc.timestamp_millis_opt(open_ms).single().unwrap_or_default(),
            close_time: Utc.timestamp_millis_opt(close_ms).single().unwrap_or_default(),
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Validate bar invariants.
    pub fn validate(&self) -> Result<(), BarError> {
        if !(self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite())
        {
            return Err(BarError::NonFinitePrice);
        }
        if self.high < self.low {
            return Err(BarError::InvalidRange { high: self.high, low: self.low });
        }
        if self.open <= 0.0 || self.high <= 0.0 || self.low <= 0.0 || self.close <= 0.0 {
            return Err(BarError::NonPositivePrice);
        }
        if self.volume < 0.0 {
            return Err(BarError::NegativeVolume);
        }
        if !(self.low..=self.high).contains(&self.open) {
            return Err(BarError::OpenOutOfRange);
        }
        if !(self.low..=self.high).contains(&self.close) {
            return Err(BarError::CloseOutOfRange);
        }
        if self.close_time <= self.open_time {
            return Err(BarError::InvertedInterval);
        }
        Ok(())
    }

    /// Bar range (high - low).
    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}

#[derive(Debug, Error)]
pub enum BarError {
    #[error("invalid bar range: high={high}, low={low}")]
    InvalidRange { high: f64, low: f64 },

    #[error("non-positive price not allowed")]
    NonPositivePrice,

    #[error("non-finite price not allowed")]
    NonFinitePrice,

    #[error("negative volume not allowed")]
    NegativeVolume,

    #[error("open price outside high/low range")]
    OpenOutOfRange,

    #[error("close price outside high/low range")]
    CloseOutOfRange,

    #[error("close_time must be after open_time")]
    InvertedInterval,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(open: f64, high: f64, low: f64, close: f64) -> Bar {
        Bar::from_millis(0, 3_600_000, open, high, low, close, 1000.0)
    }

    #[test]
    fn valid_bar_passes() {
        assert!(bar(100.0, 105.0, 95.0, 102.0).validate().is_ok());
    }

    #[test]
    fn inverted_range_rejected() {
        let b = bar(100.0, 99.0, 101.0, 100.0);
        assert!(matches!(b.validate(), Err(BarError::InvalidRange { .. })));
    }

    #[test]
    fn open_outside_range_rejected() {
        let b = bar(110.0, 105.0, 95.0, 102.0);
        assert!(matches!(b.validate(), Err(BarError::OpenOutOfRange)));
    }

    #[test]
    fn negative_volume_rejected() {
        let mut b = bar(100.0, 105.0, 95.0, 102.0);
        b.volume = -1.0;
        assert!(matches!(b.validate(), Err(BarError::NegativeVolume)));
    }

    #[test]
    fn inverted_interval_rejected() {
        let b = Bar::from_millis(3_600_000, 0, 100.0, 105.0, 95.0, 102.0, 1.0);
        assert!(matches!(b.validate(), Err(BarError::InvertedInterval)));
    }

    #[test]
    fn millis_round_trip() {
        let b = bar(100.0, 105.0, 95.0, 102.0);
        assert_eq!(b.open_time.timestamp_millis(), 0);
        assert_eq!(b.close_time.timestamp_millis(), 3_600_000);
    }
}
