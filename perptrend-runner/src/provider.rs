//! Bar-provider boundary.
//!
//! Providers only ever hand over *closed* bars, ascending by open time and
//! de-duplicated. The engine never sees a forming bar.

use chrono::{DateTime, Utc};
use perptrend_core::domain::{Bar, Timeframe};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("no data for {symbol} {timeframe}")]
    NoData { symbol: String, timeframe: Timeframe },

    #[error("provider error: {0}")]
    Other(String),
}

/// Source of closed bars, historical and forward.
pub trait BarProvider {
    /// All bars fully closed inside `[start, end]`, ascending by open
    /// time, de-duplicated by open time.
    fn fetch_closed(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Bar>, ProviderError>;

    /// The last `n` closed bars. Never returns a forming bar.
    fn poll_tail(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        n: usize,
    ) -> Result<Vec<Bar>, ProviderError>;
}

/// Pre-loaded provider for backtests and paper-loop simulation.
///
/// `poll_tail` only sees bars closed at or before the provider's watermark,
/// which tests advance with [`ReplayProvider::set_now`] to simulate bars
/// arriving over time.
#[derive(Debug, Clone)]
pub struct ReplayProvider {
    series: HashMap<Timeframe, Vec<Bar>>,
    now: DateTime<Utc>,
}

impl ReplayProvider {
    pub fn new() -> Self {
        Self { series: HashMap::new(), now: DateTime::<Utc>::MAX_UTC }
    }

    pub fn with_series(mut self, timeframe: Timeframe, mut bars: Vec<Bar>) -> Self {
        bars.sort_by_key(|b| b.open_time);
        bars.dedup_by_key(|b| b.open_time);
        self.series.insert(timeframe, bars);
        self
    }

    /// Move the watermark; `poll_tail` then sees exactly the bars closed
    /// at or before `now`.
    pub fn set_now(&mut self, now: DateTime<Utc>) {
        self.now = now;
    }

    fn bars(&self, symbol: &str, timeframe: Timeframe) -> Result<&[Bar], ProviderError> {
        self.series
            .get(&timeframe)
            .map(|v| v.as_slice())
            .ok_or_else(|| ProviderError::NoData { symbol: symbol.to_string(), timeframe })
    }
}

impl Default for ReplayProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl BarProvider for ReplayProvider {
    fn fetch_closed(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Bar>, ProviderError> {
        let bars = self.bars(symbol, timeframe)?;
        Ok(bars
            .iter()
            .filter(|b| b.open_time >= start && b.close_time <= end)
            .cloned()
            .collect())
    }

    fn poll_tail(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        n: usize,
    ) -> Result<Vec<Bar>, ProviderError> {
        let bars = self.bars(symbol, timeframe)?;
        let closed: Vec<Bar> =
            bars.iter().filter(|b| b.close_time <= self.now).cloned().collect();
        let start = closed.len().saturating_sub(n);
        Ok(closed[start..].to_vec())
    }
}
