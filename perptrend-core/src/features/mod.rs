//! Per-bar feature records.
//!
//! The primitives are computed once over the full series and bundled into
//! one record per bar; the bar loop then queries by index and never
//! recomputes. Fields stay `None` through their warm-up.

pub mod align;

use crate::config::{IndicatorConfig, StrategyParams};
use crate::domain::Bar;
use crate::indicators::adx::adx_series;
use crate::indicators::ema::ema_of_series;
use crate::indicators::{Adx, Atr, DonchianHigh, Ema, Indicator};

pub use align::{align_htf_to_ltf, AlignmentError};

/// Higher-timeframe regime features for one HTF bar.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HtfFeatures {
    pub ema_medium: Option<f64>,
    pub ema_long: Option<f64>,
    pub adx: Option<f64>,
}

impl HtfFeatures {
    /// Record with every field undefined (pre-warm-up / pre-alignment).
    pub fn undefined() -> Self {
        Self::default()
    }

    pub fn is_complete(&self) -> bool {
        self.ema_medium.is_some() && self.ema_long.is_some() && self.adx.is_some()
    }
}

/// Lower-timeframe entry/stop features for one LTF bar.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LtfFeatures {
    pub ema_short: Option<f64>,
    pub ema_medium: Option<f64>,
    pub adx: Option<f64>,
    /// Defined ADX values from bars strictly before this one, oldest first.
    /// Sized to cover the trend-exhaustion window.
    pub adx_history: Vec<f64>,
    pub atr: Option<f64>,
    /// Highest high over preceding bars; never includes this bar.
    pub donchian_high: Option<f64>,
}

/// Build one `HtfFeatures` record per HTF bar.
pub fn build_htf_features(bars: &[Bar], indicators: &IndicatorConfig) -> Vec<HtfFeatures> {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let ema_medium = ema_of_series(&closes, indicators.ema_medium);
    let ema_long = ema_of_series(&closes, indicators.ema_long);
    let adx = adx_series(bars, indicators.adx_period);

    (0..bars.len())
        .map(|i| HtfFeatures { ema_medium: ema_medium[i], ema_long: ema_long[i], adx: adx[i] })
        .collect()
}

/// Build one `LtfFeatures` record per LTF bar.
///
/// `adx_history_len` is the number of strictly-preceding ADX values kept per
/// bar; callers size it to at least `trend_exhaust_bars + 1`.
pub fn build_ltf_features(
    bars: &[Bar],
    indicators: &IndicatorConfig,
    strategy: &StrategyParams,
    adx_history_len: usize,
) -> Vec<LtfFeatures> {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let ema_short = ema_of_series(&closes, indicators.ema_short);
    let ema_medium = ema_of_series(&closes, indicators.ema_medium);
    let adx = adx_series(bars, indicators.adx_period);
    let atr = Atr::new(indicators.atr_period).compute(bars);
    let donchian = DonchianHigh::new(strategy.lookback_period).compute(bars);

    (0..bars.len())
        .map(|i| {
            let start = i.saturating_sub(adx_history_len);
            let adx_history: Vec<f64> = adx[start..i].iter().filter_map(|v| *v).collect();
            LtfFeatures {
                ema_short: ema_short[i],
                ema_medium: ema_medium[i],
                adx: adx[i],
                adx_history,
                atr: atr[i],
                donchian_high: donchian[i],
            }
        })
        .collect()
}

/// Bars consumed before every LTF feature is defined.
pub fn ltf_warmup_bars(indicators: &IndicatorConfig, strategy: &StrategyParams) -> usize {
    [
        Ema::new(indicators.ema_short).lookback(),
        Ema::new(indicators.ema_medium).lookback(),
        Adx::new(indicators.adx_period).lookback(),
        Atr::new(indicators.atr_period).lookback(),
        DonchianHigh::new(strategy.lookback_period).lookback(),
    ]
    .into_iter()
    .max()
    .unwrap_or(0)
}

/// Bars consumed before every HTF feature is defined.
pub fn htf_warmup_bars(indicators: &IndicatorConfig) -> usize {
    [
        Ema::new(indicators.ema_medium).lookback(),
        Ema::new(indicators.ema_long).lookback(),
        Adx::new(indicators.adx_period).lookback(),
    ]
    .into_iter()
    .max()
    .unwrap_or(0)
}
