//! Typed run configuration.
//!
//! One immutable record per engine instance. Defaults carry the nominal
//! parameter set (4h/1h, EMA 20/50/200, Wilder 14s, 20-bar Donchian, 1%
//! risk, 1R/2R stop thresholds). `validate()` is the startup gate: a config
//! that fails it never reaches the engine.

use crate::domain::Timeframe;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub symbol: String,
    #[serde(default)]
    pub timeframes: TimeframeConfig,
    #[serde(default)]
    pub indicators: IndicatorConfig,
    #[serde(default)]
    pub strategy: StrategyParams,
    #[serde(default)]
    pub risk: RiskParams,
    #[serde(default)]
    pub account: AccountConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    pub backtest: Option<BacktestWindow>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeframeConfig {
    /// Regime-filter timeframe (HTF).
    pub trend: Timeframe,
    /// Entry/stop timeframe (LTF).
    pub signal: Timeframe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorConfig {
    pub ema_short: usize,
    pub ema_medium: usize,
    pub ema_long: usize,
    pub atr_period: usize,
    pub adx_period: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrategyParams {
    /// Donchian breakout lookback.
    pub lookback_period: usize,
    /// Minimum HTF ADX for a bull regime.
    pub htf_adx_min: f64,
    /// Minimum LTF ADX to take a breakout.
    pub ltf_adx_min: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskParams {
    /// Fraction of equity risked per trade (0.01 = 1%).
    pub max_risk_per_trade: f64,
    /// Initial stop distance as a fraction of entry price.
    pub initial_stop_pct: f64,
    /// R threshold moving the stop to break-even.
    pub break_even_r: f64,
    /// R threshold activating the EMA trail.
    pub trailing_activation_r: f64,
    /// ADX threshold for the trend-exhaustion veto.
    pub trend_exhaust_adx: f64,
    /// Consecutive declining ADX bars required for exhaustion.
    pub trend_exhaust_bars: usize,
    /// Optional R threshold switching the trail to the medium EMA.
    pub profit_lock_r: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccountConfig {
    pub initial_capital: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Per-side commission as a fraction of notional.
    pub commission_rate: f64,
    /// Base slippage fraction per fill.
    pub slippage_rate: f64,
    /// Optional volatility scaling: s = base + atr_factor * atr / close.
    pub atr_slippage_factor: Option<f64>,
    /// Cap on the effective slippage rate when volatility-scaled.
    pub max_slippage_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BacktestWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Default for TimeframeConfig {
    fn default() -> Self {
        Self { trend: Timeframe::H4, signal: Timeframe::H1 }
    }
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self { ema_short: 20, ema_medium: 50, ema_long: 200, atr_period: 14, adx_period: 14 }
    }
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self { lookback_period: 20, htf_adx_min: 20.0, ltf_adx_min: 25.0 }
    }
}

impl Default for RiskParams {
    fn default() -> Self {
        Self {
            max_risk_per_trade: 0.01,
            initial_stop_pct: 0.01,
            break_even_r: 1.0,
            trailing_activation_r: 2.0,
            trend_exhaust_adx: 20.0,
            trend_exhaust_bars: 3,
            profit_lock_r: None,
        }
    }
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self { initial_capital: 10_000.0 }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            commission_rate: 0.0005,
            slippage_rate: 0.0005,
            atr_slippage_factor: None,
            max_slippage_rate: 0.005,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            symbol: "BTCUSDT".to_string(),
            timeframes: TimeframeConfig::default(),
            indicators: IndicatorConfig::default(),
            strategy: StrategyParams::default(),
            risk: RiskParams::default(),
            account: AccountConfig::default(),
            execution: ExecutionConfig::default(),
            backtest: None,
        }
    }
}

impl Config {
    /// Startup validation. Every failure here is fatal.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbol.trim().is_empty() {
            return Err(ConfigError::EmptySymbol);
        }
        if self.timeframes.trend.duration_ms() <= self.timeframes.signal.duration_ms() {
            return Err(ConfigError::TimeframeOrder {
                trend: self.timeframes.trend,
                signal: self.timeframes.signal,
            });
        }
        for (name, period) in [
            ("indicators.ema.short", self.indicators.ema_short),
            ("indicators.ema.medium", self.indicators.ema_medium),
            ("indicators.ema.long", self.indicators.ema_long),
            ("indicators.atr.period", self.indicators.atr_period),
            ("indicators.adx.period", self.indicators.adx_period),
            ("strategy.lookback_period", self.strategy.lookback_period),
            ("risk.trend_exhaust_bars", self.risk.trend_exhaust_bars),
        ] {
            if period == 0 {
                return Err(ConfigError::NonPositivePeriod { name });
            }
        }
        if self.indicators.ema_short >= self.indicators.ema_medium
            || self.indicators.ema_medium >= self.indicators.ema_long
        {
            return Err(ConfigError::EmaOrder {
                short: self.indicators.ema_short,
                medium: self.indicators.ema_medium,
                long: self.indicators.ema_long,
            });
        }
        for (name, value) in [
            ("risk.max_risk_per_trade", self.risk.max_risk_per_trade),
            ("risk.initial_stop_pct", self.risk.initial_stop_pct),
        ] {
            if !(value > 0.0 && value < 1.0) {
                return Err(ConfigError::FractionOutOfRange { name, value });
            }
        }
        if !(self.risk.break_even_r > 0.0) {
            return Err(ConfigError::NonPositiveThreshold {
                name: "risk.break_even_r",
                value: self.risk.break_even_r,
            });
        }
        if self.risk.trailing_activation_r <= self.risk.break_even_r {
            return Err(ConfigError::ThresholdOrder {
                break_even_r: self.risk.break_even_r,
                trailing_activation_r: self.risk.trailing_activation_r,
            });
        }
        if let Some(lock) = self.risk.profit_lock_r {
            if lock <= self.risk.trailing_activation_r {
                return Err(ConfigError::NonPositiveThreshold {
                    name: "risk.profit_lock_r",
                    value: lock,
                });
            }
        }
        if !(self.risk.trend_exhaust_adx > 0.0) {
            return Err(ConfigError::NonPositiveThreshold {
                name: "risk.trend_exhaust_adx",
                value: self.risk.trend_exhaust_adx,
            });
        }
        if !(self.account.initial_capital > 0.0) {
            return Err(ConfigError::NonPositiveCapital { value: self.account.initial_capital });
        }
        for (name, rate) in [
            ("execution.commission_rate", self.execution.commission_rate),
            ("execution.slippage_rate", self.execution.slippage_rate),
            ("execution.max_slippage_rate", self.execution.max_slippage_rate),
        ] {
            if !(0.0..1.0).contains(&rate) {
                return Err(ConfigError::RateOutOfRange { name, value: rate });
            }
        }
        if let Some(factor) = self.execution.atr_slippage_factor {
            if factor < 0.0 {
                return Err(ConfigError::RateOutOfRange {
                    name: "execution.atr_slippage_factor",
                    value: factor,
                });
            }
        }
        if let Some(window) = &self.backtest {
            if window.start >= window.end {
                return Err(ConfigError::InvalidWindow { start: window.start, end: window.end });
            }
        }
        Ok(())
    }

    /// Number of preceding ADX values carried per LTF bar; covers the
    /// exhaustion window with one spare.
    pub fn adx_history_len(&self) -> usize {
        self.risk.trend_exhaust_bars + 2
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("symbol must not be empty")]
    EmptySymbol,

    #[error("trend timeframe {trend} must be wider than signal timeframe {signal}")]
    TimeframeOrder { trend: Timeframe, signal: Timeframe },

    #[error("{name} must be a positive period")]
    NonPositivePeriod { name: &'static str },

    #[error("EMA periods must be strictly ordered short < medium < long ({short}/{medium}/{long})")]
    EmaOrder { short: usize, medium: usize, long: usize },

    #[error("{name} must be in (0, 1), got {value}")]
    FractionOutOfRange { name: &'static str, value: f64 },

    #[error("{name} must be positive (and above lower thresholds), got {value}")]
    NonPositiveThreshold { name: &'static str, value: f64 },

    #[error("trailing_activation_r ({trailing_activation_r}) must exceed break_even_r ({break_even_r})")]
    ThresholdOrder { break_even_r: f64, trailing_activation_r: f64 },

    #[error("initial capital must be positive, got {value}")]
    NonPositiveCapital { value: f64 },

    #[error("{name} must be in [0, 1), got {value}")]
    RateOutOfRange { name: &'static str, value: f64 },

    #[error("backtest window start ({start}) must precede end ({end})")]
    InvalidWindow { start: DateTime<Utc>, end: DateTime<Utc> },
}
