//! TOML config parsing — loads run configurations from TOML files into the
//! core's typed `Config`.

use chrono::{DateTime, NaiveDate, Utc};
use perptrend_core::config::{
    AccountConfig, BacktestWindow, Config, ExecutionConfig, IndicatorConfig, RiskParams,
    StrategyParams, TimeframeConfig,
};
use perptrend_core::domain::Timeframe;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Top-level run configuration from a TOML file.
#[derive(Debug, Deserialize)]
pub struct RunConfigFile {
    pub run: RunSection,
    #[serde(default)]
    pub timeframes: TimeframesSection,
    #[serde(default)]
    pub indicators: IndicatorsSection,
    #[serde(default)]
    pub strategy: StrategySection,
    #[serde(default)]
    pub risk: RiskSection,
    #[serde(default)]
    pub execution: ExecutionSection,
}

#[derive(Debug, Deserialize)]
pub struct RunSection {
    pub symbol: String,
    /// Backtest window, "%Y-%m-%d"; omit both for paper mode.
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    #[serde(default = "default_capital")]
    pub initial_capital: f64,
}

#[derive(Debug, Deserialize)]
pub struct TimeframesSection {
    #[serde(default = "default_trend_tf")]
    pub trend: String,
    #[serde(default = "default_signal_tf")]
    pub signal: String,
}

#[derive(Debug, Deserialize)]
pub struct IndicatorsSection {
    #[serde(default = "default_ema_short")]
    pub ema_short: usize,
    #[serde(default = "default_ema_medium")]
    pub ema_medium: usize,
    #[serde(default = "default_ema_long")]
    pub ema_long: usize,
    #[serde(default = "default_wilder_period")]
    pub atr_period: usize,
    #[serde(default = "default_wilder_period")]
    pub adx_period: usize,
}

#[derive(Debug, Deserialize)]
pub struct StrategySection {
    #[serde(default = "default_lookback")]
    pub lookback_period: usize,
    #[serde(default = "default_htf_adx_min")]
    pub htf_adx_min: f64,
    #[serde(default = "default_ltf_adx_min")]
    pub ltf_adx_min: f64,
}

#[derive(Debug, Deserialize)]
pub struct RiskSection {
    #[serde(default = "default_risk_per_trade")]
    pub max_risk_per_trade: f64,
    #[serde(default = "default_initial_stop_pct")]
    pub initial_stop_pct: f64,
    #[serde(default = "default_break_even_r")]
    pub break_even_r: f64,
    #[serde(default = "default_trailing_activation_r")]
    pub trailing_activation_r: f64,
    #[serde(default = "default_trend_exhaust_adx")]
    pub trend_exhaust_adx: f64,
    #[serde(default = "default_trend_exhaust_bars")]
    pub trend_exhaust_bars: usize,
    pub profit_lock_r: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct ExecutionSection {
    #[serde(default = "default_commission_rate")]
    pub commission_rate: f64,
    #[serde(default = "default_slippage_rate")]
    pub slippage_rate: f64,
    pub atr_slippage_factor: Option<f64>,
    #[serde(default = "default_max_slippage_rate")]
    pub max_slippage_rate: f64,
}

fn default_capital() -> f64 {
    10_000.0
}
fn default_trend_tf() -> String {
    "4h".to_string()
}
fn default_signal_tf() -> String {
    "1h".to_string()
}
fn default_ema_short() -> usize {
    20
}
fn default_ema_medium() -> usize {
    50
}
fn default_ema_long() -> usize {
    200
}
fn default_wilder_period() -> usize {
    14
}
fn default_lookback() -> usize {
    20
}
fn default_htf_adx_min() -> f64 {
    20.0
}
fn default_ltf_adx_min() -> f64 {
    25.0
}
fn default_risk_per_trade() -> f64 {
    0.01
}
fn default_initial_stop_pct() -> f64 {
    0.01
}
fn default_break_even_r() -> f64 {
    1.0
}
fn default_trailing_activation_r() -> f64 {
    2.0
}
fn default_trend_exhaust_adx() -> f64 {
    20.0
}
fn default_trend_exhaust_bars() -> usize {
    3
}
fn default_commission_rate() -> f64 {
    0.0005
}
fn default_slippage_rate() -> f64 {
    0.0005
}
fn default_max_slippage_rate() -> f64 {
    0.005
}

impl Default for TimeframesSection {
    fn default() -> Self {
        Self { trend: default_trend_tf(), signal: default_signal_tf() }
    }
}

impl Default for IndicatorsSection {
    fn default() -> Self {
        Self {
            ema_short: default_ema_short(),
            ema_medium: default_ema_medium(),
            ema_long: default_ema_long(),
            atr_period: default_wilder_period(),
            adx_period: default_wilder_period(),
        }
    }
}

impl Default for StrategySection {
    fn default() -> Self {
        Self {
            lookback_period: default_lookback(),
            htf_adx_min: default_htf_adx_min(),
            ltf_adx_min: default_ltf_adx_min(),
        }
    }
}

impl Default for RiskSection {
    fn default() -> Self {
        Self {
            max_risk_per_trade: default_risk_per_trade(),
            initial_stop_pct: default_initial_stop_pct(),
            break_even_r: default_break_even_r(),
            trailing_activation_r: default_trailing_activation_r(),
            trend_exhaust_adx: default_trend_exhaust_adx(),
            trend_exhaust_bars: default_trend_exhaust_bars(),
            profit_lock_r: None,
        }
    }
}

impl Default for ExecutionSection {
    fn default() -> Self {
        Self {
            commission_rate: default_commission_rate(),
            slippage_rate: default_slippage_rate(),
            atr_slippage_factor: None,
            max_slippage_rate: default_max_slippage_rate(),
        }
    }
}

impl RunConfigFile {
    /// Load from a TOML file path.
    pub fn from_file(path: &Path) -> Result<Self, ConfigFileError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigFileError::Io(e.to_string()))?;
        Self::from_toml(&contents)
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigFileError> {
        toml::from_str(toml_str).map_err(|e| ConfigFileError::Parse(e.to_string()))
    }

    /// Build the validated core config.
    pub fn to_core_config(&self) -> Result<Config, ConfigFileError> {
        let backtest = match (&self.run.start_date, &self.run.end_date) {
            (Some(start), Some(end)) => Some(BacktestWindow {
                start: parse_date(start)?,
                end: parse_date_end_of_day(end)?,
            }),
            (None, None) => None,
            _ => return Err(ConfigFileError::PartialWindow),
        };

        let config = Config {
            symbol: self.run.symbol.clone(),
            timeframes: TimeframeConfig {
                trend: parse_timeframe(&self.timeframes.trend)?,
                signal: parse_timeframe(&self.timeframes.signal)?,
            },
            indicators: IndicatorConfig {
                ema_short: self.indicators.ema_short,
                ema_medium: self.indicators.ema_medium,
                ema_long: self.indicators.ema_long,
                atr_period: self.indicators.atr_period,
                adx_period: self.indicators.adx_period,
            },
            strategy: StrategyParams {
                lookback_period: self.strategy.lookback_period,
                htf_adx_min: self.strategy.htf_adx_min,
                ltf_adx_min: self.strategy.ltf_adx_min,
            },
            risk: RiskParams {
                max_risk_per_trade: self.risk.max_risk_per_trade,
                initial_stop_pct: self.risk.initial_stop_pct,
                break_even_r: self.risk.break_even_r,
                trailing_activation_r: self.risk.trailing_activation_r,
                trend_exhaust_adx: self.risk.trend_exhaust_adx,
                trend_exhaust_bars: self.risk.trend_exhaust_bars,
                profit_lock_r: self.risk.profit_lock_r,
            },
            account: AccountConfig { initial_capital: self.run.initial_capital },
            execution: ExecutionConfig {
                commission_rate: self.execution.commission_rate,
                slippage_rate: self.execution.slippage_rate,
                atr_slippage_factor: self.execution.atr_slippage_factor,
                max_slippage_rate: self.execution.max_slippage_rate,
            },
            backtest,
        };

        config.validate().map_err(|e| ConfigFileError::Invalid(e.to_string()))?;
        Ok(config)
    }
}

fn parse_timeframe(s: &str) -> Result<Timeframe, ConfigFileError> {
    s.parse().map_err(ConfigFileError::Invalid)
}

fn parse_date(s: &str) -> Result<DateTime<Utc>, ConfigFileError> {
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| ConfigFileError::BadDate { date: s.to_string(), reason: e.to_string() })?;
    Ok(date.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc())
}

fn parse_date_end_of_day(s: &str) -> Result<DateTime<Utc>, ConfigFileError> {
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| ConfigFileError::BadDate { date: s.to_string(), reason: e.to_string() })?;
    Ok(date.and_hms_opt(23, 59, 59).unwrap_or_default().and_utc())
}

/// Config loading errors. All fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("TOML parse error: {0}")]
    Parse(String),

    #[error("invalid date '{date}': {reason}")]
    BadDate { date: String, reason: String },

    #[error("start_date and end_date must be provided together")]
    PartialWindow,

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
