//! Historical replay (backtest) driver.
//!
//! fetch → validate → build features → align → bar loop. Deterministic:
//! the same provider contents and config produce bitwise-identical trades.

use crate::provider::{BarProvider, ProviderError};
use crate::validate::{validate_series, DataQualityError};
use perptrend_core::config::{Config, ConfigError};
use perptrend_core::domain::TradeRecord;
use perptrend_core::engine::{BarRunner, EngineError};
use perptrend_core::features::{
    align_htf_to_ltf, build_htf_features, build_ltf_features, AlignmentError,
};
use thiserror::Error;

/// Fatal backtest failures, one variant per error class.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("config has no backtest window")]
    MissingWindow,

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    DataQuality(#[from] DataQualityError),

    #[error(transparent)]
    Alignment(#[from] AlignmentError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Result of one historical run.
#[derive(Debug, Clone)]
pub struct BacktestReport {
    pub trades: Vec<TradeRecord>,
    pub equity_curve: Vec<f64>,
    pub initial_capital: f64,
    pub final_equity: f64,
}

impl BacktestReport {
    pub fn total_pnl(&self) -> f64 {
        self.final_equity - self.initial_capital
    }

    pub fn win_rate(&self) -> f64 {
        if self.trades.is_empty() {
            return 0.0;
        }
        let wins = self.trades.iter().filter(|t| t.pnl > 0.0).count();
        wins as f64 / self.trades.len() as f64
    }

    pub fn total_commission(&self) -> f64 {
        self.trades.iter().map(|t| t.commission).sum()
    }
}

/// Run one backtest over the configured window.
pub fn run_backtest(config: &Config, provider: &impl BarProvider) -> Result<BacktestReport, RunError> {
    config.validate()?;
    let window = config.backtest.as_ref().ok_or(RunError::MissingWindow)?;

    let htf_bars = provider.fetch_closed(
        &config.symbol,
        config.timeframes.trend,
        window.start,
        window.end,
    )?;
    let ltf_bars = provider.fetch_closed(
        &config.symbol,
        config.timeframes.signal,
        window.start,
        window.end,
    )?;

    validate_series(&config.symbol, config.timeframes.trend, &htf_bars)?;
    validate_series(&config.symbol, config.timeframes.signal, &ltf_bars)?;

    let htf_features = build_htf_features(&htf_bars, &config.indicators);
    let ltf_features =
        build_ltf_features(&ltf_bars, &config.indicators, &config.strategy, config.adx_history_len());
    let aligned = align_htf_to_ltf(&ltf_bars, &htf_bars, &htf_features)?;

    let mut runner = BarRunner::new(config.clone());
    for (i, bar) in ltf_bars.iter().enumerate() {
        runner.on_bar(bar, &aligned[i], &ltf_features[i])?;
    }

    Ok(BacktestReport {
        trades: runner.trades().to_vec(),
        equity_curve: runner.equity().curve().to_vec(),
        initial_capital: runner.equity().initial_capital(),
        final_equity: runner.equity().current(),
    })
}
