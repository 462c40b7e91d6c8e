//! Backtest and paper-trading drivers for the perptrend core.
//!
//! The core stays pure; everything with a clock, a sleep, or a data source
//! lives here: the bar-provider boundary, data-quality validation, TOML
//! config loading, the historical replay driver, and the forward polling
//! loop.

pub mod backtest;
pub mod config;
pub mod obs;
pub mod paper;
pub mod provider;
pub mod validate;

pub use backtest::{run_backtest, BacktestReport, RunError};
pub use config::{ConfigFileError, RunConfigFile};
pub use obs::init_tracing;
pub use paper::{PaperSession, PaperStep};
pub use provider::{BarProvider, ProviderError, ReplayProvider};
pub use validate::{validate_series, DataQualityError};
