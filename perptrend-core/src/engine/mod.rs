//! Engine: per-bar orchestration and execution accounting.

pub mod equity;
pub mod execution;
pub mod runner;
pub mod warmup;

pub use equity::EquityTracker;
pub use execution::{ExecutionAdapter, FillModel, SimAdapter};
pub use runner::{BarOutcome, BarRunner, EngineError};
pub use warmup::WarmupState;
