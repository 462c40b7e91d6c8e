//! Domain types — the vocabulary of the engine.
//!
//! Bars, timeframes, positions and their state machine, and closed-trade
//! records. Every other module builds on these.

pub mod bar;
pub mod position;
pub mod timeframe;
pub mod trade;

pub use bar::{Bar, BarError};
pub use position::{
    Position, PositionBook, PositionState, Side, StateMachineError, StopStage, StopUpdate,
    TrailingMode,
};
pub use timeframe::Timeframe;
pub use trade::{EntryReason, ExitReason, TradeRecord};
