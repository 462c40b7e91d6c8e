//! Closed-trade records and decision reason codes.

use super::position::Side;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why an entry fired. Carried on the signal and into logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryReason {
    HtfBullBreakoutConfirmed,
}

impl EntryReason {
    pub fn as_str(self) -> &'static str {
        match self {
            EntryReason::HtfBullBreakoutConfirmed => "HTF_BULL_BREAKOUT_CONFIRMED",
        }
    }
}

impl fmt::Display for EntryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    /// Stage 1: bar low touched the initial fixed stop.
    StopLossInitial,
    /// Stage 2: bar low touched the break-even stop.
    StopLossBreakEven,
    /// Stage 3: trailing stop touched and the trend-exhaustion filter
    /// confirmed (or could not be evaluated).
    TrailingStopHit,
}

impl ExitReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ExitReason::StopLossInitial => "STOP_LOSS_INITIAL",
            ExitReason::StopLossBreakEven => "STOP_LOSS_BREAK_EVEN",
            ExitReason::TrailingStopHit => "TRAILING_STOP_HIT",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One closed round trip, appended per position in chronological order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub side: Side,
    pub entry_price: f64,
    pub entry_time: DateTime<Utc>,
    pub exit_price: f64,
    pub exit_time: DateTime<Utc>,
    pub size: f64,
    /// Net profit after commission.
    pub pnl: f64,
    pub commission: f64,
    /// Exit-side slippage cost, informational.
    pub slippage: f64,
    /// Account equity after this trade settled.
    pub equity_after: f64,
    pub reason: ExitReason,
}
