//! Risk manager: position sizing, R-unit arithmetic, and the
//! three-stage stop progression.
//!
//! Stage 1 holds the initial fixed stop; Stage 2 parks the stop at entry
//! once price has paid one unit of initial risk; Stage 3 trails an EMA once
//! price has paid two. A touched trailing stop is only honoured when the
//! ADX trend-exhaustion predicate confirms — strong trends ignore touches,
//! and the trail may still advance on the same bar.
//!
//! `evaluate` is a pure function; it proposes a [`StopUpdate`] delta and
//! never mutates the position itself. All R arithmetic anchors on the
//! immutable initial stop, so "+1R" means the same thing for the life of
//! the position.

pub mod exhaustion;

use crate::config::RiskParams;
use crate::domain::{Bar, ExitReason, Position, Side, StopStage, StopUpdate, TrailingMode};
use crate::features::LtfFeatures;

pub use exhaustion::trend_exhausted;

/// Per-bar verdict. `Continue` carries an optional stop delta for the
/// state machine to apply.
#[derive(Debug, Clone, PartialEq)]
pub enum RiskVerdict {
    Exit(ExitReason),
    Continue(Option<StopUpdate>),
}

/// Sizing result for a new position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizedEntry {
    pub size: f64,
    pub initial_stop: f64,
}

/// Fixed-fraction sizing off the initial stop distance.
///
/// ```text
/// initial_stop = entry * (1 - initial_stop_pct)        (long)
/// risk_amount  = equity * max_risk_per_trade
/// size         = risk_amount / (entry - initial_stop)
/// ```
pub fn size_entry(side: Side, entry_price: f64, equity: f64, params: &RiskParams) -> SizedEntry {
    let initial_stop = match side {
        Side::Long => entry_price * (1.0 - params.initial_stop_pct),
        Side::Short => entry_price * (1.0 + params.initial_stop_pct),
    };
    let risk_amount = equity * params.max_risk_per_trade;
    let risk_per_unit = (entry_price - initial_stop).abs();
    SizedEntry { size: risk_amount / risk_per_unit, initial_stop }
}

/// Evaluate one bar against an open position. Called exactly once per LTF
/// bar, before the strategy function.
pub fn evaluate(
    position: &Position,
    bar: &Bar,
    ltf: &LtfFeatures,
    params: &RiskParams,
) -> RiskVerdict {
    match position.stage() {
        StopStage::Trailing => {
            if let Some(trailing) = position.trailing_stop() {
                if stop_touched(position.side(), bar, trailing) {
                    if ltf.adx_history.is_empty() {
                        // Filter cannot be evaluated: exit on touch.
                        return RiskVerdict::Exit(ExitReason::TrailingStopHit);
                    }
                    if trend_exhausted(
                        &ltf.adx_history,
                        params.trend_exhaust_adx,
                        params.trend_exhaust_bars,
                    ) {
                        return RiskVerdict::Exit(ExitReason::TrailingStopHit);
                    }
                    // Strong trend: ignore the touch and let the trail
                    // advance below.
                }
            }
        }
        stage @ (StopStage::Initial | StopStage::BreakEven) => {
            if stop_touched(position.side(), bar, position.active_stop()) {
                let reason = match stage {
                    StopStage::Initial => ExitReason::StopLossInitial,
                    _ => ExitReason::StopLossBreakEven,
                };
                return RiskVerdict::Exit(reason);
            }
        }
    }

    RiskVerdict::Continue(progress_stops(position, bar, ltf, params))
}

fn stop_touched(side: Side, bar: &Bar, stop: f64) -> bool {
    match side {
        Side::Long => bar.low <= stop,
        Side::Short => bar.high >= stop,
    }
}

/// Stage progression and trail advancement for a surviving bar.
fn progress_stops(
    position: &Position,
    bar: &Bar,
    ltf: &LtfFeatures,
    params: &RiskParams,
) -> Option<StopUpdate> {
    let mut update = StopUpdate::default();

    let r = position.unrealized_r(bar.close);
    let max_r = position.max_unrealized_r().max(r);
    if max_r > position.max_unrealized_r() {
        update.max_unrealized_r = Some(max_r);
    }

    let mut trailing_active = position.is_trailing_active();
    let mut trailing_stop = position.trailing_stop();
    let mut mode = position.trailing_mode();

    if !trailing_active {
        if r >= params.trailing_activation_r {
            trailing_active = true;
            trailing_stop = Some(position.entry_price());
            mode = TrailingMode::EmaShort;
            update.activate_trailing = true;
            update.trailing_stop = trailing_stop;
            update.active_stop = trailing_stop;
            update.trailing_mode = Some(mode);
        } else if position.stage() == StopStage::Initial && r >= params.break_even_r {
            update.active_stop = Some(position.entry_price());
        }
    }

    if trailing_active {
        if let Some(lock_r) = params.profit_lock_r {
            if mode == TrailingMode::EmaShort && max_r >= lock_r {
                mode = TrailingMode::EmaMedium;
                update.trailing_mode = Some(mode);
            }
        }

        let candidate = match mode {
            TrailingMode::EmaShort => ltf.ema_short,
            TrailingMode::EmaMedium => ltf.ema_medium,
        };
        // An undefined EMA leaves the trail where it is.
        if let (Some(new_trail), Some(current)) = (candidate, trailing_stop) {
            let advances = match position.side() {
                Side::Long => new_trail > current,
                Side::Short => new_trail < current,
            };
            if advances {
                update.trailing_stop = Some(new_trail);
                update.active_stop = Some(new_trail);
            }
        }
    }

    if update.is_empty() {
        None
    } else {
        Some(update)
    }
}
