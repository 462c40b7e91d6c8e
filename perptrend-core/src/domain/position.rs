//! Position and its state machine.
//!
//! A position's entry fields (`entry_price`, `entry_time`, `size`,
//! `initial_stop`) are written once at open and never mutated; all R-unit
//! arithmetic anchors on `initial_stop`. Stop fields only move through
//! [`Position::apply_update`], which enforces the ratchet: for a long the
//! active stop may rise, never fall (mirrored for shorts).
//!
//! Lifecycle: FLAT —open→ OPEN —start_close→ CLOSING —close→ FLAT.
//! While CLOSING the position stays readable, but only the terminal close
//! is accepted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Direction of a position. The current strategy only opens longs; the
/// risk and sizing arithmetic handles both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Long,
    Short,
}

/// Which EMA the Stage-3 trail follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrailingMode {
    EmaShort,
    EmaMedium,
}

/// Stop progression stage, derived from position state (never stored).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopStage {
    /// Active stop is still the initial fixed stop.
    Initial,
    /// Active stop has been moved to entry; trailing not yet active.
    BreakEven,
    /// EMA trail is active; active stop tracks the trailing stop.
    Trailing,
}

/// Lifecycle state of the single per-instrument position slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionState {
    Flat,
    Open,
    Closing,
}

/// Stop-field delta produced by the risk manager and applied through the
/// state machine. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StopUpdate {
    pub max_unrealized_r: Option<f64>,
    pub active_stop: Option<f64>,
    pub trailing_stop: Option<f64>,
    pub activate_trailing: bool,
    pub trailing_mode: Option<TrailingMode>,
}

impl StopUpdate {
    pub fn is_empty(&self) -> bool {
        *self == StopUpdate::default()
    }
}

/// An open holding in the traded instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    side: Side,
    entry_price: f64,
    entry_time: DateTime<Utc>,
    size: f64,
    initial_stop: f64,
    active_stop: f64,
    trailing_stop: Option<f64>,
    is_trailing_active: bool,
    max_unrealized_r: f64,
    trailing_mode: TrailingMode,
}

impl Position {
    /// Open a position. `initial_stop` must sit on the losing side of the
    /// entry so that initial risk per unit is strictly positive.
    pub fn open(
        side: Side,
        entry_price: f64,
        entry_time: DateTime<Utc>,
        size: f64,
        initial_stop: f64,
    ) -> Result<Self, StateMachineError> {
        let risk = match side {
            Side::Long => entry_price - initial_stop,
            Side::Short => initial_stop - entry_price,
        };
        if !(risk > 0.0 && risk.is_finite()) {
            return Err(StateMachineError::NonPositiveRisk { entry_price, initial_stop });
        }
        if !(size > 0.0 && size.is_finite()) {
            return Err(StateMachineError::NonPositiveSize { size });
        }
        Ok(Self {
            side,
            entry_price,
            entry_time,
            size,
            initial_stop,
            active_stop: initial_stop,
            trailing_stop: None,
            is_trailing_active: false,
            max_unrealized_r: 0.0,
            trailing_mode: TrailingMode::EmaShort,
        })
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn entry_price(&self) -> f64 {
        self.entry_price
    }

    pub fn entry_time(&self) -> DateTime<Utc> {
        self.entry_time
    }

    pub fn size(&self) -> f64 {
        self.size
    }

    pub fn initial_stop(&self) -> f64 {
        self.initial_stop
    }

    pub fn active_stop(&self) -> f64 {
        self.active_stop
    }

    pub fn trailing_stop(&self) -> Option<f64> {
        self.trailing_stop
    }

    pub fn is_trailing_active(&self) -> bool {
        self.is_trailing_active
    }

    pub fn max_unrealized_r(&self) -> f64 {
        self.max_unrealized_r
    }

    pub fn trailing_mode(&self) -> TrailingMode {
        self.trailing_mode
    }

    /// Initial risk per unit. Strictly positive by construction.
    pub fn risk_per_unit(&self) -> f64 {
        match self.side {
            Side::Long => self.entry_price - self.initial_stop,
            Side::Short => self.initial_stop - self.entry_price,
        }
    }

    /// Unrealized profit at `price`, denominated in R units.
    pub fn unrealized_r(&self, price: f64) -> f64 {
        match self.side {
            Side::Long => (price - self.entry_price) / self.risk_per_unit(),
            Side::Short => (self.entry_price - price) / self.risk_per_unit(),
        }
    }

    /// Current stop stage, derived.
    pub fn stage(&self) -> StopStage {
        if self.is_trailing_active {
            StopStage::Trailing
        } else if self.breakeven_reached() {
            StopStage::BreakEven
        } else {
            StopStage::Initial
        }
    }

    fn breakeven_reached(&self) -> bool {
        match self.side {
            Side::Long => self.active_stop >= self.entry_price,
            Side::Short => self.active_stop <= self.entry_price,
        }
    }

    /// True when the stop would loosen, i.e. move against the ratchet.
    fn loosens(&self, current: f64, proposed: f64) -> bool {
        match self.side {
            Side::Long => proposed < current,
            Side::Short => proposed > current,
        }
    }

    /// Apply a stop delta, enforcing every position invariant. A violating
    /// delta is rejected wholesale and the position is left unchanged.
    pub fn apply_update(&mut self, update: &StopUpdate) -> Result<(), StateMachineError> {
        // Validate the complete delta before mutating anything.
        if let Some(max_r) = update.max_unrealized_r {
            if max_r < self.max_unrealized_r {
                return Err(StateMachineError::HighWaterDecrease {
                    current: self.max_unrealized_r,
                    proposed: max_r,
                });
            }
        }
        if let Some(stop) = update.active_stop {
            if self.loosens(self.active_stop, stop) {
                return Err(StateMachineError::StopLoosened {
                    current: self.active_stop,
                    proposed: stop,
                });
            }
        }
        let trailing_after = self.is_trailing_active || update.activate_trailing;
        if let Some(trail) = update.trailing_stop {
            if !trailing_after {
                return Err(StateMachineError::TrailWithoutActivation);
            }
            if let Some(current) = self.trailing_stop {
                if self.loosens(current, trail) {
                    return Err(StateMachineError::StopLoosened { current, proposed: trail });
                }
            }
        }
        if let Some(mode) = update.trailing_mode {
            if self.trailing_mode == TrailingMode::EmaMedium && mode == TrailingMode::EmaShort {
                return Err(StateMachineError::TrailingModeDowngrade);
            }
        }

        if let Some(max_r) = update.max_unrealized_r {
            self.max_unrealized_r = max_r;
        }
        self.is_trailing_active = trailing_after;
        if let Some(mode) = update.trailing_mode {
            self.trailing_mode = mode;
        }
        if let Some(trail) = update.trailing_stop {
            self.trailing_stop = Some(trail);
        }
        if let Some(stop) = update.active_stop {
            self.active_stop = stop;
        }
        Ok(())
    }
}

/// The single mutable position slot for one instrument, with its
/// FLAT/OPEN/CLOSING lifecycle.
///
/// Opening while not flat is a programming error and fails loudly.
/// Updating or closing while flat is silently ignored so defensive callers
/// stay harmless.
#[derive(Debug, Clone, Default)]
pub struct PositionBook {
    state: PositionState,
    position: Option<Position>,
}

impl Default for PositionState {
    fn default() -> Self {
        PositionState::Flat
    }
}

impl PositionBook {
    pub fn new() -> Self {
        Self { state: PositionState::Flat, position: None }
    }

    pub fn state(&self) -> PositionState {
        self.state
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    /// OPEN_POSITION: FLAT → OPEN.
    pub fn open_position(&mut self, position: Position) -> Result<(), StateMachineError> {
        if self.state != PositionState::Flat {
            return Err(StateMachineError::OpenWhileNotFlat { state: self.state });
        }
        self.position = Some(position);
        self.state = PositionState::Open;
        Ok(())
    }

    /// UPDATE_STOP: only accepted while OPEN. A no-op while FLAT.
    pub fn update_stop(&mut self, update: &StopUpdate) -> Result<(), StateMachineError> {
        match self.state {
            PositionState::Flat => Ok(()),
            PositionState::Closing => Err(StateMachineError::UpdateWhileClosing),
            PositionState::Open => match self.position.as_mut() {
                Some(position) => position.apply_update(update),
                None => Err(StateMachineError::MissingPosition),
            },
        }
    }

    /// START_CLOSE: OPEN → CLOSING.
    pub fn start_close(&mut self) -> Result<(), StateMachineError> {
        if self.state != PositionState::Open {
            return Err(StateMachineError::StartCloseWhileNotOpen { state: self.state });
        }
        self.state = PositionState::Closing;
        Ok(())
    }

    /// CLOSE_POSITION: {OPEN, CLOSING} → FLAT, discarding the position.
    /// Returns the discarded position; `None` while FLAT (ignored).
    pub fn close_position(&mut self) -> Option<Position> {
        match self.state {
            PositionState::Flat => None,
            PositionState::Open | PositionState::Closing => {
                self.state = PositionState::Flat;
                self.position.take()
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum StateMachineError {
    #[error("OPEN_POSITION while state is {state:?} (must be Flat)")]
    OpenWhileNotFlat { state: PositionState },

    #[error("UPDATE_STOP while state is Closing")]
    UpdateWhileClosing,

    #[error("START_CLOSE while state is {state:?} (must be Open)")]
    StartCloseWhileNotOpen { state: PositionState },

    #[error("stop update would loosen the stop: current={current}, proposed={proposed}")]
    StopLoosened { current: f64, proposed: f64 },

    #[error("max unrealized R may not decrease: current={current}, proposed={proposed}")]
    HighWaterDecrease { current: f64, proposed: f64 },

    #[error("trailing stop set while trailing is not active")]
    TrailWithoutActivation,

    #[error("trailing mode may not switch back from EMA-medium to EMA-short")]
    TrailingModeDowngrade,

    #[error("initial risk per unit must be positive: entry={entry_price}, stop={initial_stop}")]
    NonPositiveRisk { entry_price: f64, initial_stop: f64 },

    #[error("position size must be positive and finite: {size}")]
    NonPositiveSize { size: f64 },

    #[error("state is Open but no position is held")]
    MissingPosition,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn long_position() -> Position {
        Position::open(Side::Long, 100.0, Utc::now(), 10.0, 99.0).unwrap()
    }

    #[test]
    fn open_rejects_inverted_stop() {
        let res = Position::open(Side::Long, 100.0, Utc::now(), 10.0, 101.0);
        assert!(matches!(res, Err(StateMachineError::NonPositiveRisk { .. })));
    }

    #[test]
    fn unrealized_r_anchors_on_initial_stop() {
        let pos = long_position();
        assert_eq!(pos.unrealized_r(101.0), 1.0);
        assert_eq!(pos.unrealized_r(99.0), -1.0);
        assert_eq!(pos.unrealized_r(100.0), 0.0);
    }

    #[test]
    fn short_unrealized_r_is_symmetric() {
        let pos = Position::open(Side::Short, 100.0, Utc::now(), 10.0, 101.0).unwrap();
        assert_eq!(pos.unrealized_r(99.0), 1.0);
        assert_eq!(pos.unrealized_r(101.0), -1.0);
    }

    #[test]
    fn stage_derivation() {
        let mut pos = long_position();
        assert_eq!(pos.stage(), StopStage::Initial);

        pos.apply_update(&StopUpdate { active_stop: Some(100.0), ..Default::default() }).unwrap();
        assert_eq!(pos.stage(), StopStage::BreakEven);

        pos.apply_update(&StopUpdate {
            activate_trailing: true,
            trailing_stop: Some(100.0),
            active_stop: Some(100.0),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(pos.stage(), StopStage::Trailing);
    }

    #[test]
    fn stop_ratchet_rejects_loosening() {
        let mut pos = long_position();
        pos.apply_update(&StopUpdate { active_stop: Some(100.0), ..Default::default() }).unwrap();
        let res =
            pos.apply_update(&StopUpdate { active_stop: Some(99.5), ..Default::default() });
        assert!(matches!(res, Err(StateMachineError::StopLoosened { .. })));
        assert_eq!(pos.active_stop(), 100.0);
    }

    #[test]
    fn short_stop_ratchet_is_mirrored() {
        let mut pos = Position::open(Side::Short, 100.0, Utc::now(), 10.0, 101.0).unwrap();
        pos.apply_update(&StopUpdate { active_stop: Some(100.5), ..Default::default() }).unwrap();
        let res =
            pos.apply_update(&StopUpdate { active_stop: Some(100.8), ..Default::default() });
        assert!(matches!(res, Err(StateMachineError::StopLoosened { .. })));
    }

    #[test]
    fn high_water_mark_monotone() {
        let mut pos = long_position();
        pos.apply_update(&StopUpdate { max_unrealized_r: Some(2.0), ..Default::default() })
            .unwrap();
        let res =
            pos.apply_update(&StopUpdate { max_unrealized_r: Some(1.0), ..Default::default() });
        assert!(matches!(res, Err(StateMachineError::HighWaterDecrease { .. })));
        assert_eq!(pos.max_unrealized_r(), 2.0);
    }

    #[test]
    fn trailing_requires_activation() {
        let mut pos = long_position();
        let res =
            pos.apply_update(&StopUpdate { trailing_stop: Some(100.0), ..Default::default() });
        assert!(matches!(res, Err(StateMachineError::TrailWithoutActivation)));
    }

    #[test]
    fn trailing_mode_never_downgrades() {
        let mut pos = long_position();
        pos.apply_update(&StopUpdate {
            activate_trailing: true,
            trailing_stop: Some(100.0),
            active_stop: Some(100.0),
            trailing_mode: Some(TrailingMode::EmaMedium),
            ..Default::default()
        })
        .unwrap();
        let res = pos.apply_update(&StopUpdate {
            trailing_mode: Some(TrailingMode::EmaShort),
            ..Default::default()
        });
        assert!(matches!(res, Err(StateMachineError::TrailingModeDowngrade)));
    }

    #[test]
    fn rejected_update_mutates_nothing() {
        let mut pos = long_position();
        pos.apply_update(&StopUpdate { max_unrealized_r: Some(1.5), ..Default::default() })
            .unwrap();
        let before = pos.clone();
        // Valid high-water bump combined with an invalid stop: whole delta rejected.
        let res = pos.apply_update(&StopUpdate {
            max_unrealized_r: Some(2.0),
            active_stop: Some(98.0),
            ..Default::default()
        });
        assert!(res.is_err());
        assert_eq!(pos.max_unrealized_r(), before.max_unrealized_r());
        assert_eq!(pos.active_stop(), before.active_stop());
    }

    #[test]
    fn book_lifecycle() {
        let mut book = PositionBook::new();
        assert_eq!(book.state(), PositionState::Flat);

        book.open_position(long_position()).unwrap();
        assert_eq!(book.state(), PositionState::Open);

        // Double open is a programming error.
        assert!(matches!(
            book.open_position(long_position()),
            Err(StateMachineError::OpenWhileNotFlat { .. })
        ));

        book.start_close().unwrap();
        assert_eq!(book.state(), PositionState::Closing);

        // No stop updates while closing.
        assert!(matches!(
            book.update_stop(&StopUpdate { active_stop: Some(101.0), ..Default::default() }),
            Err(StateMachineError::UpdateWhileClosing)
        ));

        let discarded = book.close_position();
        assert!(discarded.is_some());
        assert_eq!(book.state(), PositionState::Flat);
        assert!(book.position().is_none());
    }

    #[test]
    fn flat_update_and_close_are_ignored() {
        let mut book = PositionBook::new();
        assert!(book
            .update_stop(&StopUpdate { active_stop: Some(1.0), ..Default::default() })
            .is_ok());
        assert!(book.close_position().is_none());
    }
}
