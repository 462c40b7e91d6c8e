//! Entry signal evaluation.
//!
//! A pure function of one LTF bar and its aligned feature context. It only
//! ever answers "enter long" or "hold" — exits belong to the risk manager.
//! Undefined features during warm-up simply hold; that is expected, not an
//! error.

use crate::config::StrategyParams;
use crate::domain::{Bar, EntryReason, PositionState, Side};
use crate::features::{HtfFeatures, LtfFeatures};

/// Strategy output for one bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Entry { side: Side, reason: EntryReason },
    Hold,
}

/// Higher-timeframe market regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HtfRegime {
    Bull,
    Range,
}

/// Classify the HTF regime. `None` while the HTF features are still
/// warming up.
pub fn htf_regime(htf: &HtfFeatures, htf_adx_min: f64) -> Option<HtfRegime> {
    let ema_medium = htf.ema_medium?;
    let ema_long = htf.ema_long?;
    let adx = htf.adx?;

    if ema_medium > ema_long && adx > htf_adx_min {
        Some(HtfRegime::Bull)
    } else {
        Some(HtfRegime::Range)
    }
}

/// Evaluate one LTF bar for entry.
///
/// Emits `Entry(Long)` only when every gate passes:
/// 1. no position is held,
/// 2. the HTF regime is bull (EMA stack up, ADX above its floor),
/// 3. LTF ADX confirms trend strength,
/// 4. the LTF EMA stack points up,
/// 5. the close breaks the Donchian high of already-closed bars.
pub fn evaluate_entry(
    bar: &Bar,
    htf: &HtfFeatures,
    ltf: &LtfFeatures,
    position_state: PositionState,
    params: &StrategyParams,
) -> Signal {
    if position_state != PositionState::Flat {
        return Signal::Hold;
    }

    let (Some(ema_short), Some(ema_medium), Some(adx), Some(donchian_high)) =
        (ltf.ema_short, ltf.ema_medium, ltf.adx, ltf.donchian_high)
    else {
        return Signal::Hold;
    };

    match htf_regime(htf, params.htf_adx_min) {
        Some(HtfRegime::Bull) => {}
        Some(HtfRegime::Range) | None => return Signal::Hold,
    }

    if adx > params.ltf_adx_min && ema_short > ema_medium && bar.close > donchian_high {
        Signal::Entry { side: Side::Long, reason: EntryReason::HtfBullBreakoutConfirmed }
    } else {
        Signal::Hold
    }
}
