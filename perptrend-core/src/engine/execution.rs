//! Execution adapter: fill prices, commission, slippage.
//!
//! Fills happen at the bar close adjusted for slippage — entries fill
//! against you, exits fill against you. Stops are *decided* against the raw
//! bar low/high; slippage only affects the recorded fill, never the stop
//! comparison. Commission and slippage are applied at entry and exit only,
//! never mid-position.

use crate::config::ExecutionConfig;
use crate::domain::{Bar, Side};
use chrono::{DateTime, Utc};

/// Slippage/commission arithmetic for simulated fills.
#[derive(Debug, Clone, Copy)]
pub struct FillModel {
    config: ExecutionConfig,
}

impl FillModel {
    pub fn new(config: ExecutionConfig) -> Self {
        Self { config }
    }

    /// Effective slippage rate for this fill. With volatility scaling
    /// configured, s = base + factor * atr / close, capped; an undefined
    /// ATR falls back to the base rate.
    pub fn slippage_rate(&self, bar: &Bar, atr: Option<f64>) -> f64 {
        let base = self.config.slippage_rate;
        match (self.config.atr_slippage_factor, atr) {
            (Some(factor), Some(atr)) if bar.close > 0.0 => {
                (base + factor * atr / bar.close).min(self.config.max_slippage_rate)
            }
            _ => base,
        }
    }

    /// Entry fill: long entries fill above the close, short below.
    pub fn entry_price(&self, bar: &Bar, side: Side, atr: Option<f64>) -> f64 {
        let s = self.slippage_rate(bar, atr);
        match side {
            Side::Long => bar.close * (1.0 + s),
            Side::Short => bar.close * (1.0 - s),
        }
    }

    /// Exit fill: long exits fill below the close, short above.
    pub fn exit_price(&self, bar: &Bar, side: Side, atr: Option<f64>) -> f64 {
        let s = self.slippage_rate(bar, atr);
        match side {
            Side::Long => bar.close * (1.0 - s),
            Side::Short => bar.close * (1.0 + s),
        }
    }

    /// Round-trip commission on both notionals.
    pub fn commission(&self, entry_price: f64, exit_price: f64, size: f64) -> f64 {
        (entry_price * size + exit_price * size) * self.config.commission_rate
    }
}

/// Boundary with a real (or simulated) execution venue. The backtest uses
/// the built-in sim; paper/live hosts plug their own.
pub trait ExecutionAdapter: Send {
    fn open(&mut self, symbol: &str, side: Side, size: f64, entry_price: f64, time: DateTime<Utc>);
    fn close(&mut self, symbol: &str, size: f64, exit_price: f64, time: DateTime<Utc>);
}

/// Recorded fill event from the sim adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum FillEvent {
    Open { symbol: String, side: Side, size: f64, price: f64, time: DateTime<Utc> },
    Close { symbol: String, size: f64, price: f64, time: DateTime<Utc> },
}

/// In-memory adapter: records every fill, touches nothing external.
#[derive(Debug, Default)]
pub struct SimAdapter {
    fills: Vec<FillEvent>,
}

impl SimAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fills(&self) -> &[FillEvent] {
        &self.fills
    }
}

impl ExecutionAdapter for SimAdapter {
    fn open(&mut self, symbol: &str, side: Side, size: f64, entry_price: f64, time: DateTime<Utc>) {
        self.fills.push(FillEvent::Open {
            symbol: symbol.to_string(),
            side,
            size,
            price: entry_price,
            time,
        });
    }

    fn close(&mut self, symbol: &str, size: f64, exit_price: f64, time: DateTime<Utc>) {
        self.fills.push(FillEvent::Close { symbol: symbol.to_string(), size, price: exit_price, time });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExecutionConfig;

    fn bar_at_close(close: f64) -> Bar {
        Bar::from_millis(0, 3_600_000, close, close + 1.0, close - 1.0, close, 1000.0)
    }

    fn model(slippage: f64, commission: f64) -> FillModel {
        FillModel::new(ExecutionConfig {
            commission_rate: commission,
            slippage_rate: slippage,
            atr_slippage_factor: None,
            max_slippage_rate: 0.005,
        })
    }

    #[test]
    fn long_fills_slip_against_the_trade() {
        let m = model(0.001, 0.0);
        let bar = bar_at_close(100.0);
        assert_eq!(m.entry_price(&bar, Side::Long, None), 100.1);
        assert_eq!(m.exit_price(&bar, Side::Long, None), 99.9);
    }

    #[test]
    fn short_fills_are_mirrored() {
        let m = model(0.001, 0.0);
        let bar = bar_at_close(100.0);
        assert_eq!(m.entry_price(&bar, Side::Short, None), 99.9);
        assert_eq!(m.exit_price(&bar, Side::Short, None), 100.1);
    }

    #[test]
    fn commission_covers_both_sides() {
        let m = model(0.0, 0.0005);
        // entry 100 * 10 + exit 110 * 10 = 2100 notional → 1.05
        assert!((m.commission(100.0, 110.0, 10.0) - 1.05).abs() < 1e-12);
    }

    #[test]
    fn atr_scaling_raises_and_caps_slippage() {
        let mut cfg = ExecutionConfig {
            commission_rate: 0.0,
            slippage_rate: 0.0005,
            atr_slippage_factor: Some(0.1),
            max_slippage_rate: 0.002,
        };
        let m = FillModel::new(cfg);
        let bar = bar_at_close(100.0);
        // s = 0.0005 + 0.1 * 1.0 / 100 = 0.0015
        assert!((m.slippage_rate(&bar, Some(1.0)) - 0.0015).abs() < 1e-12);
        // Huge ATR hits the cap.
        assert_eq!(m.slippage_rate(&bar, Some(50.0)), 0.002);
        // Undefined ATR: base rate.
        assert_eq!(m.slippage_rate(&bar, None), 0.0005);

        cfg.atr_slippage_factor = None;
        let m = FillModel::new(cfg);
        assert_eq!(m.slippage_rate(&bar, Some(50.0)), 0.0005);
    }

    #[test]
    fn sim_adapter_records_fills() {
        let mut sim = SimAdapter::new();
        let t = chrono::Utc::now();
        sim.open("BTCUSDT", Side::Long, 2.0, 100.0, t);
        sim.close("BTCUSDT", 2.0, 105.0, t);
        assert_eq!(sim.fills().len(), 2);
        assert!(matches!(sim.fills()[0], FillEvent::Open { size, .. } if size == 2.0));
    }
}
