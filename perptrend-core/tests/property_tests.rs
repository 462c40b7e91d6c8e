//! Property tests for engine invariants.
//!
//! Uses proptest to verify, over random bar sequences:
//! 1. Stop monotonicity — the active stop never loosens while a position
//!    is open, and never sits below the initial stop.
//! 2. High-water monotonicity — max unrealized R never decreases.
//! 3. Trailing floor — while trailing is active, the trailing stop stays at
//!    or above the entry price.
//! 4. Determinism — replaying the same bars yields identical trades.
//! 5. Accounting identity — sum of trade PnL equals final equity minus
//!    initial capital.

use proptest::prelude::*;
use perptrend_core::config::Config;
use perptrend_core::domain::{Bar, PositionState, Side};
use perptrend_core::engine::BarRunner;
use perptrend_core::features::{align_htf_to_ltf, build_htf_features, build_ltf_features};

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_steps() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-2.5..2.5_f64, 60..160)
}

fn arb_spread() -> impl Strategy<Value = f64> {
    0.1..2.0_f64
}

/// Build an LTF walk from price steps plus matching 4x HTF bars.
fn walk(steps: &[f64], spread: f64) -> (Vec<Bar>, Vec<Bar>) {
    let mut closes = Vec::with_capacity(steps.len());
    let mut price: f64 = 100.0;
    for step in steps {
        price = (price + step).max(5.0);
        closes.push(price);
    }

    let ltf: Vec<Bar> = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            let high = open.max(close) + spread;
            let low = (open.min(close) - spread).max(0.5);
            Bar::from_millis(
                i as i64 * 3_600_000,
                (i as i64 + 1) * 3_600_000,
                open,
                high,
                low,
                close,
                1000.0,
            )
        })
        .collect();

    // Aggregate groups of 4 LTF bars into HTF bars.
    let htf: Vec<Bar> = ltf
        .chunks(4)
        .enumerate()
        .filter(|(_, chunk)| chunk.len() == 4)
        .map(|(i, chunk)| {
            let high = chunk.iter().map(|b| b.high).fold(f64::MIN, f64::max);
            let low = chunk.iter().map(|b| b.low).fold(f64::MAX, f64::min);
            Bar::from_millis(
                i as i64 * 4 * 3_600_000,
                (i as i64 + 1) * 4 * 3_600_000,
                chunk[0].open,
                high,
                low,
                chunk[3].close,
                4000.0,
            )
        })
        .collect();

    (ltf, htf)
}

/// Small periods so random walks actually produce trades.
fn fast_config() -> Config {
    let mut cfg = Config::default();
    cfg.indicators.ema_short = 3;
    cfg.indicators.ema_medium = 5;
    cfg.indicators.ema_long = 8;
    cfg.indicators.adx_period = 3;
    cfg.indicators.atr_period = 3;
    cfg.strategy.lookback_period = 4;
    cfg.strategy.htf_adx_min = 10.0;
    cfg.strategy.ltf_adx_min = 10.0;
    cfg.risk.trend_exhaust_bars = 2;
    cfg.risk.profit_lock_r = Some(4.0);
    cfg
}

struct RunResult {
    trades: Vec<perptrend_core::domain::TradeRecord>,
    final_equity: f64,
}

/// Run the full pipeline, checking per-bar position invariants along the way.
fn run_checked(cfg: &Config, ltf: &[Bar], htf: &[Bar]) -> RunResult {
    let htf_feats = build_htf_features(htf, &cfg.indicators);
    let ltf_feats = build_ltf_features(ltf, &cfg.indicators, &cfg.strategy, cfg.adx_history_len());
    let aligned = align_htf_to_ltf(ltf, htf, &htf_feats).unwrap();

    let mut runner = BarRunner::new(cfg.clone());
    let mut prev_stop: Option<f64> = None;
    let mut prev_max_r: Option<f64> = None;

    for (i, bar) in ltf.iter().enumerate() {
        runner.on_bar(bar, &aligned[i], &ltf_feats[i]).unwrap();

        match runner.position() {
            Some(pos) if runner.state() == PositionState::Open => {
                assert_eq!(pos.side(), Side::Long, "strategy only opens longs");

                // Active stop never loosens, never below the initial stop.
                if let Some(prev) = prev_stop {
                    assert!(
                        pos.active_stop() >= prev,
                        "active stop loosened at bar {i}: {prev} -> {}",
                        pos.active_stop()
                    );
                }
                assert!(pos.active_stop() >= pos.initial_stop());

                // High-water R never decreases.
                if let Some(prev) = prev_max_r {
                    assert!(pos.max_unrealized_r() >= prev, "max R decreased at bar {i}");
                }

                // Trailing floor: once trailing, the trail sits at or above
                // entry (long).
                if pos.is_trailing_active() {
                    let trail = pos.trailing_stop().expect("trailing active without a trail");
                    assert!(trail >= pos.entry_price(), "trail below entry at bar {i}");
                    assert_eq!(pos.active_stop(), trail);
                }

                prev_stop = Some(pos.active_stop());
                prev_max_r = Some(pos.max_unrealized_r());
            }
            _ => {
                prev_stop = None;
                prev_max_r = None;
            }
        }
    }

    RunResult { trades: runner.trades().to_vec(), final_equity: runner.equity().current() }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Position invariants hold on every bar of every random walk, and the
    /// accounting identity closes exactly.
    #[test]
    fn invariants_hold_on_random_walks(steps in arb_steps(), spread in arb_spread()) {
        let (ltf, htf) = walk(&steps, spread);
        let cfg = fast_config();
        let result = run_checked(&cfg, &ltf, &htf);

        let pnl_sum: f64 = result.trades.iter().map(|t| t.pnl).sum();
        let drift = (pnl_sum - (result.final_equity - cfg.account.initial_capital)).abs();
        prop_assert!(drift < 1e-6, "accounting identity drift: {drift}");

        // equity_after chains through the trade list.
        let mut equity = cfg.account.initial_capital;
        for trade in &result.trades {
            equity += trade.pnl;
            prop_assert!((trade.equity_after - equity).abs() < 1e-6);
        }
    }

    /// Replaying the same bars with the same config is bitwise identical.
    #[test]
    fn replay_is_deterministic(steps in arb_steps(), spread in arb_spread()) {
        let (ltf, htf) = walk(&steps, spread);
        let cfg = fast_config();
        let first = run_checked(&cfg, &ltf, &htf);
        let second = run_checked(&cfg, &ltf, &htf);

        prop_assert_eq!(first.trades.len(), second.trades.len());
        for (a, b) in first.trades.iter().zip(second.trades.iter()) {
            prop_assert_eq!(a, b);
        }
        prop_assert_eq!(first.final_equity.to_bits(), second.final_equity.to_bits());
    }

    /// Trades always close in chronological order with positive size.
    #[test]
    fn trades_are_ordered_and_sized(steps in arb_steps(), spread in arb_spread()) {
        let (ltf, htf) = walk(&steps, spread);
        let result = run_checked(&fast_config(), &ltf, &htf);

        for pair in result.trades.windows(2) {
            prop_assert!(pair[0].exit_time <= pair[1].entry_time);
        }
        for trade in &result.trades {
            prop_assert!(trade.size > 0.0);
            prop_assert!(trade.entry_time < trade.exit_time);
        }
    }
}
