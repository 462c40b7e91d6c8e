//! End-to-end runner tests over synthetic two-timeframe data: backtest
//! determinism, warm-up window discipline, data-quality gating, and
//! paper-mode equivalence with historical replay.

use chrono::{TimeZone, Utc};
use perptrend_core::config::{BacktestWindow, Config};
use perptrend_core::domain::{Bar, Timeframe};
use perptrend_runner::{run_backtest, PaperSession, ProviderError, ReplayProvider, RunError};
use rand::Rng;
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;

const H1_MS: i64 = 3_600_000;

/// Seeded walk alternating strong 80-bar rallies with choppy declines.
/// Rally bars step up harder than any preceding high can reach, so
/// breakouts (and later stop-outs) are guaranteed.
fn make_walk(n: usize, seed: u64) -> (Vec<Bar>, Vec<Bar>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut price: f64 = 100.0;
    let mut ltf = Vec::with_capacity(n);

    for i in 0..n {
        let rallying = (i / 80) % 2 == 0;
        let step: f64 = if rallying {
            2.0 + rng.gen_range(0.0..0.3)
        } else {
            rng.gen_range(-1.8..0.6)
        };
        let open = price;
        price = (price + step).max(10.0);
        let close = price;
        let high = open.max(close) + rng.gen_range(0.05..0.5);
        let low = (open.min(close) - rng.gen_range(0.05..0.5)).max(1.0);
        ltf.push(Bar::from_millis(
            i as i64 * H1_MS,
            (i as i64 + 1) * H1_MS,
            open,
            high,
            low,
            close,
            1000.0,
        ));
    }

    let htf: Vec<Bar> = ltf
        .chunks(4)
        .enumerate()
        .filter(|(_, c)| c.len() == 4)
        .map(|(i, c)| {
            Bar::from_millis(
                i as i64 * 4 * H1_MS,
                (i as i64 + 1) * 4 * H1_MS,
                c[0].open,
                c.iter().map(|b| b.high).fold(f64::MIN, f64::max),
                c.iter().map(|b| b.low).fold(f64::MAX, f64::min),
                c[3].close,
                4000.0,
            )
        })
        .collect();

    (ltf, htf)
}

/// Short periods so a few hundred bars are plenty.
fn fast_config(n_hours: i64) -> Config {
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
    cfg.backtest = Some(BacktestWindow {
        start: Utc.timestamp_millis_opt(0).single().unwrap(),
        end: Utc.timestamp_millis_opt(n_hours * H1_MS).single().unwrap(),
    });
    cfg
}

fn provider_for(ltf: &[Bar], htf: &[Bar]) -> ReplayProvider {
    ReplayProvider::new()
        .with_series(Timeframe::H1, ltf.to_vec())
        .with_series(Timeframe::H4, htf.to_vec())
}

#[test]
fn trending_walk_trades_and_accounts_exactly() {
    let (ltf, htf) = make_walk(480, 7);
    let cfg = fast_config(480);
    let report = run_backtest(&cfg, &provider_for(&ltf, &htf)).unwrap();

    assert!(!report.trades.is_empty(), "drifting walk should produce trades");
    assert_eq!(report.equity_curve.len(), ltf.len());

    let pnl_sum: f64 = report.trades.iter().map(|t| t.pnl).sum();
    assert!((pnl_sum - report.total_pnl()).abs() < 1e-6);
    assert!(report.win_rate() >= 0.0 && report.win_rate() <= 1.0);
}

#[test]
fn rerun_is_bitwise_identical() {
    let (ltf, htf) = make_walk(480, 11);
    let cfg = fast_config(480);
    let provider = provider_for(&ltf, &htf);

    let first = run_backtest(&cfg, &provider).unwrap();
    let second = run_backtest(&cfg, &provider).unwrap();

    assert_eq!(first.trades, second.trades);
    assert_eq!(first.final_equity.to_bits(), second.final_equity.to_bits());
    assert_eq!(first.equity_curve, second.equity_curve);
}

#[test]
fn bars_before_start_date_cannot_produce_signals() {
    let (ltf, htf) = make_walk(480, 13);
    let mut cfg = fast_config(480);
    // Window starts 96 hours in: the earlier bars exist in the provider but
    // are outside the configured window.
    let start = Utc.timestamp_millis_opt(96 * H1_MS).single().unwrap();
    cfg.backtest = Some(BacktestWindow {
        start,
        end: Utc.timestamp_millis_opt(480 * H1_MS).single().unwrap(),
    });

    let with_prefix = run_backtest(&cfg, &provider_for(&ltf, &htf)).unwrap();

    // The same provider minus the pre-window bars: identical trades.
    let ltf_trimmed: Vec<Bar> = ltf.iter().filter(|b| b.open_time >= start).cloned().collect();
    let htf_trimmed: Vec<Bar> = htf.iter().filter(|b| b.open_time >= start).cloned().collect();
    let without_prefix = run_backtest(&cfg, &provider_for(&ltf_trimmed, &htf_trimmed)).unwrap();

    assert_eq!(with_prefix.trades, without_prefix.trades);
}

#[test]
fn corrupt_bar_is_fatal_in_backtest() {
    let (mut ltf, htf) = make_walk(480, 17);
    ltf[100].high = ltf[100].low - 5.0; // inverted range
    let cfg = fast_config(480);
    let err = run_backtest(&cfg, &provider_for(&ltf, &htf)).unwrap_err();
    assert!(matches!(err, RunError::DataQuality(_)));
}

#[test]
fn missing_window_is_fatal() {
    let (ltf, htf) = make_walk(100, 19);
    let mut cfg = fast_config(100);
    cfg.backtest = None;
    let err = run_backtest(&cfg, &provider_for(&ltf, &htf)).unwrap_err();
    assert!(matches!(err, RunError::MissingWindow));
}

#[test]
fn invalid_config_is_fatal() {
    let (ltf, htf) = make_walk(100, 23);
    let mut cfg = fast_config(100);
    cfg.risk.max_risk_per_trade = 0.0;
    let err = run_backtest(&cfg, &provider_for(&ltf, &htf)).unwrap_err();
    assert!(matches!(err, RunError::Config(_)));
}

#[test]
fn paper_session_matches_backtest_on_same_bars() {
    let n = 480usize;
    let (ltf, htf) = make_walk(n, 29);
    let cfg = fast_config(n as i64);

    let backtest = run_backtest(&cfg, &provider_for(&ltf, &htf)).unwrap();

    // Feed the same bars forward, 24 hours per poll.
    let mut provider = provider_for(&ltf, &htf);
    let mut session = PaperSession::new(cfg).unwrap().with_buffer_capacity(2 * n);
    for chunk_end in (24..=n as i64).step_by(24) {
        provider.set_now(Utc.timestamp_millis_opt(chunk_end * H1_MS).single().unwrap());
        session.poll_once(&provider).unwrap();
    }

    assert_eq!(session.trades(), backtest.trades.as_slice());
    assert_eq!(session.equity().to_bits(), backtest.final_equity.to_bits());
}

#[test]
fn paper_never_processes_a_bar_twice() {
    let (ltf, htf) = make_walk(200, 31);
    let mut provider = provider_for(&ltf, &htf);
    provider.set_now(Utc.timestamp_millis_opt(100 * H1_MS).single().unwrap());

    let mut session = PaperSession::new(fast_config(200)).unwrap();
    let first = session.poll_once(&provider).unwrap();
    assert_eq!(first.bars_processed, 100);

    // Nothing new arrived: the poll is a no-op.
    let second = session.poll_once(&provider).unwrap();
    assert_eq!(second.bars_processed, 0);

    provider.set_now(Utc.timestamp_millis_opt(101 * H1_MS).single().unwrap());
    let third = session.poll_once(&provider).unwrap();
    assert_eq!(third.bars_processed, 1);
}

#[test]
fn paper_provider_error_leaves_session_usable() {
    let (ltf, htf) = make_walk(200, 37);

    // HTF series missing: the poll fails with a provider error.
    let mut broken = ReplayProvider::new().with_series(Timeframe::H1, ltf.clone());
    broken.set_now(Utc.timestamp_millis_opt(50 * H1_MS).single().unwrap());

    let mut session = PaperSession::new(fast_config(200)).unwrap();
    let err = session.poll_once(&broken).unwrap_err();
    assert!(matches!(err, RunError::Provider(ProviderError::NoData { .. })));

    // Next poll against a healthy provider succeeds; nothing was lost.
    let mut healthy = provider_for(&ltf, &htf);
    healthy.set_now(Utc.timestamp_millis_opt(50 * H1_MS).single().unwrap());
    let step = session.poll_once(&healthy).unwrap();
    assert_eq!(step.bars_processed, 50);
}
