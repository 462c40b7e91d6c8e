//! Forward polling (paper trading).
//!
//! The session advances one closed LTF bar at a time as new bars arrive
//! from the provider. Bar buffers are bounded and append-only (eldest
//! eviction); a bar that has been processed is never revisited, so
//! decisions cannot change retroactively. Provider errors during a poll are
//! logged and retried on the next poll — the loop never dies on a transient
//! failure. The sleep between polls lives here, outside the core, and the
//! host cancels between bars; bars are processed atomically.

use crate::backtest::RunError;
use crate::provider::BarProvider;
use anyhow::Context;
use perptrend_core::config::Config;
use perptrend_core::domain::{Bar, TradeRecord};
use perptrend_core::engine::{BarOutcome, BarRunner, WarmupState};
use perptrend_core::features::{align_htf_to_ltf, build_htf_features, build_ltf_features};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default bar-buffer capacity. Comfortably above the default warm-up
/// (200-period HTF EMA) so eviction never starves the indicators.
const DEFAULT_BUFFER_CAPACITY: usize = 500;

/// What one poll did.
#[derive(Debug, Clone, Default)]
pub struct PaperStep {
    /// Newly arrived closed LTF bars processed this poll.
    pub bars_processed: usize,
    /// Engine outcome per processed bar, in order.
    pub outcomes: Vec<BarOutcome>,
}

/// One paper-trading session for one instrument.
pub struct PaperSession {
    config: Config,
    runner: BarRunner,
    ltf_buffer: VecDeque<Bar>,
    htf_buffer: VecDeque<Bar>,
    capacity: usize,
    last_processed_open: Option<chrono::DateTime<chrono::Utc>>,
}

impl PaperSession {
    pub fn new(config: Config) -> Result<Self, RunError> {
        config.validate()?;
        let runner = BarRunner::new(config.clone());
        Ok(Self {
            config,
            runner,
            ltf_buffer: VecDeque::new(),
            htf_buffer: VecDeque::new(),
            capacity: DEFAULT_BUFFER_CAPACITY,
            last_processed_open: None,
        })
    }

    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// One poll: pull the tails of both timeframes, absorb any newly
    /// closed bars, and step the engine once per new LTF bar.
    pub fn poll_once(&mut self, provider: &impl BarProvider) -> Result<PaperStep, RunError> {
        let ltf_tail =
            provider.poll_tail(&self.config.symbol, self.config.timeframes.signal, self.capacity)?;
        let htf_tail =
            provider.poll_tail(&self.config.symbol, self.config.timeframes.trend, self.capacity)?;

        absorb(&mut self.ltf_buffer, ltf_tail, self.capacity);
        absorb(&mut self.htf_buffer, htf_tail, self.capacity);

        let ltf: Vec<Bar> = self.ltf_buffer.iter().cloned().collect();
        let htf: Vec<Bar> = self.htf_buffer.iter().cloned().collect();

        let mut step = PaperStep::default();
        let pending: Vec<usize> = ltf
            .iter()
            .enumerate()
            .filter(|(_, bar)| match self.last_processed_open {
                Some(last) => bar.open_time > last,
                None => true,
            })
            .map(|(i, _)| i)
            .collect();

        if pending.is_empty() {
            return Ok(step);
        }

        // Recompute features over the buffered window; already-processed
        // bars are never re-read.
        let htf_features = build_htf_features(&htf, &self.config.indicators);
        let ltf_features = build_ltf_features(
            &ltf,
            &self.config.indicators,
            &self.config.strategy,
            self.config.adx_history_len(),
        );
        let aligned = align_htf_to_ltf(&ltf, &htf, &htf_features)?;

        for i in pending {
            let bar = &ltf[i];
            let outcome = self.runner.on_bar(bar, &aligned[i], &ltf_features[i])?;
            self.last_processed_open = Some(bar.open_time);
            step.bars_processed += 1;
            step.outcomes.push(outcome);
        }

        Ok(step)
    }

    /// Poll loop: sleep, poll, repeat until cancelled. Provider failures
    /// are logged and retried on the next tick.
    pub fn run(
        &mut self,
        provider: &impl BarProvider,
        interval: Duration,
        cancel: &AtomicBool,
    ) -> anyhow::Result<()> {
        let warmup = WarmupState::for_ltf(&self.config);
        info!(
            symbol = %self.config.symbol,
            interval_secs = interval.as_secs(),
            warmup_bars = warmup.bars_until_warm(),
            "paper session started"
        );

        while !cancel.load(Ordering::Relaxed) {
            match self.poll_once(provider) {
                Ok(step) if step.bars_processed > 0 => {
                    debug!(
                        bars = step.bars_processed,
                        trades = self.runner.trades().len(),
                        equity = self.runner.equity().current(),
                        "processed new bars"
                    );
                    for outcome in &step.outcomes {
                        if let BarOutcome::Exited(reason) = outcome {
                            info!(reason = %reason, "position closed");
                        }
                    }
                }
                Ok(_) => debug!("no new closed bars"),
                // Config/alignment/engine failures are bugs, not transient.
                Err(err @ (RunError::Config(_) | RunError::Alignment(_) | RunError::Engine(_))) => {
                    return Err(err).context("paper session hit a fatal error");
                }
                Err(err) => {
                    warn!(error = %err, "poll failed; retrying next tick");
                }
            }

            std::thread::sleep(interval);
        }

        info!("paper session cancelled");
        Ok(())
    }

    pub fn trades(&self) -> &[TradeRecord] {
        self.runner.trades()
    }

    pub fn equity(&self) -> f64 {
        self.runner.equity().current()
    }

    pub fn runner(&self) -> &BarRunner {
        &self.runner
    }
}

/// Append newly closed bars in order; evict the eldest beyond `capacity`.
/// Old entries are never mutated.
fn absorb(buffer: &mut VecDeque<Bar>, tail: Vec<Bar>, capacity: usize) {
    for bar in tail {
        let is_new = buffer.back().map(|last| bar.open_time > last.open_time).unwrap_or(true);
        if is_new {
            buffer.push_back(bar);
        }
    }
    while buffer.len() > capacity {
        buffer.pop_front();
    }
}
