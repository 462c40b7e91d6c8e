//! Warmup state tracker.
//!
//! Insufficient history is not an error: the runner simply holds until all
//! required features are defined. This tracker exists for diagnostics (how
//! many bars until the engine can act).

use crate::config::Config;
use crate::features::{htf_warmup_bars, ltf_warmup_bars};

#[derive(Debug, Clone)]
pub struct WarmupState {
    warmup_bars: usize,
    bars_processed: usize,
}

impl WarmupState {
    pub fn new(warmup_bars: usize) -> Self {
        Self { warmup_bars, bars_processed: 0 }
    }

    /// Warmup derived from the configured LTF indicator lookbacks.
    /// HTF warm-up runs on its own (slower) clock and is reported by
    /// `htf_warmup_bars`; entry gating itself keys off feature definedness,
    /// not this counter.
    pub fn for_ltf(config: &Config) -> Self {
        Self::new(ltf_warmup_bars(&config.indicators, &config.strategy))
    }

    pub fn for_htf(config: &Config) -> Self {
        Self::new(htf_warmup_bars(&config.indicators))
    }

    pub fn process_bar(&mut self) {
        self.bars_processed += 1;
    }

    pub fn is_warm(&self) -> bool {
        self.bars_processed >= self.warmup_bars
    }

    pub fn bars_until_warm(&self) -> usize {
        self.warmup_bars.saturating_sub(self.bars_processed)
    }
}
