//! Bar runner: per-bar orchestration.
//!
//! Order is fixed: the risk manager runs first (when a position is open),
//! then the strategy (when flat). A bar that exits never re-enters — the
//! runner returns as soon as the exit settles. Each bar is processed
//! atomically; the equity curve records one point per bar.

use crate::config::Config;
use crate::domain::{
    Bar, ExitReason, Position, PositionBook, PositionState, Side, StateMachineError, TradeRecord,
};
use crate::engine::equity::EquityTracker;
use crate::engine::execution::{ExecutionAdapter, FillModel, SimAdapter};
use crate::features::{HtfFeatures, LtfFeatures};
use crate::risk::{self, RiskVerdict};
use crate::strategy::{self, Signal};
use thiserror::Error;

/// What one bar did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarOutcome {
    Held,
    Entered,
    Exited(ExitReason),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    State(#[from] StateMachineError),
}

/// Per-bar orchestrator. Owns the position book, the equity tracker, and
/// the trade log exclusively; nothing else mutates them.
pub struct BarRunner {
    config: Config,
    fill: FillModel,
    book: PositionBook,
    equity: EquityTracker,
    trades: Vec<TradeRecord>,
    adapter: Box<dyn ExecutionAdapter>,
}

impl BarRunner {
    pub fn new(config: Config) -> Self {
        Self::with_adapter(config, Box::new(SimAdapter::new()))
    }

    pub fn with_adapter(config: Config, adapter: Box<dyn ExecutionAdapter>) -> Self {
        let fill = FillModel::new(config.execution);
        let equity = EquityTracker::new(config.account.initial_capital);
        Self { config, fill, book: PositionBook::new(), equity, trades: Vec::new(), adapter }
    }

    /// Process one closed LTF bar with its aligned feature context.
    pub fn on_bar(
        &mut self,
        bar: &Bar,
        htf: &HtfFeatures,
        ltf: &LtfFeatures,
    ) -> Result<BarOutcome, EngineError> {
        let outcome = self.step(bar, htf, ltf)?;
        self.equity.record();
        Ok(outcome)
    }

    fn step(
        &mut self,
        bar: &Bar,
        htf: &HtfFeatures,
        ltf: &LtfFeatures,
    ) -> Result<BarOutcome, EngineError> {
        // Risk strictly precedes strategy.
        if self.book.state() == PositionState::Open {
            let verdict = {
                let position = self.book.position().ok_or(StateMachineError::MissingPosition)?;
                risk::evaluate(position, bar, ltf, &self.config.risk)
            };
            match verdict {
                RiskVerdict::Continue(update) => {
                    if let Some(update) = update {
                        self.book.update_stop(&update)?;
                    }
                }
                RiskVerdict::Exit(reason) => {
                    self.book.start_close()?;
                    self.execute_exit(bar, ltf, reason)?;
                    return Ok(BarOutcome::Exited(reason));
                }
            }
        }

        if let Signal::Entry { side, .. } =
            strategy::evaluate_entry(bar, htf, ltf, self.book.state(), &self.config.strategy)
        {
            if self.book.state() == PositionState::Flat && self.execute_entry(bar, ltf, side)? {
                return Ok(BarOutcome::Entered);
            }
        }

        Ok(BarOutcome::Held)
    }

    /// Open at the slipped close; size and stop derive from the slipped
    /// entry price.
    fn execute_entry(
        &mut self,
        bar: &Bar,
        ltf: &LtfFeatures,
        side: Side,
    ) -> Result<bool, EngineError> {
        let entry_price = self.fill.entry_price(bar, side, ltf.atr);
        let sized = risk::size_entry(side, entry_price, self.equity.current(), &self.config.risk);
        if !(sized.size > 0.0 && sized.size.is_finite()) {
            // Equity is exhausted; nothing sensible to open.
            return Ok(false);
        }

        let position =
            Position::open(side, entry_price, bar.close_time, sized.size, sized.initial_stop)?;
        self.adapter.open(&self.config.symbol, side, sized.size, entry_price, bar.close_time);
        self.book.open_position(position)?;
        Ok(true)
    }

    /// Close at the slipped close, settle commission and PnL, append the
    /// trade record.
    fn execute_exit(
        &mut self,
        bar: &Bar,
        ltf: &LtfFeatures,
        reason: ExitReason,
    ) -> Result<(), EngineError> {
        let position =
            self.book.position().cloned().ok_or(StateMachineError::MissingPosition)?;

        let exit_price = self.fill.exit_price(bar, position.side(), ltf.atr);
        let commission = self.fill.commission(position.entry_price(), exit_price, position.size());
        let gross = match position.side() {
            Side::Long => (exit_price - position.entry_price()) * position.size(),
            Side::Short => (position.entry_price() - exit_price) * position.size(),
        };
        let pnl = gross - commission;
        let slippage = (bar.close - exit_price).abs() * position.size();
        let equity_after = self.equity.apply_pnl(pnl);

        self.trades.push(TradeRecord {
            side: position.side(),
            entry_price: position.entry_price(),
            entry_time: position.entry_time(),
            exit_price,
            exit_time: bar.close_time,
            size: position.size(),
            pnl,
            commission,
            slippage,
            equity_after,
            reason,
        });
        self.adapter.close(&self.config.symbol, position.size(), exit_price, bar.close_time);
        self.book.close_position();
        Ok(())
    }

    pub fn state(&self) -> PositionState {
        self.book.state()
    }

    pub fn position(&self) -> Option<&Position> {
        self.book.position()
    }

    pub fn trades(&self) -> &[TradeRecord] {
        &self.trades
    }

    pub fn equity(&self) -> &EquityTracker {
        &self.equity
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
