/*
[INPUT]:  ScalpConfig, an Exchange port, external commands, shutdown token
[OUTPUT]: The tick-driven strategy engine with lifecycle and snapshots
[POS]:    Strategy layer - state machine and order lifecycle controller
[UPDATE]: When lifecycle transitions or the per-tick pass order change
*/

use std::sync::Arc;

use anyhow::Result;
use rust_decimal::Decimal;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use bybit_scalp_adapter::Side;

use crate::book::{BuyOrder, StrategyBook, TpOrder};
use crate::config::ScalpConfig;
use crate::exchange::Exchange;
use crate::stats::Stats;

mod ladder;
mod take_profit;
mod waiting;

#[cfg(test)]
mod tests;

pub use waiting::{PendingMarketSell, PendingNewTp, WaitState};

/// Engine lifecycle states. The market-sell wait sub-state lives next to
/// this as `Option<WaitState>` and may only be set while `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Stopped,
    Running,
    Paused,
    Stopping,
}

/// External control commands, observed at tick boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCommand {
    Start,
    Pause,
    Resume,
    Stop,
}

/// Point-in-time view of the engine for reporting.
#[derive(Debug, Clone)]
pub struct EngineSnapshot {
    pub state: EngineState,
    pub waiting_for_market_sell: bool,
    pub stats: Stats,
    pub open_buys: Vec<BuyOrder>,
    pub open_tps: Vec<TpOrder>,
    pub pending_market_sell: Option<PendingMarketSell>,
    pub pending_new_tp: Option<PendingNewTp>,
    /// Realized P/L plus the paper profit of every open take-profit.
    pub estimated_profit: Decimal,
    pub average_buy_price: Decimal,
}

/// The scalping engine: one symbol, one BUY ladder, one TP set.
///
/// A single logical task drives it; every await suspends on the exchange
/// port, and no two ticks overlap, so the book needs no locking.
#[derive(Debug)]
pub struct ScalpEngine {
    config: ScalpConfig,
    state: EngineState,
    waiting: Option<WaitState>,
    book: StrategyBook,
    stats: Stats,
    last_buy_fill: Option<tokio::time::Instant>,
}

impl ScalpEngine {
    /// Validate the configuration and build a stopped engine.
    pub fn new(config: ScalpConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            state: EngineState::Stopped,
            waiting: None,
            book: StrategyBook::new(),
            stats: Stats::default(),
            last_buy_fill: None,
        })
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn config(&self) -> &ScalpConfig {
        &self.config
    }

    /// Apply one external command.
    pub async fn apply(&mut self, exchange: &dyn Exchange, command: EngineCommand) {
        match (self.state, command) {
            (EngineState::Stopped, EngineCommand::Start) => {
                self.book.clear();
                self.stats.reset();
                self.waiting = None;
                self.last_buy_fill = None;
                self.state = EngineState::Running;
                info!(symbol = %self.config.symbol, "engine started");
            }
            (EngineState::Running, EngineCommand::Pause) => {
                if self.waiting.is_some() {
                    warn!("pause ignored while a market sell is pending");
                    return;
                }
                self.cancel_all_buys(exchange).await;
                self.state = EngineState::Paused;
                info!("engine paused; take-profits stay working");
            }
            (EngineState::Paused, EngineCommand::Resume) => {
                self.state = EngineState::Running;
                info!("engine resumed");
            }
            (EngineState::Running | EngineState::Paused, EngineCommand::Stop) => {
                self.state = EngineState::Stopping;
                self.flatten_on_stop(exchange).await;
                self.state = EngineState::Stopped;
                info!("engine stopped");
            }
            (state, command) => {
                debug!(?state, ?command, "command ignored in current state");
            }
        }
    }

    /// One pass of the strategy. The order is fixed: wait controller, book
    /// top, BUY reconciliation, ladder top-up, TP reconciliation. Every
    /// failure is logged and retried next tick; nothing here aborts the loop.
    pub async fn tick(&mut self, exchange: &dyn Exchange) {
        if !matches!(self.state, EngineState::Running | EngineState::Paused) {
            return;
        }

        if self.waiting.is_some() {
            self.drive_pending_sell(exchange).await;
        }

        let top = match exchange.orderbook_top().await {
            Ok(top) => Some(top),
            Err(err) => {
                warn!(error = %err, "orderbook fetch failed; ladder skipped this tick");
                None
            }
        };

        if self.state == EngineState::Running {
            if self.waiting.is_none() {
                if let Some(top) = top {
                    self.reconcile_buys(exchange, top).await;
                    if self.waiting.is_none() {
                        self.top_up_ladder(exchange, top).await;
                    }
                }
            }
            if self.waiting.is_some() {
                self.cancel_remaining_buys(exchange).await;
            }
        }

        self.reconcile_tps(exchange).await;
    }

    /// Current engine view for the control surface.
    pub fn snapshot(&self) -> EngineSnapshot {
        let unrealized: Decimal = self
            .book
            .tps()
            .iter()
            .map(|tp| (tp.sell_price - tp.buy_price) * tp.qty)
            .sum();

        EngineSnapshot {
            state: self.state,
            waiting_for_market_sell: self.waiting.is_some(),
            stats: self.stats.clone(),
            open_buys: self.book.buys().to_vec(),
            open_tps: self.book.tps().to_vec(),
            pending_market_sell: self.waiting.as_ref().map(|wait| wait.sell.clone()),
            pending_new_tp: self.waiting.as_ref().and_then(|wait| wait.pending_tp.clone()),
            estimated_profit: self.stats.realized_pnl + unrealized,
            average_buy_price: self.stats.average_buy_price(),
        }
    }

    /// Drive the engine until the shutdown token fires. Commands are taken
    /// between ticks; a snapshot is published after every turn.
    pub async fn run(
        mut self,
        exchange: Arc<dyn Exchange>,
        mut commands: mpsc::Receiver<EngineCommand>,
        snapshots: watch::Sender<EngineSnapshot>,
        shutdown: CancellationToken,
    ) -> Result<()> {
        let mut ticker = tokio::time::interval(self.config.loop_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut commands_open = true;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!(symbol = %self.config.symbol, "engine shutdown requested");
                    if matches!(self.state, EngineState::Running | EngineState::Paused) {
                        self.apply(exchange.as_ref(), EngineCommand::Stop).await;
                    }
                    let _ = snapshots.send(self.snapshot());
                    return Ok(());
                }
                command = commands.recv(), if commands_open => {
                    match command {
                        Some(command) => {
                            self.apply(exchange.as_ref(), command).await;
                            let _ = snapshots.send(self.snapshot());
                        }
                        None => commands_open = false,
                    }
                }
                _ = ticker.tick() => {
                    self.tick(exchange.as_ref()).await;
                    let _ = snapshots.send(self.snapshot());
                }
            }
        }
    }

    async fn cancel_all_buys(&mut self, exchange: &dyn Exchange) {
        for order_id in self.book.buy_ids() {
            match exchange.cancel(&order_id).await {
                Ok(()) => self.stats.buys_canceled += 1,
                Err(err) => warn!(error = %err, %order_id, "buy cancel failed"),
            }
            self.book.remove_buy(&order_id);
        }
    }

    async fn flatten_on_stop(&mut self, exchange: &dyn Exchange) {
        self.cancel_all_buys(exchange).await;

        if let Some(wait) = self.waiting.take() {
            match exchange.cancel(&wait.sell.order_id).await {
                Ok(()) => self.stats.sells_canceled += 1,
                Err(err) => {
                    warn!(error = %err, order_id = %wait.sell.order_id, "pending sell cancel failed on stop");
                }
            }
        }

        if self.book.tp_count() == 0 {
            self.stats.drain_positions();
            return;
        }

        if self.config.sell_all_on_stop {
            match exchange.orderbook_top().await {
                Ok(top) => {
                    for tp in self.book.drain_tps() {
                        match exchange.cancel(&tp.order_id).await {
                            Ok(()) => self.stats.sells_canceled += 1,
                            Err(err) => {
                                warn!(error = %err, order_id = %tp.order_id, "take-profit cancel failed on stop");
                            }
                        }
                        match exchange.place_market(Side::Sell, tp.qty).await {
                            Ok(order_id) => {
                                self.stats.sells_created += 1;
                                // Approximate: the taker fill lands near the ask.
                                self.stats
                                    .add_realized((top.best_ask - tp.buy_price) * tp.qty);
                                info!(%order_id, qty = %tp.qty, "position flattened with a market sell");
                            }
                            Err(err) => {
                                warn!(error = %err, "market sell failed while flattening");
                            }
                        }
                    }
                }
                Err(err) => {
                    warn!(error = %err, "orderbook fetch failed on stop; canceling take-profits only");
                    self.cancel_tps_without_flatten(exchange).await;
                }
            }
        } else {
            self.cancel_tps_without_flatten(exchange).await;
        }

        self.stats.drain_positions();
    }

    async fn cancel_tps_without_flatten(&mut self, exchange: &dyn Exchange) {
        for tp in self.book.drain_tps() {
            match exchange.cancel(&tp.order_id).await {
                Ok(()) => self.stats.sells_canceled += 1,
                Err(err) => {
                    warn!(error = %err, order_id = %tp.order_id, "take-profit cancel failed on stop");
                }
            }
        }
    }
}
