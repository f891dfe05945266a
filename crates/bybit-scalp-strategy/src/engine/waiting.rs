/*
[INPUT]:  Status of the outstanding eviction sell, fresh book tops
[OUTPUT]: Wait sub-state transitions: settle, limit fallback, reprice
[POS]:    Strategy layer - cross-order waiting controller
[UPDATE]: When fallback timeouts or reprice thresholds change
*/

use std::time::Duration;

use rust_decimal::Decimal;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use bybit_scalp_adapter::Side;

use crate::exchange::{Exchange, OrderState};
use crate::price::round_to_tick;

use super::ScalpEngine;

// A market sell that has not printed in 30 s is swapped for a resting limit;
// the limit then chases the bid whenever it falls more than two ticks behind.
const MARKET_SELL_TIMEOUT: Duration = Duration::from_secs(30);
const FALLBACK_REPRICE_AFTER: Duration = Duration::from_secs(10);
const FALLBACK_REPRICE_TICKS: u32 = 2;

/// The outstanding sell of an evicted position. Starts as a market order;
/// `limit_fallback` carries the resting price once it has been replaced.
#[derive(Debug, Clone)]
pub struct PendingMarketSell {
    pub order_id: String,
    pub qty: Decimal,
    /// Entry price of the evicted position, for P/L attribution.
    pub buy_price: Decimal,
    pub placed_at: Instant,
    pub limit_fallback: Option<Decimal>,
}

/// A buy fill whose take-profit is held back until capacity frees.
#[derive(Debug, Clone)]
pub struct PendingNewTp {
    pub buy_price: Decimal,
    pub qty: Decimal,
}

/// Payload of the waiting-for-market-sell sub-state.
#[derive(Debug)]
pub struct WaitState {
    pub sell: PendingMarketSell,
    pub pending_tp: Option<PendingNewTp>,
}

impl ScalpEngine {
    /// Runs at the top of every tick while the wait sub-state is set.
    pub(super) async fn drive_pending_sell(&mut self, exchange: &dyn Exchange) {
        let Some(wait) = self.waiting.as_ref() else {
            return;
        };
        let order_id = wait.sell.order_id.clone();

        let snapshot = match exchange.status(&order_id).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(error = %err, %order_id, "pending sell status query failed");
                return;
            }
        };

        match snapshot.map(|snapshot| snapshot.state) {
            Some(OrderState::Filled) => {
                // Estimate the print at the bid, the pessimistic side for a
                // sell. If the book fetch fails the fill settles next tick.
                let top = match exchange.orderbook_top().await {
                    Ok(top) => top,
                    Err(err) => {
                        warn!(error = %err, "orderbook fetch failed; settling the sell next tick");
                        return;
                    }
                };
                let wait = self.waiting.take().expect("wait state present");
                let pnl = (top.best_bid - wait.sell.buy_price) * wait.sell.qty;
                self.stats.add_realized(pnl);
                self.stats.sells_filled += 1;
                info!(%pnl, "evicted position sold; leaving the wait state");

                if let Some(pending) = wait.pending_tp {
                    self.place_tp(exchange, pending.buy_price, pending.qty).await;
                }
            }
            Some(OrderState::PartiallyFilled) => {
                debug!(%order_id, "pending sell partially filled; still waiting");
            }
            _ => {
                // Still resting, or not visible yet.
                self.reprice_pending_sell(exchange, order_id).await;
            }
        }
    }

    async fn reprice_pending_sell(&mut self, exchange: &dyn Exchange, order_id: String) {
        let now = Instant::now();
        let (elapsed, qty, fallback) = {
            let Some(wait) = self.waiting.as_ref() else {
                return;
            };
            (
                now.saturating_duration_since(wait.sell.placed_at),
                wait.sell.qty,
                wait.sell.limit_fallback,
            )
        };

        match fallback {
            None if elapsed > MARKET_SELL_TIMEOUT => {
                if let Err(err) = exchange.cancel(&order_id).await {
                    // Best effort: the replacement goes out regardless.
                    warn!(error = %err, %order_id, "market sell cancel failed; replacing anyway");
                } else {
                    self.stats.sells_canceled += 1;
                }

                let top = match exchange.orderbook_top().await {
                    Ok(top) => top,
                    Err(err) => {
                        warn!(error = %err, "orderbook fetch failed; retrying the fallback next tick");
                        return;
                    }
                };
                let price = round_to_tick(top.best_bid, self.config.tick_size);

                match exchange.place_limit(Side::Sell, price, qty).await {
                    Ok(new_id) => {
                        self.stats.sells_created += 1;
                        info!(%price, order_id = %new_id, "market sell replaced by a limit at the bid");
                        if let Some(wait) = self.waiting.as_mut() {
                            wait.sell.order_id = new_id;
                            wait.sell.placed_at = now;
                            wait.sell.limit_fallback = Some(price);
                        }
                    }
                    Err(err) => {
                        warn!(error = %err, "limit fallback failed; abandoning the evicted position");
                        self.abandon_wait(exchange).await;
                    }
                }
            }
            Some(limit_price) if elapsed > FALLBACK_REPRICE_AFTER => {
                let top = match exchange.orderbook_top().await {
                    Ok(top) => top,
                    Err(err) => {
                        warn!(error = %err, "orderbook fetch failed; repricing next tick");
                        return;
                    }
                };
                let drift_limit =
                    Decimal::from(FALLBACK_REPRICE_TICKS) * self.config.tick_size;
                if (top.best_bid - limit_price).abs() <= drift_limit {
                    return;
                }

                if let Err(err) = exchange.cancel(&order_id).await {
                    warn!(error = %err, %order_id, "fallback cancel failed; repricing next tick");
                    return;
                }
                self.stats.sells_canceled += 1;

                let price = round_to_tick(top.best_bid, self.config.tick_size);
                match exchange.place_limit(Side::Sell, price, qty).await {
                    Ok(new_id) => {
                        self.stats.sells_created += 1;
                        info!(old = %limit_price, new = %price, "fallback limit repriced to the bid");
                        if let Some(wait) = self.waiting.as_mut() {
                            wait.sell.order_id = new_id;
                            wait.sell.placed_at = now;
                            wait.sell.limit_fallback = Some(price);
                        }
                    }
                    Err(err) => {
                        warn!(error = %err, "fallback reprice failed; abandoning the evicted position");
                        self.abandon_wait(exchange).await;
                    }
                }
            }
            _ => {}
        }
    }

    /// Give up on the evicted position but keep the held fill.
    async fn abandon_wait(&mut self, exchange: &dyn Exchange) {
        let Some(wait) = self.waiting.take() else {
            return;
        };
        if let Some(pending) = wait.pending_tp {
            self.place_tp(exchange, pending.buy_price, pending.qty).await;
        }
    }
}
