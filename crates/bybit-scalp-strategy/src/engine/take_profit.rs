/*
[INPUT]:  Buy fills reported by the ladder, exchange order status
[OUTPUT]: Paired take-profit orders, capacity enforcement via eviction
[POS]:    Strategy layer - TP creation, overflow policy, reconciliation
[UPDATE]: When the TP capacity or eviction policy changes
*/

use rust_decimal::Decimal;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use bybit_scalp_adapter::Side;

use crate::book::TpOrder;
use crate::exchange::{Exchange, OrderState};
use crate::price::tp_price;

use super::waiting::{PendingMarketSell, PendingNewTp, WaitState};
use super::ScalpEngine;

impl ScalpEngine {
    /// Turn a buy fill into a take-profit. At the cap, the highest (most
    /// stuck) TP is evicted and market-sold, and the new TP is held until
    /// that sell resolves or capacity frees.
    pub(super) async fn create_tp(
        &mut self,
        exchange: &dyn Exchange,
        buy_price: Decimal,
        qty: Decimal,
    ) {
        if (self.book.tp_count() as u32) < self.config.max_tp_orders {
            self.place_tp(exchange, buy_price, qty).await;
            return;
        }

        let Some(evicted) = self.book.highest_tp().cloned() else {
            return;
        };
        info!(sell = %evicted.sell_price, "take-profit cap reached; evicting the highest");

        match exchange.cancel(&evicted.order_id).await {
            Ok(()) => self.stats.sells_canceled += 1,
            Err(err) => {
                warn!(
                    error = %err,
                    order_id = %evicted.order_id,
                    "eviction cancel failed; keeping the take-profit set as-is"
                );
                return;
            }
        }
        self.book.remove_tp(&evicted.order_id);
        self.stats.remove_position(&evicted.order_id);

        match exchange.place_market(Side::Sell, evicted.qty).await {
            Ok(order_id) => {
                self.stats.sells_created += 1;
                info!(%order_id, qty = %evicted.qty, "market sell placed for evicted position");
                self.waiting = Some(WaitState {
                    sell: PendingMarketSell {
                        order_id,
                        qty: evicted.qty,
                        buy_price: evicted.buy_price,
                        placed_at: Instant::now(),
                        limit_fallback: None,
                    },
                    pending_tp: Some(PendingNewTp { buy_price, qty }),
                });
            }
            Err(err) => {
                // The eviction already freed a slot.
                warn!(
                    error = %err,
                    "market sell for evicted position failed; placing the new take-profit directly"
                );
                self.place_tp(exchange, buy_price, qty).await;
            }
        }
    }

    pub(super) async fn place_tp(
        &mut self,
        exchange: &dyn Exchange,
        buy_price: Decimal,
        qty: Decimal,
    ) -> bool {
        let sell_price = tp_price(buy_price, self.config.tp_ticks, self.config.tick_size);
        match exchange.place_limit(Side::Sell, sell_price, qty).await {
            Ok(order_id) => {
                self.stats.sells_created += 1;
                info!(sell = %sell_price, buy = %buy_price, %order_id, "take-profit placed");
                self.stats.add_position(order_id.clone(), buy_price, qty);
                self.book.push_tp(TpOrder {
                    order_id,
                    sell_price,
                    qty,
                    buy_price,
                    placed_at: Instant::now(),
                });
                true
            }
            Err(err) => {
                warn!(error = %err, sell = %sell_price, "take-profit placement failed");
                false
            }
        }
    }

    /// Settle filled take-profits, then opportunistically materialize the
    /// held TP when capacity frees up during a wait.
    pub(super) async fn reconcile_tps(&mut self, exchange: &dyn Exchange) {
        for order_id in self.book.tp_ids() {
            match exchange.status(&order_id).await {
                Ok(Some(snapshot)) => match snapshot.state {
                    OrderState::Filled => {
                        if let Some(tp) = self.book.remove_tp(&order_id) {
                            let pnl = (tp.sell_price - tp.buy_price) * tp.qty;
                            self.stats.add_realized(pnl);
                            self.stats.sells_filled += 1;
                            self.stats.remove_position(&order_id);
                            info!(sell = %tp.sell_price, buy = %tp.buy_price, %pnl, "take-profit filled");
                        }
                    }
                    OrderState::PartiallyFilled => {
                        // TPs are never bumped by drift; nothing to do.
                        debug!(%order_id, cum = %snapshot.cum_exec_qty, "take-profit partially filled");
                    }
                    OrderState::New | OrderState::Other => {}
                },
                Ok(None) => debug!(%order_id, "take-profit not yet visible on exchange"),
                Err(err) => warn!(error = %err, %order_id, "take-profit status query failed"),
            }
        }

        // One slot stays reserved for the in-flight eviction sell; the held
        // fill only materializes early when some other TP frees capacity.
        let slot_beyond_reserved =
            (self.book.tp_count() as u32) + 1 < self.config.max_tp_orders;
        let pending = match &mut self.waiting {
            Some(wait) if slot_beyond_reserved => wait.pending_tp.take(),
            _ => None,
        };
        if let Some(pending) = pending {
            info!("capacity freed; placing the held take-profit");
            if !self.place_tp(exchange, pending.buy_price, pending.qty).await
                && let Some(wait) = &mut self.waiting
            {
                wait.pending_tp = Some(pending);
            }
        }
    }
}
