/*
[INPUT]:  Book-top snapshots and exchange order status
[OUTPUT]: A maintained BUY ladder below the best bid
[POS]:    Strategy layer - BUY order reconciliation, TTL, reprice, top-up
[UPDATE]: When ladder maintenance rules change
*/

use rust_decimal::Decimal;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use bybit_scalp_adapter::{OrderbookTop, Side};

use crate::book::BuyOrder;
use crate::exchange::{Exchange, OrderState};
use crate::price::{layer_price, round_to_tick, tick_distance};

use super::ScalpEngine;

impl ScalpEngine {
    /// Walk every open BUY: settle fills, then enforce the TTL and the
    /// drift-reprice policy on whatever is still resting.
    pub(super) async fn reconcile_buys(&mut self, exchange: &dyn Exchange, top: OrderbookTop) {
        let now = Instant::now();

        for order_id in self.book.buy_ids() {
            match exchange.status(&order_id).await {
                Ok(Some(snapshot)) => match snapshot.state {
                    OrderState::Filled => {
                        if let Some(buy) = self.book.remove_buy(&order_id) {
                            self.stats.buys_filled += 1;
                            self.last_buy_fill = Some(now);
                            let qty = if snapshot.cum_exec_qty > Decimal::ZERO {
                                snapshot.cum_exec_qty
                            } else {
                                buy.qty
                            };
                            info!(price = %buy.price, %qty, "buy filled");
                            self.create_tp(exchange, buy.price, qty).await;
                        }
                        continue;
                    }
                    OrderState::PartiallyFilled => {
                        if let Some(buy) = self.book.buy_mut(&order_id) {
                            buy.filled_qty = snapshot.cum_exec_qty;
                        }
                    }
                    OrderState::New | OrderState::Other => {}
                },
                Ok(None) => {
                    // A just-placed order may be invisible for a tick; treat
                    // as not filled and keep it.
                    debug!(%order_id, "buy not yet visible on exchange");
                }
                Err(err) => {
                    warn!(error = %err, %order_id, "buy status query failed");
                    continue;
                }
            }

            let Some(buy) = self.book.buy(&order_id) else {
                continue;
            };

            let age = now.saturating_duration_since(buy.placed_at);
            if age >= self.config.buy_ttl() {
                let (price, filled) = (buy.price, buy.filled_qty);
                match exchange.cancel(&order_id).await {
                    Ok(()) => {
                        self.stats.buys_canceled += 1;
                        info!(%price, age_ms = age.as_millis() as u64, "buy expired; canceled");
                        self.book.remove_buy(&order_id);
                        if filled > Decimal::ZERO {
                            self.last_buy_fill = Some(now);
                            self.create_tp(exchange, price, filled).await;
                        }
                    }
                    Err(err) => warn!(error = %err, %order_id, "expired buy cancel failed"),
                }
                continue;
            }

            let drift = tick_distance(buy.price, top.best_bid, self.config.tick_size);
            if drift >= Decimal::from(self.config.reprice_ticks) {
                let (price, filled) = (buy.price, buy.filled_qty);
                // Partial inventory exits through a TP before the order goes.
                if filled > Decimal::ZERO {
                    self.create_tp(exchange, price, filled).await;
                }
                match exchange.cancel(&order_id).await {
                    Ok(()) => {
                        self.stats.buys_canceled += 1;
                        info!(%price, best_bid = %top.best_bid, "buy drifted; canceled for reprice");
                    }
                    Err(err) => warn!(error = %err, %order_id, "drifted buy cancel failed"),
                }
                self.book.remove_buy(&order_id);
            }
        }
    }

    /// Fill every vacant layer with a fresh BUY, closest layers first.
    pub(super) async fn top_up_ladder(&mut self, exchange: &dyn Exchange, top: OrderbookTop) {
        let cooldown = self.config.wait_after_buy_fill();
        if !cooldown.is_zero()
            && let Some(last_fill) = self.last_buy_fill
        {
            let since = Instant::now().saturating_duration_since(last_fill);
            if since < cooldown {
                debug!(
                    since_ms = since.as_millis() as u64,
                    "post-fill cooldown; ladder top-up skipped"
                );
                return;
            }
        }

        for layer in 0..self.config.max_buy_orders {
            if self.book.buy_count() as u32 >= self.config.max_buy_orders {
                break;
            }
            if self.book.has_layer(layer) {
                continue;
            }

            let mut price = layer_price(
                top.best_bid,
                layer,
                self.config.offset_ticks,
                self.config.layer_step_ticks,
                self.config.tick_size,
            );

            // After drift the grid may land on an already-open order. Bump
            // one step toward the bid; two collisions in a row means there is
            // no room for this layer.
            let mut displaced: Option<String> = None;
            if let Some(colliding) = self.book.buy_at_price(price, self.config.tick_size) {
                let bumped = round_to_tick(
                    price + Decimal::from(self.config.layer_step_ticks) * self.config.tick_size,
                    self.config.tick_size,
                );
                if self.book.buy_at_price(bumped, self.config.tick_size).is_some() {
                    debug!(layer, %price, "layer collision with no room to reshuffle; skipped");
                    continue;
                }
                displaced = Some(colliding.order_id.clone());
                price = bumped;
            }

            match exchange.place_limit(Side::Buy, price, self.config.order_qty).await {
                Ok(order_id) => {
                    self.stats.buys_created += 1;

                    let mut assigned_layer = layer;
                    if let Some(displaced_id) = displaced
                        && let Some(other) = self.book.buy_mut(&displaced_id)
                    {
                        // Indices follow price order: the bumped order sits
                        // closer to the bid, so it takes the lower index and
                        // pushes the colliding order outward.
                        let closer = other.layer.min(layer);
                        let outer = other.layer.max(layer);
                        other.layer = outer;
                        assigned_layer = closer;
                    }

                    debug!(%price, layer = assigned_layer, %order_id, "buy placed");
                    self.book.push_buy(BuyOrder {
                        order_id,
                        price,
                        qty: self.config.order_qty,
                        filled_qty: Decimal::ZERO,
                        layer: assigned_layer,
                        placed_at: Instant::now(),
                    });
                }
                Err(err) => warn!(error = %err, %price, layer, "buy placement failed"),
            }
        }
    }

    /// While a market sell is pending the ladder stands down completely.
    pub(super) async fn cancel_remaining_buys(&mut self, exchange: &dyn Exchange) {
        if self.book.buy_count() == 0 {
            return;
        }
        info!(
            count = self.book.buy_count(),
            "waiting on market sell; canceling open buys"
        );
        for order_id in self.book.buy_ids() {
            match exchange.cancel(&order_id).await {
                Ok(()) => {
                    self.stats.buys_canceled += 1;
                    self.book.remove_buy(&order_id);
                }
                Err(err) => warn!(error = %err, %order_id, "buy cancel failed while waiting"),
            }
        }
    }
}
