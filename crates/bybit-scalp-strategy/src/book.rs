/*
[INPUT]:  Order placements, exchange reconciliation results, evictions
[OUTPUT]: In-memory mirror of this strategy's own open orders
[POS]:    State layer - book of record for the BUY ladder and TP set
[UPDATE]: When per-order metadata or selection rules change
*/

use rust_decimal::Decimal;
use tokio::time::Instant;

use crate::price::same_price;

/// One open BUY order of the ladder.
#[derive(Debug, Clone)]
pub struct BuyOrder {
    pub order_id: String,
    pub price: Decimal,
    pub qty: Decimal,
    /// Cumulative executed quantity reported by the exchange.
    pub filled_qty: Decimal,
    /// Ladder index; 0 is closest to the best bid.
    pub layer: u32,
    pub placed_at: Instant,
}

/// One open take-profit SELL order paired with the buy it exits.
#[derive(Debug, Clone)]
pub struct TpOrder {
    pub order_id: String,
    pub sell_price: Decimal,
    pub qty: Decimal,
    pub buy_price: Decimal,
    pub placed_at: Instant,
}

/// The strategy's own open orders. A cache, not the truth: the exchange is
/// re-queried every tick and this mirror follows.
#[derive(Debug, Default)]
pub struct StrategyBook {
    buys: Vec<BuyOrder>,
    tps: Vec<TpOrder>,
}

impl StrategyBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.buys.clear();
        self.tps.clear();
    }

    pub fn buys(&self) -> &[BuyOrder] {
        &self.buys
    }

    pub fn tps(&self) -> &[TpOrder] {
        &self.tps
    }

    pub fn buy_count(&self) -> usize {
        self.buys.len()
    }

    pub fn tp_count(&self) -> usize {
        self.tps.len()
    }

    pub fn buy_ids(&self) -> Vec<String> {
        self.buys.iter().map(|order| order.order_id.clone()).collect()
    }

    pub fn tp_ids(&self) -> Vec<String> {
        self.tps.iter().map(|order| order.order_id.clone()).collect()
    }

    pub fn push_buy(&mut self, order: BuyOrder) {
        self.buys.push(order);
    }

    pub fn push_tp(&mut self, order: TpOrder) {
        self.tps.push(order);
    }

    pub fn buy(&self, order_id: &str) -> Option<&BuyOrder> {
        self.buys.iter().find(|order| order.order_id == order_id)
    }

    pub fn buy_mut(&mut self, order_id: &str) -> Option<&mut BuyOrder> {
        self.buys.iter_mut().find(|order| order.order_id == order_id)
    }

    pub fn remove_buy(&mut self, order_id: &str) -> Option<BuyOrder> {
        let index = self.buys.iter().position(|order| order.order_id == order_id)?;
        Some(self.buys.remove(index))
    }

    pub fn remove_tp(&mut self, order_id: &str) -> Option<TpOrder> {
        let index = self.tps.iter().position(|order| order.order_id == order_id)?;
        Some(self.tps.remove(index))
    }

    pub fn drain_tps(&mut self) -> Vec<TpOrder> {
        std::mem::take(&mut self.tps)
    }

    pub fn has_layer(&self, layer: u32) -> bool {
        self.buys.iter().any(|order| order.layer == layer)
    }

    /// Open BUY at the same grid price, if any. "Same" means within half a
    /// tick, matching the ladder's price-distinctness invariant.
    pub fn buy_at_price(&self, price: Decimal, tick: Decimal) -> Option<&BuyOrder> {
        self.buys
            .iter()
            .find(|order| same_price(order.price, price, tick))
    }

    /// The eviction candidate: highest sell price, ties broken by age
    /// (oldest first).
    pub fn highest_tp(&self) -> Option<&TpOrder> {
        self.tps.iter().fold(None, |best: Option<&TpOrder>, tp| match best {
            None => Some(tp),
            Some(current)
                if tp.sell_price > current.sell_price
                    || (tp.sell_price == current.sell_price
                        && tp.placed_at < current.placed_at) =>
            {
                Some(tp)
            }
            Some(current) => Some(current),
        })
    }
}
