/*
[INPUT]:  Order lifecycle events (creates, fills, cancels) and realized P/L
[OUTPUT]: Session counters and average-cost view of pending positions
[POS]:    Accounting layer - per-session statistics
[UPDATE]: When adding counters or position reporting
*/

use rust_decimal::Decimal;

/// Position awaiting its take-profit, shadowing one open TP order.
#[derive(Debug, Clone)]
pub struct PendingPosition {
    pub order_id: String,
    pub buy_price: Decimal,
    pub qty: Decimal,
}

/// Session statistics. Counters only grow; `realized_pnl` moves with fills
/// and `pending_positions` mirrors the open TP set.
#[derive(Debug, Clone, Default)]
pub struct Stats {
    pub buys_created: u64,
    pub buys_filled: u64,
    pub buys_canceled: u64,
    pub sells_created: u64,
    pub sells_filled: u64,
    pub sells_canceled: u64,
    pub realized_pnl: Decimal,
    pending_positions: Vec<PendingPosition>,
}

impl Stats {
    pub fn reset(&mut self) {
        *self = Stats::default();
    }

    pub fn add_realized(&mut self, pnl: Decimal) {
        self.realized_pnl += pnl;
    }

    pub fn positions(&self) -> &[PendingPosition] {
        &self.pending_positions
    }

    pub fn add_position(&mut self, order_id: String, buy_price: Decimal, qty: Decimal) {
        self.pending_positions.push(PendingPosition {
            order_id,
            buy_price,
            qty,
        });
    }

    pub fn remove_position(&mut self, order_id: &str) {
        self.pending_positions
            .retain(|position| position.order_id != order_id);
    }

    pub fn drain_positions(&mut self) {
        self.pending_positions.clear();
    }

    /// Quantity-weighted average entry of pending positions; zero when flat.
    pub fn average_buy_price(&self) -> Decimal {
        let total_qty: Decimal = self.pending_positions.iter().map(|p| p.qty).sum();
        if total_qty.is_zero() {
            return Decimal::ZERO;
        }
        let notional: Decimal = self
            .pending_positions
            .iter()
            .map(|p| p.buy_price * p.qty)
            .sum();
        notional / total_qty
    }
}
