/*
[INPUT]:  Validated market data derived from raw API payloads
[OUTPUT]: Domain types shared with strategy crates
[POS]:    Data layer - checked value types
[UPDATE]: When validation rules or shared market-data shapes change
*/

use rust_decimal::Decimal;

/// Best bid and best ask of the public book.
///
/// Construction enforces the book sanity rules: both sides positive and
/// `best_ask >= best_bid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderbookTop {
    pub best_bid: Decimal,
    pub best_ask: Decimal,
}

impl OrderbookTop {
    pub fn new(best_bid: Decimal, best_ask: Decimal) -> Result<Self, String> {
        if best_bid <= Decimal::ZERO || best_ask <= Decimal::ZERO {
            return Err(format!(
                "non-positive book top: bid={best_bid} ask={best_ask}"
            ));
        }
        if best_ask < best_bid {
            return Err(format!("crossed book top: bid={best_bid} ask={best_ask}"));
        }
        Ok(Self { best_bid, best_ask })
    }

    pub fn spread(&self) -> Decimal {
        self.best_ask - self.best_bid
    }
}
