/*
[INPUT]:  Symbol identifiers and query parameters
[OUTPUT]: Market data (best bid / best ask)
[POS]:    HTTP layer - public market data endpoints (no auth required)
[UPDATE]: When adding public endpoints or changing response parsing
*/

use std::str::FromStr;

use rust_decimal::Decimal;

use super::client::BybitClient;
use super::error::{BybitError, Result};
use super::trade::category_str;
use crate::types::{Category, OrderbookRaw, OrderbookTop};

impl BybitClient {
    /// Fetch the top of the public order book.
    ///
    /// `GET /v5/market/orderbook?category=...&symbol=...&limit=1`
    pub async fn orderbook_top(&self, category: Category, symbol: &str) -> Result<OrderbookTop> {
        let query = format!("category={}&symbol={symbol}&limit=1", category_str(category));
        let raw: OrderbookRaw = self.public_get("/v5/market/orderbook", &query).await?;

        let best_bid = top_level_price(&raw.b, "bid")?;
        let best_ask = top_level_price(&raw.a, "ask")?;

        OrderbookTop::new(best_bid, best_ask).map_err(BybitError::InvalidResponse)
    }
}

fn top_level_price(levels: &[[String; 2]], side: &str) -> Result<Decimal> {
    let level = levels
        .first()
        .ok_or_else(|| BybitError::InvalidResponse(format!("empty {side} side of book")))?;
    Decimal::from_str(&level[0])
        .map_err(|_| BybitError::InvalidResponse(format!("bad {side} price: {}", level[0])))
}
