/*
[INPUT]:  Bybit v5 schema definitions and serde requirements
[OUTPUT]: Typed Rust response structs with serialization support
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When the v5 schema changes or new types are added
*/

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::enums::{OrderStatus, OrderType, Side};

/// Acknowledgement returned by `POST /v5/order/create` and `/v5/order/cancel`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderAck {
    pub order_id: String,
    #[serde(default)]
    pub order_link_id: String,
}

/// One entry of `result.list` from `GET /v5/order/realtime`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetail {
    pub order_id: String,
    #[serde(default)]
    pub order_link_id: String,
    pub side: Side,
    pub order_type: OrderType,
    pub order_status: OrderStatus,
    #[serde(with = "rust_decimal::serde::str")]
    pub qty: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub cum_exec_qty: Decimal,
    #[serde(with = "rust_decimal::serde::str_option")]
    #[serde(default)]
    pub price: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderList {
    pub list: Vec<OrderDetail>,
}

/// Raw orderbook payload from `GET /v5/market/orderbook`.
///
/// Bid/ask levels arrive as `[price, size]` string pairs; the client
/// converts the top of book into an [`OrderbookTop`](super::models::OrderbookTop).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderbookRaw {
    pub s: String,
    pub b: Vec<[String; 2]>,
    pub a: Vec<[String; 2]>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletAccount {
    pub account_type: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub total_equity: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletBalanceList {
    pub list: Vec<WalletAccount>,
}
