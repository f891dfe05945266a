/*
[INPUT]:  Order intents from the engine, BybitClient for execution
[OUTPUT]: Exchange port trait plus the live HTTP-backed implementation
[POS]:    Port layer - the five operations the engine consumes
[UPDATE]: When the engine needs new exchange operations
*/

use std::future::Future;
use std::pin::Pin;

use rust_decimal::Decimal;
use uuid::Uuid;

use bybit_scalp_adapter::{
    BybitClient, Category, CreateOrderRequest, OrderStatus, OrderType, OrderbookTop,
    Result as AdapterResult, Side, TimeInForce,
};

pub type ExchangeFuture<'a, T> = Pin<Box<dyn Future<Output = AdapterResult<T>> + Send + 'a>>;

/// Order state as the engine sees it. Everything that is neither working nor
/// filled collapses into `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderState {
    New,
    PartiallyFilled,
    Filled,
    Other,
}

impl From<OrderStatus> for OrderState {
    fn from(status: OrderStatus) -> Self {
        match status {
            OrderStatus::New | OrderStatus::Untriggered => OrderState::New,
            OrderStatus::PartiallyFilled => OrderState::PartiallyFilled,
            OrderStatus::Filled => OrderState::Filled,
            _ => OrderState::Other,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrderSnapshot {
    pub state: OrderState,
    pub cum_exec_qty: Decimal,
}

/// The five operations the engine drives the exchange with.
///
/// `cancel` must be idempotent from the caller's view: canceling an order the
/// exchange no longer knows succeeds. `status` returns `None` for unknown
/// ids, which callers treat as "not filled yet".
pub trait Exchange: Send + Sync {
    fn place_limit(&self, side: Side, price: Decimal, qty: Decimal) -> ExchangeFuture<'_, String>;

    fn place_market(&self, side: Side, qty: Decimal) -> ExchangeFuture<'_, String>;

    fn cancel<'a>(&'a self, order_id: &'a str) -> ExchangeFuture<'a, ()>;

    fn status<'a>(&'a self, order_id: &'a str) -> ExchangeFuture<'a, Option<OrderSnapshot>>;

    fn orderbook_top(&self) -> ExchangeFuture<'_, OrderbookTop>;
}

/// HTTP-backed exchange port for one symbol.
#[derive(Debug)]
pub struct LiveExchange {
    client: BybitClient,
    category: Category,
    symbol: String,
}

impl LiveExchange {
    pub fn new(client: BybitClient, category: Category, symbol: impl Into<String>) -> Self {
        Self {
            client,
            category,
            symbol: symbol.into(),
        }
    }

    pub fn client(&self) -> &BybitClient {
        &self.client
    }

    fn order_request(
        &self,
        side: Side,
        order_type: OrderType,
        price: Option<Decimal>,
        qty: Decimal,
    ) -> CreateOrderRequest {
        CreateOrderRequest {
            category: self.category,
            symbol: self.symbol.clone(),
            side,
            order_type,
            qty,
            price,
            time_in_force: match order_type {
                OrderType::Limit => Some(TimeInForce::Gtc),
                OrderType::Market => Some(TimeInForce::Ioc),
            },
            order_link_id: Some(format!("scalp-{}", Uuid::new_v4())),
        }
    }
}

impl Exchange for LiveExchange {
    fn place_limit(&self, side: Side, price: Decimal, qty: Decimal) -> ExchangeFuture<'_, String> {
        let req = self.order_request(side, OrderType::Limit, Some(price), qty);
        Box::pin(async move {
            let ack = self.client.create_order(&req).await?;
            Ok(ack.order_id)
        })
    }

    fn place_market(&self, side: Side, qty: Decimal) -> ExchangeFuture<'_, String> {
        let req = self.order_request(side, OrderType::Market, None, qty);
        Box::pin(async move {
            let ack = self.client.create_order(&req).await?;
            Ok(ack.order_id)
        })
    }

    fn cancel<'a>(&'a self, order_id: &'a str) -> ExchangeFuture<'a, ()> {
        Box::pin(async move {
            match self
                .client
                .cancel_order(self.category, &self.symbol, order_id)
                .await
            {
                Ok(_) => Ok(()),
                // Already filled or never accepted: settled, not an error.
                Err(err) if err.is_unknown_order() => Ok(()),
                Err(err) => Err(err),
            }
        })
    }

    fn status<'a>(&'a self, order_id: &'a str) -> ExchangeFuture<'a, Option<OrderSnapshot>> {
        Box::pin(async move {
            let detail = self
                .client
                .order_status(self.category, &self.symbol, order_id)
                .await?;
            Ok(detail.map(|detail| OrderSnapshot {
                state: detail.order_status.into(),
                cum_exec_qty: detail.cum_exec_qty,
            }))
        })
    }

    fn orderbook_top(&self) -> ExchangeFuture<'_, OrderbookTop> {
        Box::pin(async move { self.client.orderbook_top(self.category, &self.symbol).await })
    }
}
