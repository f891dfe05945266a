/*
[INPUT]:  Order requests with signature headers
[OUTPUT]: Order acknowledgements and realtime order state
[POS]:    HTTP layer - trading endpoints (require auth)
[UPDATE]: When adding trading endpoints or changing order flow
*/

use super::client::BybitClient;
use super::error::Result;
use crate::types::{
    CancelOrderRequest, Category, CreateOrderRequest, OrderAck, OrderDetail, OrderList,
};

impl BybitClient {
    /// Create an order.
    ///
    /// `POST /v5/order/create`
    pub async fn create_order(&self, req: &CreateOrderRequest) -> Result<OrderAck> {
        self.signed_post("/v5/order/create", req).await
    }

    /// Cancel an order by exchange id.
    ///
    /// `POST /v5/order/cancel`
    pub async fn cancel_order(
        &self,
        category: Category,
        symbol: &str,
        order_id: &str,
    ) -> Result<OrderAck> {
        let req = CancelOrderRequest {
            category,
            symbol: symbol.to_string(),
            order_id: order_id.to_string(),
        };
        self.signed_post("/v5/order/cancel", &req).await
    }

    /// Query the realtime state of one order.
    ///
    /// `GET /v5/order/realtime?category=...&symbol=...&orderId=...`
    ///
    /// Returns `None` when the exchange has no record of the id yet; a just
    /// placed order may be invisible for a tick.
    pub async fn order_status(
        &self,
        category: Category,
        symbol: &str,
        order_id: &str,
    ) -> Result<Option<OrderDetail>> {
        let query = format!(
            "category={}&symbol={symbol}&orderId={order_id}",
            category_str(category)
        );
        let orders: OrderList = self.signed_get("/v5/order/realtime", &query).await?;
        Ok(orders.list.into_iter().next())
    }
}

pub(crate) fn category_str(category: Category) -> &'static str {
    match category {
        Category::Linear => "linear",
        Category::Inverse => "inverse",
        Category::Spot => "spot",
    }
}
