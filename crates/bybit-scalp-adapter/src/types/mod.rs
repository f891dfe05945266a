/*
[INPUT]:  Type submodules
[OUTPUT]: Public type surface of the adapter
[POS]:    Data layer - module wiring
[UPDATE]: When type modules change
*/

pub mod enums;
pub mod models;
pub mod requests;
pub mod responses;

pub use enums::{Category, OrderStatus, OrderType, Side, TimeInForce};
pub use models::OrderbookTop;
pub use requests::{CancelOrderRequest, CreateOrderRequest};
pub use responses::{OrderAck, OrderDetail, OrderList, OrderbookRaw, WalletAccount, WalletBalanceList};
