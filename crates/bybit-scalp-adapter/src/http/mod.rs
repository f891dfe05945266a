/*
[INPUT]:  HTTP submodules
[OUTPUT]: Public HTTP surface of the adapter
[POS]:    HTTP layer - module wiring
[UPDATE]: When HTTP modules change
*/

pub mod account;
pub mod client;
pub mod error;
pub mod market;
pub mod sign;
pub mod trade;

pub use client::{BybitClient, ClientConfig, Credentials};
pub use error::{BybitError, Result};
pub use sign::ApiSigner;
