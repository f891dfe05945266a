/*
[INPUT]:  Account-type query parameters with signature headers
[OUTPUT]: Wallet balance snapshots
[POS]:    HTTP layer - account endpoints (require auth)
[UPDATE]: When adding account endpoints
*/

use super::client::BybitClient;
use super::error::Result;
use crate::types::{WalletAccount, WalletBalanceList};

impl BybitClient {
    /// Fetch the wallet balance for one account type (e.g. "UNIFIED").
    ///
    /// `GET /v5/account/wallet-balance?accountType=...`
    pub async fn wallet_balance(&self, account_type: &str) -> Result<Option<WalletAccount>> {
        let query = format!("accountType={account_type}");
        let balances: WalletBalanceList =
            self.signed_get("/v5/account/wallet-balance", &query).await?;
        Ok(balances.list.into_iter().next())
    }
}
