use async_trait::async_trait;
use ethers::types::{
    transaction::eip2718::TypedTransaction, Address, Bytes, TransactionReceipt, H256, U256,
};

use crate::core::errors::WalletError;

/// JSON-RPC capability the transaction pipeline depends on.
///
/// Every method is a single network round trip. Implementations must bound
/// each call with a timeout and report node errors verbatim.
#[async_trait]
pub trait RpcClient: Send + Sync {
    /// Pending-inclusive transaction count, used as the next nonce.
    async fn get_transaction_count(&self, address: Address) -> Result<U256, WalletError>;

    async fn get_balance(&self, address: Address) -> Result<U256, WalletError>;

    async fn get_gas_price(&self) -> Result<U256, WalletError>;

    async fn estimate_gas(&self, tx: &TypedTransaction) -> Result<U256, WalletError>;

    /// Broadcast a signed payload. Node rejections surface as `BroadcastError`.
    async fn send_raw_transaction(&self, raw: Bytes) -> Result<H256, WalletError>;

    /// `None` while the transaction is not yet included.
    async fn get_transaction_receipt(
        &self,
        hash: H256,
    ) -> Result<Option<TransactionReceipt>, WalletError>;

    async fn chain_id(&self) -> Result<u64, WalletError>;
}
