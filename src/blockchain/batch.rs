//! Sequential multi-account sends.
//!
//! Each account gets a complete build, sign and send cycle before the next one
//! starts. A failure is recorded for that account only and the batch moves on.

use ethers::types::{Address, H256, U256};
use tracing::{info, warn};

use super::contract::build_transfer;
use super::traits::RpcClient;
use super::transaction::{sign_transaction, TransactionBuilder, TxParams};
use crate::core::abi::ContractAbi;
use crate::core::errors::WalletError;
use crate::storage::{AccountStore, KeyStore};

/// What every account in the batch sends.
#[derive(Debug, Clone)]
pub enum TransferPlan {
    /// Native currency transfer with a fixed gas limit. `gas_price` of
    /// `None` asks the node.
    Native { to: Address, value: U256, gas_limit: U256, gas_price: Option<U256> },
    /// ERC-20 `transfer` through the contract's ABI.
    Token { abi: ContractAbi, to: Address, amount: U256 },
}

/// Result for one account.
#[derive(Debug)]
pub struct BatchOutcome {
    pub account: String,
    pub result: Result<H256, WalletError>,
}

impl BatchOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Source of decrypted keys for a batch.
pub trait KeySource {
    fn key_for(&self, name: &str) -> Result<crate::core::domain::PrivateKey, WalletError>;
}

impl KeySource for KeyStore {
    fn key_for(&self, name: &str) -> Result<crate::core::domain::PrivateKey, WalletError> {
        self.get_decrypted_key(name)
    }
}

/// Send `plan` from every account in `accounts`, in order.
///
/// Always returns one outcome per account. Each key is decrypted once,
/// used to build and sign, and dropped before the broadcast.
pub async fn send_batch<R, K>(
    rpc: &R,
    keys: &K,
    accounts: &[String],
    plan: &TransferPlan,
) -> Vec<BatchOutcome>
where
    R: RpcClient + ?Sized,
    K: KeySource + ?Sized,
{
    let mut outcomes = Vec::with_capacity(accounts.len());
    for account in accounts {
        let result = send_one(rpc, keys, account, plan).await;
        match &result {
            Ok(hash) => info!(account = %account, tx_hash = ?hash, "Batch item sent"),
            Err(e) => warn!(account = %account, error = %e, "Batch item failed"),
        }
        outcomes.push(BatchOutcome { account: account.clone(), result });
    }
    outcomes
}

async fn send_one<R, K>(
    rpc: &R,
    keys: &K,
    account: &str,
    plan: &TransferPlan,
) -> Result<H256, WalletError>
where
    R: RpcClient + ?Sized,
    K: KeySource + ?Sized,
{
    let builder = TransactionBuilder::new(rpc);

    // One decryption per account; the key is gone before the broadcast.
    let signed = {
        let key = keys.key_for(account)?;
        let from = key.address()?;
        let unsigned = match plan {
            TransferPlan::Native { to, value, gas_limit, gas_price } => {
                let gas_price = match gas_price {
                    Some(p) => *p,
                    None => rpc.get_gas_price().await?,
                };
                let chain_id = rpc.chain_id().await?;
                let params = TxParams::transfer(from, *to, *value, *gas_limit, gas_price)
                    .with_chain_id(chain_id);
                builder.build(params).await?
            }
            TransferPlan::Token { abi, to, amount } => {
                build_transfer(rpc, abi, abi.address, *to, *amount, from).await?
            }
        };
        sign_transaction(&unsigned, &key)?
    };
    builder.send(signed).await
}

/// Successes and failures of a finished batch.
pub fn summarize(outcomes: &[BatchOutcome]) -> (usize, usize) {
    let ok = outcomes.iter().filter(|o| o.is_success()).count();
    (ok, outcomes.len() - ok)
}
