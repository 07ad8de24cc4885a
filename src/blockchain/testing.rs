//! In-memory `RpcClient` used by unit tests.

use async_trait::async_trait;
use ethers::types::{
    transaction::eip2718::TypedTransaction, Address, Bytes, TransactionReceipt, H256, U256, U64,
};
use ethers::utils::keccak256;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

use super::traits::RpcClient;
use crate::core::errors::WalletError;

#[derive(Default)]
struct State {
    nonce: u64,
    chain_id: u64,
    gas_price: u64,
    estimate_failures: HashSet<Address>,
    send_error: Option<String>,
    receipts: HashMap<H256, u64>,
    sent: Vec<Bytes>,
    calls: HashMap<&'static str, usize>,
}

#[derive(Default)]
pub struct FakeRpc {
    state: Mutex<State>,
}

impl FakeRpc {
    pub fn set_nonce(&self, nonce: u64) {
        self.state.lock().nonce = nonce;
    }

    pub fn set_chain_id(&self, chain_id: u64) {
        self.state.lock().chain_id = chain_id;
    }

    pub fn fail_estimate_for(&self, address: Address) {
        self.state.lock().estimate_failures.insert(address);
    }

    pub fn fail_send(&self, message: &str) {
        self.state.lock().send_error = Some(message.to_string());
    }

    pub fn set_receipt(&self, hash: H256, status: u64) {
        self.state.lock().receipts.insert(hash, status);
    }

    pub fn sent(&self) -> Vec<Bytes> {
        self.state.lock().sent.clone()
    }

    pub fn calls(&self, method: &str) -> usize {
        self.state.lock().calls.get(method).copied().unwrap_or(0)
    }

    fn record(&self, method: &'static str) {
        *self.state.lock().calls.entry(method).or_insert(0) += 1;
    }
}

#[async_trait]
impl RpcClient for FakeRpc {
    async fn get_transaction_count(&self, _address: Address) -> Result<U256, WalletError> {
        self.record("get_transaction_count");
        Ok(U256::from(self.state.lock().nonce))
    }

    async fn get_balance(&self, _address: Address) -> Result<U256, WalletError> {
        self.record("get_balance");
        Ok(U256::zero())
    }

    async fn get_gas_price(&self) -> Result<U256, WalletError> {
        self.record("get_gas_price");
        let price = self.state.lock().gas_price;
        Ok(U256::from(if price == 0 { 1_000_000_000 } else { price }))
    }

    async fn estimate_gas(&self, tx: &TypedTransaction) -> Result<U256, WalletError> {
        self.record("estimate_gas");
        let from = tx.from().copied().unwrap_or_default();
        if self.state.lock().estimate_failures.contains(&from) {
            return Err(WalletError::NetworkError("execution reverted".to_string()));
        }
        Ok(U256::from(60_000))
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<H256, WalletError> {
        self.record("send_raw_transaction");
        let mut state = self.state.lock();
        if let Some(msg) = &state.send_error {
            return Err(WalletError::BroadcastError(msg.clone()));
        }
        let hash = H256::from(keccak256(&raw));
        state.sent.push(raw);
        Ok(hash)
    }

    async fn get_transaction_receipt(
        &self,
        hash: H256,
    ) -> Result<Option<TransactionReceipt>, WalletError> {
        self.record("get_transaction_receipt");
        Ok(self.state.lock().receipts.get(&hash).map(|status| TransactionReceipt {
            transaction_hash: hash,
            status: Some(U64::from(*status)),
            ..Default::default()
        }))
    }

    async fn chain_id(&self) -> Result<u64, WalletError> {
        self.record("chain_id");
        let id = self.state.lock().chain_id;
        Ok(if id == 0 { 10 } else { id })
    }
}
