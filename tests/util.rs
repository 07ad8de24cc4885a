// tests/util.rs
// Shared helpers for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use ethers::types::{
    transaction::eip2718::TypedTransaction, Address, Bytes, TransactionReceipt, H256, U256, U64,
};
use ethers::utils::keccak256;
use evm_keyvault::blockchain::RpcClient;
use evm_keyvault::core::errors::WalletError;
use evm_keyvault::crypto::{generate_token, TokenCipher};
use evm_keyvault::storage::KeyStore;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Open a fresh store under `dir` with a newly generated token.
pub fn open_store(dir: &Path) -> (KeyStore, String) {
    let token = generate_token().to_string();
    let store = KeyStore::open(dir.join("keys.json"), TokenCipher::from_token(&token).unwrap())
        .unwrap();
    (store, token)
}

/// Scriptable node stand-in. Every call is recorded by method name.
#[derive(Default)]
pub struct ScriptedRpc {
    pub nonce: Mutex<u64>,
    pub estimate_failures: Mutex<HashSet<Address>>,
    pub receipts: Mutex<HashMap<H256, u64>>,
    pub sent: Mutex<Vec<Bytes>>,
    pub calls: Mutex<Vec<&'static str>>,
}

impl ScriptedRpc {
    pub fn count(&self, method: &str) -> usize {
        self.calls.lock().iter().filter(|m| **m == method).count()
    }
}

#[async_trait]
impl RpcClient for ScriptedRpc {
    async fn get_transaction_count(&self, _address: Address) -> Result<U256, WalletError> {
        self.calls.lock().push("get_transaction_count");
        Ok(U256::from(*self.nonce.lock()))
    }

    async fn get_balance(&self, _address: Address) -> Result<U256, WalletError> {
        self.calls.lock().push("get_balance");
        Ok(U256::exp10(18))
    }

    async fn get_gas_price(&self) -> Result<U256, WalletError> {
        self.calls.lock().push("get_gas_price");
        Ok(U256::from(1_000_000_000u64))
    }

    async fn estimate_gas(&self, tx: &TypedTransaction) -> Result<U256, WalletError> {
        self.calls.lock().push("estimate_gas");
        let from = tx.from().copied().unwrap_or_default();
        if self.estimate_failures.lock().contains(&from) {
            return Err(WalletError::NetworkError("gas required exceeds allowance".to_string()));
        }
        Ok(U256::from(52_000))
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<H256, WalletError> {
        self.calls.lock().push("send_raw_transaction");
        let hash = H256::from(keccak256(&raw));
        self.sent.lock().push(raw);
        Ok(hash)
    }

    async fn get_transaction_receipt(
        &self,
        hash: H256,
    ) -> Result<Option<TransactionReceipt>, WalletError> {
        self.calls.lock().push("get_transaction_receipt");
        Ok(self.receipts.lock().get(&hash).map(|status| TransactionReceipt {
            transaction_hash: hash,
            status: Some(U64::from(*status)),
            ..Default::default()
        }))
    }

    async fn chain_id(&self) -> Result<u64, WalletError> {
        self.calls.lock().push("chain_id");
        Ok(10)
    }
}
