//! Build, sign, send and track legacy (EIP-155) transactions.
//!
//! Each stage is a separate call; nothing advances on its own. `SignedTx` is
//! consumed by `send`, so a signed payload cannot be broadcast twice without
//! building and signing again.

use ethers::{
    signers::{LocalWallet, Signer},
    types::{
        transaction::eip2718::TypedTransaction, Address, Bytes, TransactionReceipt,
        TransactionRequest, H256, U256, U64,
    },
    utils::keccak256,
};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::traits::RpcClient;
use crate::core::domain::PrivateKey;
use crate::core::errors::WalletError;

/// Inputs to `build`. All amounts are integers in the smallest unit.
#[derive(Debug, Clone)]
pub struct TxParams {
    pub from: Address,
    /// Looked up from the node when `None`.
    pub nonce: Option<U256>,
    pub to: Address,
    pub value: U256,
    pub gas_limit: U256,
    pub gas_price: U256,
    pub chain_id: Option<u64>,
    pub data: Option<Bytes>,
}

impl TxParams {
    pub fn transfer(from: Address, to: Address, value: U256, gas_limit: U256, gas_price: U256) -> Self {
        Self { from, nonce: None, to, value, gas_limit, gas_price, chain_id: None, data: None }
    }

    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    pub fn with_nonce(mut self, nonce: U256) -> Self {
        self.nonce = Some(nonce);
        self
    }
}

/// A fully populated transaction awaiting a signature.
#[derive(Debug, Clone)]
pub struct UnsignedTx {
    pub from: Address,
    pub tx: TypedTransaction,
}

impl UnsignedTx {
    pub fn nonce(&self) -> Option<U256> {
        self.tx.nonce().copied()
    }

    pub fn chain_id(&self) -> Option<u64> {
        self.tx.chain_id().map(|id| id.as_u64())
    }
}

/// Signed RLP payload. Deliberately not `Clone`.
#[derive(Debug)]
pub struct SignedTx {
    pub from: Address,
    pub raw: Bytes,
    pub hash: H256,
}

/// Outcome of a receipt lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum TxStatus {
    Pending,
    Confirmed(Box<TransactionReceipt>),
    Failed(Box<TransactionReceipt>),
}

impl TxStatus {
    pub fn from_receipt(receipt: Option<TransactionReceipt>) -> Self {
        match receipt {
            None => TxStatus::Pending,
            Some(r) if r.status == Some(U64::from(1)) => TxStatus::Confirmed(Box::new(r)),
            Some(r) => TxStatus::Failed(Box::new(r)),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, TxStatus::Pending)
    }
}

/// Transaction pipeline over an injected RPC client.
pub struct TransactionBuilder<'a, R: RpcClient + ?Sized> {
    rpc: &'a R,
}

impl<'a, R: RpcClient + ?Sized> TransactionBuilder<'a, R> {
    pub fn new(rpc: &'a R) -> Self {
        Self { rpc }
    }

    /// Assemble an unsigned legacy transaction. The nonce lookup is the only
    /// network call, made only when `params.nonce` is `None`.
    pub async fn build(&self, params: TxParams) -> Result<UnsignedTx, WalletError> {
        if params.gas_limit.is_zero() {
            return Err(WalletError::InvalidInput("Gas limit must be greater than zero".to_string()));
        }
        let nonce = match params.nonce {
            Some(n) => n,
            None => {
                let n = self.rpc.get_transaction_count(params.from).await?;
                debug!(from = ?params.from, nonce = %n, "Fetched nonce");
                n
            }
        };

        let mut request = TransactionRequest::new()
            .from(params.from)
            .to(params.to)
            .value(params.value)
            .gas(params.gas_limit)
            .gas_price(params.gas_price)
            .nonce(nonce);
        if let Some(chain_id) = params.chain_id {
            request = request.chain_id(chain_id);
        }
        if let Some(data) = params.data {
            request = request.data(data);
        }
        Ok(UnsignedTx { from: params.from, tx: TypedTransaction::Legacy(request) })
    }

    /// Sign without touching the network.
    ///
    /// A chain id is required so every signature carries EIP-155 replay
    /// protection, and the key must match the `from` address.
    pub fn sign(&self, unsigned: &UnsignedTx, key: &PrivateKey) -> Result<SignedTx, WalletError> {
        sign_transaction(unsigned, key)
    }

    /// Broadcast the payload. Consumes it.
    pub async fn send(&self, signed: SignedTx) -> Result<H256, WalletError> {
        let hash = self.rpc.send_raw_transaction(signed.raw).await?;
        if hash != signed.hash {
            warn!(expected = ?signed.hash, returned = ?hash, "Node returned a different transaction hash");
        }
        info!(from = ?signed.from, tx_hash = ?hash, "Transaction sent");
        Ok(hash)
    }

    /// Single receipt lookup.
    pub async fn status(&self, hash: H256) -> Result<TxStatus, WalletError> {
        let receipt = self.rpc.get_transaction_receipt(hash).await?;
        Ok(TxStatus::from_receipt(receipt))
    }

    /// Poll `status` every `poll` until included or `timeout` elapses.
    pub async fn wait_for_receipt(
        &self,
        hash: H256,
        poll: Duration,
        timeout: Duration,
    ) -> Result<TxStatus, WalletError> {
        let deadline = Instant::now() + timeout;
        loop {
            let status = self.status(hash).await?;
            if !status.is_pending() {
                return Ok(status);
            }
            if Instant::now() + poll > deadline {
                return Err(WalletError::TimeoutError(format!(
                    "Transaction {:?} not included after {}s",
                    hash,
                    timeout.as_secs()
                )));
            }
            tokio::time::sleep(poll).await;
        }
    }
}

/// Pure signing step shared by the builder and batch sender.
pub fn sign_transaction(unsigned: &UnsignedTx, key: &PrivateKey) -> Result<SignedTx, WalletError> {
    let chain_id = unsigned
        .chain_id()
        .ok_or_else(|| WalletError::SigningError("Chain id is required for signing".to_string()))?;
    let wallet = key
        .with_secret(|bytes| LocalWallet::from_bytes(bytes))
        .map_err(|e| WalletError::SigningError(format!("Invalid private key: {}", e)))?
        .with_chain_id(chain_id);
    if wallet.address() != unsigned.from {
        return Err(WalletError::SigningError(format!(
            "Key does not belong to sender {:?}",
            unsigned.from
        )));
    }

    let signature = wallet
        .sign_transaction_sync(&unsigned.tx)
        .map_err(|e| WalletError::SigningError(e.to_string()))?;
    let raw = unsigned.tx.rlp_signed(&signature);
    let hash = H256::from(keccak256(&raw));
    Ok(SignedTx { from: unsigned.from, raw, hash })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::testing::FakeRpc;
    use crate::core::validation::parse_integer_amount;
    use ethers::types::Transaction;
    use std::str::FromStr;

    const KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    fn to() -> Address {
        Address::from_str("0xfeedfeedfeedfeedfeedfeedfeedfeedfeedcafe").unwrap()
    }

    fn params(from: Address) -> TxParams {
        TxParams::transfer(from, to(), U256::from(1000), U256::from(21000), U256::from(1_000_000_000u64))
            .with_chain_id(10)
    }

    #[tokio::test]
    async fn missing_nonce_is_fetched() {
        let rpc = FakeRpc::default();
        rpc.set_nonce(7);
        let key = PrivateKey::from_hex(KEY).unwrap();
        let unsigned = TransactionBuilder::new(&rpc).build(params(key.address().unwrap())).await.unwrap();
        assert_eq!(unsigned.nonce(), Some(U256::from(7)));
        assert_eq!(rpc.calls("get_transaction_count"), 1);
    }

    #[tokio::test]
    async fn explicit_nonce_skips_network() {
        let rpc = FakeRpc::default();
        let key = PrivateKey::from_hex(KEY).unwrap();
        let p = params(key.address().unwrap()).with_nonce(U256::zero());
        TransactionBuilder::new(&rpc).build(p).await.unwrap();
        assert_eq!(rpc.calls("get_transaction_count"), 0);
    }

    #[tokio::test]
    async fn signed_payload_decodes_to_same_fields() {
        let rpc = FakeRpc::default();
        let key = PrivateKey::from_hex(KEY).unwrap();
        let from = key.address().unwrap();
        let builder = TransactionBuilder::new(&rpc);
        let unsigned = builder.build(params(from).with_nonce(U256::zero())).await.unwrap();
        let signed = builder.sign(&unsigned, &key).unwrap();

        let decoded: Transaction = ethers::utils::rlp::decode(&signed.raw).unwrap();
        assert_eq!(decoded.nonce, U256::zero());
        assert_eq!(decoded.to, Some(to()));
        assert_eq!(decoded.value, U256::from(1000));
        assert_eq!(decoded.gas, U256::from(21000));
        assert_eq!(decoded.gas_price, Some(U256::from(1_000_000_000u64)));
        // EIP-155: v = chain_id * 2 + 35 + recovery bit
        assert!(decoded.v == U64::from(55) || decoded.v == U64::from(56));
        assert_eq!(decoded.recover_from().unwrap(), from);
        assert_eq!(H256::from(keccak256(&signed.raw)), signed.hash);
    }

    #[tokio::test]
    async fn signing_is_deterministic() {
        let rpc = FakeRpc::default();
        let key = PrivateKey::from_hex(KEY).unwrap();
        let builder = TransactionBuilder::new(&rpc);
        let unsigned = builder
            .build(params(key.address().unwrap()).with_nonce(U256::from(3)))
            .await
            .unwrap();
        let a = builder.sign(&unsigned, &key).unwrap();
        let b = builder.sign(&unsigned, &key).unwrap();
        assert_eq!(a.raw, b.raw);
    }

    #[tokio::test]
    async fn wrong_key_or_missing_chain_is_signing_error() {
        let rpc = FakeRpc::default();
        let key = PrivateKey::from_hex(KEY).unwrap();
        let other = PrivateKey::generate();
        let builder = TransactionBuilder::new(&rpc);

        let unsigned = builder
            .build(params(key.address().unwrap()).with_nonce(U256::zero()))
            .await
            .unwrap();
        assert!(matches!(builder.sign(&unsigned, &other), Err(WalletError::SigningError(_))));

        let mut p = params(key.address().unwrap()).with_nonce(U256::zero());
        p.chain_id = None;
        let unsigned = builder.build(p).await.unwrap();
        assert!(matches!(builder.sign(&unsigned, &key), Err(WalletError::SigningError(_))));
    }

    #[tokio::test]
    async fn send_passes_broadcast_error_through() {
        let rpc = FakeRpc::default();
        rpc.fail_send("insufficient funds for gas * price + value");
        let key = PrivateKey::from_hex(KEY).unwrap();
        let builder = TransactionBuilder::new(&rpc);
        let unsigned = builder
            .build(params(key.address().unwrap()).with_nonce(U256::zero()))
            .await
            .unwrap();
        let signed = builder.sign(&unsigned, &key).unwrap();
        match builder.send(signed).await {
            Err(WalletError::BroadcastError(msg)) => assert!(msg.contains("insufficient funds")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn status_maps_receipt() {
        let rpc = FakeRpc::default();
        let builder = TransactionBuilder::new(&rpc);
        let hash = H256::repeat_byte(0xab);
        assert!(builder.status(hash).await.unwrap().is_pending());

        rpc.set_receipt(hash, 1);
        assert!(matches!(builder.status(hash).await.unwrap(), TxStatus::Confirmed(_)));
        rpc.set_receipt(hash, 0);
        assert!(matches!(builder.status(hash).await.unwrap(), TxStatus::Failed(_)));
    }

    #[tokio::test]
    async fn wait_for_receipt_times_out() {
        let rpc = FakeRpc::default();
        let builder = TransactionBuilder::new(&rpc);
        let err = builder
            .wait_for_receipt(H256::zero(), Duration::from_millis(5), Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::TimeoutError(_)));
    }

    #[test]
    fn decimal_value_never_reaches_builder() {
        assert!(parse_integer_amount("1.5").is_err());
    }
}
