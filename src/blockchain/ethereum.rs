use async_trait::async_trait;
use ethers::{
    prelude::JsonRpcClient,
    providers::{Http, Middleware, Provider},
    types::{
        transaction::eip2718::TypedTransaction, Address, BlockId, BlockNumber, Bytes,
        TransactionReceipt, H256, U256,
    },
};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

use super::traits::RpcClient;
use crate::core::errors::WalletError;

/// Default deadline for a single RPC call.
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(30);

/// `RpcClient` backed by an ethers `Provider`.
#[derive(Clone)]
pub struct EthereumRpc<P: JsonRpcClient + Clone = Http> {
    provider: Provider<P>,
    timeout: Duration,
}

impl EthereumRpc<Http> {
    /// Connect lazily to `rpc_url`; no request is made until the first call.
    pub fn new(rpc_url: &str, timeout: Duration) -> Result<Self, WalletError> {
        let rpc_url_clean = rpc_url.trim();
        let parsed_url = reqwest::Url::parse(rpc_url_clean).map_err(|e| {
            WalletError::ConfigError(format!(
                "Invalid RPC URL '{}': {}. Please check the config file or ENDPOINT.",
                rpc_url_clean, e
            ))
        })?;

        // Transport-level timeout as a backstop to the per-call deadline; honour proxy env vars.
        let mut builder = reqwest::Client::builder().timeout(timeout);
        if let Ok(proxy) = std::env::var("HTTPS_PROXY").or_else(|_| std::env::var("HTTP_PROXY")) {
            if let Ok(p) = reqwest::Proxy::all(proxy) {
                builder = builder.proxy(p);
            }
        }
        let client = builder
            .build()
            .map_err(|e| WalletError::NetworkError(format!("Failed to build HTTP client: {}", e)))?;

        info!(url = %parsed_url, "Using RPC endpoint");
        let provider = Provider::new(Http::new_with_client(parsed_url, client));
        Ok(Self { provider, timeout })
    }
}

impl<P: JsonRpcClient + Clone> EthereumRpc<P>
where
    P: Send + Sync,
{
    /// Wrap an existing provider, e.g. a `MockProvider` in tests.
    pub fn new_with_provider(provider: Provider<P>, timeout: Duration) -> EthereumRpc<P> {
        EthereumRpc { provider, timeout }
    }

    async fn call<T, E, F>(&self, method: &str, fut: F) -> Result<T, WalletError>
    where
        F: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        debug!(method = method, "RPC call");
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(WalletError::NetworkError(format!("{} failed: {}", method, e))),
            Err(_) => Err(WalletError::TimeoutError(format!(
                "{} did not complete within {}s",
                method,
                self.timeout.as_secs()
            ))),
        }
    }
}

#[async_trait]
impl<P> RpcClient for EthereumRpc<P>
where
    P: JsonRpcClient + Clone + 'static + Send + Sync,
{
    async fn get_transaction_count(&self, address: Address) -> Result<U256, WalletError> {
        let pending = Some(BlockId::Number(BlockNumber::Pending));
        self.call("eth_getTransactionCount", self.provider.get_transaction_count(address, pending))
            .await
    }

    async fn get_balance(&self, address: Address) -> Result<U256, WalletError> {
        self.call("eth_getBalance", self.provider.get_balance(address, None)).await
    }

    async fn get_gas_price(&self) -> Result<U256, WalletError> {
        self.call("eth_gasPrice", self.provider.get_gas_price()).await
    }

    async fn estimate_gas(&self, tx: &TypedTransaction) -> Result<U256, WalletError> {
        self.call("eth_estimateGas", self.provider.estimate_gas(tx, None)).await
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<H256, WalletError> {
        debug!(bytes = raw.len(), "eth_sendRawTransaction");
        match tokio::time::timeout(self.timeout, self.provider.send_raw_transaction(raw)).await {
            Ok(Ok(pending)) => Ok(pending.tx_hash()),
            // Node messages (nonce too low, insufficient funds, underpriced) pass through untouched.
            Ok(Err(e)) => Err(WalletError::BroadcastError(e.to_string())),
            Err(_) => Err(WalletError::TimeoutError(format!(
                "eth_sendRawTransaction did not complete within {}s",
                self.timeout.as_secs()
            ))),
        }
    }

    async fn get_transaction_receipt(
        &self,
        hash: H256,
    ) -> Result<Option<TransactionReceipt>, WalletError> {
        self.call("eth_getTransactionReceipt", self.provider.get_transaction_receipt(hash)).await
    }

    async fn chain_id(&self) -> Result<u64, WalletError> {
        let id = self.call("eth_chainId", self.provider.get_chainid()).await?;
        Ok(id.as_u64())
    }
}
