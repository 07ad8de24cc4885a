//! Contract ABI lookup and token transfer construction.

use ethers::types::{
    transaction::eip2718::TypedTransaction, Address, Bytes, TransactionRequest, U256,
};
use ethers::utils::to_checksum;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};

use super::traits::RpcClient;
use super::transaction::{TransactionBuilder, TxParams, UnsignedTx};
use crate::core::abi::{abi_pack, abi_word_address, abi_word_uint256, ContractAbi};
use crate::core::errors::WalletError;

/// Local ABI descriptors laid out as `{root}/{chain_id}/{address}.json`.
#[derive(Debug, Clone)]
pub struct AbiRegistry {
    root: PathBuf,
}

impl AbiRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Candidate file names, as written, lowercased and checksummed.
    fn candidates(&self, address: &Address, as_written: &str, chain_id: u64) -> Vec<PathBuf> {
        let dir = self.root.join(chain_id.to_string());
        let mut names = vec![
            as_written.to_string(),
            format!("{:?}", address),
            to_checksum(address, None),
        ];
        names.dedup();
        names.into_iter().map(|n| dir.join(format!("{}.json", n))).collect()
    }

    /// Load and validate the ABI for `contract` on `chain_id`.
    ///
    /// A missing file is `NotFoundError`; malformed entries come back as
    /// warnings next to the usable ABI.
    pub fn load_abi(
        &self,
        contract: &str,
        chain_id: u64,
    ) -> Result<(ContractAbi, Vec<WalletError>), WalletError> {
        let address = crate::core::validation::validate_ethereum_address(contract)?;
        let path = self
            .candidates(&address, contract, chain_id)
            .into_iter()
            .find(|p| p.is_file())
            .ok_or_else(|| {
                WalletError::NotFoundError(format!(
                    "No ABI registered for {} on chain {} (looked in {})",
                    contract,
                    chain_id,
                    self.root.join(chain_id.to_string()).display()
                ))
            })?;
        debug!(path = %path.display(), "Loading ABI");
        let json = fs::read_to_string(&path)?;
        ContractAbi::parse(&json, contract)
    }
}

/// Build an unsigned ERC-20 `transfer(to, amount)` call from `from`.
///
/// Gas is estimated by the node; an estimation failure is returned to the
/// caller rather than replaced with a default.
pub async fn build_transfer<R: RpcClient + ?Sized>(
    rpc: &R,
    abi: &ContractAbi,
    contract: Address,
    to: Address,
    amount: U256,
    from: Address,
) -> Result<UnsignedTx, WalletError> {
    let function = abi.get_function("transfer")?;
    if function.input_types() != ["address", "uint256"] {
        return Err(WalletError::AbiValidationError(format!(
            "Unexpected transfer signature: {}",
            function.signature()
        )));
    }
    let data = Bytes::from(abi_pack(
        function.selector(),
        &[abi_word_address(&to), abi_word_uint256(amount)],
    ));

    let nonce = rpc.get_transaction_count(from).await?;
    let gas_price = rpc.get_gas_price().await?;
    let chain_id = rpc.chain_id().await?;

    let probe = TypedTransaction::Legacy(
        TransactionRequest::new()
            .from(from)
            .to(contract)
            .value(U256::zero())
            .data(data.clone())
            .gas_price(gas_price)
            .nonce(nonce)
            .chain_id(chain_id),
    );
    let gas_limit = rpc.estimate_gas(&probe).await?;
    info!(contract = ?contract, to = ?to, gas = %gas_limit, "Token transfer prepared");

    let params = TxParams {
        from,
        nonce: Some(nonce),
        to: contract,
        value: U256::zero(),
        gas_limit,
        gas_price,
        chain_id: Some(chain_id),
        data: Some(data),
    };
    TransactionBuilder::new(rpc).build(params).await
}
