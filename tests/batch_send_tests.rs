//! Sequential batch sends against a real key store.

mod util;

use ethers::types::{Address, U256};
use evm_keyvault::blockchain::batch::{send_batch, summarize, TransferPlan};
use evm_keyvault::core::abi::ContractAbi;
use evm_keyvault::core::WalletError;
use serde_json::json;
use tempfile::tempdir;
use test_log::test;
use util::{open_store, ScriptedRpc};

fn erc20() -> ContractAbi {
    let doc = json!([
        {"type": "function", "name": "transfer", "stateMutability": "nonpayable",
         "inputs": [{"name": "to", "type": "address"}, {"name": "amount", "type": "uint256"}],
         "outputs": [{"name": "", "type": "bool"}]}
    ])
    .to_string();
    ContractAbi::parse(&doc, "0x7f5c764cbc14f9669b88837ca1490cca17c31607").unwrap().0
}

#[test(tokio::test)]
async fn second_account_failing_estimate_leaves_others_sent() {
    let dir = tempdir().unwrap();
    let (mut store, _) = open_store(dir.path());
    let names = store.generate_batch("alpha", 3).unwrap();

    let rpc = ScriptedRpc::default();
    rpc.estimate_failures.lock().insert(store.address_of("alpha_2").unwrap());

    let plan = TransferPlan::Token { abi: erc20(), to: Address::repeat_byte(0x44), amount: U256::from(10) };
    let outcomes = send_batch(&rpc, &store, &names, &plan).await;

    assert_eq!(summarize(&outcomes), (2, 1));
    assert_eq!(outcomes[0].account, "alpha_1");
    assert!(outcomes[0].is_success());
    assert!(matches!(outcomes[1].result, Err(WalletError::NetworkError(_))));
    assert!(outcomes[2].is_success());
    // Estimation was attempted for all three, broadcast only for the two that passed.
    assert_eq!(rpc.count("estimate_gas"), 3);
    assert_eq!(rpc.count("send_raw_transaction"), 2);
}

#[test(tokio::test)]
async fn native_batch_is_strictly_ordered() {
    let dir = tempdir().unwrap();
    let (mut store, _) = open_store(dir.path());
    let names = store.generate_batch("beta", 2).unwrap();

    let rpc = ScriptedRpc::default();
    let plan = TransferPlan::Native {
        to: Address::repeat_byte(0x55),
        value: U256::from(1),
        gas_limit: U256::from(21_000),
        gas_price: Some(U256::from(2_000_000_000u64)),
    };
    let outcomes = send_batch(&rpc, &store, &names, &plan).await;
    assert_eq!(summarize(&outcomes), (2, 0));

    // One nonce lookup then one broadcast per account, never interleaved.
    let calls: Vec<&str> = rpc
        .calls
        .lock()
        .iter()
        .copied()
        .filter(|m| *m == "get_transaction_count" || *m == "send_raw_transaction")
        .collect();
    assert_eq!(
        calls,
        vec!["get_transaction_count", "send_raw_transaction", "get_transaction_count", "send_raw_transaction"]
    );
    assert_eq!(rpc.count("get_gas_price"), 0);
}
