//! `EthereumRpc` over ethers' `MockProvider`, driven through the builder.

use ethers::providers::{MockProvider, MockResponse, Provider};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, TransactionRequest, H256, U256};
use evm_keyvault::blockchain::ethereum::DEFAULT_RPC_TIMEOUT;
use evm_keyvault::blockchain::{EthereumRpc, RpcClient, TransactionBuilder, TxParams, TxStatus};
use evm_keyvault::core::PrivateKey;
use serde_json::json;

fn create_mock_client() -> (EthereumRpc<MockProvider>, MockProvider) {
    let mock = MockProvider::new();
    let handle = mock.clone();
    (EthereumRpc::new_with_provider(Provider::new(mock), DEFAULT_RPC_TIMEOUT), handle)
}

#[tokio::test]
async fn build_fetches_nonce_then_send_returns_hash() {
    let (client, mock) = create_mock_client();
    let key = PrivateKey::from_hex("0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318").unwrap();
    let from = key.address().unwrap();

    let builder = TransactionBuilder::new(&client);

    mock.push_response(MockResponse::Value(json!(U256::from(42))));
    let unsigned = builder
        .build(TxParams::transfer(from, Address::repeat_byte(0x10), U256::from(5), U256::from(21000), U256::from(7)).with_chain_id(1))
        .await
        .unwrap();
    assert_eq!(unsigned.nonce(), Some(U256::from(42)));

    let signed = builder.sign(&unsigned, &key).unwrap();
    let expected = signed.hash;
    mock.push_response(MockResponse::Value(json!(expected)));
    assert_eq!(builder.send(signed).await.unwrap(), expected);
}

#[tokio::test]
async fn status_reads_receipt_status_field() {
    let (client, mock) = create_mock_client();
    let hash = H256::repeat_byte(0x01);
    let receipt = json!({
        "transactionHash": hash,
        "transactionIndex": "0x0",
        "blockHash": H256::repeat_byte(0x02),
        "blockNumber": "0x10",
        "from": Address::repeat_byte(0x03),
        "to": Address::repeat_byte(0x04),
        "cumulativeGasUsed": "0x5208",
        "gasUsed": "0x5208",
        "contractAddress": null,
        "logs": [],
        "logsBloom": format!("0x{}", "00".repeat(256)),
        "status": "0x0",
        "effectiveGasPrice": "0x1"
    });
    mock.push_response(MockResponse::Value(receipt));
    let status = TransactionBuilder::new(&client).status(hash).await.unwrap();
    assert!(matches!(status, TxStatus::Failed(_)));
}

#[tokio::test]
async fn gas_price_and_estimate_pass_through() {
    let (client, mock) = create_mock_client();
    // LIFO: last pushed answers first
    mock.push_response(MockResponse::Value(json!(U256::from(21000))));
    mock.push_response(MockResponse::Value(json!(U256::from(20_000_000_000u64))));
    assert_eq!(client.get_gas_price().await.unwrap(), U256::from(20_000_000_000u64));
    let tx: TypedTransaction = TransactionRequest::new().to(Address::zero()).into();
    assert_eq!(client.estimate_gas(&tx).await.unwrap(), U256::from(21000));
}
