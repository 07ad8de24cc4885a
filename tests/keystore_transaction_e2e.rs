//! Store an account, decrypt it, and push it through build -> sign -> send.

mod util;

use ethers::types::{Address, Transaction, U256, U64};
use evm_keyvault::blockchain::{TransactionBuilder, TxParams, TxStatus};
use evm_keyvault::core::validation::to_base_units;
use evm_keyvault::crypto::TokenCipher;
use evm_keyvault::storage::{AccountStore, KeyStore};
use pretty_assertions::assert_eq;
use std::str::FromStr;
use tempfile::tempdir;
use util::{open_store, ScriptedRpc};

#[tokio::test]
async fn demo_account_signs_recoverable_transaction() {
    let dir = tempdir().unwrap();
    let (mut store, _token) = open_store(dir.path());
    store.insert_key("demo", &evm_keyvault::core::PrivateKey::generate()).unwrap();

    let key = store.get_decrypted_key("demo").unwrap();
    let from = key.address().unwrap();
    let to = Address::from_str("0xfeedfeedfeedfeedfeedfeedfeedfeedfeedcafe").unwrap();

    let rpc = ScriptedRpc::default();
    let builder = TransactionBuilder::new(&rpc);
    let params = TxParams::transfer(from, to, U256::from(1000), U256::from(21000), U256::from(1_000_000_000u64))
        .with_chain_id(10)
        .with_nonce(U256::zero());
    let unsigned = builder.build(params).await.unwrap();
    let signed = builder.sign(&unsigned, &key).unwrap();
    drop(key);

    let decoded: Transaction = ethers::utils::rlp::decode(&signed.raw).unwrap();
    assert_eq!(decoded.nonce, U256::zero());
    assert_eq!(decoded.to, Some(to));
    assert_eq!(decoded.value, U256::from(1000));
    assert_eq!(decoded.gas, U256::from(21000));
    assert_eq!(decoded.gas_price, Some(U256::from(1_000_000_000u64)));
    assert!(decoded.v == U64::from(55) || decoded.v == U64::from(56));
    assert_eq!(decoded.recover_from().unwrap(), from);

    let expected_hash = signed.hash;
    let hash = builder.send(signed).await.unwrap();
    assert_eq!(hash, expected_hash);
    assert_eq!(rpc.sent.lock().len(), 1);
    assert_eq!(rpc.count("get_transaction_count"), 0);

    assert_eq!(builder.status(hash).await.unwrap(), TxStatus::Pending);
    rpc.receipts.lock().insert(hash, 1);
    assert!(matches!(builder.status(hash).await.unwrap(), TxStatus::Confirmed(_)));
}

#[tokio::test]
async fn decimal_amount_is_converted_before_building() {
    let value = to_base_units("1.5", 18).unwrap();
    assert_eq!(value, U256::from_dec_str("1500000000000000000").unwrap());

    let dir = tempdir().unwrap();
    let (mut store, _) = open_store(dir.path());
    store
        .add_key("a", "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318")
        .unwrap();
    let key = store.get_decrypted_key("a").unwrap();
    let from = key.address().unwrap();

    let rpc = ScriptedRpc::default();
    *rpc.nonce.lock() = 9;
    let builder = TransactionBuilder::new(&rpc);
    let unsigned = builder
        .build(TxParams::transfer(from, Address::repeat_byte(1), value, U256::from(21000), U256::one()).with_chain_id(10))
        .await
        .unwrap();
    assert_eq!(unsigned.nonce(), Some(U256::from(9)));
    assert_eq!(unsigned.tx.value(), Some(&value));
}

#[test]
fn reopening_with_another_token_reports_authentication_not_missing() {
    let dir = tempdir().unwrap();
    let (mut store, _) = open_store(dir.path());
    store.generate_batch("alpha", 2).unwrap();
    store.add_key("beta_1", "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318").unwrap();
    let path = store.path().to_path_buf();
    drop(store);

    let other = TokenCipher::from_token(&evm_keyvault::crypto::generate_token()).unwrap();
    let reopened = KeyStore::open(&path, other).unwrap();
    assert_eq!(reopened.list_keys(), vec!["alpha_1", "alpha_2", "beta_1"]);
    let batches: Vec<String> = reopened.list_batches().into_iter().collect();
    assert_eq!(batches, vec!["alpha", "beta"]);
    assert!(matches!(
        reopened.get_decrypted_key("alpha_1"),
        Err(evm_keyvault::core::WalletError::AuthenticationError(_))
    ));
    assert!(matches!(
        reopened.get_decrypted_key("gamma"),
        Err(evm_keyvault::core::WalletError::NotFoundError(_))
    ));
}

#[test]
fn restore_from_seed_phrase_matches_known_address() {
    let dir = tempdir().unwrap();
    let (mut store, _) = open_store(dir.path());
    let phrase = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
    store.import_mnemonic("restored", phrase).unwrap();
    let address = store.address_of("restored").unwrap();
    assert_eq!(
        format!("{:?}", address),
        "0x9858effd232b4033e47d90003d41ec34ecaeda94"
    );
}
