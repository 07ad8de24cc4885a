//! Encrypted local key vault for EVM accounts.
//!
//! The library holds everything the `evm-keyvault` binary dispatches to: the
//! token cipher and seed phrase deriver in [`crypto`], the file-backed
//! [`storage::KeyStore`], and the transaction pipeline in [`blockchain`].

pub mod blockchain;
pub mod cli;
pub mod core;
pub mod crypto;
pub mod security;
pub mod storage;
pub mod utils;
