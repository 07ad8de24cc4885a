//! Key material cryptography: at-rest encryption and seed phrase derivation.

pub mod cipher;
pub mod mnemonic;

pub use cipher::{generate_token, TokenCipher};
pub use mnemonic::derive_key;
