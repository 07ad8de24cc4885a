pub mod abi;
pub mod config;
pub mod domain;
pub mod errors;
pub mod validation;

pub use domain::PrivateKey;
pub use errors::WalletError;
