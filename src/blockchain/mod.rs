pub mod batch;
pub mod contract;
pub mod ethereum;
pub mod network;
pub mod traits;
pub mod transaction;

#[cfg(test)]
pub(crate) mod testing;

pub use ethereum::EthereumRpc;
pub use traits::RpcClient;
pub use transaction::{SignedTx, TransactionBuilder, TxParams, TxStatus, UnsignedTx};
