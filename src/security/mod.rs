//! Secret buffers and the deliberately unsafe plaintext export path.

pub mod export;
pub mod secret;

pub use secret::{SecretString, SecretVec};
