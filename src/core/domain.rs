use ethers::types::Address;
use ethers::utils::{keccak256, to_checksum};
use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::{ExposeSecret, Secret};
use std::fmt;

use crate::core::errors::WalletError;
use crate::security::SecretString;

/// 32-byte secp256k1 private key. Zeroized on drop, never printed by `Debug`.
pub struct PrivateKey(Secret<[u8; 32]>);

impl PrivateKey {
    pub fn new(k: [u8; 32]) -> Self {
        Self(Secret::new(k))
    }

    /// Fresh key from the OS CSPRNG. Retries the (astronomically rare) draw that
    /// falls outside the curve order.
    pub fn generate() -> Self {
        loop {
            let mut candidate = [0u8; 32];
            OsRng.fill_bytes(&mut candidate);
            if secp256k1::SecretKey::from_slice(&candidate).is_ok() {
                return Self::new(candidate);
            }
        }
    }

    /// Scoped access to the underlying secret bytes. Prefer this over holding a
    /// copy so secret data does not outlive the call site.
    pub fn with_secret<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&[u8; 32]) -> R,
    {
        f(self.0.expose_secret())
    }

    /// Try to construct a PrivateKey from a byte slice (must be a valid 32-byte scalar).
    pub fn try_from_slice(slice: &[u8]) -> Result<Self, WalletError> {
        if slice.len() != 32 {
            return Err(WalletError::InvalidInput(format!(
                "Private key must be 32 bytes, got {}",
                slice.len()
            )));
        }
        secp256k1::SecretKey::from_slice(slice)
            .map_err(|e| WalletError::InvalidInput(format!("Invalid private key: {}", e)))?;
        let mut arr = [0u8; 32];
        arr.copy_from_slice(slice);
        Ok(PrivateKey::new(arr))
    }

    /// Parse a hex private key, with or without `0x`.
    pub fn from_hex(hex_key: &str) -> Result<Self, WalletError> {
        let bytes = zeroize::Zeroizing::new(crate::utils::hex_to_bytes(hex_key)?);
        Self::try_from_slice(&bytes)
    }

    /// Lowercase hex without prefix.
    pub fn to_hex(&self) -> SecretString {
        SecretString::new(self.with_secret(|b| hex::encode(b)))
    }

    /// Ethereum address: last 20 bytes of keccak256 over the uncompressed public key.
    pub fn address(&self) -> Result<Address, WalletError> {
        self.with_secret(|bytes| {
            let secp = secp256k1::Secp256k1::signing_only();
            let secret_key = secp256k1::SecretKey::from_slice(bytes)
                .map_err(|e| WalletError::SigningError(format!("Invalid private key: {}", e)))?;
            let public_key = secp256k1::PublicKey::from_secret_key(&secp, &secret_key);
            let uncompressed = public_key.serialize_uncompressed();
            let hash = keccak256(&uncompressed[1..]);
            Ok(Address::from_slice(&hash[12..]))
        })
    }

    /// EIP-55 checksummed address string.
    pub fn checksum_address(&self) -> Result<String, WalletError> {
        Ok(to_checksum(&self.address()?, None))
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey([REDACTED])")
    }
}
