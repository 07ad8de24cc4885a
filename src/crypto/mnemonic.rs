//! Seed phrase to private key derivation.
//!
//! BIP-39 seed (empty passphrase) followed by a BIP-32 walk down the standard
//! Ethereum path m/44'/60'/0'/0/0, the same key wallets such as MetaMask show
//! as the first account.

use bip39::Mnemonic;
use hmac::{Hmac, Mac};
use secp256k1::{Scalar, Secp256k1, SecretKey};
use sha2::Sha512;
use zeroize::Zeroizing;

use crate::core::domain::PrivateKey;
use crate::core::errors::WalletError;

type HmacSha512 = Hmac<Sha512>;

const HARDENED: u32 = 0x8000_0000;

/// m/44'/60'/0'/0/0
pub const ETHEREUM_PATH: [u32; 5] = [
    HARDENED | 44, // purpose
    HARDENED | 60, // coin type: Ethereum
    HARDENED,      // account 0
    0,             // external chain
    0,             // first address
];

/// Word counts accepted for a seed phrase.
pub const ALLOWED_WORD_COUNTS: [usize; 2] = [12, 24];

/// Derive the first Ethereum account key from a space-delimited seed phrase.
///
/// Word count is checked before anything else so a 13-word phrase is an
/// `InvalidPassphrase`, never a derivation attempt.
pub fn derive_key(phrase: &str) -> Result<PrivateKey, WalletError> {
    derive_key_at(phrase, &ETHEREUM_PATH)
}

pub fn derive_key_at(phrase: &str, path: &[u32]) -> Result<PrivateKey, WalletError> {
    let words = phrase.split_whitespace().count();
    if !ALLOWED_WORD_COUNTS.contains(&words) {
        return Err(WalletError::InvalidPassphrase(format!(
            "Passphrase should contain 12 or 24 words, got {}",
            words
        )));
    }

    let normalized = Zeroizing::new(phrase.split_whitespace().collect::<Vec<_>>().join(" "));
    let mnemonic = Mnemonic::parse(normalized.as_str())
        .map_err(|e| WalletError::DerivationError(format!("Invalid seed phrase: {}", e)))?;
    let seed = Zeroizing::new(mnemonic.to_seed(""));

    let mut node = ExtendedKey::master(&seed[..])?;
    for &index in path {
        node = node.derive_child(index)?;
    }
    PrivateKey::try_from_slice(&node.key[..])
        .map_err(|e| WalletError::DerivationError(e.to_string()))
}

/// BIP-32 extended private key (key + chain code).
struct ExtendedKey {
    key: Zeroizing<[u8; 32]>,
    chain_code: Zeroizing<[u8; 32]>,
}

impl ExtendedKey {
    fn from_hmac_output(out: &[u8]) -> Self {
        let mut key = Zeroizing::new([0u8; 32]);
        let mut chain_code = Zeroizing::new([0u8; 32]);
        key.copy_from_slice(&out[..32]);
        chain_code.copy_from_slice(&out[32..]);
        Self { key, chain_code }
    }

    fn master(seed: &[u8]) -> Result<Self, WalletError> {
        let mut mac = HmacSha512::new_from_slice(b"Bitcoin seed")
            .map_err(|e| WalletError::DerivationError(format!("HMAC initialization failed: {}", e)))?;
        mac.update(seed);
        let mut out = Zeroizing::new([0u8; 64]);
        out.copy_from_slice(&mac.finalize().into_bytes());
        let master = Self::from_hmac_output(&out[..]);
        SecretKey::from_slice(&master.key[..])
            .map_err(|e| WalletError::DerivationError(format!("Invalid master key: {}", e)))?;
        Ok(master)
    }

    /// CKDpriv: child = parse256(IL) + k_par (mod n).
    fn derive_child(&self, index: u32) -> Result<Self, WalletError> {
        let parent = SecretKey::from_slice(&self.key[..])
            .map_err(|e| WalletError::DerivationError(format!("Invalid parent key: {}", e)))?;

        let mut mac = HmacSha512::new_from_slice(&self.chain_code[..])
            .map_err(|e| WalletError::DerivationError(format!("HMAC initialization failed: {}", e)))?;
        if index & HARDENED != 0 {
            mac.update(&[0u8]);
            mac.update(&self.key[..]);
        } else {
            let secp = Secp256k1::signing_only();
            let public = secp256k1::PublicKey::from_secret_key(&secp, &parent);
            mac.update(&public.serialize());
        }
        mac.update(&index.to_be_bytes());
        let mut out = Zeroizing::new([0u8; 64]);
        out.copy_from_slice(&mac.finalize().into_bytes());

        let mut il = Zeroizing::new([0u8; 32]);
        il.copy_from_slice(&out[..32]);
        let tweak = Scalar::from_be_bytes(*il)
            .map_err(|_| WalletError::DerivationError(format!("Invalid child at index {}", index)))?;
        let child = parent
            .add_tweak(&tweak)
            .map_err(|_| WalletError::DerivationError(format!("Invalid child at index {}", index)))?;

        let mut next = Self::from_hmac_output(&out[..]);
        next.key.copy_from_slice(&child.secret_bytes());
        Ok(next)
    }
}
