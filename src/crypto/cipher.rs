//! Token-based authenticated encryption for key material at rest.
//!
//! The encryption token is 32 random bytes rendered as URL-safe base64. Each
//! ciphertext is `nonce(12) || AES-256-GCM(ciphertext || tag)`; the text form
//! stored on disk is the URL-safe base64 of those bytes.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::core::errors::WalletError;
use crate::security::SecretVec;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// Produces a fresh encryption token from the OS CSPRNG. The caller persists it.
pub fn generate_token() -> Zeroizing<String> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    OsRng.fill_bytes(&mut key[..]);
    Zeroizing::new(URL_SAFE.encode(&key[..]))
}

/// Authenticated cipher bound to one encryption token.
///
/// Stateless apart from the key; safe to share by reference.
pub struct TokenCipher {
    key: Zeroizing<[u8; KEY_LEN]>,
}

impl TokenCipher {
    /// Build a cipher from a token; fails with `CryptoError` if it is not
    /// base64 of exactly 32 bytes.
    pub fn from_token(token: &str) -> Result<Self, WalletError> {
        let decoded = Zeroizing::new(
            URL_SAFE
                .decode(token.trim().as_bytes())
                .map_err(|_| WalletError::CryptoError("Encryption token is not valid base64".to_string()))?,
        );
        if decoded.len() != KEY_LEN {
            return Err(WalletError::CryptoError(format!(
                "Encryption token must decode to {} bytes, got {}",
                KEY_LEN,
                decoded.len()
            )));
        }
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        key.copy_from_slice(&decoded);
        Ok(Self { key })
    }

    fn aead(&self) -> Result<Aes256Gcm, WalletError> {
        Aes256Gcm::new_from_slice(&self.key[..])
            .map_err(|_| WalletError::CryptoError("Invalid key length".to_string()))
    }

    /// Encrypt with a fresh random nonce. Output: nonce || ciphertext || tag.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, WalletError> {
        let cipher = self.aead()?;
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from(nonce_bytes);

        let ciphertext = cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| WalletError::CryptoError("Encryption failed".to_string()))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Decrypt and authenticate. Any failure to open the box, including
    /// truncated input, is an `AuthenticationError`.
    pub fn decrypt(&self, data: &[u8]) -> Result<SecretVec, WalletError> {
        if data.len() < NONCE_LEN {
            return Err(WalletError::AuthenticationError(
                "invalid token or tampered data: ciphertext too short".to_string(),
            ));
        }
        let cipher = self.aead()?;
        let mut nonce_bytes = [0u8; NONCE_LEN];
        nonce_bytes.copy_from_slice(&data[..NONCE_LEN]);
        let nonce = Nonce::from(nonce_bytes);

        let plaintext = cipher.decrypt(&nonce, &data[NONCE_LEN..]).map_err(|_| {
            WalletError::AuthenticationError("invalid token or tampered data".to_string())
        })?;
        Ok(Zeroizing::new(plaintext))
    }

    /// Text form used by the key store file.
    pub fn encrypt_to_string(&self, plaintext: &[u8]) -> Result<String, WalletError> {
        Ok(URL_SAFE.encode(self.encrypt(plaintext)?))
    }

    pub fn decrypt_str(&self, encoded: &str) -> Result<SecretVec, WalletError> {
        let raw = URL_SAFE.decode(encoded.trim().as_bytes()).map_err(|_| {
            WalletError::AuthenticationError(
                "invalid token or tampered data: ciphertext is not base64".to_string(),
            )
        })?;
        self.decrypt(&raw)
    }
}
