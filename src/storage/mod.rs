//! Encrypted, file-backed account store.
//!
//! The whole mapping `name -> ciphertext` is loaded at startup and rewritten
//! after every mutation. The store assumes a single process and a single user:
//! there is no file locking, so two processes writing the same file will lose
//! each other's updates.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::core::domain::PrivateKey;
use crate::core::errors::WalletError;
use crate::core::validation::validate_account_name;
use crate::crypto::cipher::TokenCipher;
use crate::crypto::mnemonic;

/// Current on-disk layout version.
pub const STORE_VERSION: u32 = 1;

/// On-disk layout of the key store file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StoreFile {
    pub version: u32,
    pub accounts: BTreeMap<String, String>,
}

impl StoreFile {
    /// Parse either the versioned layout or the legacy flat `{name: ciphertext}`
    /// map (treated as version 0). Empty files are an empty store.
    pub fn parse(contents: &str) -> Result<Self, WalletError> {
        if contents.trim().is_empty() {
            return Ok(Self { version: STORE_VERSION, accounts: BTreeMap::new() });
        }
        let value: serde_json::Value = serde_json::from_str(contents)?;
        if value.get("version").is_some() && value.get("accounts").is_some() {
            let file: StoreFile = serde_json::from_value(value)?;
            if file.version > STORE_VERSION {
                return Err(WalletError::StorageError(format!(
                    "Key store version {} is newer than supported version {}",
                    file.version, STORE_VERSION
                )));
            }
            return Ok(file);
        }
        let accounts: BTreeMap<String, String> = serde_json::from_value(value).map_err(|e| {
            WalletError::SerializationError(format!("Unrecognised key store layout: {}", e))
        })?;
        Ok(Self { version: 0, accounts })
    }
}

/// Capability interface of an account backend.
///
/// Only the file-backed `KeyStore` implements it today.
pub trait AccountStore {
    /// Encrypt and store a hex private key under `name`, overwriting silently.
    fn add_key(&mut self, name: &str, private_key_hex: &str) -> Result<(), WalletError>;

    /// Decrypt the key stored under `name`.
    fn get_decrypted_key(&self, name: &str) -> Result<PrivateKey, WalletError>;

    /// Remove `name`; `NotFoundError` if it does not exist.
    fn delete_key(&mut self, name: &str) -> Result<(), WalletError>;

    /// Account names, sorted.
    fn list_keys(&self) -> Vec<String>;

    fn contains(&self, name: &str) -> bool;
}

/// Account store persisted to a single JSON file.
pub struct KeyStore {
    path: PathBuf,
    cipher: TokenCipher,
    accounts: BTreeMap<String, String>,
    loaded_version: u32,
}

impl KeyStore {
    /// Open (or create) the store file at `path`.
    pub fn open(path: impl Into<PathBuf>, cipher: TokenCipher) -> Result<Self, WalletError> {
        let path = path.into();
        let (accounts, loaded_version) = if path.exists() {
            let contents = fs::read_to_string(&path).map_err(|e| {
                WalletError::StorageError(format!("Failed to read {}: {}", path.display(), e))
            })?;
            let file = StoreFile::parse(&contents)?;
            (file.accounts, file.version)
        } else {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            (BTreeMap::new(), STORE_VERSION)
        };

        let store = Self { path, cipher, accounts, loaded_version };
        if !store.path.exists() {
            store.persist()?;
        } else if store.loaded_version < STORE_VERSION {
            info!(
                from = store.loaded_version,
                to = STORE_VERSION,
                "Migrating key store layout"
            );
            store.persist()?;
        }
        debug!(path = %store.path.display(), accounts = store.accounts.len(), "Key store opened");
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Store an already-parsed key.
    pub fn insert_key(&mut self, name: &str, key: &PrivateKey) -> Result<(), WalletError> {
        validate_account_name(name)?;
        let ciphertext = key.with_secret(|bytes| {
            let hex_key = zeroize::Zeroizing::new(hex::encode(bytes));
            self.cipher.encrypt_to_string(hex_key.as_bytes())
        })?;
        if self.accounts.insert(name.to_string(), ciphertext).is_some() {
            debug!(name = %name, "Overwriting existing account");
        }
        self.persist()?;
        info!(name = %name, "Key added");
        Ok(())
    }

    /// Generate a fresh random key. With a non-empty `prefix` the account is
    /// named `{prefix}_{index}`; otherwise the name comes from the address tail.
    ///
    /// Unlike `add_key`, an existing account is never replaced.
    pub fn create_account(&mut self, prefix: &str, index: u32) -> Result<String, WalletError> {
        let key = PrivateKey::generate();
        let name = if prefix.is_empty() {
            default_account_name(&key.checksum_address()?)
        } else {
            format!("{}_{}", prefix, index)
        };
        self.ensure_vacant(&name)?;
        self.insert_key(&name, &key)?;
        Ok(name)
    }

    /// `InvalidInput` if `name` is already taken.
    pub fn ensure_vacant(&self, name: &str) -> Result<(), WalletError> {
        if self.accounts.contains_key(name) {
            return Err(WalletError::InvalidInput(format!(
                "Account {} already exists; delete it first",
                name
            )));
        }
        Ok(())
    }

    /// Create `prefix_1 ..= prefix_count`. Nothing is created if any of
    /// those names is taken; on a later failure the accounts created before
    /// it stay in the store.
    pub fn generate_batch(&mut self, prefix: &str, count: u32) -> Result<Vec<String>, WalletError> {
        if prefix.is_empty() {
            return Err(WalletError::InvalidInput("Batch prefix cannot be empty".to_string()));
        }
        for index in 1..=count {
            self.ensure_vacant(&format!("{}_{}", prefix, index))?;
        }
        let mut names = Vec::with_capacity(count as usize);
        for index in 1..=count {
            names.push(self.create_account(prefix, index)?);
        }
        info!(prefix = %prefix, count = count, "Batch generated");
        Ok(names)
    }

    /// Restore an account from a 12 or 24 word seed phrase.
    pub fn import_mnemonic(&mut self, name: &str, phrase: &str) -> Result<(), WalletError> {
        let key = mnemonic::derive_key(phrase)?;
        self.insert_key(name, &key)
    }

    /// Address of a stored account, derived from the decrypted key.
    pub fn address_of(&self, name: &str) -> Result<ethers::types::Address, WalletError> {
        self.get_decrypted_key(name)?.address()
    }

    /// Distinct name prefixes (`{prefix}_{index}` convention). Names without
    /// an underscore are their own prefix.
    pub fn list_batches(&self) -> BTreeSet<String> {
        self.accounts.keys().map(|name| batch_prefix(name).to_string()).collect()
    }

    /// Names belonging to one batch.
    pub fn batch_members(&self, prefix: &str) -> Vec<String> {
        self.accounts.keys().filter(|name| batch_prefix(name) == prefix).cloned().collect()
    }

    /// Rewrite the whole file through a sibling temp file and a rename.
    ///
    /// On failure the in-memory map remains authoritative for this process
    /// but is unpersisted; the error says so.
    fn persist(&self) -> Result<(), WalletError> {
        let file = StoreFile { version: STORE_VERSION, accounts: self.accounts.clone() };
        let json = serde_json::to_vec_pretty(&file)?;
        write_private_file(&self.path, &json).map_err(|e| {
            warn!(path = %self.path.display(), error = %e, "Key store write failed; changes are held in memory only");
            WalletError::StorageError(format!(
                "Failed to persist key store to {} (in-memory state is unpersisted): {}",
                self.path.display(),
                e
            ))
        })
    }
}

impl AccountStore for KeyStore {
    fn add_key(&mut self, name: &str, private_key_hex: &str) -> Result<(), WalletError> {
        let key = PrivateKey::from_hex(private_key_hex)?;
        self.insert_key(name, &key)
    }

    fn get_decrypted_key(&self, name: &str) -> Result<PrivateKey, WalletError> {
        let ciphertext = self
            .accounts
            .get(name)
            .ok_or_else(|| WalletError::NotFoundError(format!("No key found with name: {}", name)))?;
        let plaintext = self.cipher.decrypt_str(ciphertext)?;
        let hex_key = std::str::from_utf8(&plaintext).map_err(|_| {
            WalletError::CryptoError(format!("Stored key for {} is not valid text", name))
        })?;
        PrivateKey::from_hex(hex_key)
            .map_err(|e| WalletError::CryptoError(format!("Stored key for {} is malformed: {}", name, e)))
    }

    fn delete_key(&mut self, name: &str) -> Result<(), WalletError> {
        if self.accounts.remove(name).is_none() {
            return Err(WalletError::NotFoundError(format!("No key found with name: {}", name)));
        }
        self.persist()?;
        info!(name = %name, "Key deleted");
        Ok(())
    }

    fn list_keys(&self) -> Vec<String> {
        self.accounts.keys().cloned().collect()
    }

    fn contains(&self, name: &str) -> bool {
        self.accounts.contains_key(name)
    }
}

/// `{prefix}_{index}` -> `prefix`, splitting at the last `_`. Names without a
/// numeric index map to themselves.
pub fn batch_prefix(name: &str) -> &str {
    match name.rsplit_once('_') {
        Some((prefix, index))
            if !prefix.is_empty()
                && !index.is_empty()
                && index.bytes().all(|b| b.is_ascii_digit()) =>
        {
            prefix
        }
        _ => name,
    }
}

/// Default name from an address: three characters after `0x`, `_`, last three.
pub fn default_account_name(address: &str) -> String {
    let body = address.trim_start_matches("0x");
    let head: String = body.chars().take(3).collect();
    let tail: String = body.chars().skip(body.len().saturating_sub(3)).collect();
    format!("{}_{}", head, tail)
}

/// Write `bytes` to `path` via a temp file in the same directory, owner-only on unix.
pub(crate) fn write_private_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "store".to_string());
    let tmp = path.with_file_name(format!(".{}.tmp", file_name));

    {
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut f = options.open(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    fs::rename(&tmp, path)
}
