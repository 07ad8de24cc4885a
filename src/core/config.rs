use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use zeroize::Zeroize;

use crate::core::errors::WalletError;
use crate::crypto::cipher::{generate_token, TokenCipher};
use crate::storage::write_private_file;

pub const DEFAULT_CONFIG_PATH: &str = "keyvault.toml";
pub const DEFAULT_KEYS_PATH: &str = "keys.json";
pub const DEFAULT_ENDPOINT: &str = "https://optimism-rpc.publicnode.com";
pub const DEFAULT_ABI_DIR: &str = "data";

/// Wallet configuration, read from TOML and overridden by `KEYS_PATH`,
/// `ENCRYPTION_TOKEN` and `ENDPOINT`.
#[derive(Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    #[serde(default)]
    pub keys_path: String,

    /// Base64 AES-256 key. Zeroed when the config is dropped.
    #[serde(default)]
    pub encryption_token: String,

    #[serde(default)]
    pub endpoint: String,

    /// Root of `{chain_id}/{address}.json` ABI files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abi_dir: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mainnet_catalog: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub testnet_catalog: Option<PathBuf>,

    /// Per-call RPC deadline (seconds)
    #[serde(default = "WalletConfig::default_rpc_timeout_secs")]
    pub rpc_timeout_secs: u64,
}

impl WalletConfig {
    fn default_rpc_timeout_secs() -> u64 {
        30
    }

    /// Read `path`, apply environment overrides and validate.
    pub fn load(path: &Path) -> Result<Self, WalletError> {
        let mut config = Self::read_file(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self, WalletError> {
        let text = fs::read_to_string(path).map_err(|e| {
            WalletError::ConfigError(format!(
                "Cannot read config {}: {}. Run `init` first.",
                path.display(),
                e
            ))
        })?;
        toml::from_str(&text)
            .map_err(|e| WalletError::ConfigError(format!("Invalid config {}: {}", path.display(), e)))
    }

    /// Non-empty environment values win over the file.
    pub fn apply_env_overrides(&mut self) {
        let read = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        if let Some(v) = read("KEYS_PATH") {
            self.keys_path = v;
        }
        if let Some(v) = read("ENCRYPTION_TOKEN") {
            self.encryption_token.zeroize();
            self.encryption_token = v;
        }
        if let Some(v) = read("ENDPOINT") {
            self.endpoint = v;
        }
    }

    /// Missing or empty required values are fatal.
    pub fn validate(&self) -> Result<(), WalletError> {
        for (key, value) in [
            ("KEYS_PATH", &self.keys_path),
            ("ENCRYPTION_TOKEN", &self.encryption_token),
            ("ENDPOINT", &self.endpoint),
        ] {
            if value.trim().is_empty() {
                return Err(WalletError::ConfigError(format!("{} is missing or empty", key)));
            }
        }
        if self.rpc_timeout_secs == 0 {
            return Err(WalletError::ConfigError("rpc_timeout_secs must be positive".to_string()));
        }
        self.cipher().map(|_| ())
    }

    pub fn cipher(&self) -> Result<TokenCipher, WalletError> {
        TokenCipher::from_token(&self.encryption_token).map_err(|e| match e {
            WalletError::CryptoError(msg) => WalletError::ConfigError(format!("ENCRYPTION_TOKEN: {}", msg)),
            other => other,
        })
    }

    pub fn keys_path(&self) -> PathBuf {
        PathBuf::from(&self.keys_path)
    }

    pub fn abi_dir(&self) -> PathBuf {
        self.abi_dir.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_ABI_DIR))
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }

    /// Owner-only write of the TOML form.
    pub fn save(&self, path: &Path) -> Result<(), WalletError> {
        let text = zeroize::Zeroizing::new(
            toml::to_string_pretty(self)
                .map_err(|e| WalletError::SerializationError(format!("Config encode failed: {}", e)))?,
        );
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        write_private_file(path, text.as_bytes()).map_err(|e| {
            WalletError::ConfigError(format!("Cannot write config {}: {}", path.display(), e))
        })
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            keys_path: DEFAULT_KEYS_PATH.to_string(),
            encryption_token: String::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            abi_dir: None,
            mainnet_catalog: None,
            testnet_catalog: None,
            rpc_timeout_secs: Self::default_rpc_timeout_secs(),
        }
    }
}

impl Drop for WalletConfig {
    fn drop(&mut self) {
        self.encryption_token.zeroize();
    }
}

impl fmt::Debug for WalletConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletConfig")
            .field("keys_path", &self.keys_path)
            .field("encryption_token", &"[REDACTED]")
            .field("endpoint", &self.endpoint)
            .field("abi_dir", &self.abi_dir)
            .field("mainnet_catalog", &self.mainnet_catalog)
            .field("testnet_catalog", &self.testnet_catalog)
            .field("rpc_timeout_secs", &self.rpc_timeout_secs)
            .finish()
    }
}

/// Create or repair the config file at `path`.
///
/// A missing file is written with defaults and a fresh token. An existing file
/// gets defaults for empty `keys_path`/`endpoint` and a token if it has none;
/// it is rewritten only when something was filled in.
pub fn bootstrap(path: &Path) -> Result<WalletConfig, WalletError> {
    let (mut config, mut changed) = if path.exists() {
        (WalletConfig::read_file(path)?, false)
    } else {
        (WalletConfig::default(), true)
    };

    if config.keys_path.trim().is_empty() {
        config.keys_path = DEFAULT_KEYS_PATH.to_string();
        changed = true;
    }
    if config.endpoint.trim().is_empty() {
        config.endpoint = DEFAULT_ENDPOINT.to_string();
        changed = true;
    }
    if config.encryption_token.trim().is_empty() {
        config.encryption_token = generate_token().to_string();
        changed = true;
        info!(path = %path.display(), "Generated a new encryption token");
    }

    if changed {
        config.save(path)?;
        info!(path = %path.display(), "Configuration written");
    }
    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}
