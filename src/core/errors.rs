use std::fmt;

/// Error type shared by every wallet operation.
///
/// The variants follow how a caller is expected to react: `ConfigError` halts
/// startup, input errors re-prompt, and everything else aborts the single
/// operation (or batch item) that raised it.
#[derive(Debug)]
pub enum WalletError {
    /// Missing or invalid bootstrap configuration.
    ConfigError(String),
    /// Malformed encryption token or cipher failure.
    CryptoError(String),
    /// Ciphertext did not authenticate: wrong token or tampered data.
    AuthenticationError(String),
    /// Account, contract ABI or network absent.
    NotFoundError(String),
    /// Seed phrase with the wrong number of words.
    InvalidPassphrase(String),
    /// User-supplied value failed validation.
    InvalidInput(String),
    /// Seed phrase could not be turned into a key.
    DerivationError(String),
    /// ABI entry missing required fields.
    AbiValidationError(String),
    /// Malformed key material at signing time.
    SigningError(String),
    /// RPC transport or node failure.
    NetworkError(String),
    /// Node rejected a raw transaction.
    BroadcastError(String),
    /// Network call exceeded its deadline.
    TimeoutError(String),
    /// Key store file could not be read or written.
    StorageError(String),
    /// Serialization/deserialization errors.
    SerializationError(String),
    /// Declared but unimplemented functionality.
    NotImplemented(String),
}

impl fmt::Display for WalletError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WalletError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            WalletError::CryptoError(msg) => write!(f, "Crypto error: {}", msg),
            WalletError::AuthenticationError(msg) => {
                write!(f, "Authentication error: {}", msg)
            }
            WalletError::NotFoundError(msg) => write!(f, "Not found: {}", msg),
            WalletError::InvalidPassphrase(msg) => write!(f, "Invalid passphrase: {}", msg),
            WalletError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            WalletError::DerivationError(msg) => write!(f, "Key derivation error: {}", msg),
            WalletError::AbiValidationError(msg) => write!(f, "ABI validation error: {}", msg),
            WalletError::SigningError(msg) => write!(f, "Signing failed: {}", msg),
            WalletError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            WalletError::BroadcastError(msg) => write!(f, "Broadcast failed: {}", msg),
            WalletError::TimeoutError(msg) => write!(f, "Timeout error: {}", msg),
            WalletError::StorageError(msg) => write!(f, "Storage error: {}", msg),
            WalletError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            WalletError::NotImplemented(msg) => write!(f, "Not implemented: {}", msg),
        }
    }
}

impl std::error::Error for WalletError {}

impl WalletError {
    /// Only bootstrap failures should stop the process.
    pub fn is_fatal(&self) -> bool {
        matches!(self, WalletError::ConfigError(_))
    }

    /// Errors the caller should answer by asking the user again.
    pub fn is_user_input(&self) -> bool {
        matches!(
            self,
            WalletError::InvalidPassphrase(_)
                | WalletError::InvalidInput(_)
                | WalletError::DerivationError(_)
        )
    }

    /// Transport problems that may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WalletError::NetworkError(_) | WalletError::TimeoutError(_))
    }
}

impl From<anyhow::Error> for WalletError {
    fn from(err: anyhow::Error) -> Self {
        WalletError::InvalidInput(err.to_string())
    }
}

impl From<std::io::Error> for WalletError {
    fn from(err: std::io::Error) -> Self {
        WalletError::StorageError(err.to_string())
    }
}

impl From<serde_json::Error> for WalletError {
    fn from(err: serde_json::Error) -> Self {
        WalletError::SerializationError(err.to_string())
    }
}

impl From<crate::utils::UtilsError> for WalletError {
    fn from(err: crate::utils::UtilsError) -> Self {
        WalletError::InvalidInput(err.to_string())
    }
}
