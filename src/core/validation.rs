use ethers::types::{Address, U256};
use regex::Regex;
use sha3::{Digest, Keccak256};
use std::str::FromStr;

use crate::core::errors::WalletError;

/// Default number of decimals for native EVM currencies.
pub const DEFAULT_DECIMALS: u32 = 18;

/// Validates an Ethereum address and returns it parsed.
pub fn validate_ethereum_address(address: &str) -> Result<Address, WalletError> {
    let hex_regex =
        Regex::new(r"^0x[0-9a-fA-F]{40}$").expect("Hardcoded regex should always compile");
    if !hex_regex.is_match(address) {
        return Err(WalletError::InvalidInput(format!(
            "Invalid Ethereum address format: {}",
            address
        )));
    }
    // EIP-55: if mixed-case, enforce checksum. All-lower or all-upper acceptable for compatibility.
    let body = &address[2..];
    let is_all_lower = !body.chars().any(|c| c.is_ascii_uppercase());
    let is_all_upper = !body.chars().any(|c| c.is_ascii_lowercase());
    if !(is_all_lower || is_all_upper) && !is_eip55_checksum_valid(address) {
        return Err(WalletError::InvalidInput(format!(
            "Invalid EIP-55 checksum for Ethereum address: {}",
            address
        )));
    }
    Address::from_str(address)
        .map_err(|e| WalletError::InvalidInput(format!("Invalid Ethereum address: {}", e)))
}

fn is_eip55_checksum_valid(addr: &str) -> bool {
    let body = &addr[2..];
    let lower = body.to_lowercase();
    let mut keccak = Keccak256::new();
    keccak.update(lower.as_bytes());
    let hash = keccak.finalize();
    for (i, ch) in body.chars().enumerate() {
        let nibble = (hash[i / 2] >> (4 * (1 - (i % 2)))) & 0x0f;
        match ch {
            'a'..='f' if nibble >= 8 => return false,
            'A'..='F' if nibble < 8 => return false,
            _ => {}
        }
    }
    true
}

/// Account names are store keys: non-empty, no whitespace or path separators.
pub fn validate_account_name(name: &str) -> Result<(), WalletError> {
    if name.is_empty() || name.len() > 64 {
        return Err(WalletError::InvalidInput(
            "Account name must be 1-64 characters".to_string(),
        ));
    }
    if name.chars().any(|c| c.is_whitespace() || c == '/' || c == '\\') {
        return Err(WalletError::InvalidInput(format!(
            "Account name contains forbidden characters: {:?}",
            name
        )));
    }
    Ok(())
}

/// Converts a user-facing decimal amount ("1.5") into the chain's smallest unit.
///
/// Accepts 123, 0.1, 1.234567 up to `decimals` fractional digits. No sign, no
/// exponent, no floating point anywhere in the conversion.
pub fn to_base_units(amount: &str, decimals: u32) -> Result<U256, WalletError> {
    let amount = amount.trim();
    if amount.is_empty() {
        return Err(WalletError::InvalidInput("Amount cannot be empty".to_string()));
    }
    let pattern = if decimals == 0 {
        r"^(0|[1-9]\d*)$".to_string()
    } else {
        format!(r"^(0|[1-9]\d*)(?:\.(\d{{1,{}}}))?$", decimals)
    };
    let re = Regex::new(&pattern).expect("Decimal regex pattern should always be valid");
    let caps = re.captures(amount).ok_or_else(|| {
        WalletError::InvalidInput(format!(
            "Invalid decimal amount {:?} (at most {} decimals)",
            amount, decimals
        ))
    })?;

    let whole = caps.get(1).map(|m| m.as_str()).unwrap_or("0");
    let fraction = caps.get(2).map(|m| m.as_str()).unwrap_or("");
    let padded = format!("{}{}{}", whole, fraction, "0".repeat(decimals as usize - fraction.len()));

    U256::from_dec_str(&padded)
        .map_err(|_| WalletError::InvalidInput(format!("Amount out of range: {}", amount)))
}

/// Parses an integer amount already expressed in the smallest unit.
/// Anything with a decimal point, sign or exponent is rejected.
pub fn parse_integer_amount(value: &str) -> Result<U256, WalletError> {
    let value = value.trim();
    if value.is_empty() || !value.chars().all(|c| c.is_ascii_digit()) {
        return Err(WalletError::InvalidInput(format!(
            "Value must be a non-negative integer in the smallest unit, got {:?}",
            value
        )));
    }
    U256::from_dec_str(value)
        .map_err(|_| WalletError::InvalidInput(format!("Value out of range: {}", value)))
}

/// Renders a smallest-unit integer as a decimal string with `decimals` places.
pub fn format_base_units(value: U256, decimals: u32) -> String {
    match ethers::utils::format_units(value, decimals) {
        Ok(s) => s,
        Err(_) => value.to_string(),
    }
}
