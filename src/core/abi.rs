use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha3::{Digest, Keccak256};
use tracing::warn;

use crate::core::errors::WalletError;
use crate::core::validation::validate_ethereum_address;

const MUTABILITIES: [&str; 4] = ["pure", "view", "nonpayable", "payable"];

/// One function or event parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbiParam {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexed: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbiFunction {
    pub name: String,
    pub inputs: Vec<AbiParam>,
    pub outputs: Vec<AbiParam>,
    #[serde(rename = "stateMutability")]
    pub state_mutability: String,
}

impl AbiFunction {
    /// Canonical signature, e.g. `transfer(address,uint256)`.
    pub fn signature(&self) -> String {
        let types: Vec<&str> = self.inputs.iter().map(|p| p.kind.as_str()).collect();
        format!("{}({})", self.name, types.join(","))
    }

    pub fn selector(&self) -> [u8; 4] {
        selector_from_signature(&self.signature())
    }

    pub fn input_types(&self) -> Vec<&str> {
        self.inputs.iter().map(|p| p.kind.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbiEvent {
    pub name: String,
    pub inputs: Vec<AbiParam>,
    pub anonymous: bool,
}

/// Validated view over a contract's ABI descriptor.
#[derive(Debug, Clone)]
pub struct ContractAbi {
    pub address: Address,
    functions: Vec<AbiFunction>,
    events: Vec<AbiEvent>,
}

impl ContractAbi {
    /// Parse a JSON array of ABI entries.
    ///
    /// Entries that fail validation are skipped and returned as
    /// `AbiValidationError` warnings; only a bad address or a non-array
    /// document fails the whole parse. Constructors, fallbacks and error
    /// entries are ignored.
    pub fn parse(json: &str, address: &str) -> Result<(Self, Vec<WalletError>), WalletError> {
        if !address.starts_with("0x") || address.len() != 42 {
            return Err(WalletError::InvalidInput(format!(
                "Invalid contract address format: {}",
                address
            )));
        }
        let address = validate_ethereum_address(address)?;

        let doc: Value = serde_json::from_str(json)?;
        let entries = doc.as_array().ok_or_else(|| {
            WalletError::AbiValidationError("ABI document must be a JSON array".to_string())
        })?;

        let mut abi = Self { address, functions: Vec::new(), events: Vec::new() };
        let mut warnings = Vec::new();
        for (index, entry) in entries.iter().enumerate() {
            let kind = entry.get("type").and_then(Value::as_str).unwrap_or("function");
            let parsed = match kind {
                "function" => parse_function(entry).map(|f| abi.functions.push(f)),
                "event" => parse_event(entry).map(|e| abi.events.push(e)),
                _ => Ok(()),
            };
            if let Err(reason) = parsed {
                warn!(contract = ?abi.address, index = index, reason = %reason, "Skipping ABI entry");
                warnings.push(WalletError::AbiValidationError(format!(
                    "entry {} ({}): {}",
                    index, kind, reason
                )));
            }
        }
        Ok((abi, warnings))
    }

    pub fn list_functions(&self) -> Vec<&str> {
        self.functions.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn list_events(&self) -> Vec<&str> {
        self.events.iter().map(|e| e.name.as_str()).collect()
    }

    /// First function with this name (overloads resolve to the earliest entry).
    pub fn get_function(&self, name: &str) -> Result<&AbiFunction, WalletError> {
        self.functions.iter().find(|f| f.name == name).ok_or_else(|| {
            WalletError::NotFoundError(format!("No function found with name: {}", name))
        })
    }

    pub fn get_event(&self, name: &str) -> Result<&AbiEvent, WalletError> {
        self.events
            .iter()
            .find(|e| e.name == name)
            .ok_or_else(|| WalletError::NotFoundError(format!("No event found with name: {}", name)))
    }
}

fn parse_function(entry: &Value) -> Result<AbiFunction, String> {
    for field in ["name", "inputs", "outputs", "stateMutability"] {
        if entry.get(field).is_none() {
            return Err(format!("missing field `{}`", field));
        }
    }
    let function: AbiFunction =
        serde_json::from_value(entry.clone()).map_err(|e| e.to_string())?;
    if function.name.is_empty() {
        return Err("empty function name".to_string());
    }
    if !MUTABILITIES.contains(&function.state_mutability.as_str()) {
        return Err(format!("unknown stateMutability `{}`", function.state_mutability));
    }
    check_params(&function.inputs)?;
    check_params(&function.outputs)?;
    Ok(function)
}

fn parse_event(entry: &Value) -> Result<AbiEvent, String> {
    for field in ["name", "inputs", "anonymous"] {
        if entry.get(field).is_none() {
            return Err(format!("missing field `{}`", field));
        }
    }
    let event: AbiEvent = serde_json::from_value(entry.clone()).map_err(|e| e.to_string())?;
    if event.name.is_empty() {
        return Err("empty event name".to_string());
    }
    check_params(&event.inputs)?;
    Ok(event)
}

fn check_params(params: &[AbiParam]) -> Result<(), String> {
    match params.iter().find(|p| p.kind.trim().is_empty()) {
        Some(p) => Err(format!("parameter `{}` has an empty type", p.name)),
        None => Ok(()),
    }
}

/// Compute the first 4 bytes (function selector) from a signature string, e.g. "transfer(address,uint256)".
pub fn selector_from_signature(signature: &str) -> [u8; 4] {
    let mut keccak = Keccak256::new();
    keccak.update(signature.as_bytes());
    let out = keccak.finalize();
    [out[0], out[1], out[2], out[3]]
}

/// Left-pad an address into a 32-byte ABI word.
pub fn abi_word_address(address: &Address) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[12..].copy_from_slice(address.as_bytes());
    out
}

/// Big-endian 32-byte ABI word for an unsigned integer.
pub fn abi_word_uint256(value: U256) -> [u8; 32] {
    let mut out = [0u8; 32];
    value.to_big_endian(&mut out);
    out
}

/// Pack a selector and ABI words contiguously into calldata.
pub fn abi_pack(selector: [u8; 4], words: &[[u8; 32]]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + 32 * words.len());
    out.extend_from_slice(&selector);
    for w in words {
        out.extend_from_slice(w);
    }
    out
}
