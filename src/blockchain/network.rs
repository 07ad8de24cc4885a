//! Read-only network catalog.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::core::errors::WalletError;
use crate::core::validation::DEFAULT_DECIMALS;

/// One chain entry: `{name, chainId, rpcUrl, symbol, explorer}` plus optional
/// `decimals` and a default `gasPrice` in wei.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkDescriptor {
    pub name: String,
    #[serde(rename = "chainId", serialize_with = "chain_id_to_string", deserialize_with = "chain_id_from_any")]
    pub chain_id: u64,
    #[serde(rename = "rpcUrl")]
    pub rpc_url: Option<String>,
    pub symbol: Option<String>,
    #[serde(default)]
    pub explorer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u32>,
    #[serde(rename = "gasPrice", default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<u64>,
}

impl NetworkDescriptor {
    pub fn decimals(&self) -> u32 {
        self.decimals.unwrap_or(DEFAULT_DECIMALS)
    }

    pub fn symbol(&self) -> &str {
        self.symbol.as_deref().unwrap_or("ETH")
    }

    /// Convert a chainlist.org record. Records without explorers are dropped,
    /// as are records without a numeric chain id.
    pub fn from_chainlist_entry(entry: &Value) -> Option<Self> {
        let explorer = entry
            .get("explorers")
            .and_then(Value::as_array)
            .and_then(|list| list.first())
            .and_then(|e| e.get("url"))
            .and_then(Value::as_str)?;
        let chain_id = entry.get("chainId").and_then(Value::as_u64)?;
        let name = entry.get("name").and_then(Value::as_str)?.to_string();
        let rpc_url = entry
            .get("rpc")
            .and_then(Value::as_array)
            .and_then(|list| list.iter().filter_map(Value::as_str).find(|u| !u.contains("${")))
            .map(str::to_string);
        let currency = entry.get("nativeCurrency");
        let symbol = currency.and_then(|c| c.get("symbol")).and_then(Value::as_str).map(str::to_string);
        let decimals = currency
            .and_then(|c| c.get("decimals"))
            .and_then(Value::as_u64)
            .and_then(|d| u32::try_from(d).ok());
        Some(Self {
            name,
            chain_id,
            rpc_url,
            symbol,
            explorer: Some(explorer.to_string()),
            decimals,
            gas_price: None,
        })
    }
}

fn chain_id_to_string<S: Serializer>(id: &u64, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&id.to_string())
}

fn chain_id_from_any<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    match Value::deserialize(d)? {
        Value::Number(n) => n.as_u64().ok_or_else(|| serde::de::Error::custom("chainId out of range")),
        Value::String(s) => s.trim().parse().map_err(serde::de::Error::custom),
        other => Err(serde::de::Error::custom(format!("invalid chainId: {}", other))),
    }
}

/// Mainnet entries first, then testnet; lookups return the first match.
#[derive(Debug, Clone, Default)]
pub struct NetworkCatalog {
    networks: Vec<NetworkDescriptor>,
}

impl NetworkCatalog {
    /// Parse a JSON array of descriptors or of raw chainlist records.
    pub fn parse(json: &str) -> Result<Self, WalletError> {
        let doc: Value = serde_json::from_str(json)?;
        let entries = doc.as_array().ok_or_else(|| {
            WalletError::SerializationError("Network catalog must be a JSON array".to_string())
        })?;
        let mut networks = Vec::with_capacity(entries.len());
        for entry in entries {
            if entry.get("rpc").is_some() && entry.get("rpcUrl").is_none() {
                if let Some(n) = NetworkDescriptor::from_chainlist_entry(entry) {
                    networks.push(n);
                }
            } else {
                networks.push(serde_json::from_value(entry.clone())?);
            }
        }
        Ok(Self { networks })
    }

    pub fn load(path: &Path) -> Result<Self, WalletError> {
        let json = fs::read_to_string(path).map_err(|e| {
            WalletError::NotFoundError(format!("Network catalog {}: {}", path.display(), e))
        })?;
        let catalog = Self::parse(&json)?;
        debug!(path = %path.display(), networks = catalog.networks.len(), "Network catalog loaded");
        Ok(catalog)
    }

    /// Load whichever of the mainnet/testnet lists are configured, merged.
    pub fn load_merged(mainnet: Option<&Path>, testnet: Option<&Path>) -> Result<Self, WalletError> {
        let mut merged = Self::default();
        for path in [mainnet, testnet].into_iter().flatten() {
            merged.merge(Self::load(path)?);
        }
        Ok(merged)
    }

    pub fn merge(&mut self, other: NetworkCatalog) {
        self.networks.extend(other.networks);
    }

    pub fn networks(&self) -> &[NetworkDescriptor] {
        &self.networks
    }

    pub fn find_by_name(&self, name: &str) -> Result<&NetworkDescriptor, WalletError> {
        self.networks
            .iter()
            .find(|n| n.name == name)
            .ok_or_else(|| WalletError::NotFoundError(format!("No network named {}", name)))
    }

    pub fn find_by_chain_id(&self, chain_id: u64) -> Result<&NetworkDescriptor, WalletError> {
        self.networks
            .iter()
            .find(|n| n.chain_id == chain_id)
            .ok_or_else(|| WalletError::NotFoundError(format!("No network with chain id {}", chain_id)))
    }

    /// Serialize to the descriptor format.
    pub fn to_json(&self) -> Result<String, WalletError> {
        Ok(serde_json::to_string_pretty(&self.networks)?)
    }
}
