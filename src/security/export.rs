//! UNSAFE plaintext key export and the matching bulk-import reader.
//!
//! Everything written here is an unencrypted private key. Callers must gate
//! these functions behind an explicit user confirmation.

use chrono::Local;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::warn;
use zeroize::Zeroizing;

use crate::core::errors::WalletError;
use crate::security::SecretString;
use crate::storage::write_private_file;

/// Line/row layout of an export file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportTemplate {
    PrivateKeyAddress,
    AddressPrivateKey,
    PrefixedPrivateKeyAddress,
    /// Declared for seed-phrase wallets; not implemented.
    AddressSeedPhrase,
    /// Declared for seed-phrase wallets; not implemented.
    SeedPhraseAddress,
}

impl ExportTemplate {
    pub const ALL: [ExportTemplate; 5] = [
        ExportTemplate::PrivateKeyAddress,
        ExportTemplate::AddressPrivateKey,
        ExportTemplate::PrefixedPrivateKeyAddress,
        ExportTemplate::AddressSeedPhrase,
        ExportTemplate::SeedPhraseAddress,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ExportTemplate::PrivateKeyAddress => "PRIVATEKEY_ADDRESS",
            ExportTemplate::AddressPrivateKey => "ADDRESS_PRIVATEKEY",
            ExportTemplate::PrefixedPrivateKeyAddress => "0XPRIVATEKEY_ADDRESS",
            ExportTemplate::AddressSeedPhrase => "ADDRESS_SEEDPHRASE",
            ExportTemplate::SeedPhraseAddress => "SEEDPHRASE_ADDRESS",
        }
    }

    fn header(&self) -> Result<[&'static str; 2], WalletError> {
        match self {
            ExportTemplate::PrivateKeyAddress => Ok(["Private Key", "Address"]),
            ExportTemplate::AddressPrivateKey => Ok(["Address", "Private Key"]),
            ExportTemplate::PrefixedPrivateKeyAddress => Ok(["0xPrivate Key", "Address"]),
            other => Err(WalletError::NotImplemented(format!(
                "Export template {} is not implemented",
                other.name()
            ))),
        }
    }

    /// The two columns for one account, in template order.
    fn columns(&self, address: &str, key_hex: &str) -> Result<[String; 2], WalletError> {
        match self {
            ExportTemplate::PrivateKeyAddress => Ok([key_hex.to_string(), address.to_string()]),
            ExportTemplate::AddressPrivateKey => Ok([address.to_string(), key_hex.to_string()]),
            ExportTemplate::PrefixedPrivateKeyAddress => {
                Ok([format!("0x{}", key_hex), address.to_string()])
            }
            other => Err(WalletError::NotImplemented(format!(
                "Export template {} is not implemented",
                other.name()
            ))),
        }
    }
}

impl fmt::Display for ExportTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ExportTemplate {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Self::ALL.iter().copied().find(|t| t.name() == upper).ok_or_else(|| {
            WalletError::InvalidInput(format!("Unknown export template: {}", s))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Txt,
    Csv,
}

impl ExportFormat {
    fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Txt => "txt",
            ExportFormat::Csv => "csv",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "txt" => Ok(ExportFormat::Txt),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(WalletError::InvalidInput(format!("Unknown export format: {}", other))),
        }
    }
}

/// UNSAFE: writes every private key in `keys` (address -> hex key without
/// `0x`) as plaintext into `{dir}/{YYYY-mm-dd_HH-MM-SS}_export.{txt,csv}`.
///
/// Returns the written path. The file is owner-only on unix.
pub fn export_plaintext_unsafe(
    dir: &Path,
    keys: &BTreeMap<String, SecretString>,
    template: ExportTemplate,
    format: ExportFormat,
) -> Result<PathBuf, WalletError> {
    let header = template.header()?;

    let body: Zeroizing<Vec<u8>> = match format {
        ExportFormat::Txt => {
            let mut out = Zeroizing::new(String::new());
            for (address, key) in keys {
                let cols = Zeroizing::new(template.columns(address, key)?);
                out.push_str(&cols[0]);
                out.push(' ');
                out.push_str(&cols[1]);
                out.push('\n');
            }
            Zeroizing::new(out.as_bytes().to_vec())
        }
        ExportFormat::Csv => {
            let mut buf = Zeroizing::new(Vec::new());
            {
                let mut writer = csv::WriterBuilder::new().from_writer(&mut *buf);
                writer.write_record(header).map_err(csv_error)?;
                for (address, key) in keys {
                    let cols = Zeroizing::new(template.columns(address, key)?);
                    writer.write_record(cols.iter()).map_err(csv_error)?;
                }
                writer.flush()?;
            }
            buf
        }
    };

    let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
    let path = dir.join(format!("{}_export.{}", timestamp, format.extension()));
    write_private_file(&path, &body)?;
    warn!(path = %path.display(), accounts = keys.len(), template = %template, "Plaintext keys exported");
    Ok(path)
}

fn csv_error(e: csv::Error) -> WalletError {
    WalletError::StorageError(format!("CSV write failed: {}", e))
}

/// Scan a text file for lines holding both a `0x` address and a `0x` private
/// key, in any order. Lines missing either are ignored.
pub fn read_key_file(path: &Path) -> Result<Vec<(String, SecretString)>, WalletError> {
    if !path.exists() {
        return Err(WalletError::NotFoundError(format!(
            "Key file not found: {}",
            path.display()
        )));
    }
    let contents = Zeroizing::new(fs::read_to_string(path)?);
    let key_re = Regex::new(r"0x[a-fA-F0-9]{64}").expect("Hardcoded regex should always compile");
    let address_re =
        Regex::new(r"0x[a-fA-F0-9]{40}").expect("Hardcoded regex should always compile");

    let mut pairs = Vec::new();
    for line in contents.lines() {
        let Some(key) = key_re.find(line) else { continue };
        // A key's first 40 hex digits would also match the address pattern.
        let address = address_re.find_iter(line).find(|m| {
            m.end() <= key.start() || m.start() >= key.end()
        });
        if let Some(address) = address {
            pairs.push((address.as_str().to_string(), SecretString::new(key.as_str().to_string())));
        }
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const ADDR: &str = "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf";
    const KEY: &str = "0000000000000000000000000000000000000000000000000000000000000001";

    fn keys() -> BTreeMap<String, SecretString> {
        let mut map = BTreeMap::new();
        map.insert(ADDR.to_string(), SecretString::new(KEY.to_string()));
        map
    }

    #[test]
    fn template_names_parse() {
        for t in ExportTemplate::ALL {
            assert_eq!(t.name().parse::<ExportTemplate>().unwrap(), t);
        }
        assert!("nope".parse::<ExportTemplate>().is_err());
    }

    #[test]
    fn txt_prefixed_template() {
        let dir = tempdir().unwrap();
        let path = export_plaintext_unsafe(
            dir.path(),
            &keys(),
            ExportTemplate::PrefixedPrivateKeyAddress,
            ExportFormat::Txt,
        )
        .unwrap();
        assert!(path.to_string_lossy().ends_with("_export.txt"));
        let text = fs::read_to_string(path).unwrap();
        assert_eq!(text, format!("0x{} {}\n", KEY, ADDR));
    }

    #[test]
    fn csv_has_header_row() {
        let dir = tempdir().unwrap();
        let path = export_plaintext_unsafe(
            dir.path(),
            &keys(),
            ExportTemplate::AddressPrivateKey,
            ExportFormat::Csv,
        )
        .unwrap();
        let text = fs::read_to_string(path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("Address,Private Key"));
        assert_eq!(lines.next(), Some(format!("{},{}", ADDR, KEY).as_str()));
    }

    #[test]
    fn seed_phrase_templates_are_not_implemented() {
        let dir = tempdir().unwrap();
        for t in [ExportTemplate::AddressSeedPhrase, ExportTemplate::SeedPhraseAddress] {
            let err = export_plaintext_unsafe(dir.path(), &keys(), t, ExportFormat::Txt).unwrap_err();
            assert!(matches!(err, WalletError::NotImplemented(_)));
        }
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn export_then_read_back() {
        let dir = tempdir().unwrap();
        let path = export_plaintext_unsafe(
            dir.path(),
            &keys(),
            ExportTemplate::PrefixedPrivateKeyAddress,
            ExportFormat::Txt,
        )
        .unwrap();
        let pairs = read_key_file(&path).unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].0, ADDR);
        assert_eq!(pairs[0].1.as_str(), format!("0x{}", KEY));
    }

    #[test]
    fn reader_skips_incomplete_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keys.txt");
        fs::write(&path, format!("{}\njunk\n{} 0x{}\n", ADDR, ADDR, KEY)).unwrap();
        assert_eq!(read_key_file(&path).unwrap().len(), 1);
        assert!(matches!(
            read_key_file(&dir.path().join("missing.txt")),
            Err(WalletError::NotFoundError(_))
        ));
    }
}
