//! evm-keyvault command-line entry point.
use anyhow::{Context, Result};
use clap::Parser;
use ethers::types::{H256, U256};
use ethers::utils::to_checksum;
use is_terminal::IsTerminal;
use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use zeroize::Zeroizing;

use evm_keyvault::blockchain::batch::{send_batch, summarize, BatchOutcome, TransferPlan};
use evm_keyvault::blockchain::contract::AbiRegistry;
use evm_keyvault::blockchain::network::{NetworkCatalog, NetworkDescriptor};
use evm_keyvault::blockchain::{EthereumRpc, RpcClient, TransactionBuilder, TxStatus};
use evm_keyvault::cli::{AccountSelection, Cli, Commands, NetworkArgs};
use evm_keyvault::core::config::{bootstrap, WalletConfig};
use evm_keyvault::core::domain::PrivateKey;
use evm_keyvault::core::errors::WalletError;
use evm_keyvault::core::validation::{
    format_base_units, parse_integer_amount, to_base_units, validate_ethereum_address,
};
use evm_keyvault::security::export::{
    export_plaintext_unsafe, read_key_file, ExportFormat, ExportTemplate,
};
use evm_keyvault::security::SecretString;
use evm_keyvault::storage::{default_account_name, AccountStore, KeyStore};

const RECEIPT_POLL: Duration = Duration::from_secs(3);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging()?;

    if let Commands::Init = cli.command {
        let config = bootstrap(&cli.config)?;
        println!("Config ready at {}", cli.config.display());
        println!("Key store: {}", config.keys_path);
        println!("Endpoint:  {}", config.endpoint);
        return Ok(());
    }

    // Missing or invalid configuration halts here.
    let config = WalletConfig::load(&cli.config)?;
    let mut store = KeyStore::open(config.keys_path(), config.cipher()?)?;

    match cli.command {
        // Handled before the store is opened.
        Commands::Init => {}
        Commands::Create { name, prefix, count } => {
            let names = match (name, prefix) {
                (Some(name), _) => {
                    store.ensure_vacant(&name)?;
                    store.insert_key(&name, &PrivateKey::generate())?;
                    vec![name]
                }
                (None, Some(prefix)) => store.generate_batch(&prefix, count)?,
                (None, None) => {
                    let mut names = Vec::with_capacity(count as usize);
                    for _ in 0..count {
                        names.push(store.create_account("", 0)?);
                    }
                    names
                }
            };
            for name in names {
                println!("{} {}", name, to_checksum(&store.address_of(&name)?, None));
            }
        }
        Commands::Import { name, stdin } => {
            store.ensure_vacant(&name)?;
            let key_hex = read_secret("Private key (hex): ", stdin)?;
            let key = PrivateKey::from_hex(key_hex.trim())?;
            store.insert_key(&name, &key)?;
            println!("{} {}", name, key.checksum_address()?);
        }
        Commands::Restore { name, stdin } => {
            store.ensure_vacant(&name)?;
            let phrase = read_secret("Seed phrase: ", stdin)?;
            store.import_mnemonic(&name, phrase.trim())?;
            println!("{} {}", name, to_checksum(&store.address_of(&name)?, None));
        }
        Commands::ImportFile { path, prefix } => import_file(&mut store, &path, prefix.as_deref())?,
        Commands::Delete { name } => {
            store.delete_key(&name)?;
            println!("Deleted {}", name);
        }
        Commands::ShowKey { name } => {
            let key = store.get_decrypted_key(&name)?;
            confirm_unsafe("display a private key in plaintext")?;
            println!("0x{}", key.to_hex().as_str());
        }
        Commands::List => {
            for name in store.list_keys() {
                println!("{}", name);
            }
        }
        Commands::Batches => {
            for prefix in store.list_batches() {
                println!("{} ({} accounts)", prefix, store.batch_members(&prefix).len());
            }
        }
        Commands::Address { name } => {
            println!("{}", to_checksum(&store.address_of(&name)?, None));
        }
        Commands::Balance { batch, network } => {
            let (rpc, net) = connect(&config, &network)?;
            let names = match batch {
                Some(prefix) => store.batch_members(&prefix),
                None => store.list_keys(),
            };
            let (symbol, decimals) = symbol_and_decimals(net.as_ref());
            for name in names {
                match balance_of(&store, &rpc, &name).await {
                    Ok((address, wei)) => println!(
                        "{} {} {} {}",
                        name,
                        to_checksum(&address, None),
                        format_base_units(wei, decimals),
                        symbol
                    ),
                    Err(e) => eprintln!("{}: {}", name, e),
                }
            }
        }
        Commands::Send { accounts, to, amount, gas_limit, gas_price, decimals, network } => {
            let (rpc, net) = connect(&config, &network)?;
            let names = select_accounts(&store, &accounts)?;
            let to = validate_ethereum_address(&to)?;
            let decimals = decimals.unwrap_or_else(|| symbol_and_decimals(net.as_ref()).1);
            let value = to_base_units(&amount, decimals)?;
            let gas_price = match gas_price {
                Some(p) => Some(parse_integer_amount(&p)?),
                None => net.as_ref().and_then(|n| n.gas_price).map(U256::from),
            };
            let plan = TransferPlan::Native { to, value, gas_limit: U256::from(gas_limit), gas_price };
            let outcomes = send_batch(&rpc, &store, &names, &plan).await;
            report_batch(&outcomes)?;
        }
        Commands::SendToken { accounts, contract, to, amount, decimals, network } => {
            let (rpc, _) = connect(&config, &network)?;
            let names = select_accounts(&store, &accounts)?;
            let to = validate_ethereum_address(&to)?;
            let amount = to_base_units(&amount, decimals)?;
            let chain_id = rpc.chain_id().await?;
            let (abi, warnings) = AbiRegistry::new(config.abi_dir()).load_abi(&contract, chain_id)?;
            for w in &warnings {
                eprintln!("warning: {}", w);
            }
            let plan = TransferPlan::Token { abi, to, amount };
            let outcomes = send_batch(&rpc, &store, &names, &plan).await;
            report_batch(&outcomes)?;
        }
        Commands::Status { hash, wait, timeout, network } => {
            let (rpc, _) = connect(&config, &network)?;
            let hash = H256::from_str(&hash)
                .map_err(|e| WalletError::InvalidInput(format!("Invalid transaction hash: {}", e)))?;
            let builder = TransactionBuilder::new(&rpc);
            let status = if wait {
                builder.wait_for_receipt(hash, RECEIPT_POLL, Duration::from_secs(timeout)).await?
            } else {
                builder.status(hash).await?
            };
            match status {
                TxStatus::Pending => println!("pending"),
                TxStatus::Confirmed(r) => println!(
                    "confirmed in block {} (gas used {})",
                    r.block_number.map(|b| b.to_string()).unwrap_or_default(),
                    r.gas_used.map(|g| g.to_string()).unwrap_or_default()
                ),
                TxStatus::Failed(r) => println!(
                    "failed in block {}",
                    r.block_number.map(|b| b.to_string()).unwrap_or_default()
                ),
            }
        }
        Commands::Export { template, format, batch, dir } => {
            let template = ExportTemplate::from_str(&template)?;
            let format = ExportFormat::from_str(&format)?;
            let names = match batch {
                Some(prefix) => store.batch_members(&prefix),
                None => store.list_keys(),
            };
            confirm_unsafe("write private keys to a plaintext file")?;
            let mut keys: BTreeMap<String, SecretString> = BTreeMap::new();
            for name in &names {
                let key = store.get_decrypted_key(name)?;
                keys.insert(key.checksum_address()?, key.to_hex());
            }
            let path = export_plaintext_unsafe(&dir, &keys, template, format)?;
            println!("Exported {} accounts to {}", keys.len(), path.display());
        }
        Commands::Abi { contract, chain_id, function, event } => {
            let (abi, warnings) = AbiRegistry::new(config.abi_dir()).load_abi(&contract, chain_id)?;
            for w in &warnings {
                eprintln!("warning: {}", w);
            }
            if let Some(name) = function {
                let f = abi.get_function(&name)?;
                println!("{} 0x{} {}", f.signature(), hex::encode(f.selector()), f.state_mutability);
            } else if let Some(name) = event {
                let e = abi.get_event(&name)?;
                let types: Vec<&str> = e.inputs.iter().map(|p| p.kind.as_str()).collect();
                println!("{}({})", e.name, types.join(","));
            } else {
                println!("functions: {}", abi.list_functions().join(", "));
                println!("events: {}", abi.list_events().join(", "));
            }
        }
        Commands::Network { name, chain_id } => {
            let catalog = load_catalog(&config)?;
            let network = match (name, chain_id) {
                (Some(name), _) => catalog.find_by_name(&name)?,
                (None, Some(id)) => catalog.find_by_chain_id(id)?,
                (None, None) => anyhow::bail!("Pass --name or --chain-id"),
            };
            println!("{}", serde_json::to_string_pretty(network)?);
        }
    }

    Ok(())
}

fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn load_catalog(config: &WalletConfig) -> Result<NetworkCatalog, WalletError> {
    NetworkCatalog::load_merged(config.mainnet_catalog.as_deref(), config.testnet_catalog.as_deref())
}

/// RPC client for the selected network, or for the configured endpoint.
fn connect(
    config: &WalletConfig,
    args: &NetworkArgs,
) -> Result<(EthereumRpc, Option<NetworkDescriptor>), WalletError> {
    match &args.network {
        Some(name) => {
            let network = load_catalog(config)?.find_by_name(name)?.clone();
            let url = network.rpc_url.clone().ok_or_else(|| {
                WalletError::ConfigError(format!("Network {} has no RPC URL", network.name))
            })?;
            Ok((EthereumRpc::new(&url, config.rpc_timeout())?, Some(network)))
        }
        None => Ok((EthereumRpc::new(&config.endpoint, config.rpc_timeout())?, None)),
    }
}

fn symbol_and_decimals(network: Option<&NetworkDescriptor>) -> (String, u32) {
    match network {
        Some(n) => (n.symbol().to_string(), n.decimals()),
        None => ("ETH".to_string(), evm_keyvault::core::validation::DEFAULT_DECIMALS),
    }
}

async fn balance_of<R: RpcClient>(
    store: &KeyStore,
    rpc: &R,
    name: &str,
) -> Result<(ethers::types::Address, U256), WalletError> {
    let address = store.address_of(name)?;
    Ok((address, rpc.get_balance(address).await?))
}

fn select_accounts(store: &KeyStore, selection: &AccountSelection) -> Result<Vec<String>> {
    let mut names = selection.from.clone();
    if let Some(prefix) = &selection.batch {
        names.extend(store.batch_members(prefix));
    }
    let mut seen = std::collections::HashSet::new();
    names.retain(|n| seen.insert(n.clone()));
    if names.is_empty() {
        anyhow::bail!("No accounts selected; pass --from or --batch");
    }
    Ok(names)
}

fn report_batch(outcomes: &[BatchOutcome]) -> Result<()> {
    for outcome in outcomes {
        match &outcome.result {
            Ok(hash) => println!("{} ok {:?}", outcome.account, hash),
            Err(e) => println!("{} failed: {}", outcome.account, e),
        }
    }
    let (ok, failed) = summarize(outcomes);
    println!("{} sent, {} failed", ok, failed);
    if failed > 0 {
        anyhow::bail!("{} of {} transfers failed", failed, outcomes.len());
    }
    Ok(())
}

fn import_file(store: &mut KeyStore, path: &std::path::Path, prefix: Option<&str>) -> Result<()> {
    let pairs = read_key_file(path)?;
    let mut imported = 0usize;
    for (index, (address, key_hex)) in pairs.iter().enumerate() {
        let key = match PrivateKey::from_hex(key_hex) {
            Ok(k) => k,
            Err(e) => {
                warn!(line = index + 1, error = %e, "Skipping invalid key");
                continue;
            }
        };
        let derived = key.checksum_address()?;
        if !derived.eq_ignore_ascii_case(address) {
            warn!(listed = %address, derived = %derived, "Skipping key that does not match its address");
            continue;
        }
        let name = match prefix {
            Some(p) => format!("{}_{}", p, index + 1),
            None => default_account_name(&derived),
        };
        if let Err(e) = store.ensure_vacant(&name) {
            warn!(line = index + 1, error = %e, "Skipping key");
            continue;
        }
        store.insert_key(&name, &key)?;
        println!("{} {}", name, derived);
        imported += 1;
    }
    info!(imported = imported, total = pairs.len(), "Key file imported");
    Ok(())
}

/// Hidden prompt, or the first stdin line for scripted use.
fn read_secret(prompt: &str, from_stdin: bool) -> Result<Zeroizing<String>> {
    if from_stdin {
        let mut line = Zeroizing::new(String::new());
        io::stdin().lock().read_line(&mut line).context("read secret from stdin")?;
        return Ok(line);
    }
    Ok(Zeroizing::new(rpassword::prompt_password(prompt).context("read secret from terminal")?))
}

/// Unsafe output needs an interactive terminal and a typed confirmation.
fn confirm_unsafe(action: &str) -> Result<()> {
    #[cfg(feature = "test-env")]
    {
        if std::env::var("KEYVAULT_ASSUME_YES").ok().as_deref() == Some("1") {
            warn!(action = action, "Unsafe action confirmed by KEYVAULT_ASSUME_YES (test build)");
            return Ok(());
        }
    }

    if !io::stdout().is_terminal() || !io::stdin().is_terminal() {
        anyhow::bail!("Refusing to {}: an interactive terminal is required", action);
    }
    eprint!("WARNING: you are about to {}. Type YES to continue: ", action);
    io::stderr().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    if input.trim() != "YES" {
        anyhow::bail!("Aborted");
    }
    warn!(action = action, "Unsafe action confirmed");
    Ok(())
}
