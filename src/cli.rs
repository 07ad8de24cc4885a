use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::core::config::DEFAULT_CONFIG_PATH;

/// Local key vault and transfer tool for EVM accounts.
#[derive(Debug, Parser)]
#[command(name = "evm-keyvault", version, about, disable_help_subcommand = true)]
pub struct Cli {
    /// Config file (TOML)
    #[arg(long, global = true, env = "KEYVAULT_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

/// Network selection shared by every command that talks to a node.
#[derive(Debug, Clone, Args)]
pub struct NetworkArgs {
    /// Network name from the catalog; defaults to the configured endpoint
    #[arg(long)]
    pub network: Option<String>,
}

/// Which accounts a command operates on.
#[derive(Debug, Clone, Args)]
pub struct AccountSelection {
    /// Account names (repeatable)
    #[arg(long = "from", num_args = 1..)]
    pub from: Vec<String>,
    /// Every account of a batch prefix
    #[arg(long)]
    pub batch: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create the config file with defaults and a fresh encryption token
    Init,
    /// Generate new random accounts
    Create {
        /// Explicit account name
        #[arg(long, conflicts_with = "prefix")]
        name: Option<String>,
        /// Batch prefix; accounts are named prefix_1..prefix_N
        #[arg(long)]
        prefix: Option<String>,
        #[arg(long, default_value_t = 1)]
        count: u32,
    },
    /// Import a raw private key (read from a hidden prompt)
    Import {
        #[arg(long)]
        name: String,
        /// Read the key from the first line of stdin instead of prompting
        #[arg(long)]
        stdin: bool,
    },
    /// Restore an account from a 12 or 24 word seed phrase
    Restore {
        #[arg(long)]
        name: String,
        #[arg(long)]
        stdin: bool,
    },
    /// Import `address private-key` lines from a text file
    ImportFile {
        #[arg(long)]
        path: PathBuf,
        /// Name imported accounts prefix_1..prefix_N instead of by address
        #[arg(long)]
        prefix: Option<String>,
    },
    Delete {
        #[arg(long)]
        name: String,
    },
    /// UNSAFE: print a decrypted private key
    ShowKey {
        #[arg(long)]
        name: String,
    },
    /// List account names
    List,
    /// List batch prefixes
    Batches,
    Address {
        #[arg(long)]
        name: String,
    },
    /// Native balance of every account, or of one batch
    Balance {
        #[arg(long)]
        batch: Option<String>,
        #[command(flatten)]
        network: NetworkArgs,
    },
    /// Send native currency from one or more accounts, one after another
    Send {
        #[command(flatten)]
        accounts: AccountSelection,
        #[arg(long)]
        to: String,
        /// Decimal amount, e.g. 0.05
        #[arg(long)]
        amount: String,
        #[arg(long, default_value_t = 21_000)]
        gas_limit: u64,
        /// Gas price in wei; asks the node when omitted
        #[arg(long)]
        gas_price: Option<String>,
        /// Override the network's decimals
        #[arg(long)]
        decimals: Option<u32>,
        #[command(flatten)]
        network: NetworkArgs,
    },
    /// ERC-20 transfer from one or more accounts
    SendToken {
        #[command(flatten)]
        accounts: AccountSelection,
        #[arg(long)]
        contract: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: String,
        /// Token decimals
        #[arg(long, default_value_t = 18)]
        decimals: u32,
        #[command(flatten)]
        network: NetworkArgs,
    },
    /// Receipt status of a transaction
    Status {
        #[arg(long)]
        hash: String,
        /// Poll until included
        #[arg(long)]
        wait: bool,
        /// Give up waiting after this many seconds
        #[arg(long, default_value_t = 120)]
        timeout: u64,
        #[command(flatten)]
        network: NetworkArgs,
    },
    /// UNSAFE: write decrypted keys to a timestamped plaintext file
    Export {
        /// PRIVATEKEY_ADDRESS, ADDRESS_PRIVATEKEY or 0XPRIVATEKEY_ADDRESS
        #[arg(long, default_value = "ADDRESS_PRIVATEKEY")]
        template: String,
        /// txt or csv
        #[arg(long, default_value = "txt")]
        format: String,
        #[arg(long)]
        batch: Option<String>,
        /// Output directory
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
    /// Inspect a locally registered contract ABI
    Abi {
        #[arg(long)]
        contract: String,
        #[arg(long)]
        chain_id: u64,
        /// Show one function
        #[arg(long)]
        function: Option<String>,
        /// Show one event
        #[arg(long)]
        event: Option<String>,
    },
    /// Look up a network in the catalog
    Network {
        #[arg(long, conflicts_with = "chain_id")]
        name: Option<String>,
        #[arg(long)]
        chain_id: Option<u64>,
    },
}
