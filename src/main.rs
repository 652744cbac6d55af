//! rawtx CLI Application
//!
//! Builds and signs legacy Bitcoin transactions offline, and talks to
//! BlockCypher for broadcast and UTXO lookup.

use clap::{Parser, Subcommand};
use rawtx::cli;
use rawtx::crypto::Network;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rawtx")]
#[command(author = "Darshan")]
#[command(version = "0.1.0")]
#[command(about = "Offline construction and signing of legacy Bitcoin transactions", long_about = None)]
struct Cli {
    /// Chain service API root (defaults to https://api.blockcypher.com)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Chain service request timeout in milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build and sign a transaction from a JSON request file
    Build {
        /// Request file with contributions, payments and private keys
        #[arg(short, long)]
        request: PathBuf,

        /// Print the provenance trail of every derived value
        #[arg(long)]
        trace: bool,
    },

    /// Derive the address of a private key
    Address {
        /// Private key (decimal, hex, compressed hex, WIF or compressed WIF)
        #[arg(short, long)]
        key: String,

        #[arg(short, long, value_enum, default_value = "testnet")]
        network: Network,
    },

    /// Show the locking script for an address
    Script {
        #[arg(short, long)]
        address: String,
    },

    /// Broadcast a signed transaction
    Broadcast {
        /// Raw transaction hex
        #[arg(long)]
        hex: String,

        #[arg(short, long, value_enum, default_value = "testnet")]
        network: Network,
    },

    /// List confirmed spendable outputs of an address
    Utxos {
        #[arg(short, long)]
        address: String,

        #[arg(short, long, value_enum, default_value = "testnet")]
        network: Network,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build { request, trace } => {
            cli::cmd_build(&request, trace)?;
        }

        Commands::Address { key, network } => {
            cli::cmd_address(&key, network)?;
        }

        Commands::Script { address } => {
            cli::cmd_script(&address)?;
        }

        Commands::Broadcast { hex, network } => {
            let service = cli::service_client(cli.base_url.as_deref(), cli.timeout_ms)?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(cli::cmd_broadcast(&service, &hex, network))?;
        }

        Commands::Utxos { address, network } => {
            let service = cli::service_client(cli.base_url.as_deref(), cli.timeout_ms)?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(cli::cmd_utxos(&service, &address, network))?;
        }
    }

    Ok(())
}
