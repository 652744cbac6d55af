//! CLI commands for rawtx
//!
//! Implements the command handlers behind the `rawtx` binary.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::script::{classify_script, create_script};
use crate::core::transaction::{
    checked_total, Contribution, Payment, SignedTransaction, TransactionBuilder,
    TransactionError,
};
use crate::crypto::address::{
    classify_address, classify_address_network, private_key_to_address, Network,
};
use crate::crypto::base58::verify_base58_check;
use crate::provenance::NoopRecorder;
use crate::services::{spendable_contributions, BlockCypher, ChainService, ServiceConfig};

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Contents of a `build --request` file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildRequest {
    pub contributions: Vec<Contribution>,
    pub payments: Vec<Payment>,
    /// One per contribution, same order
    pub private_keys: Vec<String>,
}

impl BuildRequest {
    pub fn total_in(&self) -> Result<u64, TransactionError> {
        checked_total(self.contributions.iter().map(Contribution::amount))
            .ok_or(TransactionError::AmountOverflow("contribution"))
    }

    pub fn total_out(&self) -> Result<u64, TransactionError> {
        checked_total(self.payments.iter().map(|p| p.amount))
            .ok_or(TransactionError::AmountOverflow("payment"))
    }
}

/// Read a build request from a JSON file
pub fn load_request(path: &Path) -> CliResult<BuildRequest> {
    let data = fs::read_to_string(path)?;
    let request = serde_json::from_str(&data)?;
    Ok(request)
}

/// Build and sign the transaction a request describes
pub fn build_signed(
    request: &BuildRequest,
    trace: bool,
) -> Result<SignedTransaction, TransactionError> {
    let mut builder = TransactionBuilder::new()
        .add_contributions(request.contributions.iter().cloned())
        .add_payments(request.payments.iter().cloned());
    if trace {
        builder = builder.with_provenance();
    }
    builder.build_and_sign(request.private_keys.as_slice())
}

/// Build and sign a transaction from a request file
pub fn cmd_build(path: &Path, trace: bool) -> CliResult<()> {
    let request = load_request(path)?;

    let (total_in, total_out) = (request.total_in()?, request.total_out()?);
    if total_out > total_in {
        log::warn!("Payments ({}) exceed contributions ({})", total_out, total_in);
    }

    let signed = build_signed(&request, trace)?;

    if trace {
        println!("📜 Provenance:");
        print!("{}", signed.provenance());
        println!();
    }

    println!("✅ Transaction signed!");
    println!("   ├─ TXID: {}", signed.txid());
    println!("   ├─ Inputs: {}", request.contributions.len());
    println!("   ├─ Outputs: {}", request.payments.len());
    println!("   ├─ Size: {} bytes", signed.size());
    if total_in >= total_out {
        println!("   ├─ Fee: {} satoshis", total_in - total_out);
    }
    println!("   └─ Raw: {}", signed.raw_string());

    Ok(())
}

/// Derive the address of a private key
pub fn cmd_address(private_key: &str, network: Network) -> CliResult<()> {
    let address = private_key_to_address(private_key, network, &mut NoopRecorder)?;

    println!("📍 Address: {}", address);
    println!("   └─ Network: {}", network);

    Ok(())
}

/// Show the locking script paying to an address
pub fn cmd_script(address: &str) -> CliResult<()> {
    let address_type = classify_address(address)?;
    let network = classify_address_network(address)?;
    if let Err(e) = verify_base58_check(address) {
        log::warn!("{} does not verify: {}", address, e);
    }

    let script = hex::encode(create_script(address, &mut NoopRecorder)?);
    let format = classify_script(&script)?;

    println!("🔒 Locking script for {}", address);
    println!("   ├─ Address type: {} ({})", address_type.name(), network);
    println!("   ├─ Format: {}", format);
    println!("   └─ Script: {}", script);

    Ok(())
}

/// Service client with CLI overrides applied
pub fn service_client(base_url: Option<&str>, timeout_ms: Option<u64>) -> CliResult<BlockCypher> {
    let mut config = ServiceConfig::default();
    if let Some(url) = base_url {
        config.base_url = url.to_string();
    }
    if let Some(timeout) = timeout_ms {
        config.timeout_ms = timeout;
    }
    Ok(BlockCypher::new(config)?)
}

/// Broadcast a signed transaction
pub async fn cmd_broadcast<S: ChainService>(
    service: &S,
    raw_hex: &str,
    network: Network,
) -> CliResult<()> {
    if hex::decode(raw_hex).is_err() {
        return Err(format!("'{}' is not a hex transaction", raw_hex).into());
    }

    let response = service.push_transaction(raw_hex, network).await?;
    let hash = response
        .data
        .pointer("/tx/hash")
        .and_then(|v| v.as_str())
        .unwrap_or("-");

    println!("📡 Transaction broadcast ({})", response.status);
    println!("   └─ Hash: {}", hash);

    Ok(())
}

/// List spendable outputs of an address
pub async fn cmd_utxos<S: ChainService>(
    service: &S,
    address: &str,
    network: Network,
) -> CliResult<()> {
    let contributions = spendable_contributions(service, address, network).await?;
    let total = checked_total(contributions.iter().map(Contribution::amount))
        .ok_or(TransactionError::AmountOverflow("contribution"))?;

    println!("💰 Spendable outputs for {}", address);
    println!("   Total: {} satoshis", total);
    for contribution in &contributions {
        let (tx_hash, index) = contribution.outpoint();
        println!("   └─ {}:{} = {} satoshis", tx_hash, index, contribution.amount());
    }

    Ok(())
}
