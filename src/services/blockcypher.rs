//! BlockCypher REST client
//!
//! Endpoints used (`{net}` is `main` or `test3`):
//! - `POST /v1/btc/{net}/txs/push` with `{"tx": "<hex>"}`
//! - `GET  /v1/btc/{net}/addrs/{address}?unspentOnly=true`
//! - `GET  /v1/btc/{net}/txs/{hash1;hash2;...}`
//! - `GET  /v1/btc/{net}`

use std::collections::HashSet;
use std::time::Duration;

use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{no_spendable_balance, ChainService, ServiceConfig, ServiceError, ServiceResponse};
use crate::core::script::{classify_script, ScriptFormat};
use crate::core::transaction::{Transaction, TransactionOutput};
use crate::crypto::address::Network;

// =============================================================================
// API Response Types
// =============================================================================

/// `GET /addrs/{address}` response (only the fields used)
#[derive(Debug, Deserialize)]
pub struct AddressResponse {
    pub address: Option<String>,
    #[serde(default)]
    pub txrefs: Vec<TxRef>,
}

/// Reference to a transaction output touching an address
#[derive(Debug, Clone, Deserialize)]
pub struct TxRef {
    pub tx_hash: String,
    #[serde(default)]
    pub tx_output_n: i64,
    #[serde(default)]
    pub confirmations: u64,
}

/// `GET /txs/{hash}` response
#[derive(Debug, Clone, Deserialize)]
pub struct TxResponse {
    pub hash: String,
    #[serde(default)]
    pub confirmations: u64,
    #[serde(default)]
    pub outputs: Vec<TxOutput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TxOutput {
    pub value: u64,
    #[serde(default)]
    pub script: String,
    #[serde(default)]
    pub addresses: Option<Vec<String>>,
}

// =============================================================================
// Response Processing
// =============================================================================

/// Path segment BlockCypher uses for a network
pub fn network_segment(network: Network) -> &'static str {
    match network {
        Network::Mainnet => "main",
        Network::Testnet => "test3",
    }
}

/// Distinct transaction hashes with enough confirmations, in first-seen order
pub fn confirmed_tx_hashes(txrefs: &[TxRef], min_confirmations: u64) -> Vec<String> {
    let mut hashes: Vec<String> = Vec::new();
    for txref in txrefs {
        if txref.confirmations >= min_confirmations && !hashes.contains(&txref.tx_hash) {
            hashes.push(txref.tx_hash.clone());
        }
    }
    hashes
}

/// `(tx_hash, output_index)` of every confirmed unspent output the refs name
///
/// Refs with a negative `tx_output_n` point at inputs and are skipped.
pub fn confirmed_outpoints(
    txrefs: &[TxRef],
    min_confirmations: u64,
) -> HashSet<(String, u32)> {
    txrefs
        .iter()
        .filter(|txref| txref.confirmations >= min_confirmations)
        .filter_map(|txref| {
            u32::try_from(txref.tx_output_n)
                .ok()
                .map(|index| (txref.tx_hash.clone(), index))
        })
        .collect()
}

/// Batch lookups return an array, single lookups a bare object
pub fn parse_transactions(body: Value) -> Result<Vec<TxResponse>, ServiceError> {
    let result = if body.is_array() {
        serde_json::from_value::<Vec<TxResponse>>(body)
    } else {
        serde_json::from_value::<TxResponse>(body).map(|tx| vec![tx])
    };
    result.map_err(|e| ServiceError::Decode(e.to_string()))
}

/// Keep unspent P2PKH outputs whose only owner is `address`
///
/// Output indices are positions in the funding transaction's output list.
/// Outputs missing from `unspent` were already spent and are skipped.
/// Transactions left with no outputs are dropped.
pub fn spendable_transactions(
    txs: &[TxResponse],
    address: &str,
    unspent: &HashSet<(String, u32)>,
) -> Vec<Transaction> {
    txs.iter()
        .filter_map(|tx| {
            let mut transaction = Transaction::new(&tx.hash);
            for (index, output) in tx.outputs.iter().enumerate() {
                let index = index as u32;
                if !unspent.contains(&(tx.hash.clone(), index)) {
                    continue;
                }
                let is_p2pkh = matches!(
                    classify_script(&output.script),
                    Ok(ScriptFormat::PayToPubkeyHash)
                );
                let owned = matches!(
                    &output.addresses,
                    Some(owners) if owners.len() == 1 && owners[0] == address
                );
                if is_p2pkh && owned {
                    transaction.add_output(
                        TransactionOutput::new(index, &output.script, output.value)
                            .with_address(address),
                    );
                }
            }
            (!transaction.outputs.is_empty()).then_some(transaction)
        })
        .collect()
}

/// Message from an error body (`{"error": "..."}`), or the raw body
pub fn upstream_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

// =============================================================================
// Client
// =============================================================================

/// BlockCypher-backed [`ChainService`]
#[derive(Debug, Clone)]
pub struct BlockCypher {
    client: Client,
    config: ServiceConfig,
}

impl BlockCypher {
    pub fn new(config: ServiceConfig) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self { client, config })
    }

    /// Create with default configuration
    pub fn with_defaults() -> Result<Self, ServiceError> {
        Self::new(ServiceConfig::default())
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Full URL for a path under `/v1/btc/{net}`
    pub fn endpoint(&self, network: Network, path: &str) -> String {
        format!(
            "{}/v1/btc/{}{}",
            self.config.base_url.trim_end_matches('/'),
            network_segment(network),
            path
        )
    }

    /// Status and JSON body of a response, or the upstream error
    async fn read_json(response: Response) -> Result<(u16, Value), ServiceError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ServiceError::Upstream {
                status: status.as_u16(),
                message: upstream_message(&body),
            });
        }

        let value = serde_json::from_str(&body).map_err(|e| ServiceError::Decode(e.to_string()))?;
        Ok((status.as_u16(), value))
    }

    async fn get_json(&self, url: &str) -> Result<(u16, Value), ServiceError> {
        log::debug!("GET {}", url);
        let response = self.client.get(url).send().await?;
        Self::read_json(response).await
    }
}

impl ChainService for BlockCypher {
    async fn push_transaction(
        &self,
        raw_hex: &str,
        network: Network,
    ) -> Result<ServiceResponse<Value>, ServiceError> {
        let url = self.endpoint(network, "/txs/push");
        log::info!("Broadcasting {} byte transaction to {}", raw_hex.len() / 2, network);

        let response = self
            .client
            .post(&url)
            .json(&json!({ "tx": raw_hex }))
            .send()
            .await?;
        let (status, data) = Self::read_json(response).await?;
        Ok(ServiceResponse::new(status, data))
    }

    async fn pull_unspent_transactions(
        &self,
        address: &str,
        network: Network,
    ) -> Result<ServiceResponse<Vec<Transaction>>, ServiceError> {
        let url = self.endpoint(network, &format!("/addrs/{}?unspentOnly=true", address));
        let (_, body) = self.get_json(&url).await?;
        let refs: AddressResponse =
            serde_json::from_value(body).map_err(|e| ServiceError::Decode(e.to_string()))?;

        let hashes = confirmed_tx_hashes(&refs.txrefs, self.config.min_confirmations);
        let unspent = confirmed_outpoints(&refs.txrefs, self.config.min_confirmations);
        if hashes.is_empty() || unspent.is_empty() {
            log::warn!(
                "{} has no outputs with {} confirmations",
                address,
                self.config.min_confirmations
            );
            return Err(no_spendable_balance(address));
        }

        let url = self.endpoint(network, &format!("/txs/{}", hashes.join(";")));
        let (status, body) = self.get_json(&url).await?;
        let transactions = spendable_transactions(&parse_transactions(body)?, address, &unspent);
        log::info!(
            "Found {} spendable transactions for {}",
            transactions.len(),
            address
        );
        Ok(ServiceResponse::new(status, transactions))
    }

    async fn pull_metadata(
        &self,
        network: Network,
    ) -> Result<ServiceResponse<Value>, ServiceError> {
        let (status, data) = self.get_json(&self.endpoint(network, "")).await?;
        Ok(ServiceResponse::new(status, data))
    }
}
