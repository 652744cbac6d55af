//! Chain services
//!
//! Broadcasting a transaction and finding spendable outputs need a view of
//! the chain, which this crate does not keep. [`ChainService`] is that
//! boundary; [`BlockCypher`] implements it over the BlockCypher REST API.

pub mod blockcypher;

use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::transaction::{Contribution, Transaction};
use crate::crypto::address::Network;

pub use blockcypher::BlockCypher;

// =============================================================================
// Errors
// =============================================================================

/// Errors returned by chain services
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Service error ({status}): {message}")]
    Upstream { status: u16, message: String },
    #[error("{0}")]
    InternalError(String),
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Failed to decode service response: {0}")]
    Decode(String),
}

// =============================================================================
// Responses and Configuration
// =============================================================================

/// HTTP status and decoded payload of a successful call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceResponse<T> {
    pub status: u16,
    pub data: T,
}

impl<T> ServiceResponse<T> {
    pub fn new(status: u16, data: T) -> Self {
        Self { status, data }
    }
}

/// Chain service client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// API root, without the `/v1/btc/...` path
    pub base_url: String,
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
    pub user_agent: String,
    /// Confirmations a transaction needs before its outputs count as spendable
    pub min_confirmations: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.blockcypher.com".to_string(),
            timeout_ms: 10_000,
            user_agent: "rawtx/0.1".to_string(),
            min_confirmations: 6,
        }
    }
}

// =============================================================================
// Service Contract
// =============================================================================

/// Broadcast and UTXO lookup against some view of the chain
pub trait ChainService {
    /// Broadcast a signed transaction given as hex
    fn push_transaction(
        &self,
        raw_hex: &str,
        network: Network,
    ) -> impl Future<Output = Result<ServiceResponse<serde_json::Value>, ServiceError>> + Send;

    /// Confirmed transactions holding P2PKH outputs owned only by `address`
    ///
    /// Fails with [`ServiceError::InternalError`] when there are none.
    fn pull_unspent_transactions(
        &self,
        address: &str,
        network: Network,
    ) -> impl Future<Output = Result<ServiceResponse<Vec<Transaction>>, ServiceError>> + Send;

    /// Chain summary (height, latest hash, fee levels)
    fn pull_metadata(
        &self,
        network: Network,
    ) -> impl Future<Output = Result<ServiceResponse<serde_json::Value>, ServiceError>> + Send;
}

/// Every spendable output of `address` as a contribution
pub async fn spendable_contributions<S: ChainService>(
    service: &S,
    address: &str,
    network: Network,
) -> Result<Vec<Contribution>, ServiceError> {
    let response = service.pull_unspent_transactions(address, network).await?;
    Ok(response
        .data
        .iter()
        .flat_map(Transaction::contributions)
        .collect())
}

/// Error returned when an address has nothing confirmed to spend
pub fn no_spendable_balance(address: &str) -> ServiceError {
    ServiceError::InternalError(format!("{} has no spendable balance", address))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transaction::{TransactionBuilder, TransactionOutput};
    use std::sync::Mutex;

    const ADDRESS: &str = "mk8FtRCwe5VNNvD8Q8So6sD9RAKQaRfcex";
    const SCRIPT: &str = "76a914328dbf4cbeacc2898f096ffce5f9dcd27b53e5cc88ac";
    const TX_HASH: &str = "68e7da9216d4e113df7918383258f7cec0a5cf661f469f68966aadf6a12358d3";

    /// In-memory chain service
    #[derive(Default)]
    struct MockChainService {
        pushed: Mutex<Vec<(String, Network)>>,
        transactions: Vec<Transaction>,
        reject_push: bool,
    }

    impl ChainService for MockChainService {
        async fn push_transaction(
            &self,
            raw_hex: &str,
            network: Network,
        ) -> Result<ServiceResponse<serde_json::Value>, ServiceError> {
            if self.reject_push {
                return Err(ServiceError::Upstream {
                    status: 400,
                    message: "Error validating transaction".to_string(),
                });
            }
            self.pushed
                .lock()
                .unwrap()
                .push((raw_hex.to_string(), network));
            Ok(ServiceResponse::new(201, serde_json::json!({ "tx": { "hex": raw_hex } })))
        }

        async fn pull_unspent_transactions(
            &self,
            address: &str,
            _network: Network,
        ) -> Result<ServiceResponse<Vec<Transaction>>, ServiceError> {
            if self.transactions.is_empty() {
                return Err(no_spendable_balance(address));
            }
            Ok(ServiceResponse::new(200, self.transactions.clone()))
        }

        async fn pull_metadata(
            &self,
            network: Network,
        ) -> Result<ServiceResponse<serde_json::Value>, ServiceError> {
            Ok(ServiceResponse::new(200, serde_json::json!({ "name": network.name() })))
        }
    }

    fn funded_transaction() -> Transaction {
        let mut tx = Transaction::new(TX_HASH);
        tx.add_output(TransactionOutput::new(0, SCRIPT, 20_000_000).with_address(ADDRESS));
        tx.add_output(TransactionOutput::new(3, SCRIPT, 5_000).with_address(ADDRESS));
        tx
    }

    #[tokio::test]
    async fn test_push_signed_transaction() {
        let service = MockChainService::default();
        let signed = TransactionBuilder::new()
            .add_contributions(funded_transaction().contribution(0))
            .add_payment("mjUDEsMXuYFZSrERVZjzHpznNJFzNUBoop", 10_000_000)
            .build_and_sign(&["cRKHcyn9Diw4GmcAaxRUdJH3Kgaz3j1KBFq1i6QwC2U9STqK7YXm"])
            .unwrap();

        let response = signed
            .push_transaction(&service, Network::Testnet)
            .await
            .unwrap();
        assert_eq!(response.status, 201);

        let pushed = service.pushed.lock().unwrap();
        assert_eq!(pushed.len(), 1);
        assert_eq!(pushed[0], (signed.raw_string(), Network::Testnet));
    }

    #[tokio::test]
    async fn test_push_error_surfaces_unchanged() {
        let service = MockChainService {
            reject_push: true,
            ..Default::default()
        };
        let err = service
            .push_transaction("00", Network::Mainnet)
            .await
            .unwrap_err();
        match err {
            ServiceError::Upstream { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Error validating transaction");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_spendable_contributions() {
        let service = MockChainService {
            transactions: vec![funded_transaction()],
            ..Default::default()
        };
        let contributions = spendable_contributions(&service, ADDRESS, Network::Testnet)
            .await
            .unwrap();
        assert_eq!(contributions.len(), 2);
        assert_eq!(contributions[1].outpoint(), (TX_HASH, 3));
    }

    #[tokio::test]
    async fn test_no_spendable_balance() {
        let service = MockChainService::default();
        let err = spendable_contributions(&service, ADDRESS, Network::Testnet)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("{} has no spendable balance", ADDRESS)
        );
    }

    #[tokio::test]
    async fn test_metadata() {
        let service = MockChainService::default();
        let response = service.pull_metadata(Network::Mainnet).await.unwrap();
        assert_eq!(response.data["name"], "mainnet");
    }

    #[test]
    fn test_default_config() {
        let config = ServiceConfig::default();
        assert_eq!(config.base_url, "https://api.blockcypher.com");
        assert_eq!(config.timeout_ms, 10_000);
        assert_eq!(config.min_confirmations, 6);
    }
}
