//! rawtx: offline construction and signing of legacy Bitcoin transactions
//!
//! This crate provides:
//! - Raw transaction assembly as an ordered tree of named fields
//! - Per-input SIGHASH_ALL signing with low-S ECDSA signatures (secp256k1)
//! - Private keys in decimal, hex and WIF form (compressed or not)
//! - P2PKH / P2SH addresses and locking scripts
//! - An optional provenance trail of every derived value
//! - Broadcast and UTXO lookup through BlockCypher
//!
//! # Example
//!
//! ```rust
//! use rawtx::core::{Contribution, TransactionBuilder, TransactionOutput};
//!
//! let contribution = Contribution::new(
//!     "68e7da9216d4e113df7918383258f7cec0a5cf661f469f68966aadf6a12358d3",
//!     TransactionOutput::new(0, "76a914328dbf4cbeacc2898f096ffce5f9dcd27b53e5cc88ac", 20_000_000),
//! );
//!
//! let signed = TransactionBuilder::new()
//!     .add_contribution(contribution)
//!     .add_payment("mjUDEsMXuYFZSrERVZjzHpznNJFzNUBoop", 10_000_000)
//!     .build_and_sign(&["cRKHcyn9Diw4GmcAaxRUdJH3Kgaz3j1KBFq1i6QwC2U9STqK7YXm"])
//!     .unwrap();
//!
//! println!("Signed {} bytes: {}", signed.size(), signed.raw_string());
//! ```

pub mod cli;
pub mod core;
pub mod crypto;
pub mod provenance;
pub mod services;

// Re-export commonly used types
pub use core::{
    Contribution, FieldSequence, Payment, SignedTransaction, Transaction, TransactionBuilder,
    TransactionError, TransactionOutput, UnsignedTransaction,
};
pub use crypto::{KeyError, Network, PrivateKey};
pub use provenance::ProvenanceLog;
pub use services::{BlockCypher, ChainService, ServiceConfig, ServiceError, ServiceResponse};
