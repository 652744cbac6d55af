//! Core transaction components
//!
//! This module contains the building blocks of a legacy transaction:
//! - Ordered field sequences (the wire layout as a tree)
//! - Little-endian and single-byte count encoding
//! - Script builder (P2PKH, P2SH)
//! - Transaction builder and per-input SIGHASH_ALL signer

pub mod encoding;
pub mod fields;
pub mod script;
pub mod transaction;

pub use fields::{FieldError, FieldSequence, Segment};
pub use script::{classify_script, create_script, p2pkh_script, p2sh_script, ScriptError, ScriptFormat};
pub use transaction::{
    build_script_sig, checked_total, create_raw_transaction, signing_view, Contribution, Payment,
    SignedTransaction, Transaction, TransactionBuilder, TransactionError, TransactionOutput,
    UnsignedTransaction,
};
