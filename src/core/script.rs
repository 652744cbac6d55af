//! Locking scripts for legacy outputs
//!
//! Only the two standard templates are built:
//! - P2PKH: `OP_DUP OP_HASH160 <20 bytes> OP_EQUALVERIFY OP_CHECKSIG`
//! - P2SH:  `OP_HASH160 <20 bytes> OP_EQUAL`

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::address::{address_hash, classify_address, AddressType};
use crate::crypto::keys::KeyError;
use crate::provenance::{Entry, Recorder, Scope};

// =============================================================================
// Opcodes
// =============================================================================

pub const OP_DUP: u8 = 0x76;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_EQUAL: u8 = 0x87;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_CHECKSIG: u8 = 0xac;

/// Push length for a 20-byte hash
pub const HASH160_PUSH: u8 = 0x14;

// =============================================================================
// Script Errors
// =============================================================================

/// Script-related errors
#[derive(Error, Debug)]
pub enum ScriptError {
    #[error("Invalid script format: {0}")]
    InvalidScriptFormat(String),
    #[error("Unsupported script format: {0}")]
    UnsupportedScriptFormat(String),
    #[error("Script payload must be 20 bytes, got {0}")]
    InvalidHashLength(usize),
    #[error(transparent)]
    Key(#[from] KeyError),
}

// =============================================================================
// Script Formats
// =============================================================================

/// Standard locking script templates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScriptFormat {
    #[serde(rename = "pay-to-pubkey-hash")]
    PayToPubkeyHash,
    #[serde(rename = "pay-to-script-hash")]
    PayToScriptHash,
}

impl ScriptFormat {
    /// Name used by block explorer APIs
    pub fn name(&self) -> &'static str {
        match self {
            ScriptFormat::PayToPubkeyHash => "pay-to-pubkey-hash",
            ScriptFormat::PayToScriptHash => "pay-to-script-hash",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, ScriptError> {
        match name {
            "pay-to-pubkey-hash" => Ok(ScriptFormat::PayToPubkeyHash),
            "pay-to-script-hash" => Ok(ScriptFormat::PayToScriptHash),
            other => Err(ScriptError::UnsupportedScriptFormat(other.to_string())),
        }
    }

    /// Template that pays to addresses of the given kind
    pub fn for_address(address_type: AddressType) -> Self {
        match address_type {
            AddressType::P2pkh => ScriptFormat::PayToPubkeyHash,
            AddressType::P2sh => ScriptFormat::PayToScriptHash,
        }
    }
}

impl fmt::Display for ScriptFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Construction
// =============================================================================

fn check_hash(hash: &[u8]) -> Result<(), ScriptError> {
    if hash.len() != HASH160_PUSH as usize {
        return Err(ScriptError::InvalidHashLength(hash.len()));
    }
    Ok(())
}

/// `76 a9 14 <hash> 88 ac`
pub fn p2pkh_script(pubkey_hash: &[u8]) -> Result<Vec<u8>, ScriptError> {
    check_hash(pubkey_hash)?;
    let mut script = Vec::with_capacity(25);
    script.extend_from_slice(&[OP_DUP, OP_HASH160, HASH160_PUSH]);
    script.extend_from_slice(pubkey_hash);
    script.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
    Ok(script)
}

/// `a9 14 <hash> 87`
pub fn p2sh_script(script_hash: &[u8]) -> Result<Vec<u8>, ScriptError> {
    check_hash(script_hash)?;
    let mut script = Vec::with_capacity(23);
    script.extend_from_slice(&[OP_HASH160, HASH160_PUSH]);
    script.extend_from_slice(script_hash);
    script.push(OP_EQUAL);
    Ok(script)
}

/// Locking script paying to an address
pub fn create_script(address: &str, rec: &mut dyn Recorder) -> Result<Vec<u8>, ScriptError> {
    let format = ScriptFormat::for_address(classify_address(address)?);
    let mut scope = Scope::open(rec, || Entry::step(format!("Create {} script for {}", format, address)));

    let hash = address_hash(address, &mut scope)?;
    let script = match format {
        ScriptFormat::PayToPubkeyHash => p2pkh_script(&hash)?,
        ScriptFormat::PayToScriptHash => p2sh_script(&hash)?,
    };

    scope.close([hex::encode(&script)]);
    Ok(script)
}

/// Identify a hex script by its template prefix and suffix (case-insensitive)
pub fn classify_script(script_hex: &str) -> Result<ScriptFormat, ScriptError> {
    let script = script_hex.to_ascii_lowercase();
    if script.starts_with("76a914") && script.ends_with("88ac") {
        Ok(ScriptFormat::PayToPubkeyHash)
    } else if script.starts_with("a914") && script.ends_with("87") {
        Ok(ScriptFormat::PayToScriptHash)
    } else {
        Err(ScriptError::InvalidScriptFormat(format!(
            "'{}' is not a pay-to-pubkey-hash or pay-to-script-hash script",
            script_hex
        )))
    }
}
