//! Base58Check addresses
//!
//! Only the two legacy address kinds are handled: pay-to-pubkey-hash and
//! pay-to-script-hash, on mainnet and testnet. Both are 25 bytes once
//! decoded: version byte, 20-byte hash, 4-byte checksum.

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use super::base58::{base58_check_decode, base58_check_encode};
use super::hash::hash160;
use super::keys::{KeyError, PrivateKey};
use crate::provenance::{record, Entry, Recorder, Scope};

/// Length of a decoded address: version + hash160 + checksum
pub const ADDRESS_PAYLOAD_LEN: usize = 25;

// =============================================================================
// Network
// =============================================================================

/// Bitcoin network an address or service call belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Network {
    pub fn name(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Network {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" | "main" => Ok(Network::Mainnet),
            "testnet" | "test" | "test3" => Ok(Network::Testnet),
            other => Err(KeyError::InvalidInputFormat(format!(
                "unknown network '{}'",
                other
            ))),
        }
    }
}

// =============================================================================
// Address Types
// =============================================================================

/// Kind of legacy address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressType {
    P2pkh,
    P2sh,
}

impl AddressType {
    pub fn name(&self) -> &'static str {
        match self {
            AddressType::P2pkh => "p2pkh",
            AddressType::P2sh => "p2sh",
        }
    }
}

/// Version byte prepended to the hash for a given address kind and network
pub fn version_byte(address_type: AddressType, network: Network) -> u8 {
    match (address_type, network) {
        (AddressType::P2pkh, Network::Mainnet) => 0x00,
        (AddressType::P2pkh, Network::Testnet) => 0x6f,
        (AddressType::P2sh, Network::Mainnet) => 0x05,
        (AddressType::P2sh, Network::Testnet) => 0xc4,
    }
}

/// Classify an address by its leading character
pub fn classify_address(address: &str) -> Result<AddressType, KeyError> {
    match address.chars().next() {
        Some('1') | Some('m') | Some('n') => Ok(AddressType::P2pkh),
        Some('3') | Some('2') => Ok(AddressType::P2sh),
        _ => Err(KeyError::InvalidInputFormat(format!(
            "unrecognized address '{}'",
            address
        ))),
    }
}

/// Network of an address, by its leading character
pub fn classify_address_network(address: &str) -> Result<Network, KeyError> {
    match address.chars().next() {
        Some('1') | Some('3') => Ok(Network::Mainnet),
        Some('m') | Some('n') | Some('2') => Ok(Network::Testnet),
        _ => Err(KeyError::InvalidInputFormat(format!(
            "unrecognized address '{}'",
            address
        ))),
    }
}

// =============================================================================
// Derivation
// =============================================================================

/// Encode a 20-byte hash as an address of the given kind
pub fn address_from_hash(
    hash: &[u8; 20],
    address_type: AddressType,
    network: Network,
    rec: &mut dyn Recorder,
) -> String {
    let version = version_byte(address_type, network);
    let mut payload = Vec::with_capacity(21);
    payload.push(version);
    payload.extend_from_slice(hash);
    record(rec, || {
        Entry::append(format!("{} version byte {:02x}", network, version), "hash")
            .with_result(hex::encode(&payload))
    });

    base58_check_encode(&payload, rec)
}

/// P2PKH address for a hex-encoded public key (compressed or not)
///
/// The key is hashed exactly as given; callers pick the compression form.
pub fn derive_address(
    public_key_hex: &str,
    network: Network,
    rec: &mut dyn Recorder,
) -> Result<String, KeyError> {
    let public_key = hex::decode(public_key_hex).map_err(|_| KeyError::InvalidPublicKey)?;
    if public_key.is_empty() {
        return Err(KeyError::InvalidPublicKey);
    }

    let mut scope = Scope::open(rec, || {
        Entry::convert("public key", format!("{} address", network))
    });

    let hash = hash160(&public_key);
    record(&mut scope, || {
        Entry::hash("RIPEMD160(SHA256)", public_key_hex).with_result(hex::encode(hash))
    });

    let address = address_from_hash(&hash, AddressType::P2pkh, network, &mut scope);
    scope.close([address.as_str()]);
    Ok(address)
}

/// Address for a private key, published compressed iff the key encoding says so
pub fn private_key_to_address(
    private_key: &str,
    network: Network,
    rec: &mut dyn Recorder,
) -> Result<String, KeyError> {
    let key = PrivateKey::parse(private_key, rec)?;
    let public_key = key.public_key_hex(rec)?;
    derive_address(&public_key, network, rec)
}

/// The 20-byte hash inside an address
///
/// The checksum is not verified; only the decoded length is.
pub fn address_hash(address: &str, rec: &mut dyn Recorder) -> Result<[u8; 20], KeyError> {
    let decoded = base58_check_decode(address, rec)?;
    if decoded.len() != ADDRESS_PAYLOAD_LEN {
        return Err(KeyError::InvalidInputFormat(format!(
            "address '{}' decodes to {} bytes, expected {}",
            address,
            decoded.len(),
            ADDRESS_PAYLOAD_LEN
        )));
    }

    let mut hash = [0u8; 20];
    hash.copy_from_slice(&decoded[1..21]);
    record(rec, || {
        Entry::step("Remove network byte and checksum").with_result(hex::encode(hash))
    });
    Ok(hash)
}
