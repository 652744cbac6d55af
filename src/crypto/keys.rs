//! ECDSA key handling for legacy transaction signing
//!
//! Private keys arrive in one of five textual encodings (decimal, hex,
//! compressed hex, WIF, compressed WIF). The encoding also decides whether
//! the matching public key is published compressed.
//!
//! Signing uses secp256k1 with RFC6979 deterministic nonces; signatures are
//! normalized to low-S before DER encoding.

use num_bigint::BigUint;
use rand::rngs::OsRng;
use secp256k1::ecdsa::Signature;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::base58::{base58_check_decode, is_base58};
use crate::provenance::{record, Entry, Recorder, Scope};

// =============================================================================
// Curve Constants
// =============================================================================

/// secp256k1 group order N, big-endian
pub const CURVE_ORDER: [u8; 32] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe,
    0xba, 0xae, 0xdc, 0xe6, 0xaf, 0x48, 0xa0, 0x3b, 0xbf, 0xd2, 0x5e, 0x8c, 0xd0, 0x36, 0x41, 0x41,
];

/// N / 2 (floor), the largest permitted low-S value
pub const HALF_CURVE_ORDER: [u8; 32] = [
    0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0x5d, 0x57, 0x6e, 0x73, 0x57, 0xa4, 0x50, 0x1d, 0xdf, 0xe9, 0x2f, 0x46, 0x68, 0x1b, 0x20, 0xa0,
];

/// Sighash byte appended to every signature (SIGHASH_ALL)
pub const SIGHASH_ALL: u8 = 0x01;

// =============================================================================
// Errors
// =============================================================================

/// Errors that can occur during key and address operations
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Invalid input format: {0}")]
    InvalidInputFormat(String),
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Invalid public key")]
    InvalidPublicKey,
    #[error("Base58Check checksum mismatch")]
    ChecksumMismatch,
    #[error("Secp256k1 error: {0}")]
    Secp256k1Error(#[from] secp256k1::Error),
}

// =============================================================================
// Private Key Formats
// =============================================================================

/// Textual encoding of a private key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyFormat {
    Decimal,
    Hex,
    HexCompressed,
    Wif,
    WifCompressed,
}

impl KeyFormat {
    /// Whether the public key for this encoding is published compressed
    pub fn is_compressed(&self) -> bool {
        matches!(self, KeyFormat::HexCompressed | KeyFormat::WifCompressed)
    }

    pub fn name(&self) -> &'static str {
        match self {
            KeyFormat::Decimal => "decimal",
            KeyFormat::Hex => "hex",
            KeyFormat::HexCompressed => "hex_compressed",
            KeyFormat::Wif => "wif",
            KeyFormat::WifCompressed => "wif_compressed",
        }
    }
}

/// Classify a private key by length and character set only
///
/// No cryptographic validation happens here; a string that merely looks like
/// a WIF key classifies as one.
pub fn classify_private_key(key: &str) -> Result<KeyFormat, KeyError> {
    let is_hex = key.bytes().all(|b| b.is_ascii_hexdigit());

    if !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit()) {
        Ok(KeyFormat::Decimal)
    } else if key.len() == 64 && is_hex {
        Ok(KeyFormat::Hex)
    } else if key.len() == 66 && is_hex {
        Ok(KeyFormat::HexCompressed)
    } else if key.len() == 51 && is_base58(key) {
        Ok(KeyFormat::Wif)
    } else if key.len() == 52 && is_base58(key) {
        Ok(KeyFormat::WifCompressed)
    } else {
        Err(KeyError::InvalidInputFormat(format!(
            "unrecognized private key encoding ({} characters)",
            key.len()
        )))
    }
}

/// Take the 32 key bytes out of a WIF string
///
/// Byte 0 is the network prefix; anything past byte 33 (compression flag,
/// checksum) is dropped by position.
pub fn decode_wif_private_key(key: &str, rec: &mut dyn Recorder) -> Result<[u8; 32], KeyError> {
    let decoded = base58_check_decode(key, rec)?;
    if decoded.len() < 33 {
        return Err(KeyError::InvalidInputFormat(format!(
            "WIF payload too short: {} bytes",
            decoded.len()
        )));
    }

    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&decoded[1..33]);
    record(rec, || {
        Entry::step("Remove network byte, compression flag and checksum")
            .with_result(hex::encode(bytes))
    });
    Ok(bytes)
}

fn decode_hex_key(key: &str) -> Result<[u8; 32], KeyError> {
    let decoded = hex::decode(&key[..64])
        .map_err(|e| KeyError::InvalidInputFormat(format!("invalid hex key: {}", e)))?;
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&decoded);
    Ok(bytes)
}

/// Parse a base-10 integer into a 32-byte big-endian scalar
fn decode_decimal_key(key: &str) -> Result<[u8; 32], KeyError> {
    let value = BigUint::parse_bytes(key.as_bytes(), 10).ok_or_else(|| {
        KeyError::InvalidInputFormat(format!("'{}' is not a decimal number", key))
    })?;
    let be = value.to_bytes_be();
    if be.len() > 32 {
        return Err(KeyError::InvalidInputFormat(
            "decimal private key exceeds 256 bits".to_string(),
        ));
    }

    let mut bytes = [0u8; 32];
    bytes[32 - be.len()..].copy_from_slice(&be);
    Ok(bytes)
}

/// Classify a private key and decode it to its 32 raw bytes
pub fn decode_private_key(
    key: &str,
    rec: &mut dyn Recorder,
) -> Result<([u8; 32], KeyFormat), KeyError> {
    let format = classify_private_key(key)?;
    let mut scope = Scope::open(rec, || Entry::decode(format.name(), "private key"));

    let bytes = match format {
        KeyFormat::Decimal => decode_decimal_key(key)?,
        KeyFormat::Hex | KeyFormat::HexCompressed => decode_hex_key(key)?,
        KeyFormat::Wif | KeyFormat::WifCompressed => decode_wif_private_key(key, &mut scope)?,
    };

    scope.close([format!("{} key", format.name())]);
    Ok((bytes, format))
}

// =============================================================================
// Private Key
// =============================================================================

/// A secp256k1 secret key together with the encoding it was supplied in
#[derive(Clone)]
pub struct PrivateKey {
    secret_key: SecretKey,
    format: KeyFormat,
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateKey")
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

impl PrivateKey {
    /// Generate a new random key
    pub fn generate(format: KeyFormat) -> Self {
        Self {
            secret_key: SecretKey::new(&mut OsRng),
            format,
        }
    }

    /// Wrap raw key bytes
    pub fn from_bytes(bytes: &[u8; 32], format: KeyFormat) -> Result<Self, KeyError> {
        let secret_key = SecretKey::from_slice(bytes).map_err(|_| KeyError::InvalidPrivateKey)?;
        Ok(Self { secret_key, format })
    }

    /// Decode any of the five supported encodings
    pub fn parse(key: &str, rec: &mut dyn Recorder) -> Result<Self, KeyError> {
        let (bytes, format) = decode_private_key(key, rec)?;
        Self::from_bytes(&bytes, format)
    }

    pub fn format(&self) -> KeyFormat {
        self.format
    }

    pub fn is_compressed(&self) -> bool {
        self.format.is_compressed()
    }

    pub fn secret_key(&self) -> &SecretKey {
        &self.secret_key
    }

    pub fn public_key(&self) -> PublicKey {
        let secp = Secp256k1::new();
        PublicKey::from_secret_key(&secp, &self.secret_key)
    }

    /// Uncompressed (65-byte, `04`-prefixed) public key as hex
    pub fn uncompressed_public_key_hex(&self) -> String {
        hex::encode(self.public_key().serialize_uncompressed())
    }

    /// Public key hex in the form this key's encoding calls for
    pub fn public_key_hex(&self, rec: &mut dyn Recorder) -> Result<String, KeyError> {
        let uncompressed = self.uncompressed_public_key_hex();
        record(rec, || {
            Entry::step("Derive public key from private key").with_result(&uncompressed)
        });

        if self.is_compressed() {
            compress_public_key(&uncompressed, rec)
        } else {
            Ok(uncompressed)
        }
    }

    /// Sign a 32-byte digest, producing a low-S signature
    pub fn sign_digest(
        &self,
        digest: &[u8; 32],
        rec: &mut dyn Recorder,
    ) -> Result<EcdsaSignature, KeyError> {
        let secp = Secp256k1::signing_only();
        let message = Message::from_digest(*digest);
        let signature = secp.sign_ecdsa(&message, &self.secret_key);

        let raw = EcdsaSignature::from_compact(&signature.serialize_compact());
        record(rec, || {
            Entry::sign(format!("{} with private key", hex::encode(digest))).with_results([
                format!("r value: {}", hex::encode(raw.r)),
                format!("s value: {}", hex::encode(raw.s)),
            ])
        });
        Ok(raw.normalize_s(rec))
    }
}

// =============================================================================
// Signatures
// =============================================================================

/// Raw ECDSA signature components, big-endian
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EcdsaSignature {
    pub r: [u8; 32],
    pub s: [u8; 32],
}

impl EcdsaSignature {
    pub fn from_compact(compact: &[u8; 64]) -> Self {
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&compact[..32]);
        s.copy_from_slice(&compact[32..]);
        Self { r, s }
    }

    pub fn to_compact(&self) -> [u8; 64] {
        let mut compact = [0u8; 64];
        compact[..32].copy_from_slice(&self.r);
        compact[32..].copy_from_slice(&self.s);
        compact
    }

    pub fn is_low_s(&self) -> bool {
        self.s <= HALF_CURVE_ORDER
    }

    /// Replace `s` with `N - s` when `s > N/2`
    pub fn normalize_s(self, rec: &mut dyn Recorder) -> Self {
        if self.is_low_s() {
            return self;
        }

        let s = subtract_from_order(&self.s);
        record(rec, || {
            Entry::replace("s value", "N - s (s value too big)").with_result(hex::encode(s))
        });
        Self { r: self.r, s }
    }

    /// DER encoding (without the sighash byte)
    pub fn to_der(&self, rec: &mut dyn Recorder) -> Result<Vec<u8>, KeyError> {
        let signature = Signature::from_compact(&self.to_compact())?;
        let der = signature.serialize_der().to_vec();
        record(rec, || Entry::encode("DER", "signature").with_result(hex::encode(&der)));
        Ok(der)
    }

    /// DER encoding followed by the SIGHASH_ALL byte, as pushed in a scriptSig
    pub fn to_script_bytes(&self, rec: &mut dyn Recorder) -> Result<Vec<u8>, KeyError> {
        let mut bytes = self.to_der(rec)?;
        bytes.push(SIGHASH_ALL);
        record(rec, || {
            Entry::append("one byte hash code", "DER encoded signature")
                .with_result(hex::encode(&bytes))
        });
        Ok(bytes)
    }
}

/// N - value for a big-endian 256-bit value
fn subtract_from_order(value: &[u8; 32]) -> [u8; 32] {
    let mut result = [0u8; 32];
    let mut borrow = 0i16;
    for i in (0..32).rev() {
        let mut diff = i16::from(CURVE_ORDER[i]) - i16::from(value[i]) - borrow;
        if diff < 0 {
            diff += 256;
            borrow = 1;
        } else {
            borrow = 0;
        }
        result[i] = diff as u8;
    }
    result
}

// =============================================================================
// Public Keys
// =============================================================================

/// Compress a 65-byte uncompressed public key given as hex
///
/// The prefix byte is dropped, X and Y split, and the parity of Y's final
/// hex digit picks `02` (even) or `03` (odd).
pub fn compress_public_key(uncompressed_hex: &str, rec: &mut dyn Recorder) -> Result<String, KeyError> {
    if uncompressed_hex.len() != 130 || !uncompressed_hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(KeyError::InvalidPublicKey);
    }

    let mut scope = Scope::open(rec, || Entry::convert("public key", "compressed form"));

    let stripped = &uncompressed_hex[2..];
    record(&mut scope, || Entry::step("Remove prefix byte").with_result(stripped));

    let (x, y) = stripped.split_at(64);
    record(&mut scope, || {
        Entry::step("Split into X and Y coordinates").with_results([x, y])
    });

    let last_nibble = y
        .chars()
        .last()
        .and_then(|c| c.to_digit(16))
        .ok_or(KeyError::InvalidPublicKey)?;
    let prefix = if last_nibble % 2 == 0 { "02" } else { "03" };
    record(&mut scope, || {
        Entry::step(format!("Pick prefix from parity of Y ({})", last_nibble)).with_result(prefix)
    });

    let compressed = format!("{}{}", prefix, x.to_lowercase());
    scope.close([compressed.as_str()]);
    Ok(compressed)
}

/// Parse a public key from hex string
pub fn public_key_from_hex(hex_key: &str) -> Result<PublicKey, KeyError> {
    let bytes = hex::decode(hex_key).map_err(|_| KeyError::InvalidPublicKey)?;
    PublicKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPublicKey)
}

/// Verify a DER signature over a digest
pub fn verify_signature(
    public_key: &PublicKey,
    digest: &[u8; 32],
    der_signature: &[u8],
) -> Result<bool, KeyError> {
    let secp = Secp256k1::verification_only();
    let message = Message::from_digest(*digest);
    let signature = Signature::from_der(der_signature)?;

    match secp.verify_ecdsa(&message, &signature, public_key) {
        Ok(()) => Ok(true),
        Err(_) => Ok(false),
    }
}
