//! Key and address codec
//!
//! This module provides:
//! - SHA-256 / RIPEMD-160 hashing
//! - Base58Check encoding
//! - Private key parsing (decimal, hex, WIF) and ECDSA signing (secp256k1)
//! - Public key compression and address derivation

pub mod address;
pub mod base58;
pub mod hash;
pub mod keys;

pub use address::{
    address_from_hash, address_hash, classify_address, classify_address_network, derive_address,
    private_key_to_address, version_byte, AddressType, Network,
};
pub use base58::{base58_check_decode, base58_check_encode, verify_base58_check};
pub use hash::{double_sha256, double_sha256_hex, hash160, ripemd160, sha256, sha256_hex};
pub use keys::{
    classify_private_key, compress_public_key, decode_private_key, decode_wif_private_key,
    public_key_from_hex, verify_signature, EcdsaSignature, KeyError, KeyFormat, PrivateKey,
    CURVE_ORDER, HALF_CURVE_ORDER, SIGHASH_ALL,
};
