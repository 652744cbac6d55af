//! Base58 and Base58Check encoding
//!
//! Decoding deliberately does not verify the checksum: callers slice the
//! payload at fixed offsets and validate lengths themselves.
//! `verify_base58_check` is the strict variant for inspection tools.

use super::hash::checksum;
use super::keys::KeyError;
use crate::provenance::{record, Entry, Recorder};

/// Decode a Base58 string to raw bytes (version, payload and checksum included)
pub fn base58_check_decode(encoded: &str, rec: &mut dyn Recorder) -> Result<Vec<u8>, KeyError> {
    let decoded = bs58::decode(encoded)
        .with_alphabet(bs58::Alphabet::BITCOIN)
        .into_vec()
        .map_err(|e| KeyError::InvalidInputFormat(format!("invalid base58 '{}': {}", encoded, e)))?;

    record(rec, || {
        Entry::decode("Base58", encoded).with_result(hex::encode(&decoded))
    });
    Ok(decoded)
}

/// Append the 4-byte double SHA-256 checksum and Base58 encode
pub fn base58_check_encode(payload: &[u8], rec: &mut dyn Recorder) -> String {
    let check = checksum(payload);
    let mut data = payload.to_vec();
    data.extend_from_slice(&check);
    let encoded = bs58::encode(&data)
        .with_alphabet(bs58::Alphabet::BITCOIN)
        .into_string();

    record(rec, || {
        let mut entry = Entry::encode("Base58Check", hex::encode(payload)).with_result(&encoded);
        entry.children.push(
            Entry::hash("double SHA256", hex::encode(payload)).with_result(hex::encode(check)),
        );
        entry.children.push(Entry::append("checksum", "payload").with_result(hex::encode(&data)));
        entry
    });
    encoded
}

/// Decode and check the trailing checksum, returning the payload without it
pub fn verify_base58_check(encoded: &str) -> Result<Vec<u8>, KeyError> {
    let decoded = bs58::decode(encoded)
        .with_alphabet(bs58::Alphabet::BITCOIN)
        .into_vec()
        .map_err(|e| KeyError::InvalidInputFormat(format!("invalid base58 '{}': {}", encoded, e)))?;
    if decoded.len() < 4 {
        return Err(KeyError::InvalidInputFormat(format!(
            "'{}' is too short to carry a checksum",
            encoded
        )));
    }

    let (payload, check) = decoded.split_at(decoded.len() - 4);
    if checksum(payload) != check {
        return Err(KeyError::ChecksumMismatch);
    }
    Ok(payload.to_vec())
}

/// Whether every character belongs to the Bitcoin Base58 alphabet
pub fn is_base58(s: &str) -> bool {
    s.bytes().all(|b| {
        matches!(b, b'1'..=b'9' | b'A'..=b'H' | b'J'..=b'N' | b'P'..=b'Z' | b'a'..=b'k' | b'm'..=b'z')
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provenance::NoopRecorder;

    #[test]
    fn test_encode_known_vector() {
        let mut payload = vec![0x00];
        payload.extend_from_slice(&[0u8; 20]);
        assert_eq!(
            base58_check_encode(&payload, &mut NoopRecorder),
            "1111111111111111111114oLvT2"
        );
    }

    #[test]
    fn test_decode_keeps_checksum() {
        let decoded =
            base58_check_decode("mjUDEsMXuYFZSrERVZjzHpznNJFzNUBoop", &mut NoopRecorder).unwrap();
        assert_eq!(
            hex::encode(decoded),
            "6f2b5bbb1454f10413fd27ebd05bf6782bbffeec95a45f49b3"
        );
    }

    #[test]
    fn test_decode_rejects_bad_alphabet() {
        let err = base58_check_decode("0OIl", &mut NoopRecorder).unwrap_err();
        assert!(matches!(err, KeyError::InvalidInputFormat(_)));
    }

    #[test]
    fn test_decode_does_not_verify_checksum() {
        // Last character altered: the checksum no longer matches
        let tampered = "mjUDEsMXuYFZSrERVZjzHpznNJFzNUBooq";
        assert!(base58_check_decode(tampered, &mut NoopRecorder).is_ok());
        assert!(matches!(
            verify_base58_check(tampered),
            Err(KeyError::ChecksumMismatch)
        ));
    }

    #[test]
    fn test_verify_strips_checksum() {
        let payload = verify_base58_check("mjUDEsMXuYFZSrERVZjzHpznNJFzNUBoop").unwrap();
        assert_eq!(
            hex::encode(payload),
            "6f2b5bbb1454f10413fd27ebd05bf6782bbffeec95"
        );
    }

    #[test]
    fn test_is_base58() {
        assert!(is_base58("mjUDEsMXuYFZSrERVZjzHpznNJFzNUBoop"));
        assert!(!is_base58("0abc"));
        assert!(!is_base58("abcl"));
    }

    #[test]
    fn test_encode_records_nested_steps() {
        let mut entries: Vec<Entry> = Vec::new();
        let encoded = base58_check_encode(&[0x6f; 21], &mut entries);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].results, vec![encoded]);
        assert_eq!(entries[0].children.len(), 2);
    }
}
