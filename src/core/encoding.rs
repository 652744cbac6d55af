//! Wire encoding helpers that record what they do
//!
//! Legacy transactions in this crate only use fixed-width little-endian
//! integers and single-byte counts/lengths.

use crate::provenance::{record, Entry, Recorder};

/// Largest count or length a single byte may carry (0xfd.. start a varint)
pub const MAX_SINGLE_BYTE_COUNT: usize = 0xfc;

fn record_le(value: u64, bytes: Vec<u8>, label: &str, rec: &mut dyn Recorder) -> Vec<u8> {
    record(rec, || {
        Entry::convert(
            format!("{} {}", label, value),
            format!("{} bytes little endian", bytes.len()),
        )
        .with_result(hex::encode(&bytes))
    });
    bytes
}

/// 4-byte little-endian encoding (version, output index, sequence, locktime)
pub fn u32_le(value: u32, label: &str, rec: &mut dyn Recorder) -> Vec<u8> {
    record_le(u64::from(value), value.to_le_bytes().to_vec(), label, rec)
}

/// 8-byte little-endian encoding (amounts)
pub fn u64_le(value: u64, label: &str, rec: &mut dyn Recorder) -> Vec<u8> {
    record_le(value, value.to_le_bytes().to_vec(), label, rec)
}

/// Reverse byte order (display order hashes to wire order)
pub fn reverse_bytes(bytes: &[u8], label: &str, rec: &mut dyn Recorder) -> Vec<u8> {
    let reversed: Vec<u8> = bytes.iter().rev().copied().collect();
    record(rec, || {
        Entry::convert(label, "little endian").with_result(hex::encode(&reversed))
    });
    reversed
}

/// A count or length as one byte, `None` if it needs a varint
pub fn single_byte_count(count: usize, label: &str, rec: &mut dyn Recorder) -> Option<u8> {
    if count > MAX_SINGLE_BYTE_COUNT {
        return None;
    }
    let byte = count as u8;
    record(rec, || {
        Entry::convert(format!("{} {}", label, count), "1 byte hex")
            .with_result(format!("{:02x}", byte))
    });
    Some(byte)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provenance::NoopRecorder;

    #[test]
    fn test_fixed_width_le() {
        assert_eq!(
            hex::encode(u64_le(10_000_000, "amount", &mut NoopRecorder)),
            "8096980000000000"
        );
        assert_eq!(hex::encode(u32_le(1, "index", &mut NoopRecorder)), "01000000");
        assert_eq!(hex::encode(u32_le(u32::MAX, "sequence", &mut NoopRecorder)), "ffffffff");
    }

    #[test]
    fn test_le_records_width() {
        let mut entries: Vec<Entry> = Vec::new();
        u32_le(7, "index", &mut entries);
        u64_le(7, "amount", &mut entries);
        assert_eq!(entries[0].describe(), "Convert index 7 to 4 bytes little endian");
        assert_eq!(entries[1].describe(), "Convert amount 7 to 8 bytes little endian");
    }

    #[test]
    fn test_reverse_bytes() {
        let mut entries: Vec<Entry> = Vec::new();
        assert_eq!(reverse_bytes(&[1, 2, 3], "hash", &mut entries), vec![3, 2, 1]);
        assert_eq!(entries[0].describe(), "Convert hash to little endian");
    }

    #[test]
    fn test_single_byte_count_bounds() {
        assert_eq!(single_byte_count(0, "n", &mut NoopRecorder), Some(0));
        assert_eq!(single_byte_count(252, "n", &mut NoopRecorder), Some(0xfc));
        assert_eq!(single_byte_count(253, "n", &mut NoopRecorder), None);
    }
}
