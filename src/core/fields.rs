//! Ordered field sequences
//!
//! A transaction is laid out as named fields in wire order. Each field holds
//! a list of segments, and a segment is either raw bytes or a nested
//! sequence (one per input or output). Serializing walks the tree
//! depth-first in key order.

use thiserror::Error;

/// Field lookup errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("Missing field: {0}")]
    MissingField(String),
}

/// One element of a field's value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Bytes(Vec<u8>),
    Fields(FieldSequence),
}

impl Segment {
    fn collect_leaves<'a>(&'a self, leaves: &mut Vec<&'a [u8]>) {
        match self {
            Segment::Bytes(bytes) => leaves.push(bytes),
            Segment::Fields(fields) => {
                for (_, segments) in &fields.fields {
                    for segment in segments {
                        segment.collect_leaves(leaves);
                    }
                }
            }
        }
    }

    pub fn as_fields(&self) -> Option<&FieldSequence> {
        match self {
            Segment::Fields(fields) => Some(fields),
            Segment::Bytes(_) => None,
        }
    }
}

impl From<Vec<u8>> for Segment {
    fn from(bytes: Vec<u8>) -> Self {
        Segment::Bytes(bytes)
    }
}

impl From<&[u8]> for Segment {
    fn from(bytes: &[u8]) -> Self {
        Segment::Bytes(bytes.to_vec())
    }
}

impl From<FieldSequence> for Segment {
    fn from(fields: FieldSequence) -> Self {
        Segment::Fields(fields)
    }
}

/// Insertion-ordered map of field name to segments
///
/// `Clone` is a deep copy: nested sequences are owned, never shared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSequence {
    fields: Vec<(String, Vec<Segment>)>,
}

impl FieldSequence {
    /// Create a sequence with the given keys, all empty
    pub fn new(keys: &[&str]) -> Self {
        Self {
            fields: keys.iter().map(|k| (k.to_string(), Vec::new())).collect(),
        }
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.fields.iter().position(|(k, _)| k == key)
    }

    /// Append a segment to a field, adding the field at the end if unknown
    pub fn append(&mut self, key: &str, segment: impl Into<Segment>) {
        let segment = segment.into();
        match self.position(key) {
            Some(i) => self.fields[i].1.push(segment),
            None => self.fields.push((key.to_string(), vec![segment])),
        }
    }

    pub fn get(&self, key: &str) -> Result<&[Segment], FieldError> {
        self.position(key)
            .map(|i| self.fields[i].1.as_slice())
            .ok_or_else(|| FieldError::MissingField(key.to_string()))
    }

    pub fn get_mut(&mut self, key: &str) -> Result<&mut Vec<Segment>, FieldError> {
        match self.position(key) {
            Some(i) => Ok(&mut self.fields[i].1),
            None => Err(FieldError::MissingField(key.to_string())),
        }
    }

    /// Replace a field's value in place, or add the field at the end
    pub fn set(&mut self, key: &str, segments: Vec<Segment>) {
        match self.position(key) {
            Some(i) => self.fields[i].1 = segments,
            None => self.fields.push((key.to_string(), segments)),
        }
    }

    /// Remove a field and return its value
    pub fn remove(&mut self, key: &str) -> Result<Vec<Segment>, FieldError> {
        match self.position(key) {
            Some(i) => Ok(self.fields.remove(i).1),
            None => Err(FieldError::MissingField(key.to_string())),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    /// Every leaf byte string, depth-first in key order
    pub fn flatten(&self) -> Vec<&[u8]> {
        let mut leaves = Vec::new();
        for (_, segments) in &self.fields {
            for segment in segments {
                segment.collect_leaves(&mut leaves);
            }
        }
        leaves
    }

    /// Flattened leaves of a single field
    pub fn flatten_field(&self, key: &str) -> Result<Vec<u8>, FieldError> {
        let mut leaves = Vec::new();
        for segment in self.get(key)? {
            segment.collect_leaves(&mut leaves);
        }
        Ok(leaves.concat())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.flatten().concat()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub fn len_bytes(&self) -> usize {
        self.flatten().iter().map(|leaf| leaf.len()).sum()
    }

    /// Each field's flattened value as lowercase hex, joined by `delimiter`
    pub fn join(&self, delimiter: &str) -> String {
        self.fields
            .iter()
            .map(|(_, segments)| {
                let mut leaves = Vec::new();
                for segment in segments {
                    segment.collect_leaves(&mut leaves);
                }
                hex::encode(leaves.concat())
            })
            .collect::<Vec<_>>()
            .join(delimiter)
    }
}
