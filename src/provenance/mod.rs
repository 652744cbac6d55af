//! Provenance logging
//!
//! An optional derivation trail recorded alongside a transaction build:
//! - Tagged entries (append, convert, hash, encode, decode, replace, sign)
//! - Nested scopes for compound steps
//! - A field-keyed log mirroring the transaction layout
//!
//! Recording never alters the bytes being computed.

pub mod entry;
pub mod trail;

pub use entry::{record, Action, Entry, NoopRecorder, Recorder, Scope};
pub use trail::{ProvenanceLog, Section};
