//! Field-keyed provenance accumulator
//!
//! Entries are grouped under the transaction field they helped produce, so
//! the log has the same top-level shape as the field sequence being built.

use super::entry::{Entry, NoopRecorder, Recorder};
use serde::Serialize;
use std::fmt;

/// Entries recorded for one transaction field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub field: String,
    pub entries: Vec<Entry>,
}

/// Provenance trail for one transaction build
///
/// A disabled log accepts every call and keeps nothing.
#[derive(Debug, Clone, Serialize)]
pub struct ProvenanceLog {
    #[serde(skip)]
    enabled: bool,
    sections: Vec<Section>,
    #[serde(skip)]
    noop: NoopRecorder,
}

impl ProvenanceLog {
    /// Create an enabled log with sections pre-declared in order
    pub fn new(fields: &[&str]) -> Self {
        Self {
            enabled: true,
            sections: fields
                .iter()
                .map(|field| Section {
                    field: field.to_string(),
                    entries: Vec::new(),
                })
                .collect(),
            noop: NoopRecorder,
        }
    }

    /// Create a log that records nothing
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            sections: Vec::new(),
            noop: NoopRecorder,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Recorder for a field; unknown fields are appended as new sections
    pub fn section(&mut self, field: &str) -> &mut dyn Recorder {
        if !self.enabled {
            return &mut self.noop;
        }

        let index = match self.sections.iter().position(|s| s.field == field) {
            Some(index) => index,
            None => {
                self.sections.push(Section {
                    field: field.to_string(),
                    entries: Vec::new(),
                });
                self.sections.len() - 1
            }
        };
        &mut self.sections[index].entries
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Entries recorded under a field
    pub fn entries(&self, field: &str) -> Option<&[Entry]> {
        self.sections
            .iter()
            .find(|s| s.field == field)
            .map(|s| s.entries.as_slice())
    }

    /// Total number of entries at every depth
    pub fn len(&self) -> usize {
        self.sections
            .iter()
            .flat_map(|s| s.entries.iter())
            .map(Entry::count)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.sections)
    }
}

impl Default for ProvenanceLog {
    fn default() -> Self {
        Self::disabled()
    }
}

fn write_entry(f: &mut fmt::Formatter<'_>, entry: &Entry, depth: usize) -> fmt::Result {
    let indent = "  ".repeat(depth);
    if entry.results.is_empty() {
        writeln!(f, "{}- {}", indent, entry.describe())?;
    } else {
        writeln!(
            f,
            "{}- {} -> {}",
            indent,
            entry.describe(),
            entry.results.join(", ")
        )?;
    }
    for child in &entry.children {
        write_entry(f, child, depth + 1)?;
    }
    Ok(())
}

impl fmt::Display for ProvenanceLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for section in &self.sections {
            writeln!(f, "{}:", section.field)?;
            for entry in &section.entries {
                write_entry(f, entry, 1)?;
            }
        }
        Ok(())
    }
}
