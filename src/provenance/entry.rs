//! Provenance records
//!
//! A record describes one derivation step: what was done (the action), the
//! values it produced, and the finer-grained steps it was composed of.

use serde::Serialize;

// =============================================================================
// Actions
// =============================================================================

/// What a single derivation step did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    /// A value was appended to a field or script
    Append { item: String, destination: String },
    /// A value was re-encoded (endianness, width, compression)
    Convert { subject: String, target: String },
    /// A digest was computed
    Hash { algorithm: String, subject: String },
    /// A value was encoded (Base58, DER)
    Encode { scheme: String, subject: String },
    /// A value was decoded (Base58, WIF)
    Decode { scheme: String, subject: String },
    /// A field value was swapped for another
    Replace { original: String, substitute: String },
    /// A digest was signed
    Sign { subject: String },
    /// Free-form step
    Step { description: String },
}

impl Action {
    /// Verb naming the kind of step
    pub fn verb(&self) -> &'static str {
        match self {
            Action::Append { .. } => "Append",
            Action::Convert { .. } => "Convert",
            Action::Hash { .. } => "Hash",
            Action::Encode { .. } => "Encode",
            Action::Decode { .. } => "Decode",
            Action::Replace { .. } => "Replace",
            Action::Sign { .. } => "Sign",
            Action::Step { .. } => "Step",
        }
    }

    /// What the verb was applied to
    pub fn object(&self) -> String {
        match self {
            Action::Append { item, destination } => format!("{} to {}", item, destination),
            Action::Convert { subject, target } => format!("{} to {}", subject, target),
            Action::Hash { algorithm, subject } => format!("{} with {}", subject, algorithm),
            Action::Encode { scheme, subject } => format!("{} as {}", subject, scheme),
            Action::Decode { scheme, subject } => format!("{} from {}", subject, scheme),
            Action::Replace {
                original,
                substitute,
            } => format!("{} with {}", original, substitute),
            Action::Sign { subject } => subject.clone(),
            Action::Step { description } => description.clone(),
        }
    }
}

// =============================================================================
// Entries
// =============================================================================

/// One node of the provenance tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    #[serde(flatten)]
    pub action: Action,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Entry>,
}

impl Entry {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            results: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn append(item: impl Into<String>, destination: impl Into<String>) -> Self {
        Self::new(Action::Append {
            item: item.into(),
            destination: destination.into(),
        })
    }

    pub fn convert(subject: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(Action::Convert {
            subject: subject.into(),
            target: target.into(),
        })
    }

    pub fn hash(algorithm: impl Into<String>, subject: impl Into<String>) -> Self {
        Self::new(Action::Hash {
            algorithm: algorithm.into(),
            subject: subject.into(),
        })
    }

    pub fn encode(scheme: impl Into<String>, subject: impl Into<String>) -> Self {
        Self::new(Action::Encode {
            scheme: scheme.into(),
            subject: subject.into(),
        })
    }

    pub fn decode(scheme: impl Into<String>, subject: impl Into<String>) -> Self {
        Self::new(Action::Decode {
            scheme: scheme.into(),
            subject: subject.into(),
        })
    }

    pub fn replace(original: impl Into<String>, substitute: impl Into<String>) -> Self {
        Self::new(Action::Replace {
            original: original.into(),
            substitute: substitute.into(),
        })
    }

    pub fn sign(subject: impl Into<String>) -> Self {
        Self::new(Action::Sign {
            subject: subject.into(),
        })
    }

    pub fn step(description: impl Into<String>) -> Self {
        Self::new(Action::Step {
            description: description.into(),
        })
    }

    /// Attach a produced value
    pub fn with_result(mut self, result: impl Into<String>) -> Self {
        self.results.push(result.into());
        self
    }

    /// Attach several produced values
    pub fn with_results<I, S>(mut self, results: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.results.extend(results.into_iter().map(Into::into));
        self
    }

    /// "Verb object" summary line
    pub fn describe(&self) -> String {
        format!("{} {}", self.action.verb(), self.action.object())
    }

    /// Number of entries in this subtree, including this one
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(Entry::count).sum::<usize>()
    }
}

// =============================================================================
// Recorders
// =============================================================================

/// Destination for provenance entries
///
/// Recording is observational only: no recorder can influence the bytes
/// computed by the operation being recorded.
pub trait Recorder {
    fn record(&mut self, entry: Entry);

    /// `false` lets callers skip building entries nobody will read
    fn is_recording(&self) -> bool {
        true
    }
}

/// Discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRecorder;

impl Recorder for NoopRecorder {
    fn record(&mut self, _entry: Entry) {}

    fn is_recording(&self) -> bool {
        false
    }
}

impl Recorder for Vec<Entry> {
    fn record(&mut self, entry: Entry) {
        self.push(entry);
    }
}

impl Recorder for Entry {
    fn record(&mut self, entry: Entry) {
        self.children.push(entry);
    }
}

/// Record an entry, building it only if the recorder keeps it
pub fn record(rec: &mut dyn Recorder, build: impl FnOnce() -> Entry) {
    if rec.is_recording() {
        rec.record(build());
    }
}

/// A compound step whose sub-steps are nested under one entry
///
/// Sub-steps record into the scope; `close` attaches the results and hands
/// the finished entry to the parent recorder.
pub struct Scope<'a> {
    parent: &'a mut dyn Recorder,
    entry: Option<Entry>,
}

impl<'a> Scope<'a> {
    pub fn open(parent: &'a mut dyn Recorder, build: impl FnOnce() -> Entry) -> Self {
        let entry = if parent.is_recording() {
            Some(build())
        } else {
            None
        };
        Self { parent, entry }
    }

    pub fn close<I, S>(self, results: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Some(entry) = self.entry {
            self.parent.record(entry.with_results(results));
        }
    }
}

impl Recorder for Scope<'_> {
    fn record(&mut self, entry: Entry) {
        if let Some(parent) = self.entry.as_mut() {
            parent.children.push(entry);
        }
    }

    fn is_recording(&self) -> bool {
        self.entry.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe() {
        let entry = Entry::append("version code", "transaction").with_result("01000000");
        assert_eq!(entry.describe(), "Append version code to transaction");
        assert_eq!(entry.results, vec!["01000000".to_string()]);
        assert_eq!(entry.action.verb(), "Append");
    }

    #[test]
    fn test_noop_skips_building() {
        let mut rec = NoopRecorder;
        let mut built = false;
        record(&mut rec, || {
            built = true;
            Entry::step("never")
        });
        assert!(!built);
    }

    #[test]
    fn test_scope_nests_children() {
        let mut entries: Vec<Entry> = Vec::new();
        {
            let mut scope = Scope::open(&mut entries, || Entry::convert("pubkey", "compressed"));
            record(&mut scope, || Entry::step("strip prefix"));
            record(&mut scope, || Entry::step("pick parity"));
            scope.close(["02ab"]);
        }
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].children.len(), 2);
        assert_eq!(entries[0].results, vec!["02ab".to_string()]);
        assert_eq!(entries[0].count(), 3);
    }

    #[test]
    fn test_scope_under_noop_is_silent() {
        let mut rec = NoopRecorder;
        let mut scope = Scope::open(&mut rec, || Entry::step("outer"));
        assert!(!scope.is_recording());
        scope.record(Entry::step("inner"));
        scope.close(Vec::<String>::new());
    }

    #[test]
    fn test_serialize_tagged() {
        let entry = Entry::hash("SHA256", "raw transaction").with_result("ab");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["kind"], "hash");
        assert_eq!(json["algorithm"], "SHA256");
        assert_eq!(json["results"][0], "ab");
        assert!(json.get("children").is_none());
    }
}
