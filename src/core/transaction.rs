//! Legacy transaction assembly and signing
//!
//! A transaction moves strictly forward through three types:
//! - [`TransactionBuilder`] collects contributions and payments
//! - [`UnsignedTransaction`] holds the raw field layout, including the
//!   temporary `hash code type` suffix used for signature hashes
//! - [`SignedTransaction`] holds the final layout ready to broadcast
//!
//! Every input is signed with SIGHASH_ALL over a view in which only that
//! input carries its previous output script.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::encoding::{reverse_bytes, single_byte_count, u32_le, u64_le};
use super::fields::{FieldError, FieldSequence, Segment};
use super::script::{create_script, ScriptError};
use crate::crypto::address::Network;
use crate::crypto::hash::double_sha256;
use crate::crypto::keys::{KeyError, PrivateKey};
use crate::provenance::{record, Entry, ProvenanceLog, Recorder, Scope};
use crate::services::{ChainService, ServiceError, ServiceResponse};

// =============================================================================
// Constants
// =============================================================================

/// Transaction version 1, little endian
pub const VERSION: [u8; 4] = [0x01, 0x00, 0x00, 0x00];

/// Sequence number that disables locktime and replacement
pub const SEQUENCE_FINAL: [u8; 4] = [0xff, 0xff, 0xff, 0xff];

pub const LOCK_TIME: [u8; 4] = [0x00, 0x00, 0x00, 0x00];

/// SIGHASH_ALL as the 4-byte suffix of the signature preimage
pub const HASH_CODE_TYPE: [u8; 4] = [0x01, 0x00, 0x00, 0x00];

// Field names, in wire order
pub const FIELD_VERSION_CODE: &str = "version code";
pub const FIELD_INPUT_COUNT: &str = "input count";
pub const FIELD_INPUTS: &str = "inputs";
pub const FIELD_OUTPUT_COUNT: &str = "output count";
pub const FIELD_OUTPUTS: &str = "outputs";
pub const FIELD_LOCK_TIME: &str = "lock time";
pub const FIELD_HASH_CODE_TYPE: &str = "hash code type";

pub const FIELD_TRANSACTION_HASH: &str = "transaction hash";
pub const FIELD_TRANSACTION_INDEX: &str = "transaction index";
pub const FIELD_SCRIPT_LENGTH: &str = "scriptPubKey length";
pub const FIELD_SCRIPT: &str = "scriptPubKey";
pub const FIELD_SEQUENCE: &str = "sequence";

pub const FIELD_AMOUNT: &str = "transaction amount";
pub const FIELD_OUTPUT_SCRIPT_LENGTH: &str = "output script length";
pub const FIELD_OUTPUT_SCRIPT: &str = "output script";

/// Provenance section for per-input signing steps
pub const SECTION_SIGNED_INPUTS: &str = "signed inputs";

pub const TRANSACTION_FIELDS: [&str; 7] = [
    FIELD_VERSION_CODE,
    FIELD_INPUT_COUNT,
    FIELD_INPUTS,
    FIELD_OUTPUT_COUNT,
    FIELD_OUTPUTS,
    FIELD_LOCK_TIME,
    FIELD_HASH_CODE_TYPE,
];

pub const INPUT_FIELDS: [&str; 5] = [
    FIELD_TRANSACTION_HASH,
    FIELD_TRANSACTION_INDEX,
    FIELD_SCRIPT_LENGTH,
    FIELD_SCRIPT,
    FIELD_SEQUENCE,
];

pub const OUTPUT_FIELDS: [&str; 3] = [FIELD_AMOUNT, FIELD_OUTPUT_SCRIPT_LENGTH, FIELD_OUTPUT_SCRIPT];

// =============================================================================
// Error Types
// =============================================================================

/// Transaction-related errors
#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("{field} of {count} does not fit in a single byte")]
    CountOutOfRange { field: &'static str, count: usize },
    #[error("Expected one private key per contribution: {expected} contributions, {actual} keys")]
    KeyCountMismatch { expected: usize, actual: usize },
    #[error("Invalid transaction hash: {0}")]
    InvalidTransactionHash(String),
    #[error("{what} is {length} bytes, too long for a single-byte length")]
    ScriptTooLong { what: String, length: usize },
    #[error("No input at index {0}")]
    InputOutOfRange(usize),
    #[error("Total {0} amount overflows 64 bits")]
    AmountOverflow(&'static str),
    #[error("Field error: {0}")]
    Field(#[from] FieldError),
    #[error("Script error: {0}")]
    Script(#[from] ScriptError),
    #[error("Crypto error: {0}")]
    CryptoError(#[from] KeyError),
}

// =============================================================================
// Transaction Output
// =============================================================================

/// A previous output that can be spent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionOutput {
    pub output_index: u32,
    /// Locking script as hex
    pub script_pub_key: String,
    /// Value in satoshis
    pub amount: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl TransactionOutput {
    pub fn new(output_index: u32, script_pub_key: &str, amount: u64) -> Self {
        Self {
            output_index,
            script_pub_key: script_pub_key.to_string(),
            amount,
            address: None,
        }
    }

    pub fn with_address(mut self, address: &str) -> Self {
        self.address = Some(address.to_string());
        self
    }
}

/// A previous output selected as an input: `(tx_hash, output_index)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contribution {
    /// Hash of the funding transaction, in display (big-endian) order
    pub tx_hash: String,
    pub output: TransactionOutput,
}

impl Contribution {
    pub fn new(tx_hash: &str, output: TransactionOutput) -> Self {
        Self {
            tx_hash: tx_hash.to_string(),
            output,
        }
    }

    pub fn outpoint(&self) -> (&str, u32) {
        (&self.tx_hash, self.output.output_index)
    }

    pub fn amount(&self) -> u64 {
        self.output.amount
    }
}

/// An amount sent to an address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub to_address: String,
    /// Value in satoshis
    pub amount: u64,
}

impl Payment {
    pub fn new(to_address: &str, amount: u64) -> Self {
        Self {
            to_address: to_address.to_string(),
            amount,
        }
    }
}

// =============================================================================
// Transaction (lookup result)
// =============================================================================

/// A confirmed transaction and its spendable outputs, as returned by a chain service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub tx_hash: String,
    pub outputs: BTreeMap<u32, TransactionOutput>,
}

impl Transaction {
    pub fn new(tx_hash: &str) -> Self {
        Self {
            tx_hash: tx_hash.to_string(),
            outputs: BTreeMap::new(),
        }
    }

    pub fn add_output(&mut self, output: TransactionOutput) {
        self.outputs.insert(output.output_index, output);
    }

    pub fn contribution(&self, output_index: u32) -> Option<Contribution> {
        self.outputs
            .get(&output_index)
            .map(|output| Contribution::new(&self.tx_hash, output.clone()))
    }

    /// Every output as a contribution, by ascending output index
    pub fn contributions(&self) -> Vec<Contribution> {
        self.outputs
            .values()
            .map(|output| Contribution::new(&self.tx_hash, output.clone()))
            .collect()
    }

    /// Sum of the output amounts, `None` on overflow
    pub fn total_amount(&self) -> Option<u64> {
        checked_total(self.outputs.values().map(|o| o.amount))
    }
}

/// Overflow-checked sum of satoshi amounts
pub fn checked_total(amounts: impl IntoIterator<Item = u64>) -> Option<u64> {
    amounts
        .into_iter()
        .try_fold(0u64, |total, amount| total.checked_add(amount))
}

// =============================================================================
// Encoding Helpers
// =============================================================================

fn decode_tx_hash(tx_hash: &str) -> Result<Vec<u8>, TransactionError> {
    match hex::decode(tx_hash) {
        Ok(bytes) if bytes.len() == 32 => Ok(bytes),
        _ => Err(TransactionError::InvalidTransactionHash(tx_hash.to_string())),
    }
}

fn decode_script(script_hex: &str) -> Result<Vec<u8>, TransactionError> {
    hex::decode(script_hex).map_err(|_| {
        ScriptError::InvalidScriptFormat(format!("'{}' is not valid hex", script_hex)).into()
    })
}

/// Single-byte length prefix for a script or push
fn length_byte(data: &[u8], what: &str, rec: &mut dyn Recorder) -> Result<u8, TransactionError> {
    single_byte_count(data.len(), &format!("{} length", what), rec).ok_or_else(|| {
        TransactionError::ScriptTooLong {
            what: what.to_string(),
            length: data.len(),
        }
    })
}

fn count_byte(
    count: usize,
    field: &'static str,
    rec: &mut dyn Recorder,
) -> Result<u8, TransactionError> {
    single_byte_count(count, field, rec).ok_or(TransactionError::CountOutOfRange { field, count })
}

fn raw_input(contribution: &Contribution, rec: &mut dyn Recorder) -> Result<FieldSequence, TransactionError> {
    let mut input = FieldSequence::new(&INPUT_FIELDS);

    let hash = decode_tx_hash(&contribution.tx_hash)?;
    input.append(FIELD_TRANSACTION_HASH, reverse_bytes(&hash, FIELD_TRANSACTION_HASH, rec));

    let index = u32_le(contribution.output.output_index, FIELD_TRANSACTION_INDEX, rec);
    input.append(FIELD_TRANSACTION_INDEX, index);

    let script = decode_script(&contribution.output.script_pub_key)?;
    input.append(FIELD_SCRIPT_LENGTH, vec![length_byte(&script, FIELD_SCRIPT, rec)?]);
    record(rec, || {
        Entry::append(FIELD_SCRIPT, "input").with_result(&contribution.output.script_pub_key)
    });
    input.append(FIELD_SCRIPT, script);

    record(rec, || Entry::append(FIELD_SEQUENCE, "input").with_result(hex::encode(SEQUENCE_FINAL)));
    input.append(FIELD_SEQUENCE, SEQUENCE_FINAL.to_vec());

    Ok(input)
}

fn raw_output(payment: &Payment, rec: &mut dyn Recorder) -> Result<FieldSequence, TransactionError> {
    let mut output = FieldSequence::new(&OUTPUT_FIELDS);

    output.append(FIELD_AMOUNT, u64_le(payment.amount, FIELD_AMOUNT, rec));

    let script = create_script(&payment.to_address, rec)?;
    output.append(
        FIELD_OUTPUT_SCRIPT_LENGTH,
        vec![length_byte(&script, FIELD_OUTPUT_SCRIPT, rec)?],
    );
    output.append(FIELD_OUTPUT_SCRIPT, script);

    Ok(output)
}

/// Assemble the unsigned field layout
///
/// Each input carries the script of the output it spends; the layout ends
/// with the `hash code type` suffix so it can be hashed for signing as is.
pub fn create_raw_transaction(
    contributions: &[Contribution],
    payments: &[Payment],
    log: &mut ProvenanceLog,
) -> Result<FieldSequence, TransactionError> {
    let mut fields = FieldSequence::new(&TRANSACTION_FIELDS);

    record(log.section(FIELD_VERSION_CODE), || {
        Entry::append(FIELD_VERSION_CODE, "transaction").with_result(hex::encode(VERSION))
    });
    fields.append(FIELD_VERSION_CODE, VERSION.to_vec());

    let input_count = count_byte(contributions.len(), FIELD_INPUT_COUNT, log.section(FIELD_INPUT_COUNT))?;
    fields.append(FIELD_INPUT_COUNT, vec![input_count]);

    for (index, contribution) in contributions.iter().enumerate() {
        let mut scope = Scope::open(log.section(FIELD_INPUTS), || {
            Entry::append(format!("input {}", index), FIELD_INPUTS)
        });
        let input = raw_input(contribution, &mut scope)?;
        scope.close([input.to_hex()]);
        fields.append(FIELD_INPUTS, input);
    }

    let output_count = count_byte(payments.len(), FIELD_OUTPUT_COUNT, log.section(FIELD_OUTPUT_COUNT))?;
    fields.append(FIELD_OUTPUT_COUNT, vec![output_count]);

    for (index, payment) in payments.iter().enumerate() {
        let mut scope = Scope::open(log.section(FIELD_OUTPUTS), || {
            Entry::append(format!("output {}", index), FIELD_OUTPUTS)
        });
        let output = raw_output(payment, &mut scope)?;
        scope.close([output.to_hex()]);
        fields.append(FIELD_OUTPUTS, output);
    }

    record(log.section(FIELD_LOCK_TIME), || {
        Entry::append(FIELD_LOCK_TIME, "transaction").with_result(hex::encode(LOCK_TIME))
    });
    fields.append(FIELD_LOCK_TIME, LOCK_TIME.to_vec());

    record(log.section(FIELD_HASH_CODE_TYPE), || {
        Entry::append(FIELD_HASH_CODE_TYPE, "transaction").with_result(hex::encode(HASH_CODE_TYPE))
    });
    fields.append(FIELD_HASH_CODE_TYPE, HASH_CODE_TYPE.to_vec());

    Ok(fields)
}

// =============================================================================
// Signing
// =============================================================================

fn input_at(fields: &FieldSequence, index: usize) -> Result<&FieldSequence, TransactionError> {
    fields
        .get(FIELD_INPUTS)?
        .get(index)
        .and_then(Segment::as_fields)
        .ok_or(TransactionError::InputOutOfRange(index))
}

/// Copy of `fields` in which every input except `index` has an empty script
pub fn signing_view(
    fields: &FieldSequence,
    index: usize,
) -> Result<FieldSequence, TransactionError> {
    let mut view = fields.clone();
    let inputs = view.get_mut(FIELD_INPUTS)?;
    if index >= inputs.len() {
        return Err(TransactionError::InputOutOfRange(index));
    }

    for (position, segment) in inputs.iter_mut().enumerate() {
        if position == index {
            continue;
        }
        if let Segment::Fields(input) = segment {
            input.set(FIELD_SCRIPT_LENGTH, vec![Segment::Bytes(vec![0x00])]);
            input.set(FIELD_SCRIPT, Vec::new());
        }
    }
    Ok(view)
}

/// `push(signature) || push(public key)`
pub fn build_script_sig(
    signature: &[u8],
    public_key: &[u8],
    rec: &mut dyn Recorder,
) -> Result<Vec<u8>, TransactionError> {
    let mut script = Vec::with_capacity(signature.len() + public_key.len() + 2);
    script.push(length_byte(signature, "signature", rec)?);
    script.extend_from_slice(signature);
    script.push(length_byte(public_key, "public key", rec)?);
    script.extend_from_slice(public_key);

    record(rec, || {
        Entry::append("signature and public key", "scriptSig").with_result(hex::encode(&script))
    });
    Ok(script)
}

fn sign_input(
    fields: &FieldSequence,
    index: usize,
    private_key: &str,
    rec: &mut dyn Recorder,
) -> Result<FieldSequence, TransactionError> {
    let mut scope = Scope::open(rec, || Entry::sign(format!("input {}", index)));

    let view = signing_view(fields, index)?;
    let digest = double_sha256(&view.to_bytes());
    record(&mut scope, || {
        Entry::hash("double SHA256", format!("transaction for input {}", index))
            .with_result(hex::encode(digest))
    });

    let key = PrivateKey::parse(private_key, &mut scope)?;
    let signature = key
        .sign_digest(&digest, &mut scope)?
        .to_script_bytes(&mut scope)?;
    let public_key =
        hex::decode(key.public_key_hex(&mut scope)?).map_err(|_| KeyError::InvalidPublicKey)?;
    let script_sig = build_script_sig(&signature, &public_key, &mut scope)?;

    let mut input = input_at(fields, index)?.clone();
    let length = length_byte(&script_sig, "scriptSig", &mut scope)?;
    input.set(FIELD_SCRIPT_LENGTH, vec![Segment::Bytes(vec![length])]);
    input.set(FIELD_SCRIPT, vec![Segment::Bytes(script_sig)]);

    scope.close([input.to_hex()]);
    Ok(input)
}

// =============================================================================
// Transaction States
// =============================================================================

/// Assembled but unsigned transaction
#[derive(Debug, Clone)]
pub struct UnsignedTransaction {
    fields: FieldSequence,
    contributions: Vec<Contribution>,
    provenance: ProvenanceLog,
}

impl UnsignedTransaction {
    pub fn fields(&self) -> &FieldSequence {
        &self.fields
    }

    pub fn contributions(&self) -> &[Contribution] {
        &self.contributions
    }

    pub fn input_count(&self) -> usize {
        self.contributions.len()
    }

    pub fn provenance(&self) -> &ProvenanceLog {
        &self.provenance
    }

    /// The preimage signed for input `index`
    pub fn signing_view(&self, index: usize) -> Result<FieldSequence, TransactionError> {
        signing_view(&self.fields, index)
    }

    /// Double SHA-256 of the signing view for input `index`
    pub fn signature_hash(&self, index: usize) -> Result<[u8; 32], TransactionError> {
        Ok(double_sha256(&self.signing_view(index)?.to_bytes()))
    }

    /// Sign every input, one key per contribution in the same order
    pub fn sign<K: AsRef<str>>(
        self,
        private_keys: &[K],
    ) -> Result<SignedTransaction, TransactionError> {
        if private_keys.len() != self.contributions.len() {
            return Err(TransactionError::KeyCountMismatch {
                expected: self.contributions.len(),
                actual: private_keys.len(),
            });
        }

        let UnsignedTransaction {
            mut fields,
            mut provenance,
            ..
        } = self;

        let mut signed_inputs = Vec::with_capacity(private_keys.len());
        for (index, key) in private_keys.iter().enumerate() {
            log::debug!("Signing input {} of {}", index + 1, private_keys.len());
            let input = sign_input(
                &fields,
                index,
                key.as_ref(),
                provenance.section(SECTION_SIGNED_INPUTS),
            )?;
            signed_inputs.push(Segment::Fields(input));
        }

        fields.set(FIELD_INPUTS, signed_inputs);
        record(provenance.section(FIELD_INPUTS), || {
            Entry::replace(FIELD_INPUTS, SECTION_SIGNED_INPUTS)
        });

        fields.remove(FIELD_HASH_CODE_TYPE)?;
        record(provenance.section(FIELD_HASH_CODE_TYPE), || {
            Entry::step("Remove hash code type from transaction")
        });

        let signed = SignedTransaction { fields, provenance };
        log::info!(
            "Signed transaction {} ({} bytes, {} inputs)",
            signed.txid(),
            signed.size(),
            private_keys.len()
        );
        Ok(signed)
    }
}

/// Fully signed transaction in its final wire layout
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    fields: FieldSequence,
    provenance: ProvenanceLog,
}

impl SignedTransaction {
    pub fn fields(&self) -> &FieldSequence {
        &self.fields
    }

    pub fn provenance(&self) -> &ProvenanceLog {
        &self.provenance
    }

    pub fn raw_bytes(&self) -> Vec<u8> {
        self.fields.to_bytes()
    }

    /// Hex string ready to broadcast
    pub fn raw_string(&self) -> String {
        self.fields.to_hex()
    }

    /// Size in bytes
    pub fn size(&self) -> usize {
        self.fields.len_bytes()
    }

    /// Transaction id in display order
    pub fn txid(&self) -> String {
        let mut hash = double_sha256(&self.raw_bytes());
        hash.reverse();
        hex::encode(hash)
    }

    /// Broadcast through a chain service; its error is returned unchanged
    pub async fn push_transaction<S: ChainService>(
        &self,
        service: &S,
        network: Network,
    ) -> Result<ServiceResponse<serde_json::Value>, ServiceError> {
        service.push_transaction(&self.raw_string(), network).await
    }
}

// =============================================================================
// Transaction Builder
// =============================================================================

/// Builder for a legacy transaction
#[derive(Debug, Clone, Default)]
pub struct TransactionBuilder {
    contributions: Vec<Contribution>,
    payments: Vec<Payment>,
    record_provenance: bool,
}

impl TransactionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spend a previous output
    pub fn add_contribution(mut self, contribution: Contribution) -> Self {
        self.contributions.push(contribution);
        self
    }

    pub fn add_contributions(
        mut self,
        contributions: impl IntoIterator<Item = Contribution>,
    ) -> Self {
        self.contributions.extend(contributions);
        self
    }

    /// Pay an amount to an address
    pub fn add_payment(mut self, to_address: &str, amount: u64) -> Self {
        self.payments.push(Payment::new(to_address, amount));
        self
    }

    pub fn add_payments(mut self, payments: impl IntoIterator<Item = Payment>) -> Self {
        self.payments.extend(payments);
        self
    }

    /// Record a provenance trail while building and signing
    pub fn with_provenance(mut self) -> Self {
        self.record_provenance = true;
        self
    }

    /// Assemble the raw transaction
    pub fn build(self) -> Result<UnsignedTransaction, TransactionError> {
        let mut provenance = if self.record_provenance {
            let mut sections = TRANSACTION_FIELDS.to_vec();
            sections.push(SECTION_SIGNED_INPUTS);
            ProvenanceLog::new(&sections)
        } else {
            ProvenanceLog::disabled()
        };

        let fields = create_raw_transaction(&self.contributions, &self.payments, &mut provenance)?;
        log::debug!(
            "Assembled raw transaction: {} inputs, {} outputs, {} bytes",
            self.contributions.len(),
            self.payments.len(),
            fields.len_bytes()
        );

        Ok(UnsignedTransaction {
            fields,
            contributions: self.contributions,
            provenance,
        })
    }

    /// Assemble and sign in one step
    pub fn build_and_sign<K: AsRef<str>>(
        self,
        private_keys: &[K],
    ) -> Result<SignedTransaction, TransactionError> {
        self.build()?.sign(private_keys)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::script::p2pkh_script;
    use crate::crypto::hash::hash160;
    use crate::crypto::keys::{public_key_from_hex, verify_signature, KeyFormat};
    use crate::provenance::NoopRecorder;

    const TX_HASH: &str = "68e7da9216d4e113df7918383258f7cec0a5cf661f469f68966aadf6a12358d3";
    const TX_HASH_LE: &str = "d35823a1f6ad6a96689f461f66cfa5c0cef75832381879df13e1d41692dae768";
    const FUNDING_SCRIPT: &str = "76a914328dbf4cbeacc2898f096ffce5f9dcd27b53e5cc88ac";
    const PAYMENT_ADDRESS: &str = "mjUDEsMXuYFZSrERVZjzHpznNJFzNUBoop";
    const PAYMENT_SCRIPT: &str = "76a9142b5bbb1454f10413fd27ebd05bf6782bbffeec9588ac";
    const PRIVATE_KEY: &str = "cRKHcyn9Diw4GmcAaxRUdJH3Kgaz3j1KBFq1i6QwC2U9STqK7YXm";
    const PUBLIC_KEY: &str = "02c98d1a62125588a03669f865746c0aad780d66022173f64a76cac82410ca132d";

    fn funding_contribution() -> Contribution {
        Contribution::new(TX_HASH, TransactionOutput::new(0, FUNDING_SCRIPT, 20_000_000))
    }

    fn sample_builder() -> TransactionBuilder {
        TransactionBuilder::new()
            .add_contribution(funding_contribution())
            .add_payment(PAYMENT_ADDRESS, 10_000_000)
    }

    /// Split a scriptSig into (signature with sighash byte, public key)
    fn split_script_sig(script_sig: &[u8]) -> (Vec<u8>, Vec<u8>) {
        let sig_len = script_sig[0] as usize;
        let signature = script_sig[1..1 + sig_len].to_vec();
        let pub_len = script_sig[1 + sig_len] as usize;
        let public_key = script_sig[2 + sig_len..].to_vec();
        assert_eq!(public_key.len(), pub_len);
        (signature, public_key)
    }

    fn script_sig_of(signed: &SignedTransaction, index: usize) -> Vec<u8> {
        input_at(signed.fields(), index)
            .unwrap()
            .flatten_field(FIELD_SCRIPT)
            .unwrap()
    }

    #[test]
    fn test_raw_transaction_layout() {
        let unsigned = sample_builder().build().unwrap();
        let expected = format!(
            "01000000{}{}{}{}{}{}{}{}{}{}{}{}",
            "01",
            TX_HASH_LE,
            "00000000",
            "19",
            FUNDING_SCRIPT,
            "ffffffff",
            "01",
            "8096980000000000",
            "19",
            PAYMENT_SCRIPT,
            "00000000",
            "01000000"
        );
        assert_eq!(unsigned.fields().to_hex(), expected);
        assert_eq!(
            unsigned.fields().keys().collect::<Vec<_>>(),
            TRANSACTION_FIELDS.to_vec()
        );
    }

    #[test]
    fn test_sign_end_to_end() {
        let unsigned = sample_builder().build().unwrap();
        let digest = unsigned.signature_hash(0).unwrap();
        // Single input: the signing view is the raw transaction itself
        assert_eq!(digest, double_sha256(&unsigned.fields().to_bytes()));

        let signed = unsigned.sign(&[PRIVATE_KEY]).unwrap();
        let raw = signed.raw_string();

        let prefix = format!("0100000001{}00000000", TX_HASH_LE);
        let suffix = format!("ffffffff01809698000000000019{}00000000", PAYMENT_SCRIPT);
        assert!(raw.starts_with(&prefix));
        assert!(raw.ends_with(&suffix));
        assert!(!signed.fields().contains(FIELD_HASH_CODE_TYPE));

        let script_sig = script_sig_of(&signed, 0);
        let declared_len = &raw[prefix.len()..prefix.len() + 2];
        assert_eq!(declared_len, format!("{:02x}", script_sig.len()));
        assert_eq!(raw.len(), prefix.len() + 2 + script_sig.len() * 2 + suffix.len());

        let (signature, public_key) = split_script_sig(&script_sig);
        assert_eq!(*signature.last().unwrap(), 0x01);
        assert_eq!(hex::encode(&public_key), PUBLIC_KEY);

        let der = &signature[..signature.len() - 1];
        let key = public_key_from_hex(PUBLIC_KEY).unwrap();
        assert!(verify_signature(&key, &digest, der).unwrap());
        assert_eq!(signed.size(), raw.len() / 2);
    }

    #[test]
    fn test_signing_is_deterministic() {
        let first = sample_builder().build_and_sign(&[PRIVATE_KEY]).unwrap();
        let second = sample_builder()
            .with_provenance()
            .build_and_sign(&[PRIVATE_KEY])
            .unwrap();
        assert_eq!(first.raw_string(), second.raw_string());
        assert!(first.provenance().is_empty());
        assert!(!second.provenance().is_empty());
    }

    #[test]
    fn test_multi_input_signatures() {
        let generated = PrivateKey::generate(KeyFormat::Hex);
        let encoded = [
            hex::encode(generated.secret_key().secret_bytes()),
            PRIVATE_KEY.to_string(),
        ];
        let parsed = PrivateKey::parse(PRIVATE_KEY, &mut NoopRecorder).unwrap();

        let script_for = |key: &PrivateKey| {
            let public_key = hex::decode(key.public_key_hex(&mut NoopRecorder).unwrap()).unwrap();
            hex::encode(p2pkh_script(&hash160(&public_key)).unwrap())
        };

        let unsigned = TransactionBuilder::new()
            .add_contribution(Contribution::new(
                TX_HASH,
                TransactionOutput::new(1, &script_for(&generated), 5_000),
            ))
            .add_contribution(Contribution::new(
                &"ab".repeat(32),
                TransactionOutput::new(7, &script_for(&parsed), 6_000),
            ))
            .add_payment("2Mvn45VLAhg1TVjFrKjuyMRkoapoPNQS5Mf", 4_000)
            .add_payment(PAYMENT_ADDRESS, 6_000)
            .build()
            .unwrap();

        let before = unsigned.fields().clone();
        let digests = [
            unsigned.signature_hash(0).unwrap(),
            unsigned.signature_hash(1).unwrap(),
        ];
        assert_ne!(digests[0], digests[1]);
        assert_eq!(unsigned.fields(), &before);

        let signed = unsigned.sign(&encoded).unwrap();
        let public_keys = [
            generated.uncompressed_public_key_hex(),
            PUBLIC_KEY.to_string(),
        ];

        for index in 0..2 {
            let (signature, public_key) = split_script_sig(&script_sig_of(&signed, index));
            assert_eq!(hex::encode(&public_key), public_keys[index]);
            let der = &signature[..signature.len() - 1];
            let key = public_key_from_hex(&public_keys[index]).unwrap();
            assert!(verify_signature(&key, &digests[index], der).unwrap());
        }
    }

    #[test]
    fn test_signing_view_blanks_other_inputs() {
        let unsigned = TransactionBuilder::new()
            .add_contribution(funding_contribution())
            .add_contribution(Contribution::new(
                TX_HASH,
                TransactionOutput::new(1, FUNDING_SCRIPT, 1),
            ))
            .add_payment(PAYMENT_ADDRESS, 1)
            .build()
            .unwrap();

        let view = unsigned.signing_view(1).unwrap();
        let first = input_at(&view, 0).unwrap();
        assert_eq!(first.flatten_field(FIELD_SCRIPT_LENGTH).unwrap(), vec![0x00]);
        assert!(first.flatten_field(FIELD_SCRIPT).unwrap().is_empty());

        let second = input_at(&view, 1).unwrap();
        assert_eq!(hex::encode(second.flatten_field(FIELD_SCRIPT).unwrap()), FUNDING_SCRIPT);

        assert!(matches!(
            unsigned.signing_view(2),
            Err(TransactionError::InputOutOfRange(2))
        ));
    }

    #[test]
    fn test_key_count_mismatch() {
        let unsigned = sample_builder().build().unwrap();
        let err = unsigned.sign(&[PRIVATE_KEY, PRIVATE_KEY]).unwrap_err();
        assert!(matches!(
            err,
            TransactionError::KeyCountMismatch {
                expected: 1,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        let bad_hash = TransactionBuilder::new()
            .add_contribution(Contribution::new("abcd", TransactionOutput::new(0, FUNDING_SCRIPT, 1)))
            .build();
        assert!(matches!(bad_hash, Err(TransactionError::InvalidTransactionHash(_))));

        let bad_script = TransactionBuilder::new()
            .add_contribution(Contribution::new(TX_HASH, TransactionOutput::new(0, "zz", 1)))
            .build();
        assert!(matches!(
            bad_script,
            Err(TransactionError::Script(ScriptError::InvalidScriptFormat(_)))
        ));

        let long_script = "00".repeat(253);
        let too_long = TransactionBuilder::new()
            .add_contribution(Contribution::new(TX_HASH, TransactionOutput::new(0, &long_script, 1)))
            .build();
        assert!(matches!(too_long, Err(TransactionError::ScriptTooLong { length: 253, .. })));

        let bad_address = TransactionBuilder::new().add_payment("xyz", 1).build();
        assert!(matches!(bad_address, Err(TransactionError::Script(_))));

        let bad_key = sample_builder().build_and_sign(&["not a key"]);
        assert!(matches!(
            bad_key,
            Err(TransactionError::CryptoError(KeyError::InvalidInputFormat(_)))
        ));
    }

    #[test]
    fn test_count_out_of_range() {
        let payments = (0..253).map(|_| Payment::new(PAYMENT_ADDRESS, 1));
        let result = TransactionBuilder::new().add_payments(payments).build();
        assert!(matches!(
            result,
            Err(TransactionError::CountOutOfRange {
                field: FIELD_OUTPUT_COUNT,
                count: 253
            })
        ));
    }

    #[test]
    fn test_count_limit_inputs() {
        let contributions: Vec<Contribution> = (0..252u32)
            .map(|i| Contribution::new(TX_HASH, TransactionOutput::new(i, FUNDING_SCRIPT, 1)))
            .collect();

        let unsigned = TransactionBuilder::new()
            .add_contributions(contributions.clone())
            .add_payment(PAYMENT_ADDRESS, 1)
            .build()
            .unwrap();
        assert_eq!(unsigned.input_count(), 252);
        assert_eq!(unsigned.fields().to_bytes()[4], 0xfc);

        let mut too_many = contributions;
        too_many.push(funding_contribution());
        let result = TransactionBuilder::new()
            .add_contributions(too_many)
            .add_payment(PAYMENT_ADDRESS, 1)
            .build();
        assert!(matches!(
            result,
            Err(TransactionError::CountOutOfRange {
                field: FIELD_INPUT_COUNT,
                count: 253
            })
        ));
    }

    #[test]
    fn test_count_limit_outputs() {
        let payments = (0..252).map(|_| Payment::new(PAYMENT_ADDRESS, 1));
        let unsigned = TransactionBuilder::new()
            .add_contribution(funding_contribution())
            .add_payments(payments)
            .build()
            .unwrap();

        // version, input count, then one 66-byte input
        let bytes = unsigned.fields().to_bytes();
        assert_eq!(bytes[4 + 1 + 66], 0xfc);
        assert_eq!(
            unsigned.fields().flatten_field(FIELD_OUTPUT_COUNT).unwrap(),
            vec![0xfc]
        );
    }

    #[test]
    fn test_txid_is_reversed_double_sha() {
        let signed = sample_builder().build_and_sign(&[PRIVATE_KEY]).unwrap();
        let mut expected = double_sha256(&signed.raw_bytes());
        expected.reverse();
        assert_eq!(signed.txid(), hex::encode(expected));
    }

    #[test]
    fn test_provenance_mirrors_fields() {
        let signed = sample_builder()
            .with_provenance()
            .build_and_sign(&[PRIVATE_KEY])
            .unwrap();
        let log = signed.provenance();

        let sections: Vec<&str> = log.sections().iter().map(|s| s.field.as_str()).collect();
        assert_eq!(&sections[..7], &TRANSACTION_FIELDS[..]);
        assert_eq!(sections[7], SECTION_SIGNED_INPUTS);

        let inputs = log.entries(FIELD_INPUTS).unwrap();
        assert_eq!(inputs[0].describe(), "Append input 0 to inputs");
        assert_eq!(inputs.last().unwrap().action.verb(), "Replace");

        let signing = log.entries(SECTION_SIGNED_INPUTS).unwrap();
        assert_eq!(signing.len(), 1);
        assert_eq!(signing[0].results, vec![input_at(signed.fields(), 0).unwrap().to_hex()]);
        assert!(log.to_string().contains("Sign input 0"));
    }

    #[test]
    fn test_lookup_transaction_contributions() {
        let mut tx = Transaction::new(TX_HASH);
        tx.add_output(TransactionOutput::new(2, FUNDING_SCRIPT, 300));
        tx.add_output(TransactionOutput::new(0, FUNDING_SCRIPT, 100));

        let contributions = tx.contributions();
        assert_eq!(contributions.len(), 2);
        assert_eq!(contributions[0].outpoint(), (TX_HASH, 0));
        assert_eq!(tx.contribution(2).unwrap().amount(), 300);
        assert!(tx.contribution(1).is_none());
        assert_eq!(tx.total_amount(), Some(400));
    }

    #[test]
    fn test_total_amount_overflow() {
        let mut tx = Transaction::new(TX_HASH);
        tx.add_output(TransactionOutput::new(0, FUNDING_SCRIPT, u64::MAX));
        tx.add_output(TransactionOutput::new(1, FUNDING_SCRIPT, 1));
        assert_eq!(tx.total_amount(), None);

        assert_eq!(checked_total([u64::MAX - 1, 1]), Some(u64::MAX));
        assert_eq!(checked_total(Vec::new()), Some(0));
    }

    #[test]
    fn test_request_json_shape() {
        let json = serde_json::json!({
            "tx_hash": TX_HASH,
            "output": { "output_index": 0, "script_pub_key": FUNDING_SCRIPT, "amount": 1 }
        });
        let contribution: Contribution = serde_json::from_value(json).unwrap();
        assert_eq!(contribution, Contribution::new(TX_HASH, TransactionOutput::new(0, FUNDING_SCRIPT, 1)));
    }
}
