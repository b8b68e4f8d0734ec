//! The error taxonomy for every PSBT operation: parsing, combining, finalizing, extracting.

use crate::key::PsbtKey;
use thiserror::Error;

/// Errors produced by PSBT parsing, combination, finalization, and extraction.
#[derive(Debug, Error)]
pub enum PsbtError {
    /// The 5-byte magic prefix did not match `70 73 62 74 ff`.
    #[error("bad magic bytes: expected the BIP-174 psbt prefix")]
    BadMagic,

    /// The input ended before a complete structure could be read.
    #[error("truncated input")]
    TruncatedInput,

    /// A record's key or value did not match the shape its key type requires.
    #[error("malformed record for key type {0:#04x}: {1}")]
    MalformedRecord(u8, String),

    /// The same full key (id + key-data) appeared twice within one map.
    #[error("duplicate key in map: {0:?}")]
    DuplicateKey(PsbtKey),

    /// The number of input or output maps did not match the unsigned transaction.
    #[error("structural mismatch: expected {expected} maps, found {found}")]
    StructuralMismatch {
        /// The count `unsigned_tx` requires.
        expected: usize,
        /// The count actually present.
        found: usize,
    },

    /// An input map carried both a `WitnessUtxo` and a `NonWitnessUtxo` record.
    #[error("input {0} carries both a witness and non-witness utxo")]
    ConflictingUtxo(usize),

    /// `combine` was called on two PSBTs with different unsigned transactions.
    #[error("cannot combine psbts with different unsigned transactions")]
    CombineMismatch,

    /// Finalization needed a record that was not present.
    #[error("input {index} is missing required record: {what}")]
    MissingRecord {
        /// The input index.
        index: usize,
        /// A description of what was required.
        what: &'static str,
    },

    /// No branch of a conditional (or P2PK-with-timeout) template matched the available
    /// signatures.
    #[error("input {0}: no conditional branch is satisfiable with the available signatures")]
    UnsatisfiableBranch(usize),

    /// The input's script-pubkey does not match any template this finalizer can resolve.
    #[error("input {0}: unsupported script template")]
    Unsupported(usize),

    /// Finalizer recursion exceeded the configured depth bound.
    #[error("input {0}: finalizer recursion limit exceeded")]
    RecursionLimit(usize),

    /// `extract` was called before every input was finalized.
    #[error("input {0} is not finalized")]
    NotFinalized(usize),

    /// A `vout` referenced an index past the end of the referenced transaction's outputs.
    #[error("index {index} out of range for transaction with {len} outputs")]
    BadIndex {
        /// The out-of-range index.
        index: u32,
        /// The number of outputs actually present.
        len: usize,
    },

    /// Lower-layer (de)serialization error.
    #[error(transparent)]
    Codec(#[from] tx_codec::ser::SerError),

    /// I/O error from the underlying reader/writer.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
