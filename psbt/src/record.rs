//! The per-scope key-id registries: which key-type bytes are recognized in the global, input,
//! and output maps, and what each one's value payload means.

/// Global-scope key types.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum GlobalKey {
    /// The unsigned transaction (exactly one required).
    UnsignedTransaction,
    /// An extended public key used somewhere in the transaction (zero or more).
    Xpub,
    /// The PSBT version (at most one; defaults to 0 when absent).
    Version,
    /// Proprietary, vendor-specific data (key-type `0xfc`).
    Proprietary,
    /// An unrecognized key type, preserved verbatim.
    Unknown(u8),
}

impl GlobalKey {
    /// The raw key-type byte.
    pub const UNSIGNED_TX: u8 = 0x00;
    /// The raw key-type byte.
    pub const XPUB: u8 = 0x01;
    /// The raw key-type byte.
    pub const VERSION: u8 = 0xfb;
    /// The raw key-type byte.
    pub const PROPRIETARY: u8 = 0xfc;

    /// Classify a raw key-type byte.
    pub fn from_u8(b: u8) -> Self {
        match b {
            Self::UNSIGNED_TX => Self::UnsignedTransaction,
            Self::XPUB => Self::Xpub,
            Self::VERSION => Self::Version,
            Self::PROPRIETARY => Self::Proprietary,
            other => Self::Unknown(other),
        }
    }

    /// The raw key-type byte this variant represents.
    pub fn as_u8(self) -> u8 {
        match self {
            Self::UnsignedTransaction => Self::UNSIGNED_TX,
            Self::Xpub => Self::XPUB,
            Self::Version => Self::VERSION,
            Self::Proprietary => Self::PROPRIETARY,
            Self::Unknown(b) => b,
        }
    }
}

/// Input-scope key types.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum InputKey {
    /// The full previous transaction (mutually exclusive with `WitnessUtxo`).
    NonWitnessUtxo,
    /// The single previous output being spent (mutually exclusive with `NonWitnessUtxo`).
    WitnessUtxo,
    /// A single partial signature, keyed by its pubkey.
    PartialSignature,
    /// The sighash flag this input must be signed with.
    SigHashType,
    /// The redeem script, for P2SH (or P2SH-wrapped segwit) inputs.
    RedeemScript,
    /// The witness script, for P2WSH (or P2SH-P2WSH) inputs.
    WitnessScript,
    /// A `(fingerprint, path)` pair for a pubkey involved in this input.
    Bip32Derivation,
    /// The finalized legacy `scriptSig`.
    FinalizedScriptSig,
    /// The finalized segwit witness stack.
    FinalizedScriptWitness,
    /// An opaque proof-of-reserves commitment, preserved verbatim.
    ProofOfReservesCommitment,
    /// Proprietary, vendor-specific data (key-type `0xfc`).
    Proprietary,
    /// An unrecognized key type, preserved verbatim.
    Unknown(u8),
}

impl InputKey {
    /// The raw key-type byte.
    pub const NON_WITNESS_UTXO: u8 = 0x00;
    /// The raw key-type byte.
    pub const WITNESS_UTXO: u8 = 0x01;
    /// The raw key-type byte.
    pub const PARTIAL_SIGNATURE: u8 = 0x02;
    /// The raw key-type byte.
    pub const SIGHASH_TYPE: u8 = 0x03;
    /// The raw key-type byte.
    pub const REDEEM_SCRIPT: u8 = 0x04;
    /// The raw key-type byte.
    pub const WITNESS_SCRIPT: u8 = 0x05;
    /// The raw key-type byte.
    pub const BIP32_DERIVATION: u8 = 0x06;
    /// The raw key-type byte.
    pub const FINALIZED_SCRIPT_SIG: u8 = 0x07;
    /// The raw key-type byte.
    pub const FINALIZED_SCRIPT_WITNESS: u8 = 0x08;
    /// The raw key-type byte.
    pub const POR_COMMITMENT: u8 = 0x09;
    /// The raw key-type byte.
    pub const PROPRIETARY: u8 = 0xfc;

    /// Classify a raw key-type byte.
    pub fn from_u8(b: u8) -> Self {
        match b {
            Self::NON_WITNESS_UTXO => Self::NonWitnessUtxo,
            Self::WITNESS_UTXO => Self::WitnessUtxo,
            Self::PARTIAL_SIGNATURE => Self::PartialSignature,
            Self::SIGHASH_TYPE => Self::SigHashType,
            Self::REDEEM_SCRIPT => Self::RedeemScript,
            Self::WITNESS_SCRIPT => Self::WitnessScript,
            Self::BIP32_DERIVATION => Self::Bip32Derivation,
            Self::FINALIZED_SCRIPT_SIG => Self::FinalizedScriptSig,
            Self::FINALIZED_SCRIPT_WITNESS => Self::FinalizedScriptWitness,
            Self::POR_COMMITMENT => Self::ProofOfReservesCommitment,
            Self::PROPRIETARY => Self::Proprietary,
            other => Self::Unknown(other),
        }
    }

    /// The raw key-type byte this variant represents.
    pub fn as_u8(self) -> u8 {
        match self {
            Self::NonWitnessUtxo => Self::NON_WITNESS_UTXO,
            Self::WitnessUtxo => Self::WITNESS_UTXO,
            Self::PartialSignature => Self::PARTIAL_SIGNATURE,
            Self::SigHashType => Self::SIGHASH_TYPE,
            Self::RedeemScript => Self::REDEEM_SCRIPT,
            Self::WitnessScript => Self::WITNESS_SCRIPT,
            Self::Bip32Derivation => Self::BIP32_DERIVATION,
            Self::FinalizedScriptSig => Self::FINALIZED_SCRIPT_SIG,
            Self::FinalizedScriptWitness => Self::FINALIZED_SCRIPT_WITNESS,
            Self::ProofOfReservesCommitment => Self::POR_COMMITMENT,
            Self::Proprietary => Self::PROPRIETARY,
            Self::Unknown(b) => b,
        }
    }

    /// True once either of the two finalized-record key types is reached: anything at or after
    /// these in a finalized input map's cleanup is dropped.
    pub fn is_pre_finalization_only(self) -> bool {
        matches!(
            self,
            Self::PartialSignature
                | Self::SigHashType
                | Self::RedeemScript
                | Self::WitnessScript
                | Self::Bip32Derivation
        )
    }
}

/// Output-scope key types.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum OutputKey {
    /// The redeem script, for a P2SH output address.
    RedeemScript,
    /// The witness script, for a P2WSH output address.
    WitnessScript,
    /// A `(fingerprint, path)` pair for a pubkey involved in this output.
    Bip32Derivation,
    /// Proprietary, vendor-specific data (key-type `0xfc`).
    Proprietary,
    /// An unrecognized key type, preserved verbatim.
    Unknown(u8),
}

impl OutputKey {
    /// The raw key-type byte.
    pub const REDEEM_SCRIPT: u8 = 0x00;
    /// The raw key-type byte.
    pub const WITNESS_SCRIPT: u8 = 0x01;
    /// The raw key-type byte.
    pub const BIP32_DERIVATION: u8 = 0x02;
    /// The raw key-type byte.
    pub const PROPRIETARY: u8 = 0xfc;

    /// Classify a raw key-type byte.
    pub fn from_u8(b: u8) -> Self {
        match b {
            Self::REDEEM_SCRIPT => Self::RedeemScript,
            Self::WITNESS_SCRIPT => Self::WitnessScript,
            Self::BIP32_DERIVATION => Self::Bip32Derivation,
            Self::PROPRIETARY => Self::Proprietary,
            other => Self::Unknown(other),
        }
    }

    /// The raw key-type byte this variant represents.
    pub fn as_u8(self) -> u8 {
        match self {
            Self::RedeemScript => Self::REDEEM_SCRIPT,
            Self::WitnessScript => Self::WITNESS_SCRIPT,
            Self::Bip32Derivation => Self::BIP32_DERIVATION,
            Self::Proprietary => Self::PROPRIETARY,
            Self::Unknown(b) => b,
        }
    }
}
