//! The BIP-174 roles: thin trait boundaries around the operations a PSBT workflow hands off to a
//! particular participant (an updater filling in UTXO data, a signer producing partial
//! signatures, a finalizer building final scripts, an extractor producing the broadcastable
//! transaction). The crate's own [`crate::envelope::Psbt`] already implements the finalize/extract
//! operations directly; these traits exist so a caller can swap in its own envelope type or drive
//! a multi-party workflow (e.g. a hardware wallet that only implements `PstSigner`) without
//! depending on the concrete type.

use crate::error::PsbtError;
use btc_script::tx::Transaction;

/// A participant that can finalize one or all of a PSBT's inputs, turning partial signatures and
/// scripts into a final `scriptSig`/witness.
pub trait PstFinalizer<P> {
    /// The error type returned on failure; must be constructible from a [`PsbtError`] so the
    /// default plumbing in this crate can be reused.
    type Error: From<PsbtError>;

    /// Finalize a single input by index.
    fn finalize_input(&self, psbt: &mut P, index: usize) -> Result<(), Self::Error>;

    /// Finalize every input, collecting a result per index rather than stopping at the first
    /// failure (mirrors how a wallet reports per-input finalize failures to a user).
    fn finalize_all(&self, psbt: &mut P, count: usize) -> Vec<Result<(), Self::Error>> {
        (0..count).map(|i| self.finalize_input(psbt, i)).collect()
    }
}

/// A participant that extracts the final network transaction from a fully finalized PSBT.
pub trait PstExtractor<P> {
    /// The error type returned on failure.
    type Error: From<PsbtError>;

    /// Produce the final transaction, or fail if any input is not yet finalized.
    fn extract(&self, psbt: &P) -> Result<Transaction, Self::Error>;
}

/// The crate's own [`crate::envelope::Psbt`] driven through the finalize/extract role traits,
/// rather than called directly. Useful when a caller's code is written generically over
/// `PstFinalizer`/`PstExtractor` and only wired to this crate's concrete envelope at the edges.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultRoles;

impl PstFinalizer<crate::envelope::Psbt> for DefaultRoles {
    type Error = PsbtError;

    fn finalize_input(&self, psbt: &mut crate::envelope::Psbt, index: usize) -> Result<(), PsbtError> {
        psbt.finalize_input(index)
    }
}

impl PstExtractor<crate::envelope::Psbt> for DefaultRoles {
    type Error = PsbtError;

    fn extract(&self, psbt: &crate::envelope::Psbt) -> Result<Transaction, PsbtError> {
        psbt.extract()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::envelope::Psbt;
    use btc_script::tx::{OutPoint, TxIn, TxOut};
    use tx_codec::hashes::Hash256Digest;

    fn sample_tx() -> Transaction {
        Transaction {
            version: 2,
            inputs: vec![TxIn::new(OutPoint::new(Hash256Digest::default(), 0))],
            outputs: vec![TxOut::new(1000, vec![])],
            witnesses: vec![],
            locktime: 0,
        }
    }

    #[test]
    fn default_roles_extract_fails_before_finalization() {
        let psbt = Psbt::from_unsigned_tx(&sample_tx()).unwrap();
        let roles = DefaultRoles;
        assert!(matches!(roles.extract(&psbt), Err(PsbtError::NotFinalized(0))));
    }
}
