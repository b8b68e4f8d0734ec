//! Extraction: materialize the final, network-broadcastable transaction from a fully finalized
//! PSBT.

use crate::envelope::Psbt;
use crate::error::PsbtError;
use btc_script::script::{ScriptSig, Witness};
use btc_script::tx::Transaction;

impl Psbt {
    /// Build the final signed transaction. Every input must already carry a finalized
    /// `scriptSig` or witness (see [`Psbt::finalize_input`]/[`Psbt::finalize_all`]); the first
    /// input found without one fails with `NotFinalized`.
    ///
    /// The result serializes in the segwit wire form only if at least one input actually
    /// finalized to a non-empty witness; otherwise it comes out as a plain legacy transaction,
    /// matching what a wallet that never touched segwit inputs would produce.
    pub fn extract(&self) -> Result<Transaction, PsbtError> {
        for (i, input) in self.inputs.iter().enumerate() {
            if !input.is_finalized() {
                return Err(PsbtError::NotFinalized(i));
            }
        }

        let mut tx = self.global.tx()?;
        let mut witnesses = Vec::with_capacity(tx.inputs.len());
        let mut any_witness = false;

        for (i, input) in self.inputs.iter().enumerate() {
            tx.inputs[i].script_sig = input.finalized_script_sig().unwrap_or_else(ScriptSig::null);
            let witness = input.finalized_script_witness()?.unwrap_or_else(Witness::empty);
            any_witness |= !witness.is_empty();
            witnesses.push(witness);
        }

        tx.witnesses = if any_witness { witnesses } else { vec![] };
        Ok(tx)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::map::PstMap;
    use crate::record::InputKey;
    use crate::key::{PsbtKey, PsbtValue};
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
    fn it_rejects_extraction_before_finalization() {
        let psbt = Psbt::from_unsigned_tx(&sample_tx()).unwrap();
        assert!(matches!(psbt.extract(), Err(PsbtError::NotFinalized(0))));
    }

    #[test]
    fn it_extracts_a_legacy_transaction() {
        let tx = sample_tx();
        let mut psbt = Psbt::from_unsigned_tx(&tx).unwrap();
        psbt.inputs[0].insert(
            PsbtKey::from_parts(InputKey::FINALIZED_SCRIPT_SIG, &[]),
            PsbtValue::new(vec![0x01, 0xff]),
        );
        let extracted = psbt.extract().unwrap();
        assert!(!extracted.is_witness());
        assert_eq!(extracted.inputs[0].script_sig.as_ref(), &[0x01, 0xff]);
    }

    #[test]
    fn it_extracts_a_witness_transaction() {
        use btc_script::script::{Witness as W, WitnessStackItem};
        use tx_codec::ser::ByteFormat;

        let tx = sample_tx();
        let mut psbt = Psbt::from_unsigned_tx(&tx).unwrap();
        let witness = W(vec![WitnessStackItem::new(vec![1, 2, 3])]);
        psbt.inputs[0].insert(
            PsbtKey::from_parts(InputKey::FINALIZED_SCRIPT_WITNESS, &[]),
            PsbtValue::new(hex::decode(witness.serialize_hex().unwrap()).unwrap()),
        );
        psbt.inputs[0].insert(
            PsbtKey::from_parts(InputKey::FINALIZED_SCRIPT_SIG, &[]),
            PsbtValue::new(vec![]),
        );
        let extracted = psbt.extract().unwrap();
        assert!(extracted.is_witness());
        assert_eq!(extracted.witnesses, vec![witness]);
    }
}
