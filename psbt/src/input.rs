//! The PSBT input map: prevout data, partial signatures, redeem/witness scripts, and (once
//! finalized) the final `scriptSig`/witness.

use crate::error::PsbtError;
use crate::key::{KeyDerivation, PsbtKey, PsbtValue};
use crate::map::PstMap;
use crate::record::InputKey;
use crate::schema;
use btc_script::script::{RedeemScript, ScriptSig, Witness, WitnessScript};
use btc_script::tx::{Transaction, TxOut};
use tx_codec::ser::ByteFormat;

crate::psbt_map!(
    /// The PSBT input map for a single transaction input.
    PsbtInput
);

impl PsbtInput {
    /// True if a `NonWitnessUtxo` record is present.
    pub fn has_non_witness_utxo(&self) -> bool {
        self.contains_key(&PsbtKey::from_parts(InputKey::NON_WITNESS_UTXO, &[]))
    }

    /// The full previous transaction, if a `NonWitnessUtxo` record is present.
    pub fn non_witness_utxo(&self) -> Result<Option<Transaction>, PsbtError> {
        match self.get(&PsbtKey::from_parts(InputKey::NON_WITNESS_UTXO, &[])) {
            None => Ok(None),
            Some(v) => Ok(Some(Transaction::deserialize_hex(&hex::encode(v.as_ref()))?)),
        }
    }

    /// Replace the `NonWitnessUtxo` record with the given previous transaction.
    pub fn insert_non_witness_utxo(&mut self, tx: &Transaction) -> Result<(), PsbtError> {
        let bytes = hex::decode(tx.serialize_hex()?).expect("serialize_hex produces valid hex");
        self.insert(
            PsbtKey::from_parts(InputKey::NON_WITNESS_UTXO, &[]),
            PsbtValue::new(bytes),
        );
        Ok(())
    }

    /// True if a `WitnessUtxo` record is present.
    pub fn has_witness_utxo(&self) -> bool {
        self.contains_key(&PsbtKey::from_parts(InputKey::WITNESS_UTXO, &[]))
    }

    /// The directly spent output, if a `WitnessUtxo` record is present.
    pub fn witness_utxo(&self) -> Result<Option<TxOut>, PsbtError> {
        match self.get(&PsbtKey::from_parts(InputKey::WITNESS_UTXO, &[])) {
            None => Ok(None),
            Some(v) => Ok(Some(TxOut::deserialize_hex(&hex::encode(v.as_ref()))?)),
        }
    }

    /// Replace the `WitnessUtxo` record with the given output.
    pub fn insert_witness_utxo(&mut self, txout: &TxOut) -> Result<(), PsbtError> {
        let bytes = hex::decode(txout.serialize_hex()?).expect("serialize_hex produces valid hex");
        self.insert(
            PsbtKey::from_parts(InputKey::WITNESS_UTXO, &[]),
            PsbtValue::new(bytes),
        );
        Ok(())
    }

    /// Resolve the spent output, preferring `WitnessUtxo` when present, otherwise indexing into
    /// `NonWitnessUtxo` at `vout`. Fails `BadIndex` if `vout` is out of range for the stored
    /// previous transaction, `MissingRecord` if neither UTXO kind is present.
    pub fn spent_output(&self, vout: u32, input_index: usize) -> Result<TxOut, PsbtError> {
        if let Some(out) = self.witness_utxo()? {
            return Ok(out);
        }
        if let Some(tx) = self.non_witness_utxo()? {
            return tx.outputs.get(vout as usize).cloned().ok_or(PsbtError::BadIndex {
                index: vout,
                len: tx.outputs.len(),
            });
        }
        Err(PsbtError::MissingRecord {
            index: input_index,
            what: "a non-witness or witness utxo",
        })
    }

    /// Every `PartialSignature` record, as `(pubkey, signature-with-sighash-byte)` pairs.
    pub fn partial_sigs(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.range_by_key_type(InputKey::PARTIAL_SIGNATURE)
            .into_iter()
            .map(|(k, v)| (k.key_data().to_vec(), v.as_ref().to_vec()))
            .collect()
    }

    /// Insert a `PartialSignature` record.
    pub fn insert_partial_sig(&mut self, pubkey: &[u8], sig: &[u8]) {
        self.insert(
            PsbtKey::from_parts(InputKey::PARTIAL_SIGNATURE, pubkey),
            PsbtValue::new(sig.to_vec()),
        );
    }

    /// The `SigHashType` record's sighash flag, if present.
    pub fn sighash_type(&self) -> Result<Option<u32>, PsbtError> {
        match self.get(&PsbtKey::from_parts(InputKey::SIGHASH_TYPE, &[])) {
            None => Ok(None),
            Some(v) => {
                let b = v.as_ref();
                if b.len() != 4 {
                    return Err(PsbtError::MalformedRecord(
                        InputKey::SIGHASH_TYPE,
                        "sighash type value must be 4 bytes".to_string(),
                    ));
                }
                Ok(Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]])))
            }
        }
    }

    /// The redeem script, if present.
    pub fn redeem_script(&self) -> Option<RedeemScript> {
        self.get(&PsbtKey::from_parts(InputKey::REDEEM_SCRIPT, &[]))
            .map(|v| RedeemScript::new(v.as_ref().to_vec()))
    }

    /// Replace the redeem script record.
    pub fn insert_redeem_script(&mut self, script: &RedeemScript) {
        self.insert(
            PsbtKey::from_parts(InputKey::REDEEM_SCRIPT, &[]),
            PsbtValue::new(script.as_ref().to_vec()),
        );
    }

    /// The witness script, if present.
    pub fn witness_script(&self) -> Option<WitnessScript> {
        self.get(&PsbtKey::from_parts(InputKey::WITNESS_SCRIPT, &[]))
            .map(|v| WitnessScript::new(v.as_ref().to_vec()))
    }

    /// Replace the witness script record.
    pub fn insert_witness_script(&mut self, script: &WitnessScript) {
        self.insert(
            PsbtKey::from_parts(InputKey::WITNESS_SCRIPT, &[]),
            PsbtValue::new(script.as_ref().to_vec()),
        );
    }

    /// Every `Bip32Derivation` record, as `(pubkey, derivation)` pairs.
    pub fn bip32_derivations(&self) -> Vec<(Vec<u8>, KeyDerivation)> {
        self.range_by_key_type(InputKey::BIP32_DERIVATION)
            .into_iter()
            .filter_map(|(k, v)| {
                KeyDerivation::from_value_bytes(v.as_ref())
                    .ok()
                    .map(|kd| (k.key_data().to_vec(), kd))
            })
            .collect()
    }

    /// Insert a `Bip32Derivation` record.
    pub fn insert_bip32_derivation(&mut self, pubkey: &[u8], derivation: &KeyDerivation) {
        self.insert(
            PsbtKey::from_parts(InputKey::BIP32_DERIVATION, pubkey),
            PsbtValue::new(derivation.to_value_bytes()),
        );
    }

    /// The finalized `scriptSig`, if present.
    pub fn finalized_script_sig(&self) -> Option<ScriptSig> {
        self.get(&PsbtKey::from_parts(InputKey::FINALIZED_SCRIPT_SIG, &[]))
            .map(|v| ScriptSig::new(v.as_ref().to_vec()))
    }

    /// The finalized witness stack, if present.
    pub fn finalized_script_witness(&self) -> Result<Option<Witness>, PsbtError> {
        match self.get(&PsbtKey::from_parts(InputKey::FINALIZED_SCRIPT_WITNESS, &[])) {
            None => Ok(None),
            Some(v) => Ok(Some(Witness::deserialize_hex(&hex::encode(v.as_ref()))?)),
        }
    }

    /// True if either finalized-record key type is present.
    pub fn is_finalized(&self) -> bool {
        self.contains_key(&PsbtKey::from_parts(InputKey::FINALIZED_SCRIPT_SIG, &[]))
            || self.contains_key(&PsbtKey::from_parts(InputKey::FINALIZED_SCRIPT_WITNESS, &[]))
    }

    /// Replace this input map's contents with a finalized form: the UTXO and unknown/proprietary
    /// records are kept, everything else (signatures, sighash, redeem/witness scripts,
    /// derivation paths) is dropped, and the given finalized script-sig/witness are inserted.
    pub fn finalize_with(&self, script_sig: Option<ScriptSig>, witness: Option<Witness>) -> Result<Self, PsbtError> {
        let mut out = Self::default();
        for (key, value) in self.iter() {
            let key_type = InputKey::from_u8(key.key_type());
            let keep = matches!(
                key_type,
                InputKey::NonWitnessUtxo
                    | InputKey::WitnessUtxo
                    | InputKey::ProofOfReservesCommitment
                    | InputKey::Proprietary
                    | InputKey::Unknown(_)
            );
            if keep {
                out.insert(key.clone(), value.clone());
            }
        }
        if let Some(script_sig) = script_sig {
            out.insert(
                PsbtKey::from_parts(InputKey::FINALIZED_SCRIPT_SIG, &[]),
                PsbtValue::new(script_sig.as_ref().to_vec()),
            );
        }
        if let Some(witness) = witness {
            out.insert(
                PsbtKey::from_parts(InputKey::FINALIZED_SCRIPT_WITNESS, &[]),
                PsbtValue::new(hex::decode(witness.serialize_hex()?).expect("valid hex")),
            );
        }
        Ok(out)
    }

    /// Validate every record's key/value shape, then check whole-map invariants.
    pub fn validate(&self, input_index: usize) -> Result<(), PsbtError> {
        schema::input::validate(self)?;
        self.consistency_checks(input_index)
    }

    /// Whole-map invariants: a `NonWitnessUtxo` and `WitnessUtxo` record must not both be
    /// present.
    pub fn consistency_checks(&self, input_index: usize) -> Result<(), PsbtError> {
        if self.has_non_witness_utxo() && self.has_witness_utxo() {
            return Err(PsbtError::ConflictingUtxo(input_index));
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn it_rejects_conflicting_utxo_kinds() {
        let mut input = PsbtInput::default();
        input.insert(
            PsbtKey::from_parts(InputKey::NON_WITNESS_UTXO, &[]),
            PsbtValue::new(vec![0; 10]),
        );
        input.insert(
            PsbtKey::from_parts(InputKey::WITNESS_UTXO, &[]),
            PsbtValue::new(vec![0; 10]),
        );
        assert!(matches!(
            input.consistency_checks(0),
            Err(PsbtError::ConflictingUtxo(0))
        ));
    }

    #[test]
    fn is_finalized_detects_either_finalized_record() {
        let mut input = PsbtInput::default();
        assert!(!input.is_finalized());
        input.insert(
            PsbtKey::from_parts(InputKey::FINALIZED_SCRIPT_SIG, &[]),
            PsbtValue::new(vec![]),
        );
        assert!(input.is_finalized());
    }

    #[test]
    fn finalize_with_drops_presig_records() {
        let mut input = PsbtInput::default();
        input.insert_partial_sig(&[0x02; 33], &[1, 2, 3]);
        input.insert_redeem_script(&RedeemScript::new(vec![0xaa]));
        let finalized = input
            .finalize_with(Some(ScriptSig::new(vec![1])), None)
            .unwrap();
        assert!(finalized.partial_sigs().is_empty());
        assert!(finalized.redeem_script().is_none());
        assert!(finalized.is_finalized());
    }
}
