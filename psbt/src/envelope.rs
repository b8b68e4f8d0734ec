//! The PSBT envelope: magic bytes, the global map, and one input/output map per transaction
//! input/output. Parsing, serialization, combination, and compression all live here; finalize
//! and extract are split out into their own modules since they are conceptually distinct
//! operations over the same envelope.

use crate::error::PsbtError;
use crate::global::PsbtGlobal;
use crate::input::PsbtInput;
use crate::key::KeyDerivation;
use crate::map::PstMap;
use crate::output::PsbtOutput;
use crate::record::GlobalKey;
use btc_script::script::ScriptPubkey;
use btc_script::tx::Transaction;
use std::io::{Cursor, Read, Write};

/// The 5-byte magic prefix every PSBT begins with (`b"psbt"` followed by `0xff`).
pub const MAGIC_BYTES: [u8; 5] = [0x70, 0x73, 0x62, 0x74, 0xff];

/// A full Partially Signed Bitcoin Transaction: the global map plus one input map per unsigned
/// transaction input and one output map per unsigned transaction output.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Psbt {
    /// The global map.
    pub global: PsbtGlobal,
    /// One map per input of the unsigned transaction, in order.
    pub inputs: Vec<PsbtInput>,
    /// One map per output of the unsigned transaction, in order.
    pub outputs: Vec<PsbtOutput>,
}

impl Psbt {
    /// Build a fresh, unsigned PSBT from a transaction: empty input/output maps, one per
    /// input/output of `tx`.
    pub fn from_unsigned_tx(tx: &Transaction) -> Result<Self, PsbtError> {
        Ok(Self {
            global: PsbtGlobal::new(tx)?,
            inputs: tx.inputs.iter().map(|_| PsbtInput::default()).collect(),
            outputs: tx.outputs.iter().map(|_| PsbtOutput::default()).collect(),
        })
    }

    /// Parse a PSBT from its binary wire form.
    pub fn parse_bytes(bytes: &[u8]) -> Result<Self, PsbtError> {
        let mut cursor = Cursor::new(bytes);
        Self::read_from(&mut cursor)
    }

    /// Parse a PSBT from a hex string.
    pub fn parse_hex(s: &str) -> Result<Self, PsbtError> {
        let bytes = hex::decode(s.trim()).map_err(tx_codec::ser::SerError::from)?;
        Self::parse_bytes(&bytes)
    }

    /// Parse a PSBT from its standard base64 text form.
    pub fn parse_base64(s: &str) -> Result<Self, PsbtError> {
        let bytes = base64::decode(s.trim()).map_err(tx_codec::ser::SerError::from)?;
        Self::parse_bytes(&bytes)
    }

    /// Parse a PSBT from either hex or base64, sniffing the encoding from the leading bytes
    /// (`70 73 62 74 ff` for hex, `cHNidP8` for base64).
    pub fn parse_auto(s: &str) -> Result<Self, PsbtError> {
        let trimmed = s.trim();
        if trimmed.starts_with("cHNidP8") {
            Self::parse_base64(trimmed)
        } else {
            Self::parse_hex(trimmed)
        }
    }

    fn read_from<R: Read>(reader: &mut R) -> Result<Self, PsbtError> {
        let mut magic = [0u8; 5];
        reader.read_exact(&mut magic).map_err(|_| PsbtError::TruncatedInput)?;
        if magic != MAGIC_BYTES {
            return Err(PsbtError::BadMagic);
        }

        let global = PsbtGlobal::parse(reader)?;
        global.validate()?;
        let tx = global.tx()?;

        let mut inputs = Vec::with_capacity(tx.inputs.len());
        for _ in 0..tx.inputs.len() {
            inputs.push(PsbtInput::parse(reader)?);
        }

        let mut outputs = Vec::with_capacity(tx.outputs.len());
        for _ in 0..tx.outputs.len() {
            outputs.push(PsbtOutput::parse(reader)?);
        }

        let psbt = Self {
            global,
            inputs,
            outputs,
        };
        psbt.validate()?;
        Ok(psbt)
    }

    /// Serialize to the binary wire form.
    pub fn to_bytes(&self) -> Result<Vec<u8>, PsbtError> {
        self.validate()?;
        let mut buf = vec![];
        buf.write_all(&MAGIC_BYTES)?;
        PstMap::write_to(&self.global, &mut buf)?;
        for input in &self.inputs {
            PstMap::write_to(input, &mut buf)?;
        }
        for output in &self.outputs {
            PstMap::write_to(output, &mut buf)?;
        }
        Ok(buf)
    }

    /// Serialize to a hex string.
    pub fn to_hex(&self) -> Result<String, PsbtError> {
        Ok(hex::encode(self.to_bytes()?))
    }

    /// Serialize to the standard base64 text form.
    pub fn to_base64(&self) -> Result<String, PsbtError> {
        Ok(base64::encode(self.to_bytes()?))
    }

    /// Validate the envelope's structure: the map counts must match the unsigned transaction,
    /// and every map's own invariants must hold.
    pub fn validate(&self) -> Result<(), PsbtError> {
        self.global.validate()?;
        let tx = self.global.tx()?;

        if self.inputs.len() != tx.inputs.len() {
            return Err(PsbtError::StructuralMismatch {
                expected: tx.inputs.len(),
                found: self.inputs.len(),
            });
        }
        if self.outputs.len() != tx.outputs.len() {
            return Err(PsbtError::StructuralMismatch {
                expected: tx.outputs.len(),
                found: self.outputs.len(),
            });
        }

        for (i, input) in self.inputs.iter().enumerate() {
            input.validate(i)?;
        }
        for output in &self.outputs {
            output.validate()?;
        }
        Ok(())
    }

    /// Merge `other` into `self`, requiring both share the same unsigned transaction. On a
    /// record-key collision, `self`'s record is kept. A higher `Version` record on either side
    /// wins outright (the other side's `Version` record is dropped before the union, so a tie
    /// keeps whichever the union's collision rule picks, i.e. `self`'s).
    pub fn combine(&self, other: &Self) -> Result<Self, PsbtError> {
        let self_tx = self.global.tx()?;
        let other_tx = other.global.tx()?;
        if self_tx != other_tx {
            return Err(PsbtError::CombineMismatch);
        }
        if self.inputs.len() != other.inputs.len() || self.outputs.len() != other.outputs.len() {
            return Err(PsbtError::CombineMismatch);
        }

        let self_version = self.global.version()?;
        let other_version = other.global.version()?;

        let mut global = self.global.clone();
        let mut other_global = other.global.clone();
        if self_version > other_version {
            other_global.remove(&crate::key::PsbtKey::from_parts(GlobalKey::VERSION, &[]));
        } else if other_version > self_version {
            global.remove(&crate::key::PsbtKey::from_parts(GlobalKey::VERSION, &[]));
        }
        union_map_into(&mut global, &other_global);

        let inputs = self
            .inputs
            .iter()
            .zip(other.inputs.iter())
            .map(|(a, b)| {
                let mut merged = a.clone();
                union_map_into(&mut merged, b);
                merged
            })
            .collect();

        let outputs = self
            .outputs
            .iter()
            .zip(other.outputs.iter())
            .map(|(a, b)| {
                let mut merged = a.clone();
                union_map_into(&mut merged, b);
                merged
            })
            .collect();

        let combined = Self {
            global,
            inputs,
            outputs,
        };
        combined.validate()?;
        Ok(combined)
    }

    /// Replace `NonWitnessUtxo` with the equivalent `WitnessUtxo` for input `index`, when the
    /// spent output is (directly, or via a P2SH-wrapped) a segwit script. A no-op if the input
    /// is already using `WitnessUtxo`, already finalized, or spends a non-segwit output.
    pub fn compress_input(&mut self, index: usize) -> Result<(), PsbtError> {
        let input = self.inputs.get(index).ok_or(PsbtError::BadIndex {
            index: index as u32,
            len: self.inputs.len(),
        })?;
        if input.has_witness_utxo() || input.is_finalized() {
            return Ok(());
        }
        let tx = self.global.tx()?;
        let txin = tx.inputs.get(index).ok_or(PsbtError::BadIndex {
            index: index as u32,
            len: tx.inputs.len(),
        })?;

        let out = match input.non_witness_utxo()? {
            Some(prev_tx) => {
                let vout = txin.previous_output.idx;
                prev_tx
                    .outputs
                    .get(vout as usize)
                    .cloned()
                    .ok_or(PsbtError::BadIndex {
                        index: vout,
                        len: prev_tx.outputs.len(),
                    })?
            }
            None => return Ok(()),
        };

        if is_segwit_spend(&out.script_pubkey, input.redeem_script().as_ref()) {
            let input = &mut self.inputs[index];
            input.insert_witness_utxo(&out)?;
            input.remove(&crate::key::PsbtKey::from_parts(
                crate::record::InputKey::NON_WITNESS_UTXO,
                &[],
            ));
        }
        Ok(())
    }

    /// Every `Xpub` record across the global map, input maps, and output maps — the `Bip32`
    /// derivations an external key-derivation component would need.
    pub fn all_derivations(&self) -> Vec<KeyDerivation> {
        let mut out: Vec<KeyDerivation> = self.global.xpubs().into_iter().map(|(_, d)| d).collect();
        for input in &self.inputs {
            out.extend(input.bip32_derivations().into_iter().map(|(_, d)| d));
        }
        for output in &self.outputs {
            out.extend(output.bip32_derivations().into_iter().map(|(_, d)| d));
        }
        out
    }
}

fn is_segwit_spend(script_pubkey: &ScriptPubkey, redeem_script: Option<&btc_script::script::RedeemScript>) -> bool {
    use btc_script::classify::{classify, ScriptTemplate};
    match classify(script_pubkey.as_ref()) {
        ScriptTemplate::P2wpkh { .. } | ScriptTemplate::P2wsh { .. } => true,
        ScriptTemplate::P2sh { .. } => redeem_script
            .map(|r| {
                matches!(
                    classify(r.as_ref()),
                    ScriptTemplate::P2wpkh { .. } | ScriptTemplate::P2wsh { .. }
                )
            })
            .unwrap_or(false),
        _ => false,
    }
}

fn union_map_into<M: PstMap>(dst: &mut M, src: &M) {
    for (key, value) in src.iter() {
        if !dst.contains_key(key) {
            dst.insert(key.clone(), value.clone());
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::record::InputKey;
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
    fn it_round_trips_an_empty_psbt() {
        let tx = sample_tx();
        let psbt = Psbt::from_unsigned_tx(&tx).unwrap();
        let bytes = psbt.to_bytes().unwrap();
        assert_eq!(bytes[..5], MAGIC_BYTES);
        let parsed = Psbt::parse_bytes(&bytes).unwrap();
        assert_eq!(parsed, psbt);
    }

    #[test]
    fn it_sniffs_hex_vs_base64() {
        let tx = sample_tx();
        let psbt = Psbt::from_unsigned_tx(&tx).unwrap();
        let hex = psbt.to_hex().unwrap();
        let b64 = psbt.to_base64().unwrap();
        assert_eq!(Psbt::parse_auto(&hex).unwrap(), psbt);
        assert_eq!(Psbt::parse_auto(&b64).unwrap(), psbt);
    }

    #[test]
    fn combine_unions_disjoint_records() {
        let tx = sample_tx();
        let mut a = Psbt::from_unsigned_tx(&tx).unwrap();
        let mut b = Psbt::from_unsigned_tx(&tx).unwrap();
        a.inputs[0].insert_bip32_derivation(
            &[0x02; 33],
            &crate::key::KeyDerivation {
                fingerprint: [1, 2, 3, 4],
                path: vec![0],
            },
        );
        b.inputs[0].insert_bip32_derivation(
            &[0x03; 33],
            &crate::key::KeyDerivation {
                fingerprint: [5, 6, 7, 8],
                path: vec![1],
            },
        );
        let combined = a.combine(&b).unwrap();
        assert_eq!(combined.inputs[0].bip32_derivations().len(), 2);
    }

    #[test]
    fn combine_keeps_self_on_collision() {
        let tx = sample_tx();
        let mut a = Psbt::from_unsigned_tx(&tx).unwrap();
        let mut b = Psbt::from_unsigned_tx(&tx).unwrap();
        a.inputs[0].insert_partial_sig(&[0x02; 33], &[1]);
        b.inputs[0].insert_partial_sig(&[0x02; 33], &[2]);
        let combined = a.combine(&b).unwrap();
        assert_eq!(combined.inputs[0].partial_sigs(), vec![(vec![0x02; 33], vec![1])]);
    }

    #[test]
    fn combine_rejects_mismatched_transactions() {
        let mut tx_a = sample_tx();
        let mut tx_b = sample_tx();
        tx_b.locktime = 1;
        tx_a.outputs[0].value = 1;
        let a = Psbt::from_unsigned_tx(&tx_a).unwrap();
        let b = Psbt::from_unsigned_tx(&tx_b).unwrap();
        assert!(matches!(a.combine(&b), Err(PsbtError::CombineMismatch)));
    }

    #[test]
    fn parse_rejects_bad_magic() {
        let mut bytes = Psbt::from_unsigned_tx(&sample_tx()).unwrap().to_bytes().unwrap();
        bytes[0] = 0;
        assert!(matches!(Psbt::parse_bytes(&bytes), Err(PsbtError::BadMagic)));
    }

    #[test]
    fn validate_rejects_conflicting_utxo_after_parse() {
        let tx = sample_tx();
        let mut psbt = Psbt::from_unsigned_tx(&tx).unwrap();
        psbt.inputs[0].insert(
            crate::key::PsbtKey::from_parts(InputKey::NON_WITNESS_UTXO, &[]),
            crate::key::PsbtValue::new(vec![0; 4]),
        );
        psbt.inputs[0].insert(
            crate::key::PsbtKey::from_parts(InputKey::WITNESS_UTXO, &[]),
            crate::key::PsbtValue::new(vec![0; 4]),
        );
        assert!(matches!(
            psbt.validate(),
            Err(PsbtError::ConflictingUtxo(0))
        ));
    }
}
