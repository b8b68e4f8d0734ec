//! Unsigned and signed Bitcoin transaction types.
//!
//! A single [`Transaction`] type models both the legacy and segwit wire forms: it carries an
//! optional `witnesses` vector, empty for the legacy form, one entry per input for the segwit
//! form. This is deliberately simpler than a teacher-style `LegacyTx`/`WitnessTx` split with a
//! shared sighash-computing `Transaction` trait: sighash computation belongs to the external
//! signer (out of scope here, see the crate-level docs), so this type only needs to parse,
//! serialize, and expose its fields — not compute digests over itself.

use crate::script::{ScriptSig, Witness};
use tx_codec::hashes::{hash256, Hash256Digest};
use tx_codec::ser::{ByteFormat, SerError, SerResult};
use std::io::{Read, Write};

/// A reference to a previous transaction's output: its txid and output index.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct OutPoint {
    /// The referenced transaction's id.
    pub txid: Hash256Digest,
    /// The index of the referenced output within that transaction.
    pub idx: u32,
}

impl OutPoint {
    /// Build a new outpoint.
    pub fn new(txid: Hash256Digest, idx: u32) -> Self {
        Self { txid, idx }
    }
}

impl ByteFormat for OutPoint {
    type Error = SerError;

    fn serialized_length(&self) -> usize {
        36
    }

    fn read_from<R>(reader: &mut R, _limit: usize) -> SerResult<Self>
    where
        R: Read,
    {
        let txid = Hash256Digest::read_from(reader, 0)?;
        let idx = Self::read_u32_le(reader)?;
        Ok(Self { txid, idx })
    }

    fn write_to<W>(&self, writer: &mut W) -> SerResult<usize>
    where
        W: Write,
    {
        let mut len = self.txid.write_to(writer)?;
        len += Self::write_u32_le(writer, self.idx)?;
        Ok(len)
    }
}

/// A transaction input: which output it spends, its unlocking script, and its sequence number.
/// In an *unsigned* transaction (the form stored in a PSBT's `UnsignedTransaction` record) the
/// `script_sig` is always empty.
#[derive(Clone, Debug, Eq, PartialEq, Default)]
pub struct TxIn {
    /// The outpoint being spent.
    pub previous_output: OutPoint,
    /// The unlocking script. Empty in an unsigned transaction.
    pub script_sig: ScriptSig,
    /// The input's sequence number (used for relative timelocks and opt-in RBF).
    pub sequence: u32,
}

impl Default for OutPoint {
    fn default() -> Self {
        Self {
            txid: Hash256Digest::default(),
            idx: 0,
        }
    }
}

impl TxIn {
    /// Build a new input with the default (final) sequence number.
    pub fn new(previous_output: OutPoint) -> Self {
        Self {
            previous_output,
            script_sig: ScriptSig::null(),
            sequence: 0xffff_ffff,
        }
    }
}

impl ByteFormat for TxIn {
    type Error = SerError;

    fn serialized_length(&self) -> usize {
        self.previous_output.serialized_length()
            + self.script_sig.serialized_length()
            + 4
    }

    fn read_from<R>(reader: &mut R, _limit: usize) -> SerResult<Self>
    where
        R: Read,
    {
        let previous_output = OutPoint::read_from(reader, 0)?;
        let script_sig = ScriptSig::read_from(reader, 0)?;
        let sequence = Self::read_u32_le(reader)?;
        Ok(Self {
            previous_output,
            script_sig,
            sequence,
        })
    }

    fn write_to<W>(&self, writer: &mut W) -> SerResult<usize>
    where
        W: Write,
    {
        let mut len = self.previous_output.write_to(writer)?;
        len += self.script_sig.write_to(writer)?;
        len += Self::write_u32_le(writer, self.sequence)?;
        Ok(len)
    }
}

/// A transaction output. `TxOut::null()` is the "null" output (value
/// `0xffff_ffff_ffff_ffff`, empty script), used only as a sentinel.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TxOut {
    /// The output's value in satoshis.
    pub value: u64,
    /// The script locking this output.
    pub script_pubkey: crate::script::ScriptPubkey,
}

impl Default for TxOut {
    fn default() -> Self {
        Self::null()
    }
}

impl TxOut {
    /// Build a new output.
    pub fn new<T: Into<crate::script::ScriptPubkey>>(value: u64, script_pubkey: T) -> Self {
        Self {
            value,
            script_pubkey: script_pubkey.into(),
        }
    }

    /// The null output, used as a sentinel value in some sighash algorithms.
    pub fn null() -> Self {
        Self {
            value: 0xffff_ffff_ffff_ffff,
            script_pubkey: crate::script::ScriptPubkey::null(),
        }
    }
}

impl ByteFormat for TxOut {
    type Error = SerError;

    fn serialized_length(&self) -> usize {
        8 + self.script_pubkey.serialized_length()
    }

    fn read_from<R>(reader: &mut R, _limit: usize) -> SerResult<Self>
    where
        R: Read,
    {
        let value = Self::read_u64_le(reader)?;
        let script_pubkey = crate::script::ScriptPubkey::read_from(reader, 0)?;
        Ok(Self { value, script_pubkey })
    }

    fn write_to<W>(&self, writer: &mut W) -> SerResult<usize>
    where
        W: Write,
    {
        let mut len = Self::write_u64_le(writer, self.value)?;
        len += self.script_pubkey.write_to(writer)?;
        Ok(len)
    }
}

const SEGWIT_MARKER: u8 = 0x00;
const SEGWIT_FLAG: u8 = 0x01;

/// A Bitcoin transaction. `witnesses` is empty for the legacy wire form; when non-empty it must
/// have exactly one entry per input (empty `Witness` for inputs with no witness data), and the
/// transaction serializes in the segwit wire form (marker/flag bytes, trailing witness vector).
#[derive(Clone, Debug, Eq, PartialEq, Default)]
pub struct Transaction {
    /// The transaction version.
    pub version: u32,
    /// Inputs.
    pub inputs: Vec<TxIn>,
    /// Outputs.
    pub outputs: Vec<TxOut>,
    /// Per-input witness stacks; empty for a legacy transaction.
    pub witnesses: Vec<Witness>,
    /// The transaction locktime.
    pub locktime: u32,
}

impl Transaction {
    /// True if this transaction carries any (non-empty) witness data.
    pub fn is_witness(&self) -> bool {
        self.witnesses.iter().any(|w| !w.is_empty())
    }

    /// Compute the transaction's id: the double-SHA256 of its *legacy* (witness-stripped)
    /// serialization, regardless of whether `self` itself carries witness data.
    pub fn txid(&self) -> Hash256Digest {
        let mut buf = vec![];
        self.write_legacy(&mut buf).expect("Vec<u8> Write is infallible");
        hash256(&buf)
    }

    fn write_legacy<W: Write>(&self, writer: &mut W) -> SerResult<usize> {
        let mut len = Self::write_u32_le(writer, self.version)?;
        len += Self::write_prefix_vec(writer, &self.inputs)?;
        len += Self::write_prefix_vec(writer, &self.outputs)?;
        len += Self::write_u32_le(writer, self.locktime)?;
        Ok(len)
    }

    fn write_witness<W: Write>(&self, writer: &mut W) -> SerResult<usize> {
        assert_eq!(
            self.witnesses.len(),
            self.inputs.len(),
            "witness count must match input count for a segwit-serialized transaction"
        );
        let mut len = Self::write_u32_le(writer, self.version)?;
        len += writer.write(&[SEGWIT_MARKER, SEGWIT_FLAG])?;
        len += Self::write_prefix_vec(writer, &self.inputs)?;
        len += Self::write_prefix_vec(writer, &self.outputs)?;
        for w in self.witnesses.iter() {
            len += w.write_to(writer)?;
        }
        len += Self::write_u32_le(writer, self.locktime)?;
        Ok(len)
    }
}

impl ByteFormat for Transaction {
    type Error = SerError;

    fn serialized_length(&self) -> usize {
        let mut buf = vec![];
        self.write_to(&mut buf).expect("Vec<u8> Write is infallible");
        buf.len()
    }

    fn read_from<R>(reader: &mut R, _limit: usize) -> SerResult<Self>
    where
        R: Read,
    {
        let version = Self::read_u32_le(reader)?;

        let mut first = [0u8; 1];
        reader.read_exact(&mut first)?;

        if first[0] == SEGWIT_MARKER {
            let mut flag = [0u8; 1];
            reader.read_exact(&mut flag)?;
            if flag[0] != SEGWIT_FLAG {
                return Err(SerError::ComponentError(
                    "unrecognized segwit flag byte".to_string(),
                ));
            }
            let n_in = Self::read_compact_int(reader)?;
            let mut inputs = Vec::with_capacity(n_in as usize);
            for _ in 0..n_in {
                inputs.push(TxIn::read_from(reader, 0)?);
            }
            let n_out = Self::read_compact_int(reader)?;
            let mut outputs = Vec::with_capacity(n_out as usize);
            for _ in 0..n_out {
                outputs.push(TxOut::read_from(reader, 0)?);
            }
            let mut witnesses = Vec::with_capacity(inputs.len());
            for _ in 0..inputs.len() {
                witnesses.push(Witness::read_from(reader, 0)?);
            }
            let locktime = Self::read_u32_le(reader)?;
            Ok(Self {
                version,
                inputs,
                outputs,
                witnesses,
                locktime,
            })
        } else {
            // `first` is the low byte of the input-count VarInt we already partially consumed.
            let n_in = read_compact_int_with_first_byte(reader, first[0])?;
            let mut inputs = Vec::with_capacity(n_in as usize);
            for _ in 0..n_in {
                inputs.push(TxIn::read_from(reader, 0)?);
            }
            let n_out = Self::read_compact_int(reader)?;
            let mut outputs = Vec::with_capacity(n_out as usize);
            for _ in 0..n_out {
                outputs.push(TxOut::read_from(reader, 0)?);
            }
            let locktime = Self::read_u32_le(reader)?;
            Ok(Self {
                version,
                inputs,
                outputs,
                witnesses: vec![],
                locktime,
            })
        }
    }

    fn write_to<W>(&self, writer: &mut W) -> SerResult<usize>
    where
        W: Write,
    {
        if self.is_witness() {
            self.write_witness(writer)
        } else {
            self.write_legacy(writer)
        }
    }
}

/// `read_compact_int` variant for when the first byte has already been consumed from the
/// reader (the transaction parser must peek one byte to detect the segwit marker before it
/// knows whether that byte starts the input-count VarInt or is the marker itself).
fn read_compact_int_with_first_byte<R: Read>(reader: &mut R, first: u8) -> SerResult<u64> {
    let prefix_len = tx_codec::ser::prefix_len_from_first_byte(first);
    let number = if prefix_len > 1 {
        let mut buf = [0u8; 8];
        let mut body = reader.take(prefix_len as u64 - 1);
        let _ = body.read(&mut buf)?;
        u64::from_le_bytes(buf)
    } else {
        first as u64
    };
    let minimal_length = tx_codec::ser::prefix_byte_len(number);
    if minimal_length < prefix_len {
        Err(SerError::NonMinimalVarInt)
    } else {
        Ok(number)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn it_round_trips_a_legacy_transaction() {
        let tx = Transaction {
            version: 2,
            inputs: vec![TxIn::new(OutPoint::new(Hash256Digest::default(), 0))],
            outputs: vec![TxOut::new(1000, vec![])],
            witnesses: vec![],
            locktime: 0,
        };
        let bytes = tx.serialize_hex().unwrap();
        assert_eq!(Transaction::deserialize_hex(&bytes).unwrap(), tx);
        assert!(!tx.is_witness());
    }

    #[test]
    fn it_round_trips_a_witness_transaction() {
        use crate::script::WitnessStackItem;
        let tx = Transaction {
            version: 2,
            inputs: vec![TxIn::new(OutPoint::new(Hash256Digest::default(), 0))],
            outputs: vec![TxOut::new(1000, vec![])],
            witnesses: vec![Witness(vec![WitnessStackItem::new(vec![1, 2, 3])])],
            locktime: 0,
        };
        let bytes = tx.serialize_hex().unwrap();
        assert_eq!(Transaction::deserialize_hex(&bytes).unwrap(), tx);
        assert!(tx.is_witness());
    }

    #[test]
    fn txid_ignores_witness_data() {
        use crate::script::WitnessStackItem;
        let legacy = Transaction {
            version: 2,
            inputs: vec![TxIn::new(OutPoint::new(Hash256Digest::default(), 0))],
            outputs: vec![TxOut::new(1000, vec![])],
            witnesses: vec![],
            locktime: 0,
        };
        let mut witnessed = legacy.clone();
        witnessed.witnesses = vec![Witness(vec![WitnessStackItem::new(vec![9])])];
        assert_eq!(legacy.txid(), witnessed.txid());
    }
}
