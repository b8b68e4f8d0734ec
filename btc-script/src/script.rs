//! Raw script byte containers, and a minimal opcode/pushdata decoder used by the template
//! classifier and the finalized-script builders.

use crate::opcodes::{OP_PUSHDATA1, OP_PUSHDATA2, OP_PUSHDATA4};
use tx_codec::ser::{ByteFormat, SerError, SerResult};

tx_codec::wrap_prefixed_byte_vector!(
    /// A raw, length-prefixed Bitcoin script. Used for `scriptPubKey`, `scriptSig`, redeem
    /// scripts, and witness scripts alike; the specific role is carried by the type alias at
    /// the use site, not by a distinct representation.
    Script
);

/// A `scriptPubKey`: the spending constraint attached to a `TxOut`.
pub type ScriptPubkey = Script;
/// A `scriptSig`: the unlocking data attached to a legacy (or P2SH-wrapped) `TxIn`.
pub type ScriptSig = Script;
/// A redeem script, referenced by a P2SH `scriptPubKey`.
pub type RedeemScript = Script;
/// A witness script, referenced by a P2WSH `scriptPubKey` (or P2SH-P2WSH redeem script).
pub type WitnessScript = Script;

tx_codec::wrap_prefixed_byte_vector!(
    /// A single item on a segwit witness stack.
    WitnessStackItem
);

/// The witness stack attached to one transaction input. Serializes as a compact-size item
/// count followed by each item as a length-prefixed byte string (note: unlike `Script`, the
/// witness stack's own length prefix is the *item count*, not a byte length).
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct Witness(pub Vec<WitnessStackItem>);

impl Witness {
    /// An empty witness stack, used for non-segwit inputs within a segwit-serialized
    /// transaction.
    pub fn empty() -> Self {
        Self(vec![])
    }

    /// True if the witness stack has no items.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl ByteFormat for Witness {
    type Error = SerError;

    fn serialized_length(&self) -> usize {
        tx_codec::ser::prefix_byte_len(self.0.len() as u64) as usize
            + self.0.iter().map(|i| i.serialized_length()).sum::<usize>()
    }

    fn read_from<R>(reader: &mut R, _limit: usize) -> SerResult<Self>
    where
        R: std::io::Read,
    {
        let count = Self::read_compact_int(reader)?;
        let mut items = Vec::with_capacity(count as usize);
        for _ in 0..count {
            items.push(WitnessStackItem::read_from(reader, 0)?);
        }
        Ok(Self(items))
    }

    fn write_to<W>(&self, writer: &mut W) -> SerResult<usize>
    where
        W: std::io::Write,
    {
        Self::write_prefix_vec(writer, &self.0)
    }
}

/// One decoded element of a script: either a single-byte opcode, or a pushdata with its raw
/// payload. Produced by [`decode_ops`]; only used for template classification and for
/// constructing finalized scripts, never for full interpretation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ScriptOp {
    /// A non-push opcode.
    Op(u8),
    /// A pushdata opcode together with the bytes it pushes.
    Push(Vec<u8>),
}

/// Decode a script's bytes into a flat list of opcodes/pushdatas. Returns `None` if a pushdata
/// opcode's declared length runs past the end of the script (malformed script); this is treated
/// as "does not match any known template", not an error, since scripts of unknown shape are
/// legitimately `NonStandard`.
pub fn decode_ops(script: &[u8]) -> Option<Vec<ScriptOp>> {
    let mut ops = vec![];
    let mut i = 0;
    while i < script.len() {
        let byte = script[i];
        i += 1;
        match byte {
            0x01..=0x4b => {
                let len = byte as usize;
                let end = i.checked_add(len)?;
                ops.push(ScriptOp::Push(script.get(i..end)?.to_vec()));
                i = end;
            }
            OP_PUSHDATA1 => {
                let len = *script.get(i)? as usize;
                i += 1;
                let end = i.checked_add(len)?;
                ops.push(ScriptOp::Push(script.get(i..end)?.to_vec()));
                i = end;
            }
            OP_PUSHDATA2 => {
                let lo = *script.get(i)? as usize;
                let hi = *script.get(i + 1)? as usize;
                i += 2;
                let len = lo | (hi << 8);
                let end = i.checked_add(len)?;
                ops.push(ScriptOp::Push(script.get(i..end)?.to_vec()));
                i = end;
            }
            OP_PUSHDATA4 => {
                let b = script.get(i..i + 4)?;
                let len = u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as usize;
                i += 4;
                let end = i.checked_add(len)?;
                ops.push(ScriptOp::Push(script.get(i..end)?.to_vec()));
                i = end;
            }
            op => ops.push(ScriptOp::Op(op)),
        }
    }
    Some(ops)
}

/// Encode a single pushdata using the shortest valid opcode for its length, and append it to
/// `out`. Mirrors what a script compiler does for literal data pushes.
pub fn push_data(out: &mut Vec<u8>, data: &[u8]) {
    match data.len() {
        0 => out.push(crate::opcodes::OP_0),
        1..=0x4b => {
            out.push(data.len() as u8);
            out.extend_from_slice(data);
        }
        0x4c..=0xff => {
            out.push(OP_PUSHDATA1);
            out.push(data.len() as u8);
            out.extend_from_slice(data);
        }
        0x100..=0xffff => {
            out.push(OP_PUSHDATA2);
            out.extend_from_slice(&(data.len() as u16).to_le_bytes());
            out.extend_from_slice(data);
        }
        _ => {
            out.push(OP_PUSHDATA4);
            out.extend_from_slice(&(data.len() as u32).to_le_bytes());
            out.extend_from_slice(data);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn it_round_trips_simple_pushes() {
        let mut script = vec![];
        push_data(&mut script, &[1, 2, 3]);
        push_data(&mut script, &[]);
        let ops = decode_ops(&script).unwrap();
        assert_eq!(
            ops,
            vec![
                ScriptOp::Push(vec![1, 2, 3]),
                ScriptOp::Op(crate::opcodes::OP_0)
            ]
        );
    }

    #[test]
    fn it_rejects_truncated_pushdata() {
        // Declares a 5-byte push but only supplies 2.
        let script = [0x05u8, 0x01, 0x02];
        assert!(decode_ops(&script).is_none());
    }
}
