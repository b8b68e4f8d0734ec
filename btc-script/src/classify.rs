//! Classifies a raw script into one of a small set of standard templates.
//!
//! The finalizer (in the `psbt` crate) drives all of its decisions off this classification: it
//! never interprets a script directly, it only recognizes shapes it knows how to produce a
//! witness/scriptSig for. Anything else is `NonStandard` and finalization refuses it.

use crate::opcodes::*;
use crate::script::{decode_ops, push_data, Script, ScriptOp};
use tx_codec::hashes::{Hash160Digest, Hash256Digest};

/// Which timeout opcode gates the "after timeout" branch of a [`ScriptTemplate::P2PKWithTimeout`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TimeoutKind {
    /// Absolute timelock (`OP_CHECKLOCKTIMEVERIFY`).
    Cltv,
    /// Relative timelock (`OP_CHECKSEQUENCEVERIFY`).
    Csv,
}

/// A classified script template. Produced by [`classify`]; consumed by the finalizer's
/// recursive dispatch and by the script-sig/witness builders in [`crate::build`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ScriptTemplate {
    /// A zero-length script. Finalizes to a trivially-true `scriptSig`.
    Empty,
    /// `<pubkey> OP_CHECKSIG`.
    P2pk {
        /// The serialized public key (33 or 65 bytes).
        pubkey: Vec<u8>,
    },
    /// `OP_DUP OP_HASH160 <pubkey_hash> OP_EQUALVERIFY OP_CHECKSIG`.
    P2pkh {
        /// hash160 of the spending public key.
        pubkey_hash: Hash160Digest,
    },
    /// `OP_HASH160 <script_hash> OP_EQUAL`.
    P2sh {
        /// hash160 of the redeem script.
        script_hash: Hash160Digest,
    },
    /// `OP_0 <pubkey_hash>`, a v0 witness program committing to a pubkey hash.
    P2wpkh {
        /// hash160 of the spending public key.
        pubkey_hash: Hash160Digest,
    },
    /// `OP_0 <script_hash>`, a v0 witness program committing to a witness script.
    P2wsh {
        /// SHA256 (single, not double) of the witness script. Stored as a `Hash256Digest`
        /// newtype purely for its fixed 32-byte size; no double-hashing is implied.
        script_hash: Hash256Digest,
    },
    /// `OP_m <pubkey_1> ... <pubkey_n> OP_n OP_CHECKMULTISIG`.
    MultiSig {
        /// Number of signatures required.
        required: u8,
        /// The `n` public keys, in script order.
        pubkeys: Vec<Vec<u8>>,
    },
    /// `OP_IF <true_branch> OP_ELSE <false_branch> OP_ENDIF`, a general script-level branch.
    Conditional {
        /// The script executed when the `IF` condition is satisfied.
        if_true: Box<Script>,
        /// The script executed otherwise.
        if_false: Box<Script>,
    },
    /// A common two-party-with-timeout template:
    /// `OP_IF <pubkey_a> OP_CHECKSIG OP_ELSE <locktime> OP_CLTV|OP_CSV OP_DROP <pubkey_b>
    /// OP_CHECKSIG OP_ENDIF`.
    P2pkWithTimeout {
        /// Public key that can spend immediately.
        pubkey_a: Vec<u8>,
        /// The locktime/sequence value gating `pubkey_b`.
        timeout: i64,
        /// Whether `timeout` is an absolute (`CLTV`) or relative (`CSV`) lock.
        kind: TimeoutKind,
        /// Public key that can only spend after `timeout`.
        pubkey_b: Vec<u8>,
    },
    /// `<locktime> OP_CHECKLOCKTIMEVERIFY OP_DROP <inner>`.
    Cltv {
        /// The required locktime.
        locktime: i64,
        /// The script guarded by the timelock.
        inner: Box<Script>,
    },
    /// `<sequence> OP_CHECKSEQUENCEVERIFY OP_DROP <inner>`.
    Csv {
        /// The required relative sequence.
        sequence: i64,
        /// The script guarded by the timelock.
        inner: Box<Script>,
    },
    /// `OP_RETURN <0xaa21a9ed ++ 32-byte hash>`, the BIP-141 witness commitment output.
    WitnessCommitment {
        /// The 32-byte commitment hash (without the 4-byte header).
        commitment: Hash256Digest,
    },
    /// `OP_n <2..40 byte program>` for witness version `n` in `1..=16` — a witness program this
    /// crate does not know how to spend (e.g. a v1/taproot output).
    UnassignedWitness {
        /// The witness version (1-16).
        version: u8,
        /// The witness program bytes.
        program: Vec<u8>,
    },
    /// Does not match any recognized template.
    NonStandard,
}

fn encode_ops(ops: &[ScriptOp]) -> Vec<u8> {
    let mut out = vec![];
    for op in ops {
        match op {
            ScriptOp::Op(b) => out.push(*b),
            ScriptOp::Push(data) => push_data(&mut out, data),
        }
    }
    out
}

fn as_minimal_number(data: &[u8]) -> Option<i64> {
    if data.len() > 8 {
        return None;
    }
    let mut buf = [0u8; 8];
    buf[..data.len()].copy_from_slice(data);
    let mut n = i64::from_le_bytes(buf);
    if let Some(&last) = data.last() {
        if last & 0x80 != 0 {
            n &= !(0x80i64 << ((data.len() as i64 - 1) * 8));
            n = -n;
        }
    }
    Some(n)
}

/// Split `OP_IF <a> OP_ELSE <b> OP_ENDIF` into `(a, b)`, respecting nested `IF`/`NOTIF`/`ENDIF`.
/// Returns `None` if `ops` is not exactly a single top-level if/else/endif block.
fn split_if_else(ops: &[ScriptOp]) -> Option<(&[ScriptOp], &[ScriptOp])> {
    if ops.first() != Some(&ScriptOp::Op(OP_IF)) || ops.last() != Some(&ScriptOp::Op(OP_ENDIF)) {
        return None;
    }
    let body = &ops[1..ops.len() - 1];
    let mut depth = 0i32;
    let mut else_at = None;
    for (i, op) in body.iter().enumerate() {
        match op {
            ScriptOp::Op(OP_IF) | ScriptOp::Op(OP_NOTIF) => depth += 1,
            ScriptOp::Op(OP_ENDIF) => depth -= 1,
            ScriptOp::Op(OP_ELSE) if depth == 0 => {
                else_at = Some(i);
                break;
            }
            _ => {}
        }
    }
    let else_at = else_at?;
    Some((&body[..else_at], &body[else_at + 1..]))
}

/// Classify a raw script's bytes into a [`ScriptTemplate`]. Used both for top-level
/// `scriptPubKey`s and, recursively, for the contents of redeem/witness scripts and conditional
/// branches.
pub fn classify(script: &[u8]) -> ScriptTemplate {
    if script.is_empty() {
        return ScriptTemplate::Empty;
    }
    let ops = match decode_ops(script) {
        Some(ops) => ops,
        None => return ScriptTemplate::NonStandard,
    };

    let fixed = classify_fixed_shapes(&ops);
    if fixed != ScriptTemplate::NonStandard {
        return fixed;
    }

    if let Some((true_ops, false_ops)) = split_if_else(&ops) {
        if let Some(template) = classify_p2pk_with_timeout(true_ops, false_ops) {
            return template;
        }
        return ScriptTemplate::Conditional {
            if_true: Box::new(Script::new(encode_ops(true_ops))),
            if_false: Box::new(Script::new(encode_ops(false_ops))),
        };
    }

    if ops.len() >= 3 {
        if let (ScriptOp::Push(n), ScriptOp::Op(OP_CHECKLOCKTIMEVERIFY), ScriptOp::Op(OP_DROP)) =
            (&ops[0], &ops[1], &ops[2])
        {
            if let Some(locktime) = as_minimal_number(n) {
                return ScriptTemplate::Cltv {
                    locktime,
                    inner: Box::new(Script::new(encode_ops(&ops[3..]))),
                };
            }
        }
        if let (ScriptOp::Push(n), ScriptOp::Op(OP_CHECKSEQUENCEVERIFY), ScriptOp::Op(OP_DROP)) =
            (&ops[0], &ops[1], &ops[2])
        {
            if let Some(sequence) = as_minimal_number(n) {
                return ScriptTemplate::Csv {
                    sequence,
                    inner: Box::new(Script::new(encode_ops(&ops[3..]))),
                };
            }
        }
    }

    ScriptTemplate::NonStandard
}

fn classify_p2pk_with_timeout(true_ops: &[ScriptOp], false_ops: &[ScriptOp]) -> Option<ScriptTemplate> {
    let pubkey_a = match true_ops {
        [ScriptOp::Push(pk), ScriptOp::Op(OP_CHECKSIG)] if is_pubkey(pk) => pk.clone(),
        _ => return None,
    };
    let (timeout, kind, pubkey_b) = match false_ops {
        [ScriptOp::Push(n), ScriptOp::Op(OP_CHECKLOCKTIMEVERIFY), ScriptOp::Op(OP_DROP), ScriptOp::Push(pk), ScriptOp::Op(OP_CHECKSIG)]
            if is_pubkey(pk) =>
        {
            (as_minimal_number(n)?, TimeoutKind::Cltv, pk.clone())
        }
        [ScriptOp::Push(n), ScriptOp::Op(OP_CHECKSEQUENCEVERIFY), ScriptOp::Op(OP_DROP), ScriptOp::Push(pk), ScriptOp::Op(OP_CHECKSIG)]
            if is_pubkey(pk) =>
        {
            (as_minimal_number(n)?, TimeoutKind::Csv, pk.clone())
        }
        _ => return None,
    };
    Some(ScriptTemplate::P2pkWithTimeout {
        pubkey_a,
        timeout,
        kind,
        pubkey_b,
    })
}

fn is_pubkey(data: &[u8]) -> bool {
    data.len() == 33 || data.len() == 65
}

fn classify_fixed_shapes(ops: &[ScriptOp]) -> ScriptTemplate {
    use ScriptOp::*;

    if let [Op(OP_DUP), Op(OP_HASH160), Push(h), Op(OP_EQUALVERIFY), Op(OP_CHECKSIG)] = ops {
        if h.len() == 20 {
            let mut buf = [0u8; 20];
            buf.copy_from_slice(h);
            return ScriptTemplate::P2pkh {
                pubkey_hash: Hash160Digest(buf),
            };
        }
    }

    if let [Op(OP_HASH160), Push(h), Op(OP_EQUAL)] = ops {
        if h.len() == 20 {
            let mut buf = [0u8; 20];
            buf.copy_from_slice(h);
            return ScriptTemplate::P2sh {
                script_hash: Hash160Digest(buf),
            };
        }
    }

    if let [Op(v), Push(program)] = ops {
        if let Some(version) = crate::opcodes::as_small_int(*v) {
            if version == 0 && program.len() == 20 {
                let mut buf = [0u8; 20];
                buf.copy_from_slice(program);
                return ScriptTemplate::P2wpkh {
                    pubkey_hash: Hash160Digest(buf),
                };
            }
            if version == 0 && program.len() == 32 {
                let mut buf = [0u8; 32];
                buf.copy_from_slice(program);
                return ScriptTemplate::P2wsh {
                    script_hash: Hash256Digest(buf),
                };
            }
            if (1..=16).contains(&version) && (2..=40).contains(&program.len()) {
                return ScriptTemplate::UnassignedWitness {
                    version,
                    program: program.clone(),
                };
            }
        }
    }

    if let [Op(OP_RETURN), Push(data)] = ops {
        if data.len() == 36 && data.starts_with(&[0xaa, 0x21, 0xa9, 0xed]) {
            let mut buf = [0u8; 32];
            buf.copy_from_slice(&data[4..]);
            return ScriptTemplate::WitnessCommitment {
                commitment: Hash256Digest(buf),
            };
        }
    }

    if let [Push(pk), Op(OP_CHECKSIG)] = ops {
        if is_pubkey(pk) {
            return ScriptTemplate::P2pk { pubkey: pk.clone() };
        }
    }

    if ops.len() >= 4 {
        if let (Op(m_op), Op(n_op), Op(OP_CHECKMULTISIG)) = (
            &ops[0],
            &ops[ops.len() - 2],
            ops.last().expect("len >= 4"),
        ) {
            if let (Some(m), Some(n)) = (
                crate::opcodes::as_small_int(*m_op),
                crate::opcodes::as_small_int(*n_op),
            ) {
                let pubkey_ops = &ops[1..ops.len() - 2];
                if pubkey_ops.len() == n as usize
                    && pubkey_ops.iter().all(|op| matches!(op, Push(pk) if is_pubkey(pk)))
                {
                    let pubkeys = pubkey_ops
                        .iter()
                        .map(|op| match op {
                            Push(pk) => pk.clone(),
                            _ => unreachable!(),
                        })
                        .collect();
                    return ScriptTemplate::MultiSig {
                        required: m,
                        pubkeys,
                    };
                }
            }
        }
    }

    ScriptTemplate::NonStandard
}

#[cfg(test)]
mod test {
    use super::*;

    fn p2pkh_script(hash: [u8; 20]) -> Vec<u8> {
        let mut v = vec![OP_DUP, OP_HASH160, 0x14];
        v.extend_from_slice(&hash);
        v.push(OP_EQUALVERIFY);
        v.push(OP_CHECKSIG);
        v
    }

    #[test]
    fn it_classifies_p2pkh() {
        let hash = [7u8; 20];
        let template = classify(&p2pkh_script(hash));
        assert_eq!(
            template,
            ScriptTemplate::P2pkh {
                pubkey_hash: Hash160Digest(hash)
            }
        );
    }

    #[test]
    fn it_classifies_p2wpkh() {
        let hash = [9u8; 20];
        let mut script = vec![OP_0, 0x14];
        script.extend_from_slice(&hash);
        assert_eq!(
            classify(&script),
            ScriptTemplate::P2wpkh {
                pubkey_hash: Hash160Digest(hash)
            }
        );
    }

    #[test]
    fn it_classifies_2_of_2_multisig() {
        let pk1 = vec![0x02; 33];
        let pk2 = vec![0x03; 33];
        let mut script = vec![OP_1 + 1]; // OP_2
        script.push(33);
        script.extend_from_slice(&pk1);
        script.push(33);
        script.extend_from_slice(&pk2);
        script.push(OP_1 + 1); // OP_2
        script.push(OP_CHECKMULTISIG);
        match classify(&script) {
            ScriptTemplate::MultiSig { required, pubkeys } => {
                assert_eq!(required, 2);
                assert_eq!(pubkeys, vec![pk1, pk2]);
            }
            other => panic!("expected MultiSig, got {:?}", other),
        }
    }

    #[test]
    fn it_classifies_empty() {
        assert_eq!(classify(&[]), ScriptTemplate::Empty);
    }

    #[test]
    fn it_classifies_p2pk_with_timeout() {
        let a = vec![0x02; 33];
        let b = vec![0x03; 33];
        let mut script = vec![OP_IF];
        script.push(33);
        script.extend_from_slice(&a);
        script.push(OP_CHECKSIG);
        script.push(OP_ELSE);
        script.push(0x02);
        script.extend_from_slice(&144i16.to_le_bytes());
        script.push(OP_CHECKSEQUENCEVERIFY);
        script.push(OP_DROP);
        script.push(33);
        script.extend_from_slice(&b);
        script.push(OP_CHECKSIG);
        script.push(OP_ENDIF);
        match classify(&script) {
            ScriptTemplate::P2pkWithTimeout {
                pubkey_a,
                pubkey_b,
                timeout,
                kind,
            } => {
                assert_eq!(pubkey_a, a);
                assert_eq!(pubkey_b, b);
                assert_eq!(timeout, 144);
                assert_eq!(kind, TimeoutKind::Csv);
            }
            other => panic!("expected P2pkWithTimeout, got {:?}", other),
        }
    }
}
