//! The finalizer: turns a signed-enough PSBT input into its final `scriptSig`/witness.
//!
//! Finalization is driven entirely by [`btc_script::classify::classify`]: the finalizer never
//! interprets a script directly, it only recognizes shapes it knows how to produce an unlocking
//! witness/scriptSig for. A template it does not recognize (or a conditional with no
//! satisfiable branch) is reported, not guessed at.

use crate::envelope::Psbt;
use crate::error::PsbtError;
use crate::input::PsbtInput;
use btc_script::build::{empty_script_sig, p2pk_script_sig, p2pkh_script_sig, p2wpkh_witness, wrap_conditional_witness, wrap_p2sh, wrap_p2wsh};
use btc_script::classify::{classify, ScriptTemplate};
use btc_script::script::{push_data, RedeemScript, Script, ScriptSig, Witness, WitnessScript};
use std::collections::BTreeSet;
use tx_codec::hashes::{hash160, sha256, Hash160Digest};

/// Recursion bound on nested conditional/timeout/timelock templates. Guards against a
/// pathologically (or maliciously) deep script tree driving unbounded recursion.
pub const MAX_FINALIZE_DEPTH: usize = 10;

fn items_to_script(items: &[Vec<u8>]) -> Script {
    let mut buf = vec![];
    for item in items {
        push_data(&mut buf, item);
    }
    Script::new(buf)
}

fn find_sig_for_pubkey(input: &PsbtInput, pubkey: &[u8]) -> Option<Vec<u8>> {
    input
        .partial_sigs()
        .into_iter()
        .find(|(pk, _)| pk == pubkey)
        .map(|(_, sig)| sig)
}

fn find_sig_by_hash160(input: &PsbtInput, hash: Hash160Digest) -> Option<(Vec<u8>, Vec<u8>)> {
    input
        .partial_sigs()
        .into_iter()
        .find(|(pk, _)| hash160(pk) == hash)
}

/// Resolve the stack items a recognized *spending* template needs, given the signatures
/// available on `input`. Used both for a scriptPubKey's own template and, recursively, for the
/// contents of a redeem/witness script or a conditional branch. The returned items are a flat
/// ordered list of data pushes; the caller decides whether to concatenate them into a legacy
/// `scriptSig` or lay them out as witness stack items, since both are built from the same shape.
fn resolve_items(
    template: &ScriptTemplate,
    input: &PsbtInput,
    index: usize,
    depth: usize,
) -> Result<Vec<Vec<u8>>, PsbtError> {
    if depth > MAX_FINALIZE_DEPTH {
        return Err(PsbtError::RecursionLimit(index));
    }

    match template {
        ScriptTemplate::Empty => Ok(vec![]),

        ScriptTemplate::P2pk { pubkey } => {
            let sig = find_sig_for_pubkey(input, pubkey).ok_or(PsbtError::MissingRecord {
                index,
                what: "a partial signature for the p2pk pubkey",
            })?;
            Ok(vec![sig])
        }

        ScriptTemplate::P2pkh { pubkey_hash } => {
            let (pubkey, sig) =
                find_sig_by_hash160(input, *pubkey_hash).ok_or(PsbtError::MissingRecord {
                    index,
                    what: "a partial signature matching the p2pkh pubkey hash",
                })?;
            Ok(vec![sig, pubkey])
        }

        ScriptTemplate::MultiSig { required, pubkeys } => {
            let mut sigs = vec![];
            for pubkey in pubkeys {
                if let Some(sig) = find_sig_for_pubkey(input, pubkey) {
                    sigs.push(sig);
                    if sigs.len() == *required as usize {
                        break;
                    }
                }
            }
            if sigs.len() < *required as usize {
                return Err(PsbtError::UnsatisfiableBranch(index));
            }
            // The famous CHECKMULTISIG off-by-one: a leading dummy element, then each matched
            // signature in script order.
            let mut items = vec![vec![]];
            items.extend(sigs);
            Ok(items)
        }

        ScriptTemplate::Conditional { if_true, if_false } => {
            resolve_conditional(if_true.as_ref().as_ref(), if_false.as_ref().as_ref(), input, index, depth)
        }

        ScriptTemplate::P2pkWithTimeout {
            pubkey_a,
            pubkey_b,
            ..
        } => {
            if let Some(sig) = find_sig_for_pubkey(input, pubkey_a) {
                return Ok(wrap_conditional_witness(vec![sig], true));
            }
            // The timeout itself is consensus-enforced on the spending transaction's
            // locktime/sequence field; the finalizer only needs the matching signature.
            if let Some(sig) = find_sig_for_pubkey(input, pubkey_b) {
                return Ok(wrap_conditional_witness(vec![sig], false));
            }
            Err(PsbtError::UnsatisfiableBranch(index))
        }

        ScriptTemplate::Cltv { inner, .. } | ScriptTemplate::Csv { inner, .. } => {
            let inner_template = classify(inner.as_ref().as_ref());
            resolve_items(&inner_template, input, index, depth + 1)
        }

        ScriptTemplate::P2sh { .. }
        | ScriptTemplate::P2wpkh { .. }
        | ScriptTemplate::P2wsh { .. }
        | ScriptTemplate::WitnessCommitment { .. }
        | ScriptTemplate::UnassignedWitness { .. }
        | ScriptTemplate::NonStandard => Err(PsbtError::Unsupported(index)),
    }
}

/// The set of pubkey hashes a leaf template needs a signature from. `Empty` (and any template
/// this finalizer has no signer-set notion for) has no required hash, which only ever matches
/// when no signatures are offered at all — see `resolve_conditional`.
fn required_hash_set(template: &ScriptTemplate) -> Vec<Hash160Digest> {
    match template {
        ScriptTemplate::P2pk { pubkey } => vec![hash160(pubkey)],
        ScriptTemplate::P2pkh { pubkey_hash } => vec![*pubkey_hash],
        ScriptTemplate::MultiSig { pubkeys, .. } => pubkeys.iter().map(|pk| hash160(pk)).collect(),
        ScriptTemplate::Cltv { inner, .. } | ScriptTemplate::Csv { inner, .. } => {
            required_hash_set(&classify(inner.as_ref().as_ref()))
        }
        _ => vec![],
    }
}

/// One leaf of a (possibly nested) `OP_IF`/`OP_ELSE` tree: the sequence of branch choices
/// (`true`/`false`, outermost first) that reaches it, the set of pubkey hashes it needs a
/// signature from, and its own classified template.
type ConditionalLeaf = (Vec<bool>, Vec<Hash160Digest>, ScriptTemplate);

/// Flatten a conditional's two branches into their leaves, recursing into any branch that is
/// itself a nested conditional.
fn flatten_conditional(
    if_true: &[u8],
    if_false: &[u8],
    index: usize,
    depth: usize,
    out: &mut Vec<ConditionalLeaf>,
) -> Result<(), PsbtError> {
    if depth > MAX_FINALIZE_DEPTH {
        return Err(PsbtError::RecursionLimit(index));
    }
    for (branch_bytes, branch_flag) in [(if_true, true), (if_false, false)] {
        let template = classify(branch_bytes);
        if let ScriptTemplate::Conditional { if_true, if_false } = &template {
            let mut nested = vec![];
            flatten_conditional(
                if_true.as_ref().as_ref(),
                if_false.as_ref().as_ref(),
                index,
                depth + 1,
                &mut nested,
            )?;
            for (mut path, required, leaf) in nested {
                path.insert(0, branch_flag);
                out.push((path, required, leaf));
            }
        } else {
            let required = required_hash_set(&template);
            out.push((vec![branch_flag], required, template));
        }
    }
    Ok(())
}

/// Resolve a (possibly nested) conditional per the flatten/hash-subset algorithm: flatten the
/// tree into leaves, compute hash160 of every pubkey with a partial signature on this input, and
/// pick the leaf whose required hash set is satisfied — non-empty and a subset of the provided
/// hashes, or empty only when no signatures are present at all. A leaf requiring nothing never
/// wins over a leaf that could use the signatures actually on hand; this keeps a one-signature
/// offer from being silently downgraded to a trivially-true branch it wasn't meant to unlock.
fn resolve_conditional(
    if_true: &[u8],
    if_false: &[u8],
    input: &PsbtInput,
    index: usize,
    depth: usize,
) -> Result<Vec<Vec<u8>>, PsbtError> {
    if depth > MAX_FINALIZE_DEPTH {
        return Err(PsbtError::RecursionLimit(index));
    }

    let mut leaves = vec![];
    flatten_conditional(if_true, if_false, index, depth, &mut leaves)?;

    let provided: BTreeSet<Hash160Digest> = input
        .partial_sigs()
        .into_iter()
        .map(|(pubkey, _)| hash160(&pubkey))
        .collect();

    for (path, required, leaf_template) in &leaves {
        let satisfied = if required.is_empty() {
            provided.is_empty()
        } else {
            required.iter().all(|h| provided.contains(h))
        };
        if !satisfied {
            continue;
        }
        if let Ok(items) = resolve_items(leaf_template, input, index, depth + 1) {
            let mut wrapped = items;
            for &branch in path.iter().rev() {
                wrapped = wrap_conditional_witness(wrapped, branch);
            }
            return Ok(wrapped);
        }
    }
    Err(PsbtError::UnsatisfiableBranch(index))
}

enum Finalized {
    ScriptSigOnly(ScriptSig),
    WitnessOnly(Witness),
    Both(ScriptSig, Witness),
}

fn finalize_script_pubkey(
    spk_template: &ScriptTemplate,
    input: &PsbtInput,
    index: usize,
) -> Result<Finalized, PsbtError> {
    match spk_template {
        ScriptTemplate::Empty => Ok(Finalized::ScriptSigOnly(empty_script_sig())),

        ScriptTemplate::P2pk { .. } | ScriptTemplate::P2pkh { .. } => {
            let items = resolve_items(spk_template, input, index, 0)?;
            Ok(Finalized::ScriptSigOnly(directly_built(spk_template, &items)))
        }

        ScriptTemplate::MultiSig { .. } | ScriptTemplate::Conditional { .. } | ScriptTemplate::P2pkWithTimeout { .. } | ScriptTemplate::Cltv { .. } | ScriptTemplate::Csv { .. } => {
            let items = resolve_items(spk_template, input, index, 0)?;
            Ok(Finalized::ScriptSigOnly(items_to_script(&items)))
        }

        ScriptTemplate::P2wpkh { pubkey_hash } => {
            let (pubkey, sig) =
                find_sig_by_hash160(input, *pubkey_hash).ok_or(PsbtError::MissingRecord {
                    index,
                    what: "a partial signature matching the p2wpkh pubkey hash",
                })?;
            Ok(Finalized::WitnessOnly(p2wpkh_witness(&sig, &pubkey)))
        }

        ScriptTemplate::P2wsh { script_hash } => {
            let witness_script: WitnessScript =
                input.witness_script().ok_or(PsbtError::MissingRecord {
                    index,
                    what: "a witness script for the p2wsh input",
                })?;
            if sha256(witness_script.as_ref()).0 != script_hash.0 {
                return Err(PsbtError::Unsupported(index));
            }
            let inner_template = classify(witness_script.as_ref());
            let items = resolve_items(&inner_template, input, index, 1)?;
            Ok(Finalized::WitnessOnly(wrap_p2wsh(items, &witness_script)))
        }

        ScriptTemplate::P2sh { script_hash } => {
            let redeem_script: RedeemScript =
                input.redeem_script().ok_or(PsbtError::MissingRecord {
                    index,
                    what: "a redeem script for the p2sh input",
                })?;
            if hash160(redeem_script.as_ref()).0 != script_hash.0 {
                return Err(PsbtError::Unsupported(index));
            }
            let inner_template = classify(redeem_script.as_ref());
            match inner_template {
                ScriptTemplate::P2wpkh { pubkey_hash } => {
                    let (pubkey, sig) =
                        find_sig_by_hash160(input, pubkey_hash).ok_or(PsbtError::MissingRecord {
                            index,
                            what: "a partial signature matching the p2sh-p2wpkh pubkey hash",
                        })?;
                    let witness = p2wpkh_witness(&sig, &pubkey);
                    let script_sig = wrap_p2sh(&empty_script_sig(), &redeem_script);
                    Ok(Finalized::Both(script_sig, witness))
                }
                ScriptTemplate::P2wsh { script_hash: inner_hash } => {
                    let witness_script: WitnessScript =
                        input.witness_script().ok_or(PsbtError::MissingRecord {
                            index,
                            what: "a witness script for the p2sh-p2wsh input",
                        })?;
                    if sha256(witness_script.as_ref()).0 != inner_hash.0 {
                        return Err(PsbtError::Unsupported(index));
                    }
                    let leaf_template = classify(witness_script.as_ref());
                    let items = resolve_items(&leaf_template, input, index, 1)?;
                    let witness = wrap_p2wsh(items, &witness_script);
                    let script_sig = wrap_p2sh(&empty_script_sig(), &redeem_script);
                    Ok(Finalized::Both(script_sig, witness))
                }
                other => {
                    let items = resolve_items(&other, input, index, 1)?;
                    let inner_script_sig = items_to_script(&items);
                    Ok(Finalized::ScriptSigOnly(wrap_p2sh(&inner_script_sig, &redeem_script)))
                }
            }
        }

        ScriptTemplate::NonStandard
        | ScriptTemplate::UnassignedWitness { .. }
        | ScriptTemplate::WitnessCommitment { .. } => Err(PsbtError::Unsupported(index)),
    }
}

fn directly_built(template: &ScriptTemplate, items: &[Vec<u8>]) -> ScriptSig {
    match template {
        ScriptTemplate::P2pk { .. } => p2pk_script_sig(&items[0]),
        ScriptTemplate::P2pkh { .. } => p2pkh_script_sig(&items[0], &items[1]),
        _ => items_to_script(items),
    }
}

impl Psbt {
    /// Finalize a single input: classify its spent output's script, resolve the required
    /// signatures into a concrete `scriptSig`/witness, and replace the input's pre-signing
    /// records with the finalized form. A no-op if the input is already finalized.
    pub fn finalize_input(&mut self, index: usize) -> Result<(), PsbtError> {
        let input = self.inputs.get(index).ok_or(PsbtError::BadIndex {
            index: index as u32,
            len: self.inputs.len(),
        })?;
        if input.is_finalized() {
            return Ok(());
        }

        let tx = self.global.tx()?;
        let vout = tx
            .inputs
            .get(index)
            .ok_or(PsbtError::BadIndex {
                index: index as u32,
                len: tx.inputs.len(),
            })?
            .previous_output
            .idx;
        let spk = input.spent_output(vout, index)?.script_pubkey;
        let template = classify(spk.as_ref());

        let finalized = finalize_script_pubkey(&template, input, index)?;
        let (script_sig, witness) = match finalized {
            Finalized::ScriptSigOnly(s) => (Some(s), None),
            Finalized::WitnessOnly(w) => (None, Some(w)),
            Finalized::Both(s, w) => (Some(s), Some(w)),
        };

        self.inputs[index] = input.finalize_with(script_sig, witness)?;
        Ok(())
    }

    /// Finalize every input, continuing past any individual failure. Returns one result per
    /// input, in order, so a caller can report which specific inputs could not be finalized
    /// without losing progress on the ones that could.
    pub fn finalize_all(&mut self) -> Vec<Result<(), PsbtError>> {
        (0..self.inputs.len())
            .map(|i| self.finalize_input(i))
            .collect()
    }

    /// True once every input carries a finalized `scriptSig` or witness.
    pub fn is_fully_finalized(&self) -> bool {
        self.inputs.iter().all(|i| i.is_finalized())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use btc_script::opcodes::*;
    use btc_script::tx::{OutPoint, Transaction, TxIn, TxOut};
    use tx_codec::hashes::Hash256Digest;

    fn tx_spending_one(script_pubkey_value: u64, prev_script: ScriptSig) -> (Transaction, Transaction) {
        let prev_tx = Transaction {
            version: 2,
            inputs: vec![TxIn::new(OutPoint::new(Hash256Digest([1; 32]), 0))],
            outputs: vec![TxOut::new(script_pubkey_value, prev_script)],
            witnesses: vec![],
            locktime: 0,
        };
        let spending = Transaction {
            version: 2,
            inputs: vec![TxIn::new(OutPoint::new(prev_tx.txid(), 0))],
            outputs: vec![TxOut::new(900, vec![])],
            witnesses: vec![],
            locktime: 0,
        };
        (prev_tx, spending)
    }

    fn p2pkh_script(hash: [u8; 20]) -> ScriptSig {
        let mut v = vec![OP_DUP, OP_HASH160, 0x14];
        v.extend_from_slice(&hash);
        v.push(OP_EQUALVERIFY);
        v.push(OP_CHECKSIG);
        ScriptSig::new(v)
    }

    #[test]
    fn it_finalizes_a_p2pkh_input() {
        let pubkey = vec![0x02; 33];
        let hash = hash160(&pubkey);
        let (prev_tx, spending_tx) = tx_spending_one(1000, p2pkh_script(hash.0));

        let mut psbt = Psbt::from_unsigned_tx(&spending_tx).unwrap();
        psbt.inputs[0].insert_non_witness_utxo(&prev_tx).unwrap();
        psbt.inputs[0].insert_partial_sig(&pubkey, &[0xde, 0xad]);

        psbt.finalize_input(0).unwrap();
        assert!(psbt.inputs[0].is_finalized());
        let script_sig = psbt.inputs[0].finalized_script_sig().unwrap();
        assert!(script_sig.as_ref().ends_with(&pubkey));
    }

    #[test]
    fn it_finalizes_a_p2wpkh_input() {
        let pubkey = vec![0x03; 33];
        let hash = hash160(&pubkey);
        let mut spk = vec![OP_0, 0x14];
        spk.extend_from_slice(&hash.0);
        let (prev_tx, spending_tx) = tx_spending_one(1000, ScriptSig::new(spk));

        let mut psbt = Psbt::from_unsigned_tx(&spending_tx).unwrap();
        psbt.inputs[0]
            .insert_witness_utxo(&prev_tx.outputs[0])
            .unwrap();
        psbt.inputs[0].insert_partial_sig(&pubkey, &[0xbe, 0xef]);

        psbt.finalize_input(0).unwrap();
        let witness = psbt.inputs[0].finalized_script_witness().unwrap().unwrap();
        assert_eq!(witness.0.len(), 2);
    }

    #[test]
    fn it_finalizes_a_p2sh_multisig_input() {
        let pk1 = vec![0x02; 33];
        let pk2 = vec![0x03; 33];
        let mut redeem = vec![OP_1 + 1]; // OP_2
        redeem.push(33);
        redeem.extend_from_slice(&pk1);
        redeem.push(33);
        redeem.extend_from_slice(&pk2);
        redeem.push(OP_1 + 1); // OP_2
        redeem.push(OP_CHECKMULTISIG);
        let redeem_script = RedeemScript::new(redeem);
        let script_hash = hash160(redeem_script.as_ref());
        let mut spk = vec![OP_HASH160, 0x14];
        spk.extend_from_slice(&script_hash.0);
        spk.push(OP_EQUAL);
        let (prev_tx, spending_tx) = tx_spending_one(1000, ScriptSig::new(spk));

        let mut psbt = Psbt::from_unsigned_tx(&spending_tx).unwrap();
        psbt.inputs[0].insert_non_witness_utxo(&prev_tx).unwrap();
        psbt.inputs[0].insert_redeem_script(&redeem_script);
        psbt.inputs[0].insert_partial_sig(&pk1, &[1, 1, 1]);
        psbt.inputs[0].insert_partial_sig(&pk2, &[2, 2, 2]);

        psbt.finalize_input(0).unwrap();
        let script_sig = psbt.inputs[0].finalized_script_sig().unwrap();
        assert!(script_sig.as_ref().ends_with(redeem_script.as_ref()));
    }

    #[test]
    fn it_finalizes_a_p2sh_p2wsh_multisig_input() {
        let pk1 = vec![0x02; 33];
        let pk2 = vec![0x03; 33];
        let mut witness_script_bytes = vec![OP_1 + 1]; // OP_2
        witness_script_bytes.push(33);
        witness_script_bytes.extend_from_slice(&pk1);
        witness_script_bytes.push(33);
        witness_script_bytes.extend_from_slice(&pk2);
        witness_script_bytes.push(OP_1 + 1); // OP_2
        witness_script_bytes.push(OP_CHECKMULTISIG);
        let witness_script = WitnessScript::new(witness_script_bytes);
        let script_hash = sha256(witness_script.as_ref());

        let mut redeem = vec![OP_0, 0x20];
        redeem.extend_from_slice(&script_hash.0);
        let redeem_script = RedeemScript::new(redeem);
        let redeem_hash = hash160(redeem_script.as_ref());

        let mut spk = vec![OP_HASH160, 0x14];
        spk.extend_from_slice(&redeem_hash.0);
        spk.push(OP_EQUAL);
        let (prev_tx, spending_tx) = tx_spending_one(1000, ScriptSig::new(spk));

        let mut psbt = Psbt::from_unsigned_tx(&spending_tx).unwrap();
        psbt.inputs[0].insert_non_witness_utxo(&prev_tx).unwrap();
        psbt.inputs[0].insert_redeem_script(&redeem_script);
        psbt.inputs[0].insert_witness_script(&witness_script);
        psbt.inputs[0].insert_partial_sig(&pk1, &[1, 1, 1]);
        psbt.inputs[0].insert_partial_sig(&pk2, &[2, 2, 2]);

        psbt.finalize_input(0).unwrap();

        let script_sig = psbt.inputs[0].finalized_script_sig().unwrap();
        assert!(script_sig.as_ref().ends_with(redeem_script.as_ref()));

        let witness = psbt.inputs[0].finalized_script_witness().unwrap().unwrap();
        assert_eq!(witness.0.len(), 4);
        assert!(witness.0[0].as_ref().is_empty());
        assert_eq!(witness.0[1].as_ref(), &[1, 1, 1]);
        assert_eq!(witness.0[2].as_ref(), &[2, 2, 2]);
        assert_eq!(witness.0[3].as_ref(), witness_script.as_ref());
    }

    #[test]
    fn it_reports_unsatisfiable_multisig() {
        let pk1 = vec![0x02; 33];
        let pk2 = vec![0x03; 33];
        let mut spk = vec![OP_1 + 1];
        spk.push(33);
        spk.extend_from_slice(&pk1);
        spk.push(33);
        spk.extend_from_slice(&pk2);
        spk.push(OP_1 + 1);
        spk.push(OP_CHECKMULTISIG);
        let (prev_tx, spending_tx) = tx_spending_one(1000, ScriptSig::new(spk));

        let mut psbt = Psbt::from_unsigned_tx(&spending_tx).unwrap();
        psbt.inputs[0].insert_non_witness_utxo(&prev_tx).unwrap();
        psbt.inputs[0].insert_partial_sig(&pk1, &[1]);

        assert!(matches!(
            psbt.finalize_input(0),
            Err(PsbtError::UnsatisfiableBranch(0))
        ));
    }

    #[test]
    fn it_rejects_nonstandard_templates() {
        let (prev_tx, spending_tx) = tx_spending_one(1000, ScriptSig::new(vec![OP_RETURN]));
        let mut psbt = Psbt::from_unsigned_tx(&spending_tx).unwrap();
        psbt.inputs[0].insert_non_witness_utxo(&prev_tx).unwrap();
        assert!(matches!(
            psbt.finalize_input(0),
            Err(PsbtError::Unsupported(0))
        ));
    }

    fn multisig_or_empty_conditional_script(pk1: &[u8], pk2: &[u8]) -> ScriptSig {
        let mut multisig = vec![OP_1 + 1]; // OP_2
        multisig.push(33);
        multisig.extend_from_slice(pk1);
        multisig.push(33);
        multisig.extend_from_slice(pk2);
        multisig.push(OP_1 + 1); // OP_2
        multisig.push(OP_CHECKMULTISIG);

        let mut script = vec![OP_IF];
        script.extend_from_slice(&multisig);
        script.push(OP_ELSE);
        script.push(OP_ENDIF);
        ScriptSig::new(script)
    }

    #[test]
    fn it_finalizes_the_multisig_branch_of_a_conditional_when_both_sigs_are_present() {
        let pk1 = vec![0x02; 33];
        let pk2 = vec![0x03; 33];
        let spk = multisig_or_empty_conditional_script(&pk1, &pk2);
        let (prev_tx, spending_tx) = tx_spending_one(1000, spk);

        let mut psbt = Psbt::from_unsigned_tx(&spending_tx).unwrap();
        psbt.inputs[0].insert_non_witness_utxo(&prev_tx).unwrap();
        psbt.inputs[0].insert_partial_sig(&pk1, &[1, 1, 1]);
        psbt.inputs[0].insert_partial_sig(&pk2, &[2, 2, 2]);

        psbt.finalize_input(0).unwrap();
        let script_sig = psbt.inputs[0].finalized_script_sig().unwrap();
        // The true branch (the multisig) was selected: the trailing branch-selector push is 0x01.
        assert!(script_sig.as_ref().ends_with(&[0x01]));
    }

    #[test]
    fn it_finalizes_the_empty_branch_of_a_conditional_when_no_sigs_are_present() {
        let pk1 = vec![0x02; 33];
        let pk2 = vec![0x03; 33];
        let spk = multisig_or_empty_conditional_script(&pk1, &pk2);
        let (prev_tx, spending_tx) = tx_spending_one(1000, spk);

        let mut psbt = Psbt::from_unsigned_tx(&spending_tx).unwrap();
        psbt.inputs[0].insert_non_witness_utxo(&prev_tx).unwrap();

        psbt.finalize_input(0).unwrap();
        let script_sig = psbt.inputs[0].finalized_script_sig().unwrap();
        // The false (empty) branch was selected: no data pushes, just the 0x00 branch selector.
        assert_eq!(script_sig.as_ref(), &[0x00]);
    }

    #[test]
    fn it_rejects_a_conditional_when_a_lone_signature_fits_no_branch() {
        // Only one of the two multisig signatures is present: the multisig branch needs both
        // (its required hash set is not a subset of what's provided), and the empty branch
        // requires none but a signature IS present, so it must not be silently chosen either.
        let pk1 = vec![0x02; 33];
        let pk2 = vec![0x03; 33];
        let spk = multisig_or_empty_conditional_script(&pk1, &pk2);
        let (prev_tx, spending_tx) = tx_spending_one(1000, spk);

        let mut psbt = Psbt::from_unsigned_tx(&spending_tx).unwrap();
        psbt.inputs[0].insert_non_witness_utxo(&prev_tx).unwrap();
        psbt.inputs[0].insert_partial_sig(&pk1, &[1, 1, 1]);

        assert!(matches!(
            psbt.finalize_input(0),
            Err(PsbtError::UnsatisfiableBranch(0))
        ));
    }

    #[test]
    fn finalize_input_is_a_no_op_once_finalized() {
        let pubkey = vec![0x02; 33];
        let hash = hash160(&pubkey);
        let (prev_tx, spending_tx) = tx_spending_one(1000, p2pkh_script(hash.0));
        let mut psbt = Psbt::from_unsigned_tx(&spending_tx).unwrap();
        psbt.inputs[0].insert_non_witness_utxo(&prev_tx).unwrap();
        psbt.inputs[0].insert_partial_sig(&pubkey, &[1, 2]);
        psbt.finalize_input(0).unwrap();
        let after_first = psbt.inputs[0].clone();
        psbt.finalize_input(0).unwrap();
        assert_eq!(psbt.inputs[0], after_first);
    }
}
