//! Construct a finalized `scriptSig`/witness for each recognized [`crate::classify::ScriptTemplate`].
//!
//! These are pure byte-assembly helpers: they assume the caller (the `psbt` crate's finalizer)
//! has already selected the right signatures/branch and ordered them correctly. Nothing here
//! inspects or validates a signature's contents.

use crate::script::{push_data, RedeemScript, ScriptSig, Witness, WitnessScript, WitnessStackItem};

/// An empty `scriptSig`, satisfying an `Empty` `scriptPubKey` (or serving as the `scriptSig` of
/// a segwit input, where the real unlocking data lives in the witness instead).
pub fn empty_script_sig() -> ScriptSig {
    ScriptSig::null()
}

/// `<sig>`, for `P2pk`.
pub fn p2pk_script_sig(sig: &[u8]) -> ScriptSig {
    let mut buf = vec![];
    push_data(&mut buf, sig);
    ScriptSig::new(buf)
}

/// `<sig> <pubkey>`, for `P2pkh`.
pub fn p2pkh_script_sig(sig: &[u8], pubkey: &[u8]) -> ScriptSig {
    let mut buf = vec![];
    push_data(&mut buf, sig);
    push_data(&mut buf, pubkey);
    ScriptSig::new(buf)
}

/// `<sig>`, for the `P2wpkh`/`P2wsh`-nested `P2pk` branch of a conditional, as a witness item
/// pair: `[sig, pubkey]`.
pub fn p2wpkh_witness(sig: &[u8], pubkey: &[u8]) -> Witness {
    Witness(vec![
        WitnessStackItem::new(sig.to_vec()),
        WitnessStackItem::new(pubkey.to_vec()),
    ])
}

/// Wrap an already-finalized inner `scriptSig`'s pushes with a trailing push of the redeem
/// script, producing the final `scriptSig` for a `P2sh`-wrapped input: `<inner pushes...>
/// <redeemScript>`.
pub fn wrap_p2sh(inner_script_sig: &ScriptSig, redeem_script: &RedeemScript) -> ScriptSig {
    let mut buf = inner_script_sig.as_ref().to_vec();
    push_data(&mut buf, redeem_script.as_ref());
    ScriptSig::new(buf)
}

/// Build the witness for a `P2wsh`-wrapped input: the inner witness's items (everything the
/// nested template needed) followed by a trailing push of the witness script itself.
pub fn wrap_p2wsh(inner_items: Vec<Vec<u8>>, witness_script: &WitnessScript) -> Witness {
    let mut items: Vec<WitnessStackItem> =
        inner_items.into_iter().map(WitnessStackItem::new).collect();
    items.push(WitnessStackItem::new(witness_script.as_ref().to_vec()));
    Witness(items)
}

/// Append the branch selector (`OP_1` for the `if_true` branch, `OP_0` for `if_false`) to an
/// already-built inner `scriptSig`, producing the final `scriptSig` for a `Conditional`
/// template spent via legacy/P2SH scriptSig.
pub fn wrap_conditional_script_sig(inner_script_sig: &ScriptSig, branch: bool) -> ScriptSig {
    let mut buf = inner_script_sig.as_ref().to_vec();
    push_data(&mut buf, if branch { &[0x01] } else { &[] });
    ScriptSig::new(buf)
}

/// Append the branch selector as one more witness stack item, for a `Conditional` template
/// spent via P2WSH. The result still needs the witness script pushed as its final item, via
/// [`wrap_p2wsh`].
pub fn wrap_conditional_witness(mut inner_items: Vec<Vec<u8>>, branch: bool) -> Vec<Vec<u8>> {
    inner_items.push(if branch { vec![0x01] } else { vec![] });
    inner_items
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn it_builds_p2pkh_script_sig() {
        let sig = vec![1, 2, 3];
        let pubkey = vec![0x02; 33];
        let script_sig = p2pkh_script_sig(&sig, &pubkey);
        assert_eq!(script_sig.as_ref()[0], 3);
        assert_eq!(&script_sig.as_ref()[1..4], &sig[..]);
        assert_eq!(script_sig.as_ref()[4], 33);
    }

    #[test]
    fn it_wraps_p2sh() {
        let inner = p2pkh_script_sig(&[1], &[0x02; 33]);
        let redeem = RedeemScript::new(vec![0xaa; 10]);
        let wrapped = wrap_p2sh(&inner, &redeem);
        assert!(wrapped.as_ref().ends_with(&redeem.as_ref()));
    }
}
