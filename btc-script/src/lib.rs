//! Bitcoin script, transaction, and script-template types.
//!
//! This crate covers exactly the Bitcoin value types the `psbt` crate needs: scripts,
//! transactions, and a classifier that recognizes standard spending templates well enough to
//! drive finalization. It is not a script interpreter — `classify` pattern-matches known shapes,
//! it never executes a script or validates a signature.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod build;
pub mod classify;
pub mod opcodes;
pub mod script;
pub mod tx;

pub mod prelude {
    //! Convenience re-export of the crate's most commonly used items.
    pub use crate::classify::{classify, ScriptTemplate, TimeoutKind};
    pub use crate::script::{
        decode_ops, push_data, RedeemScript, Script, ScriptOp, ScriptPubkey, ScriptSig, Witness,
        WitnessScript, WitnessStackItem,
    };
    pub use crate::tx::{OutPoint, Transaction, TxIn, TxOut};
}
