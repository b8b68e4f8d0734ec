//! Per-key-type validation predicates for each PSBT scope.
//!
//! Each scope exposes a `validate` entry point that walks every record present in the map and,
//! for any record whose key type is part of the scope's registry, checks its key/value shape.
//! Records with unregistered key types are left alone (they round-trip as `Unknown`).

use crate::error::PsbtError;
use crate::key::{KeyDerivation, PsbtKey, PsbtValue};
use crate::map::PstMap;
use crate::record::{GlobalKey, InputKey, OutputKey};
use std::collections::HashMap;

/// A single key/value shape check.
pub type KvPredicate = Box<dyn Fn(&PsbtKey, &PsbtValue) -> Result<(), PsbtError> + Send + Sync>;

/// A composable set of predicates, keyed by key-type byte. Calling `insert` a second time for
/// the same key type adds an additional check rather than replacing the first — this lets a
/// scope's schema be built up incrementally from small, single-purpose predicates.
#[derive(Default)]
pub struct KvTypeSchema(HashMap<u8, Vec<KvPredicate>>);

impl KvTypeSchema {
    /// Add a predicate for `key_type`, composing with any predicate already registered there.
    pub fn insert(mut self, key_type: u8, predicate: KvPredicate) -> Self {
        self.0.entry(key_type).or_default().push(predicate);
        self
    }

    /// Run every record in `map` whose key type has registered predicates through them all.
    pub fn validate<M: PstMap>(&self, map: &M) -> Result<(), PsbtError> {
        for (key, value) in map.iter() {
            if let Some(predicates) = self.0.get(&key.key_type()) {
                for predicate in predicates {
                    predicate(key, value)?;
                }
            }
        }
        Ok(())
    }
}

fn expect_empty_key_data(key_type: u8) -> KvPredicate {
    Box::new(move |key, _value| {
        if key.key_data().is_empty() {
            Ok(())
        } else {
            Err(PsbtError::MalformedRecord(
                key_type,
                "expected no key-data beyond the key-type byte".to_string(),
            ))
        }
    })
}

fn expect_fixed_value_len(key_type: u8, len: usize) -> KvPredicate {
    Box::new(move |_key, value| {
        if value.len() == len {
            Ok(())
        } else {
            Err(PsbtError::MalformedRecord(
                key_type,
                format!("expected a {}-byte value, got {}", len, value.len()),
            ))
        }
    })
}

fn expect_bip32_derivation_value(key_type: u8) -> KvPredicate {
    Box::new(move |_key, value| {
        KeyDerivation::from_value_bytes(value.as_ref()).map(|_| ()).map_err(|_| {
            PsbtError::MalformedRecord(key_type, "malformed bip32 derivation value".to_string())
        })
    })
}

fn expect_pubkey_key_data(key_type: u8) -> KvPredicate {
    Box::new(move |key, _value| {
        let len = key.key_data().len();
        if len == 33 || len == 65 {
            Ok(())
        } else {
            Err(PsbtError::MalformedRecord(
                key_type,
                format!("expected a 33 or 65-byte pubkey in key-data, got {}", len),
            ))
        }
    })
}

/// Global-scope schema.
pub mod global {
    use super::*;

    /// Validate every record in the global map, then parse and structurally check the unsigned
    /// transaction: BIP-174 requires it carry no witness data and only empty input scriptSigs.
    pub fn validate<M: PstMap>(map: &M) -> Result<(), PsbtError> {
        schema().validate(map)?;
        let tx = crate::global::PsbtGlobal::from_map(map.as_map().clone()).tx()?;
        if tx.is_witness() {
            return Err(PsbtError::MalformedRecord(
                GlobalKey::UNSIGNED_TX,
                "unsigned transaction must not carry witness data".to_string(),
            ));
        }
        if tx.inputs.iter().any(|i| !i.script_sig.is_empty()) {
            return Err(PsbtError::MalformedRecord(
                GlobalKey::UNSIGNED_TX,
                "unsigned transaction must have empty input scriptSigs".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn schema() -> KvTypeSchema {
        KvTypeSchema::default()
            .insert(GlobalKey::UNSIGNED_TX, expect_empty_key_data(GlobalKey::UNSIGNED_TX))
            .insert(GlobalKey::XPUB, Box::new(|key, _value| {
                if key.key_data().len() == 78 {
                    Ok(())
                } else {
                    Err(PsbtError::MalformedRecord(
                        GlobalKey::XPUB,
                        "expected a 78-byte extended public key in key-data".to_string(),
                    ))
                }
            }))
            .insert(GlobalKey::XPUB, expect_bip32_derivation_value(GlobalKey::XPUB))
            .insert(GlobalKey::VERSION, expect_empty_key_data(GlobalKey::VERSION))
            .insert(GlobalKey::VERSION, expect_fixed_value_len(GlobalKey::VERSION, 4))
    }
}

/// Input-scope schema.
pub mod input {
    use super::*;

    /// Validate every record in an input map.
    pub fn validate<M: PstMap>(map: &M) -> Result<(), PsbtError> {
        schema().validate(map)
    }

    pub(crate) fn schema() -> KvTypeSchema {
        KvTypeSchema::default()
            .insert(InputKey::NON_WITNESS_UTXO, expect_empty_key_data(InputKey::NON_WITNESS_UTXO))
            .insert(InputKey::WITNESS_UTXO, expect_empty_key_data(InputKey::WITNESS_UTXO))
            .insert(InputKey::PARTIAL_SIGNATURE, expect_pubkey_key_data(InputKey::PARTIAL_SIGNATURE))
            .insert(InputKey::SIGHASH_TYPE, expect_empty_key_data(InputKey::SIGHASH_TYPE))
            .insert(InputKey::SIGHASH_TYPE, expect_fixed_value_len(InputKey::SIGHASH_TYPE, 4))
            .insert(InputKey::REDEEM_SCRIPT, expect_empty_key_data(InputKey::REDEEM_SCRIPT))
            .insert(InputKey::WITNESS_SCRIPT, expect_empty_key_data(InputKey::WITNESS_SCRIPT))
            .insert(InputKey::BIP32_DERIVATION, expect_pubkey_key_data(InputKey::BIP32_DERIVATION))
            .insert(
                InputKey::BIP32_DERIVATION,
                expect_bip32_derivation_value(InputKey::BIP32_DERIVATION),
            )
            .insert(InputKey::FINALIZED_SCRIPT_SIG, expect_empty_key_data(InputKey::FINALIZED_SCRIPT_SIG))
            .insert(
                InputKey::FINALIZED_SCRIPT_WITNESS,
                expect_empty_key_data(InputKey::FINALIZED_SCRIPT_WITNESS),
            )
            .insert(
                InputKey::POR_COMMITMENT,
                expect_empty_key_data(InputKey::POR_COMMITMENT),
            )
    }
}

/// Output-scope schema.
pub mod output {
    use super::*;

    /// Validate every record in an output map.
    pub fn validate<M: PstMap>(map: &M) -> Result<(), PsbtError> {
        schema().validate(map)
    }

    pub(crate) fn schema() -> KvTypeSchema {
        KvTypeSchema::default()
            .insert(OutputKey::REDEEM_SCRIPT, expect_empty_key_data(OutputKey::REDEEM_SCRIPT))
            .insert(OutputKey::WITNESS_SCRIPT, expect_empty_key_data(OutputKey::WITNESS_SCRIPT))
            .insert(OutputKey::BIP32_DERIVATION, expect_pubkey_key_data(OutputKey::BIP32_DERIVATION))
            .insert(
                OutputKey::BIP32_DERIVATION,
                expect_bip32_derivation_value(OutputKey::BIP32_DERIVATION),
            )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::key::PsbtValue;

    #[test]
    fn it_rejects_a_malformed_sighash_type_value() {
        let schema = input::schema();
        let key = PsbtKey::from_parts(InputKey::SIGHASH_TYPE, &[]);
        let value = PsbtValue::new(vec![1, 2]); // not 4 bytes
        assert!(schema.validate(&crate::input::PsbtInput::from_map(
            std::iter::once((key, value)).collect()
        ))
        .is_err());
    }
}
