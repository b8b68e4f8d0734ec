//! The PSBT global map: the unsigned transaction, extended public keys, and version.

use crate::error::PsbtError;
use crate::key::{KeyDerivation, PsbtKey, PsbtValue};
use crate::map::PstMap;
use crate::record::GlobalKey;
use crate::schema;
use btc_script::tx::Transaction;
use tx_codec::ser::ByteFormat;

crate::psbt_map!(
    /// The PSBT global map.
    PsbtGlobal
);

impl PsbtGlobal {
    /// Build a fresh global map from an unsigned transaction. The transaction must already have
    /// empty `scriptSig`s and no witness data; this is asserted by `validate`, not enforced
    /// here, since constructing the map is allowed to precede validation.
    pub fn new(unsigned_tx: &Transaction) -> Result<Self, PsbtError> {
        let mut map = Self::default();
        map.set_tx(unsigned_tx)?;
        Ok(map)
    }

    /// The raw serialized unsigned transaction bytes.
    pub fn tx_bytes(&self) -> Result<&PsbtValue, PsbtError> {
        self.must_get_single(GlobalKey::UNSIGNED_TX, "unsigned transaction", 0)
    }

    /// The parsed unsigned transaction.
    pub fn tx(&self) -> Result<Transaction, PsbtError> {
        Ok(Transaction::deserialize_hex(&hex::encode(
            self.tx_bytes()?.as_ref(),
        ))?)
    }

    /// Replace the `UnsignedTransaction` record.
    pub fn set_tx(&mut self, tx: &Transaction) -> Result<(), PsbtError> {
        let bytes = tx.serialize_hex()?;
        self.insert(
            PsbtKey::from_parts(GlobalKey::UNSIGNED_TX, &[]),
            PsbtValue::new(hex::decode(bytes).expect("serialize_hex produces valid hex")),
        );
        Ok(())
    }

    /// All `Xpub` records, as raw `(extended-key-bytes, derivation)` pairs.
    pub fn xpubs(&self) -> Vec<(Vec<u8>, KeyDerivation)> {
        self.range_by_key_type(GlobalKey::XPUB)
            .into_iter()
            .filter_map(|(k, v)| {
                KeyDerivation::from_value_bytes(v.as_ref())
                    .ok()
                    .map(|kd| (k.key_data().to_vec(), kd))
            })
            .collect()
    }

    /// Insert an `Xpub` record: the extended public key's raw bytes as key-data, the
    /// fingerprint+path derivation as the value.
    pub fn insert_xpub(&mut self, xpub_bytes: &[u8], derivation: &KeyDerivation) {
        self.insert(
            PsbtKey::from_parts(GlobalKey::XPUB, xpub_bytes),
            PsbtValue::new(derivation.to_value_bytes()),
        );
    }

    /// The PSBT version. Defaults to `0` when the (optional) `Version` record is absent.
    pub fn version(&self) -> Result<u32, PsbtError> {
        match self.range_by_key_type(GlobalKey::VERSION).into_iter().next() {
            None => Ok(0),
            Some((_, v)) => {
                let bytes = v.as_ref();
                if bytes.len() != 4 {
                    return Err(PsbtError::MalformedRecord(
                        GlobalKey::VERSION,
                        format!("version value must be 4 bytes, got {}", bytes.len()),
                    ));
                }
                Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
            }
        }
    }

    /// Replace the `Version` record.
    pub fn set_version(&mut self, version: u32) {
        self.insert(
            PsbtKey::from_parts(GlobalKey::VERSION, &[]),
            PsbtValue::new(version.to_le_bytes().to_vec()),
        );
    }

    /// Validate every record's key/value shape against the global schema, then check
    /// whole-map invariants.
    pub fn validate(&self) -> Result<(), PsbtError> {
        schema::global::validate(self)?;
        self.consistency_checks()
    }

    /// Whole-map invariants: exactly one `UnsignedTransaction` record must be present. Unlike
    /// some historical PSBT implementations, `Version` is NOT required to be present — BIP-174
    /// defines it as optional, defaulting to 0.
    pub fn consistency_checks(&self) -> Result<(), PsbtError> {
        self.tx_bytes()?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
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
    fn it_round_trips_the_unsigned_tx() {
        let tx = sample_tx();
        let global = PsbtGlobal::new(&tx).unwrap();
        assert_eq!(global.tx().unwrap(), tx);
    }

    #[test]
    fn version_defaults_to_zero() {
        let global = PsbtGlobal::new(&sample_tx()).unwrap();
        assert_eq!(global.version().unwrap(), 0);
    }

    #[test]
    fn version_round_trips_when_set() {
        let mut global = PsbtGlobal::new(&sample_tx()).unwrap();
        global.set_version(1);
        assert_eq!(global.version().unwrap(), 1);
    }

    #[test]
    fn consistency_checks_require_unsigned_tx() {
        let global = PsbtGlobal::default();
        assert!(global.consistency_checks().is_err());
    }
}
