//! The PSBT output map: redeem/witness scripts and derivation paths for the transaction's
//! outputs.

use crate::error::PsbtError;
use crate::key::{KeyDerivation, PsbtKey, PsbtValue};
use crate::map::PstMap;
use crate::record::OutputKey;
use crate::schema;
use btc_script::script::{RedeemScript, WitnessScript};

crate::psbt_map!(
    /// The PSBT output map for a single transaction output.
    PsbtOutput
);

impl PsbtOutput {
    /// The redeem script, if present.
    pub fn redeem_script(&self) -> Option<RedeemScript> {
        self.get(&PsbtKey::from_parts(OutputKey::REDEEM_SCRIPT, &[]))
            .map(|v| RedeemScript::new(v.as_ref().to_vec()))
    }

    /// Replace the redeem script record.
    pub fn insert_redeem_script(&mut self, script: &RedeemScript) {
        self.insert(
            PsbtKey::from_parts(OutputKey::REDEEM_SCRIPT, &[]),
            PsbtValue::new(script.as_ref().to_vec()),
        );
    }

    /// The witness script, if present.
    pub fn witness_script(&self) -> Option<WitnessScript> {
        self.get(&PsbtKey::from_parts(OutputKey::WITNESS_SCRIPT, &[]))
            .map(|v| WitnessScript::new(v.as_ref().to_vec()))
    }

    /// Replace the witness script record.
    pub fn insert_witness_script(&mut self, script: &WitnessScript) {
        self.insert(
            PsbtKey::from_parts(OutputKey::WITNESS_SCRIPT, &[]),
            PsbtValue::new(script.as_ref().to_vec()),
        );
    }

    /// Every `Bip32Derivation` record, as `(pubkey, derivation)` pairs.
    pub fn bip32_derivations(&self) -> Vec<(Vec<u8>, KeyDerivation)> {
        self.range_by_key_type(OutputKey::BIP32_DERIVATION)
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
            PsbtKey::from_parts(OutputKey::BIP32_DERIVATION, pubkey),
            PsbtValue::new(derivation.to_value_bytes()),
        );
    }

    /// Validate every record's key/value shape. An output map has no cross-record invariants of
    /// its own.
    pub fn validate(&self) -> Result<(), PsbtError> {
        schema::output::validate(self)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn it_round_trips_a_witness_script() {
        let mut output = PsbtOutput::default();
        let script = WitnessScript::new(vec![1, 2, 3]);
        output.insert_witness_script(&script);
        assert_eq!(output.witness_script(), Some(script));
    }
}
