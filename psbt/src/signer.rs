//! The signer boundary: the trait an external key-holder (a local key, a hardware wallet, a
//! remote signing service) implements to participate in filling in a PSBT's partial signatures.
//! This crate produces the data a signer needs and consumes the signature it returns; it never
//! holds key material or computes a signature itself.

use crate::error::PsbtError;
use crate::key::KeyDerivation;
use async_trait::async_trait;
use btc_script::tx::{Transaction, TxOut};

/// Everything a signer needs to produce a signature for one input: which input, what it spends,
/// and (if known) the derivation path of the key that should sign it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpendingInfo {
    /// The index of the input being signed, within the unsigned transaction.
    pub input_index: usize,
    /// The output this input spends.
    pub prevout: TxOut,
    /// The derivation path of the signing key, if the PSBT carries a `Bip32Derivation` record
    /// for a pubkey this signer controls.
    pub derivation: Option<KeyDerivation>,
}

/// A signature produced for one input, ready to be inserted as a `PartialSignature` record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SigComponent {
    /// The index of the input this signature is for.
    pub input_index: usize,
    /// The public key, in the same serialization the spent script committed to (compressed or
    /// uncompressed, matching the input's script template).
    pub pubkey: Vec<u8>,
    /// The DER-encoded signature with its trailing sighash-type byte, exactly as BIP-174 stores
    /// a `PartialSignature` record's value.
    pub signature: Vec<u8>,
}

/// An external signer, asked to produce one signature at a time. `is_dummy` is set when the
/// caller only wants a correctly-sized placeholder signature (for fee estimation before the real
/// signing round); a signer that can't distinguish the two may simply ignore the flag and always
/// sign for real.
#[async_trait]
pub trait PstSigner {
    /// The error type returned on failure; must be constructible from a [`PsbtError`] so a
    /// caller driving this trait can propagate both signer-specific and PSBT-layer failures
    /// through the same `Result`.
    type Error: From<PsbtError>;

    /// Produce the signature for the input described by `info`, against the given unsigned
    /// transaction.
    async fn sign(
        &self,
        info: &SpendingInfo,
        unsigned_tx: &Transaction,
        is_dummy: bool,
    ) -> Result<SigComponent, Self::Error>;
}

#[cfg(test)]
mod test {
    use super::*;
    use btc_script::tx::{OutPoint, TxIn};
    use tx_codec::hashes::Hash256Digest;

    struct StubSigner {
        pubkey: Vec<u8>,
    }

    #[async_trait]
    impl PstSigner for StubSigner {
        type Error = PsbtError;

        async fn sign(
            &self,
            info: &SpendingInfo,
            _unsigned_tx: &Transaction,
            is_dummy: bool,
        ) -> Result<SigComponent, PsbtError> {
            let signature = if is_dummy { vec![0u8; 72] } else { vec![0x30, 0x44, 0x01] };
            Ok(SigComponent {
                input_index: info.input_index,
                pubkey: self.pubkey.clone(),
                signature,
            })
        }
    }

    #[tokio::test]
    async fn a_stub_signer_returns_a_dummy_sized_signature() {
        let signer = StubSigner {
            pubkey: vec![0x02; 33],
        };
        let tx = Transaction {
            version: 2,
            inputs: vec![TxIn::new(OutPoint::new(Hash256Digest::default(), 0))],
            outputs: vec![],
            witnesses: vec![],
            locktime: 0,
        };
        let info = SpendingInfo {
            input_index: 0,
            prevout: TxOut::new(1000, vec![]),
            derivation: None,
        };
        let component = signer.sign(&info, &tx, true).await.unwrap();
        assert_eq!(component.signature.len(), 72);
        assert_eq!(component.pubkey, vec![0x02; 33]);
    }
}
