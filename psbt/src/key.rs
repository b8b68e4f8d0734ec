//! The record key/value byte containers, and the `BIP32_DERIVATION` payload shape.

use crate::error::PsbtError;
use tx_codec::ser::ByteFormat;

tx_codec::wrap_prefixed_byte_vector!(
    /// A record's full key: its key-type byte followed by any type-specific key data. Wire
    /// format is a compact-size length prefix over these bytes as a whole (the length does not
    /// cover the length prefix itself).
    PsbtKey
);

tx_codec::wrap_prefixed_byte_vector!(
    /// A record's value bytes, compact-size length-prefixed.
    PsbtValue
);

impl PsbtKey {
    /// Build a key from a key-type byte and the type-specific key data that follows it.
    pub fn from_parts(key_type: u8, key_data: &[u8]) -> Self {
        let mut bytes = vec![key_type];
        bytes.extend_from_slice(key_data);
        Self::new(bytes)
    }

    /// The key-type byte, or `0` for a (structurally invalid, but tolerated) empty key.
    pub fn key_type(&self) -> u8 {
        self.items().first().copied().unwrap_or(0)
    }

    /// The key-type-specific data following the key-type byte.
    pub fn key_data(&self) -> &[u8] {
        &self.items()[1.min(self.len())..]
    }
}

/// A parsed `BIP32_DERIVATION` value: the originating master key's fingerprint and the
/// derivation path from that master key to the key this record's key-data names.
///
/// HD derivation *computation* is out of scope for this crate (see the crate-level docs); this
/// type only carries the raw path data through parse/combine/serialize so a caller wired to an
/// HD key library can use it.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct KeyDerivation {
    /// The 4-byte fingerprint of the master extended key this path descends from.
    pub fingerprint: [u8; 4],
    /// The sequence of (possibly hardened) child numbers from the master key to the derived
    /// key.
    pub path: Vec<u32>,
}

impl KeyDerivation {
    /// Parse a `BIP32_DERIVATION` value: 4 bytes of fingerprint followed by zero or more
    /// little-endian `u32` child numbers.
    pub fn from_value_bytes(bytes: &[u8]) -> Result<Self, PsbtError> {
        if bytes.len() < 4 || bytes.len() % 4 != 0 {
            return Err(PsbtError::MalformedRecord(
                0x06,
                format!("bip32 derivation value must be a non-zero multiple of 4 bytes, got {}", bytes.len()),
            ));
        }
        let mut fingerprint = [0u8; 4];
        fingerprint.copy_from_slice(&bytes[..4]);
        let path = bytes[4..]
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok(Self { fingerprint, path })
    }

    /// Serialize back to the `BIP32_DERIVATION` value bytes.
    pub fn to_value_bytes(&self) -> Vec<u8> {
        let mut buf = self.fingerprint.to_vec();
        for child in &self.path {
            buf.extend_from_slice(&child.to_le_bytes());
        }
        buf
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn it_round_trips_key_derivation() {
        let kd = KeyDerivation {
            fingerprint: [0xde, 0xad, 0xbe, 0xef],
            path: vec![0x8000_0000, 1, 2],
        };
        let bytes = kd.to_value_bytes();
        assert_eq!(KeyDerivation::from_value_bytes(&bytes).unwrap(), kd);
    }

    #[test]
    fn it_rejects_bad_length() {
        assert!(KeyDerivation::from_value_bytes(&[1, 2, 3]).is_err());
        assert!(KeyDerivation::from_value_bytes(&[]).is_err());
    }

    #[test]
    fn key_type_of_empty_key_is_zero() {
        let key = PsbtKey::null();
        assert_eq!(key.key_type(), 0);
    }
}
