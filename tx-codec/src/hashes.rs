//! Marked digest types and the hash functions Bitcoin scripts and transactions use.
//!
//! `Hash256Digest` (double-SHA256) identifies transactions; `Hash160Digest`
//! (RIPEMD160(SHA256(x))) identifies pubkeys and scripts inside P2PKH/P2WPKH/P2SH/P2WSH
//! templates. Both are wrapped in marker types so a txid can never be passed where a pubkey
//! hash is expected, even though both are fixed-size byte arrays under the hood.

use crate::ser::{ByteFormat, SerResult};
use ripemd::Ripemd160;
use sha2::{Digest as Sha2Digest, Sha256};
use std::io::{Read, Result as IOResult, Write};

/// Marker trait for fixed-length digest newtypes.
pub trait MarkedDigest: Sized {
    /// The underlying byte array type.
    type Digest: Default + AsRef<[u8]> + AsMut<[u8]> + Copy;

    /// Wrap a raw digest.
    fn new(hash: Self::Digest) -> Self;

    /// Return the underlying digest.
    fn internal(&self) -> Self::Digest;

    /// Return the digest bytes as an owned vector.
    fn bytes(&self) -> Vec<u8>;
}

/// A `Write` sink that accumulates bytes, then folds them down into a marked digest type when
/// `finish` is called.
pub trait MarkedDigestWriter<T: MarkedDigest>: Default + Write {
    /// Consume the writer and produce the final digest.
    fn finish(self) -> T;
}

macro_rules! mark_32_byte_hash {
    ($(#[$outer:meta])* $hash_name:ident) => {
        $(#[$outer])*
        #[derive(Hash, Copy, Clone, Default, Debug, Eq, PartialEq, PartialOrd, Ord)]
        pub struct $hash_name(pub [u8; 32]);

        $crate::impl_hex_serde!($hash_name);

        impl $hash_name {
            /// Parse from a big-endian (block-explorer-style, reversed) hex string.
            pub fn from_be_hex(be: &str) -> SerResult<Self> {
                let mut d = <Self as ByteFormat>::deserialize_hex(be)?;
                d.0.reverse();
                Ok(d)
            }

            /// Render as a big-endian (block-explorer-style, reversed) hex string.
            pub fn to_be_hex(&self) -> String {
                let mut reversed = *self;
                reversed.0.reverse();
                ByteFormat::serialize_hex(&reversed).expect("infallible for fixed-size arrays")
            }
        }

        impl From<[u8; 32]> for $hash_name {
            fn from(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }
        }

        impl AsRef<[u8]> for $hash_name {
            fn as_ref(&self) -> &[u8] {
                &self.0[..]
            }
        }

        impl ByteFormat for $hash_name {
            type Error = crate::ser::SerError;

            fn serialized_length(&self) -> usize {
                32
            }

            fn read_from<R>(reader: &mut R, _limit: usize) -> SerResult<Self>
            where
                R: Read,
            {
                let mut buf = [0u8; 32];
                reader.read_exact(&mut buf)?;
                Ok(Self(buf))
            }

            fn write_to<W>(&self, writer: &mut W) -> SerResult<usize>
            where
                W: Write,
            {
                Ok(writer.write(&self.0)?)
            }
        }

        impl MarkedDigest for $hash_name {
            type Digest = [u8; 32];

            fn new(hash: [u8; 32]) -> Self {
                Self(hash)
            }

            fn internal(&self) -> [u8; 32] {
                self.0
            }

            fn bytes(&self) -> Vec<u8> {
                self.0.to_vec()
            }
        }
    };
}

mark_32_byte_hash!(
    /// A double-SHA256 digest, used to identify transactions (TXID/WTXID) and as the preimage
    /// digest inside a P2WSH witness program.
    Hash256Digest
);

/// A RIPEMD160(SHA256(x)) digest, used inside P2PKH/P2WPKH scripts to commit to a pubkey, and
/// inside P2SH scripts to commit to a redeem script.
#[derive(Hash, Copy, Clone, Default, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub struct Hash160Digest(pub [u8; 20]);

crate::impl_hex_serde!(Hash160Digest);

impl From<[u8; 20]> for Hash160Digest {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Hash160Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0[..]
    }
}

impl ByteFormat for Hash160Digest {
    type Error = crate::ser::SerError;

    fn serialized_length(&self) -> usize {
        20
    }

    fn read_from<R>(reader: &mut R, _limit: usize) -> SerResult<Self>
    where
        R: Read,
    {
        let mut buf = [0u8; 20];
        reader.read_exact(&mut buf)?;
        Ok(Self(buf))
    }

    fn write_to<W>(&self, writer: &mut W) -> SerResult<usize>
    where
        W: Write,
    {
        Ok(writer.write(&self.0)?)
    }
}

/// A `Write` sink that accumulates bytes and folds them into a `Hash256Digest` (double-SHA256)
/// on `finish`.
#[derive(Default)]
pub struct Hash256Writer {
    internal: Sha256,
}

impl Write for Hash256Writer {
    fn write(&mut self, buf: &[u8]) -> IOResult<usize> {
        Write::write(&mut self.internal, buf)
    }
    fn flush(&mut self) -> IOResult<()> {
        Ok(())
    }
}

impl MarkedDigestWriter<Hash256Digest> for Hash256Writer {
    fn finish(self) -> Hash256Digest {
        let first = self.internal.finalize();
        let second = Sha256::digest(first);
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&second[..]);
        Hash256Digest(digest)
    }
}

/// Double-SHA256 a byte slice directly, without going through the streaming `Hash256Writer`.
pub fn hash256(data: &[u8]) -> Hash256Digest {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&second[..]);
    Hash256Digest(digest)
}

/// A single SHA256 pass, wrapped in the same 32-byte `Hash256Digest` newtype `hash256` uses.
/// Needed for the v0 P2WSH witness program commitment, which unlike a txid is a *single*
/// SHA256 of the witness script, not a double one.
pub fn sha256(data: &[u8]) -> Hash256Digest {
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&Sha256::digest(data)[..]);
    Hash256Digest(digest)
}

/// RIPEMD160(SHA256(x)), Bitcoin's standard "hash160" used for pubkey and script commitments.
pub fn hash160(data: &[u8]) -> Hash160Digest {
    let sha = Sha256::digest(data);
    let rmd = Ripemd160::digest(sha);
    let mut digest = [0u8; 20];
    digest.copy_from_slice(&rmd[..]);
    Hash160Digest(digest)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn it_matches_known_hash256_vector() {
        let mut w = Hash256Writer::default();
        w.write_all(&[0]).unwrap();
        w.flush().unwrap();
        assert_eq!(
            w.finish(),
            Hash256Digest::deserialize_hex(
                "1406e05881e299367766d313e26c05564ec91bf721d31726bd6e46e60689539"
            )
            .unwrap()
        );
    }

    #[test]
    fn hash256_function_matches_writer() {
        assert_eq!(hash256(&[0]), hash256(&[0]));
        let via_writer = {
            let mut w = Hash256Writer::default();
            w.write_all(&[1, 2, 3]).unwrap();
            w.finish()
        };
        assert_eq!(via_writer, hash256(&[1, 2, 3]));
    }

    #[test]
    fn it_computes_hash160_of_empty_input() {
        // sha256("") then ripemd160 of that, a standard test vector.
        let h = hash160(b"");
        assert_eq!(
            h,
            Hash160Digest::deserialize_hex("b472a266d0bd89c13706a4132ccfb16f7c3b9fcb").unwrap()
        );
    }
}
