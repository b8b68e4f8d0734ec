//! Binary (de)serialization primitives shared by the `btc-script` and `psbt` crates: the
//! `ByteFormat` trait, Bitcoin-style compact-size integers, marked digest types, and the
//! `wrap_prefixed_byte_vector!`/`impl_hex_serde!` macros used throughout the workspace to build
//! length-prefixed newtypes.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

#[macro_use]
pub mod macros;

pub mod hashes;
pub mod ser;

pub mod prelude {
    //! Convenience re-export of the crate's most commonly used items.
    pub use crate::hashes::{hash160, hash256, Hash160Digest, Hash256Digest, MarkedDigest};
    pub use crate::ser::{ByteFormat, SerError, SerResult};
}
