//! The map layer: ordered, key-unique record containers shared by the global, input, and
//! output scopes.

use crate::error::PsbtError;
use crate::key::{PsbtKey, PsbtValue};
use std::collections::BTreeMap;
use std::ops::{Bound, RangeBounds};
use tx_codec::ser::{ByteFormat, SerError, SerResult};

/// A record read hitting EOF mid-map means the `0x00` terminator never showed up; report that
/// as `TruncatedInput` rather than letting it surface as a generic `Codec` error.
fn map_eof_to_truncated(err: SerError) -> PsbtError {
    if let SerError::IOError(ref io_err) = err {
        if io_err.kind() == std::io::ErrorKind::UnexpectedEof {
            return PsbtError::TruncatedInput;
        }
    }
    PsbtError::Codec(err)
}

/// Shared behavior of a PSBT map (global/input/output), regardless of scope. Keeping this as a
/// trait over the generated newtypes (rather than a single concrete type) mirrors the
/// `PstMap`/`PSBTValidate` split in the map's originating design: the map mechanics here never
/// change, only the per-scope typed accessors layered on top in `global.rs`/`input.rs`/
/// `output.rs` do.
pub trait PstMap {
    /// Borrow the underlying key-sorted record map.
    fn as_map(&self) -> &BTreeMap<PsbtKey, PsbtValue>;
    /// Mutably borrow the underlying key-sorted record map.
    fn as_map_mut(&mut self) -> &mut BTreeMap<PsbtKey, PsbtValue>;
    /// Build from an already-validated map.
    fn from_map(map: BTreeMap<PsbtKey, PsbtValue>) -> Self;

    /// Look up a single record's value by its full key.
    fn get(&self, key: &PsbtKey) -> Option<&PsbtValue> {
        self.as_map().get(key)
    }

    /// True if a record with this full key is present.
    fn contains_key(&self, key: &PsbtKey) -> bool {
        self.as_map().contains_key(key)
    }

    /// Iterate all full keys, in canonical (ascending) order.
    fn keys(&self) -> std::collections::btree_map::Keys<PsbtKey, PsbtValue> {
        self.as_map().keys()
    }

    /// Iterate all records, in canonical key order.
    fn iter(&self) -> std::collections::btree_map::Iter<PsbtKey, PsbtValue> {
        self.as_map().iter()
    }

    /// Insert a record, keyed by its full key. Returns the replaced value, if any.
    fn insert(&mut self, key: PsbtKey, value: PsbtValue) -> Option<PsbtValue> {
        self.as_map_mut().insert(key, value)
    }

    /// Remove a record by its full key.
    fn remove(&mut self, key: &PsbtKey) -> Option<PsbtValue> {
        self.as_map_mut().remove(key)
    }

    /// All records whose key-type byte equals `key_type`, in key order.
    fn range_by_key_type(&self, key_type: u8) -> Vec<(&PsbtKey, &PsbtValue)> {
        let lower = PsbtKey::from_parts(key_type, &[]);
        let upper = PsbtKey::from_parts(key_type.wrapping_add(1), &[]);
        let range = if key_type == 0xff {
            (Bound::Included(lower), Bound::Unbounded)
        } else {
            (Bound::Included(lower), Bound::Excluded(upper))
        };
        self.as_map().range(range).collect()
    }

    /// All `PROPRIETARY` (key-type `0xfc`) records, preserved verbatim and never interpreted.
    fn proprietary(&self) -> Vec<(&PsbtKey, &PsbtValue)> {
        self.range_by_key_type(0xfc)
    }

    /// Look up exactly one record by key-type, erroring if it is missing.
    fn must_get_single(&self, key_type: u8, what: &'static str, input_index: usize) -> Result<&PsbtValue, PsbtError> {
        self.range_by_key_type(key_type)
            .into_iter()
            .next()
            .map(|(_, v)| v)
            .ok_or(PsbtError::MissingRecord {
                index: input_index,
                what,
            })
    }

    /// Deserialize a map: read records until an empty key (the `0x00` terminator) is hit.
    /// Fails `TruncatedInput` if the reader runs out before the terminator is reached, and
    /// `DuplicateKey` if the same full key appears twice.
    fn parse<R: std::io::Read>(reader: &mut R) -> Result<Self, PsbtError>
    where
        Self: Sized,
    {
        let mut map = BTreeMap::new();
        loop {
            let key = PsbtKey::read_from(reader, 0).map_err(map_eof_to_truncated)?;
            if key.is_empty() {
                break;
            }
            let value = PsbtValue::read_from(reader, 0).map_err(map_eof_to_truncated)?;
            if map.insert(key.clone(), value).is_some() {
                return Err(PsbtError::DuplicateKey(key));
            }
        }
        Ok(Self::from_map(map))
    }

    /// Serialize the map: each record in canonical key order, followed by the `0x00`
    /// terminator.
    fn write_to<W: std::io::Write>(&self, writer: &mut W) -> SerResult<usize> {
        let mut written = 0;
        for (k, v) in self.iter() {
            written += k.write_to(writer)?;
            written += v.write_to(writer)?;
        }
        written += writer.write(&[0x00])?;
        Ok(written)
    }

    /// The serialized byte length of the map, including its terminator.
    fn serialized_length(&self) -> usize {
        self.iter()
            .map(|(k, v)| k.serialized_length() + v.serialized_length())
            .sum::<usize>()
            + 1
    }
}

/// Generate a newtype wrapping `BTreeMap<PsbtKey, PsbtValue>` that implements [`PstMap`]. Each
/// PSBT scope (global/input/output) uses this to get the shared map mechanics, then layers its
/// own typed accessors and validation on top.
#[macro_export]
macro_rules! psbt_map {
    ($(#[$outer:meta])* $name:ident) => {
        $(#[$outer])*
        #[derive(Clone, Debug, Default, Eq, PartialEq)]
        pub struct $name {
            map: std::collections::BTreeMap<$crate::key::PsbtKey, $crate::key::PsbtValue>,
        }

        impl $crate::map::PstMap for $name {
            fn as_map(&self) -> &std::collections::BTreeMap<$crate::key::PsbtKey, $crate::key::PsbtValue> {
                &self.map
            }

            fn as_map_mut(&mut self) -> &mut std::collections::BTreeMap<$crate::key::PsbtKey, $crate::key::PsbtValue> {
                &mut self.map
            }

            fn from_map(map: std::collections::BTreeMap<$crate::key::PsbtKey, $crate::key::PsbtValue>) -> Self {
                Self { map }
            }
        }
    };
}

#[cfg(test)]
mod test {
    use super::*;

    psbt_map!(
        /// A minimal map used only to exercise the macro-generated mechanics.
        TestMap
    );

    #[test]
    fn it_round_trips_an_empty_map() {
        let map = TestMap::default();
        let mut buf = vec![];
        map.write_to(&mut buf).unwrap();
        assert_eq!(buf, vec![0x00]);
        let mut cursor = std::io::Cursor::new(buf);
        let parsed = TestMap::parse(&mut cursor).unwrap();
        assert_eq!(parsed, map);
    }

    #[test]
    fn it_reports_truncated_input_when_the_terminator_is_missing() {
        let key = PsbtKey::from_parts(0x01, &[]);
        let value = PsbtValue::new(vec![1, 2, 3]);
        let mut buf = vec![];
        key.write_to(&mut buf).unwrap();
        value.write_to(&mut buf).unwrap();
        // No trailing 0x00: the reader runs dry looking for the next record's key.
        let mut cursor = std::io::Cursor::new(buf);
        assert!(matches!(
            TestMap::parse(&mut cursor),
            Err(PsbtError::TruncatedInput)
        ));
    }

    #[test]
    fn it_reports_truncated_input_when_a_value_is_cut_short() {
        let key = PsbtKey::from_parts(0x01, &[]);
        let mut buf = vec![];
        key.write_to(&mut buf).unwrap();
        // Declare a 3-byte value but supply none of its bytes.
        buf.push(0x03);
        let mut cursor = std::io::Cursor::new(buf);
        assert!(matches!(
            TestMap::parse(&mut cursor),
            Err(PsbtError::TruncatedInput)
        ));
    }

    #[test]
    fn it_rejects_duplicate_keys() {
        let key = PsbtKey::from_parts(0x01, &[]);
        let value = PsbtValue::new(vec![1, 2, 3]);
        let mut buf = vec![];
        key.write_to(&mut buf).unwrap();
        value.write_to(&mut buf).unwrap();
        key.write_to(&mut buf).unwrap();
        value.write_to(&mut buf).unwrap();
        buf.push(0x00);
        let mut cursor = std::io::Cursor::new(buf);
        assert!(matches!(
            TestMap::parse(&mut cursor),
            Err(PsbtError::DuplicateKey(_))
        ));
    }

    #[test]
    fn it_sorts_records_by_key_on_serialize() {
        let mut map = TestMap::default();
        crate::map::PstMap::insert(
            &mut map,
            PsbtKey::from_parts(0x02, &[]),
            PsbtValue::new(vec![]),
        );
        crate::map::PstMap::insert(
            &mut map,
            PsbtKey::from_parts(0x01, &[]),
            PsbtValue::new(vec![]),
        );
        let keys: Vec<u8> = crate::map::PstMap::keys(&map).map(|k| k.key_type()).collect();
        assert_eq!(keys, vec![0x01, 0x02]);
    }
}
