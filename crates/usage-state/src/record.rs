//! Fixed binary layout of a usage value.
//!
//! A value is exactly two consecutive `u64`s in native byte order:
//! `[used_bytes, num_objects]`. Anything else is malformed and rejected
//! whole; there is no partial decode.

use crate::error::{StateError, StateResult};

/// Byte width of an encoded usage value.
pub const RECORD_LEN: usize = 2 * size_of::<u64>();

/// Decoded usage value for one ledger key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UsageRecord {
    pub used_bytes: u64,
    pub num_objects: u64,
}

impl UsageRecord {
    pub fn new(used_bytes: u64, num_objects: u64) -> Self {
        Self {
            used_bytes,
            num_objects,
        }
    }

    /// Decode a raw table value.
    pub fn decode(value: &[u8]) -> StateResult<Self> {
        let raw: &[u8; RECORD_LEN] = value.try_into().map_err(|_| StateError::MalformedRecord {
            expected: RECORD_LEN,
            found: value.len(),
        })?;
        let (bytes, objects) = raw.split_at(size_of::<u64>());
        // Both halves are exactly eight bytes by construction.
        let mut word = [0u8; 8];
        word.copy_from_slice(bytes);
        let used_bytes = u64::from_ne_bytes(word);
        word.copy_from_slice(objects);
        let num_objects = u64::from_ne_bytes(word);
        Ok(Self {
            used_bytes,
            num_objects,
        })
    }

    /// Encode into the on-disk layout.
    pub fn encode(&self) -> [u8; RECORD_LEN] {
        let mut out = [0u8; RECORD_LEN];
        out[..8].copy_from_slice(&self.used_bytes.to_ne_bytes());
        out[8..].copy_from_slice(&self.num_objects.to_ne_bytes());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_len_is_two_words() {
        assert_eq!(RECORD_LEN, 16);
    }

    #[test]
    fn decode_native_layout() {
        let mut value = Vec::new();
        value.extend_from_slice(&1000u64.to_ne_bytes());
        value.extend_from_slice(&5u64.to_ne_bytes());

        let record = UsageRecord::decode(&value).unwrap();
        assert_eq!(record, UsageRecord::new(1000, 5));
    }

    #[test]
    fn encode_matches_decode_layout() {
        let encoded = UsageRecord::new(u64::MAX, 7).encode();
        assert_eq!(&encoded[..8], &u64::MAX.to_ne_bytes());
        assert_eq!(&encoded[8..], &7u64.to_ne_bytes());
        assert_eq!(UsageRecord::decode(&encoded).unwrap(), UsageRecord::new(u64::MAX, 7));
    }

    #[test]
    fn short_value_is_malformed() {
        let err = UsageRecord::decode(&[0u8; 8]).unwrap_err();
        match err {
            StateError::MalformedRecord { expected, found } => {
                assert_eq!(expected, 16);
                assert_eq!(found, 8);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn long_value_is_malformed() {
        assert!(UsageRecord::decode(&[0u8; 24]).is_err());
        assert!(UsageRecord::decode(&[0u8; 17]).is_err());
    }

    #[test]
    fn empty_value_is_malformed() {
        assert!(matches!(
            UsageRecord::decode(&[]),
            Err(StateError::MalformedRecord { found: 0, .. })
        ));
    }
}
