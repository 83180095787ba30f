//! Key abstraction for the B+ tree index.
//!
//! This index is restricted to a single fixed-width key type: a signed
//! 32-bit integer extracted from a heap record.
use std::cmp::Ordering;

/// The type of key stored in the index. The tree supports one variant;
/// the enum stays around as the page-cast layer's hook for whatever a key
/// type needs to report about itself (its serialized size).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    /// Signed 32-bit integer key type (4 bytes).
    Integer,
}

impl KeyType {
    /// Returns the serialized size for this key type in bytes.
    pub fn max_size(&self) -> usize {
        match self {
            KeyType::Integer => 4,
        }
    }
}

/// A key value stored in a B+ tree index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKey {
    /// An integer key value.
    Integer(i32),
}

impl IndexKey {
    /// Compares this key with another key.
    pub fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (IndexKey::Integer(a), IndexKey::Integer(b)) => a.cmp(b),
        }
    }

    /// Serializes the key to bytes (little-endian, matching every other
    /// on-disk field in this crate).
    pub fn serialize(&self) -> Vec<u8> {
        match self {
            IndexKey::Integer(val) => val.to_le_bytes().to_vec(),
        }
    }

    /// Deserializes a key from bytes based on the key type.
    ///
    /// # Panics
    /// Panics if fewer than 4 bytes are available.
    pub fn deserialize(bytes: &[u8], key_type: &KeyType) -> Self {
        match key_type {
            KeyType::Integer => {
                assert!(bytes.len() >= 4, "invalid integer key bytes");
                let val = i32::from_le_bytes(bytes[0..4].try_into().unwrap());
                IndexKey::Integer(val)
            }
        }
    }

    /// Returns the serialized size of this key in bytes.
    pub fn serialized_size(&self) -> usize {
        match self {
            IndexKey::Integer(_) => 4,
        }
    }

    /// Returns the key type of this key.
    pub fn key_type(&self) -> KeyType {
        match self {
            IndexKey::Integer(_) => KeyType::Integer,
        }
    }
}

impl PartialOrd for IndexKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.compare(other))
    }
}

impl Ord for IndexKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}
