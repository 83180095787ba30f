//! Index metadata: the persisted header describing a B+ tree's shape and
//! the relation/attribute it indexes.
use crate::key::KeyType;

/// Maximum length, in bytes, of a stored relation name.
pub const MAX_RELATION_NAME_LEN: usize = 64;

const ROOT_PAGE_ID_SIZE: usize = 8;
const ATTR_BYTE_OFFSET_SIZE: usize = 4;
const NAME_LEN_SIZE: usize = 2;
const KEY_TYPE_TAG_SIZE: usize = 1;
const MAX_SIZE_FIELD_SIZE: usize = 2;

/// Size in bytes of the serialized metadata header.
pub const HEADER_SIZE: usize = ROOT_PAGE_ID_SIZE
    + ATTR_BYTE_OFFSET_SIZE
    + NAME_LEN_SIZE
    + MAX_RELATION_NAME_LEN
    + KEY_TYPE_TAG_SIZE
    + MAX_SIZE_FIELD_SIZE
    + MAX_SIZE_FIELD_SIZE;

/// Per-node header sizes used to derive fanout. These must track the
/// offsets in `node.rs`.
const LEAF_HEADER_SIZE: usize = 19;
const INTERNAL_HEADER_SIZE: usize = 15;
const ROW_ID_SIZE: usize = 12;
const PAGE_ID_SIZE: usize = 8;

/// Persisted description of a B+ tree index: its root, the relation and
/// attribute it indexes, and the node capacities computed from the page
/// size at creation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMetadata {
    /// Page ID of the tree's root node.
    pub root_page_id: usize,
    /// Name of the relation this index was built over.
    pub relation_name: String,
    /// Byte offset of the indexed attribute within a heap record.
    pub attr_byte_offset: u32,
    /// Type of the indexed key.
    pub key_type: KeyType,
    /// Maximum number of keys a leaf node may hold.
    pub leaf_max_size: u16,
    /// Maximum number of keys an internal node may hold.
    pub internal_max_size: u16,
}

impl IndexMetadata {
    /// Builds fresh metadata for a new index, computing leaf/internal
    /// fanout from the page size and key type.
    pub fn new(
        root_page_id: usize,
        relation_name: String,
        attr_byte_offset: u32,
        key_type: KeyType,
        page_size: usize,
    ) -> Self {
        assert!(
            relation_name.len() <= MAX_RELATION_NAME_LEN,
            "relation name exceeds {MAX_RELATION_NAME_LEN} bytes"
        );

        let (leaf_max_size, internal_max_size) = compute_fanout(page_size, &key_type);

        Self {
            root_page_id,
            relation_name,
            attr_byte_offset,
            key_type,
            leaf_max_size,
            internal_max_size,
        }
    }

    /// Serializes this metadata into a fixed-size header buffer.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = vec![0u8; HEADER_SIZE];
        let mut offset = 0;

        buf[offset..offset + ROOT_PAGE_ID_SIZE].copy_from_slice(&self.root_page_id.to_le_bytes());
        offset += ROOT_PAGE_ID_SIZE;

        buf[offset..offset + ATTR_BYTE_OFFSET_SIZE].copy_from_slice(&self.attr_byte_offset.to_le_bytes());
        offset += ATTR_BYTE_OFFSET_SIZE;

        let name_bytes = self.relation_name.as_bytes();
        buf[offset..offset + NAME_LEN_SIZE].copy_from_slice(&(name_bytes.len() as u16).to_le_bytes());
        offset += NAME_LEN_SIZE;

        buf[offset..offset + name_bytes.len()].copy_from_slice(name_bytes);
        offset += MAX_RELATION_NAME_LEN;

        buf[offset] = match self.key_type {
            KeyType::Integer => 0,
        };
        offset += KEY_TYPE_TAG_SIZE;

        buf[offset..offset + MAX_SIZE_FIELD_SIZE].copy_from_slice(&self.leaf_max_size.to_le_bytes());
        offset += MAX_SIZE_FIELD_SIZE;

        buf[offset..offset + MAX_SIZE_FIELD_SIZE].copy_from_slice(&self.internal_max_size.to_le_bytes());

        buf
    }

    /// Deserializes metadata from a header buffer.
    ///
    /// # Panics
    /// Panics if `bytes` is shorter than [`HEADER_SIZE`] or contains an
    /// unrecognized key type tag.
    pub fn deserialize(bytes: &[u8]) -> Self {
        assert!(bytes.len() >= HEADER_SIZE, "metadata buffer too small");
        let mut offset = 0;

        let root_page_id = usize::from_le_bytes(bytes[offset..offset + ROOT_PAGE_ID_SIZE].try_into().unwrap());
        offset += ROOT_PAGE_ID_SIZE;

        let attr_byte_offset =
            u32::from_le_bytes(bytes[offset..offset + ATTR_BYTE_OFFSET_SIZE].try_into().unwrap());
        offset += ATTR_BYTE_OFFSET_SIZE;

        let name_len =
            u16::from_le_bytes(bytes[offset..offset + NAME_LEN_SIZE].try_into().unwrap()) as usize;
        offset += NAME_LEN_SIZE;

        let relation_name = String::from_utf8(bytes[offset..offset + name_len].to_vec())
            .expect("persisted relation name is not valid utf-8");
        offset += MAX_RELATION_NAME_LEN;

        let key_type = match bytes[offset] {
            0 => KeyType::Integer,
            other => panic!("unrecognized key type tag: {other}"),
        };
        offset += KEY_TYPE_TAG_SIZE;

        let leaf_max_size =
            u16::from_le_bytes(bytes[offset..offset + MAX_SIZE_FIELD_SIZE].try_into().unwrap());
        offset += MAX_SIZE_FIELD_SIZE;

        let internal_max_size =
            u16::from_le_bytes(bytes[offset..offset + MAX_SIZE_FIELD_SIZE].try_into().unwrap());

        Self {
            root_page_id,
            relation_name,
            attr_byte_offset,
            key_type,
            leaf_max_size,
            internal_max_size,
        }
    }
}

/// Computes the maximum number of keys a leaf and an internal node can hold
/// for a given page size and key type.
fn compute_fanout(page_size: usize, key_type: &KeyType) -> (u16, u16) {
    let key_size = key_type.max_size();

    let leaf_capacity = (page_size - LEAF_HEADER_SIZE) / (key_size + ROW_ID_SIZE);
    let internal_capacity = (page_size - INTERNAL_HEADER_SIZE - PAGE_ID_SIZE) / (key_size + PAGE_ID_SIZE);

    (leaf_capacity as u16, internal_capacity as u16)
}

#[cfg(test)]
mod tests {
    use super::*;
    use buffer_pool_manager::api::PAGE_SIZE;

    #[test]
    fn round_trips_through_serialization() {
        let metadata = IndexMetadata::new(3, "employees".to_string(), 8, KeyType::Integer, PAGE_SIZE);

        let serialized = metadata.serialize();
        assert_eq!(serialized.len(), HEADER_SIZE);

        let deserialized = IndexMetadata::deserialize(&serialized);
        assert_eq!(metadata, deserialized);
    }

    #[test]
    fn fanout_is_positive_for_page_size() {
        let (leaf_max, internal_max) = compute_fanout(PAGE_SIZE, &KeyType::Integer);
        assert!(leaf_max > 0);
        assert!(internal_max > 0);
    }

    #[test]
    #[should_panic(expected = "relation name exceeds")]
    fn rejects_relation_name_too_long() {
        let name = "a".repeat(MAX_RELATION_NAME_LEN + 1);
        IndexMetadata::new(0, name, 0, KeyType::Integer, PAGE_SIZE);
    }
}
