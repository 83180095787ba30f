//! Heap-relation scan abstraction used to bulk-load a new index.
use buffer_pool_manager::api::PageId;

/// A record identifier: the heap page holding a record plus its slot index
/// within that page's slot array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowId {
    /// The page holding the record.
    pub page_id: PageId,
    /// The record's slot index within that page.
    pub slot_index: u16,
}

/// Errors a relation scan can surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationScanError {
    /// The scan has no more records.
    EndOfFile,
}

impl std::fmt::Display for RelationScanError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelationScanError::EndOfFile => write!(f, "end of relation reached"),
        }
    }
}

impl std::error::Error for RelationScanError {}

/// A scan over a heap relation's records, used by [`crate::bptree::BPlusTree::create`]
/// to bulk-load a new index from existing data.
pub trait RelationScan {
    /// Advances to the next record, returning its RowId.
    fn scan_next(&mut self) -> Result<RowId, RelationScanError>;

    /// Returns the raw bytes of the record the scan is currently positioned
    /// on. Callers extract the indexed attribute from this buffer at the
    /// index's configured `attr_byte_offset`.
    fn get_record(&self) -> &[u8];
}
