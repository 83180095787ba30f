//! A disk-backed B+ tree index over a single fixed-width integer key,
//! built on top of an external buffer pool manager.
pub mod bptree;
pub mod error;
pub mod key;
pub mod metadata;
pub mod node;
pub mod relation;
pub mod scan;

pub use bptree::BPlusTree;
pub use error::IndexError;
pub use key::{IndexKey, KeyType};
pub use relation::{RelationScan, RelationScanError, RowId};
pub use scan::{BPlusTreeScan, ScanOp};
