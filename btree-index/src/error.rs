//! Error taxonomy for index operations.
use buffer_pool_manager::api::BpmError;

/// A specialized error type for B+ tree index operations.
///
/// `file-not-found` and `end-of-file` are deliberately absent: the first is
/// recovered locally during construction (it selects the create path), and
/// the second is a normal relation-scan termination signal, represented on
/// [`crate::relation::RelationScanError`] instead of here.
#[derive(Debug)]
pub enum IndexError {
    /// `startScan` was called with operators outside the allowed sets.
    BadOpcodes,
    /// `startScan` was called with `lowVal > highVal`.
    BadScanRange,
    /// `scanNext` or `endScan` was called before `startScan`.
    ScanNotInitialized,
    /// `scanNext` was called past the high bound; terminal signal.
    IndexScanCompleted,
    /// A point lookup found no matching key.
    NoSuchKeyFound,
    /// The persisted meta page doesn't match the caller-supplied relation
    /// name or attribute offset.
    BadIndexInfo,
    /// A failure surfaced by the buffer pool manager.
    Bpm(BpmError),
}

impl std::fmt::Display for IndexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexError::BadOpcodes => write!(f, "scan operators outside the allowed sets"),
            IndexError::BadScanRange => write!(f, "scan range is invalid: lowVal > highVal"),
            IndexError::ScanNotInitialized => write!(f, "no scan is currently active"),
            IndexError::IndexScanCompleted => write!(f, "scan has passed its high bound"),
            IndexError::NoSuchKeyFound => write!(f, "key not found in index"),
            IndexError::BadIndexInfo => write!(f, "persisted index metadata does not match caller-supplied info"),
            IndexError::Bpm(e) => write!(f, "buffer pool error: {e}"),
        }
    }
}

impl std::error::Error for IndexError {}

impl From<BpmError> for IndexError {
    fn from(e: BpmError) -> Self {
        IndexError::Bpm(e)
    }
}
