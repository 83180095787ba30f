//! Defines the common API for all buffer pool manager implementations.
use std::ops::{Deref, DerefMut};

/// A unique identifier for a page in the database.
pub type PageId = usize;

/// A constant to represent an invalid page ID.
pub const INVALID_PAGE_ID: PageId = 0;

/// The size of a single page in bytes.
pub const PAGE_SIZE: usize = 4096;

/// A specialized error type for buffer pool manager operations.
#[derive(Debug)]
pub enum BpmError {
    /// Returned when the pool is full and no pages can be evicted.
    NoFreeFrames,
    /// Returned when the caller tries to unpin a page it does not hold pinned.
    PageNotPinned(PageId),
    /// Returned when `flushFile` is called while pages are still pinned.
    PagesStillPinned,
    /// Represents an I/O error from the disk manager.
    IoError(std::io::Error),
}

impl std::fmt::Display for BpmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BpmError::NoFreeFrames => write!(f, "buffer pool is full, no frame available to evict"),
            BpmError::PageNotPinned(page_id) => write!(f, "page {page_id} is not currently pinned"),
            BpmError::PagesStillPinned => write!(f, "cannot flush file: pages are still pinned"),
            BpmError::IoError(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for BpmError {}

/// A smart pointer representing a pinned page.
///
/// This guard provides mutable access to the page's byte data. When the guard
/// is dropped, it automatically informs the buffer pool manager to unpin the page,
/// allowing it to be considered for eviction.
pub trait PageGuard: Deref<Target = [u8]> + DerefMut {
    /// Returns the ID of the page being held.
    fn page_id(&self) -> PageId;

    /// Frees this guard's private byte buffer but leaves the pool's pin
    /// count untouched, returning the page id. Used when a caller needs to
    /// hold a page pinned past the lifetime of any single guard (e.g. across
    /// calls on a struct that can't also borrow from its own buffer pool
    /// handle) without leaking the guard's backing allocation. The caller
    /// takes over responsibility for releasing the pin later via
    /// `BufferPoolManager::unpin_page`.
    fn leak_pin(self: Box<Self>) -> PageId;
}

/// The main trait defining the behavior of a Buffer Pool Manager.
///
/// This trait is designed to be object-safe, so it can be used with
/// trait objects (`Box<dyn BufferPoolManager>`).
pub trait BufferPoolManager: Send + Sync {
    /// Fetches a page from the buffer pool, reading from disk if necessary.
    ///
    /// This method pins the page and returns a `PageGuard`. The page remains
    /// pinned until the `PageGuard` is dropped.
    fn fetch_page(&self, page_id: PageId) -> Result<Box<dyn PageGuard + '_>, BpmError>;

    /// Allocates and pins a new page in the buffer pool.
    fn new_page(&self) -> Result<Box<dyn PageGuard + '_>, BpmError>;

    /// Unpins a page from the buffer pool.
    ///
    /// This is normally called by the `PageGuard`'s drop implementation; exposed
    /// on the trait so callers matching the narrow contract of spec.md §6 can
    /// invoke it directly.
    fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> Result<(), BpmError>;

    /// Flushes a specific page to disk if it is dirty.
    fn flush_page(&self, page_id: PageId) -> Result<(), BpmError>;

    /// Flushes all dirty pages in the buffer pool to disk. Fails if any page
    /// in the pool is still pinned.
    fn flush_all_pages(&self) -> Result<(), BpmError>;
}
