//! Reads and writes fixed-size pages to a backing file.
use super::api::{PageId, PAGE_SIZE};
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::FileExt;
#[cfg(target_os = "linux")]
use std::os::unix::fs::OpenOptionsExt;
use std::sync::Mutex;

/// Manages reading and writing pages to a file on disk.
///
/// Uses positioned I/O (`read_at`, `write_at`) so reads and writes don't need
/// a global lock on the file; only page-id allocation is serialized.
#[derive(Debug)]
pub struct DiskManager {
    db_file: File,
    next_page_id: Mutex<PageId>,
}

impl DiskManager {
    /// Creates a new `DiskManager` for a given database file.
    ///
    /// `direct_io` requests `O_DIRECT` (Linux only; ignored elsewhere) so reads
    /// and writes bypass the OS page cache, which is useful when benchmarking
    /// the buffer pool's own eviction policy instead of the kernel's.
    pub fn new(db_file_path: &str, direct_io: bool) -> io::Result<Self> {
        let mut options = OpenOptions::new();
        options.read(true).write(true).create(true);

        #[cfg(target_os = "linux")]
        if direct_io {
            options.custom_flags(libc::O_DIRECT);
        }
        #[cfg(not(target_os = "linux"))]
        let _ = direct_io;

        let file = options.open(db_file_path)?;
        let metadata = file.metadata()?;
        // Page id 0 is reserved as `INVALID_PAGE_ID`; a brand new file must
        // start allocating at 1, not 0.
        let next_page_id = ((metadata.len() / PAGE_SIZE as u64) as PageId).max(1);

        Ok(Self {
            db_file: file,
            next_page_id: Mutex::new(next_page_id),
        })
    }

    /// Reads a page from the database file into the provided buffer.
    pub fn read_page(&self, page_id: PageId, data: &mut [u8]) -> io::Result<()> {
        let offset = (page_id * PAGE_SIZE) as u64;
        self.db_file.read_exact_at(data, offset)
    }

    /// Writes a page from the buffer into the database file.
    pub fn write_page(&self, page_id: PageId, data: &[u8]) -> io::Result<()> {
        let offset = (page_id * PAGE_SIZE) as u64;
        self.db_file.write_all_at(data, offset)
    }

    /// Allocates a new page ID. Does not write anything to disk; the caller
    /// is expected to write the zeroed/initialized page through the pool.
    pub fn allocate_page(&self) -> PageId {
        let mut next_page_id = self.next_page_id.lock().unwrap();
        let page_id = *next_page_id;
        *next_page_id += 1;
        page_id
    }
}
