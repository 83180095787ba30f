//! A synchronous, clock-eviction buffer pool manager.
//!
//! This is the single-threaded counterpart of the teacher repo's actor-based
//! pool: same frame table, same clock-sweep victim selection, same pin/dirty
//! bookkeeping, but driven directly under a `Mutex` instead of through a
//! dedicated actor thread and channel. There is no concurrent-access use case
//! for this index (see spec.md §1 Non-goals), so the message-passing wrapper
//! bought nothing here.
use super::api::{BpmError, BufferPoolManager, PageGuard, PageId, PAGE_SIZE};
use super::disk_manager::DiskManager;
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};

type FrameId = usize;

#[derive(Debug)]
struct Frame {
    page_id: PageId,
    pin_count: usize,
    is_dirty: bool,
    is_referenced: bool,
}

struct Inner {
    frames: Vec<Frame>,
    frame_data: Vec<Box<[u8; PAGE_SIZE]>>,
    page_table: HashMap<PageId, FrameId>,
    free_list: Vec<FrameId>,
    disk_manager: Arc<DiskManager>,
    clock_hand: usize,
}

impl Inner {
    fn find_victim_frame(&mut self) -> Result<FrameId, BpmError> {
        if let Some(frame_id) = self.free_list.pop() {
            return Ok(frame_id);
        }

        let pool_size = self.frames.len();
        for _ in 0..(2 * pool_size) {
            let frame_id = self.clock_hand;

            if self.frames[frame_id].pin_count == 0 {
                if self.frames[frame_id].is_referenced {
                    self.frames[frame_id].is_referenced = false;
                } else {
                    self.clock_hand = (self.clock_hand + 1) % pool_size;
                    return Ok(frame_id);
                }
            }

            self.clock_hand = (self.clock_hand + 1) % pool_size;
        }

        Err(BpmError::NoFreeFrames)
    }

    fn evict_if_dirty(&mut self, frame_id: FrameId) -> Result<(), BpmError> {
        if self.frames[frame_id].is_dirty {
            let old_page_id = self.frames[frame_id].page_id;
            let data = &self.frame_data[frame_id];
            self.disk_manager
                .write_page(old_page_id, &data[..])
                .map_err(BpmError::IoError)?;
        }
        Ok(())
    }

    fn fetch_page_logic(&mut self, page_id: PageId) -> Result<Box<[u8; PAGE_SIZE]>, BpmError> {
        if let Some(&frame_id) = self.page_table.get(&page_id) {
            self.frames[frame_id].pin_count += 1;
            self.frames[frame_id].is_referenced = true;
            return Ok(self.frame_data[frame_id].clone());
        }

        let frame_id = self.find_victim_frame()?;
        self.evict_if_dirty(frame_id)?;

        let old_page_id = self.frames[frame_id].page_id;
        self.disk_manager
            .read_page(page_id, &mut self.frame_data[frame_id][..])
            .map_err(BpmError::IoError)?;

        self.page_table.remove(&old_page_id);
        self.page_table.insert(page_id, frame_id);
        self.frames[frame_id] = Frame {
            page_id,
            pin_count: 1,
            is_dirty: false,
            is_referenced: true,
        };

        Ok(self.frame_data[frame_id].clone())
    }

    fn new_page_logic(&mut self) -> Result<(PageId, Box<[u8; PAGE_SIZE]>), BpmError> {
        let frame_id = self.find_victim_frame()?;
        self.evict_if_dirty(frame_id)?;

        let old_page_id = self.frames[frame_id].page_id;
        let new_page_id = self.disk_manager.allocate_page();

        self.page_table.remove(&old_page_id);
        self.page_table.insert(new_page_id, frame_id);
        self.frames[frame_id] = Frame {
            page_id: new_page_id,
            pin_count: 1,
            is_dirty: true,
            is_referenced: true,
        };
        self.frame_data[frame_id] = Box::new([0; PAGE_SIZE]);

        Ok((new_page_id, self.frame_data[frame_id].clone()))
    }

    fn unpin_logic(&mut self, page_id: PageId, data: Option<Box<[u8; PAGE_SIZE]>>, is_dirty: bool) -> Result<(), BpmError> {
        let frame_id = *self
            .page_table
            .get(&page_id)
            .ok_or(BpmError::PageNotPinned(page_id))?;

        if self.frames[frame_id].pin_count == 0 {
            return Err(BpmError::PageNotPinned(page_id));
        }
        self.frames[frame_id].pin_count -= 1;

        if is_dirty {
            self.frames[frame_id].is_dirty = true;
            if let Some(data) = data {
                self.frame_data[frame_id] = data;
            }
        }
        Ok(())
    }

    fn flush_page_logic(&mut self, page_id: PageId) -> Result<(), BpmError> {
        if let Some(&frame_id) = self.page_table.get(&page_id) {
            if self.frames[frame_id].is_dirty {
                let data = &self.frame_data[frame_id];
                self.disk_manager
                    .write_page(page_id, &data[..])
                    .map_err(BpmError::IoError)?;
                self.frames[frame_id].is_dirty = false;
            }
        }
        Ok(())
    }

    fn flush_all_pages_logic(&mut self) -> Result<(), BpmError> {
        if self.frames.iter().any(|f| f.pin_count > 0) {
            return Err(BpmError::PagesStillPinned);
        }
        let page_ids: Vec<PageId> = self.page_table.keys().copied().collect();
        for page_id in page_ids {
            self.flush_page_logic(page_id)?;
        }
        Ok(())
    }
}

/// An in-process buffer pool manager with clock-sweep page replacement.
pub struct SimpleBufferPoolManager {
    inner: Mutex<Inner>,
}

impl SimpleBufferPoolManager {
    /// Creates a pool with `pool_size` frames backed by `disk_manager`.
    pub fn new(pool_size: usize, disk_manager: Arc<DiskManager>) -> Self {
        let mut frames = Vec::with_capacity(pool_size);
        let mut frame_data = Vec::with_capacity(pool_size);
        let mut free_list = Vec::with_capacity(pool_size);

        for i in 0..pool_size {
            frames.push(Frame {
                page_id: 0,
                pin_count: 0,
                is_dirty: false,
                is_referenced: false,
            });
            frame_data.push(Box::new([0; PAGE_SIZE]));
            free_list.push(i);
        }

        Self {
            inner: Mutex::new(Inner {
                frames,
                frame_data,
                page_table: HashMap::new(),
                free_list,
                disk_manager,
                clock_hand: 0,
            }),
        }
    }
}

/// A page guard for [`SimpleBufferPoolManager`]. Owns a private copy of the
/// page's bytes so the pool's lock does not need to stay held for the
/// lifetime of the borrow; on drop, writes the (possibly modified) copy back
/// and decrements the pin count.
pub struct SimplePageGuard<'a> {
    page_id: PageId,
    data: Option<Box<[u8; PAGE_SIZE]>>,
    is_dirty: bool,
    pool: &'a SimpleBufferPoolManager,
}

impl<'a> PageGuard for SimplePageGuard<'a> {
    fn page_id(&self) -> PageId {
        self.page_id
    }

    fn leak_pin(self: Box<Self>) -> PageId {
        let mut this = *self;
        this.data = None;
        let page_id = this.page_id;
        std::mem::forget(this);
        page_id
    }
}

impl<'a> Deref for SimplePageGuard<'a> {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        &self.data.as_ref().unwrap()[..]
    }
}

impl<'a> DerefMut for SimplePageGuard<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.is_dirty = true;
        &mut self.data.as_mut().unwrap()[..]
    }
}

impl<'a> Drop for SimplePageGuard<'a> {
    fn drop(&mut self) {
        let data = self.data.take();
        let mut inner = self.pool.inner.lock().unwrap();
        let _ = inner.unpin_logic(self.page_id, data, self.is_dirty);
    }
}

impl BufferPoolManager for SimpleBufferPoolManager {
    fn fetch_page(&self, page_id: PageId) -> Result<Box<dyn PageGuard + '_>, BpmError> {
        let data = self.inner.lock().unwrap().fetch_page_logic(page_id)?;
        Ok(Box::new(SimplePageGuard {
            page_id,
            data: Some(data),
            is_dirty: false,
            pool: self,
        }))
    }

    fn new_page(&self) -> Result<Box<dyn PageGuard + '_>, BpmError> {
        let (page_id, data) = self.inner.lock().unwrap().new_page_logic()?;
        Ok(Box::new(SimplePageGuard {
            page_id,
            data: Some(data),
            is_dirty: true,
            pool: self,
        }))
    }

    fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> Result<(), BpmError> {
        self.inner.lock().unwrap().unpin_logic(page_id, None, is_dirty)
    }

    fn flush_page(&self, page_id: PageId) -> Result<(), BpmError> {
        self.inner.lock().unwrap().flush_page_logic(page_id)
    }

    fn flush_all_pages(&self) -> Result<(), BpmError> {
        self.inner.lock().unwrap().flush_all_pages_logic()
    }
}
