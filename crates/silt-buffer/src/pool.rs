//! Buffer pool manager.

use crate::frame::{BufferFrame, FrameId};
use crate::page_table::PageTable;
use crate::replacer::{ClockReplacer, Replacer};
use parking_lot::Mutex;
use silt_common::page::{Lsn, PageId, PAGE_SIZE};
use silt_common::Result;
use std::collections::VecDeque;
use std::sync::Arc;
use sysinfo::System;

/// Contract of the persistent page device the pool reads and writes.
///
/// Implementations perform synchronous I/O; the pool holds its lock across
/// these calls.
pub trait PageDevice: Send + Sync {
    /// Fills the buffer with the page's bytes.
    fn read_page(&self, page_id: PageId, buf: &mut [u8; PAGE_SIZE]) -> Result<()>;

    /// Persists the page's bytes.
    fn write_page(&self, page_id: PageId, data: &[u8; PAGE_SIZE]) -> Result<()>;

    /// Returns a fresh, previously unused page identifier.
    fn allocate_page(&self) -> Result<PageId>;

    /// Marks the identifier reusable after a durability boundary external
    /// to the pool.
    fn deallocate_page(&self, page_id: PageId) -> Result<()>;
}

/// Contract of the write-ahead log the pool consults before write-back.
pub trait LogManager: Send + Sync {
    /// Returns the currently persisted log position.
    fn flushed_lsn(&self) -> Lsn;

    /// Synchronously persists the log up to the supplied position.
    fn flush_until(&self, lsn: Lsn) -> Result<()>;
}

/// Configuration for the buffer pool.
#[derive(Debug, Clone)]
pub struct BufferPoolConfig {
    /// Number of frames in the pool.
    pub num_frames: usize,
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self { num_frames: 1024 }
    }
}

/// Buffer pool manager.
///
/// Manages a fixed-size pool of page frames with:
/// - Page ID to frame ID mapping
/// - Free frame list, drained before the replacer is consulted
/// - Clock replacement for eviction
/// - Pin counting for concurrent access
/// - Dirty write-back through the write-ahead gate
///
/// One mutex serializes every public operation; the returned frame handles
/// stay valid as long as the caller holds a pin.
pub struct BufferPool {
    /// Configuration.
    config: BufferPoolConfig,
    /// Array of buffer frames. Allocated once, never relocated.
    frames: Vec<BufferFrame>,
    /// Page table and free list, guarded by the pool lock.
    inner: Mutex<PoolInner>,
    /// Page replacement policy.
    replacer: ClockReplacer,
    /// Persistent page device.
    disk: Arc<dyn PageDevice>,
    /// Optional write-ahead log for the log-before-data gate.
    wal: Option<Arc<dyn LogManager>>,
}

struct PoolInner {
    /// Mapping of resident pages to frames.
    page_table: PageTable,
    /// Frames holding no page, drained front-first.
    free_list: VecDeque<FrameId>,
}

impl BufferPool {
    /// Creates a new buffer pool over the given page device.
    ///
    /// # Panics
    ///
    /// Panics if `config.num_frames` is zero.
    pub fn new(config: BufferPoolConfig, disk: Arc<dyn PageDevice>) -> Self {
        Self::with_log_manager(config, disk, None)
    }

    /// Creates a buffer pool with a write-ahead log attached.
    ///
    /// Dirty write-back blocks on the log flushing up to the frame's page
    /// LSN before the page write.
    pub fn with_log_manager(
        config: BufferPoolConfig,
        disk: Arc<dyn PageDevice>,
        wal: Option<Arc<dyn LogManager>>,
    ) -> Self {
        let num_frames = config.num_frames;
        assert!(num_frames > 0, "buffer pool requires at least one frame");

        // Initialize frames
        let frames: Vec<_> = (0..num_frames)
            .map(|i| BufferFrame::new(FrameId(i as u32)))
            .collect();

        // All frames start in the free list
        let free_list: VecDeque<_> = (0..num_frames).map(|i| FrameId(i as u32)).collect();

        Self {
            config,
            frames,
            inner: Mutex::new(PoolInner {
                page_table: PageTable::new(num_frames),
                free_list,
            }),
            replacer: ClockReplacer::new(num_frames),
            disk,
            wal,
        }
    }

    /// Creates a buffer pool sized to 25% of available system RAM.
    ///
    /// Queries the system for available memory and allocates 25% of it
    /// for the buffer pool. Minimum 1,000 frames to ensure useful caching
    /// even on low-memory systems.
    pub fn auto_sized(disk: Arc<dyn PageDevice>) -> Self {
        let mut sys = System::new_all();
        sys.refresh_memory();

        let available_bytes = sys.available_memory() as usize;
        let target_bytes = available_bytes / 4; // 25% of available RAM
        let num_frames = (target_bytes / PAGE_SIZE).max(1_000);

        Self::new(BufferPoolConfig { num_frames }, disk)
    }

    /// Returns the number of frames in the pool.
    pub fn num_frames(&self) -> usize {
        self.config.num_frames
    }

    /// Returns the number of free frames.
    pub fn free_count(&self) -> usize {
        self.inner.lock().free_list.len()
    }

    /// Returns the number of pages currently resident in the pool.
    pub fn page_count(&self) -> usize {
        self.inner.lock().page_table.len()
    }

    /// Checks if a page is resident in the buffer pool.
    pub fn contains(&self, page_id: PageId) -> bool {
        self.inner.lock().page_table.contains(page_id)
    }

    /// Fetches a page, reading it from the device on a miss.
    ///
    /// The returned frame is pinned; it stays valid until the caller
    /// releases the pin via [`unpin_page`](Self::unpin_page). Returns
    /// `Ok(None)` only when every frame is pinned.
    pub fn fetch_page(&self, page_id: PageId) -> Result<Option<&BufferFrame>> {
        let mut inner = self.inner.lock();

        // Hit path
        if let Some(frame_id) = inner.page_table.get(page_id) {
            let frame = &self.frames[frame_id.index()];
            frame.pin();
            self.replacer.pin(frame_id);
            return Ok(Some(frame));
        }

        // Miss path: free list first, then a victim
        let Some(frame_id) = self.take_frame(&mut inner)? else {
            return Ok(None);
        };

        let frame = &self.frames[frame_id.index()];
        frame.reset();
        frame.set_page_id(Some(page_id));
        frame.pin();
        inner.page_table.insert(page_id, frame_id);
        self.replacer.pin(frame_id);

        {
            let mut data = frame.write_data();
            self.disk.read_page(page_id, &mut **data)?;
        }

        Ok(Some(frame))
    }

    /// Allocates a fresh page and returns its pinned frame.
    ///
    /// The frame's payload is zero-initialized in memory; no device read is
    /// performed. The new identifier is available via `frame.page_id()`.
    /// Returns `Ok(None)` when every frame is pinned.
    pub fn new_page(&self) -> Result<Option<&BufferFrame>> {
        let mut inner = self.inner.lock();

        let Some(frame_id) = self.take_frame(&mut inner)? else {
            return Ok(None);
        };

        let page_id = self.disk.allocate_page()?;

        let frame = &self.frames[frame_id.index()];
        frame.reset();
        frame.set_page_id(Some(page_id));
        frame.pin();
        inner.page_table.insert(page_id, frame_id);
        self.replacer.pin(frame_id);

        Ok(Some(frame))
    }

    /// Releases one pin on a page, merging the caller's dirty flag.
    ///
    /// Returns false if the page is not resident, or if its pin count is
    /// already zero (caller bug; no state is mutated). When the count
    /// reaches zero the frame becomes an eviction candidate.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let inner = self.inner.lock();

        let Some(frame_id) = inner.page_table.get(page_id) else {
            return false;
        };
        let frame = &self.frames[frame_id.index()];
        if frame.pin_count() == 0 {
            return false;
        }

        if is_dirty {
            frame.set_dirty(true);
        }
        if frame.unpin() == 0 {
            self.replacer.unpin(frame_id);
        }
        true
    }

    /// Writes a dirty page back to the device and clears its dirty flag.
    ///
    /// Returns false if the page is not resident or not dirty. Pin state is
    /// ignored; a dirty pinned page may be flushed.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        let inner = self.inner.lock();
        self.flush_locked(&inner, page_id)
    }

    /// Flushes every resident dirty page.
    ///
    /// Returns the number of pages flushed.
    pub fn flush_all(&self) -> Result<usize> {
        let inner = self.inner.lock();

        let mut flushed = 0;
        for page_id in inner.page_table.pages() {
            if self.flush_locked(&inner, page_id)? {
                flushed += 1;
            }
        }
        Ok(flushed)
    }

    /// Drops a page from the pool and deallocates its identifier.
    ///
    /// Returns true if the page is absent or was removed; false if someone
    /// still holds a pin on it.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool> {
        let mut inner = self.inner.lock();

        let Some(frame_id) = inner.page_table.get(page_id) else {
            return Ok(true);
        };
        let frame = &self.frames[frame_id.index()];
        if frame.pin_count() > 0 {
            return Ok(false);
        }

        inner.page_table.remove(page_id);
        self.replacer.pin(frame_id);
        frame.reset();
        inner.free_list.push_back(frame_id);

        self.disk.deallocate_page(page_id)?;
        Ok(true)
    }

    /// Obtains a frame for a new resident page: free list first, then a
    /// victim from the replacer. A dirty victim is written back through the
    /// write-ahead gate and its old mapping erased.
    fn take_frame(&self, inner: &mut PoolInner) -> Result<Option<FrameId>> {
        if let Some(frame_id) = inner.free_list.pop_front() {
            return Ok(Some(frame_id));
        }

        let Some(frame_id) = self.replacer.victim() else {
            return Ok(None);
        };

        let frame = &self.frames[frame_id.index()];
        if let Some(old_page_id) = frame.page_id() {
            if frame.is_dirty() {
                self.write_back(old_page_id, frame)?;
            }
            inner.page_table.remove(old_page_id);
        }

        Ok(Some(frame_id))
    }

    /// Flush helper running under an already-held pool lock.
    fn flush_locked(&self, inner: &PoolInner, page_id: PageId) -> Result<bool> {
        let Some(frame_id) = inner.page_table.get(page_id) else {
            return Ok(false);
        };
        let frame = &self.frames[frame_id.index()];
        if !frame.is_dirty() {
            return Ok(false);
        }

        self.write_back(page_id, frame)?;
        frame.set_dirty(false);
        Ok(true)
    }

    /// Persists a frame's payload, honoring log-before-data: if the frame
    /// carries a page LSN beyond the log's persisted point, the log is
    /// flushed up to that point first.
    fn write_back(&self, page_id: PageId, frame: &BufferFrame) -> Result<()> {
        if let Some(wal) = &self.wal {
            let page_lsn = frame.page_lsn();
            if page_lsn > wal.flushed_lsn() {
                wal.flush_until(page_lsn)?;
            }
        }

        let data = frame.read_data();
        self.disk.write_page(page_id, &**data)
    }

    /// Returns a read guard for page data.
    ///
    /// The guard holds one pin and releases it on drop.
    pub fn read_page(&self, page_id: PageId) -> Result<Option<PageReadGuard<'_>>> {
        let Some(frame) = self.fetch_page(page_id)? else {
            return Ok(None);
        };
        Ok(Some(PageReadGuard {
            pool: self,
            page_id,
            frame,
        }))
    }

    /// Returns a write guard for page data.
    ///
    /// The guard holds one pin and releases it on drop, propagating the
    /// frame's dirty flag.
    pub fn write_page(&self, page_id: PageId) -> Result<Option<PageWriteGuard<'_>>> {
        let Some(frame) = self.fetch_page(page_id)? else {
            return Ok(None);
        };
        Ok(Some(PageWriteGuard {
            pool: self,
            page_id,
            frame,
        }))
    }

    /// Returns statistics about the buffer pool.
    pub fn stats(&self) -> BufferPoolStats {
        let inner = self.inner.lock();

        let mut pinned_count = 0;
        let mut dirty_count = 0;
        for (_, frame_id) in inner.page_table.iter() {
            let frame = &self.frames[frame_id.index()];
            if frame.is_pinned() {
                pinned_count += 1;
            }
            if frame.is_dirty() {
                dirty_count += 1;
            }
        }

        BufferPoolStats {
            total_frames: self.config.num_frames,
            free_frames: inner.free_list.len(),
            used_frames: inner.page_table.len(),
            pinned_frames: pinned_count,
            dirty_frames: dirty_count,
        }
    }

    /// Returns the number of frames the replacer considers evictable.
    pub fn evictable_count(&self) -> usize {
        self.replacer.size()
    }
}

/// Statistics about the buffer pool.
#[derive(Debug, Clone)]
pub struct BufferPoolStats {
    /// Total number of frames.
    pub total_frames: usize,
    /// Number of free frames.
    pub free_frames: usize,
    /// Number of frames with pages.
    pub used_frames: usize,
    /// Number of pinned frames.
    pub pinned_frames: usize,
    /// Number of dirty frames.
    pub dirty_frames: usize,
}

/// RAII guard for reading a page.
pub struct PageReadGuard<'a> {
    pool: &'a BufferPool,
    page_id: PageId,
    frame: &'a BufferFrame,
}

impl<'a> PageReadGuard<'a> {
    /// Returns the page ID.
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Returns the page data.
    pub fn data(&self) -> parking_lot::RwLockReadGuard<'_, Box<[u8; PAGE_SIZE]>> {
        self.frame.read_data()
    }
}

impl Drop for PageReadGuard<'_> {
    fn drop(&mut self) {
        self.pool.unpin_page(self.page_id, false);
    }
}

/// RAII guard for writing a page.
pub struct PageWriteGuard<'a> {
    pool: &'a BufferPool,
    page_id: PageId,
    frame: &'a BufferFrame,
}

impl<'a> PageWriteGuard<'a> {
    /// Returns the page ID.
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Returns mutable access to page data.
    pub fn data_mut(&self) -> parking_lot::RwLockWriteGuard<'_, Box<[u8; PAGE_SIZE]>> {
        self.frame.write_data()
    }

    /// Marks the page as dirty.
    pub fn set_dirty(&self) {
        self.frame.set_dirty(true);
    }

    /// Records the LSN of a logged modification on the frame.
    pub fn set_page_lsn(&self, lsn: Lsn) {
        self.frame.set_page_lsn(lsn);
    }
}

impl Drop for PageWriteGuard<'_> {
    fn drop(&mut self) {
        self.pool.unpin_page(self.page_id, self.frame.is_dirty());
    }
}
