//! Disk manager for page-level file I/O.

use parking_lot::Mutex;
use silt_buffer::PageDevice;
use silt_common::page::{PageId, PAGE_SIZE};
use silt_common::{Result, SiltError};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Name of the data file inside the data directory.
const DATA_FILE: &str = "pages.dat";

/// Configuration for the disk manager.
#[derive(Debug, Clone)]
pub struct DiskManagerConfig {
    /// Base directory for the data file.
    pub data_dir: PathBuf,
    /// Enable fsync after writes.
    pub fsync_enabled: bool,
}

impl Default for DiskManagerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            fsync_enabled: true,
        }
    }
}

/// Manages reading and writing pages to a single data file.
///
/// Pages live at `page_id * PAGE_SIZE` offsets. The page allocator hands out
/// monotonically increasing identifiers, reusing deallocated ones first; the
/// counter is seeded from the file length at open, so an existing file
/// resumes where it left off.
pub struct DiskManager {
    /// Configuration.
    config: DiskManagerConfig,
    /// File handle and allocation state.
    inner: Mutex<DiskInner>,
}

struct DiskInner {
    /// The data file handle.
    file: File,
    /// Number of pages the file currently covers.
    num_pages: u64,
    /// Next identifier to hand out.
    next_page_id: u64,
    /// Deallocated identifiers available for reuse.
    free_pages: Vec<PageId>,
}

impl DiskManager {
    /// Creates a new disk manager, opening or creating the data file.
    pub fn new(config: DiskManagerConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let path = config.data_dir.join(DATA_FILE);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        let file_size = file.metadata()?.len();
        let num_pages = file_size / PAGE_SIZE as u64;

        Ok(Self {
            config,
            inner: Mutex::new(DiskInner {
                file,
                num_pages,
                next_page_id: num_pages,
                free_pages: Vec::new(),
            }),
        })
    }

    /// Returns the data directory path.
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Returns the number of pages the data file covers.
    pub fn num_pages(&self) -> u64 {
        self.inner.lock().num_pages
    }

    /// Reads a page from disk, filling exactly PAGE_SIZE bytes.
    ///
    /// Offsets at or beyond the end of the file read back as zeroes, so a
    /// page that was allocated but never written is all-zero.
    pub fn read_page(&self, page_id: PageId, buf: &mut [u8; PAGE_SIZE]) -> Result<()> {
        let mut inner = self.inner.lock();

        let offset = page_id.0 * PAGE_SIZE as u64;
        let file_len = inner.file.metadata()?.len();

        if offset >= file_len {
            buf.fill(0);
            return Ok(());
        }

        inner.file.seek(SeekFrom::Start(offset))?;
        let available = ((file_len - offset) as usize).min(PAGE_SIZE);
        inner.file.read_exact(&mut buf[..available])?;
        buf[available..].fill(0);

        Ok(())
    }

    /// Writes a page to disk; synchronous when fsync is enabled.
    pub fn write_page(&self, page_id: PageId, data: &[u8; PAGE_SIZE]) -> Result<()> {
        let mut inner = self.inner.lock();

        let offset = page_id.0 * PAGE_SIZE as u64;
        inner.file.seek(SeekFrom::Start(offset))?;
        inner.file.write_all(data)?;

        if self.config.fsync_enabled {
            inner.file.sync_all()?;
        }

        // Track file growth
        if page_id.0 >= inner.num_pages {
            inner.num_pages = page_id.0 + 1;
        }

        Ok(())
    }

    /// Returns a fresh page identifier, reusing deallocated ones first.
    pub fn allocate_page(&self) -> Result<PageId> {
        let mut inner = self.inner.lock();

        if let Some(page_id) = inner.free_pages.pop() {
            return Ok(page_id);
        }

        let page_id = PageId(inner.next_page_id);
        inner.next_page_id += 1;
        Ok(page_id)
    }

    /// Marks a page identifier as reusable.
    pub fn deallocate_page(&self, page_id: PageId) -> Result<()> {
        let mut inner = self.inner.lock();

        if page_id.0 >= inner.next_page_id {
            return Err(SiltError::InvalidParameter {
                name: "page_id".to_string(),
                value: page_id.to_string(),
            });
        }

        inner.free_pages.push(page_id);
        Ok(())
    }
}

impl PageDevice for DiskManager {
    fn read_page(&self, page_id: PageId, buf: &mut [u8; PAGE_SIZE]) -> Result<()> {
        DiskManager::read_page(self, page_id, buf)
    }

    fn write_page(&self, page_id: PageId, data: &[u8; PAGE_SIZE]) -> Result<()> {
        DiskManager::write_page(self, page_id, data)
    }

    fn allocate_page(&self) -> Result<PageId> {
        DiskManager::allocate_page(self)
    }

    fn deallocate_page(&self, page_id: PageId) -> Result<()> {
        DiskManager::deallocate_page(self, page_id)
    }
}
