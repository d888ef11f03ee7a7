//! WAL writer for appending log records.

use crate::record::{LogRecord, LogRecordType};
use bytes::Bytes;
use parking_lot::Mutex;
use silt_buffer::LogManager;
use silt_common::page::Lsn;
use silt_common::{Result, SiltError};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Name of the log file inside the WAL directory.
const LOG_FILE: &str = "wal.log";

/// Magic number at the start of every log file ("SILTWAL1").
const LOG_MAGIC: u64 = 0x53494C5457414C31;

/// File header: magic (8) + version (4) + reserved (4).
const HEADER_SIZE: u64 = 16;

/// Current log format version.
const LOG_VERSION: u32 = 1;

/// Configuration for the WAL writer.
#[derive(Debug, Clone)]
pub struct WalWriterConfig {
    /// Directory for the log file.
    pub wal_dir: PathBuf,
    /// Enable fsync after each append. When disabled, records reach the OS
    /// on append and become durable on the next explicit flush.
    pub fsync_enabled: bool,
}

impl Default for WalWriterConfig {
    fn default() -> Self {
        Self {
            wal_dir: PathBuf::from("./data/wal"),
            fsync_enabled: true,
        }
    }
}

/// Thread-safe, synchronous WAL writer.
///
/// Records are appended to a single log file. The LSN assigned to a record
/// is the log offset just past it, so LSNs are strictly monotonic and a
/// record is durable exactly when the persisted point has reached its LSN.
pub struct WalWriter {
    /// Configuration.
    config: WalWriterConfig,
    /// File handle and append position.
    inner: Mutex<WalInner>,
    /// Offset up to which the log is known durable.
    flushed_lsn: AtomicU64,
    /// Next transaction ID to assign.
    next_txn_id: AtomicU64,
}

struct WalInner {
    /// The log file handle.
    file: File,
    /// Byte offset of the next append.
    write_offset: u64,
}

impl WalWriter {
    /// Creates a new WAL writer, opening or creating the log file.
    ///
    /// An existing log resumes appending at its end; everything already in
    /// the file is treated as durable.
    pub fn new(config: WalWriterConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.wal_dir)?;

        let path = config.wal_dir.join(LOG_FILE);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        let file_size = file.metadata()?.len();
        let write_offset = if file_size < HEADER_SIZE {
            Self::write_header(&mut file)?;
            HEADER_SIZE
        } else {
            Self::check_header(&mut file)?;
            file_size
        };

        Ok(Self {
            config,
            inner: Mutex::new(WalInner { file, write_offset }),
            flushed_lsn: AtomicU64::new(write_offset),
            next_txn_id: AtomicU64::new(1),
        })
    }

    fn write_header(file: &mut File) -> Result<()> {
        let mut header = [0u8; HEADER_SIZE as usize];
        header[0..8].copy_from_slice(&LOG_MAGIC.to_le_bytes());
        header[8..12].copy_from_slice(&LOG_VERSION.to_le_bytes());
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&header)?;
        file.sync_all()?;
        Ok(())
    }

    fn check_header(file: &mut File) -> Result<()> {
        let mut header = [0u8; HEADER_SIZE as usize];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut header)?;

        let magic = u64::from_le_bytes(header[0..8].try_into().unwrap());
        if magic != LOG_MAGIC {
            return Err(SiltError::WalCorrupted {
                lsn: 0,
                reason: "bad log file magic".to_string(),
            });
        }
        Ok(())
    }

    /// Returns the directory containing the log file.
    pub fn wal_dir(&self) -> &Path {
        &self.config.wal_dir
    }

    /// Returns the current append position.
    pub fn next_lsn(&self) -> Lsn {
        Lsn(self.inner.lock().write_offset)
    }

    /// Allocates a new transaction ID.
    pub fn allocate_txn_id(&self) -> u32 {
        self.next_txn_id.fetch_add(1, Ordering::SeqCst) as u32
    }

    /// Appends a log record, assigning its LSN.
    pub fn append(&self, mut record: LogRecord) -> Result<Lsn> {
        if record.payload.len() > LogRecord::MAX_PAYLOAD_SIZE {
            return Err(SiltError::WalWriteFailed(format!(
                "payload too large: {} bytes",
                record.payload.len()
            )));
        }

        let mut inner = self.inner.lock();

        let start = inner.write_offset;
        let lsn = Lsn(start + record.size_on_disk() as u64);
        record.lsn = lsn;
        let encoded = record.serialize();

        inner.file.seek(SeekFrom::Start(start))?;
        inner.file.write_all(&encoded)?;
        inner.write_offset = lsn.0;

        if self.config.fsync_enabled {
            inner.file.sync_all()?;
            self.flushed_lsn.store(inner.write_offset, Ordering::SeqCst);
        }

        Ok(lsn)
    }

    /// Logs a transaction begin.
    pub fn log_begin(&self, txn_id: u32) -> Result<Lsn> {
        self.append(LogRecord::begin(Lsn::INVALID, txn_id))
    }

    /// Logs a transaction commit.
    pub fn log_commit(&self, txn_id: u32, prev_lsn: Lsn) -> Result<Lsn> {
        self.append(LogRecord::commit(Lsn::INVALID, prev_lsn, txn_id))
    }

    /// Logs a transaction abort.
    pub fn log_abort(&self, txn_id: u32, prev_lsn: Lsn) -> Result<Lsn> {
        self.append(LogRecord::abort(Lsn::INVALID, prev_lsn, txn_id))
    }

    /// Logs a page update with a redo payload.
    pub fn log_update(&self, txn_id: u32, prev_lsn: Lsn, payload: Bytes) -> Result<Lsn> {
        self.append(LogRecord::new(
            Lsn::INVALID,
            prev_lsn,
            txn_id,
            LogRecordType::Update,
            payload,
        ))
    }

    /// Forces all appended records to durable storage.
    ///
    /// Returns the persisted point after the flush.
    pub fn flush(&self) -> Result<Lsn> {
        let inner = self.inner.lock();
        inner.file.sync_all()?;
        self.flushed_lsn.store(inner.write_offset, Ordering::SeqCst);
        Ok(Lsn(inner.write_offset))
    }
}

impl LogManager for WalWriter {
    fn flushed_lsn(&self) -> Lsn {
        Lsn(self.flushed_lsn.load(Ordering::SeqCst))
    }

    fn flush_until(&self, lsn: Lsn) -> Result<()> {
        if self.flushed_lsn().0 >= lsn.0 {
            return Ok(());
        }

        let durable = self.flush()?;
        if durable.0 < lsn.0 {
            return Err(SiltError::WalWriteFailed(format!(
                "flush requested up to {} but log ends at {}",
                lsn, durable
            )));
        }
        Ok(())
    }
}
