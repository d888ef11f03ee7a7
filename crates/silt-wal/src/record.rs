//! WAL log record format.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use silt_common::page::Lsn;
use silt_common::{Result, SiltError};

/// Types of log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LogRecordType {
    /// Transaction begin.
    Begin = 1,
    /// Transaction commit.
    Commit = 2,
    /// Transaction abort/rollback.
    Abort = 3,
    /// Page update operation (redo payload).
    Update = 10,
}

impl TryFrom<u8> for LogRecordType {
    type Error = SiltError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(LogRecordType::Begin),
            2 => Ok(LogRecordType::Commit),
            3 => Ok(LogRecordType::Abort),
            10 => Ok(LogRecordType::Update),
            _ => Err(SiltError::WalCorrupted {
                lsn: 0,
                reason: format!("invalid record type: {}", value),
            }),
        }
    }
}

/// A single log record in the WAL.
///
/// Record format on disk:
/// - header (24 bytes):
///   - lsn: 8 bytes
///   - prev_lsn: 8 bytes (for transaction chaining)
///   - txn_id: 4 bytes
///   - record_type: 1 byte
///   - flags: 1 byte
///   - payload_len: 2 bytes
/// - payload: variable length
/// - checksum: 4 bytes (CRC32 of header + payload)
#[derive(Debug, Clone)]
pub struct LogRecord {
    /// LSN of this record.
    pub lsn: Lsn,
    /// LSN of the previous record in this transaction.
    pub prev_lsn: Lsn,
    /// Transaction ID.
    pub txn_id: u32,
    /// Type of this record.
    pub record_type: LogRecordType,
    /// Record flags.
    pub flags: u8,
    /// Record payload.
    pub payload: Bytes,
}

impl LogRecord {
    /// Size of the record header in bytes.
    pub const HEADER_SIZE: usize = 24;
    /// Size of the checksum in bytes.
    pub const CHECKSUM_SIZE: usize = 4;
    /// Maximum payload size; the length field on disk is 16 bits.
    pub const MAX_PAYLOAD_SIZE: usize = u16::MAX as usize;

    /// Creates a new log record.
    pub fn new(
        lsn: Lsn,
        prev_lsn: Lsn,
        txn_id: u32,
        record_type: LogRecordType,
        payload: Bytes,
    ) -> Self {
        Self {
            lsn,
            prev_lsn,
            txn_id,
            record_type,
            flags: 0,
            payload,
        }
    }

    /// Creates a transaction begin record.
    pub fn begin(lsn: Lsn, txn_id: u32) -> Self {
        Self::new(lsn, Lsn::INVALID, txn_id, LogRecordType::Begin, Bytes::new())
    }

    /// Creates a transaction commit record.
    pub fn commit(lsn: Lsn, prev_lsn: Lsn, txn_id: u32) -> Self {
        Self::new(lsn, prev_lsn, txn_id, LogRecordType::Commit, Bytes::new())
    }

    /// Creates a transaction abort record.
    pub fn abort(lsn: Lsn, prev_lsn: Lsn, txn_id: u32) -> Self {
        Self::new(lsn, prev_lsn, txn_id, LogRecordType::Abort, Bytes::new())
    }

    /// Returns the total size of this record on disk.
    pub fn size_on_disk(&self) -> usize {
        Self::HEADER_SIZE + self.payload.len() + Self::CHECKSUM_SIZE
    }

    /// Serializes this record to bytes.
    pub fn serialize(&self) -> Bytes {
        let total_size = self.size_on_disk();
        let mut buf = BytesMut::with_capacity(total_size);

        // Write header
        buf.put_u64_le(self.lsn.0);
        buf.put_u64_le(self.prev_lsn.0);
        buf.put_u32_le(self.txn_id);
        buf.put_u8(self.record_type as u8);
        buf.put_u8(self.flags);
        buf.put_u16_le(self.payload.len() as u16);

        // Write payload
        buf.put_slice(&self.payload);

        // Compute and write checksum
        let checksum = crc32fast::hash(&buf);
        buf.put_u32_le(checksum);

        buf.freeze()
    }

    /// Deserializes a record from bytes.
    pub fn deserialize(mut data: &[u8]) -> Result<Self> {
        if data.len() < Self::HEADER_SIZE + Self::CHECKSUM_SIZE {
            return Err(SiltError::WalCorrupted {
                lsn: 0,
                reason: "record too short".to_string(),
            });
        }

        // Read header
        let lsn = Lsn(data.get_u64_le());
        let prev_lsn = Lsn(data.get_u64_le());
        let txn_id = data.get_u32_le();
        let record_type = LogRecordType::try_from(data.get_u8())?;
        let flags = data.get_u8();
        let payload_len = data.get_u16_le() as usize;

        if data.len() < payload_len + Self::CHECKSUM_SIZE {
            return Err(SiltError::WalCorrupted {
                lsn: lsn.0,
                reason: "truncated record".to_string(),
            });
        }

        // Read payload
        let payload = Bytes::copy_from_slice(&data[..payload_len]);
        data.advance(payload_len);

        // Read and verify checksum
        let stored_checksum = data.get_u32_le();
        let record = Self {
            lsn,
            prev_lsn,
            txn_id,
            record_type,
            flags,
            payload,
        };

        let serialized = record.serialize();
        let computed_checksum = (&serialized[serialized.len() - 4..]).get_u32_le();

        if stored_checksum != computed_checksum {
            return Err(SiltError::WalCorrupted {
                lsn: lsn.0,
                reason: format!(
                    "checksum mismatch: stored={}, computed={}",
                    stored_checksum, computed_checksum
                ),
            });
        }

        Ok(record)
    }
}
