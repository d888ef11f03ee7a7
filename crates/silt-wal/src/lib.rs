//! Write-Ahead Log (WAL) for SiltDB.
//!
//! Persists redo records ahead of dirty-page write-back. The buffer pool
//! consults the writer's persisted point through the `LogManager` contract
//! and blocks page writes on `flush_until` when needed.

pub mod record;
pub mod writer;

pub use record::{LogRecord, LogRecordType};
pub use writer::{WalWriter, WalWriterConfig};
