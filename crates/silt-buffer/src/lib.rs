//! Buffer pool management for SiltDB.
//!
//! This crate provides in-memory page caching with:
//! - Fixed-size buffer pool with configurable frame count
//! - Clock (second-chance) eviction policy
//! - Pin counting for concurrent access
//! - Dirty page write-back through a write-ahead gate

mod frame;
mod page_table;
mod pool;
mod replacer;

pub use frame::{BufferFrame, FrameId};
pub use pool::{
    BufferPool, BufferPoolConfig, BufferPoolStats, LogManager, PageDevice, PageReadGuard,
    PageWriteGuard,
};
pub use replacer::{ClockReplacer, Replacer};
