//! Storage engine for SiltDB.
//!
//! This crate provides the disk manager: page-level file I/O behind the
//! buffer pool's page device contract.

mod disk;

pub use disk::{DiskManager, DiskManagerConfig};
