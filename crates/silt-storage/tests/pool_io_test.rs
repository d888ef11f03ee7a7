//! Integration tests wiring the buffer pool to the real disk manager and
//! write-ahead log.

use bytes::Bytes;
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::Arc;
use tempfile::tempdir;

use silt_buffer::{BufferPool, BufferPoolConfig, LogManager};
use silt_common::page::{PageId, PAGE_SIZE};
use silt_common::StorageConfig;
use silt_storage::{DiskManager, DiskManagerConfig};
use silt_wal::{WalWriter, WalWriterConfig};

fn open_disk(dir: &std::path::Path) -> Arc<DiskManager> {
    let config = DiskManagerConfig {
        data_dir: dir.to_path_buf(),
        fsync_enabled: false,
    };
    Arc::new(DiskManager::new(config).unwrap())
}

fn open_wal(dir: &std::path::Path) -> Arc<WalWriter> {
    let config = WalWriterConfig {
        wal_dir: dir.to_path_buf(),
        fsync_enabled: false,
    };
    Arc::new(WalWriter::new(config).unwrap())
}

#[test]
fn test_page_bytes_survive_pool_restart() {
    let dir = tempdir().unwrap();
    let storage = StorageConfig {
        data_dir: dir.path().to_path_buf(),
        wal_dir: dir.path().join("wal"),
        buffer_pool_frames: 8,
        fsync_enabled: false,
        ..Default::default()
    };
    let disk = Arc::new(
        DiskManager::new(DiskManagerConfig {
            data_dir: storage.data_dir.clone(),
            fsync_enabled: storage.fsync_enabled,
        })
        .unwrap(),
    );

    let page_id;
    {
        let pool = BufferPool::new(
            BufferPoolConfig {
                num_frames: storage.buffer_pool_frames,
            },
            disk.clone(),
        );

        let frame = pool.new_page().unwrap().unwrap();
        page_id = frame.page_id().unwrap();
        {
            let mut data = frame.write_data();
            data[0..11].copy_from_slice(b"hello pages");
            data[PAGE_SIZE - 1] = 0x7F;
        }
        pool.unpin_page(page_id, true);
        assert_eq!(pool.flush_all().unwrap(), 1);
    }

    // A fresh pool over the same device sees the flushed bytes
    let pool = BufferPool::new(BufferPoolConfig { num_frames: 8 }, disk);
    let frame = pool.fetch_page(page_id).unwrap().unwrap();
    let data = frame.read_data();
    assert_eq!(&data[0..11], b"hello pages");
    assert_eq!(data[PAGE_SIZE - 1], 0x7F);
}

#[test]
fn test_fetch_sees_bytes_written_outside_the_pool() {
    let dir = tempdir().unwrap();
    let disk = open_disk(dir.path());

    let page_id = disk.allocate_page().unwrap();
    let mut raw = [0u8; PAGE_SIZE];
    raw[10] = 0xAA;
    raw[200] = 0xBB;
    disk.write_page(page_id, &raw).unwrap();

    let pool = BufferPool::new(BufferPoolConfig { num_frames: 4 }, disk);
    let frame = pool.fetch_page(page_id).unwrap().unwrap();
    assert_eq!(frame.read_data()[10], 0xAA);
    assert_eq!(frame.read_data()[200], 0xBB);
    pool.unpin_page(page_id, false);
}

#[test]
fn test_eviction_pressure_preserves_contents() {
    const NUM_FRAMES: usize = 4;
    const NUM_PAGES: usize = 32;

    let dir = tempdir().unwrap();
    let disk = open_disk(dir.path());
    let pool = BufferPool::new(
        BufferPoolConfig {
            num_frames: NUM_FRAMES,
        },
        disk,
    );

    // Write a recognizable pattern into many more pages than frames
    let mut page_ids = Vec::new();
    for i in 0..NUM_PAGES {
        let frame = pool.new_page().unwrap().unwrap();
        let page_id = frame.page_id().unwrap();
        {
            let mut data = frame.write_data();
            data[0..8].copy_from_slice(&(i as u64).to_le_bytes());
            data[100] = i as u8;
        }
        pool.unpin_page(page_id, true);
        page_ids.push(page_id);
    }
    assert_eq!(pool.page_count(), NUM_FRAMES);

    // Read everything back in shuffled order, through more eviction churn
    let mut order: Vec<usize> = (0..NUM_PAGES).collect();
    order.shuffle(&mut rand::rng());
    for &i in &order {
        let frame = pool.fetch_page(page_ids[i]).unwrap().unwrap();
        {
            let data = frame.read_data();
            assert_eq!(u64::from_le_bytes(data[0..8].try_into().unwrap()), i as u64);
            assert_eq!(data[100], i as u8);
        }
        pool.unpin_page(page_ids[i], false);
    }
}

#[test]
fn test_log_is_persisted_before_page_write_back() {
    let dir = tempdir().unwrap();
    let disk = open_disk(&dir.path().join("data"));
    let wal = open_wal(&dir.path().join("wal"));
    let pool = BufferPool::with_log_manager(
        BufferPoolConfig { num_frames: 2 },
        disk,
        Some(wal.clone()),
    );

    let frame = pool.new_page().unwrap().unwrap();
    let page_id = frame.page_id().unwrap();
    frame.write_data()[0] = 0xC4;

    // Log the modification; with fsync off the record is not yet durable
    let lsn = wal
        .log_update(1, silt_common::page::Lsn::INVALID, Bytes::from_static(b"redo"))
        .unwrap();
    frame.set_page_lsn(lsn);
    pool.unpin_page(page_id, true);
    assert!(wal.flushed_lsn() < lsn);

    // Write-back must drag the log's persisted point past the page LSN
    assert!(pool.flush_page(page_id).unwrap());
    assert!(wal.flushed_lsn() >= lsn);
}

#[test]
fn test_eviction_also_honors_the_log_gate() {
    let dir = tempdir().unwrap();
    let disk = open_disk(&dir.path().join("data"));
    let wal = open_wal(&dir.path().join("wal"));
    let pool = BufferPool::with_log_manager(
        BufferPoolConfig { num_frames: 1 },
        disk,
        Some(wal.clone()),
    );

    let frame = pool.new_page().unwrap().unwrap();
    let page_id = frame.page_id().unwrap();
    frame.write_data()[0] = 1;
    let lsn = wal
        .log_update(1, silt_common::page::Lsn::INVALID, Bytes::from_static(b"redo"))
        .unwrap();
    frame.set_page_lsn(lsn);
    pool.unpin_page(page_id, true);

    // Allocating a second page in a one-frame pool evicts the dirty page
    let frame = pool.new_page().unwrap().unwrap();
    assert_ne!(frame.page_id(), Some(page_id));
    assert!(wal.flushed_lsn() >= lsn);
}

#[test]
fn test_multithreaded_writers_round_trip() {
    const NUM_THREADS: usize = 4;
    const PAGES_PER_THREAD: usize = 8;
    const ROUNDS: usize = 20;

    let dir = tempdir().unwrap();
    let disk = open_disk(dir.path());
    let pool = Arc::new(BufferPool::new(
        BufferPoolConfig { num_frames: 8 },
        disk,
    ));

    // Allocate every page up front; each thread owns a disjoint set
    let mut page_ids = Vec::new();
    for _ in 0..NUM_THREADS * PAGES_PER_THREAD {
        let frame = pool.new_page().unwrap().unwrap();
        let page_id = frame.page_id().unwrap();
        pool.unpin_page(page_id, false);
        page_ids.push(page_id);
    }

    let mut handles = Vec::new();
    for t in 0..NUM_THREADS {
        let pool = pool.clone();
        let own: Vec<PageId> = page_ids
            [t * PAGES_PER_THREAD..(t + 1) * PAGES_PER_THREAD]
            .to_vec();
        handles.push(std::thread::spawn(move || {
            let mut rng = rand::rng();
            for _ in 0..ROUNDS {
                let page_id = own[rng.random_range(0..own.len())];
                // The pool may be momentarily exhausted by peers' pins
                if let Some(frame) = pool.fetch_page(page_id).unwrap() {
                    frame.write_data()[0] = t as u8 + 1;
                    assert!(pool.unpin_page(page_id, true));
                }
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    pool.flush_all().unwrap();

    // Every page carries its owning thread's stamp (or was never touched)
    for (i, &page_id) in page_ids.iter().enumerate() {
        let frame = pool.fetch_page(page_id).unwrap().unwrap();
        let stamp = frame.read_data()[0];
        let owner = (i / PAGES_PER_THREAD) as u8 + 1;
        assert!(
            stamp == 0 || stamp == owner,
            "page {} stamped {} by thread {}",
            page_id,
            stamp,
            owner
        );
        pool.unpin_page(page_id, false);
    }
}
