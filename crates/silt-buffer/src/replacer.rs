//! Page replacement policies for the buffer pool.

use crate::frame::FrameId;
use parking_lot::Mutex;

/// Trait for page replacement algorithms.
///
/// The replacer speaks only in frame indices; it knows nothing about page
/// contents or identifiers.
pub trait Replacer: Send + Sync {
    /// Marks a frame as not-evictable. Idempotent; does not touch the
    /// reference bit. Out-of-range frame IDs are ignored.
    fn pin(&self, frame_id: FrameId);

    /// Marks a frame as evictable and sets its reference bit. The bit is
    /// re-set even when the frame is already evictable, so recent use earns
    /// a second chance. Out-of-range frame IDs are ignored.
    fn unpin(&self, frame_id: FrameId);

    /// Selects a victim frame for eviction.
    ///
    /// Returns None if no frame is evictable. The selected frame leaves the
    /// evictable set.
    fn victim(&self) -> Option<FrameId>;

    /// Returns the number of currently evictable frames.
    fn size(&self) -> usize;
}

/// Clock (second-chance) replacement algorithm.
///
/// Tracks one evictable flag and one reference bit per frame plus a rotating
/// hand. A frame whose reference bit is set survives one sweep: the bit is
/// cleared and the hand moves on. One full revolution clears every bit, so a
/// victim is found by the second revolution whenever any frame is evictable.
pub struct ClockReplacer {
    /// Number of frames.
    num_frames: usize,
    /// Internal state protected by mutex.
    inner: Mutex<ClockCore>,
}

struct ClockCore {
    /// Per-frame eviction candidacy. True iff the frame holds a page whose
    /// pin count reached zero.
    evictable: Box<[bool]>,
    /// Per-frame reference bits, set on unpin and cleared by the sweep.
    referenced: Box<[bool]>,
    /// Current clock hand position.
    hand: usize,
    /// Count of evictable frames.
    evictable_count: usize,
}

impl ClockReplacer {
    /// Creates a new clock replacer with the given number of frames.
    ///
    /// All frames start pinned: nothing is a candidate until the pool hands
    /// out frames and they become unpinned.
    pub fn new(num_frames: usize) -> Self {
        Self {
            num_frames,
            inner: Mutex::new(ClockCore {
                evictable: vec![false; num_frames].into_boxed_slice(),
                referenced: vec![false; num_frames].into_boxed_slice(),
                hand: 0,
                evictable_count: 0,
            }),
        }
    }

    /// Returns the total capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.num_frames
    }
}

impl Replacer for ClockReplacer {
    #[inline]
    fn pin(&self, frame_id: FrameId) {
        let idx = frame_id.index();
        if idx >= self.num_frames {
            return;
        }

        let mut inner = self.inner.lock();
        if inner.evictable[idx] {
            inner.evictable[idx] = false;
            inner.evictable_count -= 1;
        }
    }

    #[inline]
    fn unpin(&self, frame_id: FrameId) {
        let idx = frame_id.index();
        if idx >= self.num_frames {
            return;
        }

        let mut inner = self.inner.lock();
        if !inner.evictable[idx] {
            inner.evictable[idx] = true;
            inner.evictable_count += 1;
        }
        inner.referenced[idx] = true;
    }

    fn victim(&self) -> Option<FrameId> {
        let mut inner = self.inner.lock();

        if inner.evictable_count == 0 {
            return None;
        }

        let num_frames = self.num_frames;

        // Two full revolutions suffice: the first clears every reference bit
        // on the evictable frames, the second must find one unreferenced.
        for _ in 0..(2 * num_frames) {
            let pos = inner.hand;

            if inner.evictable[pos] {
                if inner.referenced[pos] {
                    // Second chance: clear the bit and keep sweeping
                    inner.referenced[pos] = false;
                } else {
                    inner.evictable[pos] = false;
                    inner.evictable_count -= 1;
                    inner.hand = (pos + 1) % num_frames;
                    return Some(FrameId(pos as u32));
                }
            }

            inner.hand = (pos + 1) % num_frames;
        }

        // If we still haven't found one, just pick any evictable frame
        if let Some(pos) = inner.evictable.iter().position(|&e| e) {
            inner.evictable[pos] = false;
            inner.evictable_count -= 1;
            inner.hand = (pos + 1) % num_frames;
            return Some(FrameId(pos as u32));
        }

        None
    }

    fn size(&self) -> usize {
        self.inner.lock().evictable_count
    }
}
