//! Page table mapping resident page IDs to frame IDs.

use crate::frame::FrameId;
use silt_common::page::PageId;
use std::collections::HashMap;

/// Mapping from `PageId` to `FrameId`, one-to-one and key-unique.
///
/// A page appears in the table iff some frame currently holds it. The table
/// is owned by the pool and only accessed while the pool's lock is held, so
/// it carries no synchronization of its own.
#[derive(Debug, Default)]
pub struct PageTable {
    entries: HashMap<PageId, FrameId>,
}

impl PageTable {
    /// Creates a page table sized for the given number of frames.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
        }
    }

    /// Looks up a page ID and returns its frame ID if resident.
    #[inline]
    pub fn get(&self, page_id: PageId) -> Option<FrameId> {
        self.entries.get(&page_id).copied()
    }

    /// Inserts a page ID to frame ID mapping.
    #[inline]
    pub fn insert(&mut self, page_id: PageId, frame_id: FrameId) {
        self.entries.insert(page_id, frame_id);
    }

    /// Removes a page ID mapping. Returns the frame ID if it was present.
    #[inline]
    pub fn remove(&mut self, page_id: PageId) -> Option<FrameId> {
        self.entries.remove(&page_id)
    }

    /// Returns true if the page ID is in the table.
    #[inline]
    pub fn contains(&self, page_id: PageId) -> bool {
        self.entries.contains_key(&page_id)
    }

    /// Returns the number of resident pages.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the table is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns a snapshot of all resident page IDs.
    pub fn pages(&self) -> Vec<PageId> {
        self.entries.keys().copied().collect()
    }

    /// Iterates over all entries.
    pub fn iter(&self) -> impl Iterator<Item = (PageId, FrameId)> + '_ {
        self.entries.iter().map(|(&p, &f)| (p, f))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_get() {
        let mut table = PageTable::new(100);
        let page_id = PageId::new(42);
        let frame_id = FrameId(7);

        table.insert(page_id, frame_id);
        assert_eq!(table.get(page_id), Some(frame_id));
        assert!(table.contains(page_id));
    }

    #[test]
    fn test_remove() {
        let mut table = PageTable::new(100);
        let page_id = PageId::new(42);
        let frame_id = FrameId(7);

        table.insert(page_id, frame_id);
        assert_eq!(table.remove(page_id), Some(frame_id));
        assert_eq!(table.get(page_id), None);
        assert!(!table.contains(page_id));
    }

    #[test]
    fn test_remove_absent() {
        let mut table = PageTable::new(10);
        assert_eq!(table.remove(PageId::new(1)), None);
    }

    #[test]
    fn test_len() {
        let mut table = PageTable::new(100);

        assert_eq!(table.len(), 0);
        assert!(table.is_empty());

        table.insert(PageId::new(1), FrameId(1));
        table.insert(PageId::new(2), FrameId(2));
        table.insert(PageId::new(3), FrameId(3));

        assert_eq!(table.len(), 3);
        assert!(!table.is_empty());
    }

    #[test]
    fn test_update_existing() {
        let mut table = PageTable::new(100);
        let page_id = PageId::new(42);

        table.insert(page_id, FrameId(1));
        assert_eq!(table.get(page_id), Some(FrameId(1)));

        table.insert(page_id, FrameId(2));
        assert_eq!(table.get(page_id), Some(FrameId(2)));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_pages_snapshot() {
        let mut table = PageTable::new(10);
        table.insert(PageId::new(1), FrameId(0));
        table.insert(PageId::new(2), FrameId(1));

        let mut pages = table.pages();
        pages.sort();
        assert_eq!(pages, vec![PageId::new(1), PageId::new(2)]);
    }

    #[test]
    fn test_iter() {
        let mut table = PageTable::new(10);
        table.insert(PageId::new(5), FrameId(3));

        let entries: Vec<_> = table.iter().collect();
        assert_eq!(entries, vec![(PageId::new(5), FrameId(3))]);
    }
}
