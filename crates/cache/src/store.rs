//! Per-document store of compressed pages
//!
//! A dense array indexed by page number. Each page is written once by the
//! task that rendered it and read by any number of threads afterwards.
//! A reader only sees a record after its `ready` flag is published.

use crate::page::CompressedPage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

/// Errors raised when publishing a page into the store
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },

    /// A second write to the same page; each page has exactly one writer
    #[error("page {0} already published")]
    AlreadyPublished(u32),

    #[error("page {0} already marked failed")]
    AlreadyFailed(u32),
}

/// Per-page publication state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStatus {
    Pending,
    Ready,
    Failed,
}

#[derive(Debug, Default)]
struct PageSlot {
    record: OnceLock<CompressedPage>,
    ready: AtomicBool,
    failed: AtomicBool,
}

impl PageSlot {
    fn status(&self) -> PageStatus {
        if self.ready.load(Ordering::Acquire) {
            PageStatus::Ready
        } else if self.failed.load(Ordering::Acquire) {
            PageStatus::Failed
        } else {
            PageStatus::Pending
        }
    }
}

/// Fixed-size array of page records for one open document.
///
/// # Example
///
/// ```
/// use pdf_viewer_cache::{CompressedPage, CompressedPageStore, Margins};
///
/// let store = CompressedPageStore::new(3);
/// assert!(store.get(1).is_none());
///
/// let page = CompressedPage::from_parts(vec![0; 8], 16, 2, 2, Margins::default());
/// store.publish(1, page).unwrap();
/// assert!(store.is_ready(1));
/// ```
#[derive(Debug)]
pub struct CompressedPageStore {
    slots: Box<[PageSlot]>,
}

impl CompressedPageStore {
    /// Allocate `page_count` empty records
    pub fn new(page_count: u32) -> Self {
        let slots = (0..page_count).map(|_| PageSlot::default()).collect();
        Self { slots }
    }

    pub fn page_count(&self) -> u32 {
        self.slots.len() as u32
    }

    fn slot(&self, page: u32) -> Result<&PageSlot, StoreError> {
        self.slots
            .get(page as usize)
            .ok_or(StoreError::PageOutOfRange {
                page,
                page_count: self.page_count(),
            })
    }

    /// Store the record for `page` and mark it ready.
    ///
    /// The record is fully written before the ready flag flips, so any
    /// thread that observes `ready` also observes the complete record.
    pub fn publish(&self, page: u32, record: CompressedPage) -> Result<(), StoreError> {
        let slot = self.slot(page)?;

        if slot.failed.load(Ordering::Acquire) {
            return Err(StoreError::AlreadyFailed(page));
        }

        slot.record
            .set(record)
            .map_err(|_| StoreError::AlreadyPublished(page))?;

        slot.ready
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| StoreError::AlreadyPublished(page))?;

        Ok(())
    }

    /// Mark `page` as permanently unavailable.
    ///
    /// The page stays not-ready for the lifetime of the document.
    pub fn mark_failed(&self, page: u32) -> Result<(), StoreError> {
        let slot = self.slot(page)?;

        if slot.ready.load(Ordering::Acquire) {
            return Err(StoreError::AlreadyPublished(page));
        }

        slot.failed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| StoreError::AlreadyFailed(page))
    }

    /// Get the record for `page` if it has been published
    pub fn get(&self, page: u32) -> Option<&CompressedPage> {
        let slot = self.slots.get(page as usize)?;
        if slot.ready.load(Ordering::Acquire) {
            slot.record.get()
        } else {
            None
        }
    }

    pub fn is_ready(&self, page: u32) -> bool {
        self.status(page) == PageStatus::Ready
    }

    /// Publication state of `page`; out-of-range pages report `Pending`
    pub fn status(&self, page: u32) -> PageStatus {
        self.slots
            .get(page as usize)
            .map(PageSlot::status)
            .unwrap_or(PageStatus::Pending)
    }

    /// Number of published pages
    pub fn ready_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.ready.load(Ordering::Acquire))
            .count()
    }

    /// Number of pages marked failed
    pub fn failed_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.failed.load(Ordering::Acquire))
            .count()
    }

    /// Iterate over published records with their page numbers
    pub fn ready_pages(&self) -> impl Iterator<Item = (u32, &CompressedPage)> + '_ {
        (0..self.page_count()).filter_map(move |page| self.get(page).map(|record| (page, record)))
    }

    /// Largest trimmed width and height across published pages
    pub fn max_dimensions(&self) -> (u32, u32) {
        self.ready_pages().fold((0, 0), |(w, h), (_, record)| {
            (w.max(record.width()), h.max(record.height()))
        })
    }

    /// Sum of uncompressed bitmap sizes across published pages
    pub fn total_uncompressed(&self) -> usize {
        self.ready_pages().map(|(_, record)| record.uncompressed_len()).sum()
    }

    /// Sum of compressed sizes across published pages
    pub fn total_compressed(&self) -> usize {
        self.ready_pages().map(|(_, record)| record.compressed_len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::Margins;
    use std::sync::Arc;
    use std::thread;

    fn record(width: u32, height: u32) -> CompressedPage {
        CompressedPage::from_parts(
            vec![0u8; 16],
            (width * height * 4) as usize,
            width,
            height,
            Margins::default(),
        )
    }

    #[test]
    fn test_new_store_is_empty() {
        let store = CompressedPageStore::new(5);
        assert_eq!(store.page_count(), 5);
        assert_eq!(store.ready_count(), 0);
        for page in 0..5 {
            assert_eq!(store.status(page), PageStatus::Pending);
            assert!(store.get(page).is_none());
        }
    }

    #[test]
    fn test_publish_and_get() {
        let store = CompressedPageStore::new(3);
        store.publish(2, record(10, 20)).unwrap();

        let page = store.get(2).unwrap();
        assert_eq!(page.width(), 10);
        assert_eq!(page.height(), 20);
        assert!(store.is_ready(2));
        assert!(!store.is_ready(1));
    }

    #[test]
    fn test_publish_twice_is_rejected() {
        let store = CompressedPageStore::new(1);
        store.publish(0, record(1, 1)).unwrap();

        let result = store.publish(0, record(2, 2));
        assert_eq!(result, Err(StoreError::AlreadyPublished(0)));
        // The first record survives
        assert_eq!(store.get(0).unwrap().width(), 1);
    }

    #[test]
    fn test_publish_out_of_range() {
        let store = CompressedPageStore::new(2);
        let result = store.publish(2, record(1, 1));
        assert_eq!(
            result,
            Err(StoreError::PageOutOfRange {
                page: 2,
                page_count: 2
            })
        );
    }

    #[test]
    fn test_failed_page_never_becomes_ready() {
        let store = CompressedPageStore::new(2);
        store.mark_failed(1).unwrap();

        assert_eq!(store.status(1), PageStatus::Failed);
        assert_eq!(store.publish(1, record(1, 1)), Err(StoreError::AlreadyFailed(1)));
        assert!(store.get(1).is_none());
        assert_eq!(store.failed_count(), 1);
    }

    #[test]
    fn test_ready_page_cannot_fail() {
        let store = CompressedPageStore::new(1);
        store.publish(0, record(1, 1)).unwrap();
        assert_eq!(store.mark_failed(0), Err(StoreError::AlreadyPublished(0)));
        assert!(store.is_ready(0));
    }

    #[test]
    fn test_aggregates() {
        let store = CompressedPageStore::new(4);
        store.publish(0, record(100, 50)).unwrap();
        store.publish(3, record(40, 200)).unwrap();

        assert_eq!(store.max_dimensions(), (100, 200));
        assert_eq!(store.total_uncompressed(), 100 * 50 * 4 + 40 * 200 * 4);
        assert_eq!(store.total_compressed(), 32);
        assert_eq!(store.ready_pages().map(|(page, _)| page).collect::<Vec<_>>(), vec![0, 3]);
    }

    #[test]
    fn test_ready_is_monotonic_across_threads() {
        let store = Arc::new(CompressedPageStore::new(64));

        let writers: Vec<_> = (0..4u32)
            .map(|worker| {
                let store = store.clone();
                thread::spawn(move || {
                    for page in (worker..64).step_by(4) {
                        store.publish(page, record(page + 1, 1)).unwrap();
                    }
                })
            })
            .collect();

        let reader = {
            let store = store.clone();
            thread::spawn(move || {
                let mut seen = vec![false; 64];
                for _ in 0..10_000 {
                    for page in 0..64u32 {
                        match store.get(page) {
                            Some(record) => {
                                assert_eq!(record.width(), page + 1);
                                seen[page as usize] = true;
                            }
                            None => assert!(
                                !seen[page as usize],
                                "page {} went back to not-ready",
                                page
                            ),
                        }
                    }
                }
            })
        };

        for writer in writers {
            writer.join().unwrap();
        }
        reader.join().unwrap();

        assert_eq!(store.ready_count(), 64);
    }
}
