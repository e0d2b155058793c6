//! Visible page hints shared between the viewport and the loader
//!
//! The viewport writes the first and last visible page on every scroll or
//! zoom; the loader and page tasks read them without locking.

use std::sync::atomic::{AtomicU32, Ordering};

/// Lines of pages assumed to fit on screen, by column count
const MAX_LINES_PER_SCREEN: [u32; 5] = [2, 3, 4, 5, 6];

/// First and last visible page, updated lock-free
///
/// # Example
///
/// ```
/// use pdf_viewer_scheduler::VisibleRange;
///
/// let range = VisibleRange::new();
/// range.set(10, 12);
/// assert!(range.contains(11));
/// assert!(!range.contains(13));
/// ```
#[derive(Debug, Default)]
pub struct VisibleRange {
    first: AtomicU32,
    last: AtomicU32,
}

impl VisibleRange {
    /// A range covering only page 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish new hints
    pub fn set(&self, first: u32, last: u32) {
        self.first.store(first, Ordering::Release);
        self.last.store(last.max(first), Ordering::Release);
    }

    pub fn first(&self) -> u32 {
        self.first.load(Ordering::Acquire)
    }

    pub fn last(&self) -> u32 {
        self.last.load(Ordering::Acquire)
    }

    /// Both hints; each is read atomically, the pair is not
    pub fn get(&self) -> (u32, u32) {
        (self.first(), self.last())
    }

    /// Whether `page` falls within the visible range
    pub fn contains(&self, page: u32) -> bool {
        let (first, last) = self.get();
        page >= first && page <= last
    }

    /// Derive the hints from a scroll position.
    ///
    /// `offset_pages` is the fractional page index at the top of the view.
    /// The last visible page is a conservative estimate from the number of
    /// columns.
    pub fn follow_scroll(&self, offset_pages: f32, columns: u32, page_count: u32) {
        if page_count == 0 {
            self.set(0, 0);
            return;
        }

        let last_page = page_count - 1;
        let first = if offset_pages.is_finite() && offset_pages > 0.0 {
            (offset_pages as u32).min(last_page)
        } else {
            0
        };

        let columns = columns.clamp(1, MAX_LINES_PER_SCREEN.len() as u32);
        let lines = MAX_LINES_PER_SCREEN[columns as usize - 1];
        let last = first.saturating_add(lines * columns).min(last_page);

        self.set(first, last);
    }
}
