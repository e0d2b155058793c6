//! Viewport decode cache with random replacement
//!
//! Holds a small fixed number of decompressed page bitmaps for the viewer
//! that paints a document. Lookups are keyed by page number; on a miss the
//! page is decompressed from the [`CompressedPageStore`] into a slot picked
//! uniformly at random.
//!
//! All slot buffers share one capacity. When a page larger than that
//! capacity shows up, the capacity grows to fit it and every slot mapping is
//! dropped, since the old buffers are undersized.

use crate::codec::{self, CodecError};
use crate::store::CompressedPageStore;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::TryReserveError;
use std::sync::Arc;

/// Default number of decode slots
pub const DEFAULT_DECODE_SLOTS: usize = 30;

/// Default per-slot buffer capacity (7 MiB)
pub const DEFAULT_DECODE_CAPACITY: usize = 7 * 1024 * 1024;

/// Errors returned by [`ViewportDecodeCache::get_decoded_page`]
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },

    /// The compressed bytes did not decode to the recorded bitmap size
    #[error("page {page} failed integrity check: {source}")]
    Corrupt {
        page: u32,
        #[source]
        source: CodecError,
    },

    /// Growing the decode buffers failed
    #[error("could not grow decode buffers to {capacity} bytes: {source}")]
    Allocation {
        capacity: usize,
        #[source]
        source: TryReserveError,
    },
}

/// Statistics about decode cache usage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeStats {
    /// Lookups served from an existing slot
    pub hits: u64,

    /// Lookups that decompressed a page
    pub misses: u64,

    /// Lookups for pages that were not ready yet
    pub placeholders: u64,

    /// Misses that replaced another page's slot
    pub evictions: u64,

    /// Number of capacity growths (each one resets every slot)
    pub resets: u64,
}

impl DecodeStats {
    /// Fraction of decoded lookups served without decompression
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// A decompressed page ready to paint.
///
/// Borrowed from the cache slot; `pixels` holds `width * height` pixels,
/// 4 bytes each, rows tightly packed.
#[derive(Debug, Clone, Copy)]
pub struct DecodedPage<'a> {
    pub page: u32,
    pub width: u32,
    pub height: u32,
    pub pixels: &'a [u8],
}

impl DecodedPage<'_> {
    /// Bytes of one pixel row
    pub fn row_bytes(&self) -> usize {
        self.width as usize * 4
    }

    /// Pixel at (x, y) as a 4-byte slice
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let offset = y as usize * self.row_bytes() + x as usize * 4;
        &self.pixels[offset..offset + 4]
    }
}

#[derive(Debug, Default)]
struct DecodeSlot {
    page: Option<u32>,
    width: u32,
    height: u32,
    len: usize,
    buffer: Vec<u8>,
}

/// Fixed-capacity pool of decompressed page bitmaps for one viewer.
///
/// # Example
///
/// ```
/// use pdf_viewer_cache::{
///     codec, CompressedPage, CompressedPageStore, Margins, ViewportDecodeCache,
/// };
/// use std::sync::Arc;
///
/// let bitmap = vec![0u8; 2 * 2 * 4];
/// let data = codec::compress(&bitmap).unwrap();
/// let page = CompressedPage::from_parts(data, bitmap.len(), 2, 2, Margins::default());
///
/// let store = Arc::new(CompressedPageStore::new(1));
/// store.publish(0, page).unwrap();
///
/// let mut cache = ViewportDecodeCache::new(store, 4, 1024);
/// let decoded = cache.get_decoded_page(0).unwrap().unwrap();
/// assert_eq!((decoded.width, decoded.height), (2, 2));
/// ```
pub struct ViewportDecodeCache {
    store: Arc<CompressedPageStore>,
    slots: Vec<DecodeSlot>,
    capacity: usize,
    rng: StdRng,
    stats: DecodeStats,
}

impl ViewportDecodeCache {
    /// Create a cache with `slots` buffers of `capacity` bytes each.
    ///
    /// Buffers are allocated the first time a slot is used.
    pub fn new(store: Arc<CompressedPageStore>, slots: usize, capacity: usize) -> Self {
        Self::with_rng(store, slots, capacity, StdRng::from_entropy())
    }

    /// Create a cache whose slot choice is reproducible
    pub fn with_seed(
        store: Arc<CompressedPageStore>,
        slots: usize,
        capacity: usize,
        seed: u64,
    ) -> Self {
        Self::with_rng(store, slots, capacity, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        store: Arc<CompressedPageStore>,
        slots: usize,
        capacity: usize,
        rng: StdRng,
    ) -> Self {
        let slots = (0..slots.max(1)).map(|_| DecodeSlot::default()).collect();
        Self {
            store,
            slots,
            capacity,
            rng,
            stats: DecodeStats::default(),
        }
    }

    /// The store this cache decodes from
    pub fn store(&self) -> &Arc<CompressedPageStore> {
        &self.store
    }

    /// Number of slots
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Current per-slot buffer capacity in bytes
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> DecodeStats {
        self.stats
    }

    /// Page number held by each slot, `None` for empty slots
    pub fn cached_pages(&self) -> Vec<Option<u32>> {
        self.slots.iter().map(|slot| slot.page).collect()
    }

    /// Whether `page` is currently decoded in some slot
    pub fn contains(&self, page: u32) -> bool {
        self.slots.iter().any(|slot| slot.page == Some(page))
    }

    /// Forget every slot mapping; buffers are kept
    pub fn invalidate_all(&mut self) {
        for slot in &mut self.slots {
            slot.page = None;
        }
    }

    /// Get a decoded bitmap for `page`.
    ///
    /// Returns `Ok(None)` when the page has not been rendered yet; the caller
    /// paints a placeholder and asks again later. Never blocks on rendering.
    pub fn get_decoded_page(&mut self, page: u32) -> Result<Option<DecodedPage<'_>>, DecodeError> {
        if let Some(index) = self.slots.iter().position(|slot| slot.page == Some(page)) {
            self.stats.hits += 1;
            return Ok(Some(self.view(index)));
        }

        let page_count = self.store.page_count();
        if page >= page_count {
            return Err(DecodeError::PageOutOfRange { page, page_count });
        }

        // Keep the store alive independently of `self` while borrowing the record
        let store = Arc::clone(&self.store);
        let Some(record) = store.get(page) else {
            self.stats.placeholders += 1;
            return Ok(None);
        };

        let needed = record.uncompressed_len();
        if needed > self.capacity {
            self.grow(needed);
        }

        let index = self.rng.gen_range(0..self.slots.len());
        let capacity = self.capacity;
        let slot = &mut self.slots[index];

        if slot.page.is_some() {
            self.stats.evictions += 1;
        }
        // The slot is unusable until the decode below succeeds
        slot.page = None;

        if slot.buffer.len() < capacity {
            let additional = capacity - slot.buffer.len();
            slot.buffer
                .try_reserve_exact(additional)
                .map_err(|source| DecodeError::Allocation { capacity, source })?;
            slot.buffer.resize(capacity, 0);
        }

        if let Err(source) = codec::decompress_into(record.data(), needed, &mut slot.buffer) {
            log::error!("Decoding page {} failed: {}", page, source);
            return Err(DecodeError::Corrupt { page, source });
        }

        slot.page = Some(page);
        slot.width = record.width();
        slot.height = record.height();
        slot.len = needed;
        self.stats.misses += 1;

        Ok(Some(self.view(index)))
    }

    /// Grow every slot to `needed` bytes and drop all mappings
    fn grow(&mut self, needed: usize) {
        log::warn!(
            "Decode buffer capacity grows from {} to {} bytes, resetting {} slots",
            self.capacity,
            needed,
            self.slots.len()
        );

        self.capacity = needed;
        self.stats.resets += 1;

        for slot in &mut self.slots {
            slot.page = None;
            // Existing allocations are released; each slot reallocates on use
            slot.buffer = Vec::new();
        }
    }

    fn view(&self, index: usize) -> DecodedPage<'_> {
        let slot = &self.slots[index];
        DecodedPage {
            page: slot.page.unwrap_or_default(),
            width: slot.width,
            height: slot.height,
            pixels: &slot.buffer[..slot.len],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{CompressedPage, Margins};
    use std::collections::HashSet;

    /// A page whose pixels all carry `shade`
    fn page_record(width: u32, height: u32, shade: u8) -> CompressedPage {
        let bitmap = vec![shade; (width * height * 4) as usize];
        CompressedPage::from_parts(
            codec::compress(&bitmap).unwrap(),
            bitmap.len(),
            width,
            height,
            Margins::default(),
        )
    }

    fn store_with_pages(count: u32, width: u32, height: u32) -> Arc<CompressedPageStore> {
        let store = Arc::new(CompressedPageStore::new(count));
        for page in 0..count {
            store.publish(page, page_record(width, height, page as u8)).unwrap();
        }
        store
    }

    fn assert_unique_mapping(cache: &ViewportDecodeCache) {
        let mut seen = HashSet::new();
        for page in cache.cached_pages().into_iter().flatten() {
            assert!(seen.insert(page), "page {} cached in two slots", page);
        }
    }

    #[test]
    fn test_miss_then_hit() {
        let store = store_with_pages(3, 4, 4);
        let mut cache = ViewportDecodeCache::with_seed(store, 5, 1024, 7);

        let decoded = cache.get_decoded_page(1).unwrap().unwrap();
        assert_eq!(decoded.page, 1);
        assert_eq!((decoded.width, decoded.height), (4, 4));
        assert!(decoded.pixels.iter().all(|&b| b == 1));
        assert_eq!(decoded.pixels.len(), 64);

        let decoded = cache.get_decoded_page(1).unwrap().unwrap();
        assert_eq!(decoded.page, 1);

        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.hit_rate(), 0.5);
    }

    #[test]
    fn test_not_ready_returns_placeholder() {
        let store = Arc::new(CompressedPageStore::new(2));
        store.publish(0, page_record(2, 2, 9)).unwrap();
        let mut cache = ViewportDecodeCache::with_seed(store, 3, 1024, 1);

        assert!(cache.get_decoded_page(1).unwrap().is_none());
        assert_eq!(cache.stats().placeholders, 1);
        assert!(!cache.contains(1));
    }

    #[test]
    fn test_out_of_range_page() {
        let store = store_with_pages(2, 2, 2);
        let mut cache = ViewportDecodeCache::with_seed(store, 3, 1024, 1);

        let result = cache.get_decoded_page(5);
        assert!(matches!(result, Err(DecodeError::PageOutOfRange { page: 5, page_count: 2 })));
    }

    #[test]
    fn test_at_most_one_slot_per_page() {
        let store = store_with_pages(40, 3, 3);
        let mut cache = ViewportDecodeCache::with_seed(store, 8, 1024, 42);

        // Scroll back and forth across more pages than there are slots
        let sequence = (0..40).chain((0..40).rev()).chain([5, 5, 6, 5, 7, 39, 0, 5]);
        for page in sequence {
            let decoded = cache.get_decoded_page(page).unwrap().unwrap();
            assert_eq!(decoded.page, page);
            assert!(decoded.pixels.iter().all(|&b| b == page as u8));
            assert_unique_mapping(&cache);
        }
        assert!(cache.stats().evictions > 0);
    }

    #[test]
    fn test_growth_resets_every_slot() {
        let store = Arc::new(CompressedPageStore::new(4));
        store.publish(0, page_record(4, 4, 1)).unwrap();
        store.publish(1, page_record(4, 4, 2)).unwrap();
        store.publish(2, page_record(16, 16, 3)).unwrap();
        let mut cache = ViewportDecodeCache::with_seed(store, 6, 64, 3);

        cache.get_decoded_page(0).unwrap();
        cache.get_decoded_page(1).unwrap();
        assert!(cache.contains(0) || cache.contains(1));

        // 16 * 16 * 4 = 1024 bytes, larger than the 64 byte capacity
        let decoded = cache.get_decoded_page(2).unwrap().unwrap();
        assert_eq!((decoded.width, decoded.height), (16, 16));
        assert_eq!(cache.capacity(), 1024);
        assert_eq!(cache.stats().resets, 1);

        // Only the page that triggered the growth is cached
        let cached: Vec<u32> = cache.cached_pages().into_iter().flatten().collect();
        assert_eq!(cached, vec![2]);

        // Former pages are misses again
        let misses_before = cache.stats().misses;
        cache.get_decoded_page(0).unwrap().unwrap();
        assert_eq!(cache.stats().misses, misses_before + 1);
    }

    #[test]
    fn test_capacity_never_shrinks() {
        let store = Arc::new(CompressedPageStore::new(2));
        store.publish(0, page_record(16, 16, 1)).unwrap();
        store.publish(1, page_record(2, 2, 2)).unwrap();
        let mut cache = ViewportDecodeCache::with_seed(store, 2, 16, 3);

        cache.get_decoded_page(0).unwrap();
        cache.get_decoded_page(1).unwrap();
        assert_eq!(cache.capacity(), 1024);
        assert_eq!(cache.stats().resets, 1);
    }

    #[test]
    fn test_corrupt_record_is_reported() {
        let store = Arc::new(CompressedPageStore::new(1));
        let bitmap = vec![0u8; 64];
        // Claims one pixel more than the stream holds
        let data = codec::compress(&bitmap).unwrap();
        let bad = CompressedPage::from_parts(data, 68, 17, 1, Margins::default());
        store.publish(0, bad).unwrap();
        let mut cache = ViewportDecodeCache::with_seed(store, 2, 1024, 3);

        let result = cache.get_decoded_page(0);
        assert!(matches!(result, Err(DecodeError::Corrupt { page: 0, .. })));
        assert!(!cache.contains(0));
    }

    #[test]
    fn test_invalidate_all() {
        let store = store_with_pages(3, 2, 2);
        let mut cache = ViewportDecodeCache::with_seed(store, 4, 1024, 9);

        cache.get_decoded_page(0).unwrap();
        cache.get_decoded_page(2).unwrap();
        cache.invalidate_all();

        assert!(cache.cached_pages().iter().all(Option::is_none));
    }

    #[test]
    fn test_zero_slots_is_clamped() {
        let store = store_with_pages(1, 2, 2);
        let mut cache = ViewportDecodeCache::new(store, 0, 1024);
        assert_eq!(cache.slot_count(), 1);
        assert!(cache.get_decoded_page(0).unwrap().is_some());
    }
}
