//! Page geometry for laying out a partially loaded document
//!
//! Pages that are not rendered yet borrow the geometry of page 0 so the
//! layout stays stable while loading.

use pdf_viewer_cache::{CompressedPage, CompressedPageStore, Margins};

/// Margin in pixels above which a page counts as having margins; also the
/// padding added below very short trimmed pages
pub const MARGIN: u32 = 36;

/// How pages are sized in the view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrimMode {
    /// Content only, white margins removed
    #[default]
    Trimmed,
    /// Full page including margins
    FullPage,
}

/// Size of one page for layout purposes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageGeometry {
    /// Page whose record supplied the geometry
    pub source_page: u32,
    pub trimmed_width: u32,
    pub trimmed_height: u32,
    pub margins: Margins,
}

impl PageGeometry {
    pub fn from_record(source_page: u32, record: &CompressedPage) -> Self {
        Self {
            source_page,
            trimmed_width: record.width(),
            trimmed_height: record.height(),
            margins: record.margins(),
        }
    }

    /// Geometry of `page`, or of page 0 while `page` is not ready.
    ///
    /// Returns `None` when neither is available.
    pub fn for_page(store: &CompressedPageStore, page: u32) -> Option<Self> {
        store
            .get(page)
            .map(|record| Self::from_record(page, record))
            .or_else(|| store.get(0).map(|record| Self::from_record(0, record)))
    }

    /// Whether the geometry was borrowed from another page
    pub fn is_fallback_for(&self, page: u32) -> bool {
        self.source_page != page
    }

    pub fn full_width(&self) -> u32 {
        self.trimmed_width + self.margins.horizontal()
    }

    pub fn full_height(&self) -> u32 {
        self.trimmed_height + self.margins.vertical()
    }

    /// Display width in `mode`
    pub fn width(&self, mode: TrimMode) -> u32 {
        match mode {
            TrimMode::Trimmed => self.trimmed_width,
            TrimMode::FullPage => self.full_width(),
        }
    }

    /// Display height in `mode`.
    ///
    /// Very short trimmed pages (a single line of text) get `MARGIN` of
    /// padding so they don't collapse in the view.
    pub fn height(&self, mode: TrimMode) -> u32 {
        match mode {
            TrimMode::Trimmed if self.trimmed_height < 2 * MARGIN => self.trimmed_height + MARGIN,
            TrimMode::Trimmed => self.trimmed_height,
            TrimMode::FullPage => self.full_height(),
        }
    }

    /// Whether any margin is wider than `MARGIN`
    pub fn has_margins(&self) -> bool {
        u32::from(self.margins.max()) > MARGIN
    }
}
