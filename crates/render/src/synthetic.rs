//! In-memory documents for exercising the pipeline without PDFium
//!
//! Pages are white canvases with solid rectangles given in points. The
//! document can delay or fail individual renders and records what was
//! rendered, in which order, and how many renders overlapped.

use crate::error::{OpenError, RenderError};
use crate::source::{points_to_pixels, PageSource, PdfEngine, RasterPage};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

/// A solid rectangle, position and size in points from the top-left corner
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilledRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub color: [u8; 3],
}

impl FilledRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32, color: [u8; 3]) -> Self {
        Self {
            x,
            y,
            width,
            height,
            color,
        }
    }

    pub fn black(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self::new(x, y, width, height, [0, 0, 0])
    }
}

#[derive(Debug, Clone)]
struct SyntheticPage {
    width_pt: f32,
    height_pt: f32,
    rects: Vec<FilledRect>,
}

/// Document whose pages are rasterized in memory.
///
/// # Example
///
/// ```
/// use pdf_viewer_render::synthetic::{FilledRect, SyntheticDocument};
/// use pdf_viewer_render::PageSource;
///
/// let doc = SyntheticDocument::new(2, 612.0, 792.0)
///     .with_rect(1, FilledRect::black(50.0, 50.0, 100.0, 100.0));
/// let raster = doc.render_page(1, 144).unwrap();
/// assert_eq!((raster.width, raster.height), (1224, 1584));
/// ```
#[derive(Debug)]
pub struct SyntheticDocument {
    pages: Vec<SyntheticPage>,
    delay: Duration,
    failing: HashSet<u32>,
    row_padding: usize,
    render_log: Mutex<Vec<u32>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl SyntheticDocument {
    /// A document of `page_count` blank pages of the given size in points
    pub fn new(page_count: u32, width_pt: f32, height_pt: f32) -> Self {
        let page = SyntheticPage {
            width_pt,
            height_pt,
            rects: Vec::new(),
        };
        Self {
            pages: vec![page; page_count as usize],
            delay: Duration::ZERO,
            failing: HashSet::new(),
            row_padding: 0,
            render_log: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Add a rectangle to `page`
    pub fn with_rect(mut self, page: u32, rect: FilledRect) -> Self {
        if let Some(p) = self.pages.get_mut(page as usize) {
            p.rects.push(rect);
        }
        self
    }

    /// Change the size of `page` in points
    pub fn with_page_size(mut self, page: u32, width_pt: f32, height_pt: f32) -> Self {
        if let Some(p) = self.pages.get_mut(page as usize) {
            p.width_pt = width_pt;
            p.height_pt = height_pt;
        }
        self
    }

    /// Sleep this long inside every render
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Make renders of `page` fail
    pub fn with_failing_page(mut self, page: u32) -> Self {
        self.failing.insert(page);
        self
    }

    /// Pad every row with `bytes` extra bytes
    pub fn with_row_padding(mut self, bytes: usize) -> Self {
        self.row_padding = bytes;
        self
    }

    /// Pages in the order their renders started
    pub fn render_log(&self) -> Vec<u32> {
        self.render_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of renders started so far
    pub fn render_count(&self) -> usize {
        self.render_log.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Renders currently executing
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of renders that ever executed at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn rasterize(page: &SyntheticPage, dpi: u32, row_padding: usize) -> RasterPage {
        let width = points_to_pixels(page.width_pt, dpi);
        let height = points_to_pixels(page.height_pt, dpi);
        let stride = width as usize * RasterPage::BYTES_PER_PIXEL + row_padding;
        let mut pixels = vec![255u8; stride * height as usize];

        for rect in &page.rects {
            let x0 = points_to_pixels(rect.x, dpi).min(width);
            let y0 = points_to_pixels(rect.y, dpi).min(height);
            let x1 = points_to_pixels(rect.x + rect.width, dpi).min(width);
            let y1 = points_to_pixels(rect.y + rect.height, dpi).min(height);

            for y in y0..y1 {
                for x in x0..x1 {
                    let start = y as usize * stride + x as usize * RasterPage::BYTES_PER_PIXEL;
                    pixels[start..start + 3].copy_from_slice(&rect.color);
                }
            }
        }

        RasterPage {
            pixels,
            width,
            height,
            stride,
        }
    }
}

/// Decrements the in-flight counter even if the render bails out early
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl PageSource for SyntheticDocument {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn render_page(&self, page: u32, dpi: u32) -> Result<RasterPage, RenderError> {
        let layout = self.pages.get(page as usize).ok_or(RenderError::PageOutOfRange {
            page,
            page_count: self.page_count(),
        })?;

        self.render_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(page);

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.in_flight);
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }

        if self.failing.contains(&page) {
            return Err(RenderError::Engine {
                page,
                reason: "injected failure".to_string(),
            });
        }

        Ok(Self::rasterize(layout, dpi, self.row_padding))
    }
}

enum Entry {
    Document(Arc<SyntheticDocument>),
    Error(fn(&Path) -> OpenError),
}

/// Engine that serves registered synthetic documents by path
#[derive(Default)]
pub struct SyntheticEngine {
    entries: HashMap<PathBuf, Entry>,
}

impl SyntheticEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `document` for `path`
    pub fn with_document(
        mut self,
        path: impl Into<PathBuf>,
        document: Arc<SyntheticDocument>,
    ) -> Self {
        self.entries.insert(path.into(), Entry::Document(document));
        self
    }

    /// Fail opens of `path` with the error built by `error`
    pub fn with_open_error(
        mut self,
        path: impl Into<PathBuf>,
        error: fn(&Path) -> OpenError,
    ) -> Self {
        self.entries.insert(path.into(), Entry::Error(error));
        self
    }
}

impl PdfEngine for SyntheticEngine {
    fn open(&self, path: &Path) -> Result<Arc<dyn PageSource>, OpenError> {
        match self.entries.get(path) {
            Some(Entry::Document(doc)) => Ok(Arc::clone(doc) as Arc<dyn PageSource>),
            Some(Entry::Error(error)) => Err(error(path)),
            None => Err(OpenError::NotFound(path.to_path_buf())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rectangle_scaled_by_dpi() {
        let doc = SyntheticDocument::new(1, 612.0, 792.0)
            .with_rect(0, FilledRect::black(50.0, 50.0, 100.0, 100.0));
        let raster = doc.render_page(0, 144).unwrap();

        assert_eq!(raster.pixel(99, 99), &[255, 255, 255, 255]);
        assert_eq!(raster.pixel(100, 100), &[0, 0, 0, 255]);
        assert_eq!(raster.pixel(299, 299), &[0, 0, 0, 255]);
        assert_eq!(raster.pixel(300, 300), &[255, 255, 255, 255]);
    }

    #[test]
    fn test_render_log_and_counters() {
        let doc = SyntheticDocument::new(3, 10.0, 10.0);
        doc.render_page(2, 72).unwrap();
        doc.render_page(0, 72).unwrap();

        assert_eq!(doc.render_log(), vec![2, 0]);
        assert_eq!(doc.render_count(), 2);
        assert_eq!(doc.in_flight(), 0);
        assert_eq!(doc.max_in_flight(), 1);
    }

    #[test]
    fn test_engine_lookup() {
        let doc = Arc::new(SyntheticDocument::new(4, 10.0, 10.0));
        let engine = SyntheticEngine::new()
            .with_document("a.pdf", doc)
            .with_open_error("broken.pdf", |_| OpenError::Damaged("bad xref".into()));

        assert_eq!(engine.open(Path::new("a.pdf")).unwrap().page_count(), 4);
        assert!(matches!(engine.open(Path::new("broken.pdf")), Err(OpenError::Damaged(_))));
        assert!(matches!(engine.open(Path::new("missing.pdf")), Err(OpenError::NotFound(_))));
    }
}
