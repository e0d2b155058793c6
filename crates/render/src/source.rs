//! Seam between the pipeline and the PDF engine

use crate::error::{OpenError, RenderError};
use std::path::Path;
use std::sync::Arc;

/// Resolution pages are rasterized at unless configured otherwise
pub const DEFAULT_DPI: u32 = 144;

/// Points per inch in PDF user space
pub const POINTS_PER_INCH: f32 = 72.0;

/// Convert a length in points to pixels at `dpi`
pub fn points_to_pixels(points: f32, dpi: u32) -> u32 {
    (points * dpi as f32 / POINTS_PER_INCH).round().max(0.0) as u32
}

/// A rasterized page as produced by the engine.
///
/// 4 bytes per pixel. Rows may be padded: each row starts `stride` bytes
/// after the previous one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterPage {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub stride: usize,
}

impl RasterPage {
    pub const BYTES_PER_PIXEL: usize = 4;

    /// Create a page with tightly packed rows
    pub fn packed(pixels: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            pixels,
            width,
            height,
            stride: width as usize * Self::BYTES_PER_PIXEL,
        }
    }

    /// Bytes of pixel data in one row, without padding
    pub fn row_bytes(&self) -> usize {
        self.width as usize * Self::BYTES_PER_PIXEL
    }

    /// Pixel bytes of row `y`, without padding
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride;
        &self.pixels[start..start + self.row_bytes()]
    }

    /// The 4 bytes of the pixel at (x, y)
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let start = y as usize * self.stride + x as usize * Self::BYTES_PER_PIXEL;
        &self.pixels[start..start + Self::BYTES_PER_PIXEL]
    }

    /// Minimum buffer length for the declared geometry
    pub fn required_len(&self) -> usize {
        if self.height == 0 {
            0
        } else {
            (self.height as usize - 1) * self.stride + self.row_bytes()
        }
    }
}

/// An open document that can rasterize its pages.
///
/// Implementations must be callable from several worker threads at once.
pub trait PageSource: Send + Sync {
    /// Number of pages, fixed for the lifetime of the handle
    fn page_count(&self) -> u32;

    /// Rasterize `page` (0-based) at `dpi`
    fn render_page(&self, page: u32, dpi: u32) -> Result<RasterPage, RenderError>;
}

/// Opens documents by path
pub trait PdfEngine: Send + Sync {
    fn open(&self, path: &Path) -> Result<Arc<dyn PageSource>, OpenError>;
}
