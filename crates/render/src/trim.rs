//! Whitespace margin detection
//!
//! Finds the tight bounding box of non-white content with four directional
//! scans that stop at the first hit. Real pages have thin borders, so the
//! scans usually touch only a small strip of the bitmap.

use crate::source::RasterPage;

/// Inclusive pixel bounds of the page content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentBounds {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl ContentBounds {
    pub fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }
}

/// A pixel is white when its first three channels are all 255
#[inline]
fn is_non_white(pixel: &[u8]) -> bool {
    pixel[0] != 255 || pixel[1] != 255 || pixel[2] != 255
}

/// Compute the content bounds of a non-empty raster.
///
/// A page without any non-white pixel keeps the full-page bounds.
pub fn content_bounds(raster: &RasterPage) -> ContentBounds {
    let (w, h) = (raster.width, raster.height);
    debug_assert!(w > 0 && h > 0);

    let mut bounds = ContentBounds {
        min_x: 0,
        min_y: 0,
        max_x: w - 1,
        max_y: h - 1,
    };

    // Leftmost column with content, scanning each column top to bottom
    if let Some(x) = (0..w).find(|&x| (0..h).any(|y| is_non_white(raster.pixel(x, y)))) {
        bounds.min_x = x;
    }

    // Topmost row with content right of min_x
    if let Some(y) = (0..h).find(|&y| (bounds.min_x..w).any(|x| is_non_white(raster.pixel(x, y)))) {
        bounds.min_y = y;
    }

    let (start_x, start_y) = (bounds.min_x, bounds.min_y);

    // Rightmost column, bounded below by the top-left corner found so far
    if let Some(x) = (start_x..w)
        .rev()
        .find(|&x| (start_y..h).rev().any(|y| is_non_white(raster.pixel(x, y))))
    {
        bounds.max_x = x;
    }

    // Bottom row within [start_x, max_x]
    if let Some(y) = (start_y..h)
        .rev()
        .find(|&y| (start_x..=bounds.max_x).rev().any(|x| is_non_white(raster.pixel(x, y))))
    {
        bounds.max_y = y;
    }

    bounds
}

/// Copy the pixels inside `bounds` into a tightly packed buffer
pub fn crop(raster: &RasterPage, bounds: &ContentBounds) -> Vec<u8> {
    let row_len = bounds.width() as usize * RasterPage::BYTES_PER_PIXEL;
    let offset = bounds.min_x as usize * RasterPage::BYTES_PER_PIXEL;

    let mut out = Vec::with_capacity(row_len * bounds.height() as usize);
    for y in bounds.min_y..=bounds.max_y {
        let row = raster.row(y);
        out.extend_from_slice(&row[offset..offset + row_len]);
    }
    out
}
