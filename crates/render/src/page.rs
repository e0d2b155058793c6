//! Page rendering into compressed records
//!
//! One call rasterizes a page, trims its white margins and compresses the
//! trimmed bitmap. The resulting [`CompressedPage`] is ready to publish into
//! a [`CompressedPageStore`](pdf_viewer_cache::CompressedPageStore).

use crate::error::RenderError;
use crate::source::{PageSource, RasterPage};
use crate::trim::{content_bounds, crop};
use pdf_viewer_cache::{codec, CompressedPage, Margins};
use std::time::Instant;

/// Render `page` of `source` at `dpi` and produce its compressed record.
///
/// # Arguments
/// * `source` - Open document
/// * `page` - Zero-based page number
/// * `dpi` - Rasterization resolution
pub fn render_page(
    source: &dyn PageSource,
    page: u32,
    dpi: u32,
) -> Result<CompressedPage, RenderError> {
    let page_count = source.page_count();
    if page >= page_count {
        return Err(RenderError::PageOutOfRange { page, page_count });
    }

    let start = Instant::now();
    let raster = source.render_page(page, dpi)?;
    let rendered = start.elapsed();

    let record = compress_raster(page, &raster)?;

    log::debug!(
        "Page {}: rendered {}x{} in {:?}, stored {}x{} ({} -> {} bytes) in {:?}",
        page,
        raster.width,
        raster.height,
        rendered,
        record.width(),
        record.height(),
        record.uncompressed_len(),
        record.compressed_len(),
        start.elapsed() - rendered
    );

    Ok(record)
}

/// Trim and compress an already rasterized page
pub fn compress_raster(page: u32, raster: &RasterPage) -> Result<CompressedPage, RenderError> {
    if raster.width == 0 || raster.height == 0 {
        return Err(RenderError::EmptyBitmap { page });
    }

    let needed = raster.required_len();
    if raster.stride < raster.row_bytes() || raster.pixels.len() < needed {
        return Err(RenderError::ShortBitmap {
            page,
            len: raster.pixels.len(),
            needed,
        });
    }

    let bounds = content_bounds(raster);
    let trimmed = crop(raster, &bounds);

    let data = codec::compress(&trimmed).map_err(|source| RenderError::Compress { page, source })?;

    // Right and bottom margins count the pixels past the last content column/row
    let margins = Margins::from_pixels(
        bounds.min_x,
        raster.width - 1 - bounds.max_x,
        bounds.min_y,
        raster.height - 1 - bounds.max_y,
    );

    Ok(CompressedPage::from_parts(
        data,
        trimmed.len(),
        bounds.width(),
        bounds.height(),
        margins,
    ))
}
