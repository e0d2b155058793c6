//! PDF Viewer Render Library
//!
//! Rasterizes pages through a PDF engine, trims their white margins and
//! compresses them into records for the page store.

pub mod error;
pub mod page;
pub mod pdf;
pub mod source;
#[cfg(any(test, feature = "test-utils"))]
pub mod synthetic;
pub mod trim;

pub use error::{OpenError, OpenErrorKind, RenderError};
pub use page::{compress_raster, render_page};
pub use pdf::{PdfiumDocument, PdfiumEngine};
pub use source::{points_to_pixels, PageSource, PdfEngine, RasterPage, DEFAULT_DPI, POINTS_PER_INCH};
pub use trim::{content_bounds, ContentBounds};
