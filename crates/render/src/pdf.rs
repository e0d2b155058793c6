//! PDFium backend
//!
//! Provides [`PdfiumEngine`], the production [`PdfEngine`], and the
//! document handle it hands out.

use crate::error::{OpenError, RenderError};
use crate::source::{points_to_pixels, PageSource, PdfEngine, RasterPage};
use pdfium_render::prelude::*;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

/// Opens documents with PDFium
pub struct PdfiumEngine {
    pdfium: &'static Pdfium,
}

impl PdfiumEngine {
    /// Bind to the PDFium library.
    ///
    /// Search order:
    /// 1. Executable's directory (for app bundles: .app/Contents/MacOS/)
    /// 2. Current working directory
    /// 3. System library paths
    pub fn new() -> Result<Self, OpenError> {
        let pdfium = Self::init_pdfium()?;
        // Documents borrow the library for as long as they live
        Ok(Self {
            pdfium: Box::leak(Box::new(pdfium)),
        })
    }

    fn init_pdfium() -> Result<Pdfium, OpenError> {
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()));

        if let Some(ref dir) = exe_dir {
            if let Ok(bindings) =
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
            {
                return Ok(Pdfium::new(bindings));
            }
        }

        Ok(Pdfium::new(
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library())
                .map_err(|e| OpenError::Engine(e.to_string()))?,
        ))
    }
}

/// Map a PDFium load failure to an open error
fn map_load_error(path: &Path, error: PdfiumError) -> OpenError {
    match error {
        PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::FileError) => {
            OpenError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "PDFium could not read the file",
                ),
            }
        }
        PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::FormatError) => {
            OpenError::Damaged(error.to_string())
        }
        PdfiumError::PdfiumLibraryInternalError(
            PdfiumInternalError::PasswordError | PdfiumInternalError::SecurityError,
        ) => OpenError::Permission,
        other => OpenError::Other(other.to_string()),
    }
}

impl PdfEngine for PdfiumEngine {
    fn open(&self, path: &Path) -> Result<Arc<dyn PageSource>, OpenError> {
        if !path.exists() {
            return Err(OpenError::NotFound(path.to_path_buf()));
        }

        let document = self
            .pdfium
            .load_pdf_from_file(path, None)
            .map_err(|e| map_load_error(path, e))?;

        let page_count = u32::from(document.pages().len());
        log::info!("Opened {} ({} pages)", path.display(), page_count);

        Ok(Arc::new(PdfiumDocument {
            document: Mutex::new(document),
            page_count,
        }))
    }
}

/// An open PDFium document.
///
/// PDFium is not reentrant; renders are serialized on the document.
pub struct PdfiumDocument {
    document: Mutex<PdfDocument<'static>>,
    page_count: u32,
}

impl PageSource for PdfiumDocument {
    fn page_count(&self) -> u32 {
        self.page_count
    }

    fn render_page(&self, page: u32, dpi: u32) -> Result<RasterPage, RenderError> {
        let index = u16::try_from(page)
            .ok()
            .filter(|_| page < self.page_count)
            .ok_or(RenderError::PageOutOfRange {
                page,
                page_count: self.page_count,
            })?;

        let document = self.document.lock().unwrap_or_else(PoisonError::into_inner);

        let engine_error = |e: PdfiumError| RenderError::Engine {
            page,
            reason: e.to_string(),
        };

        let pdf_page = document.pages().get(index).map_err(engine_error)?;
        let width = points_to_pixels(pdf_page.width().value, dpi);
        let height = points_to_pixels(pdf_page.height().value, dpi);
        if width == 0 || height == 0 {
            return Err(RenderError::EmptyBitmap { page });
        }

        let config = PdfRenderConfig::new()
            .set_target_width(width as i32)
            .set_target_height(height as i32);

        let bitmap = pdf_page.render_with_config(&config).map_err(engine_error)?;
        let pixels = bitmap.as_rgba_bytes().to_vec();

        // PDFium may round the target size; trust the bitmap
        let width = bitmap.width() as u32;
        let height = bitmap.height() as u32;

        Ok(RasterPage::packed(pixels, width, height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_errors_are_damaged() {
        let error = map_load_error(
            Path::new("locked.pdf"),
            PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError),
        );
        assert!(matches!(error, OpenError::Permission));
        assert_eq!(error.kind().message(), "Damaged PDF file");
    }

    #[test]
    fn test_file_errors_cannot_open() {
        let error = map_load_error(
            Path::new("gone.pdf"),
            PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::FileError),
        );
        assert_eq!(error.kind().message(), "Couldn't open file");
    }

    #[test]
    fn test_format_errors_are_damaged() {
        let error = map_load_error(
            Path::new("bad.pdf"),
            PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::FormatError),
        );
        assert!(matches!(error, OpenError::Damaged(_)));
    }
}
