//! Render and open errors

use pdf_viewer_cache::CodecError;
use std::fmt;
use std::path::PathBuf;

/// User-facing category of a failed open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenErrorKind {
    Unknown,
    CouldNotOpen,
    Damaged,
}

impl OpenErrorKind {
    /// Message shown to the user for this category
    pub fn message(&self) -> &'static str {
        match self {
            OpenErrorKind::Unknown => "Unknown",
            OpenErrorKind::CouldNotOpen => "Couldn't open file",
            OpenErrorKind::Damaged => "Damaged PDF file",
        }
    }
}

impl fmt::Display for OpenErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Errors that can occur while opening a document
#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("could not read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The PDF engine itself could not be loaded
    #[error("PDF engine unavailable: {0}")]
    Engine(String),

    /// Broken catalog, bad cross-reference table or similar
    #[error("damaged document: {0}")]
    Damaged(String),

    #[error("document is encrypted or access is denied")]
    Permission,

    #[error("document has no pages")]
    Empty,

    #[error("{0}")]
    Other(String),
}

impl OpenError {
    /// Category reported to the user
    pub fn kind(&self) -> OpenErrorKind {
        match self {
            OpenError::NotFound(_) | OpenError::Io { .. } => OpenErrorKind::CouldNotOpen,
            OpenError::Damaged(_) | OpenError::Permission | OpenError::Empty => {
                OpenErrorKind::Damaged
            }
            OpenError::Engine(_) | OpenError::Other(_) => OpenErrorKind::Unknown,
        }
    }
}

/// Errors that can occur while rendering a single page
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },

    #[error("engine failed to render page {page}: {reason}")]
    Engine { page: u32, reason: String },

    #[error("page {page} rendered to an empty bitmap")]
    EmptyBitmap { page: u32 },

    #[error("page {page} bitmap holds {len} bytes, {needed} needed")]
    ShortBitmap { page: u32, len: usize, needed: usize },

    #[error("compressing page {page} failed: {source}")]
    Compress {
        page: u32,
        #[source]
        source: CodecError,
    },
}
