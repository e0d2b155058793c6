//! Load statistics

use pdf_viewer_cache::CompressedPageStore;
use std::time::Duration;

/// Summary of a completed document load
#[derive(Debug, Clone, PartialEq)]
pub struct LoadStats {
    pub page_count: u32,
    pub ready_pages: usize,
    pub failed_pages: usize,
    /// Sum of trimmed bitmap sizes
    pub uncompressed_bytes: usize,
    /// Memory held by compressed pages
    pub compressed_bytes: usize,
    pub elapsed: Duration,
}

impl LoadStats {
    /// Collect statistics from a fully loaded store
    pub fn collect(store: &CompressedPageStore, elapsed: Duration) -> Self {
        Self {
            page_count: store.page_count(),
            ready_pages: store.ready_count(),
            failed_pages: store.failed_count(),
            uncompressed_bytes: store.total_uncompressed(),
            compressed_bytes: store.total_compressed(),
            elapsed,
        }
    }

    /// Compressed size as a fraction of the uncompressed size
    pub fn compression_ratio(&self) -> f64 {
        if self.uncompressed_bytes == 0 {
            0.0
        } else {
            self.compressed_bytes as f64 / self.uncompressed_bytes as f64
        }
    }

    /// Compressed memory in MiB
    pub fn compressed_mib(&self) -> f64 {
        self.compressed_bytes as f64 / (1024.0 * 1024.0)
    }

    pub(crate) fn log_summary(&self) {
        log::info!(
            "Compressed mem usage {:.2} MiB, compressed to {:.2}%",
            self.compressed_mib(),
            self.compression_ratio() * 100.0
        );
        log::info!(
            "Processing {} pages took {:?} ({} failed)",
            self.page_count,
            self.elapsed,
            self.failed_pages
        );
    }
}
