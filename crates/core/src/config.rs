//! Viewer configuration for the page loading pipeline.
//!
//! Settings can be read from environment variables or built
//! programmatically; the defaults suit a desktop viewer.

use pdf_viewer_cache::{DEFAULT_DECODE_CAPACITY, DEFAULT_DECODE_SLOTS};
use pdf_viewer_render::DEFAULT_DPI;
use pdf_viewer_scheduler::{num_cpus, WorkerPoolConfig};
use std::time::Duration;

/// Configuration for rendering, scheduling and decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerConfig {
    /// Rasterization resolution in dots per inch
    pub dpi: u32,
    /// Number of page render workers
    pub worker_threads: usize,
    /// Chunk size as a multiple of `worker_threads`
    pub chunk_factor: u32,
    /// Explicit chunk size, overriding `chunk_factor`
    pub chunk_size: Option<u32>,
    /// Wait allowed per page of a chunk; a chunk is waited on for its page count times this
    pub page_timeout: Duration,
    /// Number of decoded pages each viewer keeps
    pub decode_slots: usize,
    /// Initial decode buffer size per slot in bytes
    pub initial_decode_capacity: usize,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            dpi: DEFAULT_DPI,
            worker_threads: num_cpus(),
            chunk_factor: 3,
            chunk_size: None,
            page_timeout: Duration::from_secs(30),
            decode_slots: DEFAULT_DECODE_SLOTS,
            initial_decode_capacity: DEFAULT_DECODE_CAPACITY,
        }
    }
}

impl ViewerConfig {
    /// Sets the rendering resolution.
    pub fn with_dpi(mut self, dpi: u32) -> Self {
        self.dpi = dpi;
        self
    }

    /// Sets the number of render workers.
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    /// Sets the chunk size multiplier.
    pub fn with_chunk_factor(mut self, factor: u32) -> Self {
        self.chunk_factor = factor;
        self
    }

    /// Sets an explicit chunk size.
    pub fn with_chunk_size(mut self, pages: u32) -> Self {
        self.chunk_size = Some(pages);
        self
    }

    /// Sets the per-page wait bound.
    pub fn with_page_timeout(mut self, timeout: Duration) -> Self {
        self.page_timeout = timeout;
        self
    }

    /// Sets the number of decode slots.
    pub fn with_decode_slots(mut self, slots: usize) -> Self {
        self.decode_slots = slots;
        self
    }

    /// Sets the initial decode buffer size in bytes.
    pub fn with_initial_decode_capacity(mut self, bytes: usize) -> Self {
        self.initial_decode_capacity = bytes;
        self
    }

    /// Pages rendered per batch: the explicit size if set, otherwise
    /// `worker_threads * chunk_factor`. Never zero.
    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
            .unwrap_or_else(|| (self.worker_threads as u32).saturating_mul(self.chunk_factor))
            .max(1)
    }

    /// Worker pool settings matching this configuration
    pub fn pool_config(&self) -> WorkerPoolConfig {
        WorkerPoolConfig::new(self.worker_threads)
    }

    /// Loads configuration from environment variables.
    ///
    /// Environment variables:
    /// - `PDF_VIEWER_DPI`: rendering resolution (default: 144)
    /// - `PDF_VIEWER_WORKERS`: render worker count (default: CPU count)
    /// - `PDF_VIEWER_CHUNK_SIZE`: pages per batch (default: workers * 3)
    /// - `PDF_VIEWER_PAGE_TIMEOUT_MS`: wait bound per page of a chunk (default: 30000)
    /// - `PDF_VIEWER_DECODE_SLOTS`: decoded pages per viewer (default: 30)
    /// - `PDF_VIEWER_DECODE_CAPACITY_MB`: initial decode buffer size (default: 7)
    ///
    /// # Errors
    /// Returns an error if any environment variable contains an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(dpi) = parse_var::<u32>("PDF_VIEWER_DPI")? {
            config.dpi = dpi;
        }

        if let Some(workers) = parse_var::<usize>("PDF_VIEWER_WORKERS")? {
            config.worker_threads = workers;
        }

        if let Some(pages) = parse_var::<u32>("PDF_VIEWER_CHUNK_SIZE")? {
            config.chunk_size = Some(pages);
        }

        if let Some(ms) = parse_var::<u64>("PDF_VIEWER_PAGE_TIMEOUT_MS")? {
            config.page_timeout = Duration::from_millis(ms);
        }

        if let Some(slots) = parse_var::<usize>("PDF_VIEWER_DECODE_SLOTS")? {
            config.decode_slots = slots;
        }

        if let Some(mb) = parse_var::<usize>("PDF_VIEWER_DECODE_CAPACITY_MB")? {
            config.initial_decode_capacity = mb.checked_mul(1024 * 1024).ok_or_else(|| {
                ConfigError::InvalidValue("PDF_VIEWER_DECODE_CAPACITY_MB".to_string())
            })?;
        }

        Ok(config)
    }
}

/// Read a positive number from `name`, `None` if unset
fn parse_var<T>(name: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr + PartialEq + Default,
{
    match std::env::var(name) {
        Ok(val) => {
            let parsed = val
                .trim()
                .parse::<T>()
                .map_err(|_| ConfigError::InvalidValue(name.to_string()))?;
            if parsed == T::default() {
                return Err(ConfigError::InvalidValue(name.to_string()));
            }
            Ok(Some(parsed))
        }
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => Err(ConfigError::InvalidValue(name.to_string())),
    }
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Invalid value for a configuration variable
    #[error("Invalid value for configuration key: {0}")]
    InvalidValue(String),
}
