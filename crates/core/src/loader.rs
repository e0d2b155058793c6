//! Background document loader
//!
//! Renders every page of a freshly opened document into its
//! [`CompressedPageStore`], one chunk of pages at a time. Each chunk is
//! fanned out to the shared worker pool and the loader waits for it before
//! picking the next one, so at most one chunk is in flight per document.
//! The next chunk is the one under the viewport when it is still pending,
//! otherwise the following one in page order.

use crate::error::LoadError;
use crate::events::{EventSink, SessionEvent};
use crate::stats::LoadStats;
use pdf_viewer_cache::{CompressedPageStore, PageStatus};
use pdf_viewer_render::{render_page, PageSource};
use pdf_viewer_scheduler::{
    CancellationToken, ChunkQueue, SchedulerError, Task, VisibleRange, WorkerPool,
};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// State shared by every page task of one load
struct PageContext {
    source: Arc<dyn PageSource>,
    store: Arc<CompressedPageStore>,
    hints: Arc<VisibleRange>,
    events: EventSink,
    cancel: CancellationToken,
    dpi: u32,
}

impl PageContext {
    /// Render, store and announce one page
    fn load_page(&self, page: u32) {
        if self.cancel.is_cancelled() {
            return;
        }

        match render_page(self.source.as_ref(), page, self.dpi) {
            Ok(record) => {
                if let Err(e) = self.store.publish(page, record) {
                    log::warn!("Page {} not stored: {}", page, e);
                    return;
                }
                if self.hints.contains(page) {
                    self.events.emit(SessionEvent::Refresh { page });
                }
            }
            Err(e) => {
                log::warn!("Page {} failed to render: {}", page, e);
                if self.store.mark_failed(page).is_ok() {
                    self.events.emit(SessionEvent::PageFailed {
                        page,
                        reason: e.to_string(),
                    });
                }
            }
        }
    }
}

/// Renders the remaining pages of a document in viewport-adaptive chunks.
///
/// # Example
///
/// ```
/// use pdf_viewer_cache::CompressedPageStore;
/// use pdf_viewer_core::{DocumentLoadScheduler, EventSink};
/// use pdf_viewer_render::synthetic::SyntheticDocument;
/// use pdf_viewer_scheduler::{CancellationToken, VisibleRange, WorkerPool, WorkerPoolConfig};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let source = Arc::new(SyntheticDocument::new(20, 10.0, 10.0));
/// let store = Arc::new(CompressedPageStore::new(20));
/// let pool = Arc::new(WorkerPool::new(WorkerPoolConfig::new(2)).unwrap());
/// let (tx, _rx) = flume::unbounded();
///
/// let loader = DocumentLoadScheduler::new(
///     source,
///     store.clone(),
///     pool,
///     Arc::new(VisibleRange::new()),
///     EventSink::new(tx),
///     CancellationToken::new(),
/// )
/// .with_dpi(72)
/// .with_chunk_size(6)
/// .with_page_timeout(Duration::from_secs(10));
///
/// let stats = loader.run().unwrap();
/// assert_eq!(stats.ready_pages, 20);
/// ```
pub struct DocumentLoadScheduler {
    context: Arc<PageContext>,
    pool: Arc<WorkerPool>,
    chunk_size: u32,
    page_timeout: Duration,
}

impl DocumentLoadScheduler {
    /// Create a loader for the document behind `source`.
    ///
    /// # Arguments
    /// * `source` - Open document
    /// * `store` - Page store sized to the document's page count
    /// * `pool` - Workers that render individual pages
    /// * `hints` - Visible range written by the viewport
    /// * `events` - Sink for refresh and failure notifications
    /// * `cancel` - Stops the load between chunks when cancelled
    pub fn new(
        source: Arc<dyn PageSource>,
        store: Arc<CompressedPageStore>,
        pool: Arc<WorkerPool>,
        hints: Arc<VisibleRange>,
        events: EventSink,
        cancel: CancellationToken,
    ) -> Self {
        let chunk_size = (pool.num_workers() as u32).saturating_mul(3);
        Self {
            context: Arc::new(PageContext {
                source,
                store,
                hints,
                events,
                cancel,
                dpi: pdf_viewer_render::DEFAULT_DPI,
            }),
            pool,
            chunk_size,
            page_timeout: Duration::from_secs(30),
        }
    }

    /// Sets the rendering resolution.
    pub fn with_dpi(mut self, dpi: u32) -> Self {
        if let Some(context) = Arc::get_mut(&mut self.context) {
            context.dpi = dpi;
        }
        self
    }

    /// Sets the number of pages per chunk.
    pub fn with_chunk_size(mut self, pages: u32) -> Self {
        self.chunk_size = pages.max(1);
        self
    }

    /// Sets the wait allowed per page of a chunk.
    ///
    /// A chunk of `n` pending pages is waited on for `n` times this bound.
    pub fn with_page_timeout(mut self, timeout: Duration) -> Self {
        self.page_timeout = timeout;
        self
    }

    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    /// Render every pending page, blocking the calling thread.
    ///
    /// Pages already published (page 0, rendered by the opener) are
    /// skipped. Returns the load statistics once every chunk is done.
    ///
    /// # Errors
    /// * `LoadError::Cancelled` when the token was cancelled between chunks
    /// * `LoadError::ChunkTimeout` when a chunk outlived the wait bound
    pub fn run(&self) -> Result<LoadStats, LoadError> {
        let start = Instant::now();
        let store = &self.context.store;
        let mut queue = ChunkQueue::new(store.page_count(), self.chunk_size);

        log::debug!(
            "Loading {} pages in {} chunks of {}",
            store.page_count(),
            queue.len(),
            self.chunk_size
        );

        loop {
            if self.context.cancel.is_cancelled() {
                log::debug!("Load cancelled with {} chunks left", queue.remaining());
                return Err(LoadError::Cancelled);
            }

            let first_visible = self.context.hints.first();
            let Some(chunk) = queue.next_chunk(Some(first_visible)) else {
                break;
            };

            let tasks: Vec<Task> = chunk
                .pages
                .clone()
                .filter(|&page| store.status(page) == PageStatus::Pending)
                .map(|page| {
                    let context = Arc::clone(&self.context);
                    Box::new(move || context.load_page(page)) as Task
                })
                .collect();

            if tasks.is_empty() {
                continue;
            }

            log::debug!(
                "Chunk {} (pages {:?}): {} tasks",
                chunk.index,
                chunk.pages,
                tasks.len()
            );

            // Renders may be serialized by the engine, so the bound grows with the chunk
            let bound = self.page_timeout.saturating_mul(tasks.len() as u32);
            let batch = self.pool.scatter(tasks)?;
            if let Err(SchedulerError::Timeout { pending, waited }) = batch.wait_timeout(bound) {
                log::error!(
                    "Chunk {} timed out with {} pages pending after {:?}",
                    chunk.index,
                    pending,
                    waited
                );

                // Queued tasks see the cancellation and skip; running ones get one page bound
                self.context.cancel.cancel();
                if batch.wait_timeout(self.page_timeout).is_err() {
                    log::error!("Chunk {} tasks still running after abort", chunk.index);
                }

                return Err(LoadError::ChunkTimeout {
                    chunk: chunk.index,
                    pending,
                    waited,
                });
            }
        }

        let stats = LoadStats::collect(store, start.elapsed());
        stats.log_summary();
        Ok(stats)
    }

    /// Run the load on a dedicated thread.
    ///
    /// `on_finish` receives the outcome on the loader thread.
    pub fn spawn<F>(self, on_finish: F) -> Result<JoinHandle<()>, LoadError>
    where
        F: FnOnce(Result<LoadStats, LoadError>) + Send + 'static,
    {
        thread::Builder::new()
            .name("pdf-loader".to_string())
            .spawn(move || {
                let result = self.run();
                on_finish(result);
            })
            .map_err(LoadError::Spawn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdf_viewer_render::synthetic::{FilledRect, SyntheticDocument};
    use pdf_viewer_scheduler::WorkerPoolConfig;

    struct Fixture {
        source: Arc<SyntheticDocument>,
        store: Arc<CompressedPageStore>,
        hints: Arc<VisibleRange>,
        cancel: CancellationToken,
        events: flume::Receiver<SessionEvent>,
        loader: DocumentLoadScheduler,
    }

    fn fixture(source: SyntheticDocument, workers: usize, chunk_size: u32) -> Fixture {
        let source = Arc::new(source);
        let store = Arc::new(CompressedPageStore::new(source.page_count()));
        let pool = Arc::new(WorkerPool::new(WorkerPoolConfig::new(workers)).unwrap());
        let hints = Arc::new(VisibleRange::new());
        let cancel = CancellationToken::new();
        let (tx, rx) = flume::unbounded();

        let loader = DocumentLoadScheduler::new(
            source.clone(),
            store.clone(),
            pool,
            hints.clone(),
            EventSink::new(tx),
            cancel.clone(),
        )
        .with_dpi(72)
        .with_chunk_size(chunk_size)
        .with_page_timeout(Duration::from_secs(20));

        Fixture {
            source,
            store,
            hints,
            cancel,
            events: rx,
            loader,
        }
    }

    #[test]
    fn test_default_chunk_size_follows_pool() {
        let f = fixture(SyntheticDocument::new(1, 10.0, 10.0), 4, 1);
        let loader = DocumentLoadScheduler::new(
            f.source.clone(),
            f.store.clone(),
            Arc::new(WorkerPool::new(WorkerPoolConfig::new(4)).unwrap()),
            f.hints.clone(),
            EventSink::new(flume::unbounded().0),
            CancellationToken::new(),
        );
        assert_eq!(loader.chunk_size(), 12);
    }

    #[test]
    fn test_small_document_single_batch() {
        let f = fixture(SyntheticDocument::new(5, 20.0, 20.0), 2, 12);
        let stats = f.loader.run().unwrap();

        assert_eq!(stats.ready_pages, 5);
        assert_eq!(stats.failed_pages, 0);
        assert_eq!(f.source.render_count(), 5);
        assert_eq!(f.store.max_dimensions(), (20, 20));
    }

    #[test]
    fn test_published_pages_are_skipped() {
        let f = fixture(SyntheticDocument::new(8, 10.0, 10.0), 2, 3);
        let first = render_page(f.source.as_ref(), 0, 72).unwrap();
        f.store.publish(0, first).unwrap();

        f.loader.run().unwrap();
        let log = f.source.render_log();
        assert_eq!(log.iter().filter(|&&page| page == 0).count(), 1);
        assert_eq!(f.store.ready_count(), 8);
    }

    #[test]
    fn test_viewport_chunk_rendered_first() {
        let f = fixture(SyntheticDocument::new(1000, 4.0, 4.0), 3, 12);
        let first = render_page(f.source.as_ref(), 0, 72).unwrap();
        f.store.publish(0, first).unwrap();

        f.hints.set(500, 503);
        f.loader.run().unwrap();

        // Page 0 was rendered up front; the loader started with chunk 41
        let log = f.source.render_log();
        assert_eq!(log.len(), 1000);
        let mut first_chunk: Vec<u32> = log[1..13].to_vec();
        first_chunk.sort_unstable();
        assert_eq!(first_chunk, (492..504).collect::<Vec<_>>());

        // Then sequentially upward from chunk 42
        let mut second_chunk: Vec<u32> = log[13..25].to_vec();
        second_chunk.sort_unstable();
        assert_eq!(second_chunk, (504..516).collect::<Vec<_>>());

        assert_eq!(f.store.ready_count(), 1000);
    }

    #[test]
    fn test_only_one_chunk_in_flight() {
        let source = SyntheticDocument::new(24, 4.0, 4.0).with_delay(Duration::from_millis(2));
        let f = fixture(source, 8, 4);
        f.loader.run().unwrap();

        assert!(f.source.max_in_flight() <= 4);
        assert_eq!(f.store.ready_count(), 24);
    }

    #[test]
    fn test_refresh_only_for_visible_pages() {
        let f = fixture(SyntheticDocument::new(10, 4.0, 4.0), 2, 4);
        f.hints.set(2, 4);
        f.loader.run().unwrap();

        let mut refreshed: Vec<u32> = f
            .events
            .try_iter()
            .filter_map(|event| match event {
                SessionEvent::Refresh { page } => Some(page),
                _ => None,
            })
            .collect();
        refreshed.sort_unstable();
        assert_eq!(refreshed, vec![2, 3, 4]);
    }

    #[test]
    fn test_failed_page_does_not_stop_load() {
        let source = SyntheticDocument::new(6, 10.0, 10.0)
            .with_rect(2, FilledRect::black(1.0, 1.0, 2.0, 2.0))
            .with_failing_page(3);
        let f = fixture(source, 2, 2);

        let stats = f.loader.run().unwrap();
        assert_eq!(stats.ready_pages, 5);
        assert_eq!(stats.failed_pages, 1);
        assert_eq!(f.store.status(3), PageStatus::Failed);

        let failures: Vec<SessionEvent> = f
            .events
            .try_iter()
            .filter(|event| matches!(event, SessionEvent::PageFailed { .. }))
            .collect();
        assert_eq!(failures.len(), 1);
        assert!(matches!(&failures[0], SessionEvent::PageFailed { page: 3, .. }));
    }

    #[test]
    fn test_cancelled_before_start() {
        let f = fixture(SyntheticDocument::new(10, 4.0, 4.0), 2, 4);
        f.cancel.cancel();

        assert!(matches!(f.loader.run(), Err(LoadError::Cancelled)));
        assert_eq!(f.source.render_count(), 0);
    }

    /// Renders one page at a time, like an engine behind a document lock
    struct SerializedSource {
        inner: SyntheticDocument,
        lock: std::sync::Mutex<()>,
    }

    impl PageSource for SerializedSource {
        fn page_count(&self) -> u32 {
            self.inner.page_count()
        }

        fn render_page(
            &self,
            page: u32,
            dpi: u32,
        ) -> Result<pdf_viewer_render::RasterPage, pdf_viewer_render::RenderError> {
            let _guard = self.lock.lock().unwrap();
            self.inner.render_page(page, dpi)
        }
    }

    #[test]
    fn test_serialized_renders_finish_within_page_bound() {
        let source = Arc::new(SerializedSource {
            inner: SyntheticDocument::new(48, 4.0, 4.0).with_delay(Duration::from_millis(20)),
            lock: std::sync::Mutex::new(()),
        });
        let store = Arc::new(CompressedPageStore::new(48));
        let pool = Arc::new(WorkerPool::new(WorkerPoolConfig::new(8)).unwrap());
        let (tx, _rx) = flume::unbounded();

        // Default chunk of 24 pages takes ~480 ms serialized, well past a single page bound
        let loader = DocumentLoadScheduler::new(
            source,
            store.clone(),
            pool,
            Arc::new(VisibleRange::new()),
            EventSink::new(tx),
            CancellationToken::new(),
        )
        .with_dpi(72)
        .with_page_timeout(Duration::from_millis(300));
        assert_eq!(loader.chunk_size(), 24);

        let stats = loader.run().unwrap();
        assert_eq!(stats.ready_pages, 48);
        assert_eq!(store.ready_count(), 48);
    }

    #[test]
    fn test_chunk_timeout_aborts() {
        let source = SyntheticDocument::new(4, 4.0, 4.0).with_delay(Duration::from_millis(300));
        let f = fixture(source, 1, 4);
        let loader = f.loader.with_page_timeout(Duration::from_millis(50));

        match loader.run() {
            Err(LoadError::ChunkTimeout { chunk, pending, .. }) => {
                assert_eq!(chunk, 0);
                assert!(pending > 0);
            }
            other => panic!("expected chunk timeout, got {:?}", other.map(|s| s.ready_pages)),
        }
        assert!(f.cancel.is_cancelled());
    }

    #[test]
    fn test_spawn_reports_outcome() {
        let f = fixture(SyntheticDocument::new(7, 4.0, 4.0), 2, 3);
        let (done_tx, done_rx) = flume::bounded(1);

        let handle = f
            .loader
            .spawn(move |result| {
                let _ = done_tx.send(result.map(|stats| stats.ready_pages).ok());
            })
            .unwrap();

        assert_eq!(done_rx.recv_timeout(Duration::from_secs(10)).unwrap(), Some(7));
        handle.join().unwrap();
    }
}
