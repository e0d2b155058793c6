//! Document session: the handle a viewer holds for one open document
//!
//! Opening renders page 0 synchronously so there is something to paint
//! right away, then hands the remaining pages to a background
//! [`DocumentLoadScheduler`]. The session owns the document's page store,
//! the visible-range hints the loader reads, and the event channel.
//!
//! ```text
//! Closed -> Opening -> OpenFailed
//!                   -> Loading -> Loaded
//!                              -> Aborted
//! Loading | Loaded | Aborted -> Closed
//! ```

use crate::config::ViewerConfig;
use crate::error::{LoadError, SessionError};
use crate::events::{EventSink, SessionEvent};
use crate::layout::{PageGeometry, TrimMode};
use crate::loader::DocumentLoadScheduler;
use crate::stats::LoadStats;
use flume::Receiver;
use pdf_viewer_cache::{CompressedPageStore, ViewportDecodeCache};
use pdf_viewer_render::{render_page, OpenError, OpenErrorKind, PageSource, PdfEngine};
use pdf_viewer_scheduler::{CancellationToken, VisibleRange, WorkerPool};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Lifecycle state of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Closed,
    Opening,
    /// The last open failed; the session stays here until the next open
    OpenFailed(OpenErrorKind),
    /// Page 0 is ready and the rest is rendering
    Loading,
    Loaded,
    /// Background loading stopped early; ready pages remain usable
    Aborted,
}

impl SessionState {
    /// Whether a document is open and its pages can be requested
    pub fn is_open(&self) -> bool {
        matches!(self, SessionState::Loading | SessionState::Loaded | SessionState::Aborted)
    }
}

#[derive(Debug)]
struct Status {
    state: SessionState,
    max_page_size: Option<(u32, u32)>,
    stats: Option<LoadStats>,
}

/// Status shared with the loader thread
#[derive(Debug)]
struct Shared {
    status: Mutex<Status>,
    changed: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Status> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: SessionState) {
        let mut status = self.lock();
        status.state = state;
        self.changed.notify_all();
    }
}

/// Resources of the currently open document
struct OpenDocument {
    path: PathBuf,
    store: Arc<CompressedPageStore>,
    cancel: CancellationToken,
    loader: Option<JoinHandle<()>>,
}

/// Facade over the rendering pipeline for one viewer.
///
/// # Example
///
/// ```
/// use pdf_viewer_core::{DocumentSession, SessionState, ViewerConfig};
/// use pdf_viewer_render::synthetic::{SyntheticDocument, SyntheticEngine};
/// use pdf_viewer_scheduler::{WorkerPool, WorkerPoolConfig};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let doc = Arc::new(SyntheticDocument::new(3, 20.0, 20.0));
/// let engine = SyntheticEngine::new().with_document("doc.pdf", doc);
/// let pool = Arc::new(WorkerPool::new(WorkerPoolConfig::new(2)).unwrap());
/// let config = ViewerConfig::default().with_dpi(72);
/// let mut session = DocumentSession::new(Arc::new(engine), pool, config);
///
/// assert_eq!(session.open("doc.pdf").unwrap(), 3);
/// assert_eq!(session.wait_until_loaded(Duration::from_secs(10)), SessionState::Loaded);
/// assert_eq!(session.max_page_size(), Some((20, 20)));
/// ```
pub struct DocumentSession {
    engine: Arc<dyn PdfEngine>,
    pool: Arc<WorkerPool>,
    config: ViewerConfig,
    hints: Arc<VisibleRange>,
    shared: Arc<Shared>,
    events: EventSink,
    events_rx: Receiver<SessionEvent>,
    document: Option<OpenDocument>,
}

impl DocumentSession {
    /// Create a closed session.
    ///
    /// # Arguments
    /// * `engine` - Opens documents
    /// * `pool` - Render workers, may be shared between sessions
    /// * `config` - Rendering and scheduling settings
    pub fn new(engine: Arc<dyn PdfEngine>, pool: Arc<WorkerPool>, config: ViewerConfig) -> Self {
        let (sender, events_rx) = flume::unbounded();
        Self {
            engine,
            pool,
            config,
            hints: Arc::new(VisibleRange::new()),
            shared: Arc::new(Shared {
                status: Mutex::new(Status {
                    state: SessionState::Closed,
                    max_page_size: None,
                    stats: None,
                }),
                changed: Condvar::new(),
            }),
            events: EventSink::new(sender),
            events_rx,
            document: None,
        }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    /// Open `path`, replacing any open document.
    ///
    /// Returns once page 0 is rendered; the other pages load in the
    /// background. Returns the page count.
    ///
    /// # Errors
    /// Open failures leave the session in `OpenFailed` with the matching
    /// user-facing category.
    pub fn open<P: AsRef<Path>>(&mut self, path: P) -> Result<u32, SessionError> {
        let path = path.as_ref();
        self.close();
        self.shared.set_state(SessionState::Opening);

        let source = match self.engine.open(path) {
            Ok(source) => source,
            Err(e) => return Err(self.open_failed(path, e.kind(), e.into())),
        };

        let page_count = source.page_count();
        if page_count == 0 {
            return Err(self.open_failed(path, OpenErrorKind::Damaged, OpenError::Empty.into()));
        }

        let start = Instant::now();
        let store = Arc::new(CompressedPageStore::new(page_count));
        let first = match render_page(source.as_ref(), 0, self.config.dpi) {
            Ok(record) => record,
            Err(e) => {
                let error = SessionError::FirstPage(e);
                return Err(self.open_failed(path, OpenErrorKind::Damaged, error));
            }
        };
        if let Err(e) = store.publish(0, first) {
            log::warn!("Page 0 not stored: {}", e);
        }

        log::info!(
            "Opened {} ({} pages), first page ready in {:?}",
            path.display(),
            page_count,
            start.elapsed()
        );

        self.hints.set(0, 0);
        {
            let mut status = self.shared.lock();
            status.state = SessionState::Loading;
            status.max_page_size = None;
            status.stats = None;
            self.shared.changed.notify_all();
        }
        self.events.emit(SessionEvent::Loading { page_count });

        let cancel = CancellationToken::new();
        let loader = self.start_loader(source, &store, &cancel);

        match loader {
            Ok(handle) => {
                self.document = Some(OpenDocument {
                    path: path.to_path_buf(),
                    store,
                    cancel,
                    loader: Some(handle),
                });
                Ok(page_count)
            }
            Err(e) => Err(self.open_failed(path, OpenErrorKind::Unknown, e.into())),
        }
    }

    fn start_loader(
        &self,
        source: Arc<dyn PageSource>,
        store: &Arc<CompressedPageStore>,
        cancel: &CancellationToken,
    ) -> Result<JoinHandle<()>, LoadError> {
        let loader = DocumentLoadScheduler::new(
            source,
            store.clone(),
            self.pool.clone(),
            self.hints.clone(),
            self.events.clone(),
            cancel.clone(),
        )
        .with_dpi(self.config.dpi)
        .with_chunk_size(self.config.chunk_size())
        .with_page_timeout(self.config.page_timeout);

        let shared = self.shared.clone();
        let events = self.events.clone();
        let store = store.clone();

        loader.spawn(move |result| {
            let mut status = shared.lock();
            if status.state != SessionState::Loading {
                return;
            }

            let event = match result {
                Ok(stats) => {
                    status.max_page_size = Some(store.max_dimensions());
                    status.stats = Some(stats.clone());
                    status.state = SessionState::Loaded;
                    SessionEvent::Loaded(stats)
                }
                Err(LoadError::Cancelled) => return,
                Err(e) => {
                    log::error!("Loading aborted: {}", e);
                    status.state = SessionState::Aborted;
                    SessionEvent::Aborted { reason: e.to_string() }
                }
            };
            // Sent before waking waiters so a loaded session already has its event queued
            events.emit(event);
            shared.changed.notify_all();
        })
    }

    fn open_failed(
        &mut self,
        path: &Path,
        kind: OpenErrorKind,
        error: SessionError,
    ) -> SessionError {
        log::warn!("Failed to open {}: {} ({})", path.display(), error, kind);
        self.shared.set_state(SessionState::OpenFailed(kind));
        error
    }

    /// Close the open document.
    ///
    /// Cancels the loader, waits until no page task touches the store any
    /// more, then frees every page. No-op when nothing is open.
    pub fn close(&mut self) {
        let Some(mut document) = self.document.take() else {
            return;
        };

        document.cancel.cancel();
        if let Some(loader) = document.loader.take() {
            if loader.join().is_err() {
                log::error!("Loader thread panicked");
            }
        }

        log::info!("Closed {}", document.path.display());
        drop(document);

        self.hints.set(0, 0);
        let mut status = self.shared.lock();
        status.state = SessionState::Closed;
        status.max_page_size = None;
        status.stats = None;
        self.shared.changed.notify_all();
    }

    pub fn state(&self) -> SessionState {
        self.shared.lock().state.clone()
    }

    /// Path of the open document
    pub fn path(&self) -> Option<&Path> {
        self.document.as_ref().map(|doc| doc.path.as_path())
    }

    /// Page count of the open document, 0 when closed
    pub fn page_count(&self) -> u32 {
        self.document
            .as_ref()
            .map(|doc| doc.store.page_count())
            .unwrap_or(0)
    }

    /// Publish the viewport's first and last visible page
    pub fn set_visible_range(&self, first: u32, last: u32) {
        self.hints.set(first, last);
    }

    /// Derive the visible range from a fractional scroll offset in pages
    pub fn follow_scroll(&self, offset_pages: f32, columns: u32) {
        self.hints.follow_scroll(offset_pages, columns, self.page_count());
    }

    /// Current visible range hints
    pub fn visible_range(&self) -> (u32, u32) {
        self.hints.get()
    }

    /// Largest trimmed page size, known once loading finished
    pub fn max_page_size(&self) -> Option<(u32, u32)> {
        self.shared.lock().max_page_size
    }

    /// Statistics of the finished load
    pub fn load_stats(&self) -> Option<LoadStats> {
        self.shared.lock().stats.clone()
    }

    /// Page store of the open document
    pub fn store(&self) -> Option<Arc<CompressedPageStore>> {
        self.document.as_ref().map(|doc| doc.store.clone())
    }

    /// A fresh decode cache bound to the open document
    pub fn decode_cache(&self) -> Option<ViewportDecodeCache> {
        self.store().map(|store| {
            ViewportDecodeCache::new(
                store,
                self.config.decode_slots,
                self.config.initial_decode_capacity,
            )
        })
    }

    /// Receiver for session events
    pub fn events(&self) -> Receiver<SessionEvent> {
        self.events_rx.clone()
    }

    /// Layout size of `page`, falling back to page 0 while it loads
    pub fn page_geometry(&self, page: u32) -> Option<PageGeometry> {
        let doc = self.document.as_ref()?;
        if page >= doc.store.page_count() {
            return None;
        }
        PageGeometry::for_page(&doc.store, page)
    }

    /// Display size of `page` in `mode`
    pub fn page_size(&self, page: u32, mode: TrimMode) -> Option<(u32, u32)> {
        self.page_geometry(page)
            .map(|geometry| (geometry.width(mode), geometry.height(mode)))
    }

    /// Block until the session is no longer loading or `timeout` elapses.
    ///
    /// Returns the state at that point.
    pub fn wait_until_loaded(&self, timeout: Duration) -> SessionState {
        // An unrepresentable deadline means wait without bound
        let deadline = Instant::now().checked_add(timeout);
        let mut status = self.shared.lock();

        while matches!(status.state, SessionState::Loading | SessionState::Opening) {
            status = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }
                    self.shared
                        .changed
                        .wait_timeout(status, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
                None => self
                    .shared
                    .changed
                    .wait(status)
                    .unwrap_or_else(PoisonError::into_inner),
            };
        }

        status.state.clone()
    }
}

impl Drop for DocumentSession {
    fn drop(&mut self) {
        self.close();
    }
}
