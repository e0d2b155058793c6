//! Render worker pool for parallel page rendering.
//!
//! A fixed set of worker threads pulls boxed tasks from a shared `flume`
//! queue. Callers submit a batch of tasks with [`WorkerPool::scatter`] and
//! block on the returned [`Batch`] until every task has finished. A task
//! that panics still counts as finished; the worker logs the panic and keeps
//! running.

use flume::{Receiver, RecvTimeoutError, Sender};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Condvar, Mutex, PoisonError,
};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Unit of work executed by a worker
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Errors reported by the worker pool
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("worker pool is shut down")]
    ShutDown,

    /// A batch did not finish within the wait bound
    #[error("{pending} tasks still pending after {waited:?}")]
    Timeout { pending: usize, waited: Duration },
}

/// Configuration for the render worker pool.
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Number of worker threads to spawn.
    /// Default: number of logical CPU cores.
    pub num_workers: usize,

    /// Maximum time a worker will wait for a task before checking shutdown.
    /// Default: 100ms.
    pub poll_interval: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            num_workers: num_cpus(),
            poll_interval: Duration::from_millis(100),
        }
    }
}

impl WorkerPoolConfig {
    /// Create a new worker pool configuration.
    pub fn new(num_workers: usize) -> Self {
        Self {
            num_workers,
            poll_interval: Duration::from_millis(100),
        }
    }

    /// Set the poll interval for workers.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Render worker pool for parallel task execution.
///
/// # Example
///
/// ```
/// use pdf_viewer_scheduler::{Task, WorkerPool, WorkerPoolConfig};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let pool = WorkerPool::new(WorkerPoolConfig::new(2)).unwrap();
/// let rendered = Arc::new(AtomicUsize::new(0));
///
/// let tasks = (0..8).map(|_| {
///     let rendered = rendered.clone();
///     Box::new(move || {
///         rendered.fetch_add(1, Ordering::SeqCst);
///     }) as Task
/// });
///
/// pool.scatter(tasks).unwrap().wait();
/// assert_eq!(rendered.load(Ordering::SeqCst), 8);
///
/// pool.shutdown();
/// ```
pub struct WorkerPool {
    sender: Option<Sender<Task>>,
    workers: Vec<Worker>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Create and start a new worker pool.
    ///
    /// A configuration with zero workers is clamped to one.
    pub fn new(config: WorkerPoolConfig) -> Result<Self, SchedulerError> {
        let num_workers = config.num_workers.max(1);
        let (sender, receiver) = flume::unbounded();
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(num_workers);
        for id in 0..num_workers {
            workers.push(Worker::new(
                id,
                receiver.clone(),
                shutdown.clone(),
                config.poll_interval,
            )?);
        }

        log::debug!("Started worker pool with {} threads", num_workers);

        Ok(Self {
            sender: Some(sender),
            workers,
            shutdown,
        })
    }

    /// Get the number of worker threads.
    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    /// Check if the worker pool is shutting down.
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Queue a single task
    pub fn execute(&self, task: Task) -> Result<(), SchedulerError> {
        if self.is_shutting_down() {
            return Err(SchedulerError::ShutDown);
        }
        self.sender
            .as_ref()
            .ok_or(SchedulerError::ShutDown)?
            .send(task)
            .map_err(|_| SchedulerError::ShutDown)
    }

    /// Queue every task of a batch and return a handle to wait on.
    ///
    /// If the pool shuts down before a task runs, the task is dropped and
    /// counts as finished.
    pub fn scatter<I>(&self, tasks: I) -> Result<Batch, SchedulerError>
    where
        I: IntoIterator<Item = Task>,
    {
        let tasks: Vec<Task> = tasks.into_iter().collect();
        let batch = Batch::new(tasks.len());

        for task in tasks {
            let guard = BatchGuard(batch.state.clone());
            let wrapped: Task = Box::new(move || {
                let _guard = guard;
                task();
            });
            // On failure the wrapped task is dropped, which releases its guard
            self.execute(wrapped)?;
        }

        Ok(batch)
    }

    /// Shutdown the worker pool gracefully.
    ///
    /// Workers finish their current task and exit; queued tasks are
    /// dropped. Blocks until all workers have terminated.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        // Disconnecting the queue wakes idle workers
        self.sender.take();

        let current = thread::current().id();
        for worker in self.workers.drain(..) {
            worker.join(current);
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.stop();
    }
}

/// A single worker thread in the worker pool.
struct Worker {
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    fn new(
        id: usize,
        receiver: Receiver<Task>,
        shutdown: Arc<AtomicBool>,
        poll_interval: Duration,
    ) -> Result<Self, SchedulerError> {
        let thread = thread::Builder::new()
            .name(format!("pdf-render-worker-{}", id))
            .spawn(move || {
                Self::run(id, receiver, shutdown, poll_interval);
            })?;

        Ok(Self {
            thread: Some(thread),
        })
    }

    /// Main worker loop.
    ///
    /// Pulls tasks until shutdown is signalled or the queue disconnects.
    fn run(
        id: usize,
        receiver: Receiver<Task>,
        shutdown: Arc<AtomicBool>,
        poll_interval: Duration,
    ) {
        loop {
            if shutdown.load(Ordering::Acquire) {
                break;
            }

            match receiver.recv_timeout(poll_interval) {
                Ok(task) => {
                    if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
                        log::error!("Task panicked on worker {}", id);
                    }
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    /// Wait for the worker thread to finish.
    ///
    /// A worker cannot join itself; that happens when the last pool handle
    /// is dropped from inside a task.
    fn join(mut self, current: thread::ThreadId) {
        if let Some(thread) = self.thread.take() {
            if thread.thread().id() == current {
                return;
            }
            if thread.join().is_err() {
                log::error!("Worker thread panicked");
            }
        }
    }
}

#[derive(Debug)]
struct BatchState {
    remaining: Mutex<usize>,
    finished: Condvar,
    total: usize,
}

/// Marks one task of a batch finished when dropped
struct BatchGuard(Arc<BatchState>);

impl Drop for BatchGuard {
    fn drop(&mut self) {
        let mut remaining = self.0.remaining.lock().unwrap_or_else(PoisonError::into_inner);
        *remaining = remaining.saturating_sub(1);
        if *remaining == 0 {
            self.0.finished.notify_all();
        }
    }
}

/// Completion handle for a group of tasks submitted together
#[derive(Debug, Clone)]
pub struct Batch {
    state: Arc<BatchState>,
}

impl Batch {
    fn new(total: usize) -> Self {
        Self {
            state: Arc::new(BatchState {
                remaining: Mutex::new(total),
                finished: Condvar::new(),
                total,
            }),
        }
    }

    /// Number of tasks in the batch
    pub fn len(&self) -> usize {
        self.state.total
    }

    pub fn is_empty(&self) -> bool {
        self.state.total == 0
    }

    /// Tasks not finished yet
    pub fn pending(&self) -> usize {
        *self.state.remaining.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_done(&self) -> bool {
        self.pending() == 0
    }

    /// Block until every task has finished
    pub fn wait(&self) {
        let mut remaining = self.state.remaining.lock().unwrap_or_else(PoisonError::into_inner);
        while *remaining > 0 {
            remaining = self
                .state
                .finished
                .wait(remaining)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Block until every task has finished or `timeout` elapses
    pub fn wait_timeout(&self, timeout: Duration) -> Result<(), SchedulerError> {
        let start = Instant::now();
        let mut remaining = self.state.remaining.lock().unwrap_or_else(PoisonError::into_inner);

        while *remaining > 0 {
            let waited = start.elapsed();
            if waited >= timeout {
                return Err(SchedulerError::Timeout {
                    pending: *remaining,
                    waited,
                });
            }
            remaining = self
                .state
                .finished
                .wait_timeout(remaining, timeout - waited)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }

        Ok(())
    }
}

/// Get the number of logical CPU cores.
///
/// This is used as the default number of worker threads.
pub fn num_cpus() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}
