//! PDF Viewer Scheduler Library
//!
//! Threading primitives for background page loading: a bounded worker pool
//! with batch completion, viewport-adaptive chunk ordering, lock-free
//! visible-page hints and cooperative cancellation.

mod cancel;
mod chunks;
mod hints;
mod pool;

// Re-export public API
pub use cancel::CancellationToken;
pub use chunks::{Chunk, ChunkQueue};
pub use hints::VisibleRange;
pub use pool::{num_cpus, Batch, SchedulerError, Task, WorkerPool, WorkerPoolConfig};
