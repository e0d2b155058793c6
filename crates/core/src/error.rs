//! Session and loader errors

use pdf_viewer_render::{OpenError, OpenErrorKind, RenderError};
use pdf_viewer_scheduler::SchedulerError;
use std::time::Duration;

/// Errors that stop a background load
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The session was closed or replaced
    #[error("load cancelled")]
    Cancelled,

    #[error("chunk {chunk} did not finish: {pending} pages pending after {waited:?}")]
    ChunkTimeout {
        chunk: usize,
        pending: usize,
        waited: Duration,
    },

    #[error("worker pool unavailable: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("failed to start loader thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Errors returned by [`DocumentSession`](crate::DocumentSession) operations
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Open(#[from] OpenError),

    /// Page 0 could not be rendered while opening
    #[error("first page failed to render: {0}")]
    FirstPage(#[source] RenderError),

    #[error(transparent)]
    Load(#[from] LoadError),
}

impl SessionError {
    /// Category shown to the user
    pub fn kind(&self) -> OpenErrorKind {
        match self {
            SessionError::Open(error) => error.kind(),
            SessionError::FirstPage(_) => OpenErrorKind::Damaged,
            SessionError::Load(_) => OpenErrorKind::Unknown,
        }
    }
}
