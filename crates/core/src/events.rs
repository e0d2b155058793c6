//! Notifications from a document session to the viewer

use crate::stats::LoadStats;
use flume::Sender;

/// Event delivered on the session channel
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The first page is ready and background loading has started
    Loading { page_count: u32 },

    /// A page inside the visible range became ready; repaint it
    Refresh { page: u32 },

    /// A page could not be rendered and will stay blank
    PageFailed { page: u32, reason: String },

    /// Every page has been processed
    Loaded(LoadStats),

    /// Loading stopped early
    Aborted { reason: String },
}

/// Sending half of the session channel.
///
/// Delivery is best-effort: a viewer that stopped listening never blocks
/// or fails a render.
#[derive(Debug, Clone)]
pub struct EventSink {
    sender: Sender<SessionEvent>,
}

impl EventSink {
    pub fn new(sender: Sender<SessionEvent>) -> Self {
        Self { sender }
    }

    pub fn emit(&self, event: SessionEvent) {
        if self.sender.send(event).is_err() {
            log::trace!("Session event dropped, no receiver");
        }
    }
}
