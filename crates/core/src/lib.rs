//! PDF Viewer Core Library
//!
//! Document sessions for the viewer: open a document, render its first
//! page, load the rest in the background in viewport order, and serve
//! decoded pages back to the viewport.

pub mod config;
pub mod error;
pub mod events;
pub mod layout;
pub mod loader;
pub mod session;
pub mod stats;

pub use config::{ConfigError, ViewerConfig};
pub use error::{LoadError, SessionError};
pub use events::{EventSink, SessionEvent};
pub use layout::{PageGeometry, TrimMode, MARGIN};
pub use loader::DocumentLoadScheduler;
pub use session::{DocumentSession, SessionState};
pub use stats::LoadStats;
