//! Intake core: pure state machines for progress tracking and chat sessions.
mod progress;
mod session;
mod types;

pub use progress::{
    resolve_display, update as update_progress, DisplayStatus, ProgressEffect, ProgressMsg,
    ProgressState, ProgressView, StopReason,
};
pub use session::{
    history_confirms, update as update_session, SessionEffect, SessionMsg, SessionState,
    SessionView,
};
pub use types::{ChatMessage, ErrorKind, MessageId, ProcessingStatus, ProgressSnapshot, SourceRef};
