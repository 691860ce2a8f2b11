use std::fmt;
use std::time::Instant;

/// Pipeline status reported by the backend for one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ProcessingStatus {
    /// Terminal statuses end the processing lifecycle; no further transition
    /// is expected for the document.
    pub fn is_terminal(self) -> bool {
        matches!(self, ProcessingStatus::Completed | ProcessingStatus::Failed)
    }
}

/// A point-in-time read of one document's processing state.
///
/// Snapshots are replaced wholesale on every poll; fields are never merged
/// with a prior observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub document_id: String,
    pub processed: bool,
    pub status: ProcessingStatus,
    /// Percent complete in `[0, 100]`, clamped at the wire boundary.
    pub percent: u8,
    pub step: Option<String>,
    /// Client-side observation time of this poll.
    pub observed_at: Instant,
}

/// Identity of a chat message.
///
/// `Local` ids are placeholders synthesized for optimistic display; only the
/// server assigns `Server` ids. Encoding the distinction in the type keeps a
/// placeholder from ever being confused with an authoritative record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageId {
    Local(u64),
    Server(String),
}

impl MessageId {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, MessageId::Local(_))
    }
}

/// A cited retrieval source attached to an answer.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRef {
    pub document_id: String,
    pub document_name: String,
    pub chunk_text: String,
    /// Relevance in `[0, 1]`.
    pub relevance_score: f32,
    pub page_number: Option<u32>,
}

/// One question/answer exchange in a case's conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub id: MessageId,
    pub question: String,
    pub answer: String,
    pub sources: Vec<SourceRef>,
    pub created_at: String,
}

/// Failure taxonomy shared by both subsystems.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Transport-level failure (connect refused, reset, DNS).
    Network(String),
    /// The request timed out.
    Timeout,
    /// The backend refused the request under rate limiting; the message is
    /// surfaced verbatim and never auto-retried.
    RateLimited(String),
    /// The entity no longer exists server-side; terminal for that view.
    NotFound(String),
    /// Any other non-success HTTP response.
    Server { status: u16, detail: String },
}

impl ErrorKind {
    /// Transient errors are retried by the next scheduled poll, never
    /// immediately.
    pub fn is_transient(&self) -> bool {
        matches!(self, ErrorKind::Network(_) | ErrorKind::Timeout)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Network(message) => write!(f, "network error: {message}"),
            ErrorKind::Timeout => write!(f, "timeout"),
            ErrorKind::RateLimited(message) => write!(f, "{message}"),
            ErrorKind::NotFound(message) => write!(f, "not found: {message}"),
            ErrorKind::Server { status, detail } => {
                write!(f, "server error {status}: {detail}")
            }
        }
    }
}
