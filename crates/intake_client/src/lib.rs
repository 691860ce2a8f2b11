//! Intake client: HTTP driver layer over the document-intake backend.
mod api;
mod progress;
mod session;
mod types;

pub use api::{ApiError, ApiSettings, BackendApi, ReqwestBackend};
pub use intake_core::{ProgressView, SessionView};
pub use progress::{ProgressSubscription, ProgressTracker, TrackSettings};
pub use session::{ChatSession, ReconcileSettings};
pub use types::{
    map_status, AskRequest, AskResponse, CaseRecord, ChatRecord, ChatSourceRecord, DocumentRecord,
    DocumentStatus, ErrorDetail, NewCase, WireStatus,
};
