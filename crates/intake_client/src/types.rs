use std::time::Instant;

use serde::{Deserialize, Serialize};

use intake_core::{ChatMessage, MessageId, ProcessingStatus, ProgressSnapshot, SourceRef};

/// Processing status as serialized by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

pub fn map_status(status: WireStatus) -> ProcessingStatus {
    match status {
        WireStatus::Pending => ProcessingStatus::Pending,
        WireStatus::Processing => ProcessingStatus::Processing,
        WireStatus::Completed => ProcessingStatus::Completed,
        WireStatus::Failed => ProcessingStatus::Failed,
    }
}

/// Response of `GET /api/documents/{id}/status`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DocumentStatus {
    pub id: String,
    pub filename: String,
    pub processed: bool,
    pub processing_status: WireStatus,
    pub processing_progress: i64,
    #[serde(default)]
    pub processing_step: Option<String>,
    pub uploaded_at: String,
}

impl DocumentStatus {
    /// Converts one wire observation into an immutable snapshot, stamping the
    /// client-side observation time and clamping the percentage into [0, 100].
    pub fn into_snapshot(self) -> ProgressSnapshot {
        ProgressSnapshot {
            document_id: self.id,
            processed: self.processed,
            status: map_status(self.processing_status),
            percent: self.processing_progress.clamp(0, 100) as u8,
            step: self.processing_step,
            observed_at: Instant::now(),
        }
    }
}

/// Body of `POST /api/chat/ask`.
#[derive(Debug, Clone, Serialize)]
pub struct AskRequest {
    pub case_id: String,
    pub question: String,
}

/// One cited source attached to an answer or history entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSourceRecord {
    pub document_id: String,
    pub document_name: String,
    pub chunk_text: String,
    pub relevance_score: f32,
    #[serde(default)]
    pub page_number: Option<u32>,
}

impl ChatSourceRecord {
    pub fn into_source(self) -> SourceRef {
        SourceRef {
            document_id: self.document_id,
            document_name: self.document_name,
            chunk_text: self.chunk_text,
            relevance_score: self.relevance_score.clamp(0.0, 1.0),
            page_number: self.page_number,
        }
    }
}

/// Response of `POST /api/chat/ask`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AskResponse {
    pub answer: String,
    #[serde(default)]
    pub sources: Vec<ChatSourceRecord>,
    #[serde(default)]
    pub confidence: Option<f32>,
}

/// One persisted exchange as returned by `GET /api/chat/history/{case_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRecord {
    pub id: String,
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub sources: Vec<ChatSourceRecord>,
    pub created_at: String,
}

impl ChatRecord {
    pub fn into_message(self) -> ChatMessage {
        ChatMessage {
            id: MessageId::Server(self.id),
            question: self.question,
            answer: self.answer,
            sources: self
                .sources
                .into_iter()
                .map(ChatSourceRecord::into_source)
                .collect(),
            created_at: self.created_at,
        }
    }
}

/// One case as returned by the cases endpoints.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CaseRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Body of `POST /api/cases`.
#[derive(Debug, Clone, Serialize)]
pub struct NewCase {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// One document as returned by the documents endpoints.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    pub case_id: String,
    pub filename: String,
    #[serde(default)]
    pub file_type: Option<String>,
    pub uploaded_at: String,
    pub processed: bool,
    #[serde(default)]
    pub processing_status: Option<WireStatus>,
    #[serde(default)]
    pub processing_progress: Option<i64>,
    #[serde(default)]
    pub processing_step: Option<String>,
}

/// Structured error body used by the backend for non-success responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorDetail {
    pub detail: String,
}
