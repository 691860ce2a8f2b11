use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use intake_logging::{intake_debug, intake_info, intake_warn};
use tokio::sync::watch;

use intake_core::{
    history_confirms, update_session, ChatMessage, ErrorKind, SessionEffect, SessionMsg,
    SessionState, SessionView,
};

use crate::api::{ApiError, BackendApi};
use crate::types::{ChatRecord, ChatSourceRecord};

#[derive(Debug, Clone)]
pub struct ReconcileSettings {
    /// Maximum history probes after a confirmed answer.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_millis(2000),
        }
    }
}

/// One case's conversation: ordered history, optimistic asks, reconciliation
/// against the authoritative server record.
///
/// Operations take `&mut self`, so they are naturally serialized per session;
/// a second `ask` cannot start while one is outstanding. Every state change
/// is also published as a wholesale [`SessionView`] through [`subscribe`],
/// so readers observe the optimistic message while `ask` is still
/// reconciling.
///
/// [`subscribe`]: ChatSession::subscribe
pub struct ChatSession {
    backend: Arc<dyn BackendApi>,
    state: SessionState,
    settings: ReconcileSettings,
    view_tx: watch::Sender<SessionView>,
}

impl ChatSession {
    pub fn open(backend: Arc<dyn BackendApi>, case_id: impl Into<String>) -> Self {
        Self::with_settings(backend, case_id, ReconcileSettings::default())
    }

    pub fn with_settings(
        backend: Arc<dyn BackendApi>,
        case_id: impl Into<String>,
        settings: ReconcileSettings,
    ) -> Self {
        let state = SessionState::new(case_id);
        let (view_tx, _) = watch::channel(state.view());
        Self {
            backend,
            state,
            settings,
            view_tx,
        }
    }

    pub fn case_id(&self) -> &str {
        self.state.case_id()
    }

    /// Display-ordered message sequence.
    pub fn messages(&self) -> &[ChatMessage] {
        self.state.messages()
    }

    pub fn awaiting_answer(&self) -> bool {
        self.state.awaiting_answer()
    }

    pub fn last_error(&self) -> Option<&ErrorKind> {
        self.state.last_error()
    }

    /// Watches the published read model. The latest view is available
    /// immediately; each state change replaces it wholesale.
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view_tx.subscribe()
    }

    pub fn view(&self) -> SessionView {
        self.state.view()
    }

    /// Fetches the authoritative history and replaces the local sequence
    /// wholesale. Safe to call repeatedly; the latest successful load wins.
    pub async fn load_history(&mut self) -> Result<(), ApiError> {
        let case_id = self.state.case_id().to_string();
        let effects = self.apply(SessionMsg::HistoryRequested);
        let Some(SessionEffect::LoadHistory { generation }) = effects.into_iter().next() else {
            return Ok(());
        };

        match self.backend.chat_history(&case_id).await {
            Ok(records) => {
                let messages = into_messages(records);
                self.apply(SessionMsg::HistoryLoaded {
                    generation,
                    messages,
                });
                Ok(())
            }
            Err(err) => {
                intake_warn!("history load failed case_id={case_id} err={err}");
                self.apply(SessionMsg::HistoryFailed {
                    generation,
                    kind: err.kind(),
                });
                Err(err)
            }
        }
    }

    /// Submits a question and appends the answered exchange optimistically,
    /// then reconciles against the server history until the authoritative
    /// record is observed (bounded probes with backoff).
    ///
    /// Returns `Ok(None)` when the input was rejected locally: blank
    /// questions never reach the network, and a question is refused while a
    /// previous one is still awaiting its answer.
    pub async fn ask(&mut self, question: &str) -> Result<Option<ChatMessage>, ApiError> {
        let case_id = self.state.case_id().to_string();
        let effects = self.apply(SessionMsg::QuestionSubmitted {
            question: question.to_string(),
        });
        let Some(SessionEffect::SendQuestion { question }) = effects.into_iter().next() else {
            return Ok(None);
        };

        match self.backend.ask(&case_id, &question).await {
            Ok(response) => {
                let effects = self.apply(SessionMsg::AnswerReceived {
                    answer: response.answer,
                    sources: response
                        .sources
                        .into_iter()
                        .map(ChatSourceRecord::into_source)
                        .collect(),
                    created_at: Utc::now().to_rfc3339(),
                });
                let placeholder = self.state.messages().last().cloned();
                if let Some(SessionEffect::Reconcile { question, answer }) =
                    effects.into_iter().next()
                {
                    self.reconcile(&question, &answer).await;
                }
                Ok(placeholder)
            }
            Err(err) => {
                intake_warn!("ask failed case_id={case_id} err={err}");
                self.apply(SessionMsg::AskFailed { kind: err.kind() });
                Err(err)
            }
        }
    }

    /// Clears the stored history server-side, then empties the local
    /// sequence. The caller is responsible for explicit user confirmation;
    /// clearing is irreversible. On failure local state is left untouched.
    pub async fn clear_history(&mut self) -> Result<(), ApiError> {
        let case_id = self.state.case_id().to_string();
        let effects = self.apply(SessionMsg::ClearRequested);
        let Some(SessionEffect::ClearHistory) = effects.into_iter().next() else {
            return Ok(());
        };

        match self.backend.clear_history(&case_id).await {
            Ok(()) => {
                intake_info!("chat history cleared case_id={case_id}");
                self.apply(SessionMsg::ClearSucceeded);
                Ok(())
            }
            Err(err) => {
                intake_warn!("clear failed case_id={case_id} err={err}");
                self.apply(SessionMsg::ClearFailed { kind: err.kind() });
                Err(err)
            }
        }
    }

    /// Probes history with backoff until the asked question appears, then
    /// commits that history wholesale. On exhaustion the optimistic message
    /// is kept; the next explicit `load_history` remains authoritative.
    async fn reconcile(&mut self, question: &str, answer: &str) {
        let case_id = self.state.case_id().to_string();
        let mut delay = self.settings.initial_backoff;

        for attempt in 1..=self.settings.max_attempts {
            tokio::time::sleep(delay).await;
            match self.backend.chat_history(&case_id).await {
                Ok(records) => {
                    let messages = into_messages(records);
                    if history_confirms(&messages, question, answer) {
                        let effects = self.apply(SessionMsg::HistoryRequested);
                        if let Some(SessionEffect::LoadHistory { generation }) =
                            effects.into_iter().next()
                        {
                            self.apply(SessionMsg::HistoryLoaded {
                                generation,
                                messages,
                            });
                        }
                        return;
                    }
                    intake_debug!(
                        "reconcile attempt {attempt}: answer not yet persisted case_id={case_id}"
                    );
                }
                // Probe failures are transient and never disturb the
                // displayed sequence.
                Err(err) => {
                    intake_warn!("reconcile probe failed case_id={case_id} err={err}");
                }
            }
            delay = (delay * 2).min(self.settings.max_backoff);
        }

        intake_warn!(
            "reconcile exhausted after {} attempts; keeping optimistic message case_id={case_id}",
            self.settings.max_attempts
        );
    }

    fn apply(&mut self, msg: SessionMsg) -> Vec<SessionEffect> {
        let state = std::mem::take(&mut self.state);
        let (state, effects) = update_session(state, msg);
        self.state = state;
        let _ = self.view_tx.send(self.state.view());
        effects
    }
}

fn into_messages(records: Vec<ChatRecord>) -> Vec<ChatMessage> {
    records.into_iter().map(ChatRecord::into_message).collect()
}
