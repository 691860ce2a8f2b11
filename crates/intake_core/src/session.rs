use crate::{ChatMessage, ErrorKind, MessageId, SourceRef};

/// Inputs to the conversation machine for one case.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionMsg {
    /// Caller wants the authoritative history.
    HistoryRequested,
    /// An authoritative history load completed.
    HistoryLoaded {
        generation: u64,
        messages: Vec<ChatMessage>,
    },
    /// A history load failed.
    HistoryFailed { generation: u64, kind: ErrorKind },
    /// The user submitted a question.
    QuestionSubmitted { question: String },
    /// The backend answered the pending question.
    AnswerReceived {
        answer: String,
        sources: Vec<SourceRef>,
        created_at: String,
    },
    /// The ask request failed.
    AskFailed { kind: ErrorKind },
    /// The user confirmed clearing the history.
    ClearRequested,
    /// The server confirmed the clear.
    ClearSucceeded,
    /// The server rejected the clear.
    ClearFailed { kind: ErrorKind },
}

/// Side effects requested by the conversation machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEffect {
    /// Fetch the authoritative history; the result must be fed back with the
    /// same generation.
    LoadHistory { generation: u64 },
    /// Send the question to the answering backend.
    SendQuestion { question: String },
    /// Probe history until the answered exchange is observed, then commit.
    Reconcile { question: String, answer: String },
    /// Ask the server to clear the stored history.
    ClearHistory,
}

/// Per-case conversation state.
///
/// The message sequence is only ever replaced wholesale (history commit,
/// clear) or appended to with a single optimistic placeholder; insertion
/// order is display order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionState {
    case_id: String,
    messages: Vec<ChatMessage>,
    awaiting_answer: bool,
    pending_question: Option<String>,
    last_error: Option<ErrorKind>,
    committed_generation: u64,
    next_generation: u64,
    next_local_id: u64,
}

impl SessionState {
    pub fn new(case_id: impl Into<String>) -> Self {
        Self {
            case_id: case_id.into(),
            messages: Vec::new(),
            awaiting_answer: false,
            pending_question: None,
            last_error: None,
            committed_generation: 0,
            next_generation: 0,
            next_local_id: 0,
        }
    }

    pub fn case_id(&self) -> &str {
        &self.case_id
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn awaiting_answer(&self) -> bool {
        self.awaiting_answer
    }

    pub fn last_error(&self) -> Option<&ErrorKind> {
        self.last_error.as_ref()
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            case_id: self.case_id.clone(),
            messages: self.messages.clone(),
            awaiting_answer: self.awaiting_answer,
            last_error: self.last_error.clone(),
        }
    }
}

/// Read model of one conversation; replaced wholesale on every change.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub case_id: String,
    pub messages: Vec<ChatMessage>,
    pub awaiting_answer: bool,
    pub last_error: Option<ErrorKind>,
}

/// Pure update function: applies a message to session state and returns any
/// effects.
pub fn update(mut state: SessionState, msg: SessionMsg) -> (SessionState, Vec<SessionEffect>) {
    let effects = match msg {
        SessionMsg::HistoryRequested => {
            state.next_generation += 1;
            vec![SessionEffect::LoadHistory {
                generation: state.next_generation,
            }]
        }
        SessionMsg::HistoryLoaded {
            generation,
            messages,
        } => {
            // Latest successful load wins; a stale completion can neither
            // duplicate nor drop messages because commits replace wholesale.
            if generation > state.committed_generation {
                state.committed_generation = generation;
                state.messages = messages;
                state.last_error = None;
            }
            Vec::new()
        }
        SessionMsg::HistoryFailed { generation, kind } => {
            if generation > state.committed_generation {
                state.last_error = Some(kind);
            }
            Vec::new()
        }
        SessionMsg::QuestionSubmitted { question } => {
            let question = question.trim().to_string();
            if question.is_empty() || state.awaiting_answer {
                // Blank input never reaches the network; a second question is
                // blocked while one is outstanding.
                return (state, Vec::new());
            }
            state.awaiting_answer = true;
            state.pending_question = Some(question.clone());
            state.last_error = None;
            vec![SessionEffect::SendQuestion { question }]
        }
        SessionMsg::AnswerReceived {
            answer,
            sources,
            created_at,
        } => {
            state.awaiting_answer = false;
            let Some(question) = state.pending_question.take() else {
                return (state, Vec::new());
            };
            state.next_local_id += 1;
            state.messages.push(ChatMessage {
                id: MessageId::Local(state.next_local_id),
                question: question.clone(),
                answer: answer.clone(),
                sources,
                created_at,
            });
            state.last_error = None;
            vec![SessionEffect::Reconcile { question, answer }]
        }
        SessionMsg::AskFailed { kind } => {
            // Nothing was appended: a question either fully lands or the
            // attempt is reported as failed.
            state.awaiting_answer = false;
            state.pending_question = None;
            state.last_error = Some(kind);
            Vec::new()
        }
        SessionMsg::ClearRequested => {
            vec![SessionEffect::ClearHistory]
        }
        SessionMsg::ClearSucceeded => {
            state.messages.clear();
            state.last_error = None;
            Vec::new()
        }
        SessionMsg::ClearFailed { kind } => {
            // Local state is untouched; the view never shows "cleared"
            // without server confirmation.
            state.last_error = Some(kind);
            Vec::new()
        }
    };

    (state, effects)
}

/// Whether the newest authoritative history entry is the answered exchange.
///
/// Matching is by content, not id: the optimistic placeholder carries no
/// server id, so its authoritative twin is recognized by its question and
/// answer. Only the most recent server entry counts, and the answer must
/// match too: a re-asked question has an older occurrence in history, and
/// committing a history that still ends with that old exchange would drop
/// the answer the user just saw.
pub fn history_confirms(messages: &[ChatMessage], question: &str, answer: &str) -> bool {
    messages
        .iter()
        .rev()
        .find(|message| !message.id.is_placeholder())
        .is_some_and(|message| message.question == question && message.answer == answer)
}
