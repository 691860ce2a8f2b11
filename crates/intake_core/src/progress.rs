use crate::{ErrorKind, ProcessingStatus, ProgressSnapshot};

/// Inputs to the progress machine for one tracked document.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressMsg {
    /// Tracking started; triggers the immediate first fetch.
    Subscribed,
    /// The poll timer elapsed.
    PollTimerFired,
    /// A status fetch returned a fresh snapshot.
    FetchSucceeded(ProgressSnapshot),
    /// A status fetch failed.
    FetchFailed(ErrorKind),
    /// The caller released the subscription.
    Released,
}

/// Side effects requested by the progress machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEffect {
    /// Issue one status fetch for the tracked document.
    FetchStatus,
    /// Arm the poll timer for one interval.
    SchedulePoll,
    /// Cancel the poll timer; no further fetch may be issued.
    StopPolling,
}

/// Why a subscription stopped polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The document reached `Completed` or `Failed`.
    Terminal,
    /// The document no longer exists server-side.
    EntityGone,
    /// The caller released the subscription.
    Released,
}

/// Per-document polling state.
///
/// Owns the latest snapshot, the single-in-flight guard, and the stop
/// condition. The snapshot is only ever replaced wholesale.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProgressState {
    document_id: String,
    snapshot: Option<ProgressSnapshot>,
    in_flight: bool,
    stopped: Option<StopReason>,
    last_error: Option<ErrorKind>,
}

impl ProgressState {
    pub fn new(document_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            snapshot: None,
            in_flight: false,
            stopped: None,
            last_error: None,
        }
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn snapshot(&self) -> Option<&ProgressSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn last_error(&self) -> Option<&ErrorKind> {
        self.last_error.as_ref()
    }

    pub fn is_polling(&self) -> bool {
        self.stopped.is_none()
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stopped
    }

    pub fn view(&self) -> ProgressView {
        ProgressView {
            document_id: self.document_id.clone(),
            snapshot: self.snapshot.clone(),
            is_polling: self.is_polling(),
            last_error: self.last_error.clone(),
        }
    }
}

/// Read model published to subscribers; replaced wholesale on every change.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressView {
    pub document_id: String,
    pub snapshot: Option<ProgressSnapshot>,
    pub is_polling: bool,
    pub last_error: Option<ErrorKind>,
}

/// Pure update function: applies a message to progress state and returns any
/// effects.
pub fn update(mut state: ProgressState, msg: ProgressMsg) -> (ProgressState, Vec<ProgressEffect>) {
    // A released or terminal subscription ignores everything except further
    // stop requests; no late result may touch its state.
    if state.stopped.is_some() {
        return (state, Vec::new());
    }

    let effects = match msg {
        ProgressMsg::Subscribed => {
            state.in_flight = true;
            vec![ProgressEffect::FetchStatus]
        }
        ProgressMsg::PollTimerFired => {
            if state.in_flight {
                // At most one outstanding request per subscription; an
                // overlapping timer is a no-op, not a queued retry.
                Vec::new()
            } else {
                state.in_flight = true;
                vec![ProgressEffect::FetchStatus]
            }
        }
        ProgressMsg::FetchSucceeded(snapshot) => {
            state.in_flight = false;
            state.last_error = None;
            let terminal = snapshot.status.is_terminal();
            state.snapshot = Some(snapshot);
            if terminal {
                state.stopped = Some(StopReason::Terminal);
                vec![ProgressEffect::StopPolling]
            } else {
                vec![ProgressEffect::SchedulePoll]
            }
        }
        ProgressMsg::FetchFailed(kind) => {
            state.in_flight = false;
            let entity_gone = matches!(kind, ErrorKind::NotFound(_));
            state.last_error = Some(kind);
            if entity_gone {
                state.stopped = Some(StopReason::EntityGone);
                vec![ProgressEffect::StopPolling]
            } else {
                // Last-good snapshot is retained; errors are not terminal.
                vec![ProgressEffect::SchedulePoll]
            }
        }
        ProgressMsg::Released => {
            state.stopped = Some(StopReason::Released);
            vec![ProgressEffect::StopPolling]
        }
    };

    (state, effects)
}

/// Externally supplied status for a document, e.g. carried by a listing
/// fetched before any subscription existed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayStatus {
    pub status: ProcessingStatus,
    pub percent: u8,
    pub step: Option<String>,
}

/// Precedence merge between externally supplied status and a live snapshot.
///
/// A live snapshot is strictly more recent than anything supplied at load
/// time, so it always wins once present; the external value is only a
/// fallback for documents nobody is tracking.
pub fn resolve_display(
    external: Option<&DisplayStatus>,
    live: Option<&ProgressSnapshot>,
) -> Option<DisplayStatus> {
    if let Some(snapshot) = live {
        return Some(DisplayStatus {
            status: snapshot.status,
            percent: snapshot.percent,
            step: snapshot.step.clone(),
        });
    }
    external.cloned()
}
