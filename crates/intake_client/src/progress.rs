use std::sync::Arc;
use std::time::Duration;

use intake_logging::{intake_debug, intake_info, intake_warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use intake_core::{
    update_progress, ProgressEffect, ProgressMsg, ProgressState, ProgressView,
};

use crate::api::BackendApi;

#[derive(Debug, Clone)]
pub struct TrackSettings {
    pub poll_interval: Duration,
}

impl Default for TrackSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(2000),
        }
    }
}

/// Creates one polling subscription per tracked document.
pub struct ProgressTracker {
    backend: Arc<dyn BackendApi>,
    settings: TrackSettings,
}

impl ProgressTracker {
    pub fn new(backend: Arc<dyn BackendApi>) -> Self {
        Self::with_settings(backend, TrackSettings::default())
    }

    pub fn with_settings(backend: Arc<dyn BackendApi>, settings: TrackSettings) -> Self {
        Self { backend, settings }
    }

    /// Starts tracking one document: an immediate status fetch, then polls on
    /// a fixed interval while the document is still `Pending` or
    /// `Processing`.
    pub fn track(&self, document_id: impl Into<String>) -> ProgressSubscription {
        let document_id = document_id.into();
        let state = ProgressState::new(document_id.clone());
        let (view_tx, view_rx) = watch::channel(state.view());
        let cancel = CancellationToken::new();

        intake_info!("progress tracking started document_id={document_id}");
        let task = tokio::spawn(run_subscription(
            self.backend.clone(),
            self.settings.clone(),
            state,
            view_tx,
            cancel.clone(),
        ));

        ProgressSubscription {
            view_rx,
            cancel,
            task,
        }
    }
}

/// Live handle to one tracked document.
///
/// Dropping or releasing the handle cancels the liveness token; cancellation
/// is unconditional and no fetch is issued afterwards.
pub struct ProgressSubscription {
    view_rx: watch::Receiver<ProgressView>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ProgressSubscription {
    /// Latest published view; always a wholesale replacement of the previous
    /// one.
    pub fn view(&self) -> ProgressView {
        self.view_rx.borrow().clone()
    }

    /// Waits for the next view change. Returns `false` once no further change
    /// can arrive (the subscription stopped).
    pub async fn changed(&mut self) -> bool {
        self.view_rx.changed().await.is_ok()
    }

    /// Stops polling now. Idempotent.
    pub fn release(&self) {
        self.cancel.cancel();
    }

    /// Waits until the polling task has fully wound down.
    pub async fn stopped(&mut self) {
        let _ = (&mut self.task).await;
    }
}

impl Drop for ProgressSubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_subscription(
    backend: Arc<dyn BackendApi>,
    settings: TrackSettings,
    mut state: ProgressState,
    view_tx: watch::Sender<ProgressView>,
    cancel: CancellationToken,
) {
    let document_id = state.document_id().to_string();
    let mut effects: Vec<ProgressEffect>;
    (state, effects) = update_progress(state, ProgressMsg::Subscribed);

    'drive: loop {
        let Some(effect) = effects.pop() else {
            break;
        };
        match effect {
            ProgressEffect::FetchStatus => {
                // Tie the in-flight request to the liveness token: a release
                // mid-request drops the response without touching state.
                let msg = tokio::select! {
                    _ = cancel.cancelled() => break 'drive,
                    result = backend.document_status(&document_id) => match result {
                        Ok(status) => ProgressMsg::FetchSucceeded(status.into_snapshot()),
                        Err(err) => {
                            intake_warn!(
                                "status fetch failed document_id={document_id} err={err}"
                            );
                            ProgressMsg::FetchFailed(err.kind())
                        }
                    },
                };
                (state, effects) = update_progress(state, msg);
                let _ = view_tx.send(state.view());
            }
            ProgressEffect::SchedulePoll => {
                tokio::select! {
                    _ = cancel.cancelled() => break 'drive,
                    _ = tokio::time::sleep(settings.poll_interval) => {}
                }
                (state, effects) = update_progress(state, ProgressMsg::PollTimerFired);
            }
            ProgressEffect::StopPolling => {
                intake_info!(
                    "progress tracking stopped document_id={document_id} reason={:?}",
                    state.stop_reason()
                );
                break 'drive;
            }
        }
    }

    // Cancellation path: record the release so the final view reports that
    // polling ceased.
    if state.is_polling() {
        intake_debug!("progress subscription released document_id={document_id}");
        (state, _) = update_progress(state, ProgressMsg::Released);
        let _ = view_tx.send(state.view());
    }
}
