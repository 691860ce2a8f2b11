use std::sync::Once;
use std::time::Instant;

use intake_core::{
    resolve_display, update_progress as update, DisplayStatus, ErrorKind, ProcessingStatus,
    ProgressEffect, ProgressMsg, ProgressSnapshot, ProgressState, StopReason,
};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(intake_logging::initialize_for_tests);
}

fn snapshot(status: ProcessingStatus, percent: u8, step: Option<&str>) -> ProgressSnapshot {
    ProgressSnapshot {
        document_id: "d1".to_string(),
        processed: status == ProcessingStatus::Completed,
        status,
        percent,
        step: step.map(ToOwned::to_owned),
        observed_at: Instant::now(),
    }
}

#[test]
fn subscribe_issues_immediate_fetch() {
    init_logging();
    let state = ProgressState::new("d1");

    let (state, effects) = update(state, ProgressMsg::Subscribed);

    assert_eq!(effects, vec![ProgressEffect::FetchStatus]);
    assert!(state.is_polling());
    assert!(state.snapshot().is_none());
}

#[test]
fn timer_is_noop_while_request_in_flight() {
    init_logging();
    let state = ProgressState::new("d1");
    let (state, _effects) = update(state, ProgressMsg::Subscribed);

    // The first fetch has not resolved; a firing timer must not stack a
    // second request.
    let (state, effects) = update(state, ProgressMsg::PollTimerFired);
    assert!(effects.is_empty());

    // Once the fetch resolves, the next timer issues exactly one fetch.
    let (state, _effects) = update(
        state,
        ProgressMsg::FetchSucceeded(snapshot(ProcessingStatus::Pending, 0, None)),
    );
    let (_state, effects) = update(state, ProgressMsg::PollTimerFired);
    assert_eq!(effects, vec![ProgressEffect::FetchStatus]);
}

#[test]
fn snapshot_replaces_prior_state_wholesale() {
    init_logging();
    let state = ProgressState::new("d1");
    let (state, _) = update(state, ProgressMsg::Subscribed);
    let (state, _) = update(
        state,
        ProgressMsg::FetchSucceeded(snapshot(ProcessingStatus::Processing, 40, Some("ocr"))),
    );

    let (state, _) = update(state, ProgressMsg::PollTimerFired);
    let (state, _) = update(
        state,
        ProgressMsg::FetchSucceeded(snapshot(ProcessingStatus::Processing, 70, None)),
    );

    let snap = state.snapshot().unwrap();
    assert_eq!(snap.percent, 70);
    // No field-wise merge: the old step is gone along with the old snapshot.
    assert_eq!(snap.step, None);
}

#[test]
fn terminal_status_stops_polling_permanently() {
    init_logging();
    let state = ProgressState::new("d1");
    let (state, _) = update(state, ProgressMsg::Subscribed);
    let (state, effects) = update(
        state,
        ProgressMsg::FetchSucceeded(snapshot(ProcessingStatus::Completed, 100, None)),
    );

    assert_eq!(effects, vec![ProgressEffect::StopPolling]);
    assert!(!state.is_polling());
    assert_eq!(state.stop_reason(), Some(StopReason::Terminal));

    // Late timers are ignored; no fetch is ever requested again.
    let (state, effects) = update(state, ProgressMsg::PollTimerFired);
    assert!(effects.is_empty());
    let (_state, effects) = update(state, ProgressMsg::PollTimerFired);
    assert!(effects.is_empty());
}

#[test]
fn fetch_failure_keeps_last_snapshot_and_stays_on_schedule() {
    init_logging();
    let state = ProgressState::new("d1");
    let (state, _) = update(state, ProgressMsg::Subscribed);
    let good = snapshot(ProcessingStatus::Processing, 40, Some("ocr"));
    let (state, _) = update(state, ProgressMsg::FetchSucceeded(good.clone()));

    let (state, _) = update(state, ProgressMsg::PollTimerFired);
    let (state, effects) = update(
        state,
        ProgressMsg::FetchFailed(ErrorKind::Network("connection reset".to_string())),
    );

    assert_eq!(effects, vec![ProgressEffect::SchedulePoll]);
    assert!(state.is_polling());
    assert_eq!(state.snapshot(), Some(&good));
    assert_eq!(
        state.last_error(),
        Some(&ErrorKind::Network("connection reset".to_string()))
    );

    // A subsequent success clears the recorded error.
    let (state, _) = update(state, ProgressMsg::PollTimerFired);
    let (state, _) = update(
        state,
        ProgressMsg::FetchSucceeded(snapshot(ProcessingStatus::Processing, 60, None)),
    );
    assert!(state.last_error().is_none());
}

#[test]
fn missing_entity_stops_polling() {
    init_logging();
    let state = ProgressState::new("d1");
    let (state, _) = update(state, ProgressMsg::Subscribed);
    let (state, effects) = update(
        state,
        ProgressMsg::FetchFailed(ErrorKind::NotFound("Document not found".to_string())),
    );

    assert_eq!(effects, vec![ProgressEffect::StopPolling]);
    assert_eq!(state.stop_reason(), Some(StopReason::EntityGone));
}

#[test]
fn released_subscription_ignores_late_results() {
    init_logging();
    let state = ProgressState::new("d1");
    let (state, _) = update(state, ProgressMsg::Subscribed);
    let good = snapshot(ProcessingStatus::Processing, 40, None);
    let (state, _) = update(state, ProgressMsg::FetchSucceeded(good.clone()));

    let (state, effects) = update(state, ProgressMsg::Released);
    assert_eq!(effects, vec![ProgressEffect::StopPolling]);

    // A fetch that was in flight at release time must not touch state.
    let (state, effects) = update(
        state,
        ProgressMsg::FetchSucceeded(snapshot(ProcessingStatus::Completed, 100, None)),
    );
    assert!(effects.is_empty());
    assert_eq!(state.snapshot(), Some(&good));
    assert_eq!(state.stop_reason(), Some(StopReason::Released));
}

#[test]
fn pending_to_processing_to_completed_updates_in_order() {
    init_logging();
    let state = ProgressState::new("d1");
    let (state, effects) = update(state, ProgressMsg::Subscribed);
    assert_eq!(effects, vec![ProgressEffect::FetchStatus]);

    let (state, effects) = update(
        state,
        ProgressMsg::FetchSucceeded(snapshot(ProcessingStatus::Pending, 0, None)),
    );
    assert_eq!(effects, vec![ProgressEffect::SchedulePoll]);
    assert_eq!(state.snapshot().unwrap().percent, 0);

    let (state, _) = update(state, ProgressMsg::PollTimerFired);
    let (state, effects) = update(
        state,
        ProgressMsg::FetchSucceeded(snapshot(ProcessingStatus::Processing, 40, Some("ocr"))),
    );
    assert_eq!(effects, vec![ProgressEffect::SchedulePoll]);
    let snap = state.snapshot().unwrap();
    assert_eq!(snap.percent, 40);
    assert_eq!(snap.step.as_deref(), Some("ocr"));

    let (state, _) = update(state, ProgressMsg::PollTimerFired);
    let (state, effects) = update(
        state,
        ProgressMsg::FetchSucceeded(snapshot(ProcessingStatus::Completed, 100, None)),
    );
    assert_eq!(effects, vec![ProgressEffect::StopPolling]);
    assert_eq!(state.snapshot().unwrap().percent, 100);
    assert!(!state.is_polling());
}

#[test]
fn live_snapshot_overrides_external_status() {
    init_logging();
    let external = DisplayStatus {
        status: ProcessingStatus::Pending,
        percent: 0,
        step: None,
    };
    let live = snapshot(ProcessingStatus::Processing, 55, Some("entities"));

    let resolved = resolve_display(Some(&external), Some(&live)).unwrap();
    assert_eq!(resolved.status, ProcessingStatus::Processing);
    assert_eq!(resolved.percent, 55);
    assert_eq!(resolved.step.as_deref(), Some("entities"));
}

#[test]
fn external_status_is_fallback_without_subscription() {
    init_logging();
    let external = DisplayStatus {
        status: ProcessingStatus::Completed,
        percent: 100,
        step: None,
    };

    assert_eq!(
        resolve_display(Some(&external), None),
        Some(external.clone())
    );
    assert_eq!(resolve_display(None, None), None);
}
