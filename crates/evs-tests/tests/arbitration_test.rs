//! Arbitration scenarios: state transitions, priorities, and session tokens
//!
//! All tests drive the service through its public surface over the mock
//! camera HAL. The activity-request timeout is configured long enough not
//! to interfere with the sleeps used here.

use std::sync::Arc;
use std::time::Duration;

use evs_core::{CallerId, ServiceState, ServiceStatus, ServiceType, StreamConsumer, StreamSignal};
use evs_service::testing::{MockCameraHal, RecordingPresenter, StaticVerifier};
use evs_service::{EvsConfig, EvsService, ServiceError, StreamEvent};
use pretty_assertions::assert_eq;
use tokio::sync::mpsc;

const SYSTEM_UI_UID: CallerId = 1000;

struct Harness {
    service: EvsService,
    presenter: Arc<RecordingPresenter>,
    hal: Arc<MockCameraHal>,
}

fn harness() -> Harness {
    let config = EvsConfig {
        activity_request_timeout_ms: 500,
        hal_reconnect_interval_ms: 25,
        ..EvsConfig::default()
    };
    let hal = Arc::new(MockCameraHal::new());
    let presenter = Arc::new(RecordingPresenter::new());
    let service = EvsService::new(
        hal.clone(),
        presenter.clone(),
        Arc::new(StaticVerifier::new(SYSTEM_UI_UID)),
        config,
    );
    Harness {
        service,
        presenter,
        hal,
    }
}

/// Harness with the hardware connected (state INACTIVE)
fn online() -> Harness {
    let h = harness();
    h.service.init();
    assert_eq!(h.service.current_status().state, ServiceState::Inactive);
    h
}

fn drain(rx: &mut mpsc::UnboundedReceiver<ServiceStatus>) -> Vec<ServiceStatus> {
    let mut statuses = Vec::new();
    while let Ok(status) = rx.try_recv() {
        statuses.push(status);
    }
    statuses
}

#[tokio::test]
async fn hardware_connect_moves_unavailable_to_inactive() {
    let h = harness();
    let mut sub = h.service.register_status_listener();

    h.service.init();

    assert_eq!(h.service.current_status().state, ServiceState::Inactive);
    let statuses = drain(&mut sub.rx);
    assert_eq!(
        statuses,
        vec![ServiceStatus {
            service_type: ServiceType::Rearview,
            state: ServiceState::Inactive,
        }]
    );
}

#[tokio::test]
async fn gear_signal_drives_the_full_rearview_cycle() {
    let h = online();

    // Reverse gear: the machine reserves the camera and asks the system
    // viewer to launch, passing a fresh token.
    h.service.on_external_signal(ServiceType::Rearview, true, 1);
    assert_eq!(
        h.service.current_status(),
        ServiceStatus {
            service_type: ServiceType::Rearview,
            state: ServiceState::Requested,
        }
    );
    let token = h.presenter.last_token().expect("presentation carries a token");

    // The viewer answers with the token and gets the stream.
    let (consumer, mut signals) = StreamConsumer::new();
    h.service
        .start_video_stream(ServiceType::Rearview, Some(&token), consumer)
        .unwrap();
    assert_eq!(h.service.current_status().state, ServiceState::Active);

    // Gear leaves reverse: the stream is stopped and the consumer told.
    h.service.on_external_signal(ServiceType::Rearview, false, 2);
    assert_eq!(h.service.current_status().state, ServiceState::Inactive);

    match signals.try_recv().unwrap() {
        StreamSignal::Event(StreamEvent::Stopped) => {}
        other => panic!("expected a stream-stopped event, got {other:?}"),
    }
}

#[tokio::test]
async fn lower_priority_stream_request_is_rejected_without_a_broadcast() {
    let h = online();
    h.service.on_external_signal(ServiceType::Rearview, true, 1);
    let token = h.presenter.last_token().unwrap();

    let (privileged, mut privileged_signals) = StreamConsumer::new();
    h.service
        .start_video_stream(ServiceType::Rearview, Some(&token), privileged.clone())
        .unwrap();

    let mut sub = h.service.register_status_listener();

    let (intruder, _intruder_signals) = StreamConsumer::new();
    let result = h
        .service
        .start_video_stream(ServiceType::Rearview, None, intruder);

    assert_eq!(result, Err(ServiceError::Busy));
    assert_eq!(h.service.current_status().state, ServiceState::Active);
    assert!(drain(&mut sub.rx).is_empty());

    // The original consumer never saw a stop.
    assert!(privileged_signals.try_recv().is_err());
}

#[tokio::test]
async fn consumer_death_relaunches_the_viewer_with_a_fresh_token() {
    let h = online();
    h.service.on_external_signal(ServiceType::Rearview, true, 1);
    let first_token = h.presenter.last_token().unwrap();

    let (consumer, signals) = StreamConsumer::new();
    h.service
        .start_video_stream(ServiceType::Rearview, Some(&first_token), consumer)
        .unwrap();
    assert_eq!(h.service.current_status().state, ServiceState::Active);

    // The remote viewer dies while the gear is still in reverse.
    drop(signals);
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(h.service.current_status().state, ServiceState::Requested);
    assert_eq!(h.presenter.call_count(), 2);

    let second_token = h.presenter.last_token().unwrap();
    assert!(!second_token.same_token(&first_token));
}

#[tokio::test]
async fn superseded_token_no_longer_grants_high_priority() {
    let h = online();
    h.service.on_external_signal(ServiceType::Rearview, true, 1);
    let stale = h.presenter.last_token().unwrap();

    // A new mint supersedes the token the viewer is still holding.
    h.service.generate_session_token(SYSTEM_UI_UID).unwrap();

    // The stale holder still gets a stream, but only at LOW priority:
    // an ordinary NORMAL activity request preempts it immediately.
    let (consumer, mut signals) = StreamConsumer::new();
    h.service
        .start_video_stream(ServiceType::Rearview, Some(&stale), consumer)
        .unwrap();
    assert_eq!(h.service.current_status().state, ServiceState::Active);

    h.service.start_activity(ServiceType::Rearview).unwrap();
    assert_eq!(h.service.current_status().state, ServiceState::Requested);
    match signals.try_recv().unwrap() {
        StreamSignal::Event(StreamEvent::Stopped) => {}
        other => panic!("expected a stream-stopped event, got {other:?}"),
    }
}

#[tokio::test]
async fn requests_below_the_granted_priority_stay_busy_until_release() {
    let h = online();
    h.service.on_external_signal(ServiceType::Rearview, true, 1);

    // NORMAL-priority paths cannot displace the HIGH reservation.
    assert_eq!(
        h.service.start_activity(ServiceType::Rearview),
        Err(ServiceError::Busy)
    );
    assert_eq!(h.service.stop_activity(), Err(ServiceError::Busy));
    assert_eq!(h.service.current_status().state, ServiceState::Requested);

    // Once the signal releases the machine, NORMAL requests get through.
    h.service.on_external_signal(ServiceType::Rearview, false, 2);
    assert_eq!(h.service.current_status().state, ServiceState::Inactive);
    h.service.start_activity(ServiceType::Rearview).unwrap();
}

#[tokio::test]
async fn duplicate_signals_produce_a_single_transition() {
    let h = online();
    let mut sub = h.service.register_status_listener();

    h.service.on_external_signal(ServiceType::Rearview, true, 5);
    h.service.on_external_signal(ServiceType::Rearview, true, 5);
    // An older timestamp is just as stale.
    h.service.on_external_signal(ServiceType::Rearview, true, 3);

    assert_eq!(drain(&mut sub.rx).len(), 1);
    assert_eq!(h.presenter.call_count(), 1);
}

#[tokio::test]
async fn token_issuance_is_refused_for_unprivileged_callers() {
    let h = online();
    h.service.on_external_signal(ServiceType::Rearview, true, 1);
    let live = h.presenter.last_token().unwrap();

    assert!(h.service.generate_session_token(4242).is_err());

    // The failed attempt left the live token intact.
    let (consumer, _signals) = StreamConsumer::new();
    h.service
        .start_video_stream(ServiceType::Rearview, Some(&live), consumer)
        .unwrap();
    assert_eq!(h.service.current_status().state, ServiceState::Active);
}

#[tokio::test]
async fn stopping_a_stream_from_a_stranger_is_ignored() {
    let h = online();
    let (consumer, _signals) = StreamConsumer::new();
    h.service
        .start_video_stream(ServiceType::Rearview, None, consumer)
        .unwrap();

    let (stranger, _stranger_signals) = StreamConsumer::new();
    h.service.stop_video_stream(&stranger);
    assert_eq!(h.service.current_status().state, ServiceState::Active);
}

#[tokio::test]
async fn equal_priority_stream_replaces_the_consumer_without_restart() {
    let h = online();
    let (first, mut first_signals) = StreamConsumer::new();
    h.service
        .start_video_stream(ServiceType::Rearview, None, first)
        .unwrap();
    assert_eq!(h.hal.opened_cameras().len(), 1);

    let (second, _second_signals) = StreamConsumer::new();
    h.service
        .start_video_stream(ServiceType::Rearview, None, second)
        .unwrap();

    // The old consumer is told the stream ended; the camera device was not
    // reopened for the handover.
    match first_signals.try_recv().unwrap() {
        StreamSignal::Event(StreamEvent::Stopped) => {}
        other => panic!("expected a stream-stopped event, got {other:?}"),
    }
    assert_eq!(h.hal.opened_cameras().len(), 1);
    assert_eq!(h.service.current_status().state, ServiceState::Active);
}
