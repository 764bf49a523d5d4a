use std::time::Duration;

use serde_json::{Value, json};

use super::*;
use crate::codec;
use crate::config::{FeedConfig, ReconnectConfig};
use crate::test_utils::{
    ScriptedConnector, StaticNegotiator, compress_field, snapshot_frame, test_descriptor, update_frame,
};
use crate::transport::TransportState;
use crate::types::RunningStatus;

fn frame(raw: String) -> Frame {
    codec::decode(raw.as_bytes()).expect("fixture decodes")
}

fn initial_state() -> String {
    snapshot_frame(json!({
        "SessionInfo": {
            "Key": 9523,
            "Name": "Race",
            "Type": "Race",
            "Meeting": {"Name": "Bahrain Grand Prix", "Circuit": {"Key": 63, "ShortName": "Sakhir"}},
        },
        "DriverList": {
            "1": {"Tla": "VER", "TeamName": "Red Bull Racing"},
            "44": {"Tla": "HAM", "TeamName": "Mercedes"},
        },
        "TimingData": {"Lines": {
            "1": {"Position": "1", "GapToLeader": "LAP 1"},
            "44": {"Position": "2", "GapToLeader": "+1.234", "LastLapTime": {"Value": "1:35.001"}},
        }},
        "LapCount": {"CurrentLap": 1, "TotalLaps": 57},
    }))
}

fn fast_config() -> FeedConfig {
    FeedConfig {
        reconnect: ReconnectConfig { base_delay_ms: 100, max_attempts: 2 },
        ..FeedConfig::default()
    }
}

async fn start(connector: &ScriptedConnector, config: &FeedConfig) -> LiveTiming {
    let negotiator = StaticNegotiator::succeeding(test_descriptor());
    let transport = TransportManager::new(connector.clone(), config.reconnect_policy());
    Orchestrator::start(&negotiator, transport, config).await.expect("orchestrator starts")
}

#[test]
fn routing_table() {
    assert_eq!(route(&Topic::DriverList), &[ProcessorKind::Driver]);
    assert_eq!(route(&Topic::TimingAppData), &[ProcessorKind::Driver]);
    assert_eq!(route(&Topic::TimingData), &[ProcessorKind::Position, ProcessorKind::Timing]);
    assert_eq!(route(&Topic::Position), &[ProcessorKind::Position]);
    assert_eq!(route(&Topic::LapCount), &[ProcessorKind::Session]);
    assert!(route(&Topic::WeatherData).is_empty());
    assert!(route(&Topic::Unknown("ChampionshipPrediction".to_string())).is_empty());
}

#[test]
fn initial_state_populates_every_processor() {
    let mut state = TimingState::new();
    let report = state.dispatch_frame(&frame(initial_state()));
    assert!(!report.new_session);
    assert_eq!(report.skipped, 0);

    let snapshot = state.snapshot();
    assert_eq!(snapshot.drivers.len(), 2);
    assert_eq!(snapshot.driver(44).and_then(|d| d.name_acronym.as_deref()), Some("HAM"));
    assert_eq!(snapshot.leader().map(|p| p.driver_number), Some(1));
    assert_eq!(snapshot.position(44).and_then(|p| p.gap_to_leader.as_deref()), Some("+1.234"));
    assert_eq!(snapshot.timing(44).and_then(|t| t.last_lap_time.as_deref()), Some("1:35.001"));

    let session = snapshot.session.expect("session summary");
    assert_eq!(session.session_key, Some(9523));
    assert_eq!(session.circuit_short_name.as_deref(), Some("Sakhir"));
    assert_eq!(session.total_laps, Some(57));

    assert_eq!(state.snapshot(), state.snapshot());
}

#[test]
fn timing_topic_feeds_position_and_timing_independently() {
    let mut state = TimingState::new();
    state.dispatch_frame(&frame(initial_state()));

    let report = state.dispatch_frame(&frame(update_frame(&[(
        "TimingData",
        json!({"Lines": {
            "44": {"Position": "1", "InPit": true, "NumberOfLaps": 12},
            "1": {"Position": "2"}
        }}),
        "2024-03-02T15:04:05.123Z",
    )])));
    assert_eq!(report.applied, 2);

    let snapshot = state.snapshot();
    let leader = snapshot.leader().expect("leader");
    assert_eq!(leader.driver_number, 44);
    assert_eq!(leader.status, Some(RunningStatus::InPit));
    // Omitted fields survive the diff
    assert_eq!(leader.gap_to_leader.as_deref(), Some("+1.234"));
    assert_eq!(snapshot.position(1).and_then(|p| p.position), Some(2));
    assert_eq!(snapshot.timing(44).and_then(|t| t.number_of_laps), Some(12));
    assert_eq!(snapshot.timing(44).and_then(|t| t.last_lap_time.as_deref()), Some("1:35.001"));
}

#[test]
fn compressed_positions_reach_the_position_processor() {
    let mut state = TimingState::new();
    let locations = json!({"Position": [{
        "Timestamp": "2024-03-02T15:04:05.000Z",
        "Entries": {"44": {"Status": "OnTrack", "X": 1520.0, "Y": -830.0, "Z": 12.0}},
    }]});
    state.dispatch_frame(&frame(update_frame(&[(
        "Position.z",
        json!(compress_field(&locations)),
        "2024-03-02T15:04:05.200Z",
    )])));

    let record = state.positions().get(44).expect("position record");
    assert_eq!(record.track_status.as_deref(), Some("OnTrack"));
    let location = record.location.expect("location");
    assert_eq!((location.x, location.y, location.z), (1520.0, -830.0, 12.0));
}

#[test]
fn unrouted_topics_are_ignored() {
    let mut state = TimingState::new();
    state.dispatch_frame(&frame(initial_state()));
    let before = state.snapshot();

    let report = state.dispatch_frame(&frame(update_frame(&[
        ("WeatherData", json!({"AirTemp": "21.4"}), "ts"),
        ("ChampionshipPrediction", json!({"Drivers": {}}), "ts"),
    ])));

    assert_eq!(report, DispatchReport { applied: 0, ignored: 2, skipped: 0, new_session: false });
    assert_eq!(state.snapshot(), before);
}

#[test]
fn undecodable_topic_is_skipped_alone() {
    let mut state = TimingState::new();
    let report = state.dispatch_frame(&frame(snapshot_frame(json!({
        "Position.z": "not base64 at all!",
        "LapCount": {"CurrentLap": 4, "TotalLaps": 57},
    }))));

    assert_eq!(report.skipped, 1);
    assert_eq!(report.applied, 1);
    assert!(state.positions().is_empty());
    assert_eq!(state.session().summary().and_then(|s| s.current_lap), Some(4));
}

#[test]
fn new_session_key_clears_state_before_the_frame_applies() {
    let mut state = TimingState::new();
    state.dispatch_frame(&frame(initial_state()));

    // Same key is not a new session
    let report = state.dispatch_frame(&frame(update_frame(&[(
        "SessionInfo",
        json!({"Key": 9523, "SessionStatus": "Started"}),
        "ts",
    )])));
    assert!(!report.new_session);
    assert_eq!(state.drivers().len(), 2);

    // DriverList sorts ahead of SessionInfo in the snapshot; it must survive the reset
    let report = state.dispatch_frame(&frame(snapshot_frame(json!({
        "DriverList": {"16": {"Tla": "LEC", "TeamName": "Ferrari"}},
        "SessionInfo": {"Key": 9524, "Name": "Qualifying"},
    }))));
    assert!(report.new_session);

    let snapshot = state.snapshot();
    let numbers: Vec<_> = snapshot.drivers.iter().map(|d| d.driver_number).collect();
    assert_eq!(numbers, vec![16]);
    assert!(snapshot.positions.is_empty());
    assert!(snapshot.timing.is_empty());

    let session = snapshot.session.expect("session summary");
    assert_eq!(session.session_key, Some(9524));
    assert_eq!(session.session_name.as_deref(), Some("Qualifying"));
    assert_eq!(session.total_laps, None);
}

#[tokio::test(start_paused = true)]
async fn subscribes_once_after_settle_delay() {
    let _ = tracing_subscriber::fmt::try_init();
    let connector = ScriptedConnector::new();
    let mut link = connector.push_link();
    let config = FeedConfig::default();

    let started = tokio::time::Instant::now();
    let live = start(&connector, &config).await;

    let endpoint = &connector.endpoints()[0];
    let token = endpoint.query_pairs().find(|(k, _)| k == "connectionToken").map(|(_, v)| v.into_owned());
    assert_eq!(token.as_deref(), Some("test-token"));

    let subscription = link.next_outbound().await.expect("subscription sent");
    assert!(started.elapsed() >= config.settle_delay());

    let request: Value = serde_json::from_str(&subscription).expect("valid json");
    assert_eq!(request["H"], "Streaming");
    assert_eq!(request["M"], "Subscribe");
    assert_eq!(request["A"][0].as_array().map(Vec::len), Some(config.stream.topics.len()));

    let again = tokio::time::timeout(Duration::from_secs(60), link.next_outbound()).await;
    assert!(again.is_err(), "subscription must be sent exactly once");

    live.shutdown().await.expect("clean shutdown");
}

#[tokio::test(start_paused = true)]
async fn publishes_a_snapshot_per_frame() {
    let _ = tracing_subscriber::fmt::try_init();
    let connector = ScriptedConnector::new();
    let link = connector.push_link();
    let live = start(&connector, &FeedConfig::default()).await;
    let mut snapshots = live.subscribe();
    assert!(live.current_snapshot().is_none());

    link.push_text(initial_state());
    snapshots.changed().await.expect("first snapshot");
    let first = snapshots.borrow_and_update().clone().expect("snapshot present");
    assert_eq!(first.leader().map(|p| p.driver_number), Some(1));

    link.push_text("{}");
    link.push_text(update_frame(&[
        ("TimingData", json!({"Lines": {"44": {"Position": "1"}, "1": {"Position": "2"}}}), "ts"),
    ]));
    snapshots.changed().await.expect("second snapshot");
    let second = snapshots.borrow_and_update().clone().expect("snapshot present");
    assert_eq!(second.leader().map(|p| p.driver_number), Some(44));
    assert_eq!(second.driver(1).and_then(|d| d.name_acronym.as_deref()), Some("VER"));

    assert_eq!(live.current_snapshot(), Some(second));
    live.shutdown().await.expect("clean shutdown");
}

#[tokio::test(start_paused = true)]
async fn reconnection_preserves_state() {
    let _ = tracing_subscriber::fmt::try_init();
    let connector = ScriptedConnector::new();
    let first = connector.push_link();
    let second = connector.push_link();
    let live = start(&connector, &fast_config()).await;
    let mut snapshots = live.subscribe();

    first.push_text(initial_state());
    snapshots.changed().await.expect("initial snapshot");

    first.close();
    second.push_text(update_frame(&[("LapCount", json!({"CurrentLap": 2}), "ts")]));
    snapshots.changed().await.expect("snapshot after reconnect");

    let snapshot = live.current_snapshot().expect("snapshot");
    assert_eq!(snapshot.drivers.len(), 2);
    assert_eq!(snapshot.session.as_ref().and_then(|s| s.current_lap), Some(2));
    assert_eq!(connector.attempts(), 2);
    assert_eq!(live.transport_state(), TransportState::Open);

    live.shutdown().await.expect("clean shutdown");
}

#[tokio::test(start_paused = true)]
async fn exhausted_reconnects_close_with_error() {
    let _ = tracing_subscriber::fmt::try_init();
    let connector = ScriptedConnector::new();
    let link = connector.push_link();
    let mut live = start(&connector, &fast_config()).await;

    link.push_text(initial_state());
    link.close();

    match live.closed().await {
        Err(TimingError::ReconnectExhausted { attempts }) => assert_eq!(attempts, 2),
        other => panic!("expected exhausted reconnects, got {other:?}"),
    }
    assert_eq!(live.transport_state(), TransportState::Failed { attempts: 2 });
    // Last known state stays readable
    assert_eq!(live.current_snapshot().map(|s| s.drivers.len()), Some(2));
    assert_eq!(connector.attempts(), 3);
}

#[tokio::test(start_paused = true)]
async fn negotiation_failure_never_opens_a_link() {
    let connector = ScriptedConnector::new();
    let config = FeedConfig::default();
    let negotiator = StaticNegotiator::failing("F1 API error");
    let transport = TransportManager::new(connector.clone(), config.reconnect_policy());

    let result = Orchestrator::start(&negotiator, transport, &config).await;
    assert!(matches!(result, Err(TimingError::Negotiation { status: Some(503), .. })));
    assert_eq!(negotiator.calls(), 1);
    assert_eq!(connector.attempts(), 0);
}

#[tokio::test(start_paused = true)]
async fn unanswered_negotiation_times_out() {
    let connector = ScriptedConnector::new();
    let config = FeedConfig::default();
    let negotiator = StaticNegotiator::stalled();
    let transport = TransportManager::new(connector.clone(), config.reconnect_policy());

    let result = Orchestrator::start(&negotiator, transport, &config).await;
    match result {
        Err(TimingError::Timeout { duration }) => assert_eq!(duration, config.negotiation_timeout()),
        Err(other) => panic!("expected timeout, got {other:?}"),
        Ok(_) => panic!("expected timeout, got a live connection"),
    }
    assert_eq!(connector.attempts(), 0);
}

#[tokio::test(start_paused = true)]
async fn handshake_failure_is_returned() {
    let connector = ScriptedConnector::new();
    connector.push_failure("403 Forbidden");
    let config = FeedConfig::default();
    let negotiator = StaticNegotiator::succeeding(test_descriptor());
    let transport = TransportManager::new(connector.clone(), config.reconnect_policy());

    let result = Orchestrator::start(&negotiator, transport, &config).await;
    assert!(matches!(result, Err(TimingError::Transport { .. })));
    assert_eq!(connector.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn shutdown_before_settle_skips_subscription() {
    let connector = ScriptedConnector::new();
    let mut link = connector.push_link();
    let live = start(&connector, &FeedConfig::default()).await;

    live.shutdown().await.expect("clean shutdown");
    assert_eq!(link.next_outbound().await, None);
}
