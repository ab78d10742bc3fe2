//! DeepSee facade integration tests.
//!
//! Every test drives the facade end to end over a [`MockTransport`] and
//! asserts on the exact command traffic via the mock's call log.

use deepsee::error::DeepSeeError;
use deepsee::laser::{DeepSee, ShutterState, WatchdogPolicy, READY_STATE, RUNNING_STATE};
use deepsee::transport::MockTransport;
use std::time::Duration;

async fn connect(mock: &MockTransport) -> DeepSee {
    DeepSee::connect(Box::new(mock.clone()), WatchdogPolicy::Disable)
        .await
        .expect("connect failed")
}

#[tokio::test]
async fn test_connect_queries_bounds_then_watchdog() {
    let mock = MockTransport::new();
    let laser = connect(&mock).await;

    assert_eq!(laser.wavelength_bounds(), (690, 1040));
    // Watchdog already disarmed: query it, write nothing.
    assert_eq!(
        mock.call_log(),
        vec!["query: wav:min?", "query: wav:max?", "query: tim:watc?"]
    );
}

#[tokio::test]
async fn test_connect_disarms_armed_watchdog() {
    let mock = MockTransport::new().with_watchdog(7.0);
    connect(&mock).await;

    assert!(mock.call_log().contains(&"write: tim:watc 0".to_string()));
    assert_eq!(mock.watchdog_seconds(), 0.0);
}

#[tokio::test]
async fn test_connect_leaves_watchdog_when_told_to() {
    let mock = MockTransport::new().with_watchdog(7.0);
    DeepSee::connect(Box::new(mock.clone()), WatchdogPolicy::Leave)
        .await
        .expect("connect failed");

    assert!(!mock.call_log().iter().any(|c| c.starts_with("write: tim:watc")));
    assert_eq!(mock.watchdog_seconds(), 7.0);
}

#[tokio::test]
async fn test_get_status_decodes_machine_state() {
    let mock = MockTransport::new();
    let laser = connect(&mock).await;

    assert_eq!(laser.get_status().await.unwrap(), READY_STATE);
    assert_eq!(laser.get_phase().await.unwrap().to_string(), "Ready");
}

#[tokio::test]
async fn test_set_wavelength_accepts_bounds_inclusive() {
    let mock = MockTransport::new();
    let laser = connect(&mock).await;
    mock.clear_log();

    laser.set_wavelength(690).await.unwrap();
    laser.set_wavelength(1040).await.unwrap();
    assert_eq!(mock.call_log(), vec!["write: wav 690", "write: wav 1040"]);
}

#[tokio::test]
async fn test_set_wavelength_rejects_out_of_range() {
    let mock = MockTransport::new();
    let laser = connect(&mock).await;
    mock.clear_log();

    for bad in [689, 1041] {
        let err = laser.set_wavelength(bad).await.unwrap_err();
        match err {
            DeepSeeError::OutOfRange { value, min, max } => {
                assert_eq!(value, bad);
                assert_eq!((min, max), (690, 1040));
            }
            other => panic!("expected out-of-range error, got {other:?}"),
        }
        // The message names the bounds and the offending value.
        let message = laser.set_wavelength(bad).await.unwrap_err().to_string();
        assert!(message.contains("690"));
        assert!(message.contains("1040"));
        assert!(message.contains(&bad.to_string()));
    }
    // No write ever reached the transport.
    assert!(mock.call_log().is_empty());
}

#[tokio::test]
async fn test_custom_bounds_are_cached() {
    let mock = MockTransport::new().with_wavelength_bounds(700, 1300);
    let laser = connect(&mock).await;

    assert_eq!(laser.wavelength_bounds(), (700, 1300));
    assert!(laser.set_wavelength(1300).await.is_ok());
    assert!(laser.set_wavelength(699).await.is_err());
}

#[tokio::test]
async fn test_power_on_requires_ready_state() {
    let mock = MockTransport::new().with_state(30);
    let laser = connect(&mock).await;
    mock.clear_log();

    let err = laser.power_on().await.unwrap_err();
    match err {
        DeepSeeError::Precondition { expected, actual } => {
            assert_eq!(expected, READY_STATE);
            assert_eq!(actual, 30);
        }
        other => panic!("expected precondition error, got {other:?}"),
    }
    // The status query happened, the `on` write did not.
    assert_eq!(mock.call_log(), vec!["query: *stb?"]);
}

#[tokio::test]
async fn test_power_on_and_wait_reaches_running() {
    let mock = MockTransport::new();
    let laser = connect(&mock).await;
    mock.clear_log();

    laser.power_on().await.unwrap();
    let mut ticks = Vec::new();
    let state = laser
        .wait_until_running_with(
            Duration::from_secs(5),
            Duration::from_millis(10),
            |tick| ticks.push(tick.state),
        )
        .await
        .unwrap();

    assert_eq!(state, RUNNING_STATE);
    assert!(!ticks.is_empty());
    assert_eq!(*ticks.last().unwrap(), RUNNING_STATE);
    // States only move toward running.
    assert!(ticks.windows(2).all(|w| w[0] <= w[1]));
    assert!(mock.call_log().contains(&"write: on".to_string()));
}

#[tokio::test]
async fn test_wait_until_running_times_out() {
    // Never issued `on`, so the laser sits at ready forever.
    let mock = MockTransport::new();
    let laser = connect(&mock).await;

    let err = laser
        .wait_until_running_with(Duration::from_millis(50), Duration::from_millis(10), |_| {})
        .await
        .unwrap_err();
    match err {
        DeepSeeError::Timeout { last_state, .. } => assert_eq!(last_state, READY_STATE),
        other => panic!("expected timeout error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_wait_until_running_is_cancellable() {
    let mock = MockTransport::new();
    let laser = connect(&mock).await;

    // Dropping the wait future from a select arm cancels it between polls.
    tokio::select! {
        _ = laser.wait_until_running_with(
            Duration::from_secs(60),
            Duration::from_millis(10),
            |_| {},
        ) => panic!("wait should not finish while the laser is idle"),
        () = tokio::time::sleep(Duration::from_millis(35)) => {}
    }
}

#[tokio::test]
async fn test_shutter_bits_track_shutter_commands() {
    let mock = MockTransport::new();
    let laser = connect(&mock).await;

    assert!(!laser.pump_shutter_state().await.unwrap());
    assert!(!laser.stokes_shutter_state().await.unwrap());

    laser.open_pump_shutter().await.unwrap();
    assert!(laser.pump_shutter_state().await.unwrap());
    assert!(!laser.stokes_shutter_state().await.unwrap());

    laser.open_stokes_shutter().await.unwrap();
    laser.close_pump_shutter().await.unwrap();
    assert!(!laser.pump_shutter_state().await.unwrap());
    assert!(laser.stokes_shutter_state().await.unwrap());
}

#[tokio::test]
async fn test_shutter_state_report_pair() {
    let mock = MockTransport::new();
    let laser = connect(&mock).await;

    laser.open_stokes_shutter().await.unwrap();
    let (pump, stokes) = laser.get_shutter_states().await.unwrap();
    assert_eq!(pump, ShutterState::Closed);
    assert_eq!(stokes, ShutterState::Open);
}

#[tokio::test]
async fn test_readings_parse() {
    let mock = MockTransport::new();
    let laser = connect(&mock).await;

    assert_eq!(laser.get_wavelength().await.unwrap(), 800);
    assert!(laser.get_power().await.unwrap() > 0.0);
    assert_eq!(laser.get_mode().await.unwrap(), "RUN");
    assert_eq!(laser.get_pct_warmup().await.unwrap(), 100);
    assert_eq!(laser.get_motor_position().await.unwrap(), 0.0);

    laser.set_motor_position(1.25).await.unwrap();
    assert_eq!(laser.get_motor_position().await.unwrap(), 1.25);
}

#[tokio::test]
async fn test_watchdog_round_trip() {
    let mock = MockTransport::new();
    let laser = connect(&mock).await;

    laser.set_watchdog_time(12.0).await.unwrap();
    assert_eq!(laser.get_watchdog_time().await.unwrap(), 12.0);
    laser.set_watchdog_time(0.0).await.unwrap();
    assert_eq!(laser.get_watchdog_time().await.unwrap(), 0.0);
}

#[tokio::test]
async fn test_close_sequence_order() {
    let mock = MockTransport::new();
    let laser = connect(&mock).await;
    mock.clear_log();

    laser.close().await.unwrap();

    assert_eq!(
        mock.call_log(),
        vec![
            "write: tim:watc 3",
            "write: shut 0",
            "write: irshut 0",
            "write: off",
            "close",
        ]
    );
}

#[tokio::test]
async fn test_close_runs_every_step_despite_failure() {
    let mock = MockTransport::new();
    let laser = connect(&mock).await;
    mock.clear_log();

    // First close step (the watchdog write) fails; the rest must still run.
    mock.inject_next_failure();
    let err = laser.close().await.unwrap_err();

    match err {
        DeepSeeError::CloseFailed(failures) => assert_eq!(failures.len(), 1),
        other => panic!("expected close-failed error, got {other:?}"),
    }
    assert_eq!(
        mock.call_log(),
        vec![
            "write: tim:watc 3",
            "write: shut 0",
            "write: irshut 0",
            "write: off",
            "close",
        ]
    );
}

#[tokio::test]
async fn test_transport_failure_surfaces_as_transport_error() {
    let mock = MockTransport::new();
    let laser = connect(&mock).await;

    mock.inject_next_failure();
    let err = laser.get_status().await.unwrap_err();
    assert!(matches!(err, DeepSeeError::Transport(_)));
}

#[tokio::test]
async fn test_end_to_end_ready_word_with_pump_shutter_open() {
    // Status word 0x00190004: state 25 (Ready) with the main shutter open.
    let mock = MockTransport::new();
    let laser = connect(&mock).await;
    laser.open_pump_shutter().await.unwrap();

    let word = laser.read_status_word().await.unwrap();
    assert_eq!(word.0 & 0x007F_0004, 0x0019_0004);
    assert_eq!(word.state_number(), 25);
    assert!(laser.pump_shutter_state().await.unwrap());
    assert!(word.render().contains("Main shutter is open"));
}
