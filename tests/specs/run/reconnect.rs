//! Connection resilience specs.

use crate::prelude::*;
use rig_core::EventType;

const TARGET_PROFILE: &str = r#"
name: bench
connection:
  host: 192.0.2.7
commands:
  probe:
    command: uname -a
    run: target
"#;

#[tokio::test]
async fn second_command_survives_a_dropped_transport() {
    let rig = rig_with_profile("bench", TARGET_PROFILE);
    rig.script.set_result("uname -a", 0, "Linux target 6.1\n", "");

    let run_id = rig.engine.create_run("bench", Some("r1"), None).unwrap();
    rig.engine.start_run(&run_id).unwrap();

    let first = rig.engine.execute_command(&run_id, "probe").await.unwrap();
    assert!(first.success);

    rig.script.drop_connection();
    let second = rig.engine.execute_command(&run_id, "probe").await.unwrap();
    assert!(second.success);
    assert_eq!(second.stdout, "Linux target 6.1\n");

    let events = rig.engine.get_events(&run_id, 0).unwrap();
    let types = event_types(&events);
    assert_eq!(
        types,
        [
            "run_created",
            "run_started",
            "command_started",
            "connection_established",
            "command_completed",
            "command_started",
            "connection_lost",
            "connection_established",
            "command_completed",
        ]
    );

    let lost = of_type(&events, EventType::ConnectionLost);
    assert_eq!(lost[0].data["reason"], "Connection lost");
}

#[tokio::test]
async fn connect_retries_are_logged_then_connection_establishes() {
    let rig = rig_with_profile("bench", TARGET_PROFILE);
    rig.script.fail_next_connects(1);

    let run_id = rig.engine.create_run("bench", Some("r2"), None).unwrap();
    rig.engine.start_run(&run_id).unwrap();

    let outcome = rig.engine.execute_command(&run_id, "probe").await.unwrap();
    assert!(outcome.success);

    let events = rig.engine.get_events(&run_id, 0).unwrap();
    let retries = of_type(&events, EventType::ConnectionRetry);
    assert_eq!(retries.len(), 1);
    assert_eq!(retries[0].data["attempt"], 1);
    assert!(retries[0].data["error"].as_str().unwrap().contains("connect failure"));

    let retry_seq = retries[0].seq;
    let established_seq = seq_of(&events, EventType::ConnectionEstablished);
    assert!(retry_seq < established_seq);
}

#[tokio::test]
async fn exhausted_connects_fail_the_command_with_an_event() {
    let rig = rig_with_profile("bench", TARGET_PROFILE);
    rig.script.fail_next_connects(100);

    let run_id = rig.engine.create_run("bench", Some("r3"), None).unwrap();
    rig.engine.start_run(&run_id).unwrap();

    let outcome = rig.engine.execute_command(&run_id, "probe").await.unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.exit_code, -1);
    assert_eq!(outcome.error.as_deref(), Some("SSH connection failed"));
    assert!(outcome.artifacts.is_empty());

    let events = rig.engine.get_events(&run_id, 0).unwrap();
    // Default retry policy: two retry notices, then the final failure
    assert_eq!(of_type(&events, EventType::ConnectionRetry).len(), 2);

    let lost = of_type(&events, EventType::ConnectionLost);
    assert_eq!(lost.len(), 1);
    let reason = lost[0].data["reason"].as_str().unwrap();
    assert!(reason.contains("failed after 3 attempts"), "reason: {reason}");

    let failed = of_type(&events, EventType::CommandFailed);
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].data["error"], "SSH connection failed");
    assert_eq!(failed[0].data["command_name"], "probe");
}

#[tokio::test]
async fn paused_then_resumed_runs_reuse_the_established_connection() {
    let rig = rig_with_profile("bench", TARGET_PROFILE);

    let run_id = rig.engine.create_run("bench", Some("r4"), None).unwrap();
    rig.engine.start_run(&run_id).unwrap();
    rig.engine.execute_command(&run_id, "probe").await.unwrap();
    assert!(rig.script.is_connected());

    rig.engine.pause_run(&run_id).unwrap();
    // Pause leaves the transport up
    assert!(rig.script.is_connected());

    rig.engine.start_run(&run_id).unwrap();
    rig.engine.execute_command(&run_id, "probe").await.unwrap();

    let events = rig.engine.get_events(&run_id, 0).unwrap();
    // Only the first command had to establish a connection
    assert_eq!(of_type(&events, EventType::ConnectionEstablished).len(), 1);
}
