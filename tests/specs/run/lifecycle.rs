//! Run lifecycle and host command execution specs.

use crate::prelude::*;
use rig_core::{EventType, RunStatus};
use std::collections::HashMap;

const HOST_PROFILE: &str = r#"
name: bench
description: Host-only bench profile
connection:
  host: 192.0.2.7
commands:
  cmd_a:
    description: Emit a greeting
    command: echo hello
  greet:
    command: echo {who}
  flaky:
    command: echo bad >&2; exit 7
  slow:
    command: sleep 3
    timeout: 1
"#;

#[tokio::test]
async fn host_command_success_end_to_end() {
    let rig = rig_with_profile("bench", HOST_PROFILE);
    let run_id = rig.engine.create_run("bench", Some("s1"), None).unwrap();
    rig.engine.start_run(&run_id).unwrap();

    let outcome = rig.engine.execute_command(&run_id, "cmd_a").await.unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.exit_code, 0);
    assert_eq!(outcome.stdout, "hello\n");
    assert!(outcome.artifacts.is_empty());
    assert!(outcome.duration >= 0.0);

    let events = rig.engine.get_events(&run_id, 0).unwrap();
    assert_eq!(
        event_types(&events),
        ["run_created", "run_started", "command_started", "command_completed"]
    );
    assert_eq!(events[2].data["command_name"], "cmd_a");
    assert_eq!(events[2].data["run_location"], "host");
    assert_eq!(events[2].data["description"], "Emit a greeting");
    assert_eq!(events[3].data["exit_code"], 0);
    assert_eq!(events[3].data["stdout"], "hello\n");
}

#[tokio::test]
async fn parameters_substitute_into_commands() {
    let rig = rig_with_profile("bench", HOST_PROFILE);
    let mut params = HashMap::new();
    params.insert("who".to_string(), "world".to_string());

    let run_id = rig
        .engine
        .create_run("bench", Some("s2"), Some(params))
        .unwrap();
    rig.engine.start_run(&run_id).unwrap();

    let outcome = rig.engine.execute_command(&run_id, "greet").await.unwrap();
    assert_eq!(outcome.stdout, "world\n");

    // The substituted command string is what the event records
    let events = rig.engine.get_events(&run_id, 0).unwrap();
    let completed = of_type(&events, EventType::CommandCompleted);
    assert_eq!(completed[0].data["command"], "echo world");
}

#[tokio::test]
async fn parameters_set_later_take_effect() {
    let rig = rig_with_profile("bench", HOST_PROFILE);
    let run_id = rig.engine.create_run("bench", Some("s3"), None).unwrap();
    rig.engine.start_run(&run_id).unwrap();

    // Unset parameter: the placeholder stays verbatim
    let outcome = rig.engine.execute_command(&run_id, "greet").await.unwrap();
    assert_eq!(outcome.stdout, "{who}\n");

    rig.engine.set_parameter(&run_id, "who", "rig").unwrap();
    let outcome = rig.engine.execute_command(&run_id, "greet").await.unwrap();
    assert_eq!(outcome.stdout, "rig\n");
}

#[tokio::test]
async fn failed_commands_are_recorded_not_fatal() {
    let rig = rig_with_profile("bench", HOST_PROFILE);
    let run_id = rig.engine.create_run("bench", Some("s4"), None).unwrap();
    rig.engine.start_run(&run_id).unwrap();

    let outcome = rig.engine.execute_command(&run_id, "flaky").await.unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.exit_code, 7);
    assert_eq!(outcome.stderr, "bad\n");

    let events = rig.engine.get_events(&run_id, 0).unwrap();
    let failed = of_type(&events, EventType::CommandFailed);
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].data["exit_code"], 7);

    // The run is still usable
    let outcome = rig.engine.execute_command(&run_id, "cmd_a").await.unwrap();
    assert!(outcome.success);
}

#[tokio::test]
async fn timeouts_read_as_minus_one_with_marker() {
    let rig = rig_with_profile("bench", HOST_PROFILE);
    let run_id = rig.engine.create_run("bench", Some("s5"), None).unwrap();
    rig.engine.start_run(&run_id).unwrap();

    let outcome = rig.engine.execute_command(&run_id, "slow").await.unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.exit_code, -1);
    assert_eq!(outcome.stderr, "Command timed out after 1s");
}

#[tokio::test]
async fn resume_emits_run_resumed_not_run_started() {
    let rig = rig_with_profile("bench", HOST_PROFILE);
    let run_id = rig.engine.create_run("bench", Some("s6"), None).unwrap();

    rig.engine.start_run(&run_id).unwrap();
    rig.engine.pause_run(&run_id).unwrap();

    let ctx = rig.engine.get_run(&run_id).unwrap();
    assert_eq!(ctx.manifest().status, RunStatus::Paused);
    assert!(ctx.is_paused());

    rig.engine.start_run(&run_id).unwrap();
    let ctx = rig.engine.get_run(&run_id).unwrap();
    assert_eq!(ctx.manifest().status, RunStatus::Running);
    assert!(ctx.is_running());

    let events = rig.engine.get_events(&run_id, 0).unwrap();
    assert_eq!(
        event_types(&events),
        ["run_created", "run_started", "run_paused", "run_resumed"]
    );
}

#[tokio::test]
async fn completed_runs_have_ordered_timestamps() {
    let rig = rig_with_profile("bench", HOST_PROFILE);
    let run_id = rig.engine.create_run("bench", Some("s7"), None).unwrap();
    rig.engine.start_run(&run_id).unwrap();
    rig.engine.complete_run(&run_id).await.unwrap();

    let manifest = rig.engine.get_run(&run_id).unwrap().manifest();
    assert_eq!(manifest.status, RunStatus::Completed);
    let started_at = manifest.started_at.unwrap();
    let completed_at = manifest.completed_at.unwrap();
    assert!(manifest.created_at <= started_at);
    assert!(started_at <= completed_at);

    // Idempotent: completing again appends nothing
    rig.engine.complete_run(&run_id).await.unwrap();
    let events = rig.engine.get_events(&run_id, 0).unwrap();
    assert_eq!(of_type(&events, EventType::RunCompleted).len(), 1);
}

#[tokio::test]
async fn manifest_on_disk_always_matches_memory() {
    let rig = rig_with_profile("bench", HOST_PROFILE);
    let run_id = rig.engine.create_run("bench", Some("s8"), None).unwrap();

    for step in 0..3 {
        match step {
            0 => rig.engine.start_run(&run_id).unwrap(),
            1 => rig
                .engine
                .set_parameter(&run_id, "who", "anyone")
                .unwrap(),
            _ => rig.engine.pause_run(&run_id).unwrap(),
        }
        let ctx = rig.engine.get_run(&run_id).unwrap();
        let on_disk = ctx.storage().load_manifest().unwrap();
        assert_eq!(on_disk, ctx.manifest());
    }
}

#[tokio::test]
async fn events_are_gapless_and_ordered_across_operations() {
    let rig = rig_with_profile("bench", HOST_PROFILE);
    let run_id = rig.engine.create_run("bench", Some("s9"), None).unwrap();
    rig.engine.start_run(&run_id).unwrap();
    rig.engine.execute_command(&run_id, "cmd_a").await.unwrap();
    rig.engine.add_note(&run_id, "mid-run note").unwrap();
    rig.engine.execute_command(&run_id, "flaky").await.unwrap();
    rig.engine.complete_run(&run_id).await.unwrap();

    let events = rig.engine.get_events(&run_id, 0).unwrap();
    for (idx, event) in events.iter().enumerate() {
        assert_eq!(event.seq, idx as u64 + 1);
    }

    // after_seq slices the same ordering
    let tail = rig.engine.get_events(&run_id, 3).unwrap();
    assert_eq!(tail[0].seq, 4);
    assert_eq!(tail.len(), events.len() - 3);
}

#[tokio::test]
async fn list_runs_reports_newest_first() {
    let rig = rig_with_profile("bench", HOST_PROFILE);
    let first = rig.engine.create_run("bench", Some("aa"), None).unwrap();
    let second = rig.engine.create_run("bench", Some("bb"), None).unwrap();

    let runs = rig.engine.list_runs().unwrap();
    assert_eq!(runs.len(), 2);
    let ids: Vec<&str> = runs.iter().map(|r| r.run_id.as_str()).collect();
    assert!(ids.contains(&first.as_str()));
    assert!(ids.contains(&second.as_str()));
    // created_at descending
    assert!(runs[0].created_at >= runs[1].created_at);
}
