//! Artifact retrieval specs, driven through target commands.

use crate::prelude::*;
use rig_core::EventType;

const TARGET_PROFILE: &str = r#"
name: bench
connection:
  host: 192.0.2.7
  user: tester
commands:
  pull:
    command: "true"
    run: target
    artifacts:
      - /tmp/{file}
  pull_pair:
    command: "true"
    run: target
    artifacts:
      - /a/x.log
      - /b/x.log
  pull_mixed:
    command: "true"
    run: target
    artifacts:
      - /gone/missing.dat
      - /var/present.log
"#;

#[tokio::test]
async fn target_command_pulls_declared_artifact() {
    let rig = rig_with_profile("bench", TARGET_PROFILE);
    rig.script.add_remote_file("/tmp/data.bin", b"sensor dump");

    let run_id = rig.engine.create_run("bench", Some("a1"), None).unwrap();
    rig.engine.set_parameter(&run_id, "file", "data.bin").unwrap();
    rig.engine.start_run(&run_id).unwrap();

    let outcome = rig.engine.execute_command(&run_id, "pull").await.unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.artifacts.len(), 1);
    assert_eq!(outcome.artifacts[0].remote_path, "/tmp/data.bin");
    assert_eq!(outcome.artifacts[0].local_path, "artifacts/data.bin");
    assert_eq!(outcome.artifacts[0].command, "pull");

    let ctx = rig.engine.get_run(&run_id).unwrap();
    let manifest = ctx.manifest();
    assert_eq!(manifest.artifacts.len(), 1);
    assert_eq!(manifest.artifacts[0].local_path, "artifacts/data.bin");

    let on_disk = ctx.storage().artifact_path("artifacts/data.bin");
    assert_eq!(std::fs::read(on_disk).unwrap(), b"sensor dump");

    let events = rig.engine.get_events(&run_id, 0).unwrap();
    let pull_started = seq_of(&events, EventType::ArtifactPullStarted);
    let pulled = seq_of(&events, EventType::ArtifactPulled);
    assert!(pull_started < pulled);
    let pulled_events = of_type(&events, EventType::ArtifactPulled);
    assert_eq!(pulled_events[0].data["remote_path"], "/tmp/data.bin");
    assert_eq!(pulled_events[0].data["local_path"], "artifacts/data.bin");
    assert_eq!(pulled_events[0].data["command"], "pull");
}

#[tokio::test]
async fn colliding_artifact_names_get_numeric_suffixes() {
    let rig = rig_with_profile("bench", TARGET_PROFILE);
    rig.script.add_remote_file("/a/x.log", b"from a");
    rig.script.add_remote_file("/b/x.log", b"from b");

    let run_id = rig.engine.create_run("bench", Some("a2"), None).unwrap();
    rig.engine.start_run(&run_id).unwrap();

    let outcome = rig
        .engine
        .execute_command(&run_id, "pull_pair")
        .await
        .unwrap();
    assert_eq!(outcome.artifacts.len(), 2);
    assert_eq!(outcome.artifacts[0].local_path, "artifacts/x.log");
    assert_eq!(outcome.artifacts[1].local_path, "artifacts/x_1.log");

    let ctx = rig.engine.get_run(&run_id).unwrap();
    assert_eq!(
        std::fs::read(ctx.storage().artifact_path("artifacts/x.log")).unwrap(),
        b"from a"
    );
    assert_eq!(
        std::fs::read(ctx.storage().artifact_path("artifacts/x_1.log")).unwrap(),
        b"from b"
    );
}

#[tokio::test]
async fn failed_pulls_are_isolated_from_later_ones() {
    let rig = rig_with_profile("bench", TARGET_PROFILE);
    rig.script.add_remote_file("/var/present.log", b"kept");

    let run_id = rig.engine.create_run("bench", Some("a3"), None).unwrap();
    rig.engine.start_run(&run_id).unwrap();

    let outcome = rig
        .engine
        .execute_command(&run_id, "pull_mixed")
        .await
        .unwrap();
    // The command itself succeeded; one of two pulls landed
    assert!(outcome.success);
    assert_eq!(outcome.artifacts.len(), 1);
    assert_eq!(outcome.artifacts[0].remote_path, "/var/present.log");

    let events = rig.engine.get_events(&run_id, 0).unwrap();
    let failed = of_type(&events, EventType::ArtifactPullFailed);
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].data["remote_path"], "/gone/missing.dat");
    let error = failed[0].data["error"].as_str().unwrap();
    assert!(error.contains("not found"), "unexpected error: {error}");

    assert_eq!(of_type(&events, EventType::ArtifactPullStarted).len(), 2);
    assert_eq!(of_type(&events, EventType::ArtifactPulled).len(), 1);
}

#[tokio::test]
async fn artifact_scratch_files_are_cleaned_up() {
    let rig = rig_with_profile("bench", TARGET_PROFILE);
    rig.script.add_remote_file("/tmp/data.bin", b"x");

    let run_id = rig.engine.create_run("bench", Some("a4"), None).unwrap();
    rig.engine.set_parameter(&run_id, "file", "data.bin").unwrap();
    rig.engine.start_run(&run_id).unwrap();
    rig.engine.execute_command(&run_id, "pull").await.unwrap();

    let ctx = rig.engine.get_run(&run_id).unwrap();
    let leftovers: Vec<String> = std::fs::read_dir(ctx.storage().artifacts_dir())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("_temp_"))
        .collect();
    assert!(leftovers.is_empty(), "scratch files left: {leftovers:?}");
}

#[tokio::test]
async fn export_includes_pulled_artifacts() {
    let rig = rig_with_profile("bench", TARGET_PROFILE);
    rig.script.add_remote_file("/tmp/data.bin", b"payload");

    let run_id = rig.engine.create_run("bench", Some("a5"), None).unwrap();
    rig.engine.set_parameter(&run_id, "file", "data.bin").unwrap();
    rig.engine.start_run(&run_id).unwrap();
    rig.engine.execute_command(&run_id, "pull").await.unwrap();
    rig.engine.complete_run(&run_id).await.unwrap();

    let archive_path = rig.engine.export_run(&run_id).unwrap();
    let file = std::fs::File::open(&archive_path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();

    use std::io::Read;
    let mut body = Vec::new();
    archive
        .by_name(&format!("{run_id}/artifacts/data.bin"))
        .unwrap()
        .read_to_end(&mut body)
        .unwrap();
    assert_eq!(body, b"payload");

    // Manifest inside the archive parses and lists the artifact
    let mut manifest_json = String::new();
    archive
        .by_name(&format!("{run_id}/manifest.json"))
        .unwrap()
        .read_to_string(&mut manifest_json)
        .unwrap();
    let manifest = rig_core::RunManifest::from_json(&manifest_json).unwrap();
    assert_eq!(manifest.artifacts.len(), 1);
}
