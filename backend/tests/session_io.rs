//! End-to-end session tests against a scripted stand-in subprocess.
//!
//! The stand-in speaks the interactive wire protocol: prefixed reply
//! lines, `O: OK` terminators, `NG` failures and the EOT-terminated
//! file upload. Unix only, since the stand-in is a shell script.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::Arc;

use hsmod_backend::{BackendConfig, Launcher, Session};

const FAKE_TOOL: &str = r#"#!/bin/sh
EOT=$(printf '\004')
echo "stand-in starting" >&2
while IFS= read -r line; do
  case "$line" in
    "") exit 0 ;;
    map-file*)
      while IFS= read -r body; do
        [ "$body" = "$EOT" ] && break
      done
      echo "O: OK" ;;
    unmap-file*) echo "O: OK" ;;
    check*)
      echo "O: Foo.hs:3:7: Warning: x shadows y"
      echo "X: some chatter"
      echo "O: OK" ;;
    fail*) echo "NG failed to run" ;;
    garbage*) echo "!! not a protocol line" ;;
    echo*)
      echo "O: ${line#echo }"
      echo "O: OK" ;;
    *) echo "O: OK" ;;
  esac
done
"#;

/// Install the stand-in as `ghc-mod` in a fresh directory and build a
/// launcher whose search path finds only it.
fn fake_tool() -> (tempfile::TempDir, Launcher, PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let tool = dir.path().join("ghc-mod");
    fs::write(&tool, FAKE_TOOL).expect("write stand-in");
    fs::set_permissions(&tool, fs::Permissions::from_mode(0o755)).expect("chmod");

    let config = BackendConfig {
        add_to_path: vec![dir.path().to_path_buf()],
        add_standard_dirs: false,
        ..BackendConfig::default()
    };
    let launcher = Launcher::new(&config);
    let project_dir = dir.path().to_path_buf();
    (dir, launcher, project_dir)
}

#[tokio::test]
async fn check_command_roundtrip() {
    let (_dir, launcher, project_dir) = fake_tool();
    let session = Session::start(&launcher, "proj", &project_dir, &[]).expect("start");

    let reply = session.command("check Foo.hs").await;
    assert_eq!(reply.out(), &["Foo.hs:3:7: Warning: x shadows y".to_string()]);
    assert_eq!(reply.err(), &["some chatter".to_string()]);
    assert!(session.is_alive().await);

    session.shutdown().await;
}

#[tokio::test]
async fn map_and_unmap_complete_cleanly() {
    let (_dir, launcher, project_dir) = fake_tool();
    let session = Session::start(&launcher, "proj", &project_dir, &[]).expect("start");

    let mapped = session
        .map_file("Foo.hs", "module Foo where\n\nmain = ()\n")
        .await;
    assert!(mapped.is_empty());

    let unmapped = session.unmap_file("Foo.hs").await;
    assert!(unmapped.is_empty());

    // The stream is still in sync after the upload sub-protocol.
    let reply = session.command("echo still-here").await;
    assert_eq!(reply.out(), &["still-here".to_string()]);

    session.shutdown().await;
}

#[tokio::test]
async fn tool_failure_keeps_the_session_alive() {
    let (_dir, launcher, project_dir) = fake_tool();
    let session = Session::start(&launcher, "proj", &project_dir, &[]).expect("start");

    let reply = session.command("fail this").await;
    assert!(reply.is_empty());
    assert!(session.is_alive().await);

    let reply = session.command("echo recovered").await;
    assert_eq!(reply.out(), &["recovered".to_string()]);

    session.shutdown().await;
}

#[tokio::test]
async fn protocol_violation_shuts_the_session_down() {
    let (_dir, launcher, project_dir) = fake_tool();
    let session = Session::start(&launcher, "proj", &project_dir, &[]).expect("start");

    let reply = session.command("garbage").await;
    assert!(reply.is_empty());
    assert!(!session.is_alive().await);

    // Degraded mode from here on.
    assert!(session.command("echo anything").await.is_empty());
}

#[tokio::test]
async fn shutdown_is_clean_and_idempotent() {
    let (_dir, launcher, project_dir) = fake_tool();
    let session = Session::start(&launcher, "proj", &project_dir, &[]).expect("start");
    assert!(session.is_alive().await);

    session.shutdown().await;
    assert!(!session.is_alive().await);
    session.shutdown().await;
}

#[tokio::test]
async fn concurrent_commands_get_their_own_replies() {
    let (_dir, launcher, project_dir) = fake_tool();
    let session = Arc::new(Session::start(&launcher, "proj", &project_dir, &[]).expect("start"));

    let mut tasks = Vec::new();
    for tag in ["alpha", "bravo", "charlie", "delta"] {
        let session = session.clone();
        tasks.push(tokio::spawn(async move {
            for _ in 0..5 {
                let reply = session.command(&format!("echo {tag}")).await;
                assert_eq!(reply.out(), &[tag.to_string()]);
            }
        }));
    }
    for task in tasks {
        task.await.expect("task");
    }

    session.shutdown().await;
}

#[tokio::test]
async fn unlaunchable_tool_is_a_startup_error() {
    // Resolution or spawn fails in a directory that does not exist,
    // whether or not a real tool is installed on this machine.
    let launcher = Launcher::new(&BackendConfig::default());
    let err = Session::start(&launcher, "proj", std::path::Path::new("/no/such/project"), &[]);
    assert!(err.is_err());
}
