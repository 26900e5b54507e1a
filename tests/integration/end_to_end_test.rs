//! End-to-End Tests
//!
//! Runs the real tokio process runner against a shell script that mimics the
//! coverage CLI: `run` leaves a measurement file in the working directory and
//! `report` prints a table from it.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use coverage_panel::{
    AnalysisConfig, AnalysisEvent, AnalysisFailure, AnalysisSession, Phase, ResultStore,
    ToolInfo, ToolLocator, TokioProcessRunner,
};

use crate::support::{events_until, python_file};

const FAKE_TOOL: &str = r#"#!/bin/sh
case "$1" in
  --version)
    echo "Coverage.py, version 7.4.0 with C extension"
    ;;
  run)
    case "$2" in
      *broken.py)
        echo "Traceback (most recent call last):" >&2
        exit 1
        ;;
      *slow.py)
        exec sleep 30
        ;;
      *daemon.py)
        sleep 6 &
        ;;
    esac
    echo "running $2"
    echo "$2" > .fake_coverage
    ;;
  report)
    if [ ! -f .fake_coverage ]; then
      echo "No data to report." >&2
      exit 1
    fi
    echo "Name      Stmts   Miss  Cover"
    echo "$(basename "$(cat .fake_coverage)")   4      1    75%"
    ;;
esac
"#;

fn install_fake_tool(dir: &Path) -> PathBuf {
    let path = dir.join("coverage");
    fs::write(&path, FAKE_TOOL).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn real_session(tools: &TempDir, data: &TempDir) -> AnalysisSession {
    let tool = install_fake_tool(tools.path());
    let store = ResultStore::new(data.path().join("coverage.results.json"), 10);
    let runner = TokioProcessRunner::new().with_kill_grace(Duration::from_secs(2));
    AnalysisSession::new(
        AnalysisConfig::default(),
        Some(ToolInfo::new("coverage", tool).with_version("7.4.0")),
        store,
        Arc::new(runner),
    )
}

#[tokio::test]
async fn test_analyze_real_processes() {
    let tools = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    let target = python_file(project.path(), "sample.py");

    let session = real_session(&tools, &data);
    let mut events = session.subscribe();
    session.analyze(&target).await.unwrap();

    let seen = events_until(&mut events, |e| {
        matches!(e, AnalysisEvent::ResultReady { .. }) || e.is_error()
    })
    .await;
    assert_eq!(
        seen.last(),
        Some(&AnalysisEvent::ResultReady {
            path: target.clone()
        })
    );

    let stored = session.get_result(&target).await.unwrap();
    assert!(stored.report.starts_with("Name      Stmts   Miss  Cover\n"));
    assert!(stored.report.contains("sample.py"));
    // The execute phase ran inside the project directory
    assert!(project.path().join(".fake_coverage").is_file());

    let reloaded = ResultStore::load(data.path().join("coverage.results.json"), 10);
    assert_eq!(reloaded.get(&target).unwrap().report, stored.report);
}

#[tokio::test]
async fn test_script_failure_surfaces_report_diagnostic() {
    let tools = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    let target = python_file(project.path(), "broken.py");

    let session = real_session(&tools, &data);
    let mut events = session.subscribe();
    session.analyze(&target).await.unwrap();

    let seen = events_until(&mut events, |e| e.is_error()).await;
    // Report still ran after the failing execute phase
    assert!(seen.contains(&AnalysisEvent::PhaseStarted {
        path: target.clone(),
        phase: Phase::Report
    }));
    match seen.last() {
        Some(AnalysisEvent::Error(AnalysisFailure::RuntimeFailure { diagnostic })) => {
            assert_eq!(diagnostic, "No data to report.\n");
        }
        other => panic!("unexpected event: {:?}", other),
    }
    assert!(session.get_result(&target).await.is_none());
}

#[tokio::test]
async fn test_background_child_does_not_hold_session() {
    let tools = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    let target = python_file(project.path(), "daemon.py");

    let session = real_session(&tools, &data);
    let mut events = session.subscribe();
    let started = std::time::Instant::now();
    session.analyze(&target).await.unwrap();

    let seen = events_until(&mut events, |e| {
        matches!(e, AnalysisEvent::ResultReady { .. }) || e.is_error()
    })
    .await;
    assert!(started.elapsed() < Duration::from_secs(4));
    assert_eq!(
        seen.last(),
        Some(&AnalysisEvent::ResultReady {
            path: target.clone()
        })
    );
    assert!(!session.is_running());
}

#[tokio::test]
async fn test_stop_kills_real_process() {
    let tools = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    let target = python_file(project.path(), "slow.py");

    let session = real_session(&tools, &data);
    let mut events = session.subscribe();
    session.analyze(&target).await.unwrap();
    events_until(&mut events, |e| matches!(e, AnalysisEvent::PhaseStarted { .. })).await;

    let started = std::time::Instant::now();
    assert!(session.stop().await);
    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(!session.is_running());
    assert!(session.get_result(&target).await.is_none());
}

#[tokio::test]
async fn test_probe_version_of_fake_tool() {
    let tools = TempDir::new().unwrap();
    let tool = install_fake_tool(tools.path());

    let version = ToolLocator::new().probe_version(&tool).await;
    assert_eq!(version.as_deref(), Some("7.4.0"));
}
