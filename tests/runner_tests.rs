#![cfg(unix)]

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use local_port_prober::latest::{fetch_results, run_with_deadline, RunnerConfig, Source};
use local_port_prober::ProbeError;
use tokio::process::Command;

const ONE_ROW: &str = r#"[{"timestamp":"2025-01-01T00:00:00Z","target":"127.0.0.1","port":22,"state":"open","banner":""}]"#;

fn shell(script: &str, dir: &Path, wait_ms: u64, max_age: Option<Duration>) -> RunnerConfig {
    RunnerConfig {
        program: PathBuf::from("sh"),
        args: vec![OsString::from("-c"), OsString::from(script)],
        output_dir: dir.to_path_buf(),
        wait: Duration::from_millis(wait_ms),
        max_age,
    }
}

#[tokio::test]
async fn deadline_kills_and_reaps_slow_child() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("child.pid");
    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(format!("echo $$ > '{}'; exec sleep 5", pid_file.display()));
    let err = run_with_deadline(cmd, Duration::from_millis(300)).await.unwrap_err();
    assert!(matches!(err, ProbeError::TimedOut { .. }));

    // A killed but unreaped child would linger as a zombie and still accept signal 0.
    let pid = std::fs::read_to_string(&pid_file).unwrap();
    let alive = std::process::Command::new("kill")
        .args(["-0", pid.trim()])
        .stderr(std::process::Stdio::null())
        .status()
        .unwrap();
    assert!(!alive.success(), "child {} still present", pid.trim());
}

#[tokio::test]
async fn nonzero_exit_reports_stderr() {
    let mut cmd = Command::new("sh");
    cmd.args(["-c", "echo bad ports >&2; exit 2"]);
    match run_with_deadline(cmd, Duration::from_secs(5)).await {
        Err(ProbeError::ProcessFailed { stderr, .. }) => assert_eq!(stderr, "bad ports"),
        other => panic!("unexpected: {other:?}"),
    }
}

#[tokio::test]
async fn successful_run_is_generated() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("port_probe_20250101_000000.json");
    let script = format!("printf '%s' '{ONE_ROW}' > '{}'", out.display());
    let outcome = fetch_results(&shell(&script, dir.path(), 5_000, None)).await.unwrap();
    assert_eq!(outcome.source, Source::Generated);
    assert_eq!(outcome.count, 1);
    assert_eq!(outcome.payload[0].port, 22);
    assert!(outcome.note.is_none());
}

#[tokio::test]
async fn timeout_without_any_output_is_hard_failure() {
    let dir = tempfile::tempdir().unwrap();
    let err = fetch_results(&shell("sleep 5", dir.path(), 100, None)).await.unwrap_err();
    match err {
        ProbeError::NoFallback { source, .. } => {
            assert!(matches!(*source, ProbeError::TimedOut { .. }))
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[tokio::test]
async fn failed_run_without_output_keeps_its_stderr() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = shell("echo 'invalid --ports: 70000' >&2; exit 1", dir.path(), 5_000, None);
    let err = fetch_results(&cfg).await.unwrap_err();
    assert!(err.to_string().contains("invalid --ports: 70000"), "{err}");
    let source = std::error::Error::source(&err).expect("run error kept as source");
    assert!(source.to_string().contains("70000"));
}

#[tokio::test]
async fn timeout_falls_back_to_latest_output() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("old.json"), ONE_ROW).unwrap();
    let outcome = fetch_results(&shell("sleep 5", dir.path(), 100, None)).await.unwrap();
    assert_eq!(outcome.source, Source::Cached);
    assert_eq!(outcome.count, 1);
    assert!(outcome.note.unwrap().contains("timed out"));
}

#[tokio::test]
async fn fresh_output_is_reused_without_running() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("recent.json"), ONE_ROW).unwrap();
    // Would fail if it ran.
    let cfg = shell("exit 1", dir.path(), 5_000, Some(Duration::from_secs(3600)));
    let outcome = fetch_results(&cfg).await.unwrap();
    assert_eq!(outcome.source, Source::Cached);
    assert!(outcome.note.is_none());
}

#[tokio::test]
async fn stale_output_is_not_a_fallback() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("stale.json"), ONE_ROW).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let cfg = shell("exit 3", dir.path(), 5_000, Some(Duration::from_millis(10)));
    let err = fetch_results(&cfg).await.unwrap_err();
    assert!(matches!(err, ProbeError::ProcessFailed { .. }));
}
