//! Caller side of the prober: run it as a subprocess under a deadline and
//! fall back to the newest output file when the run does not complete.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, SystemTime};

use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::time;

use crate::error::{ProbeError, Result};
use crate::output::read_json;
use crate::types::OutputRecord;

/// Newest output file in a directory and how old it is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestOutput {
    pub path: PathBuf,
    pub age: Duration,
}

/// Find the most recently modified `*.{extension}` file in `dir`.
///
/// A missing directory counts as "no output", not as an error.
pub fn latest_output(dir: &Path, extension: &str) -> Result<Option<LatestOutput>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut newest: Option<(SystemTime, PathBuf)> = None;
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(extension) {
            continue;
        }
        let meta = entry.metadata()?;
        if !meta.is_file() {
            continue;
        }
        let modified = meta.modified()?;
        if newest.as_ref().map_or(true, |(t, _)| modified > *t) {
            newest = Some((modified, path));
        }
    }

    Ok(newest.map(|(modified, path)| LatestOutput {
        path,
        age: SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO),
    }))
}

/// Load the records of the newest JSON output in `dir`. No file at all is an error.
pub fn load_latest_results(dir: &Path) -> Result<(PathBuf, Vec<OutputRecord>)> {
    let latest = latest_output(dir, "json")?.ok_or_else(|| ProbeError::NoOutput {
        dir: dir.to_path_buf(),
    })?;
    let records = read_json(&latest.path)?;
    Ok((latest.path, records))
}

/// Run `cmd` to completion. If it is still running after `wait` it is killed
/// and reaped before `TimedOut` is returned.
pub async fn run_with_deadline(mut cmd: Command, wait: Duration) -> Result<()> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    let mut child = cmd.spawn()?;

    // Drain both pipes alongside the wait so a chatty child cannot block on a full pipe.
    let stdout = tokio::spawn(drain(child.stdout.take()));
    let stderr = tokio::spawn(drain(child.stderr.take()));

    let waited = time::timeout(wait, child.wait()).await;
    let status = match waited {
        Ok(status) => status?,
        Err(_) => {
            if let Err(e) = child.kill().await {
                tracing::warn!("failed to kill timed-out prober: {e}");
            }
            return Err(ProbeError::TimedOut { after: wait });
        }
    };

    if !status.success() {
        let stderr = String::from_utf8_lossy(&stderr.await.unwrap_or_default())
            .trim()
            .to_string();
        let stdout = String::from_utf8_lossy(&stdout.await.unwrap_or_default())
            .trim()
            .to_string();
        let detail = [stderr, stdout]
            .into_iter()
            .find(|s| !s.is_empty())
            .unwrap_or_else(|| "unknown error".to_string());
        return Err(ProbeError::ProcessFailed {
            status: status.to_string(),
            stderr: detail,
        });
    }
    Ok(())
}

async fn drain<R>(pipe: Option<R>) -> Vec<u8>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf).await;
    }
    buf
}

/// How to invoke the prober and where its outputs land.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub output_dir: PathBuf,
    pub wait: Duration,
    /// Reuse (or fall back to) outputs no older than this. `None` means any age
    /// is acceptable for fallback and nothing is reused up front.
    pub max_age: Option<Duration>,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Generated,
    Cached,
}

#[derive(Serialize, Debug, Clone)]
pub struct FetchOutcome {
    pub source: Source,
    pub payload_path: PathBuf,
    pub count: usize,
    pub payload: Vec<OutputRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Produce scan results: reuse a fresh output, else run the prober, else fall
/// back to the newest output within the staleness window.
pub async fn fetch_results(cfg: &RunnerConfig) -> Result<FetchOutcome> {
    let fresh = |latest: &LatestOutput| cfg.max_age.map_or(true, |max| latest.age <= max);

    if cfg.max_age.is_some() {
        if let Some(latest) = latest_output(&cfg.output_dir, "json")?.filter(|l| fresh(l)) {
            tracing::info!(path = %latest.path.display(), age_s = latest.age.as_secs_f64(), "reusing cached output");
            return outcome(Source::Cached, &latest.path, None);
        }
    }

    let mut cmd = Command::new(&cfg.program);
    cmd.args(&cfg.args);
    match run_with_deadline(cmd, cfg.wait).await {
        Ok(()) => {
            tracing::info!("prober finished");
            let (path, payload) = load_latest_results(&cfg.output_dir)?;
            Ok(FetchOutcome {
                source: Source::Generated,
                payload_path: path,
                count: payload.len(),
                payload,
                note: None,
            })
        }
        Err(run_err) => {
            tracing::warn!("prober run failed: {run_err}; trying latest output");
            let Some(latest) = latest_output(&cfg.output_dir, "json")? else {
                return Err(ProbeError::NoFallback {
                    dir: cfg.output_dir.clone(),
                    source: Box::new(run_err),
                });
            };
            if !fresh(&latest) {
                return Err(run_err);
            }
            let note = match run_err {
                ProbeError::TimedOut { .. } => "prober timed out; using latest output".to_string(),
                other => format!("prober failed ({other}); using latest output"),
            };
            outcome(Source::Cached, &latest.path, Some(note))
        }
    }
}

fn outcome(source: Source, path: &Path, note: Option<String>) -> Result<FetchOutcome> {
    let payload = read_json(path)?;
    Ok(FetchOutcome {
        source,
        payload_path: path.to_path_buf(),
        count: payload.len(),
        payload,
        note,
    })
}
