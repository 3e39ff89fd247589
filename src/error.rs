use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failures that can surface to a caller.
///
/// Per-port network outcomes (refusal, timeout, banner trouble) are not
/// represented here: they are folded into [`crate::types::PortState`].
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("invalid port specification `{token}`: {reason}")]
    Validation { token: String, reason: String },

    #[error("could not resolve target `{target}`: {reason}")]
    TargetResolution { target: String, reason: String },

    #[error("target `{target}` resolved to {addr}, which is not a loopback address (use --allow-remote)")]
    TargetNotLocal { target: String, addr: IpAddr },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("no scan output found in {}", dir.display())]
    NoOutput { dir: PathBuf },

    #[error("prober run failed and no scan output exists in {}: {source}", dir.display())]
    NoFallback {
        dir: PathBuf,
        #[source]
        source: Box<ProbeError>,
    },

    #[error("prober did not finish within {after:?}")]
    TimedOut { after: Duration },

    #[error("prober exited with {status}: {stderr}")]
    ProcessFailed { status: String, stderr: String },
}

impl ProbeError {
    pub fn validation(token: impl Into<String>, reason: impl Into<String>) -> Self {
        ProbeError::Validation {
            token: token.into(),
            reason: reason.into(),
        }
    }

    /// True for errors raised before any probe is scheduled.
    pub fn is_preflight(&self) -> bool {
        matches!(
            self,
            ProbeError::Validation { .. }
                | ProbeError::TargetResolution { .. }
                | ProbeError::TargetNotLocal { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ProbeError>;
