use std::time::Duration;

use crate::error::{ProbeError, Result};

pub const DEFAULT_CONCURRENCY: usize = 200;
pub const MAX_CONCURRENCY: usize = 5_000;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1500);
pub const DEFAULT_TARGET: &str = "127.0.0.1";

/// Banner collection switches. Only consulted for ports that connected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BannerOptions {
    pub enabled: bool,
    /// Write a bare CRLF before reading.
    pub send_probe: bool,
}

/// Per-invocation scan parameters. Built once, then shared read-only by every task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    pub concurrency: usize,
    pub timeout: Duration,
    pub start_delay_step: Duration,
    pub banner: BannerOptions,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            timeout: DEFAULT_TIMEOUT,
            start_delay_step: Duration::ZERO,
            banner: BannerOptions::default(),
        }
    }
}

impl ScanConfig {
    /// Build from the user-facing second-based values, validating them.
    pub fn from_secs(
        concurrency: usize,
        timeout_secs: f64,
        start_delay_secs: f64,
        banner: BannerOptions,
    ) -> Result<Self> {
        let timeout = Duration::try_from_secs_f64(timeout_secs)
            .ok()
            .filter(|d| !d.is_zero())
            .ok_or_else(|| {
                ProbeError::validation(
                    timeout_secs.to_string(),
                    "timeout must be a positive number of seconds",
                )
            })?;
        let start_delay_step = Duration::try_from_secs_f64(start_delay_secs).map_err(|_| {
            ProbeError::validation(
                start_delay_secs.to_string(),
                "start delay must be a non-negative number of seconds",
            )
        })?;
        Ok(Self {
            concurrency: concurrency.clamp(1, MAX_CONCURRENCY),
            timeout,
            start_delay_step,
            banner,
        })
    }

    /// Bound for each banner-phase operation: `min(1s, timeout)`.
    pub fn banner_timeout(&self) -> Duration {
        self.timeout.min(Duration::from_secs(1))
    }

    /// Stagger applied to the task at `index` before it competes for capacity.
    pub fn start_delay(&self, index: usize) -> Duration {
        self.start_delay_step
            .saturating_mul(u32::try_from(index).unwrap_or(u32::MAX))
    }
}
