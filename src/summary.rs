use std::fmt;

use crate::banner::truncate_chars;
use crate::types::{ProbeResult, ScanReport, StateLabel};

/// How many ports each bucket lists.
pub const PREVIEW_PORTS: usize = 20;
/// Banner excerpt length in the summary.
pub const SUMMARY_BANNER_CHARS: usize = 200;
/// Banner excerpt length in live progress lines.
pub const PROGRESS_BANNER_CHARS: usize = 120;

/// Results partitioned by state, for printing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub target: String,
    pub total: usize,
    pub open: Vec<u16>,
    pub closed: Vec<u16>,
    pub filtered: Vec<u16>,
    /// `(port, banner)` for open ports that produced one.
    pub banners: Vec<(u16, String)>,
}

impl Summary {
    pub fn from_report(report: &ScanReport) -> Self {
        let mut s = Summary {
            target: report.target.clone(),
            total: report.results.len(),
            ..Summary::default()
        };
        for r in &report.results {
            match r.state.label() {
                StateLabel::Open => s.open.push(r.port),
                StateLabel::Closed => s.closed.push(r.port),
                StateLabel::Filtered => s.filtered.push(r.port),
            }
            if let Some(b) = r.state.banner() {
                s.banners.push((r.port, b.to_string()));
            }
        }
        s
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Scan summary:")?;
        writeln!(f, "=============")?;
        writeln!(f, "Target: {}", self.target)?;
        writeln!(f, "Total ports scanned: {}", self.total)?;
        writeln!(f, "Open: {} -> {}", self.open.len(), preview(&self.open))?;
        writeln!(
            f,
            "Closed (TCP reset/refused): {} -> {}",
            self.closed.len(),
            preview(&self.closed)
        )?;
        write!(
            f,
            "Filtered/Timeout: {} -> {}",
            self.filtered.len(),
            preview(&self.filtered)
        )?;
        if !self.banners.is_empty() {
            writeln!(f)?;
            writeln!(f)?;
            write!(f, "Detected banners (truncated to {SUMMARY_BANNER_CHARS} chars):")?;
            for (port, banner) in &self.banners {
                write!(f, "\n - {port}: {}", truncate_chars(banner, SUMMARY_BANNER_CHARS))?;
            }
        }
        Ok(())
    }
}

fn preview(ports: &[u16]) -> String {
    let shown: Vec<String> = ports
        .iter()
        .take(PREVIEW_PORTS)
        .map(u16::to_string)
        .collect();
    let more = ports.len().saturating_sub(PREVIEW_PORTS);
    if more > 0 {
        format!("[{}, ... +{more}]", shown.join(", "))
    } else {
        format!("[{}]", shown.join(", "))
    }
}

/// `[done/total] port P -> state | banner: ...` line for live output.
pub fn progress_line(result: &ProbeResult, done: usize, total: usize) -> String {
    let mut line = format!(
        "[{done}/{total}] port {} -> {}",
        result.port,
        result.state.label()
    );
    if let Some(b) = result.state.banner() {
        line.push_str(" | banner: ");
        line.push_str(truncate_chars(b, PROGRESS_BANNER_CHARS));
    }
    line
}
