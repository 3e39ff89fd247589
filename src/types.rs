use std::fmt;

use serde::{Deserialize, Serialize};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

/// Terminal classification of a single port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortState {
    /// Handshake completed. The banner is empty when none was requested or received.
    Open { banner: String },
    /// The peer actively refused the connection.
    Closed,
    /// No determination possible: timeout or any other network failure.
    Filtered,
}

impl PortState {
    pub fn label(&self) -> StateLabel {
        match self {
            PortState::Open { .. } => StateLabel::Open,
            PortState::Closed => StateLabel::Closed,
            PortState::Filtered => StateLabel::Filtered,
        }
    }

    pub fn banner(&self) -> Option<&str> {
        match self {
            PortState::Open { banner } if !banner.is_empty() => Some(banner),
            _ => None,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, PortState::Open { .. })
    }
}

/// Wire representation of [`PortState`] without its payload.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum StateLabel {
    Open,
    Closed,
    Filtered,
}

impl fmt::Display for StateLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StateLabel::Open => "open",
            StateLabel::Closed => "closed",
            StateLabel::Filtered => "filtered",
        })
    }
}

/// Outcome of probing one port. Never mutated after the prober returns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub port: u16,
    pub state: PortState,
    pub captured_at: OffsetDateTime,
}

impl ProbeResult {
    pub fn new(port: u16, state: PortState) -> Self {
        Self {
            port,
            state,
            captured_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn to_record(&self, target: &str) -> OutputRecord {
        OutputRecord {
            timestamp: self
                .captured_at
                .format(&Rfc3339)
                .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z")),
            target: target.to_string(),
            port: self.port,
            state: self.state.label(),
            banner: self.state.banner().unwrap_or_default().to_string(),
        }
    }
}

/// One row of the persisted JSON/CSV output. Field order is the CSV column order.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct OutputRecord {
    pub timestamp: String,
    pub target: String,
    pub port: u16,
    pub state: StateLabel,
    pub banner: String,
}

/// A finished scan: the target and its results, ascending by port.
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub target: String,
    pub started_at: OffsetDateTime,
    pub results: Vec<ProbeResult>,
}

impl ScanReport {
    pub fn records(&self) -> Vec<OutputRecord> {
        self.results
            .iter()
            .map(|r| r.to_record(&self.target))
            .collect()
    }
}
