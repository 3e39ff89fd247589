use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ProbeError, Result};

/// Where the ports for a scan come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortSelection {
    /// The built-in common ports list.
    Defaults,
    /// Comma-separated ports and ranges, e.g. `22,80,8000-8010`.
    Spec(String),
    /// A ports file: one spec per line, `#` comments allowed.
    File(PathBuf),
    /// Ports `1..=n`.
    FirstN(u32),
}

/// The list used when no explicit ports are requested.
///
/// Injected into [`resolve`] rather than read from a global so callers (and
/// tests) can swap it out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultPorts(Vec<u16>);

impl DefaultPorts {
    pub fn new(ports: impl IntoIterator<Item = u16>) -> Self {
        Self(ports.into_iter().collect())
    }

    pub fn as_slice(&self) -> &[u16] {
        &self.0
    }
}

impl Default for DefaultPorts {
    fn default() -> Self {
        const COMMON: &[u16] = &[
            20, 21, 22, 23, 25, 53, 67, 68, 69, 80, 110, 111, 123, 135, 137, 138, 139, 143, 161,
            389, 443, 445, 465, 514, 520, 587, 631, 636, 993, 995, 1080, 1433, 1521, 1723, 2049,
            2121, 3306, 3389, 3690, 4444, 4899, 5000, 5060, 5432, 5900, 6000, 6379, 8080, 8443,
            9000, 9090,
        ];
        Self(COMMON.to_vec())
    }
}

/// Resolve a selection into a deduplicated, ascending port list.
///
/// Fails on the first invalid token, and on a selection that yields no ports.
pub fn resolve(selection: &PortSelection, defaults: &DefaultPorts) -> Result<Vec<u16>> {
    let ports = match selection {
        PortSelection::Defaults => defaults.as_slice().iter().copied().collect(),
        PortSelection::Spec(spec) => parse_port_spec(spec)?,
        PortSelection::File(path) => load_ports_from_path(path)?,
        PortSelection::FirstN(n) => first_n(*n)?,
    };
    let ports: Vec<u16> = ports
        .into_iter()
        .filter(|p| *p != 0)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    if ports.is_empty() {
        return Err(ProbeError::validation(
            describe(selection),
            "selection contains no ports",
        ));
    }
    Ok(ports)
}

/// Parse a comma-separated spec of single ports and inclusive `lo-hi` ranges.
///
/// Whitespace around tokens is ignored and empty tokens are skipped, so a
/// trailing comma is fine. The result is sorted and duplicate-free.
pub fn parse_port_spec(spec: &str) -> Result<Vec<u16>> {
    let mut out = BTreeSet::new();
    insert_spec(spec, &mut out)?;
    Ok(out.into_iter().collect())
}

/// Parse a ports file: one spec per line, everything after `#` ignored.
pub fn parse_ports_str(s: &str) -> Result<Vec<u16>> {
    let mut out = BTreeSet::new();
    for (idx, raw_line) in s.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.split('#').next().map(str::trim).unwrap_or("");
        if line.is_empty() {
            continue;
        }
        insert_spec(line, &mut out).map_err(|e| match e {
            ProbeError::Validation { token, reason } => ProbeError::Validation {
                token,
                reason: format!("line {line_no}: {reason}"),
            },
            other => other,
        })?;
    }
    Ok(out.into_iter().collect())
}

/// Load a ports list from a file path. Errors if the file cannot be read or parsed.
pub fn load_ports_from_path(path: impl AsRef<Path>) -> Result<Vec<u16>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
        ProbeError::validation(path.display().to_string(), format!("cannot read ports file: {e}"))
    })?;
    parse_ports_str(&content)
}

fn first_n(n: u32) -> Result<Vec<u16>> {
    if n == 0 || n > u32::from(u16::MAX) {
        return Err(ProbeError::validation(
            n.to_string(),
            "port count must be between 1 and 65535",
        ));
    }
    Ok((1..=n as u16).collect())
}

fn insert_spec(spec: &str, out: &mut BTreeSet<u16>) -> Result<()> {
    for token in spec.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if let Some((lo, hi)) = token.split_once('-') {
            let lo = parse_port_str(lo.trim(), token)?;
            let hi = parse_port_str(hi.trim(), token)?;
            if lo > hi {
                return Err(ProbeError::validation(
                    token,
                    format!("range start {lo} is greater than end {hi}"),
                ));
            }
            out.extend(lo..=hi);
        } else {
            out.insert(parse_port_str(token, token)?);
        }
    }
    Ok(())
}

fn parse_port_str(s: &str, token: &str) -> Result<u16> {
    let val: u32 = s
        .parse()
        .map_err(|_| ProbeError::validation(token, format!("`{s}` is not a port number")))?;
    if val == 0 || val > 65535 {
        return Err(ProbeError::validation(
            token,
            format!("port out of range: {val}"),
        ));
    }
    Ok(val as u16)
}

fn describe(selection: &PortSelection) -> String {
    match selection {
        PortSelection::Defaults => "<defaults>".to_string(),
        PortSelection::Spec(s) => s.clone(),
        PortSelection::File(p) => p.display().to_string(),
        PortSelection::FirstN(n) => n.to_string(),
    }
}
