use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use time::macros::format_description;
use time::OffsetDateTime;

use crate::error::Result;
use crate::types::{OutputRecord, ScanReport};

/// Paths of the two artifacts written for one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenOutputs {
    pub json: PathBuf,
    pub csv: PathBuf,
}

/// `{prefix}_{YYYYMMDD_HHMMSS}` for the given run time.
///
/// Two runs within the same second share a stem and the later one overwrites.
pub fn output_stem(prefix: &str, run_at: OffsetDateTime) -> String {
    let fmt = format_description!("[year][month][day]_[hour][minute][second]");
    let ts = run_at
        .format(fmt)
        .unwrap_or_else(|_| String::from("19700101_000000"));
    format!("{prefix}_{ts}")
}

/// Write the report as `<stem>.json` and `<stem>.csv`, creating parent
/// directories of the prefix when needed.
pub fn write_outputs(report: &ScanReport, prefix: &str, run_at: OffsetDateTime) -> Result<WrittenOutputs> {
    let stem = output_stem(prefix, run_at);
    let json = PathBuf::from(format!("{stem}.json"));
    let csv = PathBuf::from(format!("{stem}.csv"));
    if let Some(parent) = json.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let records = report.records();
    write_json(&json, &records)?;
    write_csv(&csv, &records)?;
    tracing::info!(json = %json.display(), csv = %csv.display(), rows = records.len(), "results written");
    Ok(WrittenOutputs { json, csv })
}

pub fn write_json(path: &Path, records: &[OutputRecord]) -> Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut w, records)?;
    w.write_all(b"\n")?;
    w.flush()?;
    Ok(())
}

pub fn write_csv(path: &Path, records: &[OutputRecord]) -> Result<()> {
    let mut w = csv::Writer::from_path(path)?;
    if records.is_empty() {
        w.write_record(["timestamp", "target", "port", "state", "banner"])?;
    }
    for r in records {
        w.serialize(r)?;
    }
    w.flush()?;
    Ok(())
}

/// Read back a JSON output file.
pub fn read_json(path: &Path) -> Result<Vec<OutputRecord>> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn stem_has_second_granularity() {
        let at = datetime!(2024-03-05 07:08:09 UTC);
        assert_eq!(output_stem("out/scan", at), "out/scan_20240305_070809");
    }
}
