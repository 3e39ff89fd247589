use local_port_prober::output::{read_json, write_outputs};
use local_port_prober::types::{PortState, ProbeResult, ScanReport, StateLabel};
use time::macros::datetime;
use time::OffsetDateTime;

fn sample_report() -> ScanReport {
    ScanReport {
        target: "127.0.0.1".into(),
        started_at: OffsetDateTime::now_utc(),
        results: vec![
            ProbeResult::new(
                22,
                PortState::Open {
                    banner: "SSH-2.0-OpenSSH, \"quoted\"\nsecond line".into(),
                },
            ),
            ProbeResult::new(23, PortState::Closed),
            ProbeResult::new(9999, PortState::Filtered),
        ],
    }
}

#[test]
fn json_and_csv_are_synchronized() {
    let dir = tempfile::tempdir().unwrap();
    let prefix = dir.path().join("nested").join("local_scan");
    let at = datetime!(2025-01-02 03:04:05 UTC);

    let written = write_outputs(&sample_report(), prefix.to_str().unwrap(), at).unwrap();
    assert!(written.json.ends_with("nested/local_scan_20250102_030405.json"));
    assert!(written.csv.ends_with("nested/local_scan_20250102_030405.csv"));

    let json = read_json(&written.json).unwrap();
    assert_eq!(json.len(), 3);
    assert_eq!(json.iter().map(|r| r.port).collect::<Vec<_>>(), vec![22, 23, 9999]);
    assert_eq!(
        json.iter().map(|r| r.state).collect::<Vec<_>>(),
        vec![StateLabel::Open, StateLabel::Closed, StateLabel::Filtered]
    );
    assert!(json.iter().all(|r| r.target == "127.0.0.1"));
    assert_eq!(json[1].banner, "");

    let mut rdr = csv::Reader::from_path(&written.csv).unwrap();
    let headers = rdr.headers().unwrap().clone();
    assert_eq!(
        headers.iter().collect::<Vec<_>>(),
        vec!["timestamp", "target", "port", "state", "banner"]
    );
    let rows: Vec<csv::StringRecord> = rdr.records().map(Result::unwrap).collect();
    assert_eq!(rows.len(), json.len());
    for (row, rec) in rows.iter().zip(&json) {
        assert_eq!(&row[0], rec.timestamp);
        assert_eq!(&row[2], rec.port.to_string());
        assert_eq!(&row[3], rec.state.to_string());
        assert_eq!(&row[4], rec.banner);
    }
}

#[test]
fn json_schema_is_flat_objects() {
    let dir = tempfile::tempdir().unwrap();
    let prefix = dir.path().join("scan");
    let written = write_outputs(&sample_report(), prefix.to_str().unwrap(), OffsetDateTime::now_utc()).unwrap();

    let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&written.json).unwrap()).unwrap();
    let first = &raw.as_array().unwrap()[0];
    let mut keys: Vec<_> = first.as_object().unwrap().keys().cloned().collect();
    keys.sort();
    assert_eq!(keys, vec!["banner", "port", "state", "target", "timestamp"]);
    assert_eq!(first["state"], "open");
    assert!(first["port"].is_u64());
}

#[test]
fn empty_scan_still_has_csv_header() {
    let dir = tempfile::tempdir().unwrap();
    let prefix = dir.path().join("empty");
    let report = ScanReport {
        target: "localhost".into(),
        started_at: OffsetDateTime::now_utc(),
        results: Vec::new(),
    };
    let written = write_outputs(&report, prefix.to_str().unwrap(), OffsetDateTime::now_utc()).unwrap();
    let csv = std::fs::read_to_string(&written.csv).unwrap();
    assert_eq!(csv.trim_end(), "timestamp,target,port,state,banner");
    assert!(read_json(&written.json).unwrap().is_empty());
}
