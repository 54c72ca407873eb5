use permitwalk_core::{Error, Record, Result};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Where batch results go.
pub trait RecordSink: Send {
    fn record(&mut self, record: &Record) -> Result<()>;
    fn failure(&mut self, permit: &str, error: &Error) -> Result<()>;
}

#[derive(Debug, Serialize)]
struct FailureLine<'a> {
    permit: &'a str,
    error: String,
}

/// One JSON object per line: records in one file, failed identifiers in another.
/// Both files are truncated when the sink is created.
pub struct JsonlSink {
    records: File,
    failures: File,
    records_path: PathBuf,
    failures_path: PathBuf,
}

impl JsonlSink {
    pub fn create(records_path: &Path, failures_path: &Path) -> Result<Self> {
        Ok(Self {
            records: open_truncated(records_path)?,
            failures: open_truncated(failures_path)?,
            records_path: records_path.to_path_buf(),
            failures_path: failures_path.to_path_buf(),
        })
    }

    pub fn records_path(&self) -> &Path {
        &self.records_path
    }

    pub fn failures_path(&self) -> &Path {
        &self.failures_path
    }
}

fn open_truncated(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?)
}

impl RecordSink for JsonlSink {
    fn record(&mut self, record: &Record) -> Result<()> {
        let json = serde_json::to_string(record)?;
        writeln!(self.records, "{}", json)?;
        Ok(())
    }

    fn failure(&mut self, permit: &str, error: &Error) -> Result<()> {
        let line = FailureLine {
            permit,
            error: error.to_string(),
        };
        let json = serde_json::to_string(&line)?;
        writeln!(self.failures, "{}", json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use permitwalk_core::{RowMap, TabKind};
    use tempfile::TempDir;

    #[test]
    fn test_writes_one_line_per_result() {
        let dir = TempDir::new().unwrap();
        let records = dir.path().join("out").join("permits.jsonl");
        let failures = dir.path().join("out").join("failures.jsonl");
        let mut sink = JsonlSink::create(&records, &failures).unwrap();

        let mut record = Record::new("BP-1");
        record.detail.insert("permit_status", "ISSUED");
        let mut row = RowMap::new();
        row.insert("Fee", "50.00");
        record.rows_mut(TabKind::Fees).push(row);

        sink.record(&record).unwrap();
        sink.record(&Record::new("BP-2")).unwrap();
        sink.failure("BP-3", &Error::SessionProtocol("no track id".to_string()))
            .unwrap();

        let written = std::fs::read_to_string(&records).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["permit"], "BP-1");
        assert_eq!(first["detail"]["permit_status"], "ISSUED");
        assert_eq!(first["fees"][0]["Fee"], "50.00");

        let failed = std::fs::read_to_string(&failures).unwrap();
        let line: serde_json::Value = serde_json::from_str(failed.trim()).unwrap();
        assert_eq!(line["permit"], "BP-3");
        assert!(line["error"].as_str().unwrap().contains("no track id"));
    }

    #[test]
    fn test_create_truncates_previous_run() {
        let dir = TempDir::new().unwrap();
        let records = dir.path().join("permits.jsonl");
        let failures = dir.path().join("failures.jsonl");
        std::fs::write(&records, "stale\n").unwrap();

        let sink = JsonlSink::create(&records, &failures).unwrap();
        assert_eq!(sink.records_path(), records.as_path());
        assert_eq!(std::fs::read_to_string(&records).unwrap(), "");
        assert!(failures.exists());
    }
}
