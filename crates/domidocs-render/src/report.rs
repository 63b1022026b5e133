//! Generation report
//!
//! One entry per template, serialised to `generation_report.json` in the
//! output directory after every batch.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::RenderError;

/// Report file name inside the output directory
pub const REPORT_FILE: &str = "generation_report.json";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Document produced (and converted when requested)
    Ok,
    /// Output already present; nothing regenerated
    Skipped,
    /// Document present but conversion failed
    Partial,
    Error,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Ok => "ok",
            Status::Skipped => "skipped",
            Status::Partial => "partial",
            Status::Error => "error",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Outcome for one template
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub template: String,
    pub out_docx: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_pdf: Option<PathBuf>,
    pub status: Status,
    /// Status of the Word output when conversion downgraded `status`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docx_status: Option<Status>,
    pub error: Option<String>,
    pub duration_seconds: f64,
    pub out_docx_size: u64,
}

impl ReportEntry {
    pub fn new(template: impl Into<String>, out_docx: impl Into<PathBuf>) -> Self {
        Self {
            template: template.into(),
            out_docx: out_docx.into(),
            out_pdf: None,
            status: Status::Ok,
            docx_status: None,
            error: None,
            duration_seconds: 0.0,
            out_docx_size: 0,
        }
    }

    pub(crate) fn fail(&mut self, status: Status, error: impl Into<String>) {
        if status == Status::Partial {
            self.docx_status = Some(self.status);
        }
        self.status = status;
        self.error = Some(error.into());
    }
}

/// All entries of one batch, plus where they were written
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct GenerationReport {
    pub entries: Vec<ReportEntry>,
    #[serde(skip)]
    pub report_path: Option<PathBuf>,
}

impl GenerationReport {
    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(|e| e.status == Status::Error)
    }

    pub fn count(&self, status: Status) -> usize {
        self.entries.iter().filter(|e| e.status == status).count()
    }
}

/// Write the entries as a JSON array into `out_dir`
pub fn write_report(out_dir: &Path, entries: &[ReportEntry]) -> Result<PathBuf, RenderError> {
    let path = out_dir.join(REPORT_FILE);
    let json = serde_json::to_string_pretty(entries)?;
    fs::write(&path, json).map_err(|e| RenderError::io(&path, e))?;
    Ok(path)
}

/// Read a report written by [`write_report`]
pub fn read_report(path: &Path) -> Result<Vec<ReportEntry>, RenderError> {
    let json = fs::read_to_string(path).map_err(|e| RenderError::io(path, e))?;
    Ok(serde_json::from_str(&json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn entry_serialises_with_lowercase_status() {
        let mut entry = ReportEntry::new("statuts.docx", "/out/statuts_generated.docx");
        entry.out_docx_size = 2048;
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["error"], serde_json::Value::Null);
        assert_eq!(json["out_docx_size"], 2048);
        assert!(json.get("out_pdf").is_none());
    }

    #[test]
    fn partial_keeps_primary_status() {
        let mut entry = ReportEntry::new("a.docx", "a_generated.docx");
        entry.status = Status::Skipped;
        entry.fail(Status::Partial, "no converter");
        assert_eq!(entry.status, Status::Partial);
        assert_eq!(entry.docx_status, Some(Status::Skipped));
        assert_eq!(entry.error.as_deref(), Some("no converter"));
    }

    #[test]
    fn report_file_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut failed = ReportEntry::new("b.docx", "b_generated.docx");
        failed.fail(Status::Error, "corrupt");
        let entries = vec![ReportEntry::new("a.docx", "a_generated.docx"), failed];

        let path = write_report(dir.path(), &entries).unwrap();
        assert_eq!(path, dir.path().join(REPORT_FILE));
        assert_eq!(read_report(&path).unwrap(), entries);
    }
}
