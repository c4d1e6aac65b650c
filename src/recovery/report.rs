//! Machine-readable summary of a recovery run

use crate::error::Result;
use crate::search::{RepairSearch, SearchOutcome, SearchReport};
use crate::types::{SearchOrder, SearchStats};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStatus {
    Repaired,
    Exhausted,
}

/// Report of one search, printed with `--json`
#[derive(Debug, Clone, Serialize)]
pub struct RecoveryReport {
    pub timestamp: DateTime<Local>,
    pub tool_name: String,
    pub archive_path: Option<PathBuf>,
    pub entry_name: String,
    pub algorithm: String,
    pub expected_digest: String,
    pub missing_bytes: usize,
    pub workers: usize,
    pub order: SearchOrder,
    pub status: RecoveryStatus,
    /// Hex of the accepted trailer
    pub trailer: Option<String>,
    pub trailer_index: Option<String>,
    pub content_len: Option<usize>,
    pub output_path: Option<PathBuf>,
    pub stats: SearchStats,
}

impl RecoveryReport {
    pub fn new(search: &RepairSearch, workers: usize, report: &SearchReport) -> Self {
        let repair = report.outcome.repair();
        let status = match report.outcome {
            SearchOutcome::Succeeded(_) => RecoveryStatus::Repaired,
            SearchOutcome::Exhausted => RecoveryStatus::Exhausted,
        };

        Self {
            timestamp: Local::now(),
            tool_name: format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            archive_path: search.blob().path().map(Path::to_path_buf),
            entry_name: search.entry_name().to_string(),
            algorithm: search.expected().algorithm().to_string(),
            expected_digest: search.expected().hex(),
            missing_bytes: search.config().missing_bytes.get(),
            workers,
            order: search.config().order,
            status,
            trailer: repair.map(|r| r.candidate.to_hex()),
            trailer_index: repair.map(|r| r.index.to_string()),
            content_len: repair.map(|r| r.content.len()),
            output_path: None,
            stats: report.stats.clone(),
        }
    }

    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::TruncatedBlob;
    use crate::digest::{ExpectedDigest, HashAlgorithm};
    use crate::types::SearchConfig;

    #[test]
    fn test_exhausted_report_json() {
        let search = RepairSearch::new(
            TruncatedBlob::from(b"not an archive".to_vec()),
            "test.txt",
            ExpectedDigest::of(HashAlgorithm::Md5, b"hello world"),
            SearchConfig::new(1, 1).unwrap(),
        );
        let report = search.run_sequential();
        let summary = RecoveryReport::new(&search, 1, &report);

        let value: serde_json::Value =
            serde_json::from_str(&summary.to_json().unwrap()).unwrap();
        assert_eq!(value["status"], "exhausted");
        assert_eq!(value["algorithm"], "md5");
        assert_eq!(value["expected_digest"], "5eb63bbbe01eeed093cb22bb8f5acdc3");
        assert_eq!(value["order"], "first_found");
        assert_eq!(value["stats"]["candidates_evaluated"], 256);
        assert!(value["trailer"].is_null());
    }
}
