//! Per-run result records and the JSON summary written at the end of a run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::github::{MergeMethod, PullRequestRef};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write report {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Status,
    Merge,
    Close,
    Force,
    Resolve,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Merge => "merge",
            Self::Close => "close",
            Self::Force => "force",
            Self::Resolve => "resolve",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One record per pull request per run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResult {
    pub operation: Operation,
    pub repository: String,
    pub number: u64,
    pub title: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge_method: Option<MergeMethod>,
    pub url: String,
    pub message: String,
    pub dry_run: bool,
    /// Left alone on purpose; neither a success nor a failure
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub skipped: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ladder_levels: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_branch: Option<String>,
}

impl OperationResult {
    fn new(operation: Operation, pr: &PullRequestRef, success: bool, message: impl Into<String>) -> Self {
        Self {
            operation,
            repository: pr.repo.full_name(),
            number: pr.number,
            title: pr.title.clone(),
            success,
            merge_method: None,
            url: pr.html_url.clone(),
            message: message.into(),
            dry_run: false,
            skipped: false,
            ladder_levels: Vec::new(),
            backup_branch: None,
        }
    }

    pub fn succeeded(operation: Operation, pr: &PullRequestRef, message: impl Into<String>) -> Self {
        Self::new(operation, pr, true, message)
    }

    pub fn failed(operation: Operation, pr: &PullRequestRef, message: impl Into<String>) -> Self {
        Self::new(operation, pr, false, message)
    }

    /// What would have happened; counts as a success
    pub fn dry_run(operation: Operation, pr: &PullRequestRef, message: impl Into<String>) -> Self {
        Self {
            dry_run: true,
            ..Self::new(operation, pr, true, message)
        }
    }

    /// Not processed; `success` stays false so the record never counts as done
    pub fn skipped(operation: Operation, pr: &PullRequestRef, message: impl Into<String>) -> Self {
        Self {
            skipped: true,
            ..Self::new(operation, pr, false, message)
        }
    }

    pub fn with_method(mut self, method: MergeMethod) -> Self {
        self.merge_method = Some(method);
        self
    }

    pub fn with_ladder_levels(mut self, levels: &[u8]) -> Self {
        self.ladder_levels = levels.to_vec();
        self
    }

    pub fn with_backup(mut self, branch: impl Into<String>) -> Self {
        self.backup_branch = Some(branch.into());
        self
    }

    /// One progress line for the terminal
    pub fn console_line(&self) -> String {
        let icon = if self.dry_run {
            "🔍"
        } else if self.skipped {
            "⏭️"
        } else if self.success {
            "✅"
        } else {
            "❌"
        };
        format!(
            "{} {}#{} {}: {}",
            icon, self.repository, self.number, self.title, self.message
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub dry_run: usize,
}

impl Tally {
    pub fn of(results: &[OperationResult]) -> Self {
        results.iter().fold(Self::default(), |mut tally, r| {
            tally.total += 1;
            if r.dry_run {
                tally.dry_run += 1;
            } else if r.skipped {
                tally.skipped += 1;
            } else if r.success {
                tally.succeeded += 1;
            } else {
                tally.failed += 1;
            }
            tally
        })
    }
}

impl fmt::Display for Tally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} total, {} succeeded, {} failed",
            self.total, self.succeeded, self.failed
        )?;
        if self.skipped > 0 {
            write!(f, ", {} skipped", self.skipped)?;
        }
        if self.dry_run > 0 {
            write!(f, ", {} dry-run", self.dry_run)?;
        }
        Ok(())
    }
}

/// `<operation>-results-<YYYYMMDD-HHMMSS>.json`
pub fn report_file_name(operation: Operation, at: DateTime<Utc>) -> String {
    format!("{}-results-{}.json", operation, at.format("%Y%m%d-%H%M%S"))
}

/// Write `results` as a pretty JSON array into `output_dir`, creating the
/// directory if needed. Returns the file written.
pub async fn save_results(
    output_dir: &Path,
    operation: Operation,
    results: &[OperationResult],
    at: DateTime<Utc>,
) -> Result<PathBuf, ReportError> {
    let path = output_dir.join(report_file_name(operation, at));
    let json = serde_json::to_string_pretty(results)?;

    let write_err = |source| ReportError::Write {
        path: path.display().to_string(),
        source,
    };
    tokio::fs::create_dir_all(output_dir).await.map_err(write_err)?;
    tokio::fs::write(&path, json).await.map_err(write_err)?;

    info!(path = %path.display(), records = results.len(), "Saved results");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::RepoRef;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn pr() -> PullRequestRef {
        PullRequestRef {
            repo: RepoRef::new("acme", "widgets"),
            number: 12,
            title: "Bump deps".to_string(),
            html_url: "https://github.com/acme/widgets/pull/12".to_string(),
        }
    }

    #[test]
    fn test_report_file_name() {
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(report_file_name(Operation::Merge, at), "merge-results-20240102-030405.json");
    }

    #[test]
    fn test_tally_counts_dry_runs_and_skips_separately() {
        let results = vec![
            OperationResult::succeeded(Operation::Merge, &pr(), "merged"),
            OperationResult::failed(Operation::Merge, &pr(), "rejected"),
            OperationResult::dry_run(Operation::Merge, &pr(), "would merge"),
            OperationResult::skipped(Operation::Resolve, &pr(), "not conflicted"),
        ];
        let tally = Tally::of(&results);
        assert_eq!(
            tally,
            Tally {
                total: 4,
                succeeded: 1,
                failed: 1,
                skipped: 1,
                dry_run: 1
            }
        );
        assert_eq!(
            tally.to_string(),
            "4 total, 1 succeeded, 1 failed, 1 skipped, 1 dry-run"
        );
    }

    #[test]
    fn test_skipped_record_is_not_a_success() {
        let record = OperationResult::skipped(Operation::Resolve, &pr(), "not conflicted");
        assert!(!record.success);
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["skipped"], true);
        assert_eq!(value["success"], false);

        let merged = serde_json::to_value(OperationResult::succeeded(Operation::Merge, &pr(), "ok")).unwrap();
        assert!(merged.get("skipped").is_none());
    }

    #[test]
    fn test_record_serializes_expected_fields() {
        let record = OperationResult::succeeded(Operation::Force, &pr(), "merged")
            .with_method(MergeMethod::Squash)
            .with_backup("pr-sweep-backup/pr-12-20240102-030405");
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["operation"], "force");
        assert_eq!(value["repository"], "acme/widgets");
        assert_eq!(value["merge_method"], "squash");
        assert_eq!(value["backup_branch"], "pr-sweep-backup/pr-12-20240102-030405");
        assert!(value.get("ladder_levels").is_none());
    }

    #[test]
    fn test_console_line() {
        let line = OperationResult::failed(Operation::Merge, &pr(), "Merge rejected").console_line();
        assert_eq!(line, "❌ acme/widgets#12 Bump deps: Merge rejected");
    }

    #[tokio::test]
    async fn test_save_results_writes_json_array() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("reports");
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let results = vec![OperationResult::failed(Operation::Close, &pr(), "boom")];

        let path = save_results(&out, Operation::Close, &results, at).await.unwrap();
        assert_eq!(path, out.join("close-results-20240102-030405.json"));

        let read: Vec<OperationResult> =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(read, results);
    }
}
