use tracing::info;

use super::{SweepError, Sweeper};
use crate::github::{ApprovalSummary, CiState, PullRequestDetail, PullRequestRef};
use crate::report::{Operation, OperationResult};

/// Everything the status report shows for one pull request
#[derive(Debug, Clone, PartialEq)]
pub struct PullRequestStatus {
    pub detail: PullRequestDetail,
    pub ci: CiState,
    pub approvals: ApprovalSummary,
    pub files_changed: usize,
    pub additions: u64,
    pub deletions: u64,
}

impl PullRequestStatus {
    pub fn summary(&self) -> String {
        let draft = if self.detail.draft { " draft" } else { "" };
        format!(
            "{}{} | ci {} | {} approved, {} changes requested | {} files +{}/-{}",
            self.detail.mergeable_state,
            draft,
            self.ci,
            self.approvals.approved,
            self.approvals.changes_requested,
            self.files_changed,
            self.additions,
            self.deletions
        )
    }
}

impl Sweeper<'_> {
    pub async fn status_of(&self, pr: &PullRequestRef) -> Result<PullRequestStatus, SweepError> {
        let detail = self.github.pull_request(&pr.repo, pr.number).await?;
        let ci = self.github.combined_status(&pr.repo, &detail.head.sha).await?.state;
        let reviews = self.github.reviews(&pr.repo, pr.number).await?;
        let files = self.github.pull_request_files(&pr.repo, pr.number).await?;

        Ok(PullRequestStatus {
            ci,
            approvals: ApprovalSummary::from_reviews(&reviews),
            files_changed: files.len(),
            additions: files.iter().map(|f| f.additions).sum(),
            deletions: files.iter().map(|f| f.deletions).sum(),
            detail,
        })
    }

    /// Read-only report of every pull request; never mutates anything
    pub async fn status_all(&self, prs: &[PullRequestRef]) -> Result<Vec<OperationResult>, SweepError> {
        self.sweep_each(Operation::Status, prs, move |pr| async move {
            let status = self.status_of(pr).await?;
            info!(state = %status.detail.mergeable_state, ci = %status.ci, "Collected status");
            Ok(OperationResult::succeeded(Operation::Status, pr, status.summary()))
        })
        .await
    }
}
