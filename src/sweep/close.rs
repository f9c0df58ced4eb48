use tracing::info;

use super::{SweepError, Sweeper};
use crate::github::PullRequestRef;
use crate::report::{Operation, OperationResult};

/// Token the operator must type to close pull requests in bulk
pub const CLOSE_CONFIRMATION: &str = "CLOSE";

/// Proof that closing was confirmed. Only [`CloseConfirmation::check`]
/// makes one, so nothing can close without going through it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloseConfirmation {
    dry_run: bool,
}

impl CloseConfirmation {
    /// Accept `--yes`, the exact token, or a dry run (which closes nothing)
    pub fn check(token: Option<&str>, yes: bool, dry_run: bool) -> Result<Self, SweepError> {
        if dry_run || yes || token == Some(CLOSE_CONFIRMATION) {
            Ok(Self { dry_run })
        } else {
            Err(SweepError::Unconfirmed)
        }
    }
}

impl Sweeper<'_> {
    /// Confirm, find the open pull requests, and close them. Without
    /// confirmation nothing at all is sent to the forge.
    pub async fn close(&self, token: Option<&str>, yes: bool) -> Result<Vec<OperationResult>, SweepError> {
        let confirmation = CloseConfirmation::check(token, yes, self.settings.dry_run)?;
        let prs = self.open_pull_requests().await?;
        self.close_all(&prs, confirmation).await
    }

    pub async fn close_all(
        &self,
        prs: &[PullRequestRef],
        confirmation: CloseConfirmation,
    ) -> Result<Vec<OperationResult>, SweepError> {
        let dry_run = confirmation.dry_run || self.settings.dry_run;
        self.sweep_each(Operation::Close, prs, move |pr| async move {
            if dry_run {
                return Ok(OperationResult::dry_run(Operation::Close, pr, "Would close"));
            }
            self.github.close_pull_request(&pr.repo, pr.number).await?;
            info!("🚪 Closed pull request");
            Ok(OperationResult::succeeded(Operation::Close, pr, "Closed"))
        })
        .await
    }
}
