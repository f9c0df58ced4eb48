//! Force-merge with a safety net
//!
//! The base branch is snapshotted before anything is tried. Every merge
//! method is attempted through the API, then a local `-X theirs` merge is
//! pushed. If that fails too and the base branch has moved, it is put back.

use chrono::Utc;
use tracing::{debug, error, info, warn};

use super::{SweepError, Sweeper};
use crate::external::{GitError, MergeState};
use crate::github::{BackupBranch, BranchHandler, GitHubError, PullRequestDetail, PullRequestRef};
use crate::report::{Operation, OperationResult};

impl Sweeper<'_> {
    pub async fn force_all(&self, prs: &[PullRequestRef]) -> Result<Vec<OperationResult>, SweepError> {
        self.sweep_each(Operation::Force, prs, move |pr| async move {
            let detail = self.github.pull_request(&pr.repo, pr.number).await?;
            self.force_detail(pr, &detail).await
        })
        .await
    }

    pub(crate) async fn force_detail(
        &self,
        pr: &PullRequestRef,
        detail: &PullRequestDetail,
    ) -> Result<OperationResult, SweepError> {
        let repo = &pr.repo;
        let base = detail.base.name.as_str();
        self.log_merge_blockers(detail).await;

        if self.settings.dry_run {
            return Ok(OperationResult::dry_run(
                Operation::Force,
                pr,
                format!("Would back up {base} and force-merge"),
            ));
        }

        let handler = BranchHandler::new(self.github, &self.settings.backup_prefix);
        let backup = match handler.create_backup(repo, base, pr.number, Utc::now()).await {
            Ok(backup) => backup,
            Err(e) if e.is_authentication() => return Err(e.into()),
            Err(e) => {
                error!(base, error = %e, "Backup failed, not forcing");
                return Ok(OperationResult::failed(
                    Operation::Force,
                    pr,
                    format!("Backup of {base} failed, force-merge aborted: {e}"),
                ));
            }
        };

        for method in self.settings.merge_method.fallback_order() {
            match self.github.merge_pull_request(repo, pr.number, method).await {
                Ok(outcome) if outcome.merged => {
                    info!(%method, "🎉 Force-merged through the API");
                    self.finish_backup(&handler, &backup).await;
                    return Ok(OperationResult::succeeded(
                        Operation::Force,
                        pr,
                        format!("Merged with {method}"),
                    )
                    .with_method(method)
                    .with_backup(&backup.name));
                }
                Ok(outcome) => warn!(%method, message = %outcome.message, "Merge method rejected"),
                Err(e) if e.is_authentication() => return Err(e.into()),
                Err(e) => warn!(%method, error = %e, "Merge method failed"),
            }
        }

        match self.local_force_merge(pr, detail).await {
            Ok(()) => {
                info!(base, "🎉 Force-merged with a local merge");
                self.finish_backup(&handler, &backup).await;
                Ok(OperationResult::succeeded(
                    Operation::Force,
                    pr,
                    "Merged locally with -X theirs",
                )
                .with_backup(&backup.name))
            }
            Err(e) => {
                error!(error = %e, "Local force-merge failed");
                let rollback = self.restore_base(&handler, &backup, pr.number).await;
                Ok(OperationResult::failed(
                    Operation::Force,
                    pr,
                    format!("Force-merge failed: {e}; {rollback}"),
                )
                .with_backup(&backup.name))
            }
        }
    }

    /// Protection rules and CI state only explain a rejection; they never
    /// stop the attempt
    async fn log_merge_blockers(&self, detail: &PullRequestDetail) {
        match self.github.branch_protection(&detail.repo, &detail.base.name).await {
            Ok(Some(protection)) => info!(
                checks = ?protection.required_status_checks,
                reviews = protection.required_approving_reviews,
                enforce_admins = protection.enforce_admins,
                "Base branch is protected"
            ),
            Ok(None) => debug!("Base branch has no protection"),
            Err(e) => warn!(error = %e, "Could not read branch protection"),
        }
        match self.github.combined_status(&detail.repo, &detail.head.sha).await {
            Ok(status) => info!(ci = %status.state, checks = status.total_count, "Head CI state"),
            Err(e) => warn!(error = %e, "Could not read CI state"),
        }
    }

    async fn finish_backup(&self, handler: &BranchHandler<'_>, backup: &BackupBranch) {
        if self.settings.keep_backups {
            info!(backup = %backup.name, "Keeping backup branch");
        } else {
            handler.discard(backup).await;
        }
    }

    /// Clone the base, merge the pull request head preferring its side, strip
    /// whatever markers are left, and push straight to the base branch.
    async fn local_force_merge(&self, pr: &PullRequestRef, detail: &PullRequestDetail) -> Result<(), SweepError> {
        let workspace = self.workspace()?;
        let base = detail.base.name.as_str();
        let checkout = workspace.checkout(&pr.repo, base, pr.number).await?;

        let result: Result<(), SweepError> = async {
            // pull/<n>/head also covers pull requests opened from forks
            checkout.fetch(&format!("pull/{}/head", pr.number)).await?;
            if let MergeState::Conflicted(paths) = checkout.merge_theirs("FETCH_HEAD").await? {
                self.strip_markers(&checkout, &paths).await?;
                checkout.stage_all().await?;
                let committed = checkout
                    .commit(&format!("Force-merge #{}: {}", pr.number, pr.title))
                    .await?;
                if !committed {
                    return Err(GitError::GitCommandFailed {
                        command: "commit".to_string(),
                        message: "stopped merge left nothing to commit".to_string(),
                    }
                    .into());
                }
            }
            checkout.push(base, false).await?;
            Ok(())
        }
        .await;

        checkout.discard().await;
        result
    }

    /// Put the base branch back on the snapshot if it moved. Returns a note
    /// for the result record.
    async fn restore_base(&self, handler: &BranchHandler<'_>, backup: &BackupBranch, number: u64) -> String {
        match self.github.branch_head(&backup.repo, &backup.base).await {
            Ok(Some(head)) if head == backup.sha => {
                return format!("{} unchanged, backup {} kept", backup.base, backup.name);
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Could not read base head, rolling back anyway"),
        }

        match handler.rollback(backup).await {
            Ok(()) => format!("{} rolled back to {}", backup.base, backup.sha),
            Err(e @ GitHubError::BackupMissing { .. }) => format!("rollback impossible: {e}"),
            Err(e) => {
                warn!(error = %e, "API rollback failed, resetting through a working copy");
                match self.local_rollback(backup, number).await {
                    Ok(()) => format!("{} reset to {} with a force-push", backup.base, backup.sha),
                    Err(local) => {
                        error!(error = %local, backup = %backup.name, "⚠️ Rollback failed, restore the base branch by hand");
                        format!("rollback failed: {local}")
                    }
                }
            }
        }
    }

    async fn local_rollback(&self, backup: &BackupBranch, number: u64) -> Result<(), SweepError> {
        let workspace = self.workspace()?;
        let checkout = workspace.checkout(&backup.repo, &backup.base, number).await?;

        let result: Result<(), SweepError> = async {
            checkout.fetch(&backup.name).await?;
            checkout.reset_hard(&backup.sha).await?;
            checkout.push(&backup.base, true).await?;
            Ok(())
        }
        .await;

        checkout.discard().await;
        result
    }
}
