use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use super::client::GitHubOps;
use super::errors::GitHubError;
use super::types::RepoRef;

/// Snapshot of a base branch taken right before a force-merge
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupBranch {
    pub repo: RepoRef,
    /// Branch the snapshot protects
    pub base: String,
    /// Name of the snapshot branch itself
    pub name: String,
    /// Base head at snapshot time
    pub sha: String,
}

/// `<prefix>/pr-<number>-<YYYYMMDD-HHMMSS>`
pub fn backup_branch_name(prefix: &str, pr_number: u64, at: DateTime<Utc>) -> String {
    format!(
        "{}/pr-{}-{}",
        prefix.trim_end_matches('/'),
        pr_number,
        at.format("%Y%m%d-%H%M%S")
    )
}

/// Handler for the backup-and-rollback pair around force-merges
pub struct BranchHandler<'a> {
    github: &'a dyn GitHubOps,
    prefix: &'a str,
}

impl<'a> BranchHandler<'a> {
    pub fn new(github: &'a dyn GitHubOps, prefix: &'a str) -> Self {
        Self { github, prefix }
    }

    /// Snapshot `base` into a fresh backup branch. Any failure here must abort
    /// the force-merge that asked for it.
    pub async fn create_backup(
        &self,
        repo: &RepoRef,
        base: &str,
        pr_number: u64,
        at: DateTime<Utc>,
    ) -> Result<BackupBranch, GitHubError> {
        let sha = self
            .github
            .branch_head(repo, base)
            .await?
            .ok_or_else(|| GitHubError::NotFound(format!("branch '{base}' in {repo}")))?;

        let name = backup_branch_name(self.prefix, pr_number, at);
        self.github.create_branch(repo, &name, &sha).await?;
        info!(repo = %repo, base, backup = %name, sha = %sha, "🛡️ Created backup branch");

        Ok(BackupBranch {
            repo: repo.clone(),
            base: base.to_string(),
            name,
            sha,
        })
    }

    /// Move the base branch back to the snapshot. The snapshot branch is
    /// looked up again first; if it has vanished nothing is touched.
    pub async fn rollback(&self, backup: &BackupBranch) -> Result<(), GitHubError> {
        let snapshot = match self.github.branch_head(&backup.repo, &backup.name).await? {
            Some(sha) => sha,
            None => {
                error!(
                    repo = %backup.repo,
                    backup = %backup.name,
                    base = %backup.base,
                    "Backup branch missing, cannot roll back"
                );
                return Err(GitHubError::BackupMissing {
                    branch: backup.name.clone(),
                    base: backup.base.clone(),
                });
            }
        };

        if snapshot != backup.sha {
            warn!(
                backup = %backup.name,
                expected = %backup.sha,
                found = %snapshot,
                "Backup branch moved since it was created; restoring its current head"
            );
        }

        self.github
            .reset_branch(&backup.repo, &backup.base, &snapshot)
            .await?;
        info!(repo = %backup.repo, base = %backup.base, sha = %snapshot, "⏪ Rolled back base branch");
        Ok(())
    }

    /// Remove a snapshot that is no longer needed. Failure only warns.
    pub async fn discard(&self, backup: &BackupBranch) {
        if let Err(e) = self.github.delete_branch(&backup.repo, &backup.name).await {
            warn!(backup = %backup.name, error = %e, "Could not delete backup branch");
        }
    }
}
