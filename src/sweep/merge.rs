use tracing::{info, warn};

use super::{SweepError, Sweeper};
use crate::github::PullRequestRef;
use crate::report::{Operation, OperationResult};

impl Sweeper<'_> {
    pub async fn merge_all(&self, prs: &[PullRequestRef]) -> Result<Vec<OperationResult>, SweepError> {
        self.sweep_each(Operation::Merge, prs, move |pr| self.merge_one(pr))
            .await
    }

    /// One merge call with the configured method. A rejection falls through to
    /// the force flow when forcing is on and is recorded as a failure otherwise;
    /// the merge itself is never retried here.
    pub async fn merge_one(&self, pr: &PullRequestRef) -> Result<OperationResult, SweepError> {
        let detail = self.github.pull_request(&pr.repo, pr.number).await?;
        let method = self.settings.merge_method;

        if self.settings.dry_run {
            return Ok(OperationResult::dry_run(
                Operation::Merge,
                pr,
                format!("Would merge with {method} (state: {})", detail.mergeable_state),
            )
            .with_method(method));
        }

        if self.settings.resolve_conflicts && detail.has_conflicts() {
            info!("Pull request has conflicts, resolving first");
            return self.resolve_detail(pr, &detail).await;
        }

        let outcome = self.github.merge_pull_request(&pr.repo, pr.number, method).await?;
        if outcome.merged {
            info!(%method, sha = ?outcome.sha, "🎉 Merged");
            return Ok(OperationResult::succeeded(Operation::Merge, pr, format!("Merged with {method}"))
                .with_method(method));
        }

        warn!(%method, message = %outcome.message, "Merge rejected");
        if self.settings.force {
            return self.force_detail(pr, &detail).await;
        }

        Ok(OperationResult::failed(
            Operation::Merge,
            pr,
            format!("Merge rejected: {}", outcome.message),
        )
        .with_method(method))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::config::RunSettings;
    use crate::github::{MergeMethod, MergeOutcome, MergeableState, MockGitHubOps};
    use mockall::predicate::*;

    #[tokio::test]
    async fn test_merge_success_records_method() {
        let mut github = MockGitHubOps::new();
        github
            .expect_pull_request()
            .returning(|_, n| Ok(detail(n, MergeableState::Clean)));
        github
            .expect_merge_pull_request()
            .with(eq(repo()), eq(5), eq(MergeMethod::Squash))
            .times(1)
            .returning(|_, _, _| {
                Ok(MergeOutcome {
                    merged: true,
                    sha: Some("abc".to_string()),
                    message: "Pull Request successfully merged".to_string(),
                })
            });

        let settings = RunSettings {
            merge_method: MergeMethod::Squash,
            ..settings()
        };
        let results = Sweeper::new(&github, &settings).merge_all(&[pr(5)]).await.unwrap();
        assert!(results[0].success);
        assert_eq!(results[0].merge_method, Some(MergeMethod::Squash));
    }

    #[tokio::test]
    async fn test_rejected_merge_without_force_is_one_failure_and_no_retry() {
        let mut github = MockGitHubOps::new();
        github
            .expect_pull_request()
            .returning(|_, n| Ok(detail(n, MergeableState::Blocked)));
        github
            .expect_merge_pull_request()
            .times(1)
            .returning(|_, _, _| Ok(MergeOutcome::rejected("Required status check is failing")));
        github.expect_branch_head().never();
        github.expect_create_branch().never();

        let settings = settings();
        let results = Sweeper::new(&github, &settings).merge_all(&[pr(5)]).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(!results[0].success);
        assert_eq!(results[0].message, "Merge rejected: Required status check is failing");
    }

    #[tokio::test]
    async fn test_dry_run_never_merges() {
        let mut github = MockGitHubOps::new();
        github
            .expect_pull_request()
            .returning(|_, n| Ok(detail(n, MergeableState::Clean)));
        github.expect_merge_pull_request().never();

        let settings = RunSettings {
            dry_run: true,
            ..settings()
        };
        let results = Sweeper::new(&github, &settings).merge_all(&[pr(1), pr(2)]).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.dry_run && r.success));
    }

    #[tokio::test]
    async fn test_rejected_merge_with_force_takes_backup() {
        let mut github = MockGitHubOps::new();
        github
            .expect_pull_request()
            .returning(|_, n| Ok(detail(n, MergeableState::Blocked)));
        github.expect_branch_protection().returning(|_, _| Ok(None));
        github.expect_combined_status().returning(|_, _| {
            Ok(crate::github::CommitStatus {
                state: crate::github::CiState::Failure,
                total_count: 1,
            })
        });
        github
            .expect_branch_head()
            .with(eq(repo()), eq("main"))
            .returning(|_, _| Ok(Some("base123".to_string())));
        github
            .expect_create_branch()
            .times(1)
            .returning(|_, _, _| Ok(()));
        let calls = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let seen = calls.clone();
        github.expect_merge_pull_request().returning(move |_, _, _| {
            // first the plain merge, then the first force attempt succeeds
            if seen.fetch_add(1, std::sync::atomic::Ordering::SeqCst) == 0 {
                Ok(MergeOutcome::rejected("blocked"))
            } else {
                Ok(MergeOutcome {
                    merged: true,
                    sha: None,
                    message: String::new(),
                })
            }
        });
        github.expect_delete_branch().times(1).returning(|_, _| Ok(()));

        let settings = RunSettings {
            force: true,
            ..settings()
        };
        let results = Sweeper::new(&github, &settings).merge_all(&[pr(3)]).await.unwrap();
        assert!(results[0].success);
        assert_eq!(results[0].operation, Operation::Force);
        assert!(results[0].backup_branch.is_some());
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }
}
