//! The sweep core
//!
//! A [`Sweeper`] finds the author's open pull requests and applies one
//! operation to each in turn. Everything it reads at run time comes from the
//! [`RunSettings`] it was built with.

use std::future::Future;
use thiserror::Error;
use tracing::{error, info, warn, Instrument};

use crate::config::RunSettings;
use crate::conflicts::resolve_conflict_markers;
use crate::external::{Checkout, GitError, GitWorkspace};
use crate::github::{collect_pages, GitHubError, GitHubOps, PullRequestRef, SEARCH_PAGE_SIZE};
use crate::report::{Operation, OperationResult, ReportError};
use crate::telemetry::create_pull_request_span;

pub mod close;
pub mod force;
pub mod merge;
pub mod resolve;
pub mod status;

pub use close::{CloseConfirmation, CLOSE_CONFIRMATION};
pub use status::PullRequestStatus;

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("Refusing to close pull requests without confirmation; pass --confirm CLOSE or --yes")]
    Unconfirmed,
    #[error("A working copy is needed for this operation but no work directory is available")]
    NoWorkspace,
    #[error(transparent)]
    GitHub(#[from] GitHubError),
    #[error(transparent)]
    Git(#[from] GitError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Report(#[from] ReportError),
}

impl SweepError {
    /// Errors that end the whole run instead of failing one pull request
    pub fn is_fatal(&self) -> bool {
        match self {
            SweepError::Unconfirmed => true,
            SweepError::GitHub(e) => e.is_authentication(),
            _ => false,
        }
    }
}

pub struct Sweeper<'a> {
    github: &'a dyn GitHubOps,
    settings: &'a RunSettings,
    workspace: Option<&'a GitWorkspace>,
}

impl<'a> Sweeper<'a> {
    pub fn new(github: &'a dyn GitHubOps, settings: &'a RunSettings) -> Self {
        Self {
            github,
            settings,
            workspace: None,
        }
    }

    /// Working copy used by resolve and by the force-merge fallbacks
    pub fn with_workspace(mut self, workspace: &'a GitWorkspace) -> Self {
        self.workspace = Some(workspace);
        self
    }

    /// Every open pull request by the configured author, or by the token's
    /// owner when no author is configured
    pub async fn open_pull_requests(&self) -> Result<Vec<PullRequestRef>, SweepError> {
        let login = match &self.settings.author {
            Some(author) => author.clone(),
            None => self.github.current_user().await?,
        };

        let github = self.github;
        let login_ref = login.as_str();
        let prs = collect_pages(SEARCH_PAGE_SIZE, |page| async move {
            github
                .search_open_pull_requests(login_ref, page, SEARCH_PAGE_SIZE)
                .await
        })
        .await?;

        info!(author = %login, count = prs.len(), "🔍 Found open pull requests");
        Ok(prs)
    }

    /// Apply `apply` to each pull request in order, pausing between them.
    /// A failure is recorded against its pull request and the loop moves on,
    /// unless the error is fatal for the run.
    async fn sweep_each<'p, F, Fut>(
        &self,
        operation: Operation,
        prs: &'p [PullRequestRef],
        mut apply: F,
    ) -> Result<Vec<OperationResult>, SweepError>
    where
        F: FnMut(&'p PullRequestRef) -> Fut,
        Fut: Future<Output = Result<OperationResult, SweepError>>,
    {
        let mut results = Vec::with_capacity(prs.len());

        for (index, pr) in prs.iter().enumerate() {
            if index > 0 && !self.settings.pause.is_zero() {
                tokio::time::sleep(self.settings.pause).await;
            }

            let span = create_pull_request_span(&pr.repo.full_name(), pr.number);
            let result = match apply(pr).instrument(span).await {
                Ok(result) => result,
                Err(e) if e.is_fatal() => {
                    error!(repo = %pr.repo, number = pr.number, error = %e, "Aborting sweep");
                    return Err(e);
                }
                Err(e) => {
                    warn!(repo = %pr.repo, number = pr.number, error = %e, "{operation} failed");
                    OperationResult::failed(operation, pr, e.to_string())
                }
            };

            println!("{}", result.console_line());
            results.push(result);
        }

        Ok(results)
    }

    fn workspace(&self) -> Result<&'a GitWorkspace, SweepError> {
        self.workspace.ok_or(SweepError::NoWorkspace)
    }

    /// Strip conflict hunks from `paths` in the working copy. Returns the
    /// number of hunks removed.
    async fn strip_markers(&self, checkout: &Checkout<'_>, paths: &[String]) -> Result<usize, SweepError> {
        let mut hunks = 0;
        for path in paths {
            let Some(text) = checkout.read_file(path).await? else {
                continue;
            };
            let resolution = resolve_conflict_markers(&text);
            if resolution.changed() {
                checkout.write_file(path, &resolution.text).await?;
                hunks += resolution.hunks_removed;
            }
        }
        info!(files = paths.len(), hunks, "Stripped conflict markers");
        Ok(hunks)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::github::{BranchTip, MergeableState, PullRequestDetail, RepoRef};
    use std::time::Duration;

    pub fn settings() -> RunSettings {
        RunSettings {
            pause: Duration::ZERO,
            ..RunSettings::default()
        }
    }

    pub fn repo() -> RepoRef {
        RepoRef::new("acme", "widgets")
    }

    pub fn pr(number: u64) -> PullRequestRef {
        PullRequestRef {
            repo: repo(),
            number,
            title: format!("Change {number}"),
            html_url: format!("https://github.com/acme/widgets/pull/{number}"),
        }
    }

    pub fn detail(number: u64, state: MergeableState) -> PullRequestDetail {
        PullRequestDetail {
            repo: repo(),
            number,
            title: format!("Change {number}"),
            html_url: format!("https://github.com/acme/widgets/pull/{number}"),
            state: "open".to_string(),
            draft: false,
            mergeable: Some(state == MergeableState::Clean),
            mergeable_state: state,
            head: BranchTip {
                name: format!("feature-{number}"),
                sha: "head123".to_string(),
            },
            base: BranchTip {
                name: "main".to_string(),
                sha: "base123".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::github::MockGitHubOps;
    use mockall::predicate::*;

    #[tokio::test]
    async fn test_open_pull_requests_pages_until_short_page() {
        let mut github = MockGitHubOps::new();
        github
            .expect_current_user()
            .times(1)
            .returning(|| Ok("octo".to_string()));
        github
            .expect_search_open_pull_requests()
            .with(eq("octo"), always(), eq(SEARCH_PAGE_SIZE))
            .times(3)
            .returning(|_, page, _| {
                let size = if page < 3 { 100 } else { 37 };
                Ok((0..size).map(|n| pr(u64::from(page) * 1000 + n)).collect())
            });

        let settings = settings();
        let prs = Sweeper::new(&github, &settings).open_pull_requests().await.unwrap();
        assert_eq!(prs.len(), 237);
    }

    #[tokio::test]
    async fn test_configured_author_skips_identity_lookup() {
        let mut github = MockGitHubOps::new();
        github.expect_current_user().never();
        github
            .expect_search_open_pull_requests()
            .with(eq("someone-else"), eq(1), always())
            .returning(|_, _, _| Ok(vec![]));

        let settings = RunSettings {
            author: Some("someone-else".to_string()),
            ..settings()
        };
        let prs = Sweeper::new(&github, &settings).open_pull_requests().await.unwrap();
        assert!(prs.is_empty());
    }

    #[tokio::test]
    async fn test_authentication_failure_is_fatal() {
        let mut github = MockGitHubOps::new();
        github
            .expect_current_user()
            .returning(|| Err(GitHubError::Authentication("bad credentials".to_string())));

        let settings = settings();
        let err = Sweeper::new(&github, &settings)
            .open_pull_requests()
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_per_pull_request_errors_are_not_fatal() {
        let err = SweepError::GitHub(GitHubError::Api {
            status: 500,
            message: "boom".to_string(),
        });
        assert!(!err.is_fatal());
        assert!(!SweepError::NoWorkspace.is_fatal());
    }
}
