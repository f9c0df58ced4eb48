use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

#[cfg(any(test, feature = "testing"))]
use mockall::automock;

use super::errors::GitHubError;
use super::search::{collect_pages, SEARCH_PAGE_SIZE};
use super::types::{
    BranchProtection, BranchTip, ChangedFile, CommitStatus, MergeMethod, MergeOutcome,
    MergeableState, PullRequestDetail, PullRequestRef, RepoRef, Review, ReviewState,
};
use crate::http::RateLimitedHttpClient;

/// Every forge call the sweeper makes. One implementation talks to GitHub;
/// tests substitute a mock.
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait GitHubOps: Send + Sync {
    /// Login of the authenticated user
    async fn current_user(&self) -> Result<String, GitHubError>;
    /// One 1-based page of open pull requests authored by `author`
    async fn search_open_pull_requests(
        &self,
        author: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<PullRequestRef>, GitHubError>;
    async fn pull_request(&self, repo: &RepoRef, number: u64) -> Result<PullRequestDetail, GitHubError>;
    async fn pull_request_files(&self, repo: &RepoRef, number: u64) -> Result<Vec<ChangedFile>, GitHubError>;
    async fn reviews(&self, repo: &RepoRef, number: u64) -> Result<Vec<Review>, GitHubError>;
    /// A rejected merge (conflicts, failing checks, missing approvals) is
    /// `Ok` with `merged == false`; only transport and auth problems are errors.
    async fn merge_pull_request(
        &self,
        repo: &RepoRef,
        number: u64,
        method: MergeMethod,
    ) -> Result<MergeOutcome, GitHubError>;
    async fn close_pull_request(&self, repo: &RepoRef, number: u64) -> Result<(), GitHubError>;
    async fn combined_status(&self, repo: &RepoRef, sha: &str) -> Result<CommitStatus, GitHubError>;
    /// `None` when the branch carries no protection rules
    async fn branch_protection(
        &self,
        repo: &RepoRef,
        branch: &str,
    ) -> Result<Option<BranchProtection>, GitHubError>;
    /// Head SHA of `branch`, `None` when the branch does not exist
    async fn branch_head(&self, repo: &RepoRef, branch: &str) -> Result<Option<String>, GitHubError>;
    async fn create_branch(&self, repo: &RepoRef, branch: &str, sha: &str) -> Result<(), GitHubError>;
    /// Force-move `branch` to `sha`
    async fn reset_branch(&self, repo: &RepoRef, branch: &str, sha: &str) -> Result<(), GitHubError>;
    async fn delete_branch(&self, repo: &RepoRef, branch: &str) -> Result<(), GitHubError>;
}

#[derive(Debug, Deserialize)]
struct RawUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RawSearchPage {
    #[serde(default)]
    items: Vec<RawSearchItem>,
}

#[derive(Debug, Deserialize)]
struct RawSearchItem {
    number: u64,
    title: String,
    html_url: String,
    repository_url: String,
}

#[derive(Debug, Deserialize)]
struct RawBranch {
    #[serde(rename = "ref")]
    ref_name: String,
    sha: String,
}

#[derive(Debug, Deserialize)]
struct RawPullRequest {
    number: u64,
    title: String,
    html_url: String,
    state: String,
    #[serde(default)]
    draft: bool,
    mergeable: Option<bool>,
    #[serde(default)]
    mergeable_state: Option<MergeableState>,
    head: RawBranch,
    base: RawBranch,
}

#[derive(Debug, Deserialize)]
struct RawReview {
    user: Option<RawUser>,
    state: ReviewState,
    submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct RawMergeResponse {
    merged: bool,
    sha: Option<String>,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct RawRef {
    object: RawRefObject,
}

#[derive(Debug, Deserialize)]
struct RawRefObject {
    sha: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawProtection {
    #[serde(default)]
    required_status_checks: Option<RawStatusChecks>,
    #[serde(default)]
    required_pull_request_reviews: Option<RawReviewRule>,
    #[serde(default)]
    enforce_admins: Option<RawEnabled>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawStatusChecks {
    #[serde(default)]
    contexts: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawReviewRule {
    #[serde(default)]
    required_approving_review_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawEnabled {
    enabled: bool,
}

#[derive(Debug, Serialize)]
struct SearchParams<'a> {
    q: &'a str,
    per_page: u32,
    page: u32,
}

#[derive(Debug, Serialize)]
struct PageParams {
    per_page: u32,
    page: u32,
}

/// GitHub REST implementation of [`GitHubOps`]
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: RateLimitedHttpClient,
}

impl GitHubClient {
    pub fn new(token: String, api_url: Option<&str>, requests_per_second: u32) -> Result<Self, GitHubError> {
        if token.trim().is_empty() {
            return Err(GitHubError::Authentication(
                "GitHub token not found. Pass --token or set GITHUB_TOKEN.".to_string(),
            ));
        }
        let http = RateLimitedHttpClient::new(token, api_url, requests_per_second)?;
        Ok(Self { http })
    }

    fn repo_route(repo: &RepoRef, tail: &str) -> String {
        format!("/repos/{}/{}/{}", repo.owner, repo.name, tail)
    }
}

#[async_trait]
impl GitHubOps for GitHubClient {
    async fn current_user(&self) -> Result<String, GitHubError> {
        let user: RawUser = self.http.get("/user", None::<&()>).await?;
        debug!(login = %user.login, "Resolved acting identity");
        Ok(user.login)
    }

    async fn search_open_pull_requests(
        &self,
        author: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<PullRequestRef>, GitHubError> {
        let query = super::search::open_pull_requests_query(author);
        let params = SearchParams {
            q: &query,
            per_page,
            page,
        };
        let result: RawSearchPage = self.http.get("/search/issues", Some(&params)).await?;

        // The query is restricted to `is:pr`, so every hit is a pull request
        result
            .items
            .into_iter()
            .map(|item| {
                Ok(PullRequestRef {
                    repo: RepoRef::from_api_url(&item.repository_url)?,
                    number: item.number,
                    title: item.title,
                    html_url: item.html_url,
                })
            })
            .collect()
    }

    async fn pull_request(&self, repo: &RepoRef, number: u64) -> Result<PullRequestDetail, GitHubError> {
        let raw: RawPullRequest = self
            .http
            .get(&Self::repo_route(repo, &format!("pulls/{number}")), None::<&()>)
            .await?;

        Ok(PullRequestDetail {
            repo: repo.clone(),
            number: raw.number,
            title: raw.title,
            html_url: raw.html_url,
            state: raw.state,
            draft: raw.draft,
            mergeable: raw.mergeable,
            mergeable_state: raw.mergeable_state.unwrap_or_default(),
            head: BranchTip {
                name: raw.head.ref_name,
                sha: raw.head.sha,
            },
            base: BranchTip {
                name: raw.base.ref_name,
                sha: raw.base.sha,
            },
        })
    }

    async fn pull_request_files(&self, repo: &RepoRef, number: u64) -> Result<Vec<ChangedFile>, GitHubError> {
        let route = Self::repo_route(repo, &format!("pulls/{number}/files"));
        collect_pages(SEARCH_PAGE_SIZE, |page| {
            let route = route.clone();
            async move {
                let params = PageParams {
                    per_page: SEARCH_PAGE_SIZE,
                    page,
                };
                self.http.get::<Vec<ChangedFile>, _>(&route, Some(&params)).await
            }
        })
        .await
    }

    async fn reviews(&self, repo: &RepoRef, number: u64) -> Result<Vec<Review>, GitHubError> {
        let route = Self::repo_route(repo, &format!("pulls/{number}/reviews"));
        let raw = collect_pages(SEARCH_PAGE_SIZE, |page| {
            let route = route.clone();
            async move {
                let params = PageParams {
                    per_page: SEARCH_PAGE_SIZE,
                    page,
                };
                self.http.get::<Vec<RawReview>, _>(&route, Some(&params)).await
            }
        })
        .await?;

        Ok(raw
            .into_iter()
            .map(|review| Review {
                reviewer: review.user.map(|u| u.login).unwrap_or_default(),
                state: review.state,
                submitted_at: review.submitted_at,
            })
            .collect())
    }

    async fn merge_pull_request(
        &self,
        repo: &RepoRef,
        number: u64,
        method: MergeMethod,
    ) -> Result<MergeOutcome, GitHubError> {
        let route = Self::repo_route(repo, &format!("pulls/{number}/merge"));
        let body = json!({ "merge_method": method.as_str() });

        match self.http.put::<RawMergeResponse, _>(&route, &body).await {
            Ok(response) => Ok(MergeOutcome {
                merged: response.merged,
                sha: response.sha,
                message: response.message,
            }),
            // 405 not mergeable, 409 head moved, 422 invalid state
            Err(GitHubError::Api { status, message }) if matches!(status, 405 | 409 | 422) => {
                info!(repo = %repo, number, status, %message, "Merge rejected");
                Ok(MergeOutcome::rejected(message))
            }
            Err(e) => Err(e),
        }
    }

    async fn close_pull_request(&self, repo: &RepoRef, number: u64) -> Result<(), GitHubError> {
        let route = Self::repo_route(repo, &format!("pulls/{number}"));
        let _: Value = self.http.patch(&route, &json!({ "state": "closed" })).await?;
        Ok(())
    }

    async fn combined_status(&self, repo: &RepoRef, sha: &str) -> Result<CommitStatus, GitHubError> {
        let route = Self::repo_route(repo, &format!("commits/{sha}/status"));
        self.http.get(&route, None::<&()>).await
    }

    async fn branch_protection(
        &self,
        repo: &RepoRef,
        branch: &str,
    ) -> Result<Option<BranchProtection>, GitHubError> {
        let route = Self::repo_route(repo, &format!("branches/{branch}/protection"));
        match self.http.get_cached::<RawProtection>(&route).await {
            Ok(raw) => Ok(Some(BranchProtection {
                required_status_checks: raw
                    .required_status_checks
                    .map(|checks| checks.contexts)
                    .unwrap_or_default(),
                required_approving_reviews: raw
                    .required_pull_request_reviews
                    .map(|rule| rule.required_approving_review_count)
                    .unwrap_or(0),
                enforce_admins: raw.enforce_admins.map(|e| e.enabled).unwrap_or(false),
            })),
            Err(GitHubError::NotFound(_)) => Ok(None),
            Err(GitHubError::Api { status: 403, message }) => {
                warn!(repo = %repo, branch, %message, "Not allowed to read branch protection");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn branch_head(&self, repo: &RepoRef, branch: &str) -> Result<Option<String>, GitHubError> {
        let route = Self::repo_route(repo, &format!("git/ref/heads/{branch}"));
        match self.http.get::<RawRef, _>(&route, None::<&()>).await {
            Ok(reference) => Ok(Some(reference.object.sha)),
            Err(GitHubError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_branch(&self, repo: &RepoRef, branch: &str, sha: &str) -> Result<(), GitHubError> {
        let route = Self::repo_route(repo, "git/refs");
        let body = json!({ "ref": format!("refs/heads/{branch}"), "sha": sha });
        let _: Value = self.http.post(&route, &body).await?;
        info!(repo = %repo, branch, sha, "Created branch");
        Ok(())
    }

    async fn reset_branch(&self, repo: &RepoRef, branch: &str, sha: &str) -> Result<(), GitHubError> {
        let route = Self::repo_route(repo, &format!("git/refs/heads/{branch}"));
        let body = json!({ "sha": sha, "force": true });
        let _: Value = self.http.patch(&route, &body).await?;
        self.http.invalidate_cache_pattern(&format!("branches/{branch}/")).await;
        info!(repo = %repo, branch, sha, "Reset branch");
        Ok(())
    }

    async fn delete_branch(&self, repo: &RepoRef, branch: &str) -> Result<(), GitHubError> {
        let route = Self::repo_route(repo, &format!("git/refs/heads/{branch}"));
        self.http.delete(&route).await?;
        info!(repo = %repo, branch, "Deleted branch");
        Ok(())
    }
}
