use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use super::errors::GitHubError;

/// A repository on the forge, addressed as `owner/name`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// Parse `owner/name`
    pub fn parse(full_name: &str) -> Result<Self, GitHubError> {
        match full_name.trim().split_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
                Ok(Self::new(owner, name))
            }
            _ => Err(GitHubError::InvalidRepository(full_name.to_string())),
        }
    }

    /// Parse the `repository_url` field of a search hit,
    /// e.g. `https://api.github.com/repos/acme/widgets`
    pub fn from_api_url(url: &str) -> Result<Self, GitHubError> {
        let tail = url
            .rsplit_once("/repos/")
            .map(|(_, tail)| tail)
            .ok_or_else(|| GitHubError::InvalidRepository(url.to_string()))?;
        Self::parse(tail.trim_end_matches('/'))
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// One open pull request returned by the search endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PullRequestRef {
    pub repo: RepoRef,
    pub number: u64,
    pub title: String,
    pub html_url: String,
}

/// Forge-computed merge readiness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeableState {
    Clean,
    Dirty,
    Blocked,
    Behind,
    Unstable,
    HasHooks,
    Draft,
    #[serde(other)]
    Unknown,
}

impl Default for MergeableState {
    fn default() -> Self {
        MergeableState::Unknown
    }
}

impl fmt::Display for MergeableState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MergeableState::Clean => "clean",
            MergeableState::Dirty => "dirty",
            MergeableState::Blocked => "blocked",
            MergeableState::Behind => "behind",
            MergeableState::Unstable => "unstable",
            MergeableState::HasHooks => "has_hooks",
            MergeableState::Draft => "draft",
            MergeableState::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchTip {
    pub name: String,
    pub sha: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PullRequestDetail {
    pub repo: RepoRef,
    pub number: u64,
    pub title: String,
    pub html_url: String,
    pub state: String,
    pub draft: bool,
    pub mergeable: Option<bool>,
    pub mergeable_state: MergeableState,
    pub head: BranchTip,
    pub base: BranchTip,
}

impl PullRequestDetail {
    pub fn has_conflicts(&self) -> bool {
        self.mergeable_state == MergeableState::Dirty
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFile {
    pub filename: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
}

impl ChangedFile {
    pub fn is_removed(&self) -> bool {
        self.status == "removed"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewState {
    Approved,
    ChangesRequested,
    Commented,
    Dismissed,
    Pending,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Review {
    pub reviewer: String,
    pub state: ReviewState,
    pub submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ApprovalSummary {
    pub approved: usize,
    pub changes_requested: usize,
}

impl ApprovalSummary {
    /// Count approvals from the latest non-comment review of each reviewer
    pub fn from_reviews(reviews: &[Review]) -> Self {
        let mut latest: HashMap<&str, &Review> = HashMap::new();

        for review in reviews {
            if matches!(review.state, ReviewState::Commented | ReviewState::Pending) {
                continue;
            }
            let newer = latest
                .get(review.reviewer.as_str())
                .map_or(true, |existing| review.submitted_at >= existing.submitted_at);
            if newer {
                latest.insert(review.reviewer.as_str(), review);
            }
        }

        let approved = latest
            .values()
            .filter(|r| r.state == ReviewState::Approved)
            .count();
        let changes_requested = latest
            .values()
            .filter(|r| r.state == ReviewState::ChangesRequested)
            .count();

        Self {
            approved,
            changes_requested,
        }
    }
}

/// Aggregate CI state of a commit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CiState {
    Success,
    Pending,
    Failure,
    Error,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for CiState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CiState::Success => "success",
            CiState::Pending => "pending",
            CiState::Failure => "failure",
            CiState::Error => "error",
            CiState::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitStatus {
    pub state: CiState,
    #[serde(default)]
    pub total_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchProtection {
    pub required_status_checks: Vec<String>,
    pub required_approving_reviews: u32,
    pub enforce_admins: bool,
}

/// Merge strategy accepted by the merge endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MergeMethod {
    Merge,
    Squash,
    Rebase,
}

impl MergeMethod {
    pub const ALL: [MergeMethod; 3] = [MergeMethod::Merge, MergeMethod::Squash, MergeMethod::Rebase];

    pub fn as_str(&self) -> &'static str {
        match self {
            MergeMethod::Merge => "merge",
            MergeMethod::Squash => "squash",
            MergeMethod::Rebase => "rebase",
        }
    }

    /// `self` first, then the remaining methods in their usual order
    pub fn fallback_order(self) -> Vec<MergeMethod> {
        std::iter::once(self)
            .chain(Self::ALL.into_iter().filter(move |m| *m != self))
            .collect()
    }
}

impl fmt::Display for MergeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeOutcome {
    pub merged: bool,
    pub sha: Option<String>,
    pub message: String,
}

impl MergeOutcome {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            merged: false,
            sha: None,
            message: message.into(),
        }
    }
}
