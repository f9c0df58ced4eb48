pub mod branches;
pub mod client;
pub mod errors;
pub mod search;
pub mod types;

pub use branches::{backup_branch_name, BackupBranch, BranchHandler};
pub use client::{GitHubClient, GitHubOps};
#[cfg(any(test, feature = "testing"))]
pub use client::MockGitHubOps;
pub use errors::GitHubError;
pub use search::{collect_pages, SEARCH_PAGE_SIZE};
pub use types::{
    ApprovalSummary, BranchProtection, BranchTip, ChangedFile, CiState, CommitStatus, MergeMethod,
    MergeOutcome, MergeableState, PullRequestDetail, PullRequestRef, RepoRef, Review, ReviewState,
};
