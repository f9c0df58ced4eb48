// pr-sweep library: bulk operations on open GitHub pull requests
// The binary is a thin layer over these modules.

pub mod cli;
pub mod config;
pub mod conflicts;
pub mod external;
pub mod github;
pub mod http;
pub mod report;
pub mod sweep;
pub mod telemetry;

// Re-export key types for easy access
pub use config::{RunSettings, SweepConfig};
pub use conflicts::{apply_level, resolve_conflict_markers, EscalationSchedule};
pub use external::{CommandExecutor, GitWorkspace, ProcessCommandExecutor};
pub use github::{GitHubClient, GitHubError, GitHubOps, MergeMethod, PullRequestRef, RepoRef};
pub use http::RateLimitedHttpClient;
pub use report::{save_results, Operation, OperationResult, Tally};
pub use sweep::{CloseConfirmation, SweepError, Sweeper};
pub use telemetry::{create_run_span, generate_correlation_id, init_telemetry};
