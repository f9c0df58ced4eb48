use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use crate::config::{RunSettings, SweepConfig};
use crate::external::{GitHost, GitWorkspace, ProcessCommandExecutor};
use crate::github::{GitHubClient, GitHubError, PullRequestRef};
use crate::report::{save_results, Operation, OperationResult, Tally};
use crate::sweep::{SweepError, Sweeper};
use crate::telemetry::{create_run_span, generate_correlation_id};

pub mod close;
pub mod force;
pub mod init_config;
pub mod merge;
pub mod resolve;
pub mod status;

pub use close::CloseCommand;
pub use force::ForceCommand;
pub use init_config::InitConfigCommand;
pub use merge::MergeCommand;
pub use resolve::ResolveCommand;
pub use status::StatusCommand;

pub fn github_client(config: &SweepConfig) -> Result<GitHubClient> {
    let token = config.github.token.clone().unwrap_or_default();
    Ok(GitHubClient::new(
        token,
        config.github.api_url.as_deref(),
        config.github.requests_per_second,
    )?)
}

pub fn open_workspace(config: &SweepConfig, settings: &RunSettings) -> Result<GitWorkspace> {
    let token = config.github.token.clone().unwrap_or_default();
    let workspace = GitWorkspace::open(
        Arc::new(ProcessCommandExecutor),
        &settings.work_dir,
        token,
        settings.commit_identity.clone(),
    )?
    .with_host(GitHost::from_api_url(config.github.api_url.as_deref()));
    Ok(workspace)
}

pub fn print_banner(operation: Operation, settings: &RunSettings) {
    let title = format!("PR SWEEP: {}", operation.as_str().to_uppercase());
    if settings.dry_run {
        println!("🧹 {title} (DRY RUN)");
    } else {
        println!("🧹 {title}");
    }
    println!("==========================================");
    println!();
}

/// Open span shared by every record of one run
pub fn run_span(operation: Operation, settings: &RunSettings) -> tracing::Span {
    let correlation_id = generate_correlation_id();
    create_run_span(operation.as_str(), &correlation_id, settings.dry_run)
}

pub async fn find_pull_requests(sweeper: &Sweeper<'_>) -> Result<Vec<PullRequestRef>, SweepError> {
    print!("🔍 Searching for open pull requests... ");
    std::io::Write::flush(&mut std::io::stdout())?;
    let prs = sweeper.open_pull_requests().await?;
    println!("✅ {} found", prs.len());
    println!();
    Ok(prs)
}

/// Save the JSON summary and print the tally
pub async fn finish(operation: Operation, settings: &RunSettings, results: &[OperationResult]) -> Result<()> {
    let tally = Tally::of(results);
    println!();
    println!("📊 {tally}");

    if results.is_empty() {
        info!("No pull requests, no report written");
        return Ok(());
    }
    let path = save_results(&settings.output_dir, operation, results, Utc::now()).await?;
    println!("📝 Results saved to {}", path.display());
    Ok(())
}

/// Print the troubleshooting hints that belong to a fatal error, if any
pub fn print_troubleshooting(error: &anyhow::Error) {
    let github = error
        .downcast_ref::<SweepError>()
        .and_then(|e| match e {
            SweepError::GitHub(inner) => Some(inner),
            _ => None,
        })
        .or_else(|| error.downcast_ref::<GitHubError>());

    if let Some(github) = github {
        eprintln!();
        eprintln!("🔧 Troubleshooting:");
        for hint in github.troubleshooting() {
            eprintln!("   {hint}");
        }
    }
}
