use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{CliOverrides, DEFAULT_CONFIG_FILE};
use crate::github::MergeMethod;

pub mod commands;

#[derive(Parser)]
#[command(name = "pr-sweep", version)]
#[command(about = "Bulk operations on your open GitHub pull requests")]
#[command(long_about = "pr-sweep finds every open pull request you authored and reports on, merges, \
                       closes, force-merges or resolves conflicts on all of them in one pass. \
                       Every run writes a JSON summary of what happened to each pull request.")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// GitHub token
    #[arg(long, global = true, help = "GitHub token (defaults to GITHUB_TOKEN, then GH_TOKEN)")]
    pub token: Option<String>,
    /// Report what would happen without changing anything
    #[arg(long, global = true, help = "Show what would happen without changing anything")]
    pub dry_run: bool,
    /// Fall back to force-merging when a merge is rejected
    #[arg(long, global = true, help = "Force-merge (with backup branch) when a merge is rejected")]
    pub force: bool,
    /// Directory for working copies
    #[arg(long, global = true, value_name = "DIR", help = "Directory for temporary working copies")]
    pub workdir: Option<PathBuf>,
    /// Deletion-ladder iteration cap
    #[arg(long, global = true, help = "Maximum deletion-ladder iterations per pull request")]
    pub max_iterations: Option<u32>,
    #[arg(long, global = true, value_enum, help = "Merge method to use first")]
    pub merge_method: Option<MergeMethod>,
    #[arg(long, global = true, help = "Sweep this user's pull requests instead of the token owner's")]
    pub author: Option<String>,
    #[arg(long, global = true, value_name = "MS", help = "Pause between pull requests in milliseconds")]
    pub pause_ms: Option<u64>,
    #[arg(long, global = true, value_name = "DIR", help = "Directory for JSON result files")]
    pub output_dir: Option<PathBuf>,
    #[arg(long, global = true, value_name = "URL", help = "GitHub API base URL (GitHub Enterprise)")]
    pub api_url: Option<String>,
    #[arg(long, global = true, value_name = "FILE", help = "Configuration file (default: pr-sweep.toml)")]
    pub config: Option<PathBuf>,
}

impl GlobalArgs {
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            token: self.token.clone(),
            api_url: self.api_url.clone(),
            author: self.author.clone(),
            dry_run: self.dry_run,
            force: self.force,
            merge_method: self.merge_method,
            pause_ms: self.pause_ms,
            max_iterations: self.max_iterations,
            work_dir: self.workdir.clone(),
            output_dir: self.output_dir.clone(),
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show mergeability, CI state, approvals and size of every open pull request
    Status,
    /// Merge every open pull request
    Merge {
        /// Resolve conflicted pull requests before merging them
        #[arg(long, help = "Run conflict resolution on conflicted pull requests first")]
        resolve: bool,
    },
    /// Close every open pull request
    Close {
        /// Confirmation token; must be exactly CLOSE
        #[arg(long, value_name = "TOKEN", help = "Confirm by passing the word CLOSE")]
        confirm: Option<String>,
        /// Skip the confirmation token
        #[arg(short = 'y', long, help = "Close without a confirmation token")]
        yes: bool,
    },
    /// Force-merge every open pull request behind a backup of its base branch
    Force,
    /// Merge the base into conflicted pull requests and strip conflict markers
    Resolve,
    /// Write a configuration file with the default settings
    InitConfig {
        #[arg(long, default_value = DEFAULT_CONFIG_FILE, help = "Where to write the file")]
        path: PathBuf,
        #[arg(long, help = "Replace an existing file")]
        overwrite: bool,
    },
}
