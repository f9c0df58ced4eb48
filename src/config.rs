use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::conflicts::MAX_LEVEL;
use crate::external::CommitIdentity;
use crate::github::MergeMethod;

pub const DEFAULT_CONFIG_FILE: &str = "pr-sweep.toml";
const ENV_PREFIX: &str = "PR_SWEEP";

/// Main configuration structure for pr-sweep
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SweepConfig {
    pub github: GitHubConfig,
    pub sweep: SweepSection,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// API token; falls back to GITHUB_TOKEN, then GH_TOKEN
    pub token: Option<String>,
    /// REST endpoint, for GitHub Enterprise
    pub api_url: Option<String>,
    /// Whose pull requests to sweep; defaults to the token's owner
    pub author: Option<String>,
    pub requests_per_second: u32,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: None,
            author: None,
            requests_per_second: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SweepSection {
    pub dry_run: bool,
    pub force: bool,
    pub merge_method: MergeMethod,
    /// Pause between pull requests
    pub pause_ms: u64,
    /// Cap on deletion-ladder retries per pull request
    pub max_iterations: u32,
    /// First ladder level tried
    pub start_level: u8,
    pub keep_backups: bool,
    pub backup_prefix: String,
    /// Where JSON result files go
    pub output_dir: PathBuf,
    /// Where working copies are cloned
    pub work_dir: PathBuf,
    pub commit_name: String,
    pub commit_email: String,
}

impl Default for SweepSection {
    fn default() -> Self {
        Self {
            dry_run: false,
            force: false,
            merge_method: MergeMethod::Merge,
            pause_ms: 2000,
            max_iterations: 10,
            start_level: 1,
            keep_backups: false,
            backup_prefix: "pr-sweep-backup".to_string(),
            output_dir: PathBuf::from("."),
            work_dir: std::env::temp_dir().join("pr-sweep"),
            commit_name: "pr-sweep".to_string(),
            commit_email: "pr-sweep@users.noreply.github.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

/// Values given on the command line; `None` and `false` leave the
/// configured value alone
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub token: Option<String>,
    pub api_url: Option<String>,
    pub author: Option<String>,
    pub dry_run: bool,
    pub force: bool,
    pub merge_method: Option<MergeMethod>,
    pub pause_ms: Option<u64>,
    pub max_iterations: Option<u32>,
    pub work_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
}

impl SweepConfig {
    /// Load configuration with precedence, lowest first:
    /// 1. Default values
    /// 2. `pr-sweep.toml`, or the file passed with `--config`
    /// 3. Environment variables (`PR_SWEEP_SWEEP__PAUSE_MS=500`)
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, Self::environment())
    }

    fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    fn load_with_env(path: Option<&Path>, env: Environment) -> Result<Self> {
        let mut builder = Config::builder();

        builder = match path {
            Some(path) => builder.add_source(File::from(path).required(true)),
            None => builder.add_source(File::from(Path::new(DEFAULT_CONFIG_FILE)).required(false)),
        };
        builder = builder.add_source(env);

        let config = builder.build().context("Failed to read configuration")?;
        let mut sweep_config: SweepConfig = config
            .try_deserialize()
            .context("Invalid configuration")?;

        if sweep_config.github.token.is_none() {
            sweep_config.github.token = std::env::var("GITHUB_TOKEN")
                .or_else(|_| std::env::var("GH_TOKEN"))
                .ok()
                .filter(|token| !token.trim().is_empty());
        }

        Ok(sweep_config)
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::debug!("Loaded environment variables from .env file");
        }
        Ok(())
    }

    pub fn apply_overrides(&mut self, overrides: CliOverrides) {
        if let Some(token) = overrides.token {
            self.github.token = Some(token);
        }
        if let Some(api_url) = overrides.api_url {
            self.github.api_url = Some(api_url);
        }
        if let Some(author) = overrides.author {
            self.github.author = Some(author);
        }
        self.sweep.dry_run |= overrides.dry_run;
        self.sweep.force |= overrides.force;
        if let Some(method) = overrides.merge_method {
            self.sweep.merge_method = method;
        }
        if let Some(pause_ms) = overrides.pause_ms {
            self.sweep.pause_ms = pause_ms;
        }
        if let Some(max_iterations) = overrides.max_iterations {
            self.sweep.max_iterations = max_iterations;
        }
        if let Some(work_dir) = overrides.work_dir {
            self.sweep.work_dir = work_dir;
        }
        if let Some(output_dir) = overrides.output_dir {
            self.sweep.output_dir = output_dir;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.github.requests_per_second == 0 {
            bail!("github.requests_per_second must be at least 1");
        }
        if !(1..=MAX_LEVEL).contains(&self.sweep.start_level) {
            bail!("sweep.start_level must be between 1 and {MAX_LEVEL}");
        }
        if self.sweep.backup_prefix.trim_matches('/').is_empty() {
            bail!("sweep.backup_prefix must not be empty");
        }
        Ok(())
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }
}

/// Everything a sweep reads while it runs. Built once from the loaded
/// configuration and passed by reference into every operation.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub author: Option<String>,
    pub dry_run: bool,
    pub force: bool,
    /// Run the resolve flow for conflicted pull requests during a merge sweep
    pub resolve_conflicts: bool,
    pub merge_method: MergeMethod,
    pub pause: Duration,
    pub max_iterations: u32,
    pub start_level: u8,
    pub keep_backups: bool,
    pub backup_prefix: String,
    pub output_dir: PathBuf,
    pub work_dir: PathBuf,
    pub commit_identity: CommitIdentity,
}

impl RunSettings {
    pub fn from_config(config: &SweepConfig) -> Self {
        let sweep = &config.sweep;
        Self {
            author: config.github.author.clone(),
            dry_run: sweep.dry_run,
            force: sweep.force,
            resolve_conflicts: false,
            merge_method: sweep.merge_method,
            pause: Duration::from_millis(sweep.pause_ms),
            max_iterations: sweep.max_iterations,
            start_level: sweep.start_level.clamp(1, MAX_LEVEL),
            keep_backups: sweep.keep_backups,
            backup_prefix: sweep.backup_prefix.clone(),
            output_dir: sweep.output_dir.clone(),
            work_dir: sweep.work_dir.clone(),
            commit_identity: CommitIdentity {
                name: sweep.commit_name.clone(),
                email: sweep.commit_email.clone(),
            },
        }
    }
}

impl Default for RunSettings {
    fn default() -> Self {
        Self::from_config(&SweepConfig::default())
    }
}
