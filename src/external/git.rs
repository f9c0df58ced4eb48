//! Git working copies
//!
//! [`GitWorkspace`] owns the work directory for a whole run and hands out one
//! [`Checkout`] per pull request. All git calls go through the shared
//! [`CommandExecutor`].

use fd_lock::{RwLock, RwLockWriteGuard};
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::command::{CommandError, CommandExecutor, CommandOutput};
use crate::github::RepoRef;

pub const LOCK_FILE: &str = ".pr-sweep.lock";
const PUBLIC_API_HOST: &str = "api.github.com";
const PUBLIC_GIT_HOST: &str = "github.com";

#[derive(Debug, Error)]
pub enum GitError {
    #[error("Work directory {path} is in use by another sweep")]
    WorkspaceBusy { path: String },
    #[error("Git authentication failed for {repo}")]
    AuthenticationFailed { repo: String },
    #[error("Branch not found on remote: {branch}")]
    BranchNotFound { branch: String },
    #[error("Push rejected: {message}")]
    PushRejected { message: String },
    #[error("git {command} failed: {message}")]
    GitCommandFailed { command: String, message: String },
    #[error("Command execution error: {source}")]
    CommandError {
        #[from]
        source: CommandError,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitIdentity {
    pub name: String,
    pub email: String,
}

/// Where clones and pushes go. Follows the REST API host, so a GitHub
/// Enterprise `api_url` such as `https://ghe.example.com/api/v3` clones from
/// `https://ghe.example.com`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitHost {
    scheme: String,
    authority: String,
}

impl GitHost {
    pub fn from_api_url(api_url: Option<&str>) -> Self {
        let Some(url) = api_url.map(str::trim).filter(|url| !url.is_empty()) else {
            return Self::default();
        };
        let (scheme, rest) = url.split_once("://").unwrap_or(("https", url));
        let authority = rest.split('/').next().unwrap_or_default();
        if authority.is_empty() {
            return Self::default();
        }
        let authority = if authority.eq_ignore_ascii_case(PUBLIC_API_HOST) {
            PUBLIC_GIT_HOST
        } else {
            authority
        };
        Self {
            scheme: scheme.to_ascii_lowercase(),
            authority: authority.to_string(),
        }
    }

    fn clone_url(&self, token: &str, repo: &RepoRef) -> String {
        format!(
            "{}://x-access-token:{}@{}/{}/{}.git",
            self.scheme, token, self.authority, repo.owner, repo.name
        )
    }
}

impl Default for GitHost {
    fn default() -> Self {
        Self {
            scheme: "https".to_string(),
            authority: PUBLIC_GIT_HOST.to_string(),
        }
    }
}

/// Result of `merge --no-commit` and `merge -X theirs`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeState {
    Clean,
    Conflicted(Vec<String>),
}

/// The run's work directory, locked for as long as this value lives
pub struct GitWorkspace {
    executor: Arc<dyn CommandExecutor>,
    root: PathBuf,
    host: GitHost,
    token: String,
    identity: CommitIdentity,
    _lock_guard: RwLockWriteGuard<'static, File>,
}

impl fmt::Debug for GitWorkspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitWorkspace")
            .field("root", &self.root)
            .field("host", &self.host)
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

impl GitWorkspace {
    /// Create `root` if needed and take its lock file. A second sweep pointed
    /// at the same directory fails here.
    pub fn open(
        executor: Arc<dyn CommandExecutor>,
        root: impl Into<PathBuf>,
        token: String,
        identity: CommitIdentity,
    ) -> Result<Self, GitError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;

        let lock_file = File::create(root.join(LOCK_FILE))?;
        let lock = Box::leak(Box::new(RwLock::new(lock_file)));
        let guard = lock.try_write().map_err(|_| GitError::WorkspaceBusy {
            path: root.display().to_string(),
        })?;

        debug!(root = %root.display(), "Locked work directory");
        Ok(Self {
            executor,
            root,
            host: GitHost::default(),
            token,
            identity,
            _lock_guard: guard,
        })
    }

    /// Clone and push against `host` instead of github.com
    pub fn with_host(mut self, host: GitHost) -> Self {
        self.host = host;
        self
    }

    /// Fresh clone of `branch` at `<root>/<owner>-<repo>-<number>`. Whatever
    /// was left there by an earlier run is removed first.
    pub async fn checkout(&self, repo: &RepoRef, branch: &str, number: u64) -> Result<Checkout<'_>, GitError> {
        let path = self
            .root
            .join(format!("{}-{}-{}", repo.owner, repo.name, number));
        if tokio::fs::try_exists(&path).await? {
            debug!(path = %path.display(), "Removing stale working copy");
            tokio::fs::remove_dir_all(&path).await?;
        }

        let url = self.host.clone_url(&self.token, repo);
        let target = path.to_string_lossy().to_string();
        let args = ["clone", "--quiet", "--branch", branch, url.as_str(), target.as_str()];
        let output = self.executor.execute("git", &args).await?;
        if !output.success() {
            return Err(self.classify(repo, branch, "clone", &output));
        }

        info!(repo = %repo, branch, path = %path.display(), "📥 Cloned working copy");
        Ok(Checkout {
            workspace: self,
            repo: repo.clone(),
            path,
        })
    }

    fn redact(&self, text: &str) -> String {
        if self.token.is_empty() {
            text.to_string()
        } else {
            text.replace(&self.token, "***")
        }
    }

    fn classify(&self, repo: &RepoRef, branch: &str, command: &str, output: &CommandOutput) -> GitError {
        let stderr = self.redact(output.stderr.trim());
        if stderr.contains("Authentication failed") || stderr.contains("could not read Username") {
            GitError::AuthenticationFailed {
                repo: repo.full_name(),
            }
        } else if (stderr.contains("Remote branch") && stderr.contains("not found"))
            || stderr.contains("couldn't find remote ref")
        {
            GitError::BranchNotFound {
                branch: branch.to_string(),
            }
        } else if command == "push" && stderr.contains("rejected") {
            GitError::PushRejected { message: stderr }
        } else {
            GitError::GitCommandFailed {
                command: command.to_string(),
                message: stderr,
            }
        }
    }
}

/// One cloned pull-request branch inside the workspace
#[derive(Debug)]
pub struct Checkout<'a> {
    workspace: &'a GitWorkspace,
    repo: RepoRef,
    path: PathBuf,
}

impl Checkout<'_> {
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn git(&self, args: &[&str]) -> Result<CommandOutput, GitError> {
        let path = self.path.to_string_lossy();
        let name = format!("user.name={}", self.workspace.identity.name);
        let email = format!("user.email={}", self.workspace.identity.email);
        let mut full = vec!["-C", &*path, "-c", name.as_str(), "-c", email.as_str()];
        full.extend_from_slice(args);
        Ok(self.workspace.executor.execute("git", &full).await?)
    }

    async fn run(&self, args: &[&str], branch: &str) -> Result<String, GitError> {
        let output = self.git(args).await?;
        if !output.success() {
            let command = args.first().copied().unwrap_or("git");
            return Err(self.workspace.classify(&self.repo, branch, command, &output));
        }
        Ok(output.stdout.trim().to_string())
    }

    pub async fn fetch(&self, branch: &str) -> Result<(), GitError> {
        self.run(&["fetch", "--quiet", "origin", branch], branch).await?;
        Ok(())
    }

    /// `merge --no-commit --no-ff <rev>`. A failed merge that leaves no
    /// conflicted paths is an error rather than a conflict.
    pub async fn merge_no_commit(&self, rev: &str) -> Result<MergeState, GitError> {
        let output = self.git(&["merge", "--no-commit", "--no-ff", rev]).await?;
        if output.success() {
            return Ok(MergeState::Clean);
        }

        let paths = self.conflicted_paths().await?;
        if paths.is_empty() {
            return Err(self.workspace.classify(&self.repo, rev, "merge", &output));
        }
        Ok(MergeState::Conflicted(paths))
    }

    /// `merge -X theirs --no-edit <rev>`. Conflicts the strategy could not
    /// settle come back as paths; any other failure is an error.
    pub async fn merge_theirs(&self, rev: &str) -> Result<MergeState, GitError> {
        let output = self.git(&["merge", "-X", "theirs", "--no-edit", rev]).await?;
        if output.success() {
            return Ok(MergeState::Clean);
        }

        let paths = self.conflicted_paths().await?;
        if paths.is_empty() {
            return Err(self.workspace.classify(&self.repo, rev, "merge", &output));
        }
        debug!(rev, files = paths.len(), "Strategy merge stopped on conflicts");
        Ok(MergeState::Conflicted(paths))
    }

    pub async fn conflicted_paths(&self) -> Result<Vec<String>, GitError> {
        let stdout = self
            .run(&["diff", "--name-only", "--diff-filter=U"], "HEAD")
            .await?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    pub async fn stage_all(&self) -> Result<(), GitError> {
        self.run(&["add", "-A"], "HEAD").await?;
        Ok(())
    }

    /// `false` when there was nothing to commit
    pub async fn commit(&self, message: &str) -> Result<bool, GitError> {
        let output = self.git(&["commit", "--no-verify", "-m", message]).await?;
        if output.success() {
            return Ok(true);
        }
        if output.stdout.contains("nothing to commit") || output.stderr.contains("nothing to commit") {
            return Ok(false);
        }
        Err(self.workspace.classify(&self.repo, "HEAD", "commit", &output))
    }

    /// Push `HEAD` to `branch` on origin
    pub async fn push(&self, branch: &str, force: bool) -> Result<(), GitError> {
        let refspec = format!("HEAD:refs/heads/{branch}");
        let mut args = vec!["push", "--quiet", "origin", refspec.as_str()];
        if force {
            args.push("--force");
        }
        self.run(&args, branch).await?;
        info!(repo = %self.repo, branch, force, "📤 Pushed");
        Ok(())
    }

    pub async fn reset_hard(&self, rev: &str) -> Result<(), GitError> {
        self.run(&["reset", "--hard", rev], rev).await?;
        Ok(())
    }

    /// Contents of a file in the working copy. Deleted and non-UTF-8 files
    /// read as `None`.
    pub async fn read_file(&self, relative: &str) -> Result<Option<String>, GitError> {
        match tokio::fs::read_to_string(self.path.join(relative)).await {
            Ok(text) => Ok(Some(text)),
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::NotFound | std::io::ErrorKind::InvalidData
                ) =>
            {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn write_file(&self, relative: &str, text: &str) -> Result<(), GitError> {
        tokio::fs::write(self.path.join(relative), text).await?;
        Ok(())
    }

    /// Delete the working copy; failure only warns
    pub async fn discard(self) {
        if let Err(e) = tokio::fs::remove_dir_all(&self.path).await {
            warn!(path = %self.path.display(), error = %e, "Could not remove working copy");
        }
    }
}
