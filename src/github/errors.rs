use octocrab::Error as OctocrabError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("GitHub authentication failed: {0}")]
    Authentication(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("GitHub API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },
    #[error("Network error talking to GitHub: {0}")]
    Transport(String),
    #[error("Unexpected response from GitHub: {0}")]
    Decode(String),
    #[error("Invalid repository reference: {0}")]
    InvalidRepository(String),
    #[error("Backup branch '{branch}' is missing; base branch '{base}' was not rolled back")]
    BackupMissing { branch: String, base: String },
}

impl GitHubError {
    pub fn is_authentication(&self) -> bool {
        matches!(self, GitHubError::Authentication(_))
    }

    /// Hints printed under a fatal error, mirroring the troubleshooting blocks the CLI shows
    pub fn troubleshooting(&self) -> &'static [&'static str] {
        match self {
            GitHubError::Authentication(_) => &[
                "→ Pass a token: pr-sweep --token <TOKEN> <command>",
                "→ Or export GITHUB_TOKEN=\"$(gh auth token)\"",
                "→ Create token at: https://github.com/settings/tokens (needs 'repo' scope)",
            ],
            GitHubError::Transport(_) => &[
                "→ Test HTTPS: curl -I https://api.github.com",
                "→ Check proxy settings: HTTPS_PROXY",
                "→ GitHub status: https://status.github.com",
            ],
            GitHubError::Api { status: 403, .. } => &[
                "→ Token lacks required permissions or the rate limit is exhausted",
                "→ Check rate limits: gh api rate_limit",
            ],
            _ => &["→ Check authentication: gh auth status"],
        }
    }
}

impl From<OctocrabError> for GitHubError {
    fn from(err: OctocrabError) -> Self {
        match err {
            OctocrabError::GitHub { source, .. } => {
                let status = source.status_code.as_u16();
                match status {
                    401 => GitHubError::Authentication(source.message.clone()),
                    404 => GitHubError::NotFound(source.message.clone()),
                    _ => GitHubError::Api {
                        status,
                        message: source.message.clone(),
                    },
                }
            }
            OctocrabError::Serde { source, .. } => GitHubError::Decode(source.to_string()),
            OctocrabError::Json { source, .. } => GitHubError::Decode(source.to_string()),
            other => GitHubError::Transport(other.to_string()),
        }
    }
}
