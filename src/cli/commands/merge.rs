use anyhow::Result;
use tracing::Instrument;

use super::{find_pull_requests, finish, github_client, open_workspace, print_banner, run_span};
use crate::config::{RunSettings, SweepConfig};
use crate::report::Operation;
use crate::sweep::Sweeper;

pub struct MergeCommand {
    pub resolve_conflicts: bool,
}

impl MergeCommand {
    pub fn new() -> Self {
        Self {
            resolve_conflicts: false,
        }
    }

    pub fn with_resolve_conflicts(mut self, resolve_conflicts: bool) -> Self {
        self.resolve_conflicts = resolve_conflicts;
        self
    }

    pub async fn execute(&self, config: &SweepConfig) -> Result<()> {
        let settings = RunSettings {
            resolve_conflicts: self.resolve_conflicts,
            ..RunSettings::from_config(config)
        };
        print_banner(Operation::Merge, &settings);

        let github = github_client(config)?;
        // Conflict resolution and the local force fallback both need a clone
        let workspace = if (settings.resolve_conflicts || settings.force) && !settings.dry_run {
            Some(open_workspace(config, &settings)?)
        } else {
            None
        };
        let mut sweeper = Sweeper::new(&github, &settings);
        if let Some(workspace) = &workspace {
            sweeper = sweeper.with_workspace(workspace);
        }

        let results = async {
            let prs = find_pull_requests(&sweeper).await?;
            sweeper.merge_all(&prs).await
        }
        .instrument(run_span(Operation::Merge, &settings))
        .await?;

        finish(Operation::Merge, &settings, &results).await
    }
}

impl Default for MergeCommand {
    fn default() -> Self {
        Self::new()
    }
}
