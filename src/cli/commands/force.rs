use anyhow::Result;
use tracing::Instrument;

use super::{find_pull_requests, finish, github_client, open_workspace, print_banner, run_span};
use crate::config::{RunSettings, SweepConfig};
use crate::report::Operation;
use crate::sweep::Sweeper;

pub struct ForceCommand;

impl ForceCommand {
    pub fn new() -> Self {
        Self
    }

    pub async fn execute(&self, config: &SweepConfig) -> Result<()> {
        let settings = RunSettings {
            force: true,
            ..RunSettings::from_config(config)
        };
        print_banner(Operation::Force, &settings);
        if !settings.dry_run {
            println!("⚠️  Base branches are backed up before each forced merge");
            println!();
        }

        let github = github_client(config)?;
        let workspace = if settings.dry_run {
            None
        } else {
            Some(open_workspace(config, &settings)?)
        };
        let mut sweeper = Sweeper::new(&github, &settings);
        if let Some(workspace) = &workspace {
            sweeper = sweeper.with_workspace(workspace);
        }

        let results = async {
            let prs = find_pull_requests(&sweeper).await?;
            sweeper.force_all(&prs).await
        }
        .instrument(run_span(Operation::Force, &settings))
        .await?;

        finish(Operation::Force, &settings, &results).await
    }
}

impl Default for ForceCommand {
    fn default() -> Self {
        Self::new()
    }
}
