use anyhow::Result;
use tracing::Instrument;

use super::{find_pull_requests, finish, github_client, print_banner, run_span};
use crate::config::{RunSettings, SweepConfig};
use crate::report::Operation;
use crate::sweep::Sweeper;

pub struct StatusCommand;

impl StatusCommand {
    pub fn new() -> Self {
        Self
    }

    pub async fn execute(&self, config: &SweepConfig) -> Result<()> {
        let settings = RunSettings::from_config(config);
        print_banner(Operation::Status, &settings);

        let github = github_client(config)?;
        let sweeper = Sweeper::new(&github, &settings);

        let results = async {
            let prs = find_pull_requests(&sweeper).await?;
            sweeper.status_all(&prs).await
        }
        .instrument(run_span(Operation::Status, &settings))
        .await?;

        finish(Operation::Status, &settings, &results).await
    }
}

impl Default for StatusCommand {
    fn default() -> Self {
        Self::new()
    }
}
