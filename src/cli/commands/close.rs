use anyhow::Result;
use tracing::Instrument;

use super::{find_pull_requests, finish, github_client, print_banner, run_span};
use crate::config::{RunSettings, SweepConfig};
use crate::report::Operation;
use crate::sweep::{CloseConfirmation, Sweeper};

pub struct CloseCommand {
    pub confirm: Option<String>,
    pub yes: bool,
}

impl CloseCommand {
    pub fn new() -> Self {
        Self {
            confirm: None,
            yes: false,
        }
    }

    pub fn with_confirm(mut self, confirm: Option<String>) -> Self {
        self.confirm = confirm;
        self
    }

    pub fn with_yes(mut self, yes: bool) -> Self {
        self.yes = yes;
        self
    }

    pub async fn execute(&self, config: &SweepConfig) -> Result<()> {
        let settings = RunSettings::from_config(config);
        // Checked before the client exists so an unconfirmed run touches nothing
        let confirmation = CloseConfirmation::check(self.confirm.as_deref(), self.yes, settings.dry_run)?;
        print_banner(Operation::Close, &settings);

        let github = github_client(config)?;
        let sweeper = Sweeper::new(&github, &settings);

        let results = async {
            let prs = find_pull_requests(&sweeper).await?;
            sweeper.close_all(&prs, confirmation).await
        }
        .instrument(run_span(Operation::Close, &settings))
        .await?;

        finish(Operation::Close, &settings, &results).await
    }
}

impl Default for CloseCommand {
    fn default() -> Self {
        Self::new()
    }
}
