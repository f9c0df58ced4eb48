use anyhow::{bail, Result};
use std::path::PathBuf;

use crate::config::SweepConfig;

/// Writes a configuration file holding every default
pub struct InitConfigCommand {
    pub path: PathBuf,
    pub overwrite: bool,
}

impl InitConfigCommand {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            overwrite: false,
        }
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn execute(&self) -> Result<()> {
        if self.path.exists() && !self.overwrite {
            bail!(
                "{} already exists; pass --overwrite to replace it",
                self.path.display()
            );
        }

        SweepConfig::default().save_to_file(&self.path)?;
        println!("📝 Wrote default configuration to {}", self.path.display());
        println!("   Keep your token in GITHUB_TOKEN rather than in this file.");
        Ok(())
    }
}
