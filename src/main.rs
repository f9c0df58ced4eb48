use anyhow::Result;
use clap::{CommandFactory, Parser};
use std::process::ExitCode;

use pr_sweep::cli::commands::{
    print_troubleshooting, CloseCommand, ForceCommand, InitConfigCommand, MergeCommand,
    ResolveCommand, StatusCommand,
};
use pr_sweep::cli::{Cli, Commands, GlobalArgs};
use pr_sweep::config::SweepConfig;
use pr_sweep::telemetry::init_telemetry;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ {e:#}");
            print_troubleshooting(&e);
            ExitCode::FAILURE
        }
    }
}

/// Layer file, environment and flags, then start logging
fn load_config(global: &GlobalArgs) -> Result<SweepConfig> {
    SweepConfig::load_env_file()?;
    let mut config = SweepConfig::load(global.config.as_deref())?;
    config.apply_overrides(global.overrides());
    config.validate()?;
    init_telemetry(&config.observability)?;
    Ok(config)
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        // No subcommand: show what the tool can do
        None => {
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
        Some(Commands::InitConfig { path, overwrite }) => {
            InitConfigCommand::new(path).with_overwrite(overwrite).execute()
        }
        Some(Commands::Status) => {
            let config = load_config(&cli.global)?;
            tokio::runtime::Runtime::new()?.block_on(async {
                StatusCommand::new().execute(&config).await
            })
        }
        Some(Commands::Merge { resolve }) => {
            let config = load_config(&cli.global)?;
            tokio::runtime::Runtime::new()?.block_on(async {
                MergeCommand::new()
                    .with_resolve_conflicts(resolve)
                    .execute(&config)
                    .await
            })
        }
        Some(Commands::Close { confirm, yes }) => {
            let config = load_config(&cli.global)?;
            tokio::runtime::Runtime::new()?.block_on(async {
                CloseCommand::new()
                    .with_confirm(confirm)
                    .with_yes(yes)
                    .execute(&config)
                    .await
            })
        }
        Some(Commands::Force) => {
            let config = load_config(&cli.global)?;
            tokio::runtime::Runtime::new()?.block_on(async {
                ForceCommand::new().execute(&config).await
            })
        }
        Some(Commands::Resolve) => {
            let config = load_config(&cli.global)?;
            tokio::runtime::Runtime::new()?.block_on(async {
                ResolveCommand::new().execute(&config).await
            })
        }
    }
}
