use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use crate::config::ObservabilityConfig;

/// Install the global subscriber. Logs go to stderr so stdout stays free for
/// progress output; `RUST_LOG` takes precedence over the configured level.
pub fn init_telemetry(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    if config.json_logs {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    }

    tracing::debug!(json = config.json_logs, "Telemetry initialized");
    Ok(())
}

/// Generate a correlation ID for linking the records of one run
pub fn generate_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Span covering one whole sweep
pub fn create_run_span(operation: &str, correlation_id: &str, dry_run: bool) -> tracing::Span {
    tracing::info_span!(
        "sweep_run",
        operation = operation,
        correlation.id = correlation_id,
        dry_run = dry_run,
    )
}

/// Span covering the work on one pull request
pub fn create_pull_request_span(repository: &str, number: u64) -> tracing::Span {
    tracing::info_span!("pull_request", repository = repository, number = number)
}
