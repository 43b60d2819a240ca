//! `ext-audio`: 按配置驱动外部音频源，或只做配置校验与查看。

mod cli;
mod commands;
mod error;
mod pipeline;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use cli::{Cli, Commands};
use commands::{run_info, run_pipeline, run_validate};

#[tokio::main]
async fn main() -> Result<()> {
    // EXT_AUDIO_* defaults may come from a local .env
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    init_logging(&cli)?;

    info!(version = env!("CARGO_PKG_VERSION"), "ext-audio starting");

    let result = match &cli.command {
        Commands::Run(args) => run_pipeline(args).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Info(args) => run_info(args),
    };

    result.inspect_err(|e| tracing::error!(error = %e, "ext-audio command failed"))
}

/// Initialize logging based on CLI options. Metrics are set up by `run`.
fn init_logging(cli: &Cli) -> Result<()> {
    let config = observability::ObservabilityConfig::from_verbosity(cli.quiet, cli.verbose)
        .with_log_format(cli.log_format.into());
    observability::init_with_config(config)
}
