//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::info;

use contracts::AdapterConfig;

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let mut adapter = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    apply_overrides(&mut adapter, args)?;

    info!(
        source = %adapter.source.name,
        interval_ms = adapter.source.request_interval_ms,
        timer = ?adapter.source.timer,
        sinks = adapter.sinks.len(),
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&adapter);
        return Ok(());
    }

    let pipeline = Pipeline::new(PipelineConfig {
        adapter,
        max_frames: (args.max_frames > 0).then_some(args.max_frames),
        duration: (args.duration > 0).then(|| Duration::from_secs(args.duration)),
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
    });

    info!("Starting source...");
    let stats = pipeline
        .run(shutdown_signal())
        .await
        .context("Pipeline execution failed")?;

    info!(
        frames = stats.frames_dispatched,
        duration_secs = stats.duration.as_secs_f64(),
        fps = format!("{:.2}", stats.fps()),
        "Run completed"
    );
    stats.print_summary();

    info!("ext-audio finished");
    Ok(())
}

/// Apply CLI overrides and re-check the fields they touch
fn apply_overrides(adapter: &mut AdapterConfig, args: &RunArgs) -> Result<()> {
    if let Some(ref name) = args.name {
        info!(name = %name, "Overriding source name from CLI");
        adapter.source.name = name.clone();
    }
    if let Some(interval_ms) = args.interval_ms {
        if interval_ms == 0 {
            return Err(CliError::config_validation("--interval-ms must be positive").into());
        }
        info!(interval_ms, "Overriding request interval from CLI");
        adapter.source.request_interval_ms = interval_ms;
    }
    if let Some(timer) = args.timer {
        adapter.source.timer = timer.into();
    }
    Ok(())
}

/// Ctrl+C or SIGTERM. A handler that cannot be installed never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(adapter: &AdapterConfig) {
    let source = &adapter.source;
    println!("\n=== Configuration Summary ===\n");
    println!("Source:");
    println!("  Name: {}", source.name);
    println!("  First request delay: {} ms", source.first_request_delay_ms);
    println!("  Request interval: {} ms", source.request_interval_ms);
    println!("  Max pending requests: {}", source.max_pending_requests);
    println!("  Timer: {:?}", source.timer);

    println!("\nProducer: {:?}", adapter.producer);

    if let Some(ref track) = adapter.track {
        let name = if track.name.is_empty() {
            "external_track"
        } else {
            track.name.as_str()
        };
        println!("\nTrack: {} (enabled: {})", name, track.enabled);
    }

    if !adapter.sinks.is_empty() {
        println!("\nSinks ({}):", adapter.sinks.len());
        for sink in &adapter.sinks {
            println!("  - {} ({:?})", sink.name, sink.sink_type);
        }
    }

    println!();
}
