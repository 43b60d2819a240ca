//! `validate` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use contracts::{AdapterConfig, ProducerConfig, MAX_PENDING_REQUEST_COUNT};

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    source_name: String,
    request_interval_ms: u64,
    producer: &'static str,
    track: bool,
    sink_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(adapter) => {
            let warnings = collect_warnings(&adapter);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(ConfigSummary {
                    version: format!("{:?}", adapter.version),
                    source_name: adapter.source.name.clone(),
                    request_interval_ms: adapter.source.request_interval_ms,
                    producer: producer_kind(&adapter.producer),
                    track: adapter.track.is_some(),
                    sink_count: adapter.sinks.len(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

pub(crate) fn producer_kind(producer: &ProducerConfig) -> &'static str {
    match producer {
        ProducerConfig::Sine(_) => "sine",
        ProducerConfig::Replay(_) => "replay",
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(adapter: &AdapterConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if adapter.sinks.is_empty() && adapter.track.is_none() {
        warnings.push("No sinks or track configured - completed frames go nowhere".to_string());
    }

    if let Some(ref track) = adapter.track {
        if !track.enabled {
            warnings.push("Track is disabled - it will drop every frame".to_string());
        }
    }

    let source = &adapter.source;
    if source.max_pending_requests < MAX_PENDING_REQUEST_COUNT {
        warnings.push(format!(
            "source.max_pending_requests = {} - slow producers will see evictions sooner",
            source.max_pending_requests
        ));
    }

    if let ProducerConfig::Replay(ref replay) = adapter.producer {
        if !replay.path.exists() {
            warnings.push(format!(
                "Replay capture {} does not exist yet",
                replay.path.display()
            ));
        }
        if !replay.loop_playback {
            warnings.push(
                "Replay without loop_playback - requests fail once the capture is exhausted"
                    .to_string(),
            );
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Source: {}", summary.source_name);
            println!("  Request interval: {} ms", summary.request_interval_ms);
            println!("  Producer: {}", summary.producer);
            println!("  Track: {}", if summary.track { "yes" } else { "no" });
            println!("  Sinks: {}", summary.sink_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
