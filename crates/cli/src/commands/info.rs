//! `info` command implementation.

use std::collections::HashMap;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use contracts::{AdapterConfig, ProducerConfig};

use super::validate::producer_kind;
use crate::cli::InfoArgs;
use crate::error::CliError;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    source: SourceInfo,
    producer: ProducerInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    track: Option<TrackInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sinks: Vec<SinkInfo>,
}

#[derive(Serialize)]
struct SourceInfo {
    name: String,
    first_request_delay_ms: u64,
    request_interval_ms: u64,
    max_pending_requests: usize,
    timer: String,
}

#[derive(Serialize)]
struct ProducerInfo {
    kind: &'static str,
    detail: String,
}

#[derive(Serialize)]
struct TrackInfo {
    name: String,
    enabled: bool,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    params: HashMap<String, String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let adapter = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&adapter, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&adapter, args);
    }

    Ok(())
}

fn producer_detail(producer: &ProducerConfig) -> String {
    match producer {
        ProducerConfig::Sine(sine) => format!(
            "{} Hz tone, {} Hz x {} ch, {} samples/frame",
            sine.frequency_hz, sine.sample_rate_hz, sine.channel_count, sine.samples_per_frame
        ),
        ProducerConfig::Replay(replay) => format!(
            "{} (loop: {})",
            replay.path.display(),
            replay.loop_playback
        ),
    }
}

fn track_name(name: &str) -> String {
    if name.trim().is_empty() {
        source_factory::LocalAudioTrack::DEFAULT_NAME.to_string()
    } else {
        name.to_string()
    }
}

fn build_config_info(adapter: &AdapterConfig, args: &InfoArgs) -> ConfigInfo {
    let source = &adapter.source;

    let sinks = if args.sinks {
        adapter
            .sinks
            .iter()
            .map(|s| SinkInfo {
                name: s.name.clone(),
                sink_type: format!("{:?}", s.sink_type),
                params: s.params.clone(),
            })
            .collect()
    } else {
        Vec::new()
    };

    ConfigInfo {
        version: format!("{:?}", adapter.version),
        source: SourceInfo {
            name: source.name.clone(),
            first_request_delay_ms: source.first_request_delay_ms,
            request_interval_ms: source.request_interval_ms,
            max_pending_requests: source.max_pending_requests,
            timer: format!("{:?}", source.timer),
        },
        producer: ProducerInfo {
            kind: producer_kind(&adapter.producer),
            detail: producer_detail(&adapter.producer),
        },
        track: adapter.track.as_ref().map(|t| TrackInfo {
            name: track_name(&t.name),
            enabled: t.enabled,
        }),
        sinks,
    }
}

fn print_config_info(adapter: &AdapterConfig, args: &InfoArgs) {
    let source = &adapter.source;

    println!("=== ext-audio configuration ===\n");

    println!("Source");
    println!("   ├─ Version: {:?}", adapter.version);
    println!("   ├─ Name: {}", source.name);
    println!("   ├─ First request delay: {} ms", source.first_request_delay_ms);
    println!("   ├─ Request interval: {} ms", source.request_interval_ms);
    println!("   ├─ Max pending requests: {}", source.max_pending_requests);
    println!("   └─ Timer: {:?}", source.timer);

    println!("\nProducer");
    println!("   ├─ Kind: {}", producer_kind(&adapter.producer));
    println!("   └─ {}", producer_detail(&adapter.producer));

    match &adapter.track {
        Some(track) => {
            println!("\nTrack");
            println!("   ├─ Name: {}", track_name(&track.name));
            println!("   └─ Enabled: {}", track.enabled);
        }
        None => println!("\nTrack: none"),
    }

    if !adapter.sinks.is_empty() {
        println!("\nSinks ({})", adapter.sinks.len());
        for (i, sink) in adapter.sinks.iter().enumerate() {
            let is_last = i == adapter.sinks.len() - 1;
            let prefix = if is_last { "└─" } else { "├─" };
            println!("   {} {} ({:?})", prefix, sink.name, sink.sink_type);

            if args.sinks {
                let child_prefix = if is_last { "   " } else { "│  " };
                let mut params: Vec<_> = sink.params.iter().collect();
                params.sort();
                for (key, value) in params {
                    println!("   {}   {} = {}", child_prefix, key, value);
                }
            }
        }
    }

    println!();
}
