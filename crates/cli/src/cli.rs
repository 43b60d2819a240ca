//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use contracts::TimerKind;

/// ext-audio - drive an external audio source from a configuration file
#[derive(Parser, Debug)]
#[command(
    name = "ext-audio",
    author,
    version,
    about = "External audio source adapter",
    long_about = "Runs an external audio source: a periodic scheduler issues frame requests \n\
                  to a configured producer, matches completions against the pending ledger \n\
                  and fans finished frames out to the configured sinks."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "EXT_AUDIO_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "EXT_AUDIO_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the source until the duration, frame limit or Ctrl+C
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "ext_audio.toml",
        env = "EXT_AUDIO_CONFIG"
    )]
    pub config: PathBuf,

    /// Override the source name from configuration
    #[arg(long)]
    pub name: Option<String>,

    /// Override the request interval (milliseconds)
    #[arg(long, env = "EXT_AUDIO_INTERVAL_MS")]
    pub interval_ms: Option<u64>,

    /// Override the tick source
    #[arg(long, value_enum)]
    pub timer: Option<TimerArg>,

    /// Stop after this many dispatched frames (0 = unlimited)
    #[arg(long, default_value = "0", env = "EXT_AUDIO_MAX_FRAMES")]
    pub max_frames: u64,

    /// Run duration in seconds (0 = until Ctrl+C)
    #[arg(long, default_value = "0", env = "EXT_AUDIO_DURATION")]
    pub duration: u64,

    /// Validate configuration and exit without starting the source
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "9000", env = "EXT_AUDIO_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "ext_audio.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "ext_audio.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show sink configuration
    #[arg(long)]
    pub sinks: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

/// Tick source override
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum TimerArg {
    Auto,
    Thread,
    Runtime,
}

impl From<TimerArg> for TimerKind {
    fn from(timer: TimerArg) -> Self {
        match timer {
            TimerArg::Auto => Self::Auto,
            TimerArg::Thread => Self::Thread,
            TimerArg::Runtime => Self::Runtime,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_overrides() {
        let cli = Cli::parse_from([
            "ext-audio",
            "run",
            "--config",
            "custom.toml",
            "--interval-ms",
            "20",
            "--timer",
            "thread",
            "--max-frames",
            "5",
        ]);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.config, PathBuf::from("custom.toml"));
                assert_eq!(args.interval_ms, Some(20));
                assert_eq!(TimerKind::from(args.timer.unwrap()), TimerKind::Thread);
                assert_eq!(args.max_frames, 5);
                assert!(!args.dry_run);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        let result = Cli::try_parse_from(["ext-audio", "-q", "-v", "validate"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_info_flags() {
        let cli = Cli::parse_from(["ext-audio", "--log-format", "json", "info", "--sinks"]);
        assert!(matches!(cli.log_format, LogFormat::Json));
        match cli.command {
            Commands::Info(args) => {
                assert!(args.sinks);
                assert!(!args.json);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
