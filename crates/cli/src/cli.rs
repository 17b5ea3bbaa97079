//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Fusion Localizer - lidar/GNSS/IMU error-state Kalman filter
#[derive(Parser, Debug)]
#[command(
    name = "fusion-localizer",
    author,
    version,
    about = "Lidar/GNSS/IMU fusion localizer",
    long_about = "Fuses raw inertial samples with synchronized lidar poses, GNSS and \n\
                  inertial samples in an error-state Kalman filter.\n\n\
                  Samples come from a JSON-lines replay file or a synthetic \n\
                  circular trajectory; fused odometry is logged and optionally \n\
                  written to a JSON-lines file."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "FUSION_VERBOSE")]
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
        env = "FUSION_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the fusion loop over a sample source
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),
}

/// Where samples come from
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct SourceArgs {
    /// Replay a JSON-lines file of recorded samples
    #[arg(long, env = "FUSION_REPLAY")]
    pub replay: Option<PathBuf>,

    /// Drive a synthetic circular trajectory
    #[arg(long)]
    pub synthetic: bool,
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON); defaults are used when omitted
    #[arg(short, long, env = "FUSION_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub source: SourceArgs,

    /// Pace the source by sample timestamps (1.0 = real time); as fast as possible when omitted
    #[arg(long, env = "FUSION_SPEED")]
    pub speed: Option<f64>,

    /// Skip replay lines that fail to parse
    #[arg(long)]
    pub skip_invalid: bool,

    /// Synthetic trajectory length in seconds
    #[arg(long, default_value = "30.0")]
    pub duration: f64,

    /// Seed of the synthetic measurement noise
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Override the synchronization tolerance (seconds)
    #[arg(long, env = "FUSION_SYNC_TOLERANCE", allow_negative_numbers = true)]
    pub tolerance: Option<f64>,

    /// Override the controller tick rate (Hz)
    #[arg(long, env = "FUSION_TICK_HZ")]
    pub tick_hz: Option<f64>,

    /// Write fused odometry to this JSON-lines file
    #[arg(short, long, env = "FUSION_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Stop after this many ticks (0 = until the source is exhausted)
    #[arg(long, default_value = "0")]
    pub max_ticks: u64,

    /// Validate configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "FUSION_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "fusion.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
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
            LogFormat::Json => observability::LogFormat::Json,
            LogFormat::Pretty => observability::LogFormat::Pretty,
            LogFormat::Compact => observability::LogFormat::Compact,
        }
    }
}
