//! `run` command implementation.

use anyhow::{Context, Result};
use config_loader::ConfigLoader;
use contracts::{FusionConfig, RecordedSample};
use ingestion::{ReplayOptions, ReplaySource, SyntheticSource, SyntheticTrajectory};
use localization::{FanoutPublisher, FusionController, JsonLinesPublisher, LogPublisher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{DriverConfig, FusionDriver};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    let config = load_config(args)?;

    info!(
        tolerance_s = config.sync.tolerance_s,
        observation_model = ?config.filter.observation_model,
        gate = config.filter.gate.enabled,
        tick_hz = config.runtime.tick_hz,
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&config);
        return Ok(());
    }

    let mut publisher = FanoutPublisher::new().with(LogPublisher::new("fusion"));
    if let Some(ref path) = config.runtime.output {
        let jsonl = JsonLinesPublisher::create(path)
            .with_context(|| format!("Failed to create output file {}", path.display()))?;
        info!(path = %path.display(), "Writing odometry as JSON lines");
        publisher.push(jsonl);
    }

    let controller = FusionController::new(&config).with_publisher(publisher);
    let (rx, handle) = start_source(args, &config)?;

    let driver_config = DriverConfig::from_tick_hz(
        config.runtime.tick_hz,
        (args.max_ticks > 0).then_some(args.max_ticks),
        config.runtime.channel_capacity,
    );

    info!("Starting fusion loop...");
    let stats = FusionDriver::new(controller, driver_config)
        .run(rx, handle, shutdown_signal())
        .await
        .context("Fusion run failed")?;

    info!(
        ticks = stats.ticks,
        samples = stats.samples_received,
        interrupted = stats.interrupted,
        duration_secs = stats.duration.as_secs_f64(),
        throughput = format!("{:.1}", stats.throughput()),
        "Fusion run completed"
    );
    stats.print_summary();

    info!("Fusion localizer finished");
    Ok(())
}

/// Load the configuration file (or defaults) and apply CLI overrides
fn load_config(args: &RunArgs) -> Result<FusionConfig> {
    let mut config = match args.config {
        Some(ref path) => {
            info!(config = %path.display(), "Loading configuration");
            if !path.exists() {
                return Err(CliError::config_not_found(path.display().to_string()).into());
            }
            ConfigLoader::load_from_path(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?
        }
        None => {
            info!("No configuration file given, using defaults");
            FusionConfig::default()
        }
    };

    if let Some(tolerance) = args.tolerance {
        info!(tolerance_s = tolerance, "Overriding sync tolerance from CLI");
        config.sync.tolerance_s = tolerance;
    }
    if let Some(tick_hz) = args.tick_hz {
        info!(tick_hz, "Overriding tick rate from CLI");
        config.runtime.tick_hz = tick_hz;
    }
    if let Some(ref output) = args.output {
        config.runtime.output = Some(output.clone());
    }

    ConfigLoader::validate(&config).context("Invalid configuration after CLI overrides")?;
    Ok(config)
}

type SourceHandles = (
    mpsc::Receiver<RecordedSample>,
    JoinHandle<ingestion::Result<u64>>,
);

fn start_source(args: &RunArgs, config: &FusionConfig) -> Result<SourceHandles> {
    let capacity = config.runtime.channel_capacity;

    if let Some(ref path) = args.source.replay {
        info!(path = %path.display(), speed = ?args.speed, "Running in REPLAY mode");
        if !path.exists() {
            anyhow::bail!("Replay file not found: {}", path.display());
        }
        let source = ReplaySource::new(
            path,
            ReplayOptions {
                speed: args.speed,
                skip_invalid: args.skip_invalid,
            },
        );
        return Ok(source.start(capacity));
    }

    let trajectory = SyntheticTrajectory {
        duration_s: args.duration,
        gravity: config.filter.gravity,
        extrinsic: config.calibration.to_extrinsic(),
        seed: args.seed,
        ..Default::default()
    };
    info!(
        duration_s = trajectory.duration_s,
        seed = trajectory.seed,
        "Running in SYNTHETIC mode"
    );
    let mut source = SyntheticSource::new(trajectory);
    if let Some(speed) = args.speed {
        source = source.with_speed(speed);
    }
    Ok(source.start(capacity)?)
}

/// Resolves on Ctrl+C or SIGTERM
///
/// A handler that cannot be installed never resolves.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
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
                error!(error = %e, "Failed to install SIGTERM handler");
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
fn print_config_summary(config: &FusionConfig) {
    let filter = &config.filter;

    println!("\n=== Configuration Summary ===\n");
    println!("Sync:");
    println!("  Tolerance: {} s", config.sync.tolerance_s);
    println!("  Buffer capacity: {}", config.sync.buffer_capacity);

    println!("\nFilter:");
    println!("  Gravity: {} m/s²", filter.gravity);
    println!("  Observation model: {:?}", filter.observation_model);
    match (filter.gate.enabled, filter.gate.threshold) {
        (false, _) => println!("  Gate: disabled"),
        (true, Some(threshold)) => println!("  Gate: d² <= {threshold}"),
        (true, None) => println!("  Gate: χ² 99.9% quantile"),
    }
    if filter.observability.enabled {
        println!(
            "  Observability analysis: every {} corrections",
            filter.observability.window
        );
    }

    println!("\nCalibration (imu_from_lidar):");
    println!("  Translation: {:?} m", config.calibration.translation);
    println!("  Rotation RPY: {:?} rad", config.calibration.rotation_rpy);

    println!("\nRuntime:");
    println!("  Tick rate: {} Hz", config.runtime.tick_hz);
    println!("  Channel capacity: {}", config.runtime.channel_capacity);
    if let Some(ref output) = config.runtime.output {
        println!("  Output: {}", output.display());
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;

    fn run_args(argv: &[&str]) -> RunArgs {
        let mut full = vec!["fusion-localizer", "run"];
        full.extend_from_slice(argv);
        match Cli::parse_from(full).command {
            Commands::Run(args) => args,
            Commands::Validate(_) => panic!("expected run command"),
        }
    }

    #[test]
    fn test_overrides_applied_to_defaults() {
        let args = run_args(&["--synthetic", "--tolerance", "0.02", "--tick-hz", "50"]);
        let config = load_config(&args).unwrap();
        assert_eq!(config.sync.tolerance_s, 0.02);
        assert_eq!(config.runtime.tick_hz, 50.0);
    }

    #[test]
    fn test_invalid_override_rejected() {
        let args = run_args(&["--synthetic", "--tolerance", "-1"]);
        assert!(load_config(&args).is_err());
    }

    #[test]
    fn test_missing_config_file() {
        let args = run_args(&["--synthetic", "--config", "/nonexistent/fusion.toml"]);
        let err = load_config(&args).unwrap_err();
        assert!(err.to_string().contains("Configuration file not found"));
    }

    #[tokio::test]
    async fn test_dry_run_succeeds() {
        let args = run_args(&["--synthetic", "--dry-run"]);
        run_pipeline(&args).await.unwrap();
    }

    #[tokio::test]
    async fn test_synthetic_run_writes_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("odom.jsonl");
        let args = run_args(&[
            "--synthetic",
            "--duration",
            "2",
            "--tick-hz",
            "1000",
            "--output",
            output.to_str().unwrap(),
        ]);

        run_pipeline(&args).await.unwrap();

        let content = std::fs::read_to_string(&output).unwrap();
        assert!(content.lines().count() > 0);
        assert!(content.contains("\"kind\":\"odometry\""));
    }
}
