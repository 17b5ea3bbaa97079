//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::FusionConfig;
use serde::Serialize;
use tracing::info;

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
    tolerance_s: f64,
    observation_model: String,
    observation_dim: usize,
    gate_threshold: Option<f64>,
    tick_hz: f64,
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

    // Check file exists
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
        Ok(config) => {
            let warnings = collect_warnings(&config);
            let filter = &config.filter;

            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    tolerance_s: config.sync.tolerance_s,
                    observation_model: format!("{:?}", filter.observation_model),
                    observation_dim: filter.observation_model.dim(),
                    gate_threshold: filter.gate.enabled.then_some(filter.gate.threshold).flatten(),
                    tick_hz: config.runtime.tick_hz,
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

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &FusionConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if !config.filter.gate.enabled {
        warnings.push("filter.gate is disabled - every correction will be applied".to_string());
    }

    if config.sync.tolerance_s > 0.1 {
        warnings.push(format!(
            "sync.tolerance_s = {}s is large - triplets may pair samples of different sweeps",
            config.sync.tolerance_s
        ));
    }

    if config.runtime.output.is_none() {
        warnings.push("runtime.output not set - odometry is only logged".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Sync tolerance: {} s", summary.tolerance_s);
            println!(
                "  Observation model: {} ({} dims)",
                summary.observation_model, summary.observation_dim
            );
            match summary.gate_threshold {
                Some(threshold) => println!("  Gate threshold: {}", threshold),
                None => println!("  Gate threshold: default"),
            }
            println!("  Tick rate: {} Hz", summary.tick_hz);
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
