//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::PipelineConfig;
use pipeline::Pipeline;
use serde::Serialize;
use tracing::info;

use super::{build_context, load_config};
use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Debug, Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resolved: Option<ResolvedSummary>,
}

#[derive(Debug, Serialize)]
struct ResolvedSummary {
    device: String,
    streams: Vec<String>,
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

    let invalid = |error: String| ValidationResult {
        valid: false,
        config_path: config_path.clone(),
        error: Some(error),
        warnings: Vec::new(),
        resolved: None,
    };

    let config = match load_config(&args.config) {
        Ok(config) => config,
        Err(e) => return invalid(format!("{e:#}")),
    };

    match resolve(&config) {
        Ok(resolved) => ValidationResult {
            valid: true,
            config_path: config_path.clone(),
            error: None,
            warnings: collect_warnings(&config),
            resolved: Some(resolved),
        },
        Err(e) => invalid(format!("{e:#}")),
    }
}

/// Commit the configuration against the simulated devices
fn resolve(config: &PipelineConfig) -> Result<ResolvedSummary> {
    let pipeline = Pipeline::new(build_context(config));
    pipeline.apply_config(config)?;
    pipeline.open().context("Configuration cannot be resolved")?;

    Ok(ResolvedSummary {
        device: pipeline.get_device()?.info().serial.to_string(),
        streams: pipeline
            .get_active_streams()?
            .iter()
            .map(|p| p.to_string())
            .collect(),
    })
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &PipelineConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.devices.is_empty() {
        warnings.push(format!(
            "No devices configured - using the built-in stereo camera {}",
            super::BUILTIN_SERIAL
        ));
    }
    if config.streams.is_empty() {
        warnings.push("No streams requested - every stream streams its default profile".to_string());
    }
    if let Some(fault) = config.devices.iter().find(|d| d.fault_after_frames.is_some()) {
        warnings.push(format!(
            "Device '{}' injects a capture fault after {} frames",
            fault.serial,
            fault.fault_after_frames.unwrap_or_default()
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref resolved) = result.resolved {
            println!("\n  Device: {}", resolved.device);
            println!("  Streams:");
            for stream in &resolved.streams {
                println!("    - {}", stream);
            }
        }

        if !result.warnings.is_empty() {
            println!("\n⚠ Warnings:");
            for warning in &result.warnings {
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn args_for(contents: &str) -> (tempfile::NamedTempFile, ValidateArgs) {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        let args = ValidateArgs {
            config: file.path().to_path_buf(),
            json: true,
        };
        (file, args)
    }

    #[test]
    fn test_valid_config_resolves() {
        let (_file, args) = args_for(
            r#"
[[streams]]
kind = "depth"
width = 640
height = 480

[[devices]]
serial = "VAL-OK"
name = "Sim Camera"

[[devices.sensors]]
name = "Stereo Module"
profiles = [{ kind = "depth", width = 640, height = 480, format = "z16", fps = 30 }]
"#,
        );

        let result = validate_config(&args);
        assert!(result.valid, "{:?}", result.error);
        let resolved = result.resolved.unwrap();
        assert_eq!(resolved.device, "VAL-OK");
        assert_eq!(resolved.streams.len(), 1);
    }

    #[test]
    fn test_unsatisfiable_request_is_invalid() {
        let (_file, args) = args_for(
            r#"
[[streams]]
kind = "color"
width = 1920
height = 1080
"#,
        );

        let result = validate_config(&args);
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("cannot be resolved"));
    }

    #[test]
    fn test_builtin_device_warning() {
        let (_file, args) = args_for("");
        let result = validate_config(&args);
        assert!(result.valid);
        assert_eq!(result.warnings.len(), 2);
    }

    #[test]
    fn test_missing_file() {
        let args = ValidateArgs {
            config: "/nonexistent/rspipe.toml".into(),
            json: false,
        };
        let result = validate_config(&args);
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("not found"));
    }
}
