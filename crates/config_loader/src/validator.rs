//! Configuration validation
//!
//! Field ranges are declared on the config types (`validator` derive);
//! the cross-field rules live here:
//! - stream requests unique per (kind, index)
//! - device serials unique
//! - sensor names unique per device
//! - profiles concrete (no `any` format)
//! - each stream produced by a single sensor of a device

use std::collections::{HashMap, HashSet};

use contracts::{Format, PipelineConfig, PipelineError};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// Validate a parsed `PipelineConfig`
///
/// Returns the first error found, or Ok(()).
pub fn validate(config: &PipelineConfig) -> Result<(), PipelineError> {
    validate_fields(config)?;
    validate_stream_requests(config)?;
    validate_device_serials(config)?;
    validate_sensors(config)?;
    Ok(())
}

/// Derived range / length rules
fn validate_fields(config: &PipelineConfig) -> Result<(), PipelineError> {
    let Err(errors) = config.validate() else {
        return Ok(());
    };

    let mut flat = Vec::new();
    flatten_errors("", &errors, &mut flat);
    flat.sort();

    let (field, message) = flat
        .into_iter()
        .next()
        .unwrap_or_else(|| (String::from("<root>"), errors.to_string()));
    Err(PipelineError::config_validation(field, message))
}

fn flatten_errors(prefix: &str, errors: &ValidationErrors, out: &mut Vec<(String, String)>) {
    for (name, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{prefix}.{name}")
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                for err in list {
                    let message = match &err.message {
                        Some(m) => m.to_string(),
                        None => format!("failed '{}' check", err.code),
                    };
                    out.push((path.clone(), message));
                }
            }
            ValidationErrorsKind::Struct(inner) => flatten_errors(&path, inner, out),
            ValidationErrorsKind::List(items) => {
                for (idx, inner) in items {
                    flatten_errors(&format!("{path}[{idx}]"), inner, out);
                }
            }
        }
    }
}

fn validate_stream_requests(config: &PipelineConfig) -> Result<(), PipelineError> {
    let mut seen = HashSet::new();
    for (idx, request) in config.streams.iter().enumerate() {
        if !seen.insert(request.key()) {
            return Err(PipelineError::config_validation(
                format!("streams[{idx}]"),
                format!(
                    "duplicate stream request for {} index {}",
                    request.kind, request.index
                ),
            ));
        }
    }
    Ok(())
}

fn validate_device_serials(config: &PipelineConfig) -> Result<(), PipelineError> {
    let mut seen = HashSet::new();
    for device in &config.devices {
        if device.serial.is_empty() {
            return Err(PipelineError::config_validation(
                format!("devices[name={}].serial", device.name),
                "serial cannot be empty",
            ));
        }
        if !seen.insert(&device.serial) {
            return Err(PipelineError::config_validation(
                format!("devices[serial={}]", device.serial),
                "duplicate device serial",
            ));
        }
    }
    Ok(())
}

fn validate_sensors(config: &PipelineConfig) -> Result<(), PipelineError> {
    for device in &config.devices {
        let mut names = HashSet::new();
        let mut producers = HashMap::new();

        for sensor in &device.sensors {
            if !names.insert(sensor.name.as_str()) {
                return Err(PipelineError::config_validation(
                    format!("devices[{}].sensors[name={}]", device.serial, sensor.name),
                    "duplicate sensor name",
                ));
            }

            for (idx, profile) in sensor.profiles.iter().enumerate() {
                if profile.format == Format::Any {
                    return Err(PipelineError::config_validation(
                        format!(
                            "devices[{}].sensors[{}].profiles[{idx}].format",
                            device.serial, sensor.name
                        ),
                        "device profiles must name a concrete format",
                    ));
                }

                let owner = producers
                    .entry(profile.key())
                    .or_insert(sensor.name.as_str());
                if *owner != sensor.name.as_str() {
                    return Err(PipelineError::config_validation(
                        format!("devices[{}].sensors[{}]", device.serial, sensor.name),
                        format!(
                            "stream {} index {} already produced by sensor '{owner}'",
                            profile.kind, profile.index
                        ),
                    ));
                }
            }
        }
    }
    Ok(())
}
