//! # Config Loader
//!
//! Pipeline configuration loading.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Validate field ranges and cross-field rules
//! - Produce a `PipelineConfig`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let config = ConfigLoader::load_from_path(Path::new("pipeline.toml")).unwrap();
//! println!("streams: {}", config.streams.len());
//! ```

mod parser;
mod validator;

pub use contracts::PipelineConfig;
pub use parser::ConfigFormat;

use contracts::PipelineError;
use std::path::Path;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file
    ///
    /// The format is detected from the extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<PipelineConfig, PipelineError> {
        let format = Self::detect_format(path)?;
        let content = std::fs::read_to_string(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load configuration from a string
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<PipelineConfig, PipelineError> {
        let config = parser::parse(content, format)?;
        validator::validate(&config)?;
        Ok(config)
    }

    /// Validate an already built configuration
    pub fn validate(config: &PipelineConfig) -> Result<(), PipelineError> {
        validator::validate(config)
    }

    pub fn to_toml(config: &PipelineConfig) -> Result<String, PipelineError> {
        toml::to_string_pretty(config)
            .map_err(|e| PipelineError::config_parse(format!("TOML serialize error: {e}")))
    }

    pub fn to_json(config: &PipelineConfig) -> Result<String, PipelineError> {
        serde_json::to_string_pretty(config)
            .map_err(|e| PipelineError::config_parse(format!("JSON serialize error: {e}")))
    }

    fn detect_format(path: &Path) -> Result<ConfigFormat, PipelineError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            PipelineError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            PipelineError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{Format, StreamKind};
    use std::io::Write;

    const SIM_TOML: &str = r#"
[pipeline]
device_serial = "A100"

[[streams]]
kind = "depth"
fps = 30

[[streams]]
kind = "infrared"
index = 2

[[devices]]
serial = "A100"
name = "Sim D435"
firmware = "5.16.0"

[[devices.sensors]]
name = "Stereo Module"
profiles = [
    { kind = "depth", width = 640, height = 480, format = "z16", fps = 30 },
    { kind = "depth", width = 1280, height = 720, format = "z16", fps = 15 },
    { kind = "infrared", index = 1, width = 640, height = 480, format = "y8", fps = 30 },
    { kind = "infrared", index = 2, width = 640, height = 480, format = "y8", fps = 30 },
]

[[devices.sensors]]
name = "RGB Camera"
profiles = [
    { kind = "color", width = 640, height = 480, format = "rgb8", fps = 30 },
]
"#;

    #[test]
    fn test_load_from_str_toml() {
        let result = ConfigLoader::load_from_str(SIM_TOML, ConfigFormat::Toml);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let cfg = result.unwrap();
        assert_eq!(cfg.devices.len(), 1);
        assert_eq!(cfg.devices[0].sensors[0].profiles.len(), 4);
        assert_eq!(cfg.devices[0].sensors[1].profiles[0].format, Format::Rgb8);
        assert_eq!(cfg.streams[1].kind, StreamKind::Infrared);
        assert_eq!(cfg.streams[1].index, 2);
    }

    #[test]
    fn test_round_trip_toml() {
        let cfg = ConfigLoader::load_from_str(SIM_TOML, ConfigFormat::Toml).unwrap();
        let serialized = ConfigLoader::to_toml(&cfg).unwrap();
        let cfg2 = ConfigLoader::load_from_str(&serialized, ConfigFormat::Toml).unwrap();
        assert_eq!(cfg.streams, cfg2.streams);
        assert_eq!(cfg.devices[0].serial, cfg2.devices[0].serial);
    }

    #[test]
    fn test_round_trip_json() {
        let cfg = ConfigLoader::load_from_str(SIM_TOML, ConfigFormat::Toml).unwrap();
        let json = ConfigLoader::to_json(&cfg).unwrap();
        let cfg2 = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        assert_eq!(cfg.devices[0].sensors[0].profiles, cfg2.devices[0].sensors[0].profiles);
    }

    #[test]
    fn test_load_from_path() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(SIM_TOML.as_bytes()).unwrap();

        let cfg = ConfigLoader::load_from_path(file.path()).unwrap();
        assert_eq!(cfg.pipeline.device_serial.as_deref(), Some("A100"));
    }

    #[test]
    fn test_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        let err = ConfigLoader::load_from_path(file.path()).unwrap_err();
        assert!(err.to_string().contains("unsupported config format"), "got: {err}");
    }

    #[test]
    fn test_missing_file() {
        let err = ConfigLoader::load_from_path(Path::new("/nonexistent/pipeline.toml"));
        assert!(matches!(err, Err(PipelineError::Io(_))));
    }

    #[test]
    fn test_validation_runs_after_parse() {
        let content = r#"
[[streams]]
kind = "depth"

[[streams]]
kind = "depth"
fps = 15
"#;
        let result = ConfigLoader::load_from_str(content, ConfigFormat::Toml);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("duplicate"));
    }
}
