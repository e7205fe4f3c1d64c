//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// rspipe - synchronized multi-stream capture over simulated depth cameras
#[derive(Parser, Debug)]
#[command(
    name = "rspipe",
    author,
    version,
    about = "Streaming pipeline orchestrator for depth cameras",
    long_about = "Resolves stream requests against connected devices, streams them and \n\
                  delivers time-synchronized frame sets.\n\n\
                  Devices are simulated from the [[devices]] section of the \n\
                  configuration file (a built-in stereo camera when absent)."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "RSPIPE_VERBOSE")]
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
        env = "RSPIPE_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Stream frame sets until a limit or a shutdown signal
    Run(RunArgs),

    /// Validate a configuration and resolve it against the devices
    Validate(ValidateArgs),

    /// List devices, sensors and stream profiles
    Devices(DevicesArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "rspipe.toml", env = "RSPIPE_CONFIG")]
    pub config: PathBuf,

    /// Stop after this many frame sets (0 = unlimited)
    #[arg(long, default_value = "0", env = "RSPIPE_MAX_FRAMES")]
    pub max_frames: u64,

    /// Per-wait frame timeout in milliseconds
    #[arg(long, default_value = "5000", env = "RSPIPE_TIMEOUT_MS")]
    pub timeout_ms: u64,

    /// Stop after this many seconds (0 = no limit)
    #[arg(long, default_value = "0", env = "RSPIPE_DURATION")]
    pub duration: u64,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "RSPIPE_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "rspipe.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `devices` command
#[derive(Parser, Debug)]
pub struct DevicesArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "rspipe.toml")]
    pub config: PathBuf,

    /// Output as JSON
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
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_args() {
        let cli = Cli::try_parse_from([
            "rspipe",
            "-v",
            "run",
            "--config",
            "sim.toml",
            "--max-frames",
            "10",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.config, PathBuf::from("sim.toml"));
                assert_eq!(args.max_frames, 10);
                assert_eq!(args.timeout_ms, 5000);
                assert_eq!(args.metrics_port, 0);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["rspipe", "-q", "-v", "devices"]).is_err());
    }
}
