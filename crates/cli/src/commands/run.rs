//! `run` command implementation.

use anyhow::Result;
use std::time::Duration;
use tracing::{info, warn};

use super::{build_context, load_config};
use crate::cli::RunArgs;
use crate::error::CliError;
use crate::runner::{RunEnd, RunOptions, Runner};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");
    let config = load_config(&args.config)?;

    info!(
        streams = config.streams.len(),
        devices = config.devices.len(),
        device_serial = ?config.pipeline.device_serial,
        tolerance_ms = ?config.sync.tolerance_ms,
        "Configuration loaded"
    );

    let options = RunOptions {
        max_frames: (args.max_frames > 0).then_some(args.max_frames),
        frame_timeout: Duration::from_millis(args.timeout_ms),
        duration: (args.duration > 0).then(|| Duration::from_secs(args.duration)),
    };

    let runner = Runner::new(build_context(&config), &config, options)?;
    let (stats, end) = runner.run(shutdown_signal()).await?;
    stats.print_summary();

    match end {
        RunEnd::Failed(e) => Err(CliError::streaming(stats.frame_sets(), e).into()),
        RunEnd::MaxFrames | RunEnd::Stopped => {
            info!("rspipe finished");
            Ok(())
        }
    }
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
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
                warn!(error = %e, "Failed to install SIGTERM handler");
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
