//! Run orchestrator - drives a `Pipeline` from the async runtime.
//!
//! Frame retrieval blocks, so the consumer loop runs on a blocking task.
//! Shutdown signals and the duration limit stop the pipeline, which wakes
//! the consumer with `Stopped`.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::{DeviceContext, PipelineConfig, PipelineError, PipelineState};
use observability::SyncStatsAggregator;
use pipeline::Pipeline;
use tracing::{debug, info, warn};

use super::RunStats;
use crate::error::CliError;

/// Run limits
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Stop after this many frame sets (None = unlimited)
    pub max_frames: Option<u64>,

    /// Timeout of each `wait_for_frames`
    pub frame_timeout: Duration,

    /// Stop after this wall-clock duration (None = unlimited)
    pub duration: Option<Duration>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_frames: None,
            frame_timeout: pipeline::DEFAULT_FRAME_TIMEOUT,
            duration: None,
        }
    }
}

/// Why the consumer loop ended
#[derive(Debug)]
pub enum RunEnd {
    /// `max_frames` frame sets received
    MaxFrames,
    /// Pipeline stopped by a signal or the duration limit
    Stopped,
    /// Retrieval failed (timeout, device fault)
    Failed(PipelineError),
}

/// Streaming run over one pipeline
pub struct Runner {
    pipeline: Arc<Pipeline>,
    options: RunOptions,
}

impl Runner {
    /// Pipeline over `context` configured from `config`
    pub fn new(
        context: Arc<dyn DeviceContext>,
        config: &PipelineConfig,
        options: RunOptions,
    ) -> Result<Self> {
        let pipeline = Arc::new(Pipeline::new(context));
        pipeline
            .apply_config(config)
            .context("Failed to apply configuration")?;
        Ok(Self { pipeline, options })
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    /// Start, consume until a limit, `shutdown`, or a failure, then stop
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<(RunStats, RunEnd)> {
        let started = Instant::now();

        self.pipeline.start().map_err(CliError::resolution)?;

        let device = self.pipeline.get_device()?.info().serial.to_string();
        let streams: Vec<String> = self
            .pipeline
            .get_active_streams()?
            .iter()
            .map(|p| p.to_string())
            .collect();
        info!(
            device = %device,
            streams = streams.len(),
            tolerance_ms = ?self.pipeline.sync_tolerance_ms(),
            max_frames = ?self.options.max_frames,
            "streaming started"
        );

        let mut consumer = {
            let pipeline = self.pipeline.clone();
            let options = self.options.clone();
            tokio::task::spawn_blocking(move || consume(&pipeline, &options))
        };

        let limit = async {
            match self.options.duration {
                Some(duration) => tokio::time::sleep(duration).await,
                None => std::future::pending::<()>().await,
            }
        };

        let finished = tokio::select! {
            joined = &mut consumer => Some(joined),
            _ = shutdown => {
                warn!("Received shutdown signal, stopping pipeline...");
                None
            }
            _ = limit => {
                info!(duration = ?self.options.duration, "Duration limit reached");
                None
            }
        };

        let joined = match finished {
            Some(joined) => joined,
            None => {
                self.stop_streaming();
                consumer.await
            }
        };
        let (mut sync_metrics, end) = joined.context("Frame consumer task failed")?;

        self.stop_streaming();
        sync_metrics.absorb(self.pipeline.sync_stats());

        let stats = RunStats {
            device,
            streams,
            duration: started.elapsed(),
            sync_metrics,
        };
        info!(
            frame_sets = stats.frame_sets(),
            duration_secs = stats.duration.as_secs_f64(),
            fps = format!("{:.2}", stats.fps()),
            end = ?end,
            "streaming finished"
        );

        Ok((stats, end))
    }

    fn stop_streaming(&self) {
        if self.pipeline.state() != PipelineState::Streaming {
            return;
        }
        if let Err(e) = self.pipeline.stop() {
            warn!(error = %e, "Failed to stop pipeline");
        }
    }
}

/// Blocking consumer loop
fn consume(pipeline: &Pipeline, options: &RunOptions) -> (SyncStatsAggregator, RunEnd) {
    let mut aggregator = SyncStatsAggregator::new();

    loop {
        let waited = Instant::now();
        match pipeline.wait_for_frames(options.frame_timeout) {
            Ok(set) => {
                aggregator.update(&set);
                aggregator.record_wait(waited.elapsed().as_secs_f64() * 1000.0);
                debug!(
                    number = set.number(),
                    timestamp_ms = set.timestamp_ms(),
                    spread_ms = set.spread_ms(),
                    frames = set.len(),
                    "frame set received"
                );

                if options
                    .max_frames
                    .is_some_and(|max| aggregator.total_sets >= max)
                {
                    info!(frame_sets = aggregator.total_sets, "Reached max frames limit");
                    return (aggregator, RunEnd::MaxFrames);
                }
            }
            Err(PipelineError::Stopped) => return (aggregator, RunEnd::Stopped),
            Err(e) => {
                warn!(error = %e, "frame retrieval failed");
                return (aggregator, RunEnd::Failed(e));
            }
        }
    }
}
