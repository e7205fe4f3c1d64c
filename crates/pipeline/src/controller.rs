//! Pipeline Controller
//!
//! Lifecycle state machine over the request set, the resolver, the device
//! session and the frame synchronizer.
//!
//! Every method takes `&self`; transitions are serialized by one mutex.
//! Blocking retrieval clones the synchronizer out and releases the mutex
//! before waiting, so `stop` can run from another thread and wake it.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use contracts::{
    Device, DeviceContext, DeviceSerial, FrameSet, PipelineConfig, PipelineError, PipelineState,
    ProcessingModule, Result, StreamKind, StreamProfile, StreamRequest, SyncStats,
};
use device_session::DeviceSession;
use parking_lot::Mutex;
use sync_engine::FrameSynchronizer;
use tracing::{debug, info, instrument, warn};
use validator::Validate;

use crate::request_set::StreamRequestSet;
use crate::resolver::{merge_requirements, resolve, ResolvedConfiguration};

/// Timeout used by `wait_for_frames_default`
pub const DEFAULT_FRAME_TIMEOUT: Duration = Duration::from_millis(5000);

#[derive(Default)]
struct PipelineInner {
    state: PipelineState,
    requests: StreamRequestSet,
    device_serial: Option<DeviceSerial>,
    modules: Vec<Arc<dyn ProcessingModule>>,
    tolerance_ms: Option<f64>,
    resolved: Option<ResolvedConfiguration>,
    session: Option<DeviceSession>,
    synchronizer: Option<Arc<FrameSynchronizer>>,
}

impl PipelineInner {
    fn transition(&mut self, to: PipelineState) {
        if self.state != to {
            info!(from = %self.state, to = %to, "pipeline state changed");
            observability::record_state_transition(to);
            self.state = to;
        }
    }

    /// Gate for request-set mutations; moves Created to Configuring
    fn configure(&mut self, operation: &'static str) -> Result<()> {
        if !self.state.accepts_configuration() {
            return Err(PipelineError::invalid_state(operation, self.state));
        }
        self.transition(PipelineState::Configuring);
        Ok(())
    }

    fn resolve(&self, context: &dyn DeviceContext) -> Result<ResolvedConfiguration> {
        let requests = merge_requirements(&self.requests, &self.modules)?;
        let devices = context.query_devices();
        resolve(&devices, &requests, self.device_serial.as_ref())
    }

    fn teardown(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.deactivate();
        }
        if let Some(sync) = &self.synchronizer {
            sync.shutdown();
        }
    }
}

/// Streaming pipeline
///
/// `Send + Sync`; share it with `Arc` to stop from another thread.
pub struct Pipeline {
    context: Arc<dyn DeviceContext>,
    inner: Mutex<PipelineInner>,
}

impl Pipeline {
    pub fn new(context: Arc<dyn DeviceContext>) -> Self {
        Self {
            context,
            inner: Mutex::new(PipelineInner::default()),
        }
    }

    pub fn state(&self) -> PipelineState {
        self.inner.lock().state
    }

    // ===== Configuration =====

    /// Request a stream; replaces an earlier request for the same (kind, index)
    pub fn enable_stream(&self, request: StreamRequest) -> Result<()> {
        request.validate().map_err(|e| {
            PipelineError::configuration(format!("invalid stream request {request}: {e}"))
        })?;

        let mut inner = self.inner.lock();
        inner.configure("enable_stream")?;
        if let Some(previous) = inner.requests.insert(request) {
            debug!(%previous, %request, "stream request replaced");
        } else {
            debug!(%request, "stream enabled");
        }
        Ok(())
    }

    /// Remove every request of `kind`; no-op if there is none
    pub fn disable_stream(&self, kind: StreamKind) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.configure("disable_stream")?;
        let removed = inner.requests.remove_kind(kind);
        debug!(stream = %kind, removed, "stream disabled");
        Ok(())
    }

    pub fn disable_all(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.configure("disable_all")?;
        inner.requests.clear();
        debug!("all streams disabled");
        Ok(())
    }

    /// Restrict device selection to `serial`
    pub fn enable_device(&self, serial: impl Into<DeviceSerial>) -> Result<()> {
        let serial = serial.into();
        let mut inner = self.inner.lock();
        inner.configure("enable_device")?;
        debug!(serial = %serial, "device constraint set");
        inner.device_serial = Some(serial);
        Ok(())
    }

    /// Register a processing module whose requirements join resolution
    pub fn attach_module(&self, module: Arc<dyn ProcessingModule>) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.configure("attach_module")?;
        debug!(module = module.name(), "module attached");
        inner.modules.push(module);
        Ok(())
    }

    /// Max timestamp spread inside a frame set; `None` restores the default
    pub fn set_sync_tolerance(&self, tolerance_ms: Option<f64>) -> Result<()> {
        check_tolerance(tolerance_ms)?;
        let mut inner = self.inner.lock();
        inner.configure("set_sync_tolerance")?;
        inner.tolerance_ms = tolerance_ms;
        Ok(())
    }

    /// Apply a loaded configuration on top of the current one
    ///
    /// Streams are enabled one by one (last write wins); the device serial
    /// and the tolerance are set when present.
    #[instrument(name = "pipeline_apply_config", skip(self, config), fields(streams = config.streams.len()))]
    pub fn apply_config(&self, config: &PipelineConfig) -> Result<()> {
        for request in &config.streams {
            request.validate().map_err(|e| {
                PipelineError::configuration(format!("invalid stream request {request}: {e}"))
            })?;
        }
        check_tolerance(config.sync.tolerance_ms)?;

        let mut inner = self.inner.lock();
        inner.configure("apply_config")?;
        for request in &config.streams {
            inner.requests.insert(*request);
        }
        if let Some(serial) = &config.pipeline.device_serial {
            inner.device_serial = Some(serial.clone());
        }
        if config.sync.tolerance_ms.is_some() {
            inner.tolerance_ms = config.sync.tolerance_ms;
        }
        info!(requests = inner.requests.len(), "configuration applied");
        Ok(())
    }

    // ===== Lifecycle =====

    /// Resolve and commit the configuration without streaming
    #[instrument(name = "pipeline_open", skip(self))]
    pub fn open(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        match inner.state {
            PipelineState::Created | PipelineState::Configuring => {
                let resolved = inner.resolve(self.context.as_ref())?;
                inner.resolved = Some(resolved);
                inner.transition(PipelineState::Committed);
                Ok(())
            }
            PipelineState::Committed => {
                debug!("already committed");
                Ok(())
            }
            state @ (PipelineState::Streaming | PipelineState::Stopped) => {
                Err(PipelineError::invalid_state("open", state))
            }
        }
    }

    /// Activate the device and start streaming
    ///
    /// Resolves first when not yet committed; reuses the committed
    /// configuration otherwise. On failure the state is unchanged.
    #[instrument(name = "pipeline_start", skip(self))]
    pub fn start(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.state == PipelineState::Streaming {
            debug!("already streaming");
            return Ok(());
        }

        let resolved = match &inner.resolved {
            Some(resolved) => resolved.clone(),
            None => inner.resolve(self.context.as_ref())?,
        };

        let sync = Arc::new(FrameSynchronizer::new(
            &resolved.profiles,
            inner.tolerance_ms,
        ));
        let session = DeviceSession::activate(
            resolved.device.clone(),
            &resolved.profiles,
            sync.callback(),
        )?;

        inner.resolved = Some(resolved);
        inner.session = Some(session);
        inner.synchronizer = Some(sync);
        inner.transition(PipelineState::Streaming);
        Ok(())
    }

    /// Stop streaming; the configuration is kept for a later `start`
    #[instrument(name = "pipeline_stop", skip(self))]
    pub fn stop(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.state != PipelineState::Streaming {
            return Err(PipelineError::invalid_state("stop", inner.state));
        }

        inner.teardown();
        if let Some(sync) = &inner.synchronizer {
            let stats = sync.stats();
            info!(
                sets_delivered = stats.sets_delivered,
                sets_dropped = stats.sets_dropped,
                frames_dropped = stats.frames_dropped,
                "streaming stopped"
            );
        }
        inner.transition(PipelineState::Stopped);
        Ok(())
    }

    /// Forget every request, constraint, module and resolution
    ///
    /// Valid from every state but `Streaming`. A committed configuration
    /// that never started can be dropped and rebuilt from scratch.
    #[instrument(name = "pipeline_reset_config", skip(self))]
    pub fn reset_config(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.state == PipelineState::Streaming {
            return Err(PipelineError::invalid_state("reset_config", inner.state));
        }

        inner.teardown();
        let previous = inner.state;
        *inner = PipelineInner::default();
        if previous != PipelineState::Created {
            info!(from = %previous, to = %PipelineState::Created, "pipeline state changed");
            observability::record_state_transition(PipelineState::Created);
        }
        Ok(())
    }

    // ===== Frame Retrieval =====

    /// Block until the next frame set
    ///
    /// # Errors
    /// - `InvalidState` when not streaming
    /// - `Timeout` when nothing arrived within `timeout`
    /// - `Stopped` when `stop` ran while waiting
    /// - `DeviceFault` when capture reported a fault
    pub fn wait_for_frames(&self, timeout: Duration) -> Result<FrameSet> {
        let sync = self.streaming_synchronizer("wait_for_frames")?;
        let result = sync.wait_for_next(timeout);
        if let Err(e @ PipelineError::DeviceFault { .. }) = &result {
            warn!(error = %e, "frame wait failed");
        }
        result
    }

    /// `wait_for_frames` with `DEFAULT_FRAME_TIMEOUT`
    pub fn wait_for_frames_default(&self) -> Result<FrameSet> {
        self.wait_for_frames(DEFAULT_FRAME_TIMEOUT)
    }

    /// Take a frame set if one is ready
    pub fn poll_for_frames(&self) -> Result<Option<FrameSet>> {
        self.streaming_synchronizer("poll_for_frames")?.try_next()
    }

    fn streaming_synchronizer(&self, operation: &'static str) -> Result<Arc<FrameSynchronizer>> {
        let inner = self.inner.lock();
        match (&inner.state, &inner.synchronizer) {
            (PipelineState::Streaming, Some(sync)) => Ok(sync.clone()),
            _ => Err(PipelineError::invalid_state(operation, inner.state)),
        }
    }

    // ===== Queries =====

    /// Profiles selected at commit, ordered by (kind, index)
    pub fn get_active_streams(&self) -> Result<Vec<StreamProfile>> {
        self.with_resolved(|r| r.profiles.clone())
    }

    /// Active profile for (kind, index); index 0 selects the first of `kind`
    pub fn get_active_stream(&self, kind: StreamKind, index: u32) -> Result<StreamProfile> {
        self.with_resolved(|r| r.profile(kind, index))?
            .ok_or_else(|| {
                PipelineError::configuration(format!("stream {kind} #{index} is not active"))
            })
    }

    /// Device selected at commit
    pub fn get_device(&self) -> Result<Arc<dyn Device>> {
        self.with_resolved(|r| r.device.clone())
    }

    /// Counters of the current (or last) streaming session
    pub fn sync_stats(&self) -> SyncStats {
        self.inner
            .lock()
            .synchronizer
            .as_ref()
            .map(|s| s.stats())
            .unwrap_or_default()
    }

    /// Effective tolerance of the current (or last) streaming session
    pub fn sync_tolerance_ms(&self) -> Option<f64> {
        self.inner
            .lock()
            .synchronizer
            .as_ref()
            .map(|s| s.tolerance_ms())
    }

    fn with_resolved<T>(&self, f: impl FnOnce(&ResolvedConfiguration) -> T) -> Result<T> {
        let inner = self.inner.lock();
        inner.resolved.as_ref().map(f).ok_or_else(|| {
            PipelineError::not_ready("no configuration committed; call open or start first")
        })
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.inner.get_mut().teardown();
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Pipeline")
            .field("state", &inner.state)
            .field("requests", &inner.requests.len())
            .field("device_serial", &inner.device_serial)
            .field("modules", &inner.modules.len())
            .finish()
    }
}

fn check_tolerance(tolerance_ms: Option<f64>) -> Result<()> {
    match tolerance_ms {
        Some(t) if !(t.is_finite() && t > 0.0) => Err(PipelineError::configuration(format!(
            "sync tolerance must be a finite value > 0, got {t}"
        ))),
        _ => Ok(()),
    }
}
