//! Thread-safe frame synchronizer
//!
//! Capture threads push frames, one consumer takes frame sets. The
//! delivery slot holds at most one set: a newer set replaces an unconsumed
//! one, so a slow consumer always sees the freshest data.

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use contracts::{
    CaptureEvent, FrameCallback, FrameSet, PipelineError, RawFrame, Result, StreamProfile,
    SyncStats,
};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, instrument, warn};

use crate::matcher::FrameMatcher;

#[derive(Debug)]
struct Inner {
    matcher: FrameMatcher,
    slot: Option<FrameSet>,
    last_queued_ms: Option<f64>,
    fault: Option<String>,
    shutdown: bool,
    sets_delivered: u64,
    sets_dropped: u64,
}

impl Inner {
    fn queue(&mut self, set: FrameSet) {
        let ts = set.timestamp_ms();
        if self.last_queued_ms.is_some_and(|last| ts < last) {
            self.sets_dropped += 1;
            observability::record_frame_set_dropped("out_of_order");
            warn!(number = set.number(), timestamp_ms = ts, "out-of-order frame set discarded");
            return;
        }
        self.last_queued_ms = Some(ts);

        if let Some(replaced) = self.slot.replace(set) {
            self.sets_dropped += 1;
            observability::record_frame_set_dropped("replaced");
            debug!(number = replaced.number(), "unconsumed frame set replaced");
        }
    }

    /// Terminal conditions first, then the queued set
    fn take(&mut self) -> Result<Option<FrameSet>> {
        if self.shutdown {
            return Err(PipelineError::Stopped);
        }
        if let Some(message) = &self.fault {
            return Err(PipelineError::device_fault(message.clone()));
        }
        let set = self.slot.take();
        if set.is_some() {
            self.sets_delivered += 1;
        }
        Ok(set)
    }
}

/// Frame Synchronizer of one streaming session
#[derive(Debug)]
pub struct FrameSynchronizer {
    inner: Mutex<Inner>,
    ready: Condvar,
}

impl FrameSynchronizer {
    /// Synchronizer over `profiles`; `tolerance_ms = None` uses half the
    /// longest frame period
    pub fn new(profiles: &[StreamProfile], tolerance_ms: Option<f64>) -> Self {
        let matcher = FrameMatcher::new(profiles, tolerance_ms);
        debug!(
            streams = profiles.len(),
            tolerance_ms = matcher.tolerance_ms(),
            "frame synchronizer created"
        );

        Self {
            inner: Mutex::new(Inner {
                matcher,
                slot: None,
                last_queued_ms: None,
                fault: None,
                shutdown: false,
                sets_delivered: 0,
                sets_dropped: 0,
            }),
            ready: Condvar::new(),
        }
    }

    /// Capture callback feeding this synchronizer
    ///
    /// Holds a weak reference: events arriving after the synchronizer is
    /// dropped are discarded.
    pub fn callback(self: &Arc<Self>) -> FrameCallback {
        let sync: Weak<Self> = Arc::downgrade(self);
        Arc::new(move |event| {
            if let Some(sync) = sync.upgrade() {
                sync.push_event(event);
            }
        })
    }

    pub fn push_event(&self, event: CaptureEvent) {
        match event {
            CaptureEvent::Frame(frame) => self.push(frame),
            CaptureEvent::Fault(message) => self.fail(message),
        }
    }

    /// Offer a frame; never blocks on the consumer
    pub fn push(&self, frame: RawFrame) {
        let mut inner = self.inner.lock();
        if inner.shutdown || inner.fault.is_some() {
            return;
        }
        if let Some(set) = inner.matcher.push(frame) {
            inner.queue(set);
            self.ready.notify_all();
        }
    }

    /// Record a capture fault; surfaced by every later wait / poll
    pub fn fail(&self, message: impl Into<String>) {
        let message = message.into();
        let mut inner = self.inner.lock();
        if inner.shutdown || inner.fault.is_some() {
            return;
        }
        warn!(%message, "capture fault");
        observability::record_capture_fault();
        inner.fault = Some(message);
        self.ready.notify_all();
    }

    /// Stop accepting frames and wake every waiter with `Stopped`
    ///
    /// An undelivered set is discarded.
    pub fn shutdown(&self) {
        let mut inner = self.inner.lock();
        if inner.shutdown {
            return;
        }
        inner.shutdown = true;
        inner.matcher.clear();
        if inner.slot.take().is_some() {
            inner.sets_dropped += 1;
            observability::record_frame_set_dropped("shutdown");
        }
        self.ready.notify_all();
        debug!("frame synchronizer shut down");
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.lock().shutdown
    }

    /// Block until a new frame set, a fault, a shutdown or `timeout`
    ///
    /// A timeout past the representable deadline waits without one.
    #[instrument(
        level = "debug",
        name = "frame_synchronizer_wait",
        skip(self),
        fields(timeout_ms = millis(timeout))
    )]
    pub fn wait_for_next(&self, timeout: Duration) -> Result<FrameSet> {
        let started = Instant::now();
        let deadline = started.checked_add(timeout);
        let mut inner = self.inner.lock();

        loop {
            if let Some(set) = inner.take()? {
                observability::record_frame_set_delivered(elapsed_ms(started));
                return Ok(set);
            }
            let timed_out = match deadline {
                Some(deadline) => self.ready.wait_until(&mut inner, deadline).timed_out(),
                None => {
                    self.ready.wait(&mut inner);
                    false
                }
            };
            if timed_out {
                if let Some(set) = inner.take()? {
                    observability::record_frame_set_delivered(elapsed_ms(started));
                    return Ok(set);
                }
                return Err(PipelineError::Timeout {
                    waited_ms: millis(timeout),
                });
            }
        }
    }

    /// Take the queued frame set, if any, without blocking
    pub fn try_next(&self) -> Result<Option<FrameSet>> {
        let set = self.inner.lock().take()?;
        if set.is_some() {
            observability::record_frame_set_delivered(0.0);
        }
        Ok(set)
    }

    pub fn tolerance_ms(&self) -> f64 {
        self.inner.lock().matcher.tolerance_ms()
    }

    pub fn stats(&self) -> SyncStats {
        let inner = self.inner.lock();
        SyncStats {
            sets_delivered: inner.sets_delivered,
            sets_dropped: inner.sets_dropped,
            ..inner.matcher.stats()
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}
