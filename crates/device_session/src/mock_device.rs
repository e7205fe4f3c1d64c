//! Simulated device
//!
//! Implements `Device` and `CaptureSource` with background capture threads,
//! so the pipeline can run without hardware. Each opened sensor gets one
//! thread that emits frames for all of its configured profiles.
//!
//! Timestamps come from a per-device clock: a profile at `fps` emits on the
//! grid `k * 1000 / fps` ms after the device epoch, so streams of the same
//! device with compatible rates line up exactly.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bytes::Bytes;
use contracts::{
    CaptureEvent, CaptureSource, Device, DeviceConfig, DeviceInfo, DeviceSerial, Format,
    FrameCallback, PipelineError, RawFrame, Result, SensorInfo, StreamKind, StreamProfile,
};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace, warn};

/// Simulated device
pub struct MockDevice {
    info: DeviceInfo,
    sensors: Vec<SensorInfo>,
    fault_after_frames: Option<u64>,
    epoch: Instant,
    disconnected: Arc<AtomicBool>,
    sources: Mutex<Vec<Weak<SourceShared>>>,
}

impl MockDevice {
    pub fn new(info: DeviceInfo, sensors: Vec<SensorInfo>) -> Self {
        Self {
            info,
            sensors,
            fault_after_frames: None,
            epoch: Instant::now(),
            disconnected: Arc::new(AtomicBool::new(false)),
            sources: Mutex::new(Vec::new()),
        }
    }

    /// Build from a configuration file entry
    pub fn from_config(config: &DeviceConfig) -> Self {
        let info = DeviceInfo {
            serial: config.serial.clone(),
            name: config.name.clone(),
            firmware: config.firmware.clone(),
        };
        let sensors = config
            .sensors
            .iter()
            .map(|s| SensorInfo {
                name: s.name.clone(),
                profiles: s.profiles.clone(),
            })
            .collect();

        let mut device = Self::new(info, sensors);
        device.fault_after_frames = config.fault_after_frames;
        device
    }

    /// Depth camera with a stereo module and an RGB module
    ///
    /// Stereo Module: depth (640x480 Z16 @30 default, 1280x720 Z16 @15),
    /// infrared 1 and 2 (640x480 Y8 @30).
    /// RGB Camera: color (640x480 RGB8 @30 default, 640x480 BGR8 @30,
    /// 1280x720 RGB8 @15).
    pub fn stereo_camera(serial: &str) -> Self {
        let info = DeviceInfo {
            serial: serial.into(),
            name: "Simulated Stereo Camera".into(),
            firmware: Some("5.16.0.1".into()),
        };
        let stereo = SensorInfo {
            name: "Stereo Module".into(),
            profiles: vec![
                StreamProfile::new(StreamKind::Depth, 0, 640, 480, Format::Z16, 30),
                StreamProfile::new(StreamKind::Depth, 0, 1280, 720, Format::Z16, 15),
                StreamProfile::new(StreamKind::Infrared, 1, 640, 480, Format::Y8, 30),
                StreamProfile::new(StreamKind::Infrared, 2, 640, 480, Format::Y8, 30),
            ],
        };
        let rgb = SensorInfo {
            name: "RGB Camera".into(),
            profiles: vec![
                StreamProfile::new(StreamKind::Color, 0, 640, 480, Format::Rgb8, 30),
                StreamProfile::new(StreamKind::Color, 0, 640, 480, Format::Bgr8, 30),
                StreamProfile::new(StreamKind::Color, 0, 1280, 720, Format::Rgb8, 15),
            ],
        };
        Self::new(info, vec![stereo, rgb])
    }

    /// Emit a fault from each capture thread after `frames` frames
    pub fn with_fault_after(mut self, frames: u64) -> Self {
        self.fault_after_frames = Some(frames);
        self
    }

    pub fn serial(&self) -> &DeviceSerial {
        &self.info.serial
    }

    /// Simulate an unplug
    ///
    /// Every running capture thread reports a fault and stops; later `open`
    /// calls fail.
    pub fn disconnect(&self) {
        if self.disconnected.swap(true, Ordering::SeqCst) {
            return;
        }
        warn!(serial = %self.info.serial, "mock device disconnected");
        for shared in self.sources.lock().iter().filter_map(Weak::upgrade) {
            shared.wake();
        }
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }
}

impl Device for MockDevice {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn sensors(&self) -> &[SensorInfo] {
        &self.sensors
    }

    fn open(&self, sensor: &str, profiles: &[StreamProfile]) -> Result<Box<dyn CaptureSource>> {
        if self.is_disconnected() {
            return Err(PipelineError::device_fault(format!(
                "device {} is disconnected",
                self.info.serial
            )));
        }

        let info = self
            .sensors
            .iter()
            .find(|s| s.name == sensor)
            .ok_or_else(|| {
                PipelineError::configuration(format!(
                    "device {} has no sensor '{sensor}'",
                    self.info.serial
                ))
            })?;

        if profiles.is_empty() {
            return Err(PipelineError::configuration(format!(
                "no profiles requested on sensor '{sensor}'"
            )));
        }
        if let Some(p) = profiles.iter().find(|p| !info.profiles.contains(p)) {
            return Err(PipelineError::configuration(format!(
                "sensor '{sensor}' does not offer {p}"
            )));
        }

        let shared = Arc::new(SourceShared {
            listening: AtomicBool::new(false),
            disconnected: self.disconnected.clone(),
            wake_lock: Mutex::new(()),
            wake_cv: Condvar::new(),
        });
        {
            let mut sources = self.sources.lock();
            sources.retain(|w| w.strong_count() > 0);
            sources.push(Arc::downgrade(&shared));
        }

        debug!(
            serial = %self.info.serial,
            sensor,
            profiles = profiles.len(),
            "mock sensor opened"
        );

        Ok(Box::new(MockCaptureSource {
            serial: self.info.serial.clone(),
            sensor_name: sensor.to_string(),
            profiles: profiles.to_vec(),
            epoch: self.epoch,
            fault_after_frames: self.fault_after_frames,
            emitted: Arc::new(AtomicU64::new(0)),
            shared,
            worker: Mutex::new(None),
        }))
    }
}

/// State shared between a capture source and its thread
struct SourceShared {
    listening: AtomicBool,
    disconnected: Arc<AtomicBool>,
    wake_lock: Mutex<()>,
    wake_cv: Condvar,
}

enum Wake {
    Tick,
    Stopped,
    Disconnected,
}

impl SourceShared {
    fn wake(&self) {
        let _guard = self.wake_lock.lock();
        self.wake_cv.notify_all();
    }

    /// Sleep until `deadline`, a stop, or a disconnect
    fn sleep_until(&self, deadline: Instant) -> Wake {
        let mut guard = self.wake_lock.lock();
        loop {
            if !self.listening.load(Ordering::SeqCst) {
                return Wake::Stopped;
            }
            if self.disconnected.load(Ordering::SeqCst) {
                return Wake::Disconnected;
            }
            if self.wake_cv.wait_until(&mut guard, deadline).timed_out() {
                return Wake::Tick;
            }
        }
    }
}

/// Capture source of one simulated sensor
pub struct MockCaptureSource {
    serial: DeviceSerial,
    sensor_name: String,
    profiles: Vec<StreamProfile>,
    epoch: Instant,
    fault_after_frames: Option<u64>,
    emitted: Arc<AtomicU64>,
    shared: Arc<SourceShared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl MockCaptureSource {
    pub fn profiles(&self) -> &[StreamProfile] {
        &self.profiles
    }

    /// Frames emitted since the source was opened
    pub fn frames_emitted(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }
}

/// Per-profile emission schedule
struct StreamClock {
    profile: StreamProfile,
    period: Duration,
    next_tick: u64,
    sequence: u64,
    payload: Bytes,
}

impl StreamClock {
    fn new(profile: StreamProfile, epoch: Instant) -> Self {
        let period = Duration::from_secs_f64(profile.frame_period_ms() / 1000.0);
        let elapsed = epoch.elapsed().as_secs_f64();
        let next_tick = (elapsed / period.as_secs_f64()).floor() as u64 + 1;
        Self {
            profile,
            period,
            next_tick,
            sequence: 0,
            payload: Bytes::from(vec![0u8; profile.frame_size()]),
        }
    }

    fn deadline(&self, epoch: Instant) -> Instant {
        epoch + self.period.mul_f64(self.next_tick as f64)
    }

    fn emit(&mut self) -> RawFrame {
        self.sequence += 1;
        let timestamp_ms = self.next_tick as f64 * self.profile.frame_period_ms();
        self.next_tick += 1;
        RawFrame::new(self.profile, timestamp_ms, self.sequence, self.payload.clone())
    }
}

impl CaptureSource for MockCaptureSource {
    fn sensor_name(&self) -> &str {
        &self.sensor_name
    }

    fn start(&self, callback: FrameCallback) {
        // Idempotent: if already streaming, don't start again
        if self.shared.listening.swap(true, Ordering::SeqCst) {
            return;
        }

        let serial = self.serial.clone();
        let sensor = self.sensor_name.clone();
        let epoch = self.epoch;
        let fault_after = self.fault_after_frames;
        let emitted = self.emitted.clone();
        let shared = self.shared.clone();
        let mut clocks: Vec<StreamClock> = self
            .profiles
            .iter()
            .map(|p| StreamClock::new(*p, epoch))
            .collect();

        let handle = thread::spawn(move || {
            debug!(serial = %serial, sensor = %sensor, streams = clocks.len(), "mock capture started");
            let mut sensor_frames: u64 = 0;

            loop {
                let Some(next) = clocks
                    .iter_mut()
                    .min_by_key(|c| c.deadline(epoch))
                else {
                    break;
                };

                match shared.sleep_until(next.deadline(epoch)) {
                    Wake::Stopped => break,
                    Wake::Disconnected => {
                        callback(CaptureEvent::Fault(format!(
                            "device {serial} disconnected"
                        )));
                        shared.listening.store(false, Ordering::SeqCst);
                        break;
                    }
                    Wake::Tick => {}
                }

                let frame = next.emit();
                trace!(
                    sensor = %sensor,
                    stream = %frame.kind(),
                    sequence = frame.sequence,
                    timestamp_ms = frame.timestamp_ms,
                    "mock frame emitted"
                );
                callback(CaptureEvent::Frame(frame));
                emitted.fetch_add(1, Ordering::Relaxed);
                sensor_frames += 1;

                if fault_after.is_some_and(|n| sensor_frames >= n) {
                    warn!(serial = %serial, sensor = %sensor, frames = sensor_frames, "injected capture fault");
                    callback(CaptureEvent::Fault(format!(
                        "sensor '{sensor}' of device {serial} stopped responding"
                    )));
                    shared.listening.store(false, Ordering::SeqCst);
                    break;
                }
            }

            debug!(serial = %serial, sensor = %sensor, "mock capture stopped");
        });

        *self.worker.lock() = Some(handle);
    }

    fn stop(&self) {
        self.shared.listening.store(false, Ordering::SeqCst);
        self.shared.wake();

        if let Some(handle) = self.worker.lock().take() {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }

    fn is_streaming(&self) -> bool {
        self.shared.listening.load(Ordering::SeqCst)
    }
}

impl Drop for MockCaptureSource {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn collect(source: &dyn CaptureSource) -> Arc<Mutex<Vec<CaptureEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        source.start(Arc::new(move |event| sink.lock().push(event)));
        events
    }

    fn frames(events: &[CaptureEvent]) -> Vec<RawFrame> {
        events
            .iter()
            .filter_map(|e| match e {
                CaptureEvent::Frame(f) => Some(f.clone()),
                CaptureEvent::Fault(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_open_rejects_unknown_sensor_and_profile() {
        let device = MockDevice::stereo_camera("MOCK-OPEN");
        assert!(matches!(
            device.open("Fisheye Module", &[]),
            Err(PipelineError::Configuration { .. })
        ));

        let bogus = StreamProfile::new(StreamKind::Depth, 0, 320, 240, Format::Z16, 90);
        assert!(matches!(
            device.open("Stereo Module", &[bogus]),
            Err(PipelineError::Configuration { .. })
        ));
    }

    #[test]
    fn test_capture_emits_on_device_clock() {
        let device = MockDevice::stereo_camera("MOCK-CLOCK");
        let depth = device.sensors()[0].profiles[0];
        let ir = device.sensors()[0].profiles[2];
        let source = device.open("Stereo Module", &[depth, ir]).unwrap();

        let events = collect(source.as_ref());
        thread::sleep(Duration::from_millis(200));
        source.stop();
        assert!(!source.is_streaming());

        let frames = frames(&events.lock());
        assert!(frames.len() >= 4, "got {} frames", frames.len());

        let mut last_seq: HashMap<_, u64> = HashMap::new();
        for f in &frames {
            let period = f.profile.frame_period_ms();
            let ticks = f.timestamp_ms / period;
            assert!((ticks - ticks.round()).abs() < 1e-6, "off-grid ts {}", f.timestamp_ms);

            let prev = last_seq.insert(f.key(), f.sequence).unwrap_or(0);
            assert_eq!(f.sequence, prev + 1);
            assert_eq!(f.data.len(), f.profile.frame_size());
        }
    }

    #[test]
    fn test_stop_halts_thread() {
        let device = MockDevice::stereo_camera("MOCK-STOP");
        let color = device.sensors()[1].profiles[0];
        let source = device.open("RGB Camera", &[color]).unwrap();

        let events = collect(source.as_ref());
        thread::sleep(Duration::from_millis(80));
        source.stop();
        let count = events.lock().len();
        thread::sleep(Duration::from_millis(80));
        assert_eq!(events.lock().len(), count);
    }

    #[test]
    fn test_idempotent_start() {
        let device = MockDevice::stereo_camera("MOCK-IDEM");
        let color = device.sensors()[1].profiles[0];
        let source = device.open("RGB Camera", &[color]).unwrap();

        let first = collect(source.as_ref());
        let second = collect(source.as_ref());
        thread::sleep(Duration::from_millis(100));
        source.stop();

        assert!(!first.lock().is_empty());
        assert!(second.lock().is_empty());
    }

    #[test]
    fn test_fault_after_frames() {
        let device = MockDevice::stereo_camera("MOCK-FAULT").with_fault_after(3);
        let color = device.sensors()[1].profiles[0];
        let source = device.open("RGB Camera", &[color]).unwrap();

        let events = collect(source.as_ref());
        thread::sleep(Duration::from_millis(250));

        let events = events.lock();
        assert_eq!(frames(&events).len(), 3);
        assert!(matches!(events.last(), Some(CaptureEvent::Fault(_))));
        assert!(!source.is_streaming());
    }

    #[test]
    fn test_disconnect_faults_running_sources() {
        let device = MockDevice::stereo_camera("MOCK-UNPLUG");
        let color = device.sensors()[1].profiles[0];
        let source = device.open("RGB Camera", &[color]).unwrap();

        let events = collect(source.as_ref());
        thread::sleep(Duration::from_millis(50));
        device.disconnect();
        thread::sleep(Duration::from_millis(50));

        assert!(matches!(events.lock().last(), Some(CaptureEvent::Fault(_))));
        assert!(!source.is_streaming());
        assert!(matches!(
            device.open("RGB Camera", &[color]),
            Err(PipelineError::DeviceFault { .. })
        ));
    }
}
