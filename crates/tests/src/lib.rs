//! # Integration Tests
//!
//! End-to-end scenarios over the simulated backend:
//! configuration file → resolution → activation → synchronized frame sets.

#[cfg(test)]
mod contract_tests {
    use contracts::{PipelineError, PipelineState};

    #[test]
    fn test_error_messages_name_operation_and_state() {
        let err = PipelineError::invalid_state("reset_config", PipelineState::Streaming);
        assert_eq!(
            err.to_string(),
            "invalid state: cannot reset_config while streaming"
        );

        let err = PipelineError::NoDevice {
            serial: Some("X1".to_string()),
        };
        assert!(err.to_string().contains("X1"));
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{Device, Format, ProcessingModule, StreamKind, StreamRequest};
    use device_session::{DeviceSession, MockContext, MockDevice, SensorRegistry};
    use sync_engine::FrameSynchronizer;
    use observability::SyncStatsAggregator;
    use pipeline::{Pipeline, PipelineError, PipelineState};

    const WAIT: Duration = Duration::from_millis(5000);

    fn stereo(serial: &str) -> Arc<MockContext> {
        Arc::new(MockContext::with_devices(vec![MockDevice::stereo_camera(
            serial,
        )]))
    }

    /// A = 640x480 Z16 @ 30 depth, B = color with the device default
    #[test]
    fn test_explicit_plus_default_stream() {
        let pipe = Pipeline::new(stereo("E2E-AB"));
        pipe.enable_stream(
            StreamRequest::new(StreamKind::Depth)
                .with_resolution(640, 480)
                .with_format(Format::Z16)
                .with_fps(30),
        )
        .unwrap();
        pipe.enable_stream(StreamRequest::new(StreamKind::Color))
            .unwrap();
        pipe.start().unwrap();

        let set = pipe.wait_for_frames(WAIT).unwrap();
        assert_eq!(set.len(), 2);

        let depth = set.depth().unwrap();
        assert_eq!(depth.profile.format, Format::Z16);
        assert_eq!((depth.profile.width, depth.profile.height), (640, 480));
        assert_eq!(depth.data.len(), 640 * 480 * 2);

        let color = set.color().unwrap();
        assert_eq!(
            color.profile,
            pipe.get_active_stream(StreamKind::Color, 0).unwrap()
        );
        assert!(set.spread_ms() <= pipe.sync_tolerance_ms().unwrap());

        pipe.stop().unwrap();
    }

    #[test]
    fn test_every_set_has_one_frame_per_active_profile() {
        let pipe = Pipeline::new(stereo("E2E-ALL"));
        pipe.start().unwrap();
        let active = pipe.get_active_streams().unwrap();
        assert_eq!(active.len(), 4);

        let mut stats = SyncStatsAggregator::new();
        for _ in 0..5 {
            let set = pipe.wait_for_frames(WAIT).unwrap();
            let profiles: Vec<_> = set.iter().map(|f| f.profile).collect();
            assert_eq!(profiles, active);
            stats.update(&set);
        }
        pipe.stop().unwrap();
        stats.absorb(pipe.sync_stats());

        let summary = stats.summary();
        assert_eq!(summary.total_sets, 5);
        assert_eq!(summary.frames_per_stream.len(), 4);
        assert!(summary.sync.sets_delivered >= 5);
    }

    #[test]
    fn test_session_feeds_synchronizer() {
        let device: Arc<dyn Device> = Arc::new(MockDevice::stereo_camera("E2E-RAW"));
        let profiles = vec![
            device.default_profile((StreamKind::Depth, 0)).unwrap(),
            device.default_profile((StreamKind::Color, 0)).unwrap(),
        ];
        let sync = Arc::new(FrameSynchronizer::new(&profiles, None));
        let session = DeviceSession::activate(device, &profiles, sync.callback()).unwrap();

        let set = sync.wait_for_next(WAIT).unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.spread_ms() <= sync.tolerance_ms());

        drop(session);
        assert_eq!(SensorRegistry::owned_on("E2E-RAW"), 0);
        sync.shutdown();
        assert!(matches!(
            sync.wait_for_next(WAIT),
            Err(PipelineError::Stopped)
        ));
    }

    #[test]
    fn test_no_device_at_start() {
        let pipe = Pipeline::new(Arc::new(MockContext::new()));
        let err = pipe.start().unwrap_err();
        assert!(matches!(err, PipelineError::NoDevice { serial: None }));
        assert_eq!(pipe.state(), PipelineState::Created);
    }

    #[tokio::test]
    async fn test_stop_during_wait() {
        let pipe = Arc::new(Pipeline::new(stereo("E2E-STOP")));
        pipe.enable_stream(StreamRequest::new(StreamKind::Depth).with_fps(15))
            .unwrap();
        pipe.start().unwrap();

        let waiter = {
            let pipe = pipe.clone();
            tokio::task::spawn_blocking(move || {
                // consume until the stop lands
                let started = Instant::now();
                loop {
                    match pipe.wait_for_frames(Duration::from_secs(30)) {
                        Ok(_) => continue,
                        Err(e) => return (e, started.elapsed()),
                    }
                }
            })
        };

        tokio::time::sleep(Duration::from_millis(200)).await;
        pipe.stop().unwrap();

        let (err, elapsed) = waiter.await.unwrap();
        // InvalidState when the stop landed between two waits
        assert!(
            matches!(
                err,
                PipelineError::Stopped
                    | PipelineError::InvalidState {
                        state: PipelineState::Stopped,
                        ..
                    }
            ),
            "got: {err}"
        );
        assert!(elapsed < Duration::from_secs(5));
    }

    #[test]
    fn test_reset_while_streaming() {
        let pipe = Pipeline::new(stereo("E2E-RESET"));
        pipe.start().unwrap();

        assert!(matches!(
            pipe.reset_config(),
            Err(PipelineError::InvalidState { .. })
        ));
        assert_eq!(pipe.state(), PipelineState::Streaming);
        assert!(pipe.wait_for_frames(WAIT).is_ok());

        pipe.stop().unwrap();
        pipe.reset_config().unwrap();
        pipe.reset_config().unwrap();
        assert_eq!(pipe.state(), PipelineState::Created);
    }

    #[test]
    fn test_last_request_wins() {
        let pipe = Pipeline::new(stereo("E2E-LAST"));
        pipe.enable_stream(StreamRequest::new(StreamKind::Depth).with_fps(30))
            .unwrap();
        pipe.enable_stream(StreamRequest::new(StreamKind::Depth).with_fps(15))
            .unwrap();
        pipe.open().unwrap();

        let streams = pipe.get_active_streams().unwrap();
        assert_eq!(streams.len(), 1);
        assert_eq!((streams[0].width, streams[0].fps), (1280, 15));
    }

    #[test]
    fn test_sensor_ownership_across_pipelines() {
        let context = stereo("E2E-BUSY");
        let first = Pipeline::new(context.clone());
        let second = Pipeline::new(context);

        first
            .enable_stream(StreamRequest::new(StreamKind::Color))
            .unwrap();
        first.start().unwrap();

        // depth lives on another sensor
        second
            .enable_stream(StreamRequest::new(StreamKind::Depth))
            .unwrap();
        second.start().unwrap();

        let third = Pipeline::new(stereo("E2E-BUSY"));
        third
            .enable_stream(StreamRequest::new(StreamKind::Infrared).with_index(1))
            .unwrap();
        match third.start().unwrap_err() {
            PipelineError::DeviceBusy { serial, sensor } => {
                assert_eq!(serial, "E2E-BUSY");
                assert_eq!(sensor, "Stereo Module");
            }
            other => panic!("unexpected error: {other}"),
        }

        first.stop().unwrap();
        second.stop().unwrap();
        assert_eq!(SensorRegistry::owned_on("E2E-BUSY"), 0);
        third.start().unwrap();
        third.stop().unwrap();
    }

    #[test]
    fn test_capture_fault_surfaces() {
        let context = Arc::new(MockContext::with_devices(vec![
            MockDevice::stereo_camera("E2E-FAULT").with_fault_after(4),
        ]));
        let pipe = Pipeline::new(context);
        pipe.enable_stream(StreamRequest::new(StreamKind::Depth))
            .unwrap();
        pipe.start().unwrap();

        let deadline = Instant::now() + WAIT;
        let err = loop {
            match pipe.wait_for_frames(WAIT) {
                Ok(_) if Instant::now() < deadline => continue,
                Ok(_) => panic!("no fault within {WAIT:?}"),
                Err(e) => break e,
            }
        };
        assert!(matches!(err, PipelineError::DeviceFault { .. }));

        pipe.stop().unwrap();
        assert_eq!(SensorRegistry::owned_on("E2E-FAULT"), 0);
    }

    struct Aligner;

    impl ProcessingModule for Aligner {
        fn name(&self) -> &str {
            "aligner"
        }

        fn stream_requirements(&self) -> Vec<StreamRequest> {
            vec![
                StreamRequest::new(StreamKind::Depth).with_resolution(1280, 720),
                StreamRequest::new(StreamKind::Color),
            ]
        }
    }

    #[test]
    fn test_module_conflict() {
        let pipe = Pipeline::new(stereo("E2E-MODULE"));
        pipe.attach_module(Arc::new(Aligner)).unwrap();
        pipe.enable_stream(StreamRequest::new(StreamKind::Depth).with_resolution(640, 480))
            .unwrap();

        let err = pipe.start().unwrap_err();
        match err {
            PipelineError::Configuration { message } => {
                assert!(message.contains("aligner"), "got: {message}")
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(pipe.state(), PipelineState::Configuring);
    }

    #[test]
    fn test_module_streams_delivered() {
        let pipe = Pipeline::new(stereo("E2E-ALIGN"));
        pipe.attach_module(Arc::new(Aligner)).unwrap();
        pipe.start().unwrap();

        let set = pipe.wait_for_frames(WAIT).unwrap();
        assert_eq!(set.depth().unwrap().profile.width, 1280);
        assert!(set.color().is_some());
        pipe.stop().unwrap();
    }

    #[test]
    fn test_start_twice_and_queries() {
        let pipe = Pipeline::new(stereo("E2E-TWICE"));
        assert!(matches!(
            pipe.get_active_streams(),
            Err(PipelineError::NotReady { .. })
        ));

        pipe.start().unwrap();
        let streams = pipe.get_active_streams().unwrap();
        pipe.start().unwrap();
        assert_eq!(pipe.state(), PipelineState::Streaming);
        assert_eq!(pipe.get_active_streams().unwrap(), streams);
        assert!(!streams.is_empty());

        pipe.stop().unwrap();
    }

    const CONFIG: &str = r#"
[pipeline]
device_serial = "E2E-CFG-B"

[sync]
tolerance_ms = 10.0

[[streams]]
kind = "infrared"
index = 2

[[streams]]
kind = "color"
format = "bgr8"

[[devices]]
serial = "E2E-CFG-A"
name = "Depth Only"

[[devices.sensors]]
name = "Stereo Module"
profiles = [{ kind = "depth", width = 640, height = 480, format = "z16", fps = 30 }]

[[devices]]
serial = "E2E-CFG-B"
name = "Stereo Camera"

[[devices.sensors]]
name = "Stereo Module"
profiles = [
    { kind = "infrared", index = 1, width = 640, height = 480, format = "y8", fps = 30 },
    { kind = "infrared", index = 2, width = 640, height = 480, format = "y8", fps = 30 },
]

[[devices.sensors]]
name = "RGB Camera"
profiles = [
    { kind = "color", width = 640, height = 480, format = "rgb8", fps = 30 },
    { kind = "color", width = 640, height = 480, format = "bgr8", fps = 30 },
]
"#;

    #[test]
    fn test_config_file_end_to_end() {
        let config = ConfigLoader::load_from_str(CONFIG, ConfigFormat::Toml).unwrap();
        let pipe = Pipeline::new(Arc::new(MockContext::from_config(&config.devices)));
        pipe.apply_config(&config).unwrap();
        pipe.start().unwrap();

        assert_eq!(pipe.get_device().unwrap().info().serial, "E2E-CFG-B");
        assert_eq!(pipe.sync_tolerance_ms(), Some(10.0));

        let set = pipe.wait_for_frames(WAIT).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.get(StreamKind::Infrared, 0).unwrap().index(), 2);
        assert_eq!(set.color().unwrap().profile.format, Format::Bgr8);

        pipe.stop().unwrap();
    }

    #[test]
    fn test_disconnect_while_streaming() {
        let context = stereo("E2E-UNPLUG");
        let pipe = Pipeline::new(context.clone());
        pipe.start().unwrap();
        pipe.wait_for_frames(WAIT).unwrap();

        let device = context.device("E2E-UNPLUG").unwrap();
        device.disconnect();

        let err = loop {
            match pipe.wait_for_frames(WAIT) {
                Ok(_) => thread::yield_now(),
                Err(e) => break e,
            }
        };
        assert!(matches!(err, PipelineError::DeviceFault { .. }));
        pipe.stop().unwrap();

        // a disconnected device cannot be activated again
        assert!(pipe.start().is_err());
        assert_eq!(pipe.state(), PipelineState::Stopped);
    }
}
