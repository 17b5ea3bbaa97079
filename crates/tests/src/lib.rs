//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置合约测试
//! - 回放 / 合成数据 e2e 测试
//! - 收敛性与离群值回归

#[cfg(test)]
mod contract_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::FusionConfig;

    #[test]
    fn test_default_config_survives_both_formats() {
        let config = FusionConfig::default();
        ConfigLoader::validate(&config).unwrap();

        let toml = ConfigLoader::to_toml(&config).unwrap();
        assert_eq!(
            ConfigLoader::load_from_str(&toml, ConfigFormat::Toml).unwrap(),
            config
        );
        let json = ConfigLoader::to_json(&config).unwrap();
        assert_eq!(
            ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap(),
            config
        );
    }

    #[test]
    fn test_demo_config_is_valid() {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos/fusion.toml");
        let config = ConfigLoader::load_from_path(&path).unwrap();
        assert_eq!(config.sync.tolerance_s, 0.05);
        assert_eq!(config.filter.observability.window, 20);
        assert!(config.runtime.output.is_some());
    }
}

#[cfg(test)]
mod e2e_tests {
    use contracts::{
        FusionConfig, GnssSample, InertialSample, LidarPoseSample, ObservationModel, Pose,
        PriorVariance, RecordedSample, TickReport, TickStatus, Vec3,
    };
    use eskf::InitSource;
    use ingestion::{
        write_samples, ReplayOptions, ReplaySource, SyntheticNoise, SyntheticSource,
        SyntheticTrajectory,
    };
    use localization::{FusionController, RecordingPublisher};
    use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};
    use observability::FusionMetricsAggregator;

    fn gravity() -> f64 {
        FusionConfig::default().filter.gravity
    }

    /// Filter tuned to the default synthetic noise
    fn tuned_config() -> FusionConfig {
        let mut config = FusionConfig::default();
        config.filter.prior = PriorVariance {
            position: 1.0e-3,
            velocity: 1.0e-3,
            orientation: 1.0e-3,
            ..Default::default()
        };
        config
    }

    fn mounted_trajectory(duration_s: f64) -> SyntheticTrajectory {
        SyntheticTrajectory {
            duration_s,
            extrinsic: contracts::CalibrationConfig {
                translation: [0.4, 0.0, 1.2],
                rotation_rpy: [0.0, 0.02, 0.1],
            }
            .to_extrinsic(),
            ..Default::default()
        }
    }

    /// Config whose calibration matches `mounted_trajectory`
    fn mounted_config() -> FusionConfig {
        let mut config = tuned_config();
        config.calibration.translation = [0.4, 0.0, 1.2];
        config.calibration.rotation_rpy = [0.0, 0.02, 0.1];
        config
    }

    /// Push samples in fixed-size chunks, running the controller after each
    fn drive(controller: &mut FusionController, samples: Vec<RecordedSample>) -> Vec<TickReport> {
        let mut reports = Vec::new();
        let mut samples = samples.into_iter().peekable();
        while samples.peek().is_some() {
            for sample in samples.by_ref().take(25) {
                controller.push_sample(sample);
            }
            reports.push(controller.run().unwrap());
        }
        reports.push(controller.run().unwrap());
        reports
    }

    fn total(reports: &[TickReport], field: impl Fn(&TickReport) -> u64) -> u64 {
        reports.iter().map(field).sum()
    }

    /// Position error (m) and attitude error (rad) against the ground truth
    fn tracking_error(controller: &FusionController, trajectory: &SyntheticTrajectory) -> (f64, f64) {
        let state = controller.state().unwrap();
        let (truth, _) = trajectory.ground_truth(state.timestamp);
        let position = (state.pose.translation.vector - truth.translation.vector).norm();
        let attitude = (state.pose.rotation.inverse() * truth.rotation).angle();
        (position, attitude)
    }

    fn rest(t: f64) -> InertialSample {
        InertialSample::at_rest(t, gravity())
    }

    fn triplet(t: f64) -> [RecordedSample; 3] {
        [
            RecordedSample::Lidar(LidarPoseSample::new(t, Pose::identity())),
            RecordedSample::Gnss(GnssSample::new(t, Pose::identity(), Vec3::zeros())),
            RecordedSample::ImuSynced(rest(t).into()),
        ]
    }

    /// Init at 5.0, then raw samples at 5.01, 5.02, 5.2 and a triplet at 5.2,
    /// replayed from a JSON-lines file
    #[tokio::test]
    async fn test_e2e_scenario_from_replay_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scenario.jsonl");

        let mut recorded: Vec<RecordedSample> = triplet(5.0).into();
        recorded.extend([5.01, 5.02, 5.2].map(|t| RecordedSample::ImuRaw(rest(t))));
        recorded.extend(triplet(5.2));
        assert_eq!(write_samples(&path, &recorded).unwrap(), 9);

        let (mut rx, handle) = ReplaySource::new(&path, ReplayOptions::default()).start(4);
        let mut replayed = Vec::new();
        while let Some(sample) = rx.recv().await {
            replayed.push(sample);
        }
        assert_eq!(handle.await.unwrap().unwrap(), 9);
        assert_eq!(replayed, recorded);

        let recorder = RecordingPublisher::new();
        let mut controller =
            FusionController::new(&FusionConfig::default()).with_publisher(recorder.clone());
        let mut replayed = replayed.into_iter();

        assert!(!controller.run().unwrap().initialized);
        for sample in replayed.by_ref().take(3) {
            controller.push_sample(sample);
        }
        let report = controller.run().unwrap();
        assert!(report.initialized);
        assert_eq!(report.filter_time, Some(5.0));
        assert_eq!(controller.init_source(), Some(InitSource::Gnss));
        recorder.clear();

        for sample in replayed {
            controller.push_sample(sample);
        }
        let report = controller.run().unwrap();
        assert_eq!(report.status, TickStatus::Tracking);
        assert_eq!(report.predictions, 3);
        assert_eq!(report.corrections_accepted, 1);
        assert_eq!(recorder.odometry_timestamps(), vec![5.01, 5.02, 5.2, 5.2]);
    }

    #[test]
    fn test_synthetic_circle_converges_with_extrinsic() {
        let trajectory = mounted_trajectory(10.0);
        let samples = trajectory.generate().unwrap();
        let lidar_count = samples
            .iter()
            .filter(|s| matches!(s, RecordedSample::Lidar(_)))
            .count() as u64;

        let mut controller = FusionController::new(&mounted_config());
        let reports = drive(&mut controller, samples);

        let accepted = total(&reports, |r| r.corrections_accepted);
        let rejected = total(&reports, |r| r.corrections_rejected);
        assert_eq!(accepted + rejected, lidar_count - 1);
        assert!(rejected <= 3, "rejected {rejected} of {lidar_count}");
        assert_eq!(total(&reports, |r| r.stale_inertial_drops), 0);
        assert_eq!(total(&reports, |r| r.sync_drops), 0);

        let (position, attitude) = tracking_error(&controller, &trajectory);
        assert!(position < 0.1, "position error {position}");
        assert!(attitude < 0.02, "attitude error {attitude}");

        let state = controller.state().unwrap();
        let (_, velocity) = trajectory.ground_truth(state.timestamp);
        assert!((state.velocity - velocity).norm() < 0.2);
    }

    #[test]
    fn test_injected_outlier_is_rejected() {
        let trajectory = mounted_trajectory(8.0);
        let mut samples = trajectory.generate().unwrap();

        let outlier_time = samples
            .iter_mut()
            .filter_map(|s| match s {
                RecordedSample::Lidar(lidar) if lidar.timestamp > 5.0 => Some(lidar),
                _ => None,
            })
            .map(|lidar| {
                lidar.pose.translation.vector += Vector3::new(5.0, -3.0, 0.0);
                lidar.timestamp
            })
            .next()
            .unwrap();

        let mut controller = FusionController::new(&mounted_config());
        let reports = drive(&mut controller, samples);

        let rejected = total(&reports, |r| r.corrections_rejected);
        assert!(rejected >= 1);
        assert!(reports
            .iter()
            .flat_map(|r| r.mahalanobis_sq.iter())
            .any(|d2| *d2 > 1000.0));
        assert_eq!(controller.consecutive_rejections(), 0);

        let (position, _) = tracking_error(&controller, &trajectory);
        assert!(position < 0.1, "position error {position} after outlier at {outlier_time}");
    }

    #[test]
    fn test_observability_report_over_circle() {
        let mut config = mounted_config();
        config.filter.observability.enabled = true;
        config.filter.observability.window = 10;

        let trajectory = mounted_trajectory(4.0);
        let mut controller = FusionController::new(&config);
        drive(&mut controller, trajectory.generate().unwrap());

        let report = controller.estimator().observability_report().unwrap();
        assert!(report.corrections > 0 && report.corrections <= 10);
        assert!(report.rank >= 9, "rank {}", report.rank);
        assert!(report
            .singular_values
            .windows(2)
            .all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_config_file_selects_observation_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fusion.toml");
        std::fs::write(
            &path,
            r#"
[filter]
observation_model = "position_velocity"

[filter.prior]
position = 1.0e-3
velocity = 1.0e-3
orientation = 1.0e-3

[filter.gate]
threshold = 40.0
"#,
        )
        .unwrap();

        let config = config_loader::ConfigLoader::load_from_path(&path).unwrap();
        assert_eq!(config.filter.observation_model, ObservationModel::PositionVelocity);

        let trajectory = SyntheticTrajectory {
            duration_s: 2.0,
            ..Default::default()
        };
        let mut controller = FusionController::new(&config);
        drive(&mut controller, trajectory.generate().unwrap());

        let innovation = controller.estimator().last_innovation().unwrap();
        assert_eq!(innovation.dim, 6);
        assert_eq!(innovation.threshold, Some(40.0));
    }

    #[test]
    fn test_scan_initializer_pose_is_used() {
        struct Offset(Pose);

        impl contracts::ScanInitializer for Offset {
            fn try_init(
                &mut self,
                lidar: &LidarPoseSample,
                _: &contracts::SyncedInertialSample,
            ) -> Option<Pose> {
                Some(self.0 * lidar.pose)
            }
        }

        let trajectory = SyntheticTrajectory {
            duration_s: 1.0,
            noise: SyntheticNoise::none(),
            ..Default::default()
        };
        let nudge = Isometry3::from_parts(
            Translation3::new(0.3, 0.0, 0.0),
            UnitQuaternion::identity(),
        );
        let mut controller =
            FusionController::new(&tuned_config()).with_initializer(Offset(nudge));

        for sample in trajectory.generate().unwrap().into_iter().take(3) {
            controller.push_sample(sample);
        }
        controller.run().unwrap();

        assert!(matches!(
            controller.init_source(),
            Some(InitSource::ScanContext { deviation }) if (deviation - 0.3).abs() < 1e-9
        ));
    }

    #[tokio::test]
    async fn test_synthetic_source_through_channel_with_metrics() {
        let trajectory = SyntheticTrajectory {
            duration_s: 3.0,
            noise: SyntheticNoise::none(),
            ..Default::default()
        };
        let source = SyntheticSource::new(trajectory);
        let (mut rx, handle) = source.start(32).unwrap();

        let mut controller = FusionController::new(&FusionConfig::default());
        let mut aggregator = FusionMetricsAggregator::new();
        let mut received = 0u64;

        while let Some(sample) = rx.recv().await {
            controller.push_sample(sample);
            received += 1;
            if received % 20 == 0 {
                aggregator.update(&controller.run().unwrap());
            }
        }
        aggregator.update(&controller.run().unwrap());
        assert_eq!(handle.await.unwrap().unwrap(), received);

        let summary = aggregator.summary();
        let lidar = source.metrics().snapshot().stream(contracts::SampleStream::Lidar);
        assert!(summary.initialized_at.is_some());
        assert_eq!(summary.corrections_accepted, lidar - 1);
        assert_eq!(summary.corrections_rejected, 0);
        assert_eq!(summary.acceptance_rate, 100.0);

        let last = controller.state().unwrap();
        let (truth, _) = source.trajectory().ground_truth(last.timestamp);
        assert!((last.pose.translation.vector - truth.translation.vector).norm() < 1e-3);
        assert!(last.timestamp > 3.9);
    }
}
