//! FusionController - sequences synchronization, prediction and correction

use contracts::{
    BufferStats, ExtrinsicCalibration, ExtrinsicSource, FilterPhase, FusionConfig, FusionError,
    FusionPublisher, FusionState, GnssSample, InertialSample, LidarPoseSample, MapSource, NoMaps,
    NoScanInitializer, RecordedSample, ScanInitializer, StaticExtrinsic, SyncedInertialSample,
    SyncedTriplet, TickReport, TickStatus,
};
use eskf::{Estimator, InitSeed, InitSource, Observation};
use sync_engine::Synchronizer;
use tracing::{debug, info, instrument, warn};

use crate::publisher::LogPublisher;

/// Drives the synchronizer and the estimator, one [`run`](Self::run) per tick
///
/// Single-threaded and non-blocking: ingestion and ticking happen on the same
/// owner, which hands samples over with the `push_*` methods.
pub struct FusionController {
    synchronizer: Synchronizer,
    estimator: Estimator,

    /// Cached once found, never looked up again
    calibration: Option<ExtrinsicCalibration>,

    extrinsic_source: Box<dyn ExtrinsicSource>,
    initializer: Box<dyn ScanInitializer>,
    publisher: Box<dyn FusionPublisher>,
    maps: Box<dyn MapSource>,

    init_source: Option<InitSource>,
    consecutive_rejections: u64,
}

impl FusionController {
    /// Controller with the configured static extrinsic, no scan initializer,
    /// no map service and a logging publisher
    pub fn new(config: &FusionConfig) -> Self {
        Self {
            synchronizer: Synchronizer::new(&config.sync),
            estimator: Estimator::new(config.filter.clone()),
            calibration: None,
            extrinsic_source: Box::new(StaticExtrinsic(config.calibration.to_extrinsic())),
            initializer: Box::new(NoScanInitializer),
            publisher: Box::new(LogPublisher::new("fusion")),
            maps: Box::new(NoMaps),
            init_source: None,
            consecutive_rejections: 0,
        }
    }

    pub fn with_extrinsic_source(mut self, source: impl ExtrinsicSource + 'static) -> Self {
        self.extrinsic_source = Box::new(source);
        self
    }

    pub fn with_initializer(mut self, initializer: impl ScanInitializer + 'static) -> Self {
        self.initializer = Box::new(initializer);
        self
    }

    pub fn with_publisher(mut self, publisher: impl FusionPublisher + 'static) -> Self {
        self.publisher = Box::new(publisher);
        self
    }

    pub fn with_map_source(mut self, maps: impl MapSource + 'static) -> Self {
        self.maps = Box::new(maps);
        self
    }

    // ===== Ingestion =====

    #[inline]
    pub fn push_raw_inertial(&mut self, sample: InertialSample) {
        self.synchronizer.push_raw_inertial(sample);
    }

    #[inline]
    pub fn push_lidar(&mut self, sample: LidarPoseSample) {
        self.synchronizer.push_lidar(sample);
    }

    #[inline]
    pub fn push_gnss(&mut self, sample: GnssSample) {
        self.synchronizer.push_gnss(sample);
    }

    #[inline]
    pub fn push_synced_inertial(&mut self, sample: SyncedInertialSample) {
        self.synchronizer.push_synced_inertial(sample);
    }

    /// Route a recorded sample to its buffer
    pub fn push_sample(&mut self, sample: RecordedSample) {
        match sample {
            RecordedSample::ImuRaw(s) => self.push_raw_inertial(s),
            RecordedSample::Lidar(s) => self.push_lidar(s),
            RecordedSample::Gnss(s) => self.push_gnss(s),
            RecordedSample::ImuSynced(s) => self.push_synced_inertial(s),
        }
    }

    // ===== Tick =====

    /// Process everything the buffers allow
    ///
    /// Recoverable conditions (missing calibration, outliers, misaligned or
    /// stale samples) are reported in the [`TickReport`]; only a failed
    /// initialization fallback or an estimator fault is an `Err`.
    #[instrument(name = "fusion_tick", level = "debug", skip(self), fields(phase = %self.estimator.phase()))]
    pub fn run(&mut self) -> Result<TickReport, FusionError> {
        let Some(calibration) = self.ensure_calibration() else {
            return Ok(TickReport::with_status(TickStatus::CalibrationPending));
        };

        let mut report = TickReport::with_status(self.status());
        let drops_before = self.synchronizer.sync_drop_count();

        self.forward_maps();

        while self.synchronizer.has_ready_data(self.estimator.phase()) {
            match self.estimator.phase() {
                FilterPhase::Uninitialized => {
                    if self.try_initialize(&calibration)? {
                        report.initialized = true;
                    }
                }
                FilterPhase::Initialized => self.fuse_step(&calibration, &mut report)?,
            }
        }

        report.status = self.status();
        report.sync_drops = self
            .synchronizer
            .sync_drop_count()
            .saturating_sub(drops_before);
        if self.estimator.is_initialized() {
            report.filter_time = Some(self.estimator.time());
            report.position_std = Some(self.estimator.standard_deviation().position.norm());
        }
        Ok(report)
    }

    fn ensure_calibration(&mut self) -> Option<ExtrinsicCalibration> {
        if self.calibration.is_none() {
            self.calibration = self.extrinsic_source.lookup_extrinsic();
            match &self.calibration {
                Some(calibration) => info!(
                    translation = ?calibration.imu_from_lidar.translation.vector,
                    "extrinsic calibration cached"
                ),
                None => debug!("extrinsic calibration unavailable"),
            }
        }
        self.calibration
    }

    fn forward_maps(&mut self) {
        if self.maps.has_new_global_map() {
            let map = self.maps.global_map();
            self.publisher.publish_global_map(&map);
        }
        if self.maps.has_new_local_map() {
            let map = self.maps.local_map();
            self.publisher.publish_local_map(&map);
        }
    }

    /// Seed the estimator from the next aligned triplet
    fn try_initialize(&mut self, calibration: &ExtrinsicCalibration) -> Result<bool, FusionError> {
        let Some(triplet) = self.synchronizer.validate_lidar_triplet() else {
            return Ok(false);
        };

        let scan_pose = self
            .initializer
            .try_init(&triplet.lidar, &triplet.inertial)
            .map(|pose| calibration.lidar_to_body(&pose));
        if scan_pose.is_none() {
            debug!(t = triplet.timestamp(), "scan initializer found no match");
        }

        let seed = InitSeed {
            scan_pose,
            gnss_pose: calibration.lidar_to_body(&triplet.gnss.pose()),
            velocity: triplet.gnss.velocity,
            inertial: triplet.inertial,
        };
        let source = self.estimator.init(&seed)?;
        self.init_source = Some(source);

        let discarded = self
            .synchronizer
            .discard_raw_inertial_before(seed.inertial.timestamp);
        info!(
            t = seed.inertial.timestamp,
            ?source,
            discarded,
            "estimator initialized"
        );
        Ok(true)
    }

    fn fuse_step(
        &mut self,
        calibration: &ExtrinsicCalibration,
        report: &mut TickReport,
    ) -> Result<(), FusionError> {
        if self.synchronizer.has_synchronized_triplet() {
            if let Some(triplet) = self.synchronizer.validate_lidar_triplet() {
                // the correction itself predicts to the synced inertial instant
                let boundary = triplet.timestamp().min(triplet.inertial.timestamp);
                while let Some(sample) = self.synchronizer.next_raw_inertial_before(boundary) {
                    self.predict(&sample, report)?;
                }
                self.correct(&triplet, calibration, report)?;
            }
        }

        if let Some(sample) = self.synchronizer.next_raw_inertial() {
            self.predict(&sample, report)?;
        }
        Ok(())
    }

    fn predict(&mut self, sample: &InertialSample, report: &mut TickReport) -> Result<(), FusionError> {
        let filter_time = self.estimator.time();
        if !sample.timestamp.is_finite() || sample.timestamp < filter_time {
            warn!(
                t = sample.timestamp,
                filter_time, "raw inertial sample older than filter time or not finite, dropped"
            );
            report.stale_inertial_drops += 1;
            return Ok(());
        }

        self.estimator.predict(sample)?;
        report.predictions += 1;
        self.publish_fused(sample.timestamp);
        Ok(())
    }

    fn correct(
        &mut self,
        triplet: &SyncedTriplet,
        calibration: &ExtrinsicCalibration,
        report: &mut TickReport,
    ) -> Result<(), FusionError> {
        let t = triplet.timestamp();
        let filter_time = self.estimator.time();
        if triplet.inertial.timestamp < filter_time {
            warn!(
                t,
                inertial_t = triplet.inertial.timestamp,
                filter_time,
                "triplet behind filter time, correction skipped"
            );
            report.stale_corrections += 1;
            return Ok(());
        }

        let observation = Observation::new(
            calibration.lidar_to_body(&triplet.lidar.pose),
            triplet.gnss.velocity,
        );
        let accepted = self.estimator.correct(&triplet.inertial, &observation)?;

        self.publisher.publish_lidar_pose(&triplet.lidar.pose, t);
        self.publisher.publish_current_scan(&triplet.lidar.cloud, t);

        let innovation = self.estimator.last_innovation();
        if let Some(innovation) = &innovation {
            report.mahalanobis_sq.push(innovation.mahalanobis_sq);
        }

        if accepted {
            report.corrections_accepted += 1;
            self.consecutive_rejections = 0;

            let filter_time = self.estimator.time();
            self.publish_fused(filter_time);
            self.publisher
                .publish_uncertainty(&self.estimator.standard_deviation(), filter_time);
        } else {
            report.corrections_rejected += 1;
            self.consecutive_rejections += 1;
            warn!(
                t,
                mahalanobis_sq = innovation.map(|i| i.mahalanobis_sq),
                threshold = innovation.and_then(|i| i.threshold),
                streak = self.consecutive_rejections,
                "observation rejected as outlier"
            );
        }
        Ok(())
    }

    fn publish_fused(&mut self, timestamp: f64) {
        let (pose, velocity) = self.estimator.odometry();
        self.publisher.publish_odometry(&pose, &velocity, timestamp);
        self.publisher.publish_transform(&pose, timestamp);
    }

    /// Flush the publisher
    pub fn flush(&mut self) -> Result<(), FusionError> {
        self.publisher.flush()
    }

    // ===== Reads =====

    pub fn status(&self) -> TickStatus {
        match (self.calibration, self.estimator.phase()) {
            (None, _) => TickStatus::CalibrationPending,
            (Some(_), FilterPhase::Uninitialized) => TickStatus::Uninitialized,
            (Some(_), FilterPhase::Initialized) => TickStatus::Tracking,
        }
    }

    #[inline]
    pub fn phase(&self) -> FilterPhase {
        self.estimator.phase()
    }

    #[inline]
    pub fn calibration(&self) -> Option<&ExtrinsicCalibration> {
        self.calibration.as_ref()
    }

    /// Strategy that seeded the estimator
    #[inline]
    pub fn init_source(&self) -> Option<InitSource> {
        self.init_source
    }

    /// Fused state, once initialized
    pub fn state(&self) -> Option<FusionState> {
        self.estimator
            .is_initialized()
            .then(|| self.estimator.state())
    }

    #[inline]
    pub fn estimator(&self) -> &Estimator {
        &self.estimator
    }

    #[inline]
    pub fn synchronizer(&self) -> &Synchronizer {
        &self.synchronizer
    }

    pub fn buffer_stats(&self) -> BufferStats {
        self.synchronizer.stats()
    }

    /// Rejections since the last accepted correction
    #[inline]
    pub fn consecutive_rejections(&self) -> u64 {
        self.consecutive_rejections
    }
}
