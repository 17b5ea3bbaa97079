//! Lidar-referenced synchronizer.

use std::collections::HashMap;

use contracts::{
    BufferStats, FilterPhase, GnssSample, InertialSample, LidarPoseSample, SampleStream,
    SyncConfig, SyncedInertialSample, SyncedTriplet,
};
use tracing::instrument;

use crate::buffer::SampleBuffers;

/// Outcome of inspecting the front of the synchronized buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TripletCheck {
    /// At least one synchronized buffer is empty
    Incomplete,
    /// Lidar sample is older than a peer beyond tolerance, or not finite
    StaleLidar,
    /// GNSS sample is older than the lidar beyond tolerance, or not finite
    StaleGnss,
    /// Synced inertial sample is older than the lidar beyond tolerance, or not finite
    StaleInertial,
    /// All offsets within tolerance
    Aligned,
}

impl TripletCheck {
    /// Stream whose front sample gets discarded, if any
    pub fn discarded_stream(&self) -> Option<SampleStream> {
        match self {
            TripletCheck::StaleLidar => Some(SampleStream::Lidar),
            TripletCheck::StaleGnss => Some(SampleStream::Gnss),
            TripletCheck::StaleInertial => Some(SampleStream::ImuSynced),
            TripletCheck::Incomplete | TripletCheck::Aligned => None,
        }
    }
}

/// Classify the lidar / GNSS / inertial front timestamps
///
/// `T` bounds are inclusive: an offset of exactly `tolerance` is aligned.
/// The older side of a mismatch is the one discarded, so a lagging peer
/// catches up instead of starving the lidar. A non-finite timestamp always
/// discards its own sample.
#[inline]
pub fn classify_triplet(t_lidar: f64, t_gnss: f64, t_inertial: f64, tolerance: f64) -> TripletCheck {
    if !t_lidar.is_finite() {
        return TripletCheck::StaleLidar;
    }
    if !t_gnss.is_finite() {
        return TripletCheck::StaleGnss;
    }
    if !t_inertial.is_finite() {
        return TripletCheck::StaleInertial;
    }

    let d_gnss = t_lidar - t_gnss;
    let d_inertial = t_lidar - t_inertial;

    if d_gnss < -tolerance || d_inertial < -tolerance {
        TripletCheck::StaleLidar
    } else if d_gnss > tolerance {
        TripletCheck::StaleGnss
    } else if d_inertial > tolerance {
        TripletCheck::StaleInertial
    } else {
        TripletCheck::Aligned
    }
}

/// Buffers plus the alignment policy used by the controller
#[derive(Debug)]
pub struct Synchronizer {
    buffers: SampleBuffers,
    tolerance_s: f64,
    sync_dropped: HashMap<SampleStream, u64>,
}

impl Synchronizer {
    pub fn new(config: &SyncConfig) -> Self {
        Self::with_tolerance(config.tolerance_s, config.buffer_capacity)
    }

    pub fn with_tolerance(tolerance_s: f64, buffer_capacity: usize) -> Self {
        Self {
            buffers: SampleBuffers::new(buffer_capacity),
            tolerance_s,
            sync_dropped: HashMap::new(),
        }
    }

    #[inline]
    pub fn tolerance(&self) -> f64 {
        self.tolerance_s
    }

    #[inline]
    pub fn buffers(&self) -> &SampleBuffers {
        &self.buffers
    }

    // ===== Ingestion =====

    #[inline]
    pub fn push_raw_inertial(&mut self, sample: InertialSample) {
        self.buffers.push_raw_inertial(sample);
    }

    #[inline]
    pub fn push_lidar(&mut self, sample: LidarPoseSample) {
        self.buffers.push_lidar(sample);
    }

    #[inline]
    pub fn push_gnss(&mut self, sample: GnssSample) {
        self.buffers.push_gnss(sample);
    }

    #[inline]
    pub fn push_synced_inertial(&mut self, sample: SyncedInertialSample) {
        self.buffers.push_synced_inertial(sample);
    }

    // ===== Sequencing =====

    /// Whether the controller has work to do in the given phase
    pub fn has_ready_data(&self, phase: FilterPhase) -> bool {
        match phase {
            FilterPhase::Uninitialized => self.buffers.has_synchronized_triplet(),
            FilterPhase::Initialized => {
                !self.buffers.raw_inertial.is_empty() || self.buffers.has_synchronized_triplet()
            }
        }
    }

    /// Whether all three synchronized buffers hold a sample
    #[inline]
    pub fn has_synchronized_triplet(&self) -> bool {
        self.buffers.has_synchronized_triplet()
    }

    /// Inspect the buffer fronts without consuming anything
    pub fn check_triplet(&self) -> TripletCheck {
        let (Some(t_lidar), Some(t_gnss), Some(t_inertial)) = (
            self.buffers.lidar.front_timestamp(),
            self.buffers.gnss.front_timestamp(),
            self.buffers.synced_inertial.front_timestamp(),
        ) else {
            return TripletCheck::Incomplete;
        };
        classify_triplet(t_lidar, t_gnss, t_inertial, self.tolerance_s)
    }

    /// Align the synchronized buffers on the front lidar sample
    ///
    /// Discards exactly one stale sample and returns `None` when the fronts
    /// are not aligned; pops and returns all three when they are.
    #[instrument(name = "synchronizer_validate_triplet", level = "trace", skip(self))]
    pub fn validate_lidar_triplet(&mut self) -> Option<SyncedTriplet> {
        let check = self.check_triplet();
        if let Some(stream) = check.discarded_stream() {
            let dropped = self.buffers.pop_front(stream);
            self.record_drop(stream, dropped);
            return None;
        }
        if check != TripletCheck::Aligned {
            return None;
        }

        let lidar = self.buffers.lidar.pop()?;
        let gnss = self.buffers.gnss.pop()?;
        let inertial = self.buffers.synced_inertial.pop()?;
        Some(SyncedTriplet {
            lidar,
            gnss,
            inertial,
        })
    }

    /// Pop the oldest raw inertial sample
    #[inline]
    pub fn next_raw_inertial(&mut self) -> Option<InertialSample> {
        self.buffers.raw_inertial.pop()
    }

    /// Pop the oldest raw inertial sample only if it is strictly before `t`
    #[inline]
    pub fn next_raw_inertial_before(&mut self, t: f64) -> Option<InertialSample> {
        self.buffers.raw_inertial.pop_if(|s| s.timestamp < t)
    }

    /// Drop raw inertial samples strictly earlier than `t`
    pub fn discard_raw_inertial_before(&mut self, t: f64) -> usize {
        let discarded = self.buffers.raw_inertial.discard_before(t);
        if discarded > 0 {
            tracing::debug!(discarded, before = t, "raw inertial history discarded");
        }
        discarded
    }

    // ===== Diagnostics =====

    /// Samples discarded by the alignment policy, all streams
    pub fn sync_drop_count(&self) -> u64 {
        self.sync_dropped.values().sum()
    }

    /// Samples discarded by the alignment policy for one stream
    pub fn sync_drops(&self, stream: SampleStream) -> u64 {
        self.sync_dropped.get(&stream).copied().unwrap_or(0)
    }

    /// Buffer depths, evictions and synchronizer drops
    pub fn stats(&self) -> BufferStats {
        let mut stats = self.buffers.stats();
        for (stream, entry) in stats.streams.iter_mut() {
            entry.sync_dropped = self.sync_drops(*stream);
        }
        stats
    }

    fn record_drop(&mut self, stream: SampleStream, timestamp: Option<f64>) {
        *self.sync_dropped.entry(stream).or_insert(0) += 1;
        tracing::debug!(
            stream = %stream,
            timestamp = timestamp.unwrap_or(f64::NAN),
            tolerance = self.tolerance_s,
            "synchronization mismatch, sample discarded"
        );
        metrics::counter!("fusion_sync_dropped_total", "stream" => stream.as_str()).increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::Pose;
    use nalgebra::Vector3;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    const T: f64 = 0.05;

    fn sync() -> Synchronizer {
        Synchronizer::with_tolerance(T, 1000)
    }

    fn push_triplet(sync: &mut Synchronizer, t_lidar: f64, t_gnss: f64, t_imu: f64) {
        sync.push_lidar(LidarPoseSample::new(t_lidar, Pose::identity()));
        sync.push_gnss(GnssSample::new(t_gnss, Pose::identity(), Vector3::zeros()));
        sync.push_synced_inertial(InertialSample::at_rest(t_imu, 9.80943).into());
    }

    fn depths(sync: &Synchronizer) -> (usize, usize, usize) {
        let b = sync.buffers();
        (b.lidar.len(), b.gnss.len(), b.synced_inertial.len())
    }

    #[test]
    fn test_aligned_triplet_is_consumed() {
        let mut sync = sync();
        push_triplet(&mut sync, 10.00, 10.02, 9.97);

        let triplet = sync.validate_lidar_triplet().unwrap();
        assert_eq!(triplet.lidar.timestamp, 10.00);
        assert_eq!(triplet.gnss.timestamp, 10.02);
        assert_eq!(triplet.inertial.timestamp, 9.97);
        assert_eq!(depths(&sync), (0, 0, 0));
        assert_eq!(sync.sync_drop_count(), 0);
    }

    #[test]
    fn test_stale_lidar_is_discarded() {
        let mut sync = sync();
        push_triplet(&mut sync, 10.00, 10.10, 10.00);

        assert!(sync.validate_lidar_triplet().is_none());
        assert_eq!(depths(&sync), (0, 1, 1));
        assert_eq!(sync.sync_drops(SampleStream::Lidar), 1);
    }

    #[test]
    fn test_gnss_ahead_of_lidar_drops_lidar() {
        // lidar 10.00 / gnss 10.07 / inertial 9.98: the older lidar goes and
        // the gnss sample waits for the next sweep
        let mut sync = sync();
        push_triplet(&mut sync, 10.00, 10.07, 9.98);

        assert!(sync.validate_lidar_triplet().is_none());
        assert_eq!(depths(&sync), (0, 1, 1));
        assert_eq!(sync.sync_drops(SampleStream::Lidar), 1);
        assert_eq!(sync.sync_drops(SampleStream::Gnss), 0);

        push_triplet(&mut sync, 10.10, 10.17, 10.08);
        // inertial 9.98 is now behind the lidar beyond tolerance
        assert!(sync.validate_lidar_triplet().is_none());
        let triplet = sync.validate_lidar_triplet().unwrap();
        assert_eq!(triplet.lidar.timestamp, 10.10);
        assert_eq!(triplet.gnss.timestamp, 10.07);
        assert_eq!(triplet.inertial.timestamp, 10.08);
    }

    #[test]
    fn test_lagging_peer_does_not_starve_lidar() {
        let mut sync = sync();
        for i in 0..5 {
            let t = 1.0 + i as f64 * 0.1;
            push_triplet(&mut sync, t, t - 0.3, t);
        }

        let mut accepted = 0;
        while sync.has_synchronized_triplet() {
            if sync.validate_lidar_triplet().is_some() {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 2);
        assert_eq!(sync.sync_drops(SampleStream::Lidar), 0);
    }

    #[test]
    fn test_non_finite_timestamp_is_discarded() {
        let mut sync = sync();
        push_triplet(&mut sync, 1.0, 1.0, f64::NAN);

        assert_eq!(sync.check_triplet(), TripletCheck::StaleInertial);
        assert!(sync.validate_lidar_triplet().is_none());
        assert_eq!(depths(&sync), (1, 1, 0));
        assert_eq!(sync.sync_drops(SampleStream::ImuSynced), 1);

        assert_eq!(classify_triplet(f64::NAN, 1.0, 1.0, T), TripletCheck::StaleLidar);
        assert_eq!(
            classify_triplet(1.0, f64::INFINITY, 1.0, T),
            TripletCheck::StaleGnss
        );
    }

    #[test]
    fn test_stale_gnss_is_discarded() {
        let mut sync = sync();
        push_triplet(&mut sync, 10.00, 9.90, 10.00);

        assert!(sync.validate_lidar_triplet().is_none());
        assert_eq!(depths(&sync), (1, 0, 1));
        assert_eq!(sync.sync_drops(SampleStream::Gnss), 1);
    }

    #[test]
    fn test_stale_inertial_is_discarded() {
        let mut sync = sync();
        push_triplet(&mut sync, 10.00, 10.00, 9.90);

        assert!(sync.validate_lidar_triplet().is_none());
        assert_eq!(depths(&sync), (1, 1, 0));
        assert_eq!(sync.sync_drops(SampleStream::ImuSynced), 1);
    }

    #[test]
    fn test_tolerance_bound_is_inclusive() {
        // binary-exact offsets so the comparison hits the bound exactly
        let t = 0.0625;
        assert_eq!(classify_triplet(1.0, 1.0 - t, 1.0 + t, t), TripletCheck::Aligned);
        assert_eq!(classify_triplet(1.0, 1.0 + t, 1.0 - t, t), TripletCheck::Aligned);
        assert_eq!(
            classify_triplet(1.0, 1.0 - 2.0 * t, 1.0, t),
            TripletCheck::StaleGnss
        );
    }

    #[test]
    fn test_stale_lidar_takes_precedence() {
        // gnss behind and inertial ahead: the lidar goes first
        assert_eq!(
            classify_triplet(10.0, 9.8, 10.2, T),
            TripletCheck::StaleLidar
        );
    }

    #[test]
    fn test_empty_buffer_consumes_nothing() {
        let mut sync = sync();
        sync.push_lidar(LidarPoseSample::new(1.0, Pose::identity()));
        sync.push_gnss(GnssSample::new(1.0, Pose::identity(), Vector3::zeros()));

        assert_eq!(sync.check_triplet(), TripletCheck::Incomplete);
        assert!(sync.validate_lidar_triplet().is_none());
        assert_eq!(depths(&sync), (1, 1, 0));
    }

    #[test]
    fn test_catch_up_after_lag() {
        let mut sync = sync();
        // gnss lags by two samples
        sync.push_gnss(GnssSample::new(0.8, Pose::identity(), Vector3::zeros()));
        sync.push_gnss(GnssSample::new(0.9, Pose::identity(), Vector3::zeros()));
        push_triplet(&mut sync, 1.0, 1.0, 1.0);

        assert!(sync.validate_lidar_triplet().is_none());
        assert!(sync.validate_lidar_triplet().is_none());
        let triplet = sync.validate_lidar_triplet().unwrap();
        assert_eq!(triplet.gnss.timestamp, 1.0);
        assert_eq!(sync.stats().stream(SampleStream::Gnss).sync_dropped, 2);
    }

    #[test]
    fn test_has_ready_data_by_phase() {
        let mut sync = sync();
        sync.push_raw_inertial(InertialSample::at_rest(1.0, 9.8));
        assert!(!sync.has_ready_data(FilterPhase::Uninitialized));
        assert!(sync.has_ready_data(FilterPhase::Initialized));

        push_triplet(&mut sync, 1.0, 1.0, 1.0);
        assert!(sync.has_ready_data(FilterPhase::Uninitialized));
    }

    #[test]
    fn test_raw_inertial_before_keeps_boundary() {
        let mut sync = sync();
        for t in [4.9, 5.0, 5.1] {
            sync.push_raw_inertial(InertialSample::at_rest(t, 9.8));
        }

        assert_eq!(sync.next_raw_inertial_before(5.0).unwrap().timestamp, 4.9);
        assert!(sync.next_raw_inertial_before(5.0).is_none());
        assert_eq!(sync.next_raw_inertial().unwrap().timestamp, 5.0);
    }

    #[test]
    fn test_discard_raw_inertial_before() {
        let mut sync = sync();
        for t in [4.8, 4.9, 5.0, 5.01] {
            sync.push_raw_inertial(InertialSample::at_rest(t, 9.8));
        }

        assert_eq!(sync.discard_raw_inertial_before(5.0), 2);
        assert_eq!(sync.buffers().raw_inertial.front_timestamp(), Some(5.0));
    }

    #[test]
    fn test_random_jitter_every_sample_removed_once() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut sync = sync();
        let count = 500;

        for i in 0..count {
            let t = i as f64 * 0.1;
            let jitter = |rng: &mut StdRng| rng.random_range(-0.08..0.08);
            let (tg, ti) = (t + jitter(&mut rng), t + jitter(&mut rng));
            push_triplet(&mut sync, t, tg, ti);
        }

        let mut accepted = 0u64;
        while sync.has_synchronized_triplet() {
            if let Some(triplet) = sync.validate_lidar_triplet() {
                assert!(triplet.max_offset() <= T, "offset {}", triplet.max_offset());
                accepted += 1;
            }
        }

        let (l, g, i) = depths(&sync);
        let remaining = (l + g + i) as u64;
        assert_eq!(3 * accepted + sync.sync_drop_count() + remaining, 3 * count as u64);
        assert!(accepted > 0);
    }
}
