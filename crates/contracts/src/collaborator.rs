//! Collaborator traits - everything the fusion core talks to but does not own
//!
//! Calibration lookup, place-recognition initialization, map maintenance and
//! result publication are external services; the core only sees these traits.

use crate::{
    ExtrinsicCalibration, FusionError, LidarPoseSample, PointCloudData, Pose,
    StateStdDev, SyncedInertialSample, Vec3,
};

/// Source of the lidar → body extrinsic
///
/// Polled until it yields a calibration; the caller caches the first result.
pub trait ExtrinsicSource: Send {
    fn lookup_extrinsic(&mut self) -> Option<ExtrinsicCalibration>;
}

/// Extrinsic known up front (configuration file)
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticExtrinsic(pub ExtrinsicCalibration);

impl ExtrinsicSource for StaticExtrinsic {
    fn lookup_extrinsic(&mut self) -> Option<ExtrinsicCalibration> {
        Some(self.0)
    }
}

/// Place-recognition initializer (scan context)
///
/// Returns the lidar pose in the map frame, or `None` when the scan cannot be
/// matched against the map.
pub trait ScanInitializer: Send {
    fn try_init(
        &mut self,
        lidar: &LidarPoseSample,
        inertial: &SyncedInertialSample,
    ) -> Option<Pose>;
}

/// Initializer that never matches, forcing the GNSS fallback
#[derive(Debug, Clone, Copy, Default)]
pub struct NoScanInitializer;

impl ScanInitializer for NoScanInitializer {
    fn try_init(&mut self, _: &LidarPoseSample, _: &SyncedInertialSample) -> Option<Pose> {
        None
    }
}

/// Output of the fusion core
///
/// Poses are map-frame poses; `timestamp` is the reference-clock time the
/// value refers to.
pub trait FusionPublisher: Send {
    /// Fused body pose and map-frame velocity
    fn publish_odometry(&mut self, pose: &Pose, velocity: &Vec3, timestamp: f64);

    /// Map → body transform
    fn publish_transform(&mut self, pose: &Pose, timestamp: f64);

    /// Observed lidar pose used by a correction
    fn publish_lidar_pose(&mut self, pose: &Pose, timestamp: f64);

    /// Scan that produced the lidar pose
    fn publish_current_scan(&mut self, cloud: &PointCloudData, timestamp: f64);

    fn publish_global_map(&mut self, map: &PointCloudData);

    fn publish_local_map(&mut self, map: &PointCloudData);

    /// Per-axis standard deviations after an accepted correction
    fn publish_uncertainty(&mut self, _std_dev: &StateStdDev, _timestamp: f64) {}

    /// Flush buffered output, surfacing deferred write errors
    fn flush(&mut self) -> Result<(), FusionError> {
        Ok(())
    }
}

/// Map maintenance service
pub trait MapSource: Send {
    fn has_new_global_map(&self) -> bool;

    /// Takes the latest global map, clearing the "new" flag
    fn global_map(&mut self) -> PointCloudData;

    fn has_new_local_map(&self) -> bool;

    /// Takes the latest local map, clearing the "new" flag
    fn local_map(&mut self) -> PointCloudData;
}

/// No map service attached
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMaps;

impl MapSource for NoMaps {
    fn has_new_global_map(&self) -> bool {
        false
    }

    fn global_map(&mut self) -> PointCloudData {
        PointCloudData::empty()
    }

    fn has_new_local_map(&self) -> bool {
        false
    }

    fn local_map(&mut self) -> PointCloudData {
        PointCloudData::empty()
    }
}
