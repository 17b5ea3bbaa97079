//! Sensor samples - Ingestion output
//!
//! The four streams consumed by the fusion core. Samples are immutable once
//! read; the core only moves them between buffers and the estimator.

use bytes::Bytes;
use nalgebra::{Isometry3, Translation3, UnitQuaternion};
use serde::{Deserialize, Serialize};
use std::ops::Deref;

use crate::{Pose, SampleStream, Vec3};

/// Anything carrying a reference-clock timestamp (seconds)
pub trait Timestamped {
    fn timestamp(&self) -> f64;
}

/// Raw inertial measurement (body frame)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InertialSample {
    /// Reference clock timestamp (seconds)
    pub timestamp: f64,

    /// Specific force (m/s²)
    pub linear_acceleration: Vec3,

    /// Angular rate (rad/s)
    pub angular_velocity: Vec3,
}

impl InertialSample {
    pub fn new(timestamp: f64, linear_acceleration: Vec3, angular_velocity: Vec3) -> Self {
        Self {
            timestamp,
            linear_acceleration,
            angular_velocity,
        }
    }

    /// Reading of a platform at rest and level: the accelerometer only senses gravity
    pub fn at_rest(timestamp: f64, gravity: f64) -> Self {
        Self::new(timestamp, Vec3::new(0.0, 0.0, gravity), Vec3::zeros())
    }
}

impl Timestamped for InertialSample {
    #[inline]
    fn timestamp(&self) -> f64 {
        self.timestamp
    }
}

/// Inertial measurement time-aligned to the lidar clock
///
/// Same content as [`InertialSample`]; a distinct type so the raw and the
/// synchronized inertial streams cannot be mixed up.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncedInertialSample(pub InertialSample);

impl SyncedInertialSample {
    #[inline]
    pub fn sample(&self) -> &InertialSample {
        &self.0
    }
}

impl Deref for SyncedInertialSample {
    type Target = InertialSample;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<InertialSample> for SyncedInertialSample {
    fn from(sample: InertialSample) -> Self {
        Self(sample)
    }
}

impl Timestamped for SyncedInertialSample {
    #[inline]
    fn timestamp(&self) -> f64 {
        self.0.timestamp
    }
}

/// Opaque point cloud payload
///
/// The fusion core never inspects the points, it only forwards them to the
/// current-scan publisher.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PointCloudData {
    /// Number of points
    pub num_points: u32,

    /// Bytes per point (usually 16: x, y, z, intensity)
    pub point_stride: u32,

    /// Raw point data (zero-copy)
    pub data: Bytes,
}

impl PointCloudData {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Lidar pose sample: the point-cloud-derived lidar pose in the map frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LidarPoseSample {
    /// Reference clock timestamp (seconds)
    pub timestamp: f64,

    /// Lidar pose in the map frame, registered upstream
    pub pose: Pose,

    /// Scan the pose was derived from
    #[serde(default)]
    pub cloud: PointCloudData,
}

impl LidarPoseSample {
    pub fn new(timestamp: f64, pose: Pose) -> Self {
        Self {
            timestamp,
            pose,
            cloud: PointCloudData::empty(),
        }
    }
}

impl Timestamped for LidarPoseSample {
    #[inline]
    fn timestamp(&self) -> f64 {
        self.timestamp
    }
}

/// Synchronized GNSS sample
///
/// Position and orientation describe the lidar frame in the map frame, the
/// velocity is expressed in the map (navigation) frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GnssSample {
    /// Reference clock timestamp (seconds)
    pub timestamp: f64,

    /// Position (m)
    pub position: Vec3,

    /// Velocity (m/s)
    pub velocity: Vec3,

    /// Absolute orientation, used by the fallback initializer
    pub orientation: UnitQuaternion<f64>,
}

impl GnssSample {
    pub fn new(timestamp: f64, pose: Pose, velocity: Vec3) -> Self {
        Self {
            timestamp,
            position: pose.translation.vector,
            velocity,
            orientation: pose.rotation,
        }
    }

    /// Absolute pose (rotation + translation)
    #[inline]
    pub fn pose(&self) -> Pose {
        Isometry3::from_parts(Translation3::from(self.position), self.orientation)
    }

    /// Whether every component is a finite number
    pub fn is_finite(&self) -> bool {
        self.timestamp.is_finite()
            && self.position.iter().all(|v| v.is_finite())
            && self.velocity.iter().all(|v| v.is_finite())
            && self.orientation.coords.iter().all(|v| v.is_finite())
    }
}

impl Timestamped for GnssSample {
    #[inline]
    fn timestamp(&self) -> f64 {
        self.timestamp
    }
}

/// One recorded sample of any stream (replay file line)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stream", rename_all = "snake_case")]
pub enum RecordedSample {
    ImuRaw(InertialSample),
    Lidar(LidarPoseSample),
    Gnss(GnssSample),
    ImuSynced(SyncedInertialSample),
}

impl RecordedSample {
    /// Stream this sample belongs to
    pub fn stream(&self) -> SampleStream {
        match self {
            RecordedSample::ImuRaw(_) => SampleStream::ImuRaw,
            RecordedSample::Lidar(_) => SampleStream::Lidar,
            RecordedSample::Gnss(_) => SampleStream::Gnss,
            RecordedSample::ImuSynced(_) => SampleStream::ImuSynced,
        }
    }
}

impl Timestamped for RecordedSample {
    fn timestamp(&self) -> f64 {
        match self {
            RecordedSample::ImuRaw(s) => s.timestamp,
            RecordedSample::Lidar(s) => s.timestamp,
            RecordedSample::Gnss(s) => s.timestamp,
            RecordedSample::ImuSynced(s) => s.timestamp(),
        }
    }
}

/// Check that a pose only contains finite numbers
pub fn pose_is_finite(pose: &Pose) -> bool {
    pose.translation.vector.iter().all(|v| v.is_finite())
        && pose.rotation.coords.iter().all(|v| v.is_finite())
}
