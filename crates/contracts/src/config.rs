//! Fusion configuration contracts that can be shared across crates.
//!
//! Every section has defaults, so an empty file is a valid configuration.

use nalgebra::{Isometry3, Translation3, UnitQuaternion};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::ExtrinsicCalibration;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FusionConfig {
    /// Synchronizer and buffers
    #[serde(default)]
    pub sync: SyncConfig,

    /// Error-state filter
    #[serde(default)]
    pub filter: FilterConfig,

    /// Static lidar → body extrinsic
    #[serde(default)]
    pub calibration: CalibrationConfig,

    /// Driver loop
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

/// Synchronizer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Maximum accepted offset between lidar and its peers (seconds, inclusive)
    pub tolerance_s: f64,

    /// Maximum samples kept per stream; the oldest sample is evicted when full
    pub buffer_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            tolerance_s: 0.05,
            buffer_capacity: 100_000,
        }
    }
}

/// Which absolute observations the correction step uses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationModel {
    /// Lidar position + orientation
    Pose,
    /// Lidar position + orientation, GNSS velocity
    #[default]
    PoseVelocity,
    /// Lidar position, GNSS velocity
    PositionVelocity,
}

impl ObservationModel {
    /// Number of measurement rows
    pub fn dim(&self) -> usize {
        match self {
            ObservationModel::Pose => 6,
            ObservationModel::PoseVelocity => 9,
            ObservationModel::PositionVelocity => 6,
        }
    }

    pub fn uses_orientation(&self) -> bool {
        !matches!(self, ObservationModel::PositionVelocity)
    }

    pub fn uses_velocity(&self) -> bool {
        !matches!(self, ObservationModel::Pose)
    }
}

/// Continuous-time process noise variances
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessNoise {
    pub accel: f64,
    pub gyro: f64,
    pub accel_bias: f64,
    pub gyro_bias: f64,
}

impl Default for ProcessNoise {
    fn default() -> Self {
        Self {
            accel: 2.5e-3,
            gyro: 1.0e-4,
            accel_bias: 2.5e-3,
            gyro_bias: 1.0e-4,
        }
    }
}

/// Initial covariance (diagonal variances per error-state block)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorVariance {
    pub position: f64,
    pub velocity: f64,
    pub orientation: f64,
    pub accel_bias: f64,
    pub gyro_bias: f64,
}

impl Default for PriorVariance {
    fn default() -> Self {
        Self {
            position: 1.0e-6,
            velocity: 1.0e-6,
            orientation: 1.0e-6,
            accel_bias: 1.0e-6,
            gyro_bias: 1.0e-6,
        }
    }
}

/// Measurement noise variances
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasurementNoise {
    pub position: f64,
    pub orientation: f64,
    pub velocity: f64,
}

impl Default for MeasurementNoise {
    fn default() -> Self {
        Self {
            position: 1.0e-4,
            orientation: 1.0e-4,
            velocity: 2.5e-3,
        }
    }
}

/// Mahalanobis consistency gate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub enabled: bool,

    /// Squared-distance threshold; the χ² 99.9% quantile of the
    /// observation dimension when unset
    #[serde(default)]
    pub threshold: Option<f64>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: None,
        }
    }
}

/// Observability analysis over the most recent corrections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub enabled: bool,

    /// Number of corrections stacked into the observability matrix
    pub window: usize,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            window: 4,
        }
    }
}

/// Error-state filter configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Gravity magnitude (m/s²), gravity points along -z of the map frame
    pub gravity: f64,

    #[serde(default)]
    pub process_noise: ProcessNoise,

    #[serde(default)]
    pub prior: PriorVariance,

    #[serde(default)]
    pub measurement_noise: MeasurementNoise,

    #[serde(default)]
    pub observation_model: ObservationModel,

    #[serde(default)]
    pub gate: GateConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            gravity: 9.80943,
            process_noise: ProcessNoise::default(),
            prior: PriorVariance::default(),
            measurement_noise: MeasurementNoise::default(),
            observation_model: ObservationModel::default(),
            gate: GateConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Static extrinsic calibration (lidar frame expressed in the body frame)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Lidar origin in the body frame (m)
    #[serde(default)]
    pub translation: [f64; 3],

    /// Roll, pitch, yaw of the lidar in the body frame (rad)
    #[serde(default)]
    pub rotation_rpy: [f64; 3],
}

impl CalibrationConfig {
    pub fn to_extrinsic(&self) -> ExtrinsicCalibration {
        let [x, y, z] = self.translation;
        let [roll, pitch, yaw] = self.rotation_rpy;
        ExtrinsicCalibration::new(Isometry3::from_parts(
            Translation3::new(x, y, z),
            UnitQuaternion::from_euler_angles(roll, pitch, yaw),
        ))
    }
}

/// Driver loop configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Controller tick rate (Hz)
    pub tick_hz: f64,

    /// Capacity of the ingestion → controller channel
    pub channel_capacity: usize,

    /// Odometry output file (JSON lines)
    #[serde(default)]
    pub output: Option<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tick_hz: 100.0,
            channel_capacity: 4096,
            output: None,
        }
    }
}
