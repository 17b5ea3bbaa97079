//! Fusion state snapshot and derived uncertainty

use nalgebra::{SMatrix, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Pose, Vec3};

/// Error-state dimension
pub const ERROR_STATE_DIM: usize = 15;

/// Offsets of the error-state blocks
pub mod error_index {
    pub const POSITION: usize = 0;
    pub const VELOCITY: usize = 3;
    pub const ORIENTATION: usize = 6;
    pub const ACCEL_BIAS: usize = 9;
    pub const GYRO_BIAS: usize = 12;
}

/// Error-state covariance
pub type Covariance = SMatrix<f64, ERROR_STATE_DIM, ERROR_STATE_DIM>;

/// Estimator lifecycle
///
/// `Initialized` is terminal: the estimator never goes back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterPhase {
    #[default]
    Uninitialized,
    Initialized,
}

impl fmt::Display for FilterPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterPhase::Uninitialized => f.write_str("uninitialized"),
            FilterPhase::Initialized => f.write_str("initialized"),
        }
    }
}

/// Snapshot of the fused state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionState {
    /// Time of the last processed inertial reading (seconds)
    pub timestamp: f64,

    /// Body pose in the map frame
    pub pose: Pose,

    /// Velocity in the map frame (m/s)
    pub velocity: Vec3,

    pub accel_bias: Vec3,
    pub gyro_bias: Vec3,

    /// Error-state covariance, ordered δp δv δθ δb_a δb_g
    pub covariance: Covariance,
}

impl FusionState {
    /// Per-axis standard deviations taken from the covariance diagonal
    pub fn standard_deviation(&self) -> StateStdDev {
        StateStdDev::from_covariance(&self.covariance)
    }
}

/// Per-axis standard deviations of every error-state block
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StateStdDev {
    pub position: Vec3,
    pub velocity: Vec3,
    pub orientation: Vec3,
    pub accel_bias: Vec3,
    pub gyro_bias: Vec3,
}

impl StateStdDev {
    pub fn from_covariance(p: &Covariance) -> Self {
        let block = |offset: usize| {
            Vector3::new(
                p[(offset, offset)].max(0.0).sqrt(),
                p[(offset + 1, offset + 1)].max(0.0).sqrt(),
                p[(offset + 2, offset + 2)].max(0.0).sqrt(),
            )
        };
        Self {
            position: block(error_index::POSITION),
            velocity: block(error_index::VELOCITY),
            orientation: block(error_index::ORIENTATION),
            accel_bias: block(error_index::ACCEL_BIAS),
            gyro_bias: block(error_index::GYRO_BIAS),
        }
    }
}
