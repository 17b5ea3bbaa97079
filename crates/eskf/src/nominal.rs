//! Nominal (large-signal) state of the filter.

use contracts::{error_index, Pose, ERROR_STATE_DIM};
use nalgebra::{Isometry3, SVector, Translation3, UnitQuaternion, Vector3};

use crate::so3;

/// Error-state vector δp δv δθ δb_a δb_g
pub type ErrorState = SVector<f64, ERROR_STATE_DIM>;

/// Position, velocity, attitude (body → map) and sensor biases
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NominalState {
    pub position: Vector3<f64>,
    pub velocity: Vector3<f64>,
    pub orientation: UnitQuaternion<f64>,
    pub accel_bias: Vector3<f64>,
    pub gyro_bias: Vector3<f64>,
}

impl Default for NominalState {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            velocity: Vector3::zeros(),
            orientation: UnitQuaternion::identity(),
            accel_bias: Vector3::zeros(),
            gyro_bias: Vector3::zeros(),
        }
    }
}

impl NominalState {
    /// State at rest-biases with the given pose and velocity
    pub fn from_pose(pose: &Pose, velocity: Vector3<f64>) -> Self {
        Self {
            position: pose.translation.vector,
            velocity,
            orientation: pose.rotation,
            ..Default::default()
        }
    }

    #[inline]
    pub fn pose(&self) -> Pose {
        Isometry3::from_parts(Translation3::from(self.position), self.orientation)
    }

    /// Fold an estimated error into the nominal state
    ///
    /// Orientation errors are right-multiplied (body-frame perturbation).
    pub fn inject(&mut self, dx: &ErrorState) {
        self.position += dx.fixed_rows::<3>(error_index::POSITION);
        self.velocity += dx.fixed_rows::<3>(error_index::VELOCITY);
        let dtheta: Vector3<f64> = dx.fixed_rows::<3>(error_index::ORIENTATION).into_owned();
        self.orientation *= so3::exp(&dtheta);
        self.orientation.renormalize();
        self.accel_bias += dx.fixed_rows::<3>(error_index::ACCEL_BIAS);
        self.gyro_bias += dx.fixed_rows::<3>(error_index::GYRO_BIAS);
    }
}
