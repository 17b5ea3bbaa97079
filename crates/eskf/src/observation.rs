//! Absolute observations and their linearized measurement model.

use contracts::{error_index as idx, MeasurementNoise, ObservationModel, Pose, ERROR_STATE_DIM};
use nalgebra::{DMatrix, DVector, Vector3};

use crate::nominal::NominalState;
use crate::so3;

/// Body-frame pose and map-frame velocity observed at a correction instant
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    /// Body pose in the map frame
    pub pose: Pose,

    /// Velocity in the map frame
    pub velocity: Vector3<f64>,
}

impl Observation {
    pub fn new(pose: Pose, velocity: Vector3<f64>) -> Self {
        Self { pose, velocity }
    }
}

/// Residual `y`, Jacobian `H` and noise `R` of one observation
#[derive(Debug, Clone)]
pub struct Innovation {
    pub residual: DVector<f64>,
    pub jacobian: DMatrix<f64>,
    pub noise: DMatrix<f64>,
}

impl Innovation {
    /// Linearize `observation` around `state` for the given model
    ///
    /// Rows are stacked position, orientation, velocity (omitting the
    /// blocks the model does not use).
    pub fn build(
        model: ObservationModel,
        state: &NominalState,
        observation: &Observation,
        noise: &MeasurementNoise,
    ) -> Self {
        let dim = model.dim();
        let mut residual = DVector::zeros(dim);
        let mut jacobian = DMatrix::zeros(dim, ERROR_STATE_DIM);
        let mut variances = DVector::zeros(dim);

        let mut row = 0;
        let mut push_block = |r: Vector3<f64>, column: usize, variance: f64| {
            residual.fixed_rows_mut::<3>(row).copy_from(&r);
            jacobian
                .fixed_view_mut::<3, 3>(row, column)
                .fill_with_identity();
            variances.fixed_rows_mut::<3>(row).fill(variance);
            row += 3;
        };

        push_block(
            observation.pose.translation.vector - state.position,
            idx::POSITION,
            noise.position,
        );
        if model.uses_orientation() {
            let delta = state.orientation.inverse() * observation.pose.rotation;
            push_block(so3::log(&delta), idx::ORIENTATION, noise.orientation);
        }
        if model.uses_velocity() {
            push_block(
                observation.velocity - state.velocity,
                idx::VELOCITY,
                noise.velocity,
            );
        }

        Self {
            residual,
            jacobian,
            noise: DMatrix::from_diagonal(&variances),
        }
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.residual.len()
    }
}

/// χ² 99.9% quantiles for 1 to 9 degrees of freedom
const CHI2_999: [f64; 9] = [
    10.828, 13.816, 16.266, 18.467, 20.515, 22.458, 24.322, 26.124, 27.877,
];

/// χ² 99.9% quantile used as the default Mahalanobis gate
///
/// Tabulated up to 9 degrees of freedom, Wilson-Hilferty beyond.
pub fn chi2_gate(dof: usize) -> f64 {
    match dof {
        0 => 0.0,
        1..=9 => CHI2_999[dof - 1],
        _ => {
            let k = dof as f64;
            let z = 3.090_232;
            let h = 2.0 / (9.0 * k);
            k * (1.0 - h + z * h.sqrt()).powi(3)
        }
    }
}
