//! Strap-down mechanization and error-state transition.
//!
//! Mid-point integration between two inertial readings:
//!
//! ```text
//! ω = ½(ω₀ + ω₁) − b_g            q₁ = q₀ ⊗ Exp(ω·dt)
//! a = ½(R₀(f₀ − b_a) + R₁(f₁ − b_a)) + g
//! p₁ = p₀ + v₀·dt + ½a·dt²        v₁ = v₀ + a·dt
//! ```

use contracts::{error_index as idx, Covariance, InertialSample, ProcessNoise};
use nalgebra::{Matrix3, Vector3};

use crate::nominal::NominalState;
use crate::so3;

/// Result of one propagation step
#[derive(Debug, Clone, Copy)]
pub struct Propagation {
    /// Nominal state at the end of the interval
    pub state: NominalState,

    /// Error-state transition matrix `F`
    pub transition: Covariance,
}

/// Integrate the nominal state over `dt` and build the error-state transition
pub fn propagate(
    state: &NominalState,
    previous: &InertialSample,
    current: &InertialSample,
    dt: f64,
    gravity: &Vector3<f64>,
) -> Propagation {
    let omega = 0.5 * (previous.angular_velocity + current.angular_velocity) - state.gyro_bias;
    let delta_q = so3::exp(&(omega * dt));

    let r_prev = state.orientation;
    let mut orientation = r_prev * delta_q;
    orientation.renormalize();

    let f_prev = previous.linear_acceleration - state.accel_bias;
    let f_cur = current.linear_acceleration - state.accel_bias;
    let accel = 0.5 * (r_prev * f_prev + orientation * f_cur) + gravity;

    let next = NominalState {
        position: state.position + state.velocity * dt + 0.5 * accel * dt * dt,
        velocity: state.velocity + accel * dt,
        orientation,
        accel_bias: state.accel_bias,
        gyro_bias: state.gyro_bias,
    };

    let rotation = orientation.to_rotation_matrix().into_inner();
    let f_mid = 0.5 * (f_prev + f_cur);
    let ident_dt = Matrix3::identity() * dt;

    let mut transition = Covariance::identity();
    transition
        .fixed_view_mut::<3, 3>(idx::POSITION, idx::VELOCITY)
        .copy_from(&ident_dt);
    transition
        .fixed_view_mut::<3, 3>(idx::VELOCITY, idx::ORIENTATION)
        .copy_from(&(-rotation * so3::skew(&f_mid) * dt));
    transition
        .fixed_view_mut::<3, 3>(idx::VELOCITY, idx::ACCEL_BIAS)
        .copy_from(&(-rotation * dt));
    transition
        .fixed_view_mut::<3, 3>(idx::ORIENTATION, idx::ORIENTATION)
        .copy_from(&delta_q.inverse().to_rotation_matrix().into_inner());
    transition
        .fixed_view_mut::<3, 3>(idx::ORIENTATION, idx::GYRO_BIAS)
        .copy_from(&-ident_dt);

    Propagation {
        state: next,
        transition,
    }
}

/// Discrete process noise `Q_d` for an interval of `dt`
///
/// Velocity and attitude noise scale with `dt²` (white noise on the
/// integrated inputs), bias random walks with `dt`.
pub fn discrete_process_noise(noise: &ProcessNoise, dt: f64) -> Covariance {
    let mut q = Covariance::zeros();
    let dt2 = dt * dt;
    for i in 0..3 {
        q[(idx::VELOCITY + i, idx::VELOCITY + i)] = noise.accel * dt2;
        q[(idx::ORIENTATION + i, idx::ORIENTATION + i)] = noise.gyro * dt2;
        q[(idx::ACCEL_BIAS + i, idx::ACCEL_BIAS + i)] = noise.accel_bias * dt;
        q[(idx::GYRO_BIAS + i, idx::GYRO_BIAS + i)] = noise.gyro_bias * dt;
    }
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::UnitQuaternion;
    use std::f64::consts::FRAC_PI_2;

    const G: f64 = 9.80943;

    fn gravity() -> Vector3<f64> {
        Vector3::new(0.0, 0.0, -G)
    }

    fn sample(t: f64, accel: Vector3<f64>, gyro: Vector3<f64>) -> InertialSample {
        InertialSample::new(t, accel, gyro)
    }

    #[test]
    fn test_stationary_platform_stays_put() {
        let state = NominalState::default();
        let a = InertialSample::at_rest(0.0, G);
        let b = InertialSample::at_rest(0.01, G);
        let step = propagate(&state, &a, &b, 0.01, &gravity());

        assert_relative_eq!(step.state.position, Vector3::zeros(), epsilon = 1e-15);
        assert_relative_eq!(step.state.velocity, Vector3::zeros(), epsilon = 1e-15);
    }

    #[test]
    fn test_linear_acceleration() {
        let accel = Vector3::new(1.0, 0.0, G);
        let state = NominalState::default();
        let a = sample(0.0, accel, Vector3::zeros());
        let b = sample(1.0, accel, Vector3::zeros());
        let step = propagate(&state, &a, &b, 1.0, &gravity());

        assert_relative_eq!(step.state.position, Vector3::new(0.5, 0.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(step.state.velocity, Vector3::new(1.0, 0.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_mid_point_rate() {
        let state = NominalState::default();
        let a = sample(0.0, Vector3::new(0.0, 0.0, G), Vector3::zeros());
        let b = sample(1.0, Vector3::new(0.0, 0.0, G), Vector3::new(0.0, 0.0, 2.0 * FRAC_PI_2));
        let step = propagate(&state, &a, &b, 1.0, &gravity());

        assert_relative_eq!(
            step.state.orientation,
            UnitQuaternion::from_euler_angles(0.0, 0.0, FRAC_PI_2),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_gyro_bias_is_removed() {
        let mut state = NominalState::default();
        state.gyro_bias = Vector3::new(0.0, 0.0, 0.1);
        let a = sample(0.0, Vector3::new(0.0, 0.0, G), Vector3::new(0.0, 0.0, 0.1));
        let b = sample(0.5, Vector3::new(0.0, 0.0, G), Vector3::new(0.0, 0.0, 0.1));
        let step = propagate(&state, &a, &b, 0.5, &gravity());

        assert_relative_eq!(step.state.orientation.angle(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_transition_blocks() {
        let state = NominalState::default();
        let a = InertialSample::at_rest(0.0, G);
        let b = InertialSample::at_rest(0.1, G);
        let f = propagate(&state, &a, &b, 0.1, &gravity()).transition;

        assert_relative_eq!(f[(0, 3)], 0.1);
        assert_relative_eq!(f[(3, 9)], -0.1);
        assert_relative_eq!(f[(6, 12)], -0.1);
        // tilt couples into horizontal velocity through gravity
        assert_relative_eq!(f[(3, 7)], G * 0.1, epsilon = 1e-12);
        assert_relative_eq!(f[(4, 6)], -G * 0.1, epsilon = 1e-12);
        assert_relative_eq!(f[(5, 8)], 0.0);
    }

    #[test]
    fn test_discrete_process_noise() {
        let noise = ProcessNoise {
            accel: 2.0,
            gyro: 3.0,
            accel_bias: 4.0,
            gyro_bias: 5.0,
        };
        let q = discrete_process_noise(&noise, 0.1);
        assert_relative_eq!(q[(0, 0)], 0.0);
        assert_relative_eq!(q[(4, 4)], 2.0 * 0.01, epsilon = 1e-15);
        assert_relative_eq!(q[(7, 7)], 3.0 * 0.01, epsilon = 1e-15);
        assert_relative_eq!(q[(10, 10)], 4.0 * 0.1, epsilon = 1e-15);
        assert_relative_eq!(q[(14, 14)], 5.0 * 0.1, epsilon = 1e-15);
        assert_eq!(q, q.transpose());
    }
}
