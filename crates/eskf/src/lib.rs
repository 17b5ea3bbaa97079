//! # ESKF
//!
//! Error-state Kalman filter fusing inertial prediction with absolute pose
//! and velocity observations.
//!
//! Nominal state: position, velocity, attitude (body → map), accelerometer
//! and gyroscope biases. The 15-dimensional error state is ordered
//! δp, δv, δθ, δb_a, δb_g; attitude errors are body-frame rotation vectors.
//!
//! ```ignore
//! use eskf::{Estimator, InitSeed, Observation};
//!
//! let mut estimator = Estimator::new(config.filter.clone());
//! estimator.init(&seed)?;
//! estimator.predict(&imu)?;
//! let accepted = estimator.correct(&synced_imu, &Observation::new(pose, velocity))?;
//! ```

mod error;
mod filter;
mod mechanization;
mod nominal;
mod observability;
mod observation;
pub mod so3;

pub use error::EstimatorError;
pub use filter::{Estimator, InitSeed, InitSource, InnovationReport};
pub use mechanization::{discrete_process_noise, propagate, Propagation};
pub use nominal::{ErrorState, NominalState};
pub use observability::{ObservabilityAnalyzer, ObservabilityReport};
pub use observation::{chi2_gate, Innovation, Observation};
