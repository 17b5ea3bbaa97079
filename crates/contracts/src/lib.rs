//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the localizer:
//! sensor samples, poses, calibration, fusion state snapshots, configuration,
//! collaborator traits and the error taxonomy.
//! Business crates depend only on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - All timestamps are seconds (`f64`) on the lidar reference clock
//! - The synchronized streams (lidar pose, GNSS, synced IMU) are already
//!   aligned upstream; the core only verifies them against a tolerance

mod calibration;
mod collaborator;
mod config;
mod error;
mod report;
mod sample;
mod state;
mod stream;
mod sync;

pub use calibration::*;
pub use collaborator::*;
pub use config::*;
pub use error::*;
pub use report::*;
pub use sample::*;
pub use state::*;
pub use stream::SampleStream;
pub use sync::*;

/// Rigid-body pose (rotation + translation), body or lidar frame expressed in the map frame.
pub type Pose = nalgebra::Isometry3<f64>;

/// 3D vector used for positions, velocities, accelerations and rates.
pub type Vec3 = nalgebra::Vector3<f64>;
