//! Fusion driver loop and run statistics.

mod driver;
mod stats;

pub use driver::{DriverConfig, FusionDriver};
pub use stats::RunStats;
