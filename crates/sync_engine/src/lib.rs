//! # Sync Engine
//!
//! Multi-stream sample buffering and lidar-referenced alignment.
//!
//! Responsibilities:
//! - bounded FIFO buffers for the four ingestion streams
//! - tolerance check of the lidar / GNSS / synced-inertial triplet
//! - sequencing of raw inertial samples around the lidar timestamps
//!
//! ## Usage
//!
//! ```ignore
//! use sync_engine::Synchronizer;
//!
//! let mut sync = Synchronizer::new(&config.sync);
//! sync.push_lidar(lidar);
//! sync.push_gnss(gnss);
//! sync.push_synced_inertial(imu);
//!
//! if let Some(triplet) = sync.validate_lidar_triplet() {
//!     // predict up to triplet.timestamp(), then correct
//! }
//! ```

mod buffer;
mod synchronizer;

pub use buffer::{SampleBuffer, SampleBuffers};
pub use synchronizer::{classify_triplet, Synchronizer, TripletCheck};

// Re-export contracts types
pub use contracts::{BufferStats, StreamStats, SyncConfig, SyncedTriplet};
