//! # Ingestion
//!
//! Sample sources feeding the fusion controller.
//!
//! Responsibilities:
//! - Replay recorded runs from JSON-lines files
//! - Generate synthetic trajectories for tests and demos
//! - Hand samples to the driver over a bounded `tokio::sync::mpsc` channel
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{ReplayOptions, ReplaySource};
//!
//! let source = ReplaySource::new("run.jsonl", ReplayOptions::default());
//! let (mut rx, handle) = source.start(4096);
//! while let Some(sample) = rx.recv().await {
//!     controller.push_sample(sample);
//! }
//! let sent = handle.await??;
//! ```

mod error;
mod replay;
mod stats;
mod synthetic;

// Re-exports
pub use contracts::RecordedSample;
pub use error::{IngestionError, Result};
pub use replay::{read_samples, write_samples, ReplayOptions, ReplayReader, ReplaySource};
pub use stats::{IngestionMetrics, MetricsSnapshot};
pub use synthetic::{SyntheticNoise, SyntheticSource, SyntheticTrajectory};
