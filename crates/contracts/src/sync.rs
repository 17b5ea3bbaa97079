//! SyncedTriplet - Synchronizer output
//!
//! Synchronized lidar / GNSS / inertial triplet and buffer diagnostics.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{GnssSample, LidarPoseSample, SampleStream, SyncedInertialSample};

/// Lidar-referenced triplet accepted by the synchronizer
///
/// All three timestamps lie within the tolerance of the lidar timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncedTriplet {
    /// Reference sample
    pub lidar: LidarPoseSample,

    /// GNSS sample aligned to the lidar
    pub gnss: GnssSample,

    /// Inertial sample aligned to the lidar
    pub inertial: SyncedInertialSample,
}

impl SyncedTriplet {
    /// Reference timestamp (the lidar one)
    #[inline]
    pub fn timestamp(&self) -> f64 {
        self.lidar.timestamp
    }

    /// Largest absolute offset of a peer to the lidar timestamp
    pub fn max_offset(&self) -> f64 {
        let t = self.lidar.timestamp;
        (t - self.gnss.timestamp)
            .abs()
            .max((t - self.inertial.timestamp).abs())
    }
}

/// Per-stream buffer statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamStats {
    /// Samples currently buffered
    pub depth: usize,

    /// Samples evicted because the buffer was full
    pub evicted: u64,

    /// Samples discarded by the synchronizer
    pub sync_dropped: u64,

    /// Arrivals with a timestamp earlier than the previous arrival
    pub out_of_order: u64,

    /// Oldest buffered timestamp
    pub oldest_timestamp: Option<f64>,

    /// Newest buffered timestamp
    pub newest_timestamp: Option<f64>,
}

/// Sample buffer status (for diagnostics)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BufferStats {
    /// Stats per stream
    pub streams: HashMap<SampleStream, StreamStats>,

    /// Total buffered samples
    pub total_samples: usize,
}

impl BufferStats {
    /// Stats of one stream (zeroed when never recorded)
    pub fn stream(&self, stream: SampleStream) -> StreamStats {
        self.streams.get(&stream).copied().unwrap_or_default()
    }

    /// Sum of synchronizer drops over all streams
    pub fn total_sync_dropped(&self) -> u64 {
        self.streams.values().map(|s| s.sync_dropped).sum()
    }
}
