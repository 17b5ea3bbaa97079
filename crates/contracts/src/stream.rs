//! SampleStream - identifies the four ingestion streams
//!
//! Used as a metrics label and as the tag of recorded samples.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ingestion stream identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleStream {
    /// Raw IMU measurements, consumed by prediction
    ImuRaw,
    /// Lidar pose derived from the point cloud (reference clock)
    Lidar,
    /// GNSS position / velocity / pose, synchronized to the lidar
    Gnss,
    /// IMU measurement synchronized to the lidar
    ImuSynced,
}

impl SampleStream {
    /// All streams, in buffer order
    pub const ALL: [SampleStream; 4] = [
        SampleStream::ImuRaw,
        SampleStream::Lidar,
        SampleStream::Gnss,
        SampleStream::ImuSynced,
    ];

    /// Stable string name (matches the serde representation)
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            SampleStream::ImuRaw => "imu_raw",
            SampleStream::Lidar => "lidar",
            SampleStream::Gnss => "gnss",
            SampleStream::ImuSynced => "imu_synced",
        }
    }

    /// Whether the stream belongs to the lidar-synchronized triplet
    #[inline]
    pub fn is_synchronized(&self) -> bool {
        !matches!(self, SampleStream::ImuRaw)
    }
}

impl fmt::Display for SampleStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_serde_name() {
        for stream in SampleStream::ALL {
            let json = serde_json::to_string(&stream).unwrap();
            assert_eq!(json, format!("\"{}\"", stream));
        }
    }

    #[test]
    fn test_only_raw_imu_is_unsynchronized() {
        assert!(!SampleStream::ImuRaw.is_synchronized());
        assert!(SampleStream::Lidar.is_synchronized());
        assert!(SampleStream::Gnss.is_synchronized());
        assert!(SampleStream::ImuSynced.is_synchronized());
    }
}
