//! TickReport - Fusion controller output per driver tick

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where the controller stands after a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickStatus {
    /// Extrinsic calibration not available yet, nothing was processed
    #[default]
    CalibrationPending,
    /// Waiting for a synchronized triplet to initialize
    Uninitialized,
    /// Estimator initialized and fusing
    Tracking,
}

impl fmt::Display for TickStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TickStatus::CalibrationPending => f.write_str("calibration_pending"),
            TickStatus::Uninitialized => f.write_str("uninitialized"),
            TickStatus::Tracking => f.write_str("tracking"),
        }
    }
}

/// Work done by one controller tick
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    pub status: TickStatus,

    /// Inertial prediction steps (excluding the ones inside corrections)
    pub predictions: u64,

    pub corrections_accepted: u64,

    /// Observations rejected by the consistency gate
    pub corrections_rejected: u64,

    /// Synchronized samples discarded for exceeding the tolerance
    pub sync_drops: u64,

    /// Raw inertial samples older than the filter time
    pub stale_inertial_drops: u64,

    /// Triplets whose inertial sample was already behind the filter time
    pub stale_corrections: u64,

    /// Whether the estimator was initialized during this tick
    pub initialized: bool,

    /// Filter time at the end of the tick
    pub filter_time: Option<f64>,

    /// Squared Mahalanobis distance of every correction attempted
    pub mahalanobis_sq: Vec<f64>,

    /// Norm of the position standard deviation at the end of the tick
    pub position_std: Option<f64>,
}

impl TickReport {
    pub fn with_status(status: TickStatus) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    /// Corrections attempted (accepted + rejected)
    #[inline]
    pub fn corrections(&self) -> u64 {
        self.corrections_accepted + self.corrections_rejected
    }

    /// Whether the tick changed any state
    pub fn did_work(&self) -> bool {
        self.predictions > 0
            || self.corrections() > 0
            || self.sync_drops > 0
            || self.stale_inertial_drops > 0
            || self.stale_corrections > 0
            || self.initialized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_report_is_idle() {
        let report = TickReport::with_status(TickStatus::Uninitialized);
        assert!(!report.did_work());
        assert_eq!(report.corrections(), 0);
        assert_eq!(report.status.to_string(), "uninitialized");
    }
}
