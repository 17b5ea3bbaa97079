//! Extrinsic calibration between the lidar and the body (IMU) frame

use serde::{Deserialize, Serialize};

use crate::Pose;

/// Rigid transform from the lidar frame to the body frame
///
/// `imu_from_lidar` maps lidar-frame coordinates into the body frame, so a
/// map-frame body pose `T_mb` and lidar pose `T_ml` are related by
/// `T_ml = T_mb * imu_from_lidar`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExtrinsicCalibration {
    pub imu_from_lidar: Pose,
}

impl ExtrinsicCalibration {
    pub fn new(imu_from_lidar: Pose) -> Self {
        Self { imu_from_lidar }
    }

    /// Identity calibration (lidar and body frames coincide)
    pub fn identity() -> Self {
        Self::new(Pose::identity())
    }

    /// Map-frame lidar pose → map-frame body pose
    #[inline]
    pub fn lidar_to_body(&self, lidar_pose: &Pose) -> Pose {
        lidar_pose * self.imu_from_lidar.inverse()
    }

    /// Map-frame body pose → map-frame lidar pose
    #[inline]
    pub fn body_to_lidar(&self, body_pose: &Pose) -> Pose {
        body_pose * self.imu_from_lidar
    }
}

impl Default for ExtrinsicCalibration {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    #[test]
    fn test_lidar_body_conversion_is_inverse() {
        let calib = ExtrinsicCalibration::new(Pose::new(
            Vector3::new(0.0, 0.0, 1.8),
            Vector3::new(0.0, 0.0, 0.1),
        ));
        let lidar = Pose::new(Vector3::new(5.0, -2.0, 1.0), Vector3::new(0.05, 0.0, 1.2));

        let body = calib.lidar_to_body(&lidar);
        let back = calib.body_to_lidar(&body);
        assert!((back.translation.vector - lidar.translation.vector).norm() < 1e-12);
        assert!(back.rotation.angle_to(&lidar.rotation) < 1e-12);
    }

    #[test]
    fn test_mounting_offset_is_removed() {
        // lidar mounted 1.8 m above the body origin
        let calib = ExtrinsicCalibration::new(Pose::translation(0.0, 0.0, 1.8));
        let lidar = Pose::translation(10.0, 0.0, 1.8);
        let body = calib.lidar_to_body(&lidar);
        assert!((body.translation.vector - Vector3::new(10.0, 0.0, 0.0)).norm() < 1e-12);
    }
}
