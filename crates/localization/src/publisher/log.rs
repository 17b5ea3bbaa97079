//! LogPublisher - reports fusion output via tracing

use contracts::{FusionPublisher, PointCloudData, Pose, StateStdDev, Vec3};
use tracing::{debug, info};

/// Publisher that only logs what it receives
pub struct LogPublisher {
    name: String,
}

impl LogPublisher {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl FusionPublisher for LogPublisher {
    fn publish_odometry(&mut self, pose: &Pose, velocity: &Vec3, timestamp: f64) {
        let p = pose.translation.vector;
        debug!(
            publisher = %self.name,
            t = timestamp,
            x = p.x,
            y = p.y,
            z = p.z,
            speed = velocity.norm(),
            "fused odometry"
        );
    }

    fn publish_transform(&mut self, _pose: &Pose, timestamp: f64) {
        debug!(publisher = %self.name, t = timestamp, "map -> body transform");
    }

    fn publish_lidar_pose(&mut self, pose: &Pose, timestamp: f64) {
        let p = pose.translation.vector;
        debug!(
            publisher = %self.name,
            t = timestamp,
            x = p.x,
            y = p.y,
            z = p.z,
            "lidar pose"
        );
    }

    fn publish_current_scan(&mut self, cloud: &PointCloudData, timestamp: f64) {
        debug!(
            publisher = %self.name,
            t = timestamp,
            points = cloud.num_points,
            "current scan"
        );
    }

    fn publish_global_map(&mut self, map: &PointCloudData) {
        info!(publisher = %self.name, points = map.num_points, "global map updated");
    }

    fn publish_local_map(&mut self, map: &PointCloudData) {
        debug!(publisher = %self.name, points = map.num_points, "local map updated");
    }

    fn publish_uncertainty(&mut self, std_dev: &StateStdDev, timestamp: f64) {
        debug!(
            publisher = %self.name,
            t = timestamp,
            position = std_dev.position.norm(),
            velocity = std_dev.velocity.norm(),
            orientation = std_dev.orientation.norm(),
            "state standard deviation"
        );
    }
}
