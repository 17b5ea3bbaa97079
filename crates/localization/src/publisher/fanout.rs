//! FanoutPublisher - forwards every call to several publishers

use contracts::{FusionError, FusionPublisher, PointCloudData, Pose, StateStdDev, Vec3};

/// Publisher that broadcasts to a list of publishers, in insertion order
#[derive(Default)]
pub struct FanoutPublisher {
    publishers: Vec<Box<dyn FusionPublisher>>,
}

impl FanoutPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, publisher: impl FusionPublisher + 'static) -> Self {
        self.push(publisher);
        self
    }

    pub fn push(&mut self, publisher: impl FusionPublisher + 'static) {
        self.publishers.push(Box::new(publisher));
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.publishers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.publishers.is_empty()
    }
}

impl FusionPublisher for FanoutPublisher {
    fn publish_odometry(&mut self, pose: &Pose, velocity: &Vec3, timestamp: f64) {
        for p in &mut self.publishers {
            p.publish_odometry(pose, velocity, timestamp);
        }
    }

    fn publish_transform(&mut self, pose: &Pose, timestamp: f64) {
        for p in &mut self.publishers {
            p.publish_transform(pose, timestamp);
        }
    }

    fn publish_lidar_pose(&mut self, pose: &Pose, timestamp: f64) {
        for p in &mut self.publishers {
            p.publish_lidar_pose(pose, timestamp);
        }
    }

    fn publish_current_scan(&mut self, cloud: &PointCloudData, timestamp: f64) {
        for p in &mut self.publishers {
            p.publish_current_scan(cloud, timestamp);
        }
    }

    fn publish_global_map(&mut self, map: &PointCloudData) {
        for p in &mut self.publishers {
            p.publish_global_map(map);
        }
    }

    fn publish_local_map(&mut self, map: &PointCloudData) {
        for p in &mut self.publishers {
            p.publish_local_map(map);
        }
    }

    fn publish_uncertainty(&mut self, std_dev: &StateStdDev, timestamp: f64) {
        for p in &mut self.publishers {
            p.publish_uncertainty(std_dev, timestamp);
        }
    }

    /// Flushes every publisher and returns the first error
    fn flush(&mut self) -> Result<(), FusionError> {
        let mut first_error = None;
        for p in &mut self.publishers {
            if let Err(e) = p.flush() {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
