//! RecordingPublisher - keeps everything in memory

use std::sync::{Arc, Mutex, MutexGuard};

use contracts::{FusionPublisher, PointCloudData, Pose, StateStdDev, Vec3};

/// One call made on a publisher
#[derive(Debug, Clone, PartialEq)]
pub enum PublishedEvent {
    Odometry {
        pose: Pose,
        velocity: Vec3,
        timestamp: f64,
    },
    Transform {
        pose: Pose,
        timestamp: f64,
    },
    LidarPose {
        pose: Pose,
        timestamp: f64,
    },
    CurrentScan {
        num_points: u32,
        timestamp: f64,
    },
    GlobalMap {
        num_points: u32,
    },
    LocalMap {
        num_points: u32,
    },
    Uncertainty {
        std_dev: StateStdDev,
        timestamp: f64,
    },
}

/// Publisher that records every event
///
/// Clones share the same log, so a test can keep one handle and give the
/// other to the controller.
#[derive(Debug, Clone, Default)]
pub struct RecordingPublisher {
    events: Arc<Mutex<Vec<PublishedEvent>>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<PublishedEvent>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, event: PublishedEvent) {
        self.lock().push(event);
    }

    /// Copy of every event so far, in publication order
    pub fn events(&self) -> Vec<PublishedEvent> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Timestamps of the fused odometry messages
    pub fn odometry_timestamps(&self) -> Vec<f64> {
        self.lock()
            .iter()
            .filter_map(|event| match event {
                PublishedEvent::Odometry { timestamp, .. } => Some(*timestamp),
                _ => None,
            })
            .collect()
    }

    /// Last fused odometry, if any
    pub fn last_odometry(&self) -> Option<(Pose, Vec3, f64)> {
        self.lock().iter().rev().find_map(|event| match event {
            PublishedEvent::Odometry {
                pose,
                velocity,
                timestamp,
            } => Some((*pose, *velocity, *timestamp)),
            _ => None,
        })
    }

    pub fn count(&self, pred: impl Fn(&PublishedEvent) -> bool) -> usize {
        self.lock().iter().filter(|event| pred(event)).count()
    }
}

impl FusionPublisher for RecordingPublisher {
    fn publish_odometry(&mut self, pose: &Pose, velocity: &Vec3, timestamp: f64) {
        self.record(PublishedEvent::Odometry {
            pose: *pose,
            velocity: *velocity,
            timestamp,
        });
    }

    fn publish_transform(&mut self, pose: &Pose, timestamp: f64) {
        self.record(PublishedEvent::Transform {
            pose: *pose,
            timestamp,
        });
    }

    fn publish_lidar_pose(&mut self, pose: &Pose, timestamp: f64) {
        self.record(PublishedEvent::LidarPose {
            pose: *pose,
            timestamp,
        });
    }

    fn publish_current_scan(&mut self, cloud: &PointCloudData, timestamp: f64) {
        self.record(PublishedEvent::CurrentScan {
            num_points: cloud.num_points,
            timestamp,
        });
    }

    fn publish_global_map(&mut self, map: &PointCloudData) {
        self.record(PublishedEvent::GlobalMap {
            num_points: map.num_points,
        });
    }

    fn publish_local_map(&mut self, map: &PointCloudData) {
        self.record(PublishedEvent::LocalMap {
            num_points: map.num_points,
        });
    }

    fn publish_uncertainty(&mut self, std_dev: &StateStdDev, timestamp: f64) {
        self.record(PublishedEvent::Uncertainty {
            std_dev: *std_dev,
            timestamp,
        });
    }
}
