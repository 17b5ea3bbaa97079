//! Synthetic circular trajectory
//!
//! Generates all four streams for a platform driving a horizontal circle at
//! constant speed: raw inertial samples at `imu_hz`, and lidar pose, GNSS and
//! synchronized inertial samples at `lidar_hz`, on the same clock.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use contracts::{
    ExtrinsicCalibration, GnssSample, InertialSample, LidarPoseSample, PointCloudData, Pose,
    RecordedSample, Timestamped, Vec3,
};
use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::{IngestionError, Result};
use crate::stats::IngestionMetrics;

/// Standard deviations of the generated measurement noise
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticNoise {
    /// Specific force (m/s²)
    pub accel: f64,
    /// Angular rate (rad/s)
    pub gyro: f64,
    /// Lidar and GNSS position (m)
    pub position: f64,
    /// Lidar and GNSS attitude (rad)
    pub orientation: f64,
    /// GNSS velocity (m/s)
    pub velocity: f64,
}

impl SyntheticNoise {
    pub fn none() -> Self {
        Self {
            accel: 0.0,
            gyro: 0.0,
            position: 0.0,
            orientation: 0.0,
            velocity: 0.0,
        }
    }
}

impl Default for SyntheticNoise {
    fn default() -> Self {
        Self {
            accel: 0.02,
            gyro: 0.002,
            position: 0.01,
            orientation: 0.005,
            velocity: 0.02,
        }
    }
}

/// Circular trajectory parameters
#[derive(Debug, Clone)]
pub struct SyntheticTrajectory {
    /// Timestamp of the first sample (s)
    pub start_time: f64,
    pub duration_s: f64,
    pub imu_hz: f64,
    /// Rate of lidar, GNSS and synchronized inertial samples
    pub lidar_hz: f64,
    pub radius_m: f64,
    pub speed_mps: f64,
    pub gravity: f64,
    /// Mounting of the lidar on the body
    pub extrinsic: ExtrinsicCalibration,
    pub noise: SyntheticNoise,
    /// Points in the placeholder cloud attached to each lidar sample
    pub lidar_points: u32,
    pub seed: u64,
}

impl Default for SyntheticTrajectory {
    fn default() -> Self {
        Self {
            start_time: 1.0,
            duration_s: 30.0,
            imu_hz: 100.0,
            lidar_hz: 10.0,
            radius_m: 20.0,
            speed_mps: 5.0,
            gravity: 9.80943,
            extrinsic: ExtrinsicCalibration::identity(),
            noise: SyntheticNoise::default(),
            lidar_points: 0,
            seed: 42,
        }
    }
}

impl SyntheticTrajectory {
    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("start_time", self.start_time.is_finite()),
            ("duration_s", self.duration_s.is_finite() && self.duration_s > 0.0),
            ("imu_hz", self.imu_hz.is_finite() && self.imu_hz > 0.0),
            (
                "lidar_hz",
                self.lidar_hz.is_finite() && self.lidar_hz > 0.0 && self.lidar_hz <= self.imu_hz,
            ),
            ("radius_m", self.radius_m.is_finite() && self.radius_m > 0.0),
            ("speed_mps", self.speed_mps.is_finite() && self.speed_mps >= 0.0),
            ("gravity", self.gravity.is_finite() && self.gravity > 0.0),
        ];
        match checks.iter().find(|(_, ok)| !ok) {
            Some((field, _)) => Err(IngestionError::InvalidTrajectory(format!(
                "{field} out of range"
            ))),
            None => Ok(()),
        }
    }

    /// Yaw rate (rad/s)
    #[inline]
    pub fn angular_rate(&self) -> f64 {
        self.speed_mps / self.radius_m
    }

    /// Body pose and map-frame velocity at `t`
    pub fn ground_truth(&self, t: f64) -> (Pose, Vec3) {
        let omega = self.angular_rate();
        let theta = omega * (t - self.start_time);
        let (sin, cos) = theta.sin_cos();

        let position = Translation3::new(self.radius_m * cos, self.radius_m * sin, 0.0);
        let heading = UnitQuaternion::from_euler_angles(0.0, 0.0, theta + std::f64::consts::FRAC_PI_2);
        let velocity = Vector3::new(-sin, cos, 0.0) * self.speed_mps;
        (Isometry3::from_parts(position, heading), velocity)
    }

    /// Specific force in the body frame (constant on a circle)
    pub fn specific_force(&self) -> Vec3 {
        let centripetal = self.speed_mps * self.angular_rate();
        Vector3::new(0.0, centripetal, self.gravity)
    }

    /// Angular velocity in the body frame
    pub fn angular_velocity(&self) -> Vec3 {
        Vector3::new(0.0, 0.0, self.angular_rate())
    }

    /// Every sample of the trajectory, ordered by timestamp
    ///
    /// At a shared instant the lidar, GNSS and synchronized inertial samples
    /// precede the raw inertial one.
    pub fn generate(&self) -> Result<Vec<RecordedSample>> {
        self.validate()?;

        let ratio = ((self.imu_hz / self.lidar_hz).round() as usize).max(1);
        let steps = (self.duration_s * self.imu_hz).floor() as usize;
        let mut rng = StdRng::seed_from_u64(self.seed);
        let noise = self.noise;
        let cloud = self.placeholder_cloud();

        let mut samples = Vec::with_capacity(steps + 1 + 3 * (steps / ratio + 1));
        for k in 0..=steps {
            let t = self.start_time + k as f64 / self.imu_hz;

            if k % ratio == 0 {
                let (body, velocity) = self.ground_truth(t);
                let lidar = self.extrinsic.body_to_lidar(&body);

                samples.push(RecordedSample::Lidar(LidarPoseSample {
                    timestamp: t,
                    pose: perturb(&mut rng, &lidar, noise.position, noise.orientation),
                    cloud: cloud.clone(),
                }));
                samples.push(RecordedSample::Gnss(GnssSample::new(
                    t,
                    perturb(&mut rng, &lidar, noise.position, noise.orientation),
                    velocity + gaussian(&mut rng, noise.velocity),
                )));
                samples.push(RecordedSample::ImuSynced(self.inertial(&mut rng, t).into()));
            }
            samples.push(RecordedSample::ImuRaw(self.inertial(&mut rng, t)));
        }

        debug!(
            samples = samples.len(),
            steps,
            ratio,
            "synthetic trajectory generated"
        );
        Ok(samples)
    }

    fn inertial(&self, rng: &mut StdRng, t: f64) -> InertialSample {
        InertialSample::new(
            t,
            self.specific_force() + gaussian(rng, self.noise.accel),
            self.angular_velocity() + gaussian(rng, self.noise.gyro),
        )
    }

    fn placeholder_cloud(&self) -> PointCloudData {
        if self.lidar_points == 0 {
            return PointCloudData::empty();
        }
        let stride = 16;
        PointCloudData {
            num_points: self.lidar_points,
            point_stride: stride,
            data: Bytes::from(vec![0u8; (self.lidar_points * stride) as usize]),
        }
    }
}

fn gaussian(rng: &mut StdRng, std_dev: f64) -> Vec3 {
    if std_dev == 0.0 {
        return Vec3::zeros();
    }
    Vec3::from_fn(|_, _| rng.sample::<f64, _>(StandardNormal) * std_dev)
}

fn perturb(rng: &mut StdRng, pose: &Pose, position_std: f64, orientation_std: f64) -> Pose {
    let translation = pose.translation.vector + gaussian(rng, position_std);
    let rotation = pose.rotation * UnitQuaternion::from_scaled_axis(gaussian(rng, orientation_std));
    Isometry3::from_parts(Translation3::from(translation), rotation)
}

/// Streams a synthetic trajectory into a bounded channel
pub struct SyntheticSource {
    trajectory: SyntheticTrajectory,
    speed: Option<f64>,
    metrics: Arc<IngestionMetrics>,
}

impl SyntheticSource {
    pub fn new(trajectory: SyntheticTrajectory) -> Self {
        Self {
            trajectory,
            speed: None,
            metrics: Arc::new(IngestionMetrics::new()),
        }
    }

    /// Pace samples by their timestamps (1.0 = real time)
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed).filter(|s| s.is_finite() && *s > 0.0);
        self
    }

    #[inline]
    pub fn trajectory(&self) -> &SyntheticTrajectory {
        &self.trajectory
    }

    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        self.metrics.clone()
    }

    /// Generate the trajectory and spawn the sending task
    pub fn start(
        &self,
        channel_capacity: usize,
    ) -> Result<(mpsc::Receiver<RecordedSample>, JoinHandle<Result<u64>>)> {
        let samples = self.trajectory.generate()?;
        let (tx, rx) = mpsc::channel(channel_capacity.max(1));
        let speed = self.speed;
        let metrics = self.metrics.clone();

        let handle = tokio::spawn(async move {
            let started = tokio::time::Instant::now();
            let t0 = samples.first().map(Timestamped::timestamp).unwrap_or_default();
            let mut sent = 0;

            for sample in samples {
                if let Some(speed) = speed {
                    let offset = ((sample.timestamp() - t0) / speed).max(0.0);
                    tokio::time::sleep_until(started + Duration::from_secs_f64(offset)).await;
                }
                let stream = sample.stream();
                if tx.send(sample).await.is_err() {
                    debug!(sent, "synthetic channel closed");
                    break;
                }
                metrics.record_sent(stream);
                sent += 1;
            }
            Ok(sent)
        });
        Ok((rx, handle))
    }
}
