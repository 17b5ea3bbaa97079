//! JsonLinesPublisher - appends fused results to a file, one JSON object per line

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use contracts::{FusionError, FusionPublisher, PointCloudData, Pose, StateStdDev, Vec3};
use serde::Serialize;
use tracing::{error, instrument};

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Record {
    Odometry {
        timestamp: f64,
        position: [f64; 3],
        /// x, y, z, w
        orientation: [f64; 4],
        velocity: [f64; 3],
    },
    Lidar {
        timestamp: f64,
        position: [f64; 3],
        orientation: [f64; 4],
    },
    Uncertainty {
        timestamp: f64,
        position: [f64; 3],
        velocity: [f64; 3],
        orientation: [f64; 3],
    },
}

fn position(pose: &Pose) -> [f64; 3] {
    let t = pose.translation.vector;
    [t.x, t.y, t.z]
}

fn orientation(pose: &Pose) -> [f64; 4] {
    let q = pose.rotation;
    [q.i, q.j, q.k, q.w]
}

fn components(v: &Vec3) -> [f64; 3] {
    [v.x, v.y, v.z]
}

/// Publisher that writes odometry, lidar poses and uncertainties to disk
///
/// Write errors are kept and surfaced by the next [`FusionPublisher::flush`];
/// nothing more is written after the first failure.
pub struct JsonLinesPublisher {
    path: PathBuf,
    writer: BufWriter<File>,
    records: u64,
    error: Option<std::io::Error>,
}

impl JsonLinesPublisher {
    /// Create (or truncate) the output file, creating parent directories
    pub fn create(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(&path)?;

        Ok(Self {
            path,
            writer: BufWriter::new(file),
            records: 0,
            error: None,
        })
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records successfully handed to the writer
    #[inline]
    pub fn records_written(&self) -> u64 {
        self.records
    }

    fn write_record(&mut self, record: &Record) {
        if self.error.is_some() {
            return;
        }
        match self.append(record) {
            Ok(()) => self.records += 1,
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "failed to write record");
                self.error = Some(e);
            }
        }
    }

    fn append(&mut self, record: &Record) -> std::io::Result<()> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")
    }
}

impl FusionPublisher for JsonLinesPublisher {
    fn publish_odometry(&mut self, pose: &Pose, velocity: &Vec3, timestamp: f64) {
        self.write_record(&Record::Odometry {
            timestamp,
            position: position(pose),
            orientation: orientation(pose),
            velocity: components(velocity),
        });
    }

    fn publish_transform(&mut self, _pose: &Pose, _timestamp: f64) {}

    fn publish_lidar_pose(&mut self, pose: &Pose, timestamp: f64) {
        self.write_record(&Record::Lidar {
            timestamp,
            position: position(pose),
            orientation: orientation(pose),
        });
    }

    fn publish_current_scan(&mut self, _cloud: &PointCloudData, _timestamp: f64) {}

    fn publish_global_map(&mut self, _map: &PointCloudData) {}

    fn publish_local_map(&mut self, _map: &PointCloudData) {}

    fn publish_uncertainty(&mut self, std_dev: &StateStdDev, timestamp: f64) {
        self.write_record(&Record::Uncertainty {
            timestamp,
            position: components(&std_dev.position),
            velocity: components(&std_dev.velocity),
            orientation: components(&std_dev.orientation),
        });
    }

    #[instrument(name = "jsonl_publisher_flush", skip(self), fields(path = %self.path.display()))]
    fn flush(&mut self) -> Result<(), FusionError> {
        if let Some(e) = self.error.take() {
            return Err(FusionError::Io(e));
        }
        self.writer.flush()?;
        Ok(())
    }
}
