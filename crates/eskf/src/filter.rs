//! Error-state Kalman filter.

use contracts::{
    pose_is_finite, Covariance, FilterConfig, FilterPhase, FusionState, InertialSample, Pose,
    StateStdDev, SyncedInertialSample, Vec3, ERROR_STATE_DIM,
};
use nalgebra::{DMatrix, SVector, Vector3};
use serde::Serialize;
use tracing::instrument;

use crate::mechanization::{discrete_process_noise, propagate};
use crate::nominal::{ErrorState, NominalState};
use crate::observability::{ObservabilityAnalyzer, ObservabilityReport};
use crate::observation::{chi2_gate, Innovation, Observation};
use crate::{so3, EstimatorError};

/// Everything needed to seed the filter (poses in the body frame)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InitSeed {
    /// Pose from place recognition, if it matched
    pub scan_pose: Option<Pose>,

    /// Pose from GNSS, used when the scan pose is unavailable
    pub gnss_pose: Pose,

    /// Initial map-frame velocity
    pub velocity: Vec3,

    /// Inertial reading at the seed instant
    pub inertial: SyncedInertialSample,
}

/// Which strategy produced the initial pose
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum InitSource {
    /// Scan-context match; `deviation` is its distance to the GNSS position (m)
    ScanContext { deviation: f64 },
    Gnss,
}

/// Outcome of the consistency check of the latest correction
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InnovationReport {
    pub timestamp: f64,

    /// Measurement rows
    pub dim: usize,

    /// Squared Mahalanobis distance `yᵀ S⁻¹ y`
    pub mahalanobis_sq: f64,

    /// Gate applied, if gating is enabled
    pub threshold: Option<f64>,

    pub accepted: bool,
}

/// Error-state Kalman filter over position, velocity, attitude and biases
#[derive(Debug, Clone)]
pub struct Estimator {
    config: FilterConfig,
    gravity: Vector3<f64>,
    phase: FilterPhase,
    nominal: NominalState,
    covariance: Covariance,
    time: f64,
    last_inertial: Option<InertialSample>,
    last_innovation: Option<InnovationReport>,
    observability: Option<ObservabilityAnalyzer>,
}

impl Estimator {
    pub fn new(config: FilterConfig) -> Self {
        let gravity = Vector3::new(0.0, 0.0, -config.gravity);
        let observability = config
            .observability
            .enabled
            .then(|| ObservabilityAnalyzer::new(config.observability.window));
        Self {
            config,
            gravity,
            phase: FilterPhase::Uninitialized,
            nominal: NominalState::default(),
            covariance: Covariance::zeros(),
            time: 0.0,
            last_inertial: None,
            last_innovation: None,
            observability,
        }
    }

    #[inline]
    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Seed pose, velocity, time and prior covariance
    ///
    /// A finite scan pose wins; otherwise the GNSS pose is used.
    #[instrument(name = "estimator_init", skip(self, seed), fields(t = seed.inertial.timestamp))]
    pub fn init(&mut self, seed: &InitSeed) -> Result<InitSource, EstimatorError> {
        if self.phase == FilterPhase::Initialized {
            return Err(EstimatorError::AlreadyInitialized);
        }
        if !seed.inertial.timestamp.is_finite() {
            return Err(EstimatorError::InitFallbackFailed {
                reason: "seed timestamp is not finite".into(),
            });
        }
        if !seed.velocity.iter().all(|v| v.is_finite()) {
            return Err(EstimatorError::InitFallbackFailed {
                reason: "GNSS velocity is not finite".into(),
            });
        }

        let scan_pose = match seed.scan_pose {
            Some(pose) if pose_is_finite(&pose) => Some(pose),
            Some(_) => {
                tracing::warn!("scan initializer returned a non-finite pose, ignoring it");
                None
            }
            None => None,
        };

        let (pose, source) = match scan_pose {
            Some(pose) => {
                let deviation =
                    (pose.translation.vector - seed.gnss_pose.translation.vector).norm();
                tracing::info!(deviation, "initialized from scan context");
                (pose, InitSource::ScanContext { deviation })
            }
            None if pose_is_finite(&seed.gnss_pose) => {
                tracing::info!("scan context unavailable, initialized from GNSS");
                (seed.gnss_pose, InitSource::Gnss)
            }
            None => {
                return Err(EstimatorError::InitFallbackFailed {
                    reason: "no scan pose and GNSS pose is not finite".into(),
                })
            }
        };

        self.nominal = NominalState::from_pose(&pose, seed.velocity);
        self.covariance = self.prior_covariance();
        self.time = seed.inertial.timestamp;
        self.last_inertial = Some(*seed.inertial.sample());
        self.phase = FilterPhase::Initialized;
        Ok(source)
    }

    fn prior_covariance(&self) -> Covariance {
        let prior = &self.config.prior;
        let mut diagonal = SVector::<f64, ERROR_STATE_DIM>::zeros();
        diagonal.fixed_rows_mut::<3>(0).fill(prior.position);
        diagonal.fixed_rows_mut::<3>(3).fill(prior.velocity);
        diagonal.fixed_rows_mut::<3>(6).fill(prior.orientation);
        diagonal.fixed_rows_mut::<3>(9).fill(prior.accel_bias);
        diagonal.fixed_rows_mut::<3>(12).fill(prior.gyro_bias);
        Covariance::from_diagonal(&diagonal)
    }

    /// Propagate state and covariance to the sample timestamp
    ///
    /// A sample at exactly the filter time only replaces the last inertial
    /// reading. This lets a synced inertial sample stamped at the time of the
    /// last raw prediction bridge into a correction (raw 5.2, then a triplet
    /// whose inertial sample is also 5.2). Earlier or non-finite timestamps
    /// fail with [`EstimatorError::NonMonotonicTime`].
    pub fn predict(&mut self, sample: &InertialSample) -> Result<(), EstimatorError> {
        let Some(previous) = self.last_inertial.filter(|_| self.is_initialized()) else {
            return Err(EstimatorError::NotInitialized);
        };

        let dt = sample.timestamp - self.time;
        if !dt.is_finite() || dt < 0.0 {
            return Err(EstimatorError::NonMonotonicTime {
                sample: sample.timestamp,
                last: self.time,
            });
        }

        if dt > 0.0 {
            let step = propagate(&self.nominal, &previous, sample, dt, &self.gravity);
            let f = step.transition;
            self.nominal = step.state;
            self.covariance = f * self.covariance * f.transpose()
                + discrete_process_noise(&self.config.process_noise, dt);
            so3::symmetrize(&mut self.covariance);

            if let Some(analyzer) = self.observability.as_mut() {
                analyzer.accumulate(&f);
            }
            self.time = sample.timestamp;
        }

        self.last_inertial = Some(*sample);
        Ok(())
    }

    /// Predict to the synchronized instant, then fuse the observation
    ///
    /// Returns `Ok(false)` when the Mahalanobis gate rejects the observation;
    /// the state is then exactly the predicted one.
    #[instrument(
        name = "estimator_correct",
        level = "debug",
        skip(self, inertial, observation),
        fields(t = inertial.timestamp)
    )]
    pub fn correct(
        &mut self,
        inertial: &SyncedInertialSample,
        observation: &Observation,
    ) -> Result<bool, EstimatorError> {
        self.predict(inertial.sample())?;

        let model = self.config.observation_model;
        let innovation = Innovation::build(
            model,
            &self.nominal,
            observation,
            &self.config.measurement_noise,
        );
        let dim = innovation.dim();
        let h = &innovation.jacobian;

        let p = DMatrix::from_column_slice(
            ERROR_STATE_DIM,
            ERROR_STATE_DIM,
            self.covariance.as_slice(),
        );
        let s = h * &p * h.transpose() + &innovation.noise;
        let s_inv = s
            .try_inverse()
            .filter(|m| m.iter().all(|v| v.is_finite()))
            .ok_or(EstimatorError::SingularInnovation { dim })?;

        let y = &innovation.residual;
        let mahalanobis_sq = (y.transpose() * &s_inv * y)[(0, 0)];
        let threshold = self
            .config
            .gate
            .enabled
            .then(|| self.config.gate.threshold.unwrap_or_else(|| chi2_gate(dim)));
        let accepted = threshold.map_or(true, |gate| mahalanobis_sq <= gate);

        self.last_innovation = Some(InnovationReport {
            timestamp: self.time,
            dim,
            mahalanobis_sq,
            threshold,
            accepted,
        });

        if !accepted {
            tracing::debug!(mahalanobis_sq, ?threshold, "observation rejected by gate");
            return Ok(false);
        }

        let k = &p * h.transpose() * &s_inv;
        let dx = &k * y;
        let i_kh = DMatrix::<f64>::identity(ERROR_STATE_DIM, ERROR_STATE_DIM) - &k * h;
        let joseph = &i_kh * &p * i_kh.transpose() + &k * &innovation.noise * k.transpose();

        self.covariance = Covariance::from_column_slice(joseph.as_slice());
        so3::symmetrize(&mut self.covariance);
        self.nominal
            .inject(&ErrorState::from_column_slice(dx.as_slice()));

        if let Some(analyzer) = self.observability.as_mut() {
            analyzer.record_correction(h);
        }
        Ok(true)
    }

    // ===== Reads =====

    /// Body pose and map-frame velocity
    pub fn odometry(&self) -> (Pose, Vec3) {
        (self.nominal.pose(), self.nominal.velocity)
    }

    pub fn standard_deviation(&self) -> StateStdDev {
        StateStdDev::from_covariance(&self.covariance)
    }

    pub fn state(&self) -> FusionState {
        FusionState {
            timestamp: self.time,
            pose: self.nominal.pose(),
            velocity: self.nominal.velocity,
            accel_bias: self.nominal.accel_bias,
            gyro_bias: self.nominal.gyro_bias,
            covariance: self.covariance,
        }
    }

    #[inline]
    pub fn time(&self) -> f64 {
        self.time
    }

    #[inline]
    pub fn phase(&self) -> FilterPhase {
        self.phase
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.phase == FilterPhase::Initialized
    }

    #[inline]
    pub fn last_innovation(&self) -> Option<InnovationReport> {
        self.last_innovation
    }

    /// Observability of the error state over the configured window
    pub fn observability_report(&self) -> Option<ObservabilityReport> {
        self.observability.as_ref().and_then(|a| a.report())
    }
}
