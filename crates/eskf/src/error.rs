//! Estimator errors

use contracts::FusionError;
use thiserror::Error;

/// Estimator error type
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EstimatorError {
    /// Prediction or correction before `init`
    #[error("estimator not initialized")]
    NotInitialized,

    /// `init` called twice
    #[error("estimator already initialized")]
    AlreadyInitialized,

    /// Inertial sample earlier than the filter time
    #[error("non-monotonic time: sample t={sample:.6}s < filter t={last:.6}s")]
    NonMonotonicTime { sample: f64, last: f64 },

    /// No usable initial pose or velocity
    #[error("initialization fallback failed: {reason}")]
    InitFallbackFailed { reason: String },

    /// Innovation covariance could not be inverted
    #[error("singular innovation covariance ({dim}x{dim})")]
    SingularInnovation { dim: usize },
}

impl From<EstimatorError> for FusionError {
    fn from(err: EstimatorError) -> Self {
        match err {
            EstimatorError::NonMonotonicTime { sample, last } => {
                FusionError::NonMonotonicPredictTime { sample, last }
            }
            EstimatorError::InitFallbackFailed { reason } => {
                FusionError::InitFallbackFailed { reason }
            }
            other => FusionError::estimator(other.to_string()),
        }
    }
}
