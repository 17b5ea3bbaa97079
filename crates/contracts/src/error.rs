//! Layered error definitions
//!
//! Categorized by source: config / init / estimator / io

use thiserror::Error;

/// Unified error type
///
/// Only fatal conditions live here. Recoverable events (calibration pending,
/// primary init failure, outlier rejection, synchronization mismatch) are
/// reported through the tick report, logs and metrics.
#[derive(Debug, Error)]
pub enum FusionError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Fusion Errors =====
    /// Neither the scan initializer nor the GNSS fallback produced a usable seed
    #[error("initialization fallback failed: {reason}")]
    InitFallbackFailed { reason: String },

    /// Prediction requested with a timestamp earlier than the filter time
    #[error("non-monotonic predict time: sample t={sample:.6}s < filter t={last:.6}s")]
    NonMonotonicPredictTime { sample: f64, last: f64 },

    /// Any other estimator failure
    #[error("estimator error: {message}")]
    Estimator { message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl FusionError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create estimator error
    pub fn estimator(message: impl Into<String>) -> Self {
        Self::Estimator {
            message: message.into(),
        }
    }

    /// Whether the error leaves the estimator in an undefined state
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InitFallbackFailed { .. }
                | Self::NonMonotonicPredictTime { .. }
                | Self::Estimator { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = FusionError::config_validation("sync.tolerance_s", "must be positive");
        assert_eq!(
            err.to_string(),
            "config validation error at 'sync.tolerance_s': must be positive"
        );

        let err = FusionError::NonMonotonicPredictTime {
            sample: 1.0,
            last: 2.0,
        };
        assert!(err.to_string().contains("1.000000"));
        assert!(err.is_fatal());
        assert!(!FusionError::config_parse("bad").is_fatal());
    }
}
