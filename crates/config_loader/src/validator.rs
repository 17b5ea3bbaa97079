//! 配置校验模块
//!
//! 校验规则：
//! - tolerance_s > 0
//! - buffer_capacity / channel_capacity > 0
//! - 所有方差 > 0 且有限
//! - gate.threshold (若设置) > 0
//! - tick_hz > 0
//! - 标定参数有限

use contracts::{FilterConfig, FusionConfig, FusionError};

/// 校验 FusionConfig 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &FusionConfig) -> Result<(), FusionError> {
    validate_sync(config)?;
    validate_filter(&config.filter)?;
    validate_calibration(config)?;
    validate_runtime(config)?;
    Ok(())
}

fn positive(field: &str, value: f64) -> Result<(), FusionError> {
    if value.is_finite() && value > 0.0 {
        return Ok(());
    }
    Err(FusionError::config_validation(
        field,
        format!("must be finite and > 0, got {value}"),
    ))
}

fn non_zero(field: &str, value: usize) -> Result<(), FusionError> {
    if value == 0 {
        return Err(FusionError::config_validation(field, "must be > 0"));
    }
    Ok(())
}

/// 校验同步配置
fn validate_sync(config: &FusionConfig) -> Result<(), FusionError> {
    positive("sync.tolerance_s", config.sync.tolerance_s)?;
    non_zero("sync.buffer_capacity", config.sync.buffer_capacity)
}

/// 校验滤波器配置
fn validate_filter(filter: &FilterConfig) -> Result<(), FusionError> {
    positive("filter.gravity", filter.gravity)?;

    let noise = &filter.process_noise;
    positive("filter.process_noise.accel", noise.accel)?;
    positive("filter.process_noise.gyro", noise.gyro)?;
    positive("filter.process_noise.accel_bias", noise.accel_bias)?;
    positive("filter.process_noise.gyro_bias", noise.gyro_bias)?;

    let prior = &filter.prior;
    positive("filter.prior.position", prior.position)?;
    positive("filter.prior.velocity", prior.velocity)?;
    positive("filter.prior.orientation", prior.orientation)?;
    positive("filter.prior.accel_bias", prior.accel_bias)?;
    positive("filter.prior.gyro_bias", prior.gyro_bias)?;

    // 观测模型未使用的噪声项也必须合法
    let measurement = &filter.measurement_noise;
    positive("filter.measurement_noise.position", measurement.position)?;
    positive("filter.measurement_noise.orientation", measurement.orientation)?;
    positive("filter.measurement_noise.velocity", measurement.velocity)?;

    if let Some(threshold) = filter.gate.threshold {
        positive("filter.gate.threshold", threshold)?;
    }
    if filter.observability.enabled {
        non_zero("filter.observability.window", filter.observability.window)?;
    }
    Ok(())
}

/// 校验标定参数
fn validate_calibration(config: &FusionConfig) -> Result<(), FusionError> {
    let calibration = &config.calibration;
    let all_finite = calibration
        .translation
        .iter()
        .chain(calibration.rotation_rpy.iter())
        .all(|v| v.is_finite());
    if !all_finite {
        return Err(FusionError::config_validation(
            "calibration",
            "translation and rotation_rpy must be finite",
        ));
    }
    Ok(())
}

/// 校验运行时配置
fn validate_runtime(config: &FusionConfig) -> Result<(), FusionError> {
    positive("runtime.tick_hz", config.runtime.tick_hz)?;
    non_zero("runtime.channel_capacity", config.runtime.channel_capacity)
}
