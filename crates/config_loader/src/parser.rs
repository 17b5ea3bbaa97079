//! 配置解析模块
//!
//! 支持 TOML (主要) 和 JSON 格式。

use contracts::{FusionConfig, FusionError};

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML 格式 (推荐)
    Toml,
    /// JSON 格式
    Json,
}

impl ConfigFormat {
    /// 从文件扩展名推断格式
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// 解析 TOML 格式配置
pub fn parse_toml(content: &str) -> Result<FusionConfig, FusionError> {
    toml::from_str(content).map_err(|e| FusionError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 解析 JSON 格式配置
pub fn parse_json(content: &str) -> Result<FusionConfig, FusionError> {
    serde_json::from_str(content).map_err(|e| FusionError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 根据格式解析配置
pub fn parse(content: &str, format: ConfigFormat) -> Result<FusionConfig, FusionError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::ObservationModel;

    #[test]
    fn test_parse_toml_partial_sections() {
        let content = r#"
[sync]
tolerance_s = 0.02

[filter]
observation_model = "position_velocity"

[filter.measurement_noise]
velocity = 0.01

[calibration]
translation = [0.0, 0.0, 1.2]
"#;
        let config = parse_toml(content).unwrap();
        assert_eq!(config.sync.tolerance_s, 0.02);
        assert_eq!(config.sync.buffer_capacity, 100_000);
        assert_eq!(
            config.filter.observation_model,
            ObservationModel::PositionVelocity
        );
        assert_eq!(config.filter.measurement_noise.velocity, 0.01);
        assert_eq!(config.filter.measurement_noise.position, 1.0e-4);
        assert_eq!(config.calibration.translation[2], 1.2);
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{
            "filter": { "gate": { "enabled": false } },
            "runtime": { "tick_hz": 50.0, "output": "out/odom.jsonl" }
        }"#;
        let config = parse_json(content).unwrap();
        assert!(!config.filter.gate.enabled);
        assert_eq!(config.runtime.tick_hz, 50.0);
        assert!(config.runtime.output.is_some());
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let err = parse_toml("invalid toml [[[").unwrap_err();
        assert!(matches!(err, FusionError::ConfigParse { .. }));
    }

    #[test]
    fn test_unknown_observation_model_is_rejected() {
        let err = parse_toml("[filter]\nobservation_model = \"magic\"\n").unwrap_err();
        assert!(matches!(err, FusionError::ConfigParse { .. }));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            ConfigFormat::from_extension("toml"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("TOML"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("json"),
            Some(ConfigFormat::Json)
        );
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
