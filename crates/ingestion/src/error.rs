//! Ingestion 错误类型

use thiserror::Error;

/// Ingestion 错误
#[derive(Debug, Error)]
pub enum IngestionError {
    /// 回放文件中的一行无法解析
    #[error("line {line}: {message}")]
    Parse {
        /// 行号 (从 1 开始)
        line: usize,
        /// 错误消息
        message: String,
    },

    /// 下游通道已关闭
    #[error("sample channel closed")]
    ChannelClosed,

    /// 合成轨迹参数非法
    #[error("invalid synthetic trajectory: {0}")]
    InvalidTrajectory(String),

    /// IO 错误
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;
