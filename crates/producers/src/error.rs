//! Producer 错误类型

use std::path::PathBuf;

use thiserror::Error;

/// Producer 构建错误
#[derive(Debug, Error)]
pub enum ProducerError {
    /// 回放文件无法读取或格式错误
    #[error("failed to load capture {}: {source}", path.display())]
    Replay {
        /// 回放文件路径
        path: PathBuf,
        #[source]
        source: dispatcher::DispatcherError,
    },

    /// 回放文件中没有帧
    #[error("capture {} contains no frames", path.display())]
    EmptyCapture {
        /// 回放文件路径
        path: PathBuf,
    },

    /// 配置无效
    #[error("invalid producer config: {0}")]
    Contract(#[from] contracts::ContractError),
}

/// Producer Result 类型别名
pub type Result<T> = std::result::Result<T, ProducerError>;
