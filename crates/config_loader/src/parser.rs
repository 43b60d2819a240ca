//! 配置解析
//!
//! TOML 为主，JSON 供程序生成的配置使用。解析只做反序列化，
//! 缺省字段由 `contracts` 中的 serde 默认值补齐。

use std::fmt;
use std::path::Path;

use contracts::{AdapterConfig, ContractError};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// 从扩展名推断 (不区分大小写)
    pub fn from_extension(ext: &str) -> Option<Self> {
        if ext.eq_ignore_ascii_case("toml") {
            Some(Self::Toml)
        } else if ext.eq_ignore_ascii_case("json") {
            Some(Self::Json)
        } else {
            None
        }
    }

    /// 从文件路径推断
    ///
    /// # Errors
    /// 无扩展名或扩展名不受支持时返回 `ConfigParse`
    pub fn from_path(path: &Path) -> Result<Self, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse(format!(
                "cannot determine config format of {}: missing extension",
                path.display()
            ))
        })?;
        Self::from_extension(ext)
            .ok_or_else(|| ContractError::config_parse(format!("unsupported config format: .{ext}")))
    }
}

impl fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Toml => "TOML",
            Self::Json => "JSON",
        })
    }
}

/// 按格式反序列化 `AdapterConfig`
pub fn parse(content: &str, format: ConfigFormat) -> Result<AdapterConfig, ContractError> {
    let result: Result<AdapterConfig, BoxError> = match format {
        ConfigFormat::Toml => toml::from_str(content).map_err(|e| e.into()),
        ConfigFormat::Json => serde_json::from_str(content).map_err(|e| e.into()),
    };
    result.map_err(|e| ContractError::ConfigParse {
        message: format!("{format} parse error: {e}"),
        source: Some(e),
    })
}
