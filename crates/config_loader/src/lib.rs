//! # Config Loader
//!
//! 读取 ext-audio 适配器配置：按扩展名选择 TOML / JSON，反序列化为
//! `AdapterConfig`，再做语义校验 (定时参数、待处理上限、sink 参数)。
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let config = ConfigLoader::load_from_path(Path::new("ext_audio.toml"))?;
//! println!("source {} every {} ms", config.source.name, config.source.request_interval_ms);
//! # Ok::<(), contracts::ContractError>(())
//! ```

mod parser;
mod validator;

pub use contracts::AdapterConfig;
pub use parser::ConfigFormat;

use contracts::ContractError;
use std::path::Path;

/// 配置加载入口
pub struct ConfigLoader;

impl ConfigLoader {
    /// 从文件加载，格式由扩展名决定
    ///
    /// # Errors
    /// 读取、格式识别、解析或校验任一步失败
    pub fn load_from_path(path: &Path) -> Result<AdapterConfig, ContractError> {
        let format = ConfigFormat::from_path(path)?;
        let content = std::fs::read_to_string(path)?;
        Self::load_from_str(&content, format)
    }

    /// 从字符串加载 (解析 + 校验)
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<AdapterConfig, ContractError> {
        let config = parser::parse(content, format)?;
        validator::validate(&config)?;
        Ok(config)
    }

    /// 序列化为 TOML (缺省值会被展开写出)
    pub fn to_toml(config: &AdapterConfig) -> Result<String, ContractError> {
        toml::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    pub fn to_json(config: &AdapterConfig) -> Result<String, ContractError> {
        serde_json::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }
}
