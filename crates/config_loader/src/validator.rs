//! 配置校验模块
//!
//! 校验规则：
//! - 字段范围 (由 `validator` derive 规则声明)
//! - sine 生产者参数合法，replay 路径非空
//! - sink 名称唯一
//! - file sink 必须提供 `path`，`format` 取值合法

use std::collections::HashSet;

use contracts::{AdapterConfig, ContractError, ProducerConfig, SinkType};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// `format` values accepted by the file sink
const FILE_FORMATS: &[&str] = &["pcm", "raw", "frames", "capture"];

/// 校验 AdapterConfig 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &AdapterConfig) -> Result<(), ContractError> {
    validate_fields(config, "")?;
    validate_producer(config)?;
    validate_sink_names(config)?;
    validate_sink_params(config)?;
    Ok(())
}

/// 执行 derive 声明的字段规则
fn validate_fields(target: &impl Validate, prefix: &str) -> Result<(), ContractError> {
    target.validate().map_err(|errors| {
        let (field, message) = first_violation(&errors, prefix)
            .unwrap_or_else(|| (prefix.to_string(), errors.to_string()));
        ContractError::config_validation(field, message)
    })
}

/// 取出第一个违规字段 (按字段名排序，保证结果稳定)
fn first_violation(errors: &ValidationErrors, prefix: &str) -> Option<(String, String)> {
    let mut fields: Vec<_> = errors.errors().iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));

    for (field, kind) in fields {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(violations) => {
                if let Some(violation) = violations.first() {
                    let message = match &violation.message {
                        Some(message) => message.to_string(),
                        None => format!("failed '{}' check", violation.code),
                    };
                    return Some((path, message));
                }
            }
            ValidationErrorsKind::Struct(inner) => {
                if let Some(found) = first_violation(inner, &path) {
                    return Some(found);
                }
            }
            ValidationErrorsKind::List(items) => {
                for (idx, inner) in items {
                    if let Some(found) = first_violation(inner, &format!("{path}[{idx}]")) {
                        return Some(found);
                    }
                }
            }
        }
    }
    None
}

/// 校验生产者配置
fn validate_producer(config: &AdapterConfig) -> Result<(), ContractError> {
    match &config.producer {
        ProducerConfig::Sine(sine) => validate_fields(sine, "producer"),
        ProducerConfig::Replay(replay) => {
            if replay.path.as_os_str().is_empty() {
                return Err(ContractError::config_validation(
                    "producer.path",
                    "replay path cannot be empty",
                ));
            }
            Ok(())
        }
    }
}

/// 校验 sink 名称唯一性
fn validate_sink_names(config: &AdapterConfig) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for sink in &config.sinks {
        if !seen.insert(sink.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("sinks[name={}]", sink.name),
                "duplicate sink name",
            ));
        }
    }
    Ok(())
}

/// 校验 sink 参数
fn validate_sink_params(config: &AdapterConfig) -> Result<(), ContractError> {
    for (idx, sink) in config.sinks.iter().enumerate() {
        if sink.sink_type != SinkType::File {
            continue;
        }
        match sink.params.get("path") {
            Some(path) if !path.trim().is_empty() => {}
            _ => {
                return Err(ContractError::config_validation(
                    format!("sinks[{idx}].params.path"),
                    "file sink requires 'path'",
                ));
            }
        }
        if let Some(format) = sink.params.get("format") {
            if !FILE_FORMATS.contains(&format.to_lowercase().as_str()) {
                return Err(ContractError::config_validation(
                    format!("sinks[{idx}].params.format"),
                    format!("unknown file format '{format}', expected one of {FILE_FORMATS:?}"),
                ));
            }
        }
    }
    Ok(())
}
