//! 验证辅助函数
//!
//! - ensure_connection_fields：连接参数必填校验
//! - rejected_by_filter：最新值读取的内存过滤

use crate::error::TsdbError;
use ems_config::TsdbConfig;
use serde_json::Value;
use std::collections::HashMap;

/// 验证连接参数完整
///
/// host/username/password/database 不能为空，port 必须大于 0。
pub fn ensure_connection_fields(config: &TsdbConfig) -> Result<(), TsdbError> {
    if config.host.is_empty() {
        return Err(TsdbError::Config("host is required".to_string()));
    }
    if config.port == 0 {
        return Err(TsdbError::Config("port is required".to_string()));
    }
    if config.username.is_empty() {
        return Err(TsdbError::Config("username is required".to_string()));
    }
    if config.password.is_empty() {
        return Err(TsdbError::Config("password is required".to_string()));
    }
    if config.database.is_empty() {
        return Err(TsdbError::Config("database is required".to_string()));
    }
    Ok(())
}

/// 将 JSON 值视为数值（数字、数字文本、布尔）。
pub fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        Value::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// 点位实际值与过滤条件不一致时返回 true
///
/// 过滤条件中没有该点位、或该点位没有观测值时不过滤。
pub fn rejected_by_filter(
    filter: Option<&HashMap<String, f64>>,
    point_code: &str,
    value: &Value,
) -> bool {
    let Some(expected) = filter.and_then(|filter| filter.get(point_code)) else {
        return false;
    };
    match value_as_f64(value) {
        Some(actual) => actual != *expected,
        None => false,
    }
}
