//! 时序存储客户端配置加载。

pub mod duration;
pub mod resolve;

pub use duration::{DurationError, parse_duration};
pub use resolve::{ResolvedDuration, resolve_data_keep, resolve_real_time_window};

use domain::ClientType;
use std::env;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env: {0}")]
    Missing(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 时序存储连接配置。
///
/// `data_keep` 与 `real_time_window` 保持原始文本，由后端初始化时
/// 通过 [`resolve`] 校验并回退到默认值。
#[derive(Debug, Clone, Default)]
pub struct TsdbConfig {
    pub client_type: Option<ClientType>,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    pub data_keep: String,
    pub real_time_window: String,
    pub redis_url: String,
}

impl TsdbConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let client_type = match read_optional("EMS_TSDB_TYPE") {
            Some(value) => value
                .parse::<ClientType>()
                .map_err(|_| ConfigError::Invalid("EMS_TSDB_TYPE".to_string(), value))?,
            None => ClientType::Redis,
        };
        let password = env::var("EMS_TSDB_PASSWORD")
            .map_err(|_| ConfigError::Missing("EMS_TSDB_PASSWORD".to_string()))?;
        let host = env::var("EMS_TSDB_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = read_u16_with_default("EMS_TSDB_PORT", 6041)?;
        let username = env::var("EMS_TSDB_USERNAME").unwrap_or_else(|_| "root".to_string());
        let database = env::var("EMS_TSDB_DATABASE").unwrap_or_else(|_| "ems".to_string());
        let data_keep = read_optional("EMS_TSDB_DATA_KEEP").unwrap_or_default();
        let real_time_window = read_optional("EMS_TSDB_REAL_TIME_WINDOW").unwrap_or_default();
        let redis_url =
            env::var("EMS_REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());

        Ok(Self {
            client_type: Some(client_type),
            host,
            port,
            username,
            password,
            database,
            data_keep,
            real_time_window,
            redis_url,
        })
    }
}

fn read_u16_with_default(key: &str, default: u16) -> Result<u16, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u16>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}
