//! 保留时长与实时窗口解析。
//!
//! 非法或低于下限的配置静默回退到默认值，不返回错误。

use crate::duration::parse_duration;
use domain::ClientType;
use std::time::Duration;

/// 保留时长下限：24 小时。
pub const DATA_KEEP_MINIMUM: Duration = Duration::from_secs(24 * 3600);
pub const TDENGINE_DATA_KEEP_DEFAULT: &str = "1d";
pub const REDIS_DATA_KEEP_DEFAULT: &str = "1h";
pub const REAL_TIME_WINDOW_DEFAULT: &str = "1m";
pub const REAL_TIME_WINDOW_DEFAULT_DURATION: Duration = Duration::from_secs(60);
pub const REAL_TIME_WINDOW_MINIMUM: Duration = Duration::from_secs(1);

/// 解析后的时长：文本用于拼接查询语句，`duration` 用于本地计算。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDuration {
    pub text: String,
    pub duration: Duration,
}

impl ResolvedDuration {
    fn new(text: impl Into<String>, duration: Duration) -> Self {
        Self {
            text: text.into(),
            duration,
        }
    }
}

fn default_data_keep(client_type: ClientType) -> ResolvedDuration {
    match client_type {
        ClientType::Redis => ResolvedDuration::new(REDIS_DATA_KEEP_DEFAULT, Duration::from_secs(3600)),
        _ => ResolvedDuration::new(TDENGINE_DATA_KEEP_DEFAULT, DATA_KEEP_MINIMUM),
    }
}

/// 解析数据保留时长。
///
/// 为空、无法解析、为零或不足 24 小时时使用后端默认值
/// （TDengine `1d`，Redis `1h`）；合法值的文本统一为整小时 `"{n}h"`。
pub fn resolve_data_keep(raw: &str, client_type: ClientType) -> ResolvedDuration {
    if raw.trim().is_empty() {
        return default_data_keep(client_type);
    }
    match parse_duration(raw) {
        Ok(duration) if !duration.is_zero() && duration >= DATA_KEEP_MINIMUM => {
            ResolvedDuration::new(format!("{}h", duration.as_secs() / 3600), duration)
        }
        _ => default_data_keep(client_type),
    }
}

/// 解析实时窗口。
///
/// 为空、无法解析或小于 1 秒时使用默认 `1m`。
pub fn resolve_real_time_window(raw: &str) -> ResolvedDuration {
    let fallback = || ResolvedDuration::new(REAL_TIME_WINDOW_DEFAULT, REAL_TIME_WINDOW_DEFAULT_DURATION);
    if raw.trim().is_empty() {
        return fallback();
    }
    match parse_duration(raw) {
        Ok(duration) if duration >= REAL_TIME_WINDOW_MINIMUM => {
            ResolvedDuration::new(duration_text(raw.trim(), duration), duration)
        }
        _ => fallback(),
    }
}

/// TDengine 只接受单一单位的时长字面量，组合写法改写为秒或毫秒（`a`）。
pub fn duration_text(raw: &str, duration: Duration) -> String {
    let single_term = raw.len() > 1
        && raw[..raw.len() - 1].chars().all(|c| c.is_ascii_digit())
        && matches!(raw.chars().last(), Some('s' | 'm' | 'h' | 'd'));
    if single_term {
        return raw.to_string();
    }
    let millis = duration.as_millis();
    if millis % 1000 == 0 {
        format!("{}s", millis / 1000)
    } else {
        format!("{}a", millis)
    }
}
