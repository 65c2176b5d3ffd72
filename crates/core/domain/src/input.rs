//! 读取参数。

use crate::ParseError;
use std::fmt;
use std::str::FromStr;

/// 时序读取的空窗口填充策略。
///
/// TDengine 直接使用 `FILL(...)` 子句；Redis 模拟实现中只有 `None`
/// 会删除全空窗口，其余策略保留窗口并输出 null（不做前值延续或插值）。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FillOption {
    #[default]
    None,
    Null,
    Prev,
    Next,
    Linear,
}

impl FillOption {
    pub fn as_str(&self) -> &'static str {
        match self {
            FillOption::None => "NONE",
            FillOption::Null => "NULL",
            FillOption::Prev => "PREV",
            FillOption::Next => "NEXT",
            FillOption::Linear => "LINEAR",
        }
    }
}

impl fmt::Display for FillOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FillOption {
    type Err = ParseError;

    /// 空字符串视为默认的 `NONE`。
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "" | "NONE" => Ok(FillOption::None),
            "NULL" => Ok(FillOption::Null),
            "PREV" => Ok(FillOption::Prev),
            "NEXT" => Ok(FillOption::Next),
            "LINEAR" => Ok(FillOption::Linear),
            _ => Err(ParseError::FillOption(value.to_string())),
        }
    }
}

/// 最新值读取结果的附加列。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatestOutputOptions {
    /// 输出 `_ts`（毫秒）
    pub with_timestamp: bool,
    /// 输出 `deviceId`
    pub with_device: bool,
    /// 输出 `projectId`（仅 TDengine 有 project 标签）
    pub with_project: bool,
}

impl Default for LatestOutputOptions {
    fn default() -> Self {
        Self {
            with_timestamp: true,
            with_device: true,
            with_project: false,
        }
    }
}

/// 设备最新值读取参数。
///
/// `device_ids` 为空时由后端自行发现设备。Redis 后端通过 SCAN 发现，
/// 结果不受任何租户/项目边界约束；需要隔离时调用方必须显式传入设备 ID。
#[derive(Debug, Clone, Default)]
pub struct ReadDeviceLatestDataInput {
    pub device_ids: Vec<String>,
    pub device_model_name: String,
    pub point_codes: Vec<String>,
    pub output: LatestOutputOptions,
}

/// 设备时序读取参数。
#[derive(Debug, Clone, Default)]
pub struct ReadDeviceSeriesDataInput {
    pub device_ids: Vec<String>,
    pub device_model_name: String,
    pub point_codes: Vec<String>,
    /// unix 秒
    pub start_time: i64,
    /// unix 秒
    pub end_time: i64,
    /// 窗口宽度，例如 `1m`
    pub interval: String,
    pub fill: FillOption,
}
