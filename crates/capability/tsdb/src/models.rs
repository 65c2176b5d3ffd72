//! 读写路径上的数据结构
//!
//! - TdengineHttpOutput：TDengine REST 响应信封
//! - TdengineColumn：建超级表时的列定义
//! - RedisDataPoint：Stream 条目解码后的数据点
//! - LatestRow / SeriesData：Client 契约的读取结果

use serde::Deserialize;
use serde_json::{Map, Value};

/// TDengine REST 响应信封。
///
/// 错误响应只有 `code` 与 `desc`，其余字段取默认值。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TdengineHttpOutput {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub desc: Option<String>,
    /// `[name, type, length]` 三元组
    #[serde(default)]
    pub column_meta: Vec<Vec<Value>>,
    /// 按行存储的数据矩阵
    #[serde(default)]
    pub data: Vec<Vec<Value>>,
    #[serde(default)]
    pub rows: i64,
}

impl TdengineHttpOutput {
    /// 按 column_meta 顺序返回列名。
    pub fn column_names(&self) -> Vec<String> {
        self.column_meta
            .iter()
            .map(|meta| match meta.first() {
                Some(Value::String(name)) => name.clone(),
                Some(other) => other.to_string(),
                None => String::new(),
            })
            .collect()
    }

    pub fn desc_or_empty(&self) -> String {
        self.desc.clone().unwrap_or_default()
    }
}

/// 超级表列定义。
///
/// `data_type` 为点位数据类型编码（"1" ~ "13"），见 `query::column_type_for`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TdengineColumn {
    pub column_name: String,
    pub data_type: String,
}

impl TdengineColumn {
    pub fn new(column_name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            column_name: column_name.into(),
            data_type: data_type.into(),
        }
    }
}

/// Stream 条目解码结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedisDataPoint {
    pub value: i64,
    /// unix 毫秒，取自条目 ID 的毫秒部分
    pub timestamp_ms: i64,
    /// 预留：是否为填充值，目前始终为 false
    pub is_filled: bool,
}

/// 最新值读取的一行（一个设备）。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LatestRow {
    pub values: Map<String, Value>,
    /// 本行中实际返回的点位编码
    pub point_codes: Vec<String>,
}

/// 时序读取结果：每个设备/点位一列，空窗口为 JSON null。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesData {
    pub series: Vec<Vec<Value>>,
    /// unix 毫秒
    pub timestamps: Vec<i64>,
}

impl SeriesData {
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}
