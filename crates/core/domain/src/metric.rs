//! 测量值模型。
//!
//! 标签按 key 升序保存（有序插入），字段按 key 原地替换。
//! 标签或字段为空的 Metric 不可写入，各写入路径会静默跳过。

use chrono::{DateTime, Utc};
use std::fmt;

/// 标签（身份维度）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricTag {
    pub key: String,
    pub value: String,
}

/// 字段值的数据类型。
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    I64(i64),
    F64(f64),
    Bool(bool),
    String(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::I64(v) => write!(f, "{}", v),
            FieldValue::F64(v) => write!(f, "{}", v),
            FieldValue::Bool(v) => write!(f, "{}", v),
            FieldValue::String(v) => f.write_str(v),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::I64(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::F64(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

/// 字段（点位编码 → 值）。
#[derive(Debug, Clone, PartialEq)]
pub struct MetricField {
    pub key: String,
    pub value: FieldValue,
}

/// 一次带时间戳的测量。
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    /// 测量名（设备型号 / 超级表名）
    pub name: String,
    /// 按 key 升序且唯一，只能通过 `add_tag` 修改
    tags: Vec<MetricTag>,
    pub fields: Vec<MetricField>,
    pub time: DateTime<Utc>,
}

impl Metric {
    pub fn new(name: impl Into<String>, time: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            tags: Vec::new(),
            fields: Vec::new(),
            time,
        }
    }

    /// 有序插入标签；key 已存在时只替换值。
    ///
    /// 单个 Metric 的标签数量很少，线性移动的 O(n) 插入成本可以接受。
    pub fn add_tag(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self
            .tags
            .binary_search_by(|tag| tag.key.as_str().cmp(key.as_str()))
        {
            Ok(index) => self.tags[index].value = value,
            Err(index) => self.tags.insert(index, MetricTag { key, value }),
        }
    }

    /// 按 key 替换字段，不存在时追加。
    pub fn add_field(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        let key = key.into();
        let value = value.into();
        if let Some(field) = self.fields.iter_mut().find(|field| field.key == key) {
            field.value = value;
            return;
        }
        self.fields.push(MetricField { key, value });
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_tag(key, value);
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.add_field(key, value);
        self
    }

    /// 按 key 升序排列的标签。
    pub fn tags(&self) -> &[MetricTag] {
        &self.tags
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .binary_search_by(|tag| tag.key.as_str().cmp(key))
            .ok()
            .map(|index| self.tags[index].value.as_str())
    }

    /// 标签与字段都非空才允许写入。
    pub fn is_writable(&self) -> bool {
        !self.tags.is_empty() && !self.fields.is_empty()
    }

    pub fn timestamp_ms(&self) -> i64 {
        self.time.timestamp_millis()
    }

    pub fn timestamp_ns(&self) -> i64 {
        self.time
            .timestamp_nanos_opt()
            .unwrap_or_else(|| self.time.timestamp_millis().saturating_mul(1_000_000))
    }
}
