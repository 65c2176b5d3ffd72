//! Redis Stream 条目解码
//!
//! 条目格式：`["1762828300498-0", ["value", "20"]]`。
//! 形状不符时返回 None，由调用方跳过该条目。

use crate::models::RedisDataPoint;
use crate::validation::value_as_f64;
use serde_json::Value;

/// Stream 条目中保存数值的字段名
pub const STREAM_VALUE_FIELD: &str = "value";

pub fn decode_entry(entry: &Value) -> Option<RedisDataPoint> {
    let [id, fields] = entry.as_array()?.as_slice() else {
        return None;
    };
    let [name, value] = fields.as_array()?.as_slice() else {
        return None;
    };
    if name.as_str()? != STREAM_VALUE_FIELD {
        return None;
    }
    let (millis, sequence) = id.as_str()?.split_once('-')?;
    if sequence.contains('-') {
        return None;
    }
    Some(RedisDataPoint {
        value: integer_value(value)?,
        timestamp_ms: millis.parse().ok()?,
        is_filled: false,
    })
}

/// 从 JSON 文本解码单个条目。
pub fn decode_entry_str(input: &str) -> Option<RedisDataPoint> {
    let entry: Value = serde_json::from_str(input).ok()?;
    decode_entry(&entry)
}

/// 数值文本按整数读取，小数截断，布尔为 1/0。
pub fn integer_value(value: &Value) -> Option<i64> {
    if let Value::String(text) = value {
        if let Ok(number) = text.trim().parse::<i64>() {
            return Some(number);
        }
        match text.trim() {
            "true" => return Some(1),
            "false" => return Some(0),
            _ => {}
        }
    }
    if let Some(number) = value.as_i64() {
        return Some(number);
    }
    value_as_f64(value)
        .filter(|number| number.is_finite())
        .map(|number| number.trunc() as i64)
}
