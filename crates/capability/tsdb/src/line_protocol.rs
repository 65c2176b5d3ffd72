//! InfluxDB 行协议序列化（TDengine schemaless 写入）
//!
//! 格式：`measurement,tag_set field_set timestamp`，时间戳为纳秒，多行以 `\n` 连接。
//! 标签或字段为空的 Metric 整行跳过。

use domain::{FieldValue, Metric};
use std::fmt::Write;

pub fn serialize(metrics: &[Metric]) -> String {
    let mut buffer = String::new();
    for metric in metrics.iter().filter(|metric| metric.is_writable()) {
        if !buffer.is_empty() {
            buffer.push('\n');
        }
        write_metric(&mut buffer, metric);
    }
    buffer
}

fn write_metric(buffer: &mut String, metric: &Metric) {
    push_escaped(buffer, &metric.name, &[',', ' ']);
    for tag in metric.tags() {
        buffer.push(',');
        push_escaped(buffer, &tag.key, &[',', '=', ' ']);
        buffer.push('=');
        push_escaped(buffer, &tag.value, &[',', '=', ' ']);
    }
    buffer.push(' ');
    for (index, field) in metric.fields.iter().enumerate() {
        if index > 0 {
            buffer.push(',');
        }
        push_escaped(buffer, &field.key, &[',', '=', ' ']);
        buffer.push('=');
        write_field_value(buffer, &field.value);
    }
    let _ = write!(buffer, " {}", metric.timestamp_ns());
}

// 整数不加 `i` 后缀，统一按 DOUBLE 写入。
fn write_field_value(buffer: &mut String, value: &FieldValue) {
    match value {
        FieldValue::String(text) => {
            buffer.push('"');
            for c in text.chars() {
                if c == '"' || c == '\\' {
                    buffer.push('\\');
                }
                buffer.push(c);
            }
            buffer.push('"');
        }
        other => {
            let _ = write!(buffer, "{}", other);
        }
    }
}

fn push_escaped(buffer: &mut String, text: &str, special: &[char]) {
    for c in text.chars() {
        if special.contains(&c) {
            buffer.push('\\');
        }
        buffer.push(c);
    }
}
