//! TDengine 查询语句拼接
//!
//! 只做反引号/单引号包裹，不做转义；设备 ID 与点位编码必须由调用方保证是安全标识符。

use crate::models::TdengineColumn;
use std::time::Duration;

/// 时间戳列（不能使用 `ts`）
pub const COLUMN_TIMESTAMP: &str = "_ts";
pub const COLUMN_DEVICE: &str = "device";
pub const COLUMN_ALIAS_DEVICE: &str = "deviceId";
pub const COLUMN_PROJECT: &str = "project";
pub const COLUMN_ALIAS_PROJECT: &str = "projectId";
/// 伪列，不能加反引号
pub const COLUMN_WINDOW_START: &str = "_wstart";
pub const TABLE_TAG_TYPE: &str = "NCHAR(16)";
pub const DEFAULT_DATA_TYPE: &str = "DOUBLE";

/// 选择列的附加项。
#[derive(Debug, Clone, Copy, Default)]
pub struct ColumnOptions<'a> {
    /// 聚合函数，例如 `last`
    pub function: Option<&'a str>,
    pub with_timestamp: bool,
    pub with_device: bool,
    pub with_project: bool,
}

pub fn quote(name: &str) -> String {
    format!("`{}`", name)
}

/// `` `a`, `b` `` 或 `` last(`a`) as `a`, last(`b`) as `b` ``
pub fn quote_columns(columns: &[String], function: Option<&str>) -> String {
    columns
        .iter()
        .map(|column| match function {
            Some(function) => format!("{}(`{}`) as `{}`", function, column, column),
            None => quote(column),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// 点位列前依次加上时间戳、设备、项目列。
pub fn select_columns(points: &[String], options: ColumnOptions<'_>) -> String {
    let mut parts = Vec::with_capacity(points.len() + 3);
    if options.with_timestamp {
        parts.push(match options.function {
            Some(function) => format!(
                "{}(`{}`) as `{}`",
                function, COLUMN_TIMESTAMP, COLUMN_TIMESTAMP
            ),
            None => quote(COLUMN_TIMESTAMP),
        });
    }
    if options.with_device {
        parts.push(format!("`{}` as `{}`", COLUMN_DEVICE, COLUMN_ALIAS_DEVICE));
    }
    if options.with_project {
        parts.push(format!("`{}` as `{}`", COLUMN_PROJECT, COLUMN_ALIAS_PROJECT));
    }
    if !points.is_empty() {
        parts.push(quote_columns(points, options.function));
    }
    parts.join(", ")
}

/// `'d1', 'd2'`
pub fn quote_literals(values: &[String]) -> String {
    values
        .iter()
        .map(|value| format!("'{}'", value))
        .collect::<Vec<_>>()
        .join(", ")
}

/// 数据类型编码到 TDengine 列类型。
///
/// 行协议写入时整数/位类型都会被识别为 DOUBLE，所以 1~11 统一映射为 DOUBLE。
pub fn column_type_for(data_type: &str) -> &'static str {
    match data_type {
        "1" | "2" | "3" | "4" | "5" | "6" | "7" | "8" | "9" | "10" | "11" => DEFAULT_DATA_TYPE,
        "12" => "BOOL",
        "13" => "NCHAR(32)",
        _ => DEFAULT_DATA_TYPE,
    }
}

/// `` `c1` DOUBLE, `c2` BOOL ``
pub fn typed_columns(columns: &[TdengineColumn]) -> String {
    columns
        .iter()
        .map(|column| {
            format!(
                "`{}` {}",
                column.column_name,
                column_type_for(&column.data_type)
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// TDengine 时长字面量：单一单位原样保留，其余改写为秒或毫秒（`a`）。
pub fn duration_literal(raw: &str, duration: Duration) -> String {
    ems_config::resolve::duration_text(raw.trim(), duration)
}

pub fn create_database(database: &str, keep: &str) -> String {
    format!(
        "CREATE DATABASE `{}` BUFFER 48 PAGES 128 DURATION 6h KEEP {}",
        database, keep
    )
}

pub fn create_stable(name: &str, columns: &[TdengineColumn]) -> String {
    let mut definition = format!("`{}` TIMESTAMP", COLUMN_TIMESTAMP);
    if !columns.is_empty() {
        definition.push_str(", ");
        definition.push_str(&typed_columns(columns));
    }
    format!(
        "CREATE STABLE IF NOT EXISTS `{}` ({}) TAGS (`{}` {}, `{}` {})",
        name, definition, COLUMN_DEVICE, TABLE_TAG_TYPE, COLUMN_PROJECT, TABLE_TAG_TYPE
    )
}

pub struct LatestQuery<'a> {
    pub model: &'a str,
    pub device_ids: &'a [String],
    pub point_codes: &'a [String],
    pub real_time_window: &'a str,
    pub with_timestamp: bool,
    pub with_device: bool,
    pub with_project: bool,
}

/// 实时窗口内每个设备各点位的 `last()`，按设备分区。
pub fn latest_query(query: &LatestQuery<'_>) -> String {
    let columns = select_columns(
        query.point_codes,
        ColumnOptions {
            function: Some("last"),
            with_timestamp: query.with_timestamp,
            with_device: query.with_device,
            with_project: query.with_project,
        },
    );
    let device_clause = if query.device_ids.is_empty() {
        String::new()
    } else {
        format!(
            "`{}` IN ({}) AND ",
            COLUMN_DEVICE,
            quote_literals(query.device_ids)
        )
    };
    format!(
        "SELECT {} FROM `{}` WHERE {}`{}`>NOW-{} PARTITION BY `{}`",
        columns,
        query.model,
        device_clause,
        COLUMN_TIMESTAMP,
        query.real_time_window,
        COLUMN_DEVICE
    )
}

pub struct SeriesQuery<'a> {
    pub model: &'a str,
    pub device_id: &'a str,
    pub point_codes: &'a [String],
    pub start_ms: i64,
    pub end_ms: i64,
    pub interval: &'a str,
    pub fill: &'a str,
}

/// 单设备窗口查询，第一列固定为窗口起始时间。
pub fn series_query(query: &SeriesQuery<'_>) -> String {
    format!(
        "SELECT {}, {} FROM `{}` WHERE `{}`='{}' AND `{}` >= {} AND `{}` <= {} INTERVAL({}) FILL({})",
        COLUMN_WINDOW_START,
        quote_columns(query.point_codes, Some("last")),
        query.model,
        COLUMN_DEVICE,
        query.device_id,
        COLUMN_TIMESTAMP,
        query.start_ms,
        COLUMN_TIMESTAMP,
        query.end_ms,
        query.interval,
        query.fill
    )
}
