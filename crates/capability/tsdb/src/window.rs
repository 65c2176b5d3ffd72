//! 时间窗口与填充
//!
//! 把不规则的 Stream 样本整理成等间隔网格：
//! - 窗口为 `[w, w + interval)`，从 `start` 开始，窗口结束时间到达或越过 `end` 后停止
//!   （最后一个窗口可以超出 `end`）
//! - 每个窗口取结束时间之前的最后一个样本值，没有样本为 None
//! - 每条序列维护只前进不回退的游标，整体复杂度为 O(样本总数 + 窗口数 × 序列数)
//! - `FillOption::None` 删除所有序列都为空的窗口，其余策略保留全部窗口
//!
//! 样本必须按时间升序排列。

use crate::error::TsdbError;
use crate::models::{RedisDataPoint, SeriesData};
use domain::FillOption;
use serde_json::Value;
use std::time::Duration;

/// 单次查询允许生成的最大窗口数
pub const MAX_WINDOWS: i64 = 1_000_000;

/// 一个设备一个点位的原始样本（按时间升序）。
#[derive(Debug, Clone, Default)]
pub struct PointSeries {
    pub device_id: String,
    pub point_code: String,
    pub points: Vec<RedisDataPoint>,
}

/// 对齐到窗口后的序列。
#[derive(Debug, Clone, PartialEq)]
pub struct WindowedSeries {
    pub device_id: String,
    pub point_code: String,
    pub values: Vec<Option<i64>>,
}

/// 窗口网格：时间戳为各窗口结束时间（unix 毫秒）。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowGrid {
    pub timestamps: Vec<i64>,
    pub series: Vec<WindowedSeries>,
}

impl WindowGrid {
    /// 转成 Client 输出，None 输出为 JSON null。
    pub fn into_series_data(self) -> SeriesData {
        SeriesData {
            series: self
                .series
                .into_iter()
                .map(|series| {
                    series
                        .values
                        .into_iter()
                        .map(|value| value.map(Value::from).unwrap_or(Value::Null))
                        .collect()
                })
                .collect(),
            timestamps: self.timestamps,
        }
    }
}

/// `start`/`end` 为 unix 秒（闭区间）。
pub fn apply_time_window_and_fill(
    input: &[PointSeries],
    start: i64,
    end: i64,
    interval: Duration,
    fill: FillOption,
) -> Result<WindowGrid, TsdbError> {
    let step = i64::try_from(interval.as_millis())
        .map_err(|_| TsdbError::InvalidInput(format!("interval too large: {:?}", interval)))?;
    if step <= 0 {
        return Err(TsdbError::InvalidInput(format!(
            "invalid interval: {:?}",
            interval
        )));
    }
    if end < start {
        return Err(TsdbError::InvalidInput(format!(
            "end time {} is before start time {}",
            end, start
        )));
    }
    let start_ms = start.saturating_mul(1000);
    let end_ms = end.saturating_mul(1000);
    if (end_ms - start_ms) / step >= MAX_WINDOWS {
        return Err(TsdbError::InvalidInput(format!(
            "too many windows for interval {:?}",
            interval
        )));
    }

    let mut timestamps = Vec::new();
    let mut null_counts = Vec::new();
    let mut cursors = vec![0usize; input.len()];
    let mut columns: Vec<Vec<Option<i64>>> = vec![Vec::new(); input.len()];

    let mut window_start = start_ms;
    loop {
        let window_end = window_start + step;
        timestamps.push(window_end);

        let mut nulls = 0usize;
        for (index, series) in input.iter().enumerate() {
            let (value, next) =
                find_value_with_index(&series.points, cursors[index], window_start, window_end);
            cursors[index] = next;
            if value.is_none() {
                nulls += 1;
            }
            columns[index].push(value);
        }
        null_counts.push(nulls);

        if window_end >= end_ms {
            break;
        }
        window_start = window_end;
    }

    if fill == FillOption::None {
        let keep: Vec<bool> = null_counts
            .iter()
            .map(|nulls| *nulls != input.len())
            .collect();
        timestamps = retain_by_mask(timestamps, &keep);
        columns = columns
            .into_iter()
            .map(|column| retain_by_mask(column, &keep))
            .collect();
    }

    let series = input
        .iter()
        .zip(columns)
        .map(|(series, values)| WindowedSeries {
            device_id: series.device_id.clone(),
            point_code: series.point_code.clone(),
            values,
        })
        .collect();
    Ok(WindowGrid { timestamps, series })
}

/// 从 `start_index` 向后查找 `[window_start, window_end)` 内最后一个值。
///
/// 返回值中的下标指向第一个不早于 `window_end` 的样本，下一个窗口从这里继续。
fn find_value_with_index(
    points: &[RedisDataPoint],
    start_index: usize,
    window_start: i64,
    window_end: i64,
) -> (Option<i64>, usize) {
    let mut last_value = None;
    for (index, point) in points.iter().enumerate().skip(start_index) {
        if point.timestamp_ms < window_start {
            continue;
        }
        if point.timestamp_ms >= window_end {
            return (last_value, index);
        }
        last_value = Some(point.value);
    }
    (last_value, points.len().max(start_index))
}

fn retain_by_mask<T>(items: Vec<T>, keep: &[bool]) -> Vec<T> {
    items
        .into_iter()
        .zip(keep)
        .filter_map(|(item, keep)| keep.then_some(item))
        .collect()
}
