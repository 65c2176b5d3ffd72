//! Redis 时序模拟实现
//!
//! 键布局：
//! - 时序 Stream：`{deviceId}:{pointCode}`，条目 `{ts_ms}-* value {v}`
//! - 最新值 Hash：`{model}:{deviceId}_latest`，字段 `_ts`（毫秒）与各点位，
//!   存活时间为实时窗口
//!
//! 单个 Stream 追加失败（例如样本早于 Stream 末尾）只记录日志并计数，
//! 同批其余字段、最新值 Hash 与其余 Metric 照常写入；Hash 写入失败视为连接错误直接返回。
//! 文本字段只写入最新值 Hash，时序读取只返回数值样本。
//!
//! 过期数据由后台任务 `RedisAutoExpireCron` 按保留时长裁剪，
//! 每个实时窗口执行一次。

mod commands;

pub use commands::{KvCommandClient, RedisCommandClient, SCAN_COUNT, resp_to_json, scan_all};

use crate::error::TsdbError;
use crate::models::{LatestRow, SeriesData, TdengineColumn};
use crate::query::{COLUMN_ALIAS_DEVICE, COLUMN_DEVICE, COLUMN_TIMESTAMP};
use crate::scheduler::PeriodicTask;
use crate::stream::{STREAM_VALUE_FIELD, decode_entry, integer_value};
use crate::traits::Client;
use crate::validation::rejected_by_filter;
use crate::window::{PointSeries, apply_time_window_and_fill};
use async_trait::async_trait;
use domain::{ClientType, FieldValue, Metric, ReadDeviceLatestDataInput, ReadDeviceSeriesDataInput};
use ems_config::{TsdbConfig, parse_duration, resolve_data_keep, resolve_real_time_window};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

/// 裁剪任务名称
pub const TRIM_TASK_NAME: &str = "RedisAutoExpireCron";
const LATEST_KEY_SUFFIX: &str = "_latest";
const STREAM_KEY_TYPE: &str = "stream";

/// `{deviceId}:{pointCode}`
pub fn stream_key(device_id: &str, point_code: &str) -> String {
    format!("{}:{}", device_id, point_code)
}

/// `{model}:{deviceId}_latest`
pub fn latest_key(model: &str, device_id: &str) -> String {
    format!("{}:{}{}", model, device_id, LATEST_KEY_SUFFIX)
}

fn latest_pattern(model: &str) -> String {
    format!("{}:*{}", model, LATEST_KEY_SUFFIX)
}

fn device_from_latest_key<'a>(model: &str, key: &'a str) -> Option<&'a str> {
    key.strip_prefix(model)?
        .strip_prefix(':')?
        .strip_suffix(LATEST_KEY_SUFFIX)
        .filter(|device| !device.is_empty())
}

#[derive(Debug, Clone, Copy)]
struct RedisSettings {
    data_keep: Duration,
    real_time_window: Duration,
}

/// Redis 时序客户端
pub struct RedisClient {
    commands: Arc<dyn KvCommandClient>,
    settings: RwLock<Option<RedisSettings>>,
    init_lock: tokio::sync::Mutex<()>,
    trim_task: Mutex<Option<PeriodicTask>>,
}

impl RedisClient {
    pub fn new(commands: Arc<dyn KvCommandClient>) -> Self {
        Self {
            commands,
            settings: RwLock::new(None),
            init_lock: tokio::sync::Mutex::new(()),
            trim_task: Mutex::new(None),
        }
    }

    pub fn from_client(client: redis::Client) -> Self {
        Self::new(Arc::new(RedisCommandClient::new(client)))
    }

    /// 是否已经调度裁剪任务
    pub fn has_trim_task(&self) -> bool {
        self.trim_task
            .lock()
            .map(|task| task.as_ref().is_some_and(|task| !task.is_finished()))
            .unwrap_or(false)
    }

    /// 立即执行一次裁剪，返回处理的 Stream 数量。
    pub async fn trim_expired_streams(&self) -> Result<usize, TsdbError> {
        let settings = self.settings()?;
        Ok(trim_streams(self.commands.as_ref(), settings.data_keep).await)
    }

    fn settings(&self) -> Result<RedisSettings, TsdbError> {
        self.settings
            .read()
            .map_err(|_| TsdbError::Lock)?
            .ok_or(TsdbError::NotInitialized)
    }

    fn schedule_trim(&self, settings: RedisSettings) -> Result<(), TsdbError> {
        let commands = Arc::clone(&self.commands);
        let data_keep = settings.data_keep;
        let task = PeriodicTask::spawn(TRIM_TASK_NAME, settings.real_time_window, move || {
            let commands = Arc::clone(&commands);
            async move {
                trim_streams(commands.as_ref(), data_keep).await;
            }
        });
        let mut slot = self.trim_task.lock().map_err(|_| TsdbError::Lock)?;
        if let Some(previous) = slot.replace(task) {
            previous.abort();
        }
        Ok(())
    }

    async fn discover_devices(&self, model: &str) -> Result<Vec<String>, TsdbError> {
        let keys = scan_all(self.commands.as_ref(), Some(&latest_pattern(model)), None).await?;
        let mut devices: Vec<String> = keys
            .iter()
            .filter_map(|key| device_from_latest_key(model, key))
            .map(str::to_string)
            .collect();
        devices.sort();
        devices.dedup();
        Ok(devices)
    }

    async fn write_metric(
        &self,
        metric: &Metric,
        device_id: &str,
        ttl_seconds: u64,
    ) -> Result<(), TsdbError> {
        let timestamp_ms = metric.timestamp_ms();
        let entry_id = format!("{}-*", timestamp_ms);
        let mut latest = Vec::with_capacity(metric.fields.len() + 1);
        latest.push((COLUMN_TIMESTAMP.to_string(), timestamp_ms.to_string()));
        for field in &metric.fields {
            let value = field.value.to_string();
            if is_stream_sample(&field.value) {
                let key = stream_key(device_id, &field.key);
                if let Err(err) = self
                    .commands
                    .xadd(&key, &entry_id, STREAM_VALUE_FIELD, &value)
                    .await
                {
                    ems_telemetry::record_write_failure();
                    tracing::error!(target: "ems.tsdb", key = %key, entry_id = %entry_id, error = %err, "stream append failed");
                }
            }
            latest.push((field.key.clone(), value));
        }
        let key = latest_key(&metric.name, device_id);
        self.commands.hset_multiple(&key, &latest).await?;
        self.commands.expire(&key, ttl_seconds).await?;
        Ok(())
    }
}

impl Drop for RedisClient {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.trim_task.lock() {
            if let Some(task) = slot.take() {
                task.abort();
            }
        }
    }
}

/// 只有能按整数读回的值写入 Stream，文本值只保存在最新值 Hash 中。
fn is_stream_sample(value: &FieldValue) -> bool {
    match value {
        FieldValue::String(text) => integer_value(&Value::String(text.clone())).is_some(),
        _ => true,
    }
}

/// 裁剪所有 Stream 中早于保留时长的条目，失败只记录日志。
async fn trim_streams(commands: &dyn KvCommandClient, data_keep: Duration) -> usize {
    ems_telemetry::record_trim_run();
    let keys = match scan_all(commands, None, Some(STREAM_KEY_TYPE)).await {
        Ok(keys) => keys,
        Err(err) => {
            ems_telemetry::record_trim_failure();
            tracing::error!(target: "ems.tsdb", error = %err, "scan streams for trim failed");
            return 0;
        }
    };
    let keep_ms = i64::try_from(data_keep.as_millis()).unwrap_or(i64::MAX);
    let min_id = chrono::Utc::now().timestamp_millis().saturating_sub(keep_ms);
    let mut trimmed = 0;
    for key in &keys {
        match commands.xtrim_minid(key, &min_id.to_string()).await {
            Ok(removed) => {
                trimmed += 1;
                if removed > 0 {
                    tracing::debug!(target: "ems.tsdb", key = %key, removed, "stream trimmed");
                }
            }
            Err(err) => {
                ems_telemetry::record_trim_failure();
                tracing::error!(target: "ems.tsdb", key = %key, error = %err, "stream trim failed");
            }
        }
    }
    trimmed
}

#[async_trait]
impl Client for RedisClient {
    async fn init(&self, config: &TsdbConfig) -> Result<(), TsdbError> {
        let _guard = self.init_lock.lock().await;
        self.commands
            .ping()
            .await
            .map_err(|err| TsdbError::Unhealthy(err.to_string()))?;

        let data_keep = resolve_data_keep(&config.data_keep, ClientType::Redis);
        let real_time_window = resolve_real_time_window(&config.real_time_window);
        let settings = RedisSettings {
            data_keep: data_keep.duration,
            real_time_window: real_time_window.duration,
        };
        *self.settings.write().map_err(|_| TsdbError::Lock)? = Some(settings);
        self.schedule_trim(settings)?;
        tracing::info!(
            target: "ems.tsdb",
            data_keep = %data_keep.text,
            real_time_window = %real_time_window.text,
            task = TRIM_TASK_NAME,
            "redis tsdb client initialized"
        );
        Ok(())
    }

    async fn is_healthy(&self) -> bool {
        match self.commands.ping().await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(target: "ems.tsdb", error = %err, "redis health check failed");
                false
            }
        }
    }

    async fn write(&self, metrics: &[Metric]) -> Result<(), TsdbError> {
        let settings = self.settings()?;
        let ttl_seconds = settings.real_time_window.as_secs().max(1);
        let mut written = 0u64;
        for metric in metrics {
            if !metric.is_writable() {
                ems_telemetry::record_metric_skipped();
                tracing::warn!(target: "ems.tsdb", metric = %metric.name, "metric without tags or fields skipped");
                continue;
            }
            let Some(device_id) = metric.tag(COLUMN_DEVICE).filter(|id| !id.is_empty()) else {
                ems_telemetry::record_metric_skipped();
                tracing::warn!(target: "ems.tsdb", metric = %metric.name, "metric without device tag skipped");
                continue;
            };
            if let Err(err) = self.write_metric(metric, device_id, ttl_seconds).await {
                ems_telemetry::record_write_failure();
                ems_telemetry::record_metrics_written(written);
                return Err(err);
            }
            written += 1;
        }
        ems_telemetry::record_metrics_written(written);
        Ok(())
    }

    async fn read_to_map(
        &self,
        input: &ReadDeviceLatestDataInput,
        filter: Option<&HashMap<String, f64>>,
    ) -> Result<Vec<LatestRow>, TsdbError> {
        let device_ids = if input.device_ids.is_empty() {
            self.discover_devices(&input.device_model_name).await?
        } else {
            input.device_ids.clone()
        };

        let mut rows = Vec::new();
        for device_id in &device_ids {
            let hash = self
                .commands
                .hgetall(&latest_key(&input.device_model_name, device_id))
                .await?;
            if hash.is_empty() {
                continue;
            }
            let mut values = Map::new();
            let mut point_codes = Vec::new();
            let mut rejected = false;
            for point_code in &input.point_codes {
                let Some(raw) = hash.get(point_code) else {
                    continue;
                };
                let value = Value::String(raw.clone());
                if rejected_by_filter(filter, point_code, &value) {
                    rejected = true;
                    break;
                }
                let value = integer_value(&value).map(Value::from).unwrap_or(value);
                values.insert(point_code.clone(), value);
                point_codes.push(point_code.clone());
            }
            if rejected || point_codes.is_empty() {
                continue;
            }
            if input.output.with_device {
                values.insert(COLUMN_ALIAS_DEVICE.to_string(), Value::from(device_id.as_str()));
            }
            if input.output.with_timestamp {
                if let Some(timestamp) = hash
                    .get(COLUMN_TIMESTAMP)
                    .and_then(|raw| raw.parse::<i64>().ok())
                {
                    values.insert(COLUMN_TIMESTAMP.to_string(), Value::from(timestamp));
                }
            }
            rows.push(LatestRow {
                values,
                point_codes,
            });
        }
        Ok(rows)
    }

    async fn read_to_series(
        &self,
        input: &ReadDeviceSeriesDataInput,
    ) -> Result<SeriesData, TsdbError> {
        let interval = parse_duration(&input.interval)
            .map_err(|err| TsdbError::InvalidInput(err.to_string()))?;
        if input.end_time < input.start_time {
            return Err(TsdbError::InvalidInput(format!(
                "end time {} is before start time {}",
                input.end_time, input.start_time
            )));
        }
        let start = input.start_time.saturating_mul(1000).to_string();
        let end = input.end_time.saturating_mul(1000).to_string();

        let mut series = Vec::with_capacity(input.device_ids.len() * input.point_codes.len());
        for device_id in &input.device_ids {
            for point_code in &input.point_codes {
                let entries = self
                    .commands
                    .xrange(&stream_key(device_id, point_code), &start, &end)
                    .await?;
                let points = entries
                    .iter()
                    .filter_map(|entry| {
                        let point = decode_entry(entry);
                        if point.is_none() {
                            ems_telemetry::record_stream_entry_dropped();
                        }
                        point
                    })
                    .collect();
                series.push(PointSeries {
                    device_id: device_id.clone(),
                    point_code: point_code.clone(),
                    points,
                });
            }
        }

        let grid = apply_time_window_and_fill(
            &series,
            input.start_time,
            input.end_time,
            interval,
            input.fill,
        )?;
        Ok(grid.into_series_data())
    }

    async fn create_stable(
        &self,
        _stable_name: &str,
        _columns: &[TdengineColumn],
    ) -> Result<(), TsdbError> {
        panic!("create_stable is not supported by the redis tsdb client")
    }
}
