//! TDengine 实现
//!
//! 通过 REST 接口执行 SQL，通过 InfluxDB 兼容接口写入行协议。
//!
//! 初始化流程：
//! 1. 校验连接参数，解析保留时长与实时窗口
//! 2. 探测 `SHOW CREATE DATABASE`
//!    - 855（认证失败）：首次部署，用默认密码 `taosdata` 修改密码后建库
//!    - 904（库不存在）：直接建库
//!    - 其他：不做处理
//! 3. 释放一次空闲连接
//! 4. `SELECT SERVER_STATUS()` 健康检查

mod transport;

pub use transport::{Credentials, HttpReply, REQUEST_TIMEOUT, ReqwestTransport, TdengineTransport};

use crate::error::TsdbError;
use crate::line_protocol;
use crate::models::{LatestRow, SeriesData, TdengineColumn, TdengineHttpOutput};
use crate::query::{
    self, COLUMN_ALIAS_DEVICE, COLUMN_ALIAS_PROJECT, COLUMN_TIMESTAMP, LatestQuery, SeriesQuery,
};
use crate::traits::Client;
use crate::validation::{ensure_connection_fields, rejected_by_filter, value_as_f64};
use async_trait::async_trait;
use domain::{ClientType, Metric, ReadDeviceLatestDataInput, ReadDeviceSeriesDataInput};
use ems_config::{
    ResolvedDuration, TsdbConfig, parse_duration, resolve_data_keep, resolve_real_time_window,
};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// 认证失败
pub const CODE_AUTH_FAILURE: i64 = 855;
/// 数据库不存在
pub const CODE_DATABASE_NOT_EXIST: i64 = 904;
/// 数据库已存在
pub const CODE_DATABASE_EXISTS: i64 = 897;
/// 出厂默认密码
pub const DEFAULT_PASSWORD: &str = "taosdata";

const HEALTH_CHECK_SQL: &str = "SELECT SERVER_STATUS()";

#[derive(Debug, Clone)]
struct TdengineSettings {
    base_url: String,
    database: String,
    credentials: Credentials,
    data_keep: ResolvedDuration,
    real_time_window: ResolvedDuration,
}

impl TdengineSettings {
    fn sql_url(&self) -> String {
        format!("{}/rest/sql/{}", self.base_url, self.database)
    }

    fn admin_url(&self) -> String {
        format!("{}/rest/sql", self.base_url)
    }

    fn write_url(&self) -> String {
        format!("{}/influxdb/v1/write?db={}", self.base_url, self.database)
    }
}

/// TDengine 时序客户端
pub struct TdengineClient {
    transport: Arc<dyn TdengineTransport>,
    settings: RwLock<Option<TdengineSettings>>,
    init_lock: tokio::sync::Mutex<()>,
}

impl TdengineClient {
    pub fn new(transport: Arc<dyn TdengineTransport>) -> Self {
        Self {
            transport,
            settings: RwLock::new(None),
            init_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn with_reqwest() -> Result<Self, TsdbError> {
        Ok(Self::new(Arc::new(ReqwestTransport::new()?)))
    }

    fn settings(&self) -> Result<TdengineSettings, TsdbError> {
        self.settings
            .read()
            .map_err(|_| TsdbError::Lock)?
            .clone()
            .ok_or(TsdbError::NotInitialized)
    }

    /// 执行 SQL 并解析响应信封，不检查 code。
    async fn exec(
        &self,
        url: &str,
        credentials: &Credentials,
        sql: &str,
    ) -> Result<TdengineHttpOutput, TsdbError> {
        tracing::debug!(target: "ems.tsdb", sql = %sql, "execute tdengine sql");
        let reply = self
            .transport
            .post(url, credentials, sql.to_string())
            .await?;
        match serde_json::from_str::<TdengineHttpOutput>(&reply.body) {
            Ok(output) => Ok(output),
            Err(_) if reply.is_error() => Err(TsdbError::Transport(format!(
                "http status {}: {}",
                reply.status, reply.body
            ))),
            Err(err) => Err(err.into()),
        }
    }

    /// 在配置的数据库上执行查询，非零 code 返回 `Backend`。
    async fn query(
        &self,
        settings: &TdengineSettings,
        sql: &str,
    ) -> Result<TdengineHttpOutput, TsdbError> {
        let output = self
            .exec(&settings.sql_url(), &settings.credentials, sql)
            .await?;
        if output.code != 0 {
            return Err(TsdbError::Backend {
                code: output.code,
                desc: output.desc_or_empty(),
            });
        }
        Ok(output)
    }

    async fn provision(&self, settings: &TdengineSettings) -> Result<(), TsdbError> {
        let probe = self
            .exec(
                &settings.admin_url(),
                &settings.credentials,
                &format!("SHOW CREATE DATABASE {}", query::quote(&settings.database)),
            )
            .await?;
        match probe.code {
            CODE_AUTH_FAILURE => {
                tracing::info!(target: "ems.tsdb", user = %settings.credentials.username, "first start detected, changing default password");
                self.change_password(settings).await?;
                self.create_database(settings).await
            }
            CODE_DATABASE_NOT_EXIST => {
                tracing::info!(target: "ems.tsdb", database = %settings.database, "database not found, creating");
                self.create_database(settings).await
            }
            code => {
                tracing::info!(target: "ems.tsdb", code, database = %settings.database, "database already provisioned");
                Ok(())
            }
        }
    }

    async fn change_password(&self, settings: &TdengineSettings) -> Result<(), TsdbError> {
        let default_credentials =
            Credentials::new(settings.credentials.username.clone(), DEFAULT_PASSWORD);
        let sql = format!(
            "ALTER USER {} PASS '{}'",
            settings.credentials.username, settings.credentials.password
        );
        let output = self
            .exec(&settings.admin_url(), &default_credentials, &sql)
            .await
            .map_err(|err| TsdbError::Provision(format!("change password: {}", err)))?;
        if output.code != 0 {
            return Err(TsdbError::Provision(format!(
                "change password: code {} {}",
                output.code,
                output.desc_or_empty()
            )));
        }
        tracing::info!(target: "ems.tsdb", user = %settings.credentials.username, "default password changed");
        Ok(())
    }

    async fn create_database(&self, settings: &TdengineSettings) -> Result<(), TsdbError> {
        let sql = query::create_database(&settings.database, &settings.data_keep.text);
        let output = self
            .exec(&settings.admin_url(), &settings.credentials, &sql)
            .await
            .map_err(|err| TsdbError::Provision(format!("create database: {}", err)))?;
        match output.code {
            0 | CODE_DATABASE_EXISTS => {
                tracing::info!(target: "ems.tsdb", database = %settings.database, keep = %settings.data_keep.text, "database ready");
                Ok(())
            }
            code => Err(TsdbError::Provision(format!(
                "create database: code {} {}",
                code,
                output.desc_or_empty()
            ))),
        }
    }

    async fn check_health(&self, settings: &TdengineSettings) -> Result<(), TsdbError> {
        let output = self
            .exec(&settings.admin_url(), &settings.credentials, HEALTH_CHECK_SQL)
            .await
            .map_err(|err| TsdbError::Unhealthy(err.to_string()))?;
        if output.code != 0 {
            return Err(TsdbError::Unhealthy(format!(
                "code {} {}",
                output.code,
                output.desc_or_empty()
            )));
        }
        match output.data.as_slice() {
            [row] if row.len() == 1 && value_as_f64(&row[0]) == Some(1.0) => Ok(()),
            _ => Err(TsdbError::Unhealthy(format!(
                "unexpected server status: {:?}",
                output.data
            ))),
        }
    }
}

/// `_ts` 列：RFC 3339 文本或数值毫秒。
fn timestamp_ms(value: &Value) -> Option<i64> {
    match value {
        Value::String(text) => chrono::DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|time| time.timestamp_millis()),
        Value::Number(number) => number.as_i64(),
        _ => None,
    }
}

fn reshape_latest_row(
    columns: &[String],
    row: Vec<Value>,
    filter: Option<&HashMap<String, f64>>,
) -> Option<LatestRow> {
    let mut values = Map::new();
    let mut point_codes = Vec::new();
    for (column, value) in columns.iter().zip(row) {
        match column.as_str() {
            COLUMN_TIMESTAMP => {
                let timestamp = timestamp_ms(&value).map(Value::from).unwrap_or(Value::Null);
                values.insert(column.clone(), timestamp);
            }
            COLUMN_ALIAS_DEVICE | COLUMN_ALIAS_PROJECT => {
                values.insert(column.clone(), value);
            }
            point_code => {
                if rejected_by_filter(filter, point_code, &value) {
                    return None;
                }
                values.insert(column.clone(), value);
                point_codes.push(column.clone());
            }
        }
    }
    Some(LatestRow {
        values,
        point_codes,
    })
}

#[async_trait]
impl Client for TdengineClient {
    async fn init(&self, config: &TsdbConfig) -> Result<(), TsdbError> {
        let _guard = self.init_lock.lock().await;
        ensure_connection_fields(config)?;
        let settings = TdengineSettings {
            base_url: format!("http://{}:{}", config.host, config.port),
            database: config.database.clone(),
            credentials: Credentials::new(config.username.clone(), config.password.clone()),
            data_keep: resolve_data_keep(&config.data_keep, ClientType::Tdengine),
            real_time_window: resolve_real_time_window(&config.real_time_window),
        };

        self.provision(&settings).await?;
        self.transport.close_idle_connections();
        self.check_health(&settings).await?;

        tracing::info!(
            target: "ems.tsdb",
            url = %settings.base_url,
            database = %settings.database,
            data_keep = %settings.data_keep.text,
            real_time_window = %settings.real_time_window.text,
            "tdengine tsdb client initialized"
        );
        *self.settings.write().map_err(|_| TsdbError::Lock)? = Some(settings);
        Ok(())
    }

    async fn is_healthy(&self) -> bool {
        let settings = match self.settings() {
            Ok(settings) => settings,
            Err(_) => return false,
        };
        match self.check_health(&settings).await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(target: "ems.tsdb", error = %err, "tdengine health check failed");
                false
            }
        }
    }

    async fn write(&self, metrics: &[Metric]) -> Result<(), TsdbError> {
        let settings = self.settings()?;
        let writable = metrics.iter().filter(|metric| metric.is_writable()).count();
        for _ in writable..metrics.len() {
            ems_telemetry::record_metric_skipped();
        }
        let body = line_protocol::serialize(metrics);
        if body.is_empty() {
            return Ok(());
        }
        let reply = match self
            .transport
            .post(&settings.write_url(), &settings.credentials, body)
            .await
        {
            Ok(reply) => reply,
            Err(err) => {
                ems_telemetry::record_write_failure();
                return Err(err);
            }
        };
        if reply.is_error() {
            ems_telemetry::record_write_failure();
            tracing::error!(target: "ems.tsdb", status = reply.status, body = %reply.body, "tdengine write rejected");
            return Ok(());
        }
        ems_telemetry::record_metrics_written(writable as u64);
        Ok(())
    }

    async fn read_to_map(
        &self,
        input: &ReadDeviceLatestDataInput,
        filter: Option<&HashMap<String, f64>>,
    ) -> Result<Vec<LatestRow>, TsdbError> {
        let settings = self.settings()?;
        let sql = query::latest_query(&LatestQuery {
            model: &input.device_model_name,
            device_ids: &input.device_ids,
            point_codes: &input.point_codes,
            real_time_window: &settings.real_time_window.text,
            with_timestamp: input.output.with_timestamp,
            with_device: input.output.with_device,
            with_project: input.output.with_project,
        });
        let output = self.query(&settings, &sql).await?;
        let columns = output.column_names();
        Ok(output
            .data
            .into_iter()
            .filter_map(|row| reshape_latest_row(&columns, row, filter))
            .collect())
    }

    async fn read_to_series(
        &self,
        input: &ReadDeviceSeriesDataInput,
    ) -> Result<SeriesData, TsdbError> {
        if input.device_ids.len() < 2 {
            return Err(TsdbError::Unsupported(
                "data series for multiple devices is not supported".to_string(),
            ));
        }
        let settings = self.settings()?;
        let interval = parse_duration(&input.interval)
            .map_err(|err| TsdbError::InvalidInput(err.to_string()))?;
        let interval = query::duration_literal(&input.interval, interval);
        let sql = query::series_query(&SeriesQuery {
            model: &input.device_model_name,
            device_id: &input.device_ids[0],
            point_codes: &input.point_codes,
            start_ms: input.start_time.saturating_mul(1000),
            end_ms: input.end_time.saturating_mul(1000),
            interval: &interval,
            fill: input.fill.as_str(),
        });
        let output = self.query(&settings, &sql).await?;
        if output.data.is_empty() {
            return Ok(SeriesData::default());
        }

        let mut timestamps = Vec::with_capacity(output.data.len());
        let mut series = vec![Vec::with_capacity(output.data.len()); input.point_codes.len()];
        for row in output.data {
            let mut cells = row.into_iter();
            let window_start = cells.next().unwrap_or(Value::Null);
            let timestamp = timestamp_ms(&window_start).ok_or_else(|| {
                TsdbError::Decode(format!("invalid window timestamp: {}", window_start))
            })?;
            timestamps.push(timestamp);
            for column in series.iter_mut() {
                column.push(cells.next().unwrap_or(Value::Null));
            }
        }
        Ok(SeriesData { series, timestamps })
    }

    async fn create_stable(
        &self,
        stable_name: &str,
        columns: &[TdengineColumn],
    ) -> Result<(), TsdbError> {
        let settings = self.settings()?;
        let sql = query::create_stable(stable_name, columns);
        let output = self
            .exec(&settings.sql_url(), &settings.credentials, &sql)
            .await?;
        if output.code != 0 {
            return Err(TsdbError::Provision(format!(
                "create stable {}: code {} {}",
                stable_name,
                output.code,
                output.desc_or_empty()
            )));
        }
        tracing::info!(target: "ems.tsdb", stable = %stable_name, "stable ready");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn timestamp_ms_accepts_rfc3339_and_numbers() {
        assert_eq!(
            timestamp_ms(&json!("2024-01-01T00:00:01.500Z")),
            Some(1_704_067_201_500)
        );
        assert_eq!(
            timestamp_ms(&json!("2024-01-01T08:00:01.500+08:00")),
            Some(1_704_067_201_500)
        );
        assert_eq!(timestamp_ms(&json!(1_704_067_201_500i64)), Some(1_704_067_201_500));
        assert_eq!(timestamp_ms(&json!("not a time")), None);
    }
}
