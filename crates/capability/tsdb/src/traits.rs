//! Client 契约
//!
//! 所有后端实现同一组异步接口，调用方通过 `Arc<dyn Client>` 使用，
//! 不关心底层是 TDengine 还是 Redis。

use crate::error::TsdbError;
use crate::models::{LatestRow, SeriesData, TdengineColumn};
use async_trait::async_trait;
use domain::{Metric, ReadDeviceLatestDataInput, ReadDeviceSeriesDataInput};
use ems_config::TsdbConfig;
use std::collections::HashMap;

/// 时序存储客户端接口
#[async_trait]
pub trait Client: Send + Sync {
    /// 校验配置、完成后端初始化并通过健康检查
    async fn init(&self, config: &TsdbConfig) -> Result<(), TsdbError>;

    /// 健康检查；失败返回 false 而不是错误
    async fn is_healthy(&self) -> bool;

    /// 写入一批 Metric，不可写入的 Metric 会被静默跳过
    async fn write(&self, metrics: &[Metric]) -> Result<(), TsdbError>;

    /// 读取实时窗口内每个设备的最新值
    ///
    /// `filter` 中的点位只要有一个实际值与期望值不同，整行被丢弃；
    /// 未观测到的点位不参与过滤。
    async fn read_to_map(
        &self,
        input: &ReadDeviceLatestDataInput,
        filter: Option<&HashMap<String, f64>>,
    ) -> Result<Vec<LatestRow>, TsdbError>;

    /// 读取等间隔的时序数据
    async fn read_to_series(
        &self,
        input: &ReadDeviceSeriesDataInput,
    ) -> Result<SeriesData, TsdbError>;

    /// 创建超级表（仅 TDengine）
    ///
    /// 其他后端没有表的概念，调用即视为使用错误并直接 panic。
    async fn create_stable(
        &self,
        stable_name: &str,
        columns: &[TdengineColumn],
    ) -> Result<(), TsdbError>;
}
