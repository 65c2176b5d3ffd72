//! 时序存储客户端共享的领域模型。
//!
//! - [`metric`]：带标签与字段的测量值（写入单元）
//! - [`input`]：最新值读取与时序读取参数、填充策略
//! - [`client_type`]：后端类型枚举

pub mod client_type;
pub mod input;
pub mod metric;

pub use client_type::ClientType;
pub use input::{
    FillOption, LatestOutputOptions, ReadDeviceLatestDataInput, ReadDeviceSeriesDataInput,
};
pub use metric::{FieldValue, Metric, MetricField, MetricTag};

/// 领域值解析错误。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("unknown client type: {0}")]
    ClientType(String),
    #[error("unknown fill option: {0}")]
    FillOption(String),
}
