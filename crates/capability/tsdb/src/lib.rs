//! # EMS 时序存储客户端
//!
//! 为采集与查询链路提供统一的时序读写接口，后端可替换。
//!
//! ## 架构设计
//!
//! 1. **接口抽象层** (`traits.rs`)：`Client` 异步接口，调用方只持有 `Arc<dyn Client>`
//! 2. **工厂** (`factory.rs`)：按 `ClientType` 构造单例客户端
//! 3. **数据模型层** (`models.rs`)：响应信封、读取结果
//! 4. **错误处理层** (`error.rs`)：统一的 `TsdbError`
//! 5. **实现层**：
//!    - `tdengine/`：REST SQL + InfluxDB 行协议写入，首次启动自动改密码与建库
//!    - `redis/`：Stream 保存时序、Hash 保存最新值，后台任务按保留时长裁剪
//!    - `in_memory/`：键值命令内存实现（用于测试和演示）
//!
//! ## 纯函数模块
//!
//! - [`query`]：TDengine SQL 拼接
//! - [`line_protocol`]：行协议序列化
//! - [`stream`]：Stream 条目解码
//! - [`window`]：时间窗口对齐与空窗口裁剪
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! use domain::ClientType;
//! use ems_config::TsdbConfig;
//! use ems_tsdb::ClientFactory;
//!
//! let config = TsdbConfig::from_env()?;
//! let factory = ClientFactory::new(redis::Client::open(config.redis_url.as_str())?);
//! let client = factory.create_client(ClientType::Redis)?;
//! client.init(&config).await?;
//! client.write(&metrics).await?;
//! ```
//!
//! ## 约束
//!
//! - 查询语句只做引号包裹，设备 ID、点位编码、模型名必须是安全标识符
//! - 设备 ID 为空时 Redis 后端通过 SCAN 发现设备，不区分租户/项目

pub mod error;
pub mod factory;
pub mod in_memory;
pub mod line_protocol;
pub mod models;
pub mod query;
pub mod redis;
pub mod scheduler;
pub mod stream;
pub mod tdengine;
pub mod traits;
pub mod validation;
pub mod window;

pub use error::*;
pub use factory::{ClientCreator, ClientFactory};
pub use in_memory::InMemoryKvStore;
pub use models::*;
pub use self::redis::{KvCommandClient, RedisClient, RedisCommandClient};
pub use tdengine::{Credentials, HttpReply, ReqwestTransport, TdengineClient, TdengineTransport};
pub use traits::*;
pub use window::{PointSeries, WindowGrid, WindowedSeries, apply_time_window_and_fill};
