//! 时序客户端错误类型
//!
//! - 配置错误：初始化时缺少必填连接参数
//! - 初始化错误：修改密码、建库失败
//! - 传输错误：HTTP / Redis 通信失败，原样返回给调用方
//! - 解码错误：响应信封无法解析
//! - 不支持的操作：例如单设备时序查询

/// 时序客户端错误
#[derive(Debug, thiserror::Error)]
pub enum TsdbError {
    /// 配置错误
    #[error("invalid tsdb config: {0}")]
    Config(String),

    /// 初始化（修改密码/建库/建表）失败
    #[error("provisioning failed: {0}")]
    Provision(String),

    /// 健康检查失败
    #[error("tsdb server is unhealthy: {0}")]
    Unhealthy(String),

    /// 尚未调用 init
    #[error("tsdb client is not initialized")]
    NotInitialized,

    /// 传输错误
    #[error("transport error: {0}")]
    Transport(String),

    /// 服务端返回非零错误码
    #[error("tsdb backend error {code}: {desc}")]
    Backend { code: i64, desc: String },

    /// 解码错误
    #[error("decode error: {0}")]
    Decode(String),

    /// 参数错误
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// 不支持的操作或类型
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// 内部锁失败
    #[error("lock failed")]
    Lock,
}

impl From<reqwest::Error> for TsdbError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<redis::RedisError> for TsdbError {
    fn from(err: redis::RedisError) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for TsdbError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
