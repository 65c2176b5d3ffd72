//! TDengine HTTP 传输层
//!
//! 所有请求都是带 Basic 认证的 POST，响应按状态码与原始文本返回，
//! 由上层解析 JSON 信封。

use crate::error::TsdbError;
use async_trait::async_trait;
use std::sync::RwLock;
use std::time::Duration;

/// 单次请求超时
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Basic 认证凭据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// HTTP 响应
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn is_error(&self) -> bool {
        self.status >= 400
    }
}

/// HTTP 传输接口
#[async_trait]
pub trait TdengineTransport: Send + Sync {
    async fn post(
        &self,
        url: &str,
        credentials: &Credentials,
        body: String,
    ) -> Result<HttpReply, TsdbError>;

    /// 释放空闲连接
    fn close_idle_connections(&self);
}

/// 基于 reqwest 的传输实现
pub struct ReqwestTransport {
    client: RwLock<reqwest::Client>,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TsdbError> {
        Ok(Self {
            client: RwLock::new(build_client()?),
        })
    }

    fn client(&self) -> Result<reqwest::Client, TsdbError> {
        self.client
            .read()
            .map(|client| client.clone())
            .map_err(|_| TsdbError::Lock)
    }
}

fn build_client() -> Result<reqwest::Client, TsdbError> {
    let client = reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()?;
    Ok(client)
}

#[async_trait]
impl TdengineTransport for ReqwestTransport {
    async fn post(
        &self,
        url: &str,
        credentials: &Credentials,
        body: String,
    ) -> Result<HttpReply, TsdbError> {
        let response = self
            .client()?
            .post(url)
            .basic_auth(&credentials.username, Some(&credentials.password))
            .body(body)
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(HttpReply { status, body })
    }

    // reqwest 没有显式关闭空闲连接的接口，重建 Client 后旧连接池随引用释放。
    fn close_idle_connections(&self) {
        let client = match build_client() {
            Ok(client) => client,
            Err(err) => {
                tracing::warn!(target: "ems.tsdb", error = %err, "rebuild http client failed");
                return;
            }
        };
        match self.client.write() {
            Ok(mut slot) => *slot = client,
            Err(_) => tracing::warn!(target: "ems.tsdb", "http client lock poisoned"),
        }
    }
}
