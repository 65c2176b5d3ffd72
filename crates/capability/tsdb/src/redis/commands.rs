//! Redis 命令接口
//!
//! `RedisClient` 只依赖这里列出的命令，生产环境使用 `RedisCommandClient`，
//! 测试使用 `InMemoryKvStore`。

use crate::error::TsdbError;
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::OnceCell;

/// SCAN 每页数量
pub const SCAN_COUNT: usize = 100;

/// 键值命令接口
#[async_trait]
pub trait KvCommandClient: Send + Sync {
    async fn ping(&self) -> Result<(), TsdbError>;

    async fn hset_multiple(&self, key: &str, fields: &[(String, String)])
    -> Result<(), TsdbError>;

    /// 键不存在时返回空表
    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, TsdbError>;

    async fn expire(&self, key: &str, seconds: u64) -> Result<(), TsdbError>;

    /// `id` 支持 `*`、`{ms}-*` 与 `{ms}-{seq}`，返回实际写入的条目 ID
    async fn xadd(
        &self,
        key: &str,
        id: &str,
        field: &str,
        value: &str,
    ) -> Result<String, TsdbError>;

    /// 条目转换为 JSON：`[id, [field, value, ...]]`
    async fn xrange(&self, key: &str, start: &str, end: &str) -> Result<Vec<Value>, TsdbError>;

    /// 删除 ID 小于 `min_id` 的条目，返回删除数量
    async fn xtrim_minid(&self, key: &str, min_id: &str) -> Result<u64, TsdbError>;

    /// 单页 SCAN，返回下一页游标（0 表示结束）
    async fn scan(
        &self,
        cursor: u64,
        pattern: Option<&str>,
        key_type: Option<&str>,
    ) -> Result<(u64, Vec<String>), TsdbError>;
}

/// 遍历 SCAN 直到游标归零。
pub async fn scan_all(
    commands: &dyn KvCommandClient,
    pattern: Option<&str>,
    key_type: Option<&str>,
) -> Result<Vec<String>, TsdbError> {
    let mut cursor = 0u64;
    let mut keys = Vec::new();
    loop {
        let (next_cursor, page) = commands.scan(cursor, pattern, key_type).await?;
        keys.extend(page);
        if next_cursor == 0 {
            break;
        }
        cursor = next_cursor;
    }
    Ok(keys)
}

/// 基于 `redis::Client` 的命令实现，多路复用连接懒加载后复用。
pub struct RedisCommandClient {
    client: redis::Client,
    connection: OnceCell<MultiplexedConnection>,
}

impl RedisCommandClient {
    pub fn new(client: redis::Client) -> Self {
        Self {
            client,
            connection: OnceCell::new(),
        }
    }

    pub fn connect(redis_url: &str) -> Result<Self, TsdbError> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self::new(client))
    }

    async fn connection(&self) -> Result<MultiplexedConnection, TsdbError> {
        let connection = self
            .connection
            .get_or_try_init(|| async { self.client.get_multiplexed_tokio_connection().await })
            .await?;
        Ok(connection.clone())
    }
}

#[async_trait]
impl KvCommandClient for RedisCommandClient {
    async fn ping(&self) -> Result<(), TsdbError> {
        let mut connection = self.connection().await?;
        let reply: String = redis::cmd("PING").query_async(&mut connection).await?;
        if reply != "PONG" {
            return Err(TsdbError::Unhealthy(format!("unexpected PING reply: {}", reply)));
        }
        Ok(())
    }

    async fn hset_multiple(
        &self,
        key: &str,
        fields: &[(String, String)],
    ) -> Result<(), TsdbError> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut connection = self.connection().await?;
        let mut command = redis::cmd("HSET");
        command.arg(key);
        for (field, value) in fields {
            command.arg(field).arg(value);
        }
        let _: i64 = command.query_async(&mut connection).await?;
        Ok(())
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, TsdbError> {
        let mut connection = self.connection().await?;
        let values: HashMap<String, String> = redis::cmd("HGETALL")
            .arg(key)
            .query_async(&mut connection)
            .await?;
        Ok(values)
    }

    async fn expire(&self, key: &str, seconds: u64) -> Result<(), TsdbError> {
        let mut connection = self.connection().await?;
        let _: i64 = redis::cmd("EXPIRE")
            .arg(key)
            .arg(seconds)
            .query_async(&mut connection)
            .await?;
        Ok(())
    }

    async fn xadd(
        &self,
        key: &str,
        id: &str,
        field: &str,
        value: &str,
    ) -> Result<String, TsdbError> {
        let mut connection = self.connection().await?;
        let entry_id: String = redis::cmd("XADD")
            .arg(key)
            .arg(id)
            .arg(field)
            .arg(value)
            .query_async(&mut connection)
            .await?;
        Ok(entry_id)
    }

    async fn xrange(&self, key: &str, start: &str, end: &str) -> Result<Vec<Value>, TsdbError> {
        let mut connection = self.connection().await?;
        let reply: redis::Value = redis::cmd("XRANGE")
            .arg(key)
            .arg(start)
            .arg(end)
            .query_async(&mut connection)
            .await?;
        match resp_to_json(reply) {
            Value::Array(entries) => Ok(entries),
            Value::Null => Ok(Vec::new()),
            other => Err(TsdbError::Decode(format!(
                "unexpected XRANGE reply: {}",
                other
            ))),
        }
    }

    async fn xtrim_minid(&self, key: &str, min_id: &str) -> Result<u64, TsdbError> {
        let mut connection = self.connection().await?;
        let removed: u64 = redis::cmd("XTRIM")
            .arg(key)
            .arg("MINID")
            .arg(min_id)
            .query_async(&mut connection)
            .await?;
        Ok(removed)
    }

    async fn scan(
        &self,
        cursor: u64,
        pattern: Option<&str>,
        key_type: Option<&str>,
    ) -> Result<(u64, Vec<String>), TsdbError> {
        let mut connection = self.connection().await?;
        let mut command = redis::cmd("SCAN");
        command.arg(cursor);
        if let Some(pattern) = pattern {
            command.arg("MATCH").arg(pattern);
        }
        command.arg("COUNT").arg(SCAN_COUNT);
        if let Some(key_type) = key_type {
            command.arg("TYPE").arg(key_type);
        }
        let (next_cursor, keys): (u64, Vec<String>) = command.query_async(&mut connection).await?;
        Ok((next_cursor, keys))
    }
}

/// RESP 回复转 JSON，二进制数据按 UTF-8 宽松解码。
pub fn resp_to_json(value: redis::Value) -> Value {
    match value {
        redis::Value::Nil => Value::Null,
        redis::Value::Int(number) => Value::from(number),
        redis::Value::Data(bytes) => Value::String(String::from_utf8_lossy(&bytes).into_owned()),
        redis::Value::Bulk(items) => Value::Array(items.into_iter().map(resp_to_json).collect()),
        redis::Value::Status(text) => Value::String(text),
        redis::Value::Okay => Value::String("OK".to_string()),
    }
}
