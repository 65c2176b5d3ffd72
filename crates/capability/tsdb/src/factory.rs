//! 客户端工厂
//!
//! 由组合根持有，第一次 `create_client` 决定结果：
//! 之后无论请求哪种类型都返回同一个实例（或同一个错误）。

use crate::error::TsdbError;
use crate::redis::RedisClient;
use crate::tdengine::TdengineClient;
use crate::traits::Client;
use domain::ClientType;
use std::sync::{Arc, OnceLock};

/// 客户端构造函数
pub type ClientCreator = Box<dyn Fn() -> Result<Arc<dyn Client>, TsdbError> + Send + Sync>;

#[derive(Debug, Clone)]
enum CreateFailure {
    Unsupported { requested: ClientType, supported: String },
    Failed(String),
}

impl CreateFailure {
    fn to_error(&self) -> TsdbError {
        match self {
            CreateFailure::Unsupported {
                requested,
                supported,
            } => TsdbError::Unsupported(format!(
                "tsdb client type {} is not supported, supported types: {}",
                requested, supported
            )),
            CreateFailure::Failed(message) => TsdbError::Config(message.clone()),
        }
    }
}

/// 时序客户端工厂
pub struct ClientFactory {
    creators: Vec<(ClientType, ClientCreator)>,
    instance: OnceLock<Result<Arc<dyn Client>, CreateFailure>>,
}

impl ClientFactory {
    /// 注册 TDengine 与 Redis 两种后端。
    pub fn new(redis_client: redis::Client) -> Self {
        Self::empty()
            .with_creator(ClientType::Tdengine, || {
                let client: Arc<dyn Client> = Arc::new(TdengineClient::with_reqwest()?);
                Ok(client)
            })
            .with_creator(ClientType::Redis, move || {
                let client: Arc<dyn Client> =
                    Arc::new(RedisClient::from_client(redis_client.clone()));
                Ok(client)
            })
    }

    pub fn empty() -> Self {
        Self {
            creators: Vec::new(),
            instance: OnceLock::new(),
        }
    }

    /// 注册或替换某个类型的构造函数。
    pub fn with_creator<F>(mut self, client_type: ClientType, creator: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn Client>, TsdbError> + Send + Sync + 'static,
    {
        self.creators.retain(|(registered, _)| *registered != client_type);
        self.creators.push((client_type, Box::new(creator)));
        self
    }

    /// `[ tdengine ], [ redis ]`
    pub fn supported_types(&self) -> String {
        self.creators
            .iter()
            .map(|(client_type, _)| format!("[ {} ]", client_type))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn is_created(&self) -> bool {
        self.instance.get().is_some()
    }

    /// 返回单例客户端；首次调用的类型决定结果。
    pub fn create_client(&self, client_type: ClientType) -> Result<Arc<dyn Client>, TsdbError> {
        let created = self.instance.get_or_init(|| {
            let Some((_, creator)) = self
                .creators
                .iter()
                .find(|(registered, _)| *registered == client_type)
            else {
                tracing::error!(target: "ems.tsdb", client_type = %client_type, "unsupported tsdb client type");
                return Err(CreateFailure::Unsupported {
                    requested: client_type,
                    supported: self.supported_types(),
                });
            };
            match creator() {
                Ok(client) => {
                    tracing::info!(target: "ems.tsdb", client_type = %client_type, "tsdb client created");
                    Ok(client)
                }
                Err(err) => Err(CreateFailure::Failed(err.to_string())),
            }
        });
        match created {
            Ok(client) => Ok(Arc::clone(client)),
            Err(failure) => Err(failure.to_error()),
        }
    }
}
