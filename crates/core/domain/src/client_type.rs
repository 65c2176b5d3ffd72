use crate::ParseError;
use std::fmt;
use std::str::FromStr;

/// 时序存储后端类型。
///
/// InfluxDB 两种类型仅保留名称，工厂不提供实现。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientType {
    Tdengine,
    Redis,
    InfluxdbOfficialV1,
    InfluxdbV1,
}

impl ClientType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientType::Tdengine => "tdengine",
            ClientType::Redis => "redis",
            ClientType::InfluxdbOfficialV1 => "influxdb_official_v1",
            ClientType::InfluxdbV1 => "influxdb_v1",
        }
    }
}

impl fmt::Display for ClientType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClientType {
    type Err = ParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "tdengine" => Ok(ClientType::Tdengine),
            "redis" => Ok(ClientType::Redis),
            "influxdb_official_v1" => Ok(ClientType::InfluxdbOfficialV1),
            "influxdb_v1" => Ok(ClientType::InfluxdbV1),
            _ => Err(ParseError::ClientType(value.to_string())),
        }
    }
}
