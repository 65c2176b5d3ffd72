//! 时序存储探针：按环境变量创建客户端，初始化后写入一条心跳并读回最新值。

use domain::{ClientType, Metric, ReadDeviceLatestDataInput};
use ems_config::TsdbConfig;
use ems_telemetry::init_tracing;
use ems_tsdb::ClientFactory;

const PROBE_MODEL: &str = "ems_probe";
const PROBE_DEVICE: &str = "probe";
const PROBE_POINT: &str = "alive";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    let config = TsdbConfig::from_env()?;
    init_tracing();

    let client_type = config.client_type.unwrap_or(ClientType::Redis);
    let factory = ClientFactory::new(redis::Client::open(config.redis_url.as_str())?);
    let client = factory.create_client(client_type)?;
    client.init(&config).await?;
    tracing::info!(target: "ems.tsdb", client_type = %client_type, healthy = client.is_healthy().await, "tsdb client ready");

    let heartbeat = Metric::new(PROBE_MODEL, chrono::Utc::now())
        .with_tag("device", PROBE_DEVICE)
        .with_field(PROBE_POINT, 1i64);
    client.write(&[heartbeat]).await?;

    let input = ReadDeviceLatestDataInput {
        device_ids: vec![PROBE_DEVICE.to_string()],
        device_model_name: PROBE_MODEL.to_string(),
        point_codes: vec![PROBE_POINT.to_string()],
        ..ReadDeviceLatestDataInput::default()
    };
    let rows = client.read_to_map(&input, None).await?;
    tracing::info!(target: "ems.tsdb", rows = rows.len(), "probe latest read");

    let counters = ems_telemetry::counters().snapshot();
    tracing::info!(target: "ems.tsdb", ?counters, "probe finished");
    Ok(())
}
