use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use domain::{
    ClientType, FillOption, LatestOutputOptions, Metric, ReadDeviceLatestDataInput,
    ReadDeviceSeriesDataInput,
};
use ems_config::TsdbConfig;
use ems_tsdb::{
    Client, Credentials, HttpReply, SeriesData, TdengineClient, TdengineColumn, TdengineTransport,
    TsdbError,
};
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const SQL_URL: &str = "http://127.0.0.1:6041/rest/sql/ems";
const ADMIN_URL: &str = "http://127.0.0.1:6041/rest/sql";
const WRITE_URL: &str = "http://127.0.0.1:6041/influxdb/v1/write?db=ems";

#[derive(Debug, Clone)]
struct Request {
    url: String,
    credentials: Credentials,
    body: String,
}

#[derive(Default)]
struct ScriptedTransport {
    replies: Mutex<VecDeque<Result<HttpReply, TsdbError>>>,
    requests: Mutex<Vec<Request>>,
    closed: AtomicUsize,
}

impl ScriptedTransport {
    fn push(&self, reply: Result<HttpReply, TsdbError>) {
        self.replies.lock().expect("lock").push_back(reply);
    }

    fn push_json(&self, body: Value) {
        self.push(Ok(HttpReply {
            status: 200,
            body: body.to_string(),
        }));
    }

    fn requests(&self) -> Vec<Request> {
        self.requests.lock().expect("lock").clone()
    }

    fn bodies(&self) -> Vec<String> {
        self.requests().into_iter().map(|request| request.body).collect()
    }
}

#[async_trait]
impl TdengineTransport for ScriptedTransport {
    async fn post(
        &self,
        url: &str,
        credentials: &Credentials,
        body: String,
    ) -> Result<HttpReply, TsdbError> {
        self.requests.lock().expect("lock").push(Request {
            url: url.to_string(),
            credentials: credentials.clone(),
            body,
        });
        self.replies
            .lock()
            .expect("lock")
            .pop_front()
            .unwrap_or_else(|| Err(TsdbError::Transport("no scripted reply".to_string())))
    }

    fn close_idle_connections(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

fn config() -> TsdbConfig {
    TsdbConfig {
        client_type: Some(ClientType::Tdengine),
        host: "127.0.0.1".to_string(),
        port: 6041,
        username: "root".to_string(),
        password: "secret".to_string(),
        database: "ems".to_string(),
        ..TsdbConfig::default()
    }
}

fn code(code: i64) -> Value {
    json!({ "code": code, "desc": format!("code {}", code) })
}

fn healthy() -> Value {
    json!({
        "code": 0,
        "column_meta": [["server_status()", "INT", 4]],
        "data": [[1]],
        "rows": 1
    })
}

fn setup() -> (Arc<ScriptedTransport>, TdengineClient) {
    let transport = Arc::new(ScriptedTransport::default());
    let client = TdengineClient::new(transport.clone());
    (transport, client)
}

async fn initialized() -> (Arc<ScriptedTransport>, TdengineClient) {
    let (transport, client) = setup();
    transport.push_json(code(0));
    transport.push_json(healthy());
    client.init(&config()).await.expect("init");
    transport.requests.lock().expect("lock").clear();
    (transport, client)
}

fn latest_input(device_ids: &[&str], point_codes: &[&str]) -> ReadDeviceLatestDataInput {
    ReadDeviceLatestDataInput {
        device_ids: device_ids.iter().map(|id| id.to_string()).collect(),
        device_model_name: "meter".to_string(),
        point_codes: point_codes.iter().map(|code| code.to_string()).collect(),
        output: LatestOutputOptions::default(),
    }
}

fn series_input(device_ids: &[&str]) -> ReadDeviceSeriesDataInput {
    ReadDeviceSeriesDataInput {
        device_ids: device_ids.iter().map(|id| id.to_string()).collect(),
        device_model_name: "meter".to_string(),
        point_codes: vec!["ua".to_string(), "ub".to_string()],
        start_time: 1_704_067_200,
        end_time: 1_704_070_800,
        interval: "15m".to_string(),
        fill: FillOption::Prev,
    }
}

#[tokio::test]
async fn init_rejects_missing_connection_fields() {
    let (transport, client) = setup();
    let mut config = config();
    config.password.clear();

    let err = client.init(&config).await.expect_err("missing password");
    assert!(matches!(err, TsdbError::Config(ref message) if message == "password is required"));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn first_start_changes_password_then_creates_database() {
    let (transport, client) = setup();
    transport.push_json(code(855));
    transport.push_json(code(0));
    transport.push_json(code(897));
    transport.push_json(healthy());

    client.init(&config()).await.expect("init");

    let requests = transport.requests();
    assert_eq!(requests.len(), 4);
    assert_eq!(requests[0].url, ADMIN_URL);
    assert_eq!(requests[0].body, "SHOW CREATE DATABASE `ems`");
    assert_eq!(requests[0].credentials, Credentials::new("root", "secret"));
    assert_eq!(requests[1].url, ADMIN_URL);
    assert_eq!(requests[1].body, "ALTER USER root PASS 'secret'");
    assert_eq!(requests[1].credentials, Credentials::new("root", "taosdata"));
    assert_eq!(requests[2].url, ADMIN_URL);
    assert_eq!(
        requests[2].body,
        "CREATE DATABASE `ems` BUFFER 48 PAGES 128 DURATION 6h KEEP 1d"
    );
    assert_eq!(requests[2].credentials, Credentials::new("root", "secret"));
    assert_eq!(requests[3].body, "SELECT SERVER_STATUS()");
    assert_eq!(transport.closed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn missing_database_is_created_without_password_change() {
    let (transport, client) = setup();
    transport.push_json(code(904));
    transport.push_json(code(0));
    transport.push_json(healthy());

    let mut config = config();
    config.data_keep = "7d".to_string();
    client.init(&config).await.expect("init");

    assert_eq!(
        transport.bodies(),
        vec![
            "SHOW CREATE DATABASE `ems`".to_string(),
            "CREATE DATABASE `ems` BUFFER 48 PAGES 128 DURATION 6h KEEP 168h".to_string(),
            "SELECT SERVER_STATUS()".to_string(),
        ]
    );
    let requests = transport.requests();
    assert_eq!(requests[0].url, ADMIN_URL);
    assert_eq!(requests[1].url, ADMIN_URL);
}

#[tokio::test]
async fn other_probe_codes_skip_provisioning() {
    let (transport, client) = setup();
    transport.push_json(code(0));
    transport.push_json(healthy());

    client.init(&config()).await.expect("init");
    assert_eq!(
        transport.bodies(),
        vec![
            "SHOW CREATE DATABASE `ems`".to_string(),
            "SELECT SERVER_STATUS()".to_string(),
        ]
    );
}

#[tokio::test]
async fn provisioning_failures_are_reported() {
    let (transport, client) = setup();
    transport.push_json(code(855));
    transport.push_json(code(855));
    let err = client.init(&config()).await.expect_err("password change");
    assert!(matches!(err, TsdbError::Provision(_)));

    let (transport, client) = setup();
    transport.push_json(code(904));
    transport.push(Err(TsdbError::Transport("connection reset".to_string())));
    let err = client.init(&config()).await.expect_err("create database");
    assert!(matches!(err, TsdbError::Provision(_)));

    let (transport, client) = setup();
    transport.push_json(code(904));
    transport.push_json(code(1));
    let err = client.init(&config()).await.expect_err("create database");
    assert!(matches!(err, TsdbError::Provision(_)));
    assert!(!client.is_healthy().await);
}

#[tokio::test]
async fn init_requires_healthy_server_status() {
    let (transport, client) = setup();
    transport.push_json(code(0));
    transport.push_json(json!({ "code": 0, "data": [[0]], "rows": 1 }));

    let err = client.init(&config()).await.expect_err("unhealthy");
    assert!(matches!(err, TsdbError::Unhealthy(_)));
    assert!(!client.is_healthy().await);
}

#[tokio::test]
async fn is_healthy_reports_probe_result() {
    let (transport, client) = initialized().await;
    transport.push_json(healthy());
    assert!(client.is_healthy().await);
    transport.push(Err(TsdbError::Transport("timeout".to_string())));
    assert!(!client.is_healthy().await);
}

#[tokio::test]
async fn operations_require_init() {
    let (transport, client) = setup();
    assert!(!client.is_healthy().await);
    let err = client
        .read_to_map(&latest_input(&["d1"], &["ua"]), None)
        .await
        .expect_err("not initialized");
    assert!(matches!(err, TsdbError::NotInitialized));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn write_posts_line_protocol() {
    let (transport, client) = initialized().await;
    let time = Utc.timestamp_opt(1, 0).single().expect("timestamp");
    let metrics = vec![
        Metric::new("meter", time)
            .with_tag("device", "d1")
            .with_field("ua", 220i64),
        Metric::new("meter", time).with_field("ua", 1i64),
    ];
    transport.push(Ok(HttpReply {
        status: 204,
        body: String::new(),
    }));
    client.write(&metrics).await.expect("write");

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url, WRITE_URL);
    assert_eq!(requests[0].body, "meter,device=d1 ua=220 1000000000");
}

#[tokio::test]
async fn write_tolerates_rejected_status_but_not_transport_errors() {
    let (transport, client) = initialized().await;
    let time = Utc.timestamp_opt(1, 0).single().expect("timestamp");
    let metric = Metric::new("meter", time)
        .with_tag("device", "d1")
        .with_field("ua", 1i64);

    transport.push(Ok(HttpReply {
        status: 500,
        body: "{\"code\":1}".to_string(),
    }));
    client.write(&[metric.clone()]).await.expect("status error is logged");

    transport.push(Err(TsdbError::Transport("connection refused".to_string())));
    let err = client.write(&[metric]).await.expect_err("transport error");
    assert!(matches!(err, TsdbError::Transport(_)));

    let empty = Metric::new("meter", time);
    client.write(&[empty]).await.expect("nothing to write");
    assert_eq!(transport.requests().len(), 2);
}

#[tokio::test]
async fn read_latest_reshapes_and_filters_rows() {
    let (transport, client) = initialized().await;
    transport.push_json(json!({
        "code": 0,
        "column_meta": [["_ts", "TIMESTAMP", 8], ["deviceId", "NCHAR", 16], ["ua", "DOUBLE", 8], ["ub", "DOUBLE", 8]],
        "data": [
            ["2024-01-01T00:00:01.500Z", "d1", 220.0, null],
            ["2024-01-01T00:00:02.000Z", "d2", 230.0, 1.0]
        ],
        "rows": 2
    }));

    let filter = HashMap::from([("ua".to_string(), 220.0), ("ub".to_string(), 1.0)]);
    let rows = client
        .read_to_map(&latest_input(&["d1", "d2"], &["ua", "ub"]), Some(&filter))
        .await
        .expect("read");

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].values.get("_ts"), Some(&json!(1_704_067_201_500i64)));
    assert_eq!(rows[0].values.get("deviceId"), Some(&json!("d1")));
    assert_eq!(rows[0].values.get("ua"), Some(&json!(220.0)));
    assert_eq!(rows[0].point_codes, vec!["ua", "ub"]);
    assert_eq!(
        transport.bodies()[0],
        "SELECT last(`_ts`) as `_ts`, `device` as `deviceId`, last(`ua`) as `ua`, last(`ub`) as `ub` \
         FROM `meter` WHERE `device` IN ('d1', 'd2') AND `_ts`>NOW-1m PARTITION BY `device`"
    );
}

#[tokio::test]
async fn read_latest_surfaces_backend_errors() {
    let (transport, client) = initialized().await;
    transport.push_json(json!({ "code": 9730, "desc": "Table does not exist" }));
    let err = client
        .read_to_map(&latest_input(&[], &["ua"]), None)
        .await
        .expect_err("backend error");
    assert!(matches!(err, TsdbError::Backend { code: 9730, .. }));
}

#[tokio::test]
async fn read_series_requires_two_device_ids() {
    let (transport, client) = initialized().await;
    let err = client
        .read_to_series(&series_input(&["d1"]))
        .await
        .expect_err("unsupported");
    assert!(matches!(err, TsdbError::Unsupported(_)));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn read_series_queries_first_device() {
    let (transport, client) = initialized().await;
    transport.push_json(json!({
        "code": 0,
        "column_meta": [["_wstart", "TIMESTAMP", 8], ["ua", "DOUBLE", 8], ["ub", "DOUBLE", 8]],
        "data": [
            ["2024-01-01T00:00:00.000Z", 1.0, null],
            ["2024-01-01T00:15:00.000Z", 2.0, 3.0]
        ],
        "rows": 2
    }));

    let data = client
        .read_to_series(&series_input(&["d1", "d2"]))
        .await
        .expect("series");
    assert_eq!(data.timestamps, vec![1_704_067_200_000, 1_704_068_100_000]);
    assert_eq!(
        data.series,
        vec![vec![json!(1.0), json!(2.0)], vec![Value::Null, json!(3.0)]]
    );
    assert_eq!(
        transport.bodies()[0],
        "SELECT _wstart, last(`ua`) as `ua`, last(`ub`) as `ub` FROM `meter` \
         WHERE `device`='d1' AND `_ts` >= 1704067200000 AND `_ts` <= 1704070800000 INTERVAL(15m) FILL(PREV)"
    );

    transport.push_json(json!({ "code": 0, "data": [], "rows": 0 }));
    let data = client
        .read_to_series(&series_input(&["d1", "d2"]))
        .await
        .expect("empty");
    assert_eq!(data, SeriesData::default());
}

#[tokio::test]
async fn read_series_rejects_bad_interval() {
    let (_transport, client) = initialized().await;
    let mut input = series_input(&["d1", "d2"]);
    input.interval = "fifteen".to_string();
    let err = client.read_to_series(&input).await.expect_err("bad interval");
    assert!(matches!(err, TsdbError::InvalidInput(_)));
}

#[tokio::test]
async fn create_stable_issues_ddl() {
    let (transport, client) = initialized().await;
    transport.push_json(code(0));
    client
        .create_stable(
            "meter",
            &[TdengineColumn::new("ua", "9"), TdengineColumn::new("on", "12")],
        )
        .await
        .expect("create stable");
    let requests = transport.requests();
    assert_eq!(requests[0].url, SQL_URL);
    assert_eq!(
        requests[0].body,
        "CREATE STABLE IF NOT EXISTS `meter` (`_ts` TIMESTAMP, `ua` DOUBLE, `on` BOOL) \
         TAGS (`device` NCHAR(16), `project` NCHAR(16))"
    );

    transport.push_json(code(2600));
    let err = client.create_stable("meter", &[]).await.expect_err("ddl failure");
    assert!(matches!(err, TsdbError::Provision(_)));
}
