use domain::ClientType;
use ems_tsdb::{Client, ClientFactory, InMemoryKvStore, RedisClient, TsdbError};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn counting_factory(calls: Arc<AtomicUsize>) -> ClientFactory {
    ClientFactory::empty()
        .with_creator(ClientType::Redis, move || {
            calls.fetch_add(1, Ordering::SeqCst);
            let client: Arc<dyn Client> =
                Arc::new(RedisClient::new(Arc::new(InMemoryKvStore::new())));
            Ok(client)
        })
        .with_creator(ClientType::Tdengine, || {
            Err(TsdbError::Config("tdengine disabled".to_string()))
        })
}

#[test]
fn default_factory_registers_both_backends() {
    let redis_client = redis::Client::open("redis://127.0.0.1:6379").expect("redis url");
    let factory = ClientFactory::new(redis_client);
    assert_eq!(factory.supported_types(), "[ tdengine ], [ redis ]");
    assert!(!factory.is_created());
}

#[tokio::test]
async fn first_created_client_is_reused_for_every_type() {
    let calls = Arc::new(AtomicUsize::new(0));
    let factory = counting_factory(calls.clone());

    let first = factory.create_client(ClientType::Redis).expect("redis");
    let second = factory.create_client(ClientType::Tdengine).expect("same instance");
    let third = factory.create_client(ClientType::InfluxdbV1).expect("same instance");

    assert!(Arc::ptr_eq(&first, &second));
    assert!(Arc::ptr_eq(&first, &third));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(factory.is_created());
}

#[test]
fn unsupported_type_is_remembered() {
    let redis_client = redis::Client::open("redis://127.0.0.1:6379").expect("redis url");
    let factory = ClientFactory::new(redis_client);

    let err = factory
        .create_client(ClientType::InfluxdbOfficialV1)
        .err()
        .expect("unsupported");
    match err {
        TsdbError::Unsupported(message) => {
            assert!(message.contains("influxdb_official_v1"));
            assert!(message.contains("[ tdengine ], [ redis ]"));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let err = factory.create_client(ClientType::Redis).err().expect("still unsupported");
    assert!(matches!(err, TsdbError::Unsupported(_)));
}

#[test]
fn creator_failure_is_remembered() {
    let calls = Arc::new(AtomicUsize::new(0));
    let factory = counting_factory(calls.clone());

    let err = factory.create_client(ClientType::Tdengine).err().expect("failure");
    assert!(matches!(err, TsdbError::Config(ref message) if message.contains("tdengine disabled")));
    assert!(factory.create_client(ClientType::Redis).is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn with_creator_replaces_existing_registration() {
    let factory = ClientFactory::empty()
        .with_creator(ClientType::Redis, || Err(TsdbError::Config("first".to_string())))
        .with_creator(ClientType::Redis, || Err(TsdbError::Config("second".to_string())));
    assert_eq!(factory.supported_types(), "[ redis ]");
    let err = factory.create_client(ClientType::Redis).err().expect("failure");
    assert!(matches!(err, TsdbError::Config(ref message) if message.contains("second")));
}
