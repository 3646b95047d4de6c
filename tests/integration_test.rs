mod common;

use common::test_config;
use kafka_producer_proxy::kafka::PublishRequest;
use kafka_producer_proxy::Gateway;
use serde_json::json;
use std::env;
use tempfile::TempDir;

/// Publishes through a real broker. Requires `TEST_KAFKA_BROKERS` and an
/// existing `TEST_KAFKA_TOPIC` (default `proxy-test`).
#[tokio::test]
#[ignore] // Requires running Kafka
async fn test_publish_to_real_kafka() {
    let brokers = env::var("TEST_KAFKA_BROKERS").unwrap_or_else(|_| "localhost:9092".to_string());
    let topic = env::var("TEST_KAFKA_TOPIC").unwrap_or_else(|_| "proxy-test".to_string());

    let dir = TempDir::new().unwrap();
    let secrets = json!({
        "apiToken": "integration",
        "kafkaSecrets": {
            "local": {
                "enable.idempotence": true,
                "bootstrap.servers": brokers,
                "security.protocol": "PLAINTEXT",
            }
        }
    });
    std::fs::write(dir.path().join("secrets.json"), secrets.to_string()).unwrap();

    let mut config = test_config(dir.path(), &["local"]);
    config.kafka.delivery_timeout_ms = 10_000;
    config.kafka.metadata_timeout_ms = 10_000;
    config.kafka.health_topic = Some(topic.clone());

    let services = Gateway::new(config).start().await.unwrap();
    let state = services.state;

    let report = state.health.check(&state.pool.current()).await;
    assert!(report.is_healthy(), "{}", report.detail());

    let request: PublishRequest = serde_json::from_value(json!({
        "cluster": "local",
        "topic": topic,
        "key": "integration",
        "data": {"source": "integration_test"},
    }))
    .unwrap();

    let receipt = state
        .publisher
        .publish(&state.pool.current(), &request)
        .await
        .unwrap();

    assert_eq!(receipt.topic, request.topic);
    assert!(receipt.offset >= 0);
}
