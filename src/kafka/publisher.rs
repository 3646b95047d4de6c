//! End-to-end publish of one HTTP request onto a Kafka topic.

use crate::config::KafkaConfig;
use crate::kafka::client::OutboundRecord;
use crate::kafka::delivery::DeliveryReceipt;
use crate::kafka::pool::ClusterSet;
use crate::kafka::serializer::JsonSerializer;
use crate::kafka::topic_manager::TopicManager;
use crate::{Error, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone, Deserialize)]
pub struct PublishRequest {
    pub cluster: String,
    pub topic: String,
    #[serde(default)]
    pub key: Value,
    #[serde(default)]
    pub data: Map<String, Value>,
    /// Overrides the configured delivery timeout for this request.
    #[serde(rename = "timeoutMs", default)]
    pub timeout_ms: Option<u64>,
}

impl PublishRequest {
    pub fn validate(&self) -> Result<()> {
        if self.cluster.trim().is_empty() {
            return Err(Error::InvalidRequest("'cluster' is required".to_string()));
        }
        if self.topic.trim().is_empty() {
            return Err(Error::InvalidRequest("'topic' is required".to_string()));
        }
        if self.timeout_ms == Some(0) {
            return Err(Error::InvalidRequest("'timeoutMs' must be greater than zero".to_string()));
        }
        Ok(())
    }
}

/// Outcome of one publish call.
pub type PublishOutcome = Result<DeliveryReceipt>;

pub struct PublishCoordinator {
    topics: TopicManager,
    delivery_timeout: Duration,
}

impl PublishCoordinator {
    pub fn new(metadata_timeout: Duration, delivery_timeout: Duration) -> Self {
        Self {
            topics: TopicManager::new(metadata_timeout),
            delivery_timeout,
        }
    }

    pub fn from_config(config: &KafkaConfig) -> Self {
        Self::new(config.metadata_timeout(), config.delivery_timeout())
    }

    /// Publishes `request` through the matching connection in `clusters`
    /// and waits for the broker's verdict.
    ///
    /// The completion listener is registered before the record is
    /// enqueued, so an early acknowledgment cannot be missed. A fatal
    /// client error fails every call waiting on that connection.
    ///
    /// # Errors
    ///
    /// - [`Error::ClusterNotFound`] if the cluster is not in `clusters`
    /// - [`Error::Metadata`] or [`Error::UnknownTopic`] if topic validation
    ///   fails; nothing is sent in that case
    /// - [`Error::Serialization`] or [`Error::Kafka`] if the record cannot
    ///   be encoded or queued
    /// - [`Error::Delivery`], [`Error::FatalClient`] or [`Error::Timeout`]
    ///   for the delivery itself
    #[instrument(
        skip(self, clusters, request),
        fields(cluster = %request.cluster, topic = %request.topic)
    )]
    pub async fn publish(&self, clusters: &ClusterSet, request: &PublishRequest) -> PublishOutcome {
        request.validate()?;

        let connection = clusters.get(&request.cluster)?;

        self.topics
            .ensure_topic_exists(connection.client(), &request.topic)
            .await?;

        let pending = connection.deliveries().register();

        let payload = JsonSerializer::serialize(&request.data)?;
        let key = JsonSerializer::encode_key(&request.key);

        connection.client().enqueue(OutboundRecord {
            topic: &request.topic,
            key: key.as_deref(),
            payload: &payload,
            delivery_id: pending.id(),
        })?;

        debug!(delivery_id = pending.id(), bytes = payload.len(), "Message enqueued");

        // A request may shorten the wait but never extend it past the
        // configured bound, which the HTTP request deadline is sized against.
        let timeout = request
            .timeout_ms
            .map(|ms| Duration::from_millis(ms).min(self.delivery_timeout))
            .unwrap_or(self.delivery_timeout);

        match tokio::time::timeout(timeout, pending.wait()).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(timeout_ms = timeout.as_millis() as u64, "Delivery confirmation timed out");
                Err(Error::Timeout {
                    message: format!(
                        "no delivery confirmation from '{}' for topic '{}' within {:?}",
                        connection.name(),
                        request.topic,
                        timeout
                    ),
                })
            }
        }
    }
}
