use crate::kafka::delivery::DeliveryId;
use crate::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Metadata for one topic as reported by a broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicMetadata {
    pub name: String,
    pub partitions: usize,
    /// Broker error text for this topic, if any.
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterMetadata {
    pub brokers: usize,
    pub topics: Vec<TopicMetadata>,
}

impl ClusterMetadata {
    pub fn topic(&self, name: &str) -> Option<&TopicMetadata> {
        self.topics.iter().find(|t| t.name == name)
    }
}

/// A message ready to be enqueued on a producer.
#[derive(Debug, Clone, Copy)]
pub struct OutboundRecord<'a> {
    pub topic: &'a str,
    pub key: Option<&'a [u8]>,
    pub payload: &'a [u8],
    /// Carried as the message opaque and handed back with the delivery
    /// report.
    pub delivery_id: DeliveryId,
}

/// One authenticated client connection to a Kafka cluster.
///
/// Implementations must be safe to share between concurrent requests.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    /// Fetches metadata for one topic, or for the whole cluster when
    /// `topic` is `None`.
    async fn fetch_metadata(
        &self,
        topic: Option<&str>,
        timeout: Duration,
    ) -> Result<ClusterMetadata>;

    /// Enqueues a record with automatic partition assignment.
    ///
    /// Returns once the record is queued locally; delivery is reported
    /// separately through the connection's dispatcher.
    fn enqueue(&self, record: OutboundRecord<'_>) -> Result<()>;
}
