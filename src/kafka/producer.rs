use crate::kafka::client::{BrokerClient, ClusterMetadata, OutboundRecord, TopicMetadata};
use crate::kafka::delivery::{DeliveryDispatcher, DeliveryId, DeliveryOutcome, DeliveryReceipt};
use crate::kafka::params::ConnectionParams;
use crate::kafka::pool::{ClusterConnection, ClusterConnector};
use crate::{Error, Result};
use async_trait::async_trait;
use rdkafka::client::ClientContext;
use rdkafka::config::RDKafkaLogLevel;
use rdkafka::error::KafkaError;
use rdkafka::message::Message;
use rdkafka::producer::{BaseRecord, DeliveryResult, Producer, ProducerContext, ThreadedProducer};
use rdkafka::types::RDKafkaErrorCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const FLUSH_ON_DROP: Duration = Duration::from_secs(5);

/// Client context that routes delivery reports to the connection's
/// dispatcher and forwards librdkafka logs into `tracing`.
pub struct DeliveryContext {
    cluster: String,
    deliveries: Arc<DeliveryDispatcher>,
}

impl ClientContext for DeliveryContext {
    fn log(&self, level: RDKafkaLogLevel, fac: &str, log_message: &str) {
        match level {
            RDKafkaLogLevel::Emerg
            | RDKafkaLogLevel::Alert
            | RDKafkaLogLevel::Critical
            | RDKafkaLogLevel::Error => {
                error!(cluster = %self.cluster, facility = fac, "librdkafka: {}", log_message)
            }
            RDKafkaLogLevel::Warning => {
                warn!(cluster = %self.cluster, facility = fac, "librdkafka: {}", log_message)
            }
            RDKafkaLogLevel::Notice | RDKafkaLogLevel::Info => {
                info!(cluster = %self.cluster, facility = fac, "librdkafka: {}", log_message)
            }
            RDKafkaLogLevel::Debug => {
                debug!(cluster = %self.cluster, facility = fac, "librdkafka: {}", log_message)
            }
        }
    }

    fn error(&self, error: KafkaError, reason: &str) {
        if error.rdkafka_error_code() == Some(RDKafkaErrorCode::Fatal) {
            let aborted = self.deliveries.fail_all(reason);
            error!(
                cluster = %self.cluster,
                aborted,
                "Fatal Kafka client error: {}: {}",
                error,
                reason
            );
        } else {
            debug!(cluster = %self.cluster, "Kafka client event: {}: {}", error, reason);
        }
    }
}

impl ProducerContext for DeliveryContext {
    type DeliveryOpaque = Box<DeliveryId>;

    fn delivery(&self, delivery_result: &DeliveryResult<'_>, delivery_id: Self::DeliveryOpaque) {
        let outcome = match delivery_result {
            Ok(message) => DeliveryOutcome::Delivered(DeliveryReceipt {
                topic: message.topic().to_string(),
                partition: message.partition(),
                offset: message.offset(),
            }),
            Err((error, _)) => DeliveryOutcome::Rejected(error.to_string()),
        };

        self.deliveries.resolve(*delivery_id, outcome);
    }
}

/// [`BrokerClient`] backed by an rdkafka `ThreadedProducer`.
///
/// The producer's polling thread drives delivery callbacks, so no task per
/// publish call is needed.
pub struct KafkaClient {
    cluster: String,
    producer: Arc<ThreadedProducer<DeliveryContext>>,
}

#[async_trait]
impl BrokerClient for KafkaClient {
    async fn fetch_metadata(
        &self,
        topic: Option<&str>,
        timeout: Duration,
    ) -> Result<ClusterMetadata> {
        let producer = Arc::clone(&self.producer);
        let topic = topic.map(str::to_owned);

        tokio::task::spawn_blocking(move || {
            let metadata = producer
                .client()
                .fetch_metadata(topic.as_deref(), timeout)
                .map_err(|e| Error::Metadata(e.to_string()))?;

            Ok(ClusterMetadata {
                brokers: metadata.brokers().len(),
                topics: metadata
                    .topics()
                    .iter()
                    .map(|topic| TopicMetadata {
                        name: topic.name().to_string(),
                        partitions: topic.partitions().len(),
                        error: topic.error().map(|e| RDKafkaErrorCode::from(e).to_string()),
                    })
                    .collect(),
            })
        })
        .await
        .map_err(|e| Error::Metadata(format!("metadata task failed: {}", e)))?
    }

    fn enqueue(&self, record: OutboundRecord<'_>) -> Result<()> {
        let mut base: BaseRecord<'_, [u8], [u8], Box<DeliveryId>> =
            BaseRecord::with_opaque_to(record.topic, Box::new(record.delivery_id))
                .payload(record.payload);
        if let Some(key) = record.key {
            base = base.key(key);
        }

        self.producer.send(base).map_err(|(e, _)| Error::Kafka(e))
    }
}

impl Drop for KafkaClient {
    fn drop(&mut self) {
        if let Err(e) = self.producer.flush(FLUSH_ON_DROP) {
            warn!(cluster = %self.cluster, "Failed to flush producer on shutdown: {}", e);
        }
    }
}

/// Opens real Kafka connections.
#[derive(Debug, Default, Clone, Copy)]
pub struct KafkaConnector;

impl ClusterConnector for KafkaConnector {
    fn connect(&self, cluster: &str, params: &ConnectionParams) -> Result<ClusterConnection> {
        #[cfg(not(feature = "ssl"))]
        if let Some(protocol) = params.get("security.protocol") {
            if protocol.to_ascii_uppercase().contains("SSL") {
                return Err(Error::Config(format!(
                    "cluster '{}' uses security.protocol {}, which needs a build with the \
                     `ssl` feature",
                    cluster, protocol
                )));
            }
        }

        let deliveries = Arc::new(DeliveryDispatcher::new());
        let context = DeliveryContext {
            cluster: cluster.to_string(),
            deliveries: Arc::clone(&deliveries),
        };

        let producer: ThreadedProducer<DeliveryContext> =
            params.client_config().create_with_context(context)?;

        info!(
            cluster,
            bootstrap_servers = params.get("bootstrap.servers").unwrap_or_default(),
            "Created Kafka producer"
        );

        let client = KafkaClient {
            cluster: cluster.to_string(),
            producer: Arc::new(producer),
        };

        Ok(ClusterConnection::new(cluster, Arc::new(client), deliveries))
    }
}
