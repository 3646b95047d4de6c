use crate::kafka::client::BrokerClient;
use crate::{Error, Result};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Checks topic existence before anything is sent.
///
/// Producing to a missing topic is accepted into the local queue without any
/// feedback, so the existence check is the only way to report it
/// synchronously.
pub struct TopicManager {
    timeout: Duration,
}

impl TopicManager {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    #[instrument(skip(self, client), fields(topic = %topic_name))]
    pub async fn ensure_topic_exists(
        &self,
        client: &dyn BrokerClient,
        topic_name: &str,
    ) -> Result<()> {
        let metadata = client.fetch_metadata(Some(topic_name), self.timeout).await?;

        let Some(topic) = metadata.topic(topic_name) else {
            return Err(Error::UnknownTopic {
                topic: topic_name.to_string(),
                detail: "Unknown topic: not present in cluster metadata".to_string(),
            });
        };

        match &topic.error {
            Some(detail) if detail.to_lowercase().contains("unknown") => Err(Error::UnknownTopic {
                topic: topic_name.to_string(),
                detail: detail.clone(),
            }),
            Some(detail) => {
                warn!("Topic '{}' reported a non-fatal error: {}", topic_name, detail);
                Ok(())
            }
            None => {
                debug!(
                    "Topic '{}' exists with {} partition(s)",
                    topic_name, topic.partitions
                );
                Ok(())
            }
        }
    }
}
