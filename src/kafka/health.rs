use crate::config::KafkaConfig;
use crate::kafka::pool::ClusterSet;
use futures::future::join_all;
use serde::Serialize;
use std::time::Duration;
use tracing::{instrument, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterHealth {
    pub cluster: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub clusters: Vec<ClusterHealth>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.clusters.iter().all(|c| c.error.is_none())
    }

    /// One line per failing cluster.
    pub fn detail(&self) -> String {
        self.clusters
            .iter()
            .filter_map(|c| c.error.as_ref().map(|e| format!("{}: {}\n", c.cluster, e)))
            .collect()
    }
}

/// Exercises the metadata path of every configured cluster.
pub struct HealthAggregator {
    clusters: Vec<String>,
    health_topic: Option<String>,
    timeout: Duration,
}

impl HealthAggregator {
    pub fn new(clusters: Vec<String>, health_topic: Option<String>, timeout: Duration) -> Self {
        Self {
            clusters,
            health_topic,
            timeout,
        }
    }

    pub fn from_config(config: &KafkaConfig) -> Self {
        Self::new(
            config.clusters.clone(),
            config.health_topic.clone(),
            config.health_timeout(),
        )
    }

    /// Checks every cluster, even after a failure, so one report names all
    /// broken clusters.
    #[instrument(skip_all)]
    pub async fn check(&self, set: &ClusterSet) -> HealthReport {
        let checks = self.clusters.iter().map(|cluster| async move {
            let result = match set.get(cluster) {
                Ok(connection) => connection
                    .client()
                    .fetch_metadata(self.health_topic.as_deref(), self.timeout)
                    .await
                    .map(|_| ()),
                Err(e) => Err(e),
            };

            let error = result.err().map(|e| {
                warn!(cluster = %cluster, "Health check failed: {}", e);
                e.to_string()
            });

            ClusterHealth {
                cluster: cluster.clone(),
                error,
            }
        });

        HealthReport {
            clusters: join_all(checks).await,
        }
    }
}
