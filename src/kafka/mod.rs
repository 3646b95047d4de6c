pub mod client;
pub mod delivery;
pub mod health;
pub mod params;
pub mod pool;
pub mod producer;
pub mod publisher;
pub mod serializer;
pub mod topic_manager;


pub use client::{BrokerClient, ClusterMetadata, OutboundRecord, TopicMetadata};
pub use delivery::{
    DeliveryDispatcher, DeliveryId, DeliveryOutcome, DeliveryReceipt, PendingDelivery,
};
pub use health::{ClusterHealth, HealthAggregator, HealthReport};
pub use params::{ClusterAuth, ConnectionParams};
pub use pool::{ClusterConnection, ClusterConnector, ClusterSet, ProducerPool};
pub use producer::{KafkaClient, KafkaConnector};
pub use publisher::{PublishCoordinator, PublishOutcome, PublishRequest};
pub use serializer::JsonSerializer;
pub use topic_manager::TopicManager;
