//! Error types and result handling for kafka-producer-proxy.
//!
//! This module defines the main error type [`Error`] and a convenience
//! [`Result`] type alias used throughout the crate.
//!
//! [`Error::Config`] halts the process at startup. [`Error::Decode`] is only
//! logged when it happens during a reload. Everything from
//! [`Error::ClusterNotFound`] onwards is returned to the HTTP caller.
//!
//! # Example
//!
//! ```rust
//! use kafka_producer_proxy::{Error, Result};
//!
//! fn lookup(cluster: &str) -> Result<()> {
//!     Err(Error::ClusterNotFound { cluster: cluster.to_string() })
//! }
//!
//! match lookup("missing") {
//!     Ok(()) => println!("found"),
//!     Err(Error::ClusterNotFound { cluster }) => eprintln!("no producer for {}", cluster),
//!     Err(e) => eprintln!("Other error: {}", e),
//! }
//! ```

use thiserror::Error;

/// The main error type for kafka-producer-proxy operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error, fatal at startup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A secrets or certificate document could not be decoded.
    ///
    /// The previously loaded state stays active when this is returned.
    #[error("Failed to decode {document}: {source}")]
    Decode {
        /// Which document failed to decode
        document: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// No producer is configured for the requested cluster.
    #[error("kafka producer with the name '{cluster}' was not found")]
    ClusterNotFound {
        /// The cluster name as supplied by the caller
        cluster: String,
    },

    /// The target topic does not exist on the resolved cluster.
    #[error("Topic '{topic}' rejected: {detail}")]
    UnknownTopic {
        /// The requested topic
        topic: String,
        /// Broker-provided detail
        detail: String,
    },

    /// A metadata query against a cluster failed.
    #[error("Metadata query failed: {0}")]
    Metadata(String),

    /// The request was malformed before reaching Kafka.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// JSON serialization error when encoding messages.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Kafka client creation or local enqueue error.
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    /// The broker rejected this specific message.
    #[error("Delivery failed: {0}")]
    Delivery(String),

    /// The client reported an unrecoverable condition.
    #[error("fatal: {0}")]
    FatalClient(String),

    /// Operation timeout.
    #[error("Timeout error: {message}")]
    Timeout {
        /// Description of what timed out
        message: String,
    },

    /// I/O error, typically from secrets and certificate files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Filesystem watcher setup error.
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    /// HTTP server error.
    #[error("Server error: {0}")]
    Server(String),
}

impl Error {
    /// Builds a decode error for the named document.
    pub fn decode(document: &'static str, source: serde_json::Error) -> Self {
        Error::Decode { document, source }
    }
}

/// A convenient Result type alias for kafka-producer-proxy operations.
///
/// This is equivalent to `std::result::Result<T, kafka_producer_proxy::Error>`.
pub type Result<T> = std::result::Result<T, Error>;
