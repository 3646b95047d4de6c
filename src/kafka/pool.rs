//! One authenticated producer per configured cluster.
//!
//! The pool publishes its connections as an immutable [`ClusterSet`].
//! Request handlers take the current set once and keep it for the whole
//! request, so a rebuild never changes the connection under an in-flight
//! publish.

use crate::config::Config;
use crate::credentials::CredentialStore;
use crate::kafka::client::BrokerClient;
use crate::kafka::delivery::DeliveryDispatcher;
use crate::kafka::params::{ClusterAuth, ConnectionParams};
use crate::{Error, Result};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// A live connection to one cluster.
pub struct ClusterConnection {
    name: String,
    client: Arc<dyn BrokerClient>,
    deliveries: Arc<DeliveryDispatcher>,
}

impl ClusterConnection {
    /// `deliveries` must be the dispatcher the client reports deliveries to.
    pub fn new(
        name: impl Into<String>,
        client: Arc<dyn BrokerClient>,
        deliveries: Arc<DeliveryDispatcher>,
    ) -> Self {
        Self {
            name: name.into(),
            client,
            deliveries,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn client(&self) -> &dyn BrokerClient {
        self.client.as_ref()
    }

    pub fn deliveries(&self) -> &Arc<DeliveryDispatcher> {
        &self.deliveries
    }
}

impl fmt::Debug for ClusterConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterConnection")
            .field("name", &self.name)
            .field("in_flight", &self.deliveries.in_flight())
            .finish()
    }
}

/// Connections from one pool build, in configuration order.
#[derive(Debug, Default)]
pub struct ClusterSet {
    connections: Vec<Arc<ClusterConnection>>,
}

impl ClusterSet {
    pub fn new(connections: Vec<ClusterConnection>) -> Self {
        Self {
            connections: connections.into_iter().map(Arc::new).collect(),
        }
    }

    /// Case-insensitive lookup by cluster name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClusterNotFound`] when no connection matches.
    pub fn get(&self, name: &str) -> Result<&Arc<ClusterConnection>> {
        self.connections
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::ClusterNotFound {
                cluster: name.to_string(),
            })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.connections.iter().map(|c| c.name())
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl Drop for ClusterSet {
    /// Closing a producer flushes it synchronously, so a set retired on a
    /// runtime worker is released on the blocking pool instead.
    fn drop(&mut self) {
        let connections = std::mem::take(&mut self.connections);
        if connections.is_empty() {
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || drop(connections));
            }
            Err(_) => drop(connections),
        }
    }
}

/// Opens a connection for one cluster from prepared parameters.
pub trait ClusterConnector: Send + Sync {
    fn connect(&self, cluster: &str, params: &ConnectionParams) -> Result<ClusterConnection>;
}

pub struct ProducerPool {
    clusters: Vec<String>,
    use_cert_auth: bool,
    sasl_ca_location: Option<String>,
    debug: bool,
    connector: Arc<dyn ClusterConnector>,
    current: watch::Sender<Arc<ClusterSet>>,
}

impl ProducerPool {
    /// Builds the pool from the configured clusters and the credentials
    /// currently loaded in `credentials`.
    ///
    /// # Errors
    ///
    /// Fails if any configured cluster has no credential, if certificate
    /// auth is enabled without certificate material, or if any connection
    /// cannot be created. No partial pool is returned.
    pub fn connect(
        config: &Config,
        credentials: &CredentialStore,
        connector: Arc<dyn ClusterConnector>,
    ) -> Result<Self> {
        let (current, _) = watch::channel(Arc::new(ClusterSet::default()));

        let pool = Self {
            clusters: config.kafka.clusters.clone(),
            use_cert_auth: config.kafka.use_cert_auth,
            sasl_ca_location: config.kafka.sasl_ca_location.clone(),
            debug: config.debug,
            connector,
            current,
        };

        pool.rebuild(credentials)?;
        Ok(pool)
    }

    /// The connection set to use for one request.
    pub fn current(&self) -> Arc<ClusterSet> {
        self.current.borrow().clone()
    }

    pub fn clusters(&self) -> &[String] {
        &self.clusters
    }

    /// Rebuilds every connection from the current credentials and swaps the
    /// new set in. On error the previous set stays active.
    pub fn rebuild(&self, credentials: &CredentialStore) -> Result<()> {
        let set = self.build(credentials)?;
        info!(clusters = set.len(), "Kafka producer pool ready");
        self.current.send_replace(Arc::new(set));
        Ok(())
    }

    /// Rebuilds the pool after every successful credential reload until
    /// `cancel` fires.
    pub async fn follow_reloads(
        self: Arc<Self>,
        credentials: Arc<CredentialStore>,
        cancel: CancellationToken,
    ) {
        let mut secrets = credentials.subscribe_secrets();
        let mut certificates = credentials.subscribe_certificates();

        info!("Rebuilding producers on credential reload");

        loop {
            let trigger = tokio::select! {
                _ = cancel.cancelled() => break,
                changed = secrets.changed() => changed.map(|_| "secrets"),
                changed = certificates.changed() => changed.map(|_| "certificates"),
            };

            let Ok(trigger) = trigger else {
                break;
            };

            if let Err(e) = self.rebuild(&credentials) {
                error!(
                    trigger,
                    "Producer pool rebuild failed, keeping previous connections: {}", e
                );
            }
        }

        info!("Stopped following credential reloads");
    }

    fn build(&self, credentials: &CredentialStore) -> Result<ClusterSet> {
        let secrets = credentials.secrets();
        let certificates = if self.use_cert_auth {
            Some(credentials.certificates().ok_or_else(|| {
                Error::Config(
                    "certificate auth is enabled but no certificate material is loaded"
                        .to_string(),
                )
            })?)
        } else {
            None
        };

        let auth = match &certificates {
            Some(material) => ClusterAuth::Certificate(material.as_ref()),
            None => ClusterAuth::Sasl {
                ca_location: self.sasl_ca_location.as_deref(),
            },
        };

        let mut connections = Vec::with_capacity(self.clusters.len());
        for cluster in &self.clusters {
            let credential = secrets.cluster(cluster)?;
            let params = ConnectionParams::new(credential, auth, self.debug);
            connections.push(self.connector.connect(cluster, &params)?);
        }

        Ok(ClusterSet::new(connections))
    }
}
