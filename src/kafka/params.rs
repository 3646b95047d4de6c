use crate::credentials::{CertificateMaterial, ClusterCredential};
use rdkafka::ClientConfig;
use std::collections::BTreeMap;
use std::fmt;

const REDACTED_KEYS: &[&str] = &["sasl.password", "ssl.key.pem"];

/// How every cluster authenticates. Chosen globally, never per cluster.
#[derive(Debug, Clone, Copy)]
pub enum ClusterAuth<'a> {
    Certificate(&'a CertificateMaterial),
    Sasl { ca_location: Option<&'a str> },
}

/// librdkafka properties for one cluster connection.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    properties: BTreeMap<String, String>,
}

impl ConnectionParams {
    pub fn new(credential: &ClusterCredential, auth: ClusterAuth<'_>, debug: bool) -> Self {
        let mut params = Self {
            properties: BTreeMap::new(),
        };

        params
            .set("enable.idempotence", credential.idempotence.to_string())
            .set("bootstrap.servers", &credential.bootstrap_servers)
            .set("security.protocol", &credential.security_protocol);

        if debug {
            params.set("debug", "all");
        }

        match auth {
            ClusterAuth::Certificate(material) => {
                params
                    .set("ssl.ca.location", material.ca_chain_path.to_string_lossy())
                    .set("ssl.certificate.pem", &material.certificate)
                    .set("ssl.key.pem", &material.private_key);
            }
            ClusterAuth::Sasl { ca_location } => {
                if let Some(location) = ca_location {
                    params.set("ssl.ca.location", location);
                }
                params
                    .set_opt("sasl.mechanisms", credential.sasl_mechanisms.as_deref())
                    .set_opt("sasl.username", credential.username.as_deref())
                    .set_opt("sasl.password", credential.password.as_deref());
            }
        }

        params
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        for (key, value) in self.iter() {
            config.set(key, value);
        }
        config
    }

    fn set(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    fn set_opt(&mut self, key: &str, value: Option<&str>) -> &mut Self {
        if let Some(value) = value {
            self.set(key, value);
        }
        self
    }
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, value) in self.iter() {
            if REDACTED_KEYS.contains(&key) {
                map.entry(&key, &"<redacted>");
            } else {
                map.entry(&key, &value);
            }
        }
        map.finish()
    }
}
