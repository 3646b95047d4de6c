use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub server: ServerConfig,
    pub kafka: KafkaConfig,
    #[serde(default)]
    pub secrets: SecretsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub enable_api_auth: bool,
    #[serde(default)]
    pub enable_tls: bool,
    #[serde(default)]
    pub tls_cert: Option<PathBuf>,
    #[serde(default)]
    pub tls_key: Option<PathBuf>,
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
    /// Upper bound for receiving a request's headers and body.
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KafkaConfig {
    pub clusters: Vec<String>,
    #[serde(default)]
    pub use_cert_auth: bool,
    #[serde(default)]
    pub health_topic: Option<String>,
    #[serde(default)]
    pub sasl_ca_location: Option<String>,
    #[serde(default = "default_metadata_timeout_ms")]
    pub metadata_timeout_ms: u64,
    #[serde(default = "default_health_timeout_ms")]
    pub health_timeout_ms: u64,
    #[serde(default = "default_delivery_timeout_ms")]
    pub delivery_timeout_ms: u64,
    #[serde(default)]
    pub rebuild_on_reload: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SecretsConfig {
    #[serde(default = "default_secrets_path")]
    pub path: PathBuf,
    #[serde(default = "default_secrets_file")]
    pub secrets_file: String,
    #[serde(default = "default_certificate_file")]
    pub certificate_file: String,
    #[serde(default = "std::env::temp_dir")]
    pub temp_dir: PathBuf,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("KAFKA_PROXY")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("kafka.clusters")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.kafka.clusters.is_empty() {
            return Err(crate::Error::Config(
                "kafka.clusters must name at least one cluster".to_string(),
            ));
        }

        for (i, cluster) in self.kafka.clusters.iter().enumerate() {
            if self.kafka.clusters[..i].iter().any(|c| c.eq_ignore_ascii_case(cluster)) {
                return Err(crate::Error::Config(format!(
                    "kafka.clusters lists '{}' more than once",
                    cluster
                )));
            }
        }

        if self.server.enable_tls
            && (self.server.tls_cert.is_none() || self.server.tls_key.is_none())
        {
            return Err(crate::Error::Config(
                "server.tls_cert and server.tls_key are required when TLS is enabled".to_string(),
            ));
        }

        let timeouts = [
            ("server.read_timeout_ms", self.server.read_timeout_ms),
            ("kafka.metadata_timeout_ms", self.kafka.metadata_timeout_ms),
            ("kafka.health_timeout_ms", self.kafka.health_timeout_ms),
            ("kafka.delivery_timeout_ms", self.kafka.delivery_timeout_ms),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, value)| *value == 0) {
            return Err(crate::Error::Config(format!("{} must be greater than zero", name)));
        }

        Ok(())
    }

    pub fn secrets_file_path(&self) -> PathBuf {
        self.secrets.path.join(&self.secrets.secrets_file)
    }

    pub fn certificate_file_path(&self) -> PathBuf {
        self.secrets.path.join(&self.secrets.certificate_file)
    }

    /// Deadline for a whole HTTP request: reading it, the topic check and
    /// the longest delivery wait a publish may take.
    pub fn request_timeout(&self) -> Duration {
        self.server.read_timeout() + self.kafka.metadata_timeout() + self.kafka.delivery_timeout()
    }
}

impl ServerConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl KafkaConfig {
    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_millis(self.metadata_timeout_ms)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }

    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery_timeout_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            enable_api_auth: false,
            enable_tls: false,
            tls_cert: None,
            tls_key: None,
            shutdown_grace_secs: default_shutdown_grace_secs(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            path: default_secrets_path(),
            secrets_file: default_secrets_file(),
            certificate_file: default_certificate_file(),
            temp_dir: std::env::temp_dir(),
        }
    }
}

fn default_port() -> u16 {
    8080
}

fn default_shutdown_grace_secs() -> u64 {
    10
}

fn default_read_timeout_ms() -> u64 {
    15_000
}

fn default_metadata_timeout_ms() -> u64 {
    10_000
}

fn default_health_timeout_ms() -> u64 {
    15_000
}

fn default_delivery_timeout_ms() -> u64 {
    30_000
}

fn default_secrets_path() -> PathBuf {
    PathBuf::from("/etc/kafka-producer-proxy")
}

fn default_secrets_file() -> String {
    "secrets.json".to_string()
}

fn default_certificate_file() -> String {
    "internal-ca.json".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_applied() {
        let file = write_config(
            r#"
            [kafka]
            clusters = ["clusterA", "clusterB"]
            "#,
        );

        let config = Config::from_file(file.path()).unwrap();

        assert!(!config.debug);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.kafka.clusters, vec!["clusterA", "clusterB"]);
        assert_eq!(config.kafka.metadata_timeout(), Duration::from_secs(10));
        assert_eq!(config.kafka.health_timeout(), Duration::from_secs(15));
        assert!(!config.kafka.rebuild_on_reload);
        assert_eq!(config.server.read_timeout(), Duration::from_secs(15));
        assert_eq!(config.secrets.secrets_file, "secrets.json");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_secrets_paths() {
        let file = write_config(
            r#"
            [kafka]
            clusters = ["clusterA"]

            [secrets]
            path = "/run/secrets"
            "#,
        );

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.secrets_file_path(), PathBuf::from("/run/secrets/secrets.json"));
        assert_eq!(
            config.certificate_file_path(),
            PathBuf::from("/run/secrets/internal-ca.json")
        );
    }

    #[test]
    fn test_missing_file() {
        assert!(Config::from_file("does-not-exist.toml").is_err());
    }

    #[test]
    fn test_validate_rejects_empty_clusters() {
        let file = write_config(
            r#"
            [kafka]
            clusters = []
            "#,
        );

        let config = Config::from_file(file.path()).unwrap();
        assert!(matches!(config.validate(), Err(crate::Error::Config(_))));
    }

    #[test]
    fn test_request_timeout_covers_delivery_wait() {
        let file = write_config(
            r#"
            [server]
            read_timeout_ms = 500

            [kafka]
            clusters = ["clusterA"]
            metadata_timeout_ms = 1000
            delivery_timeout_ms = 2000
            "#,
        );

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.request_timeout(), Duration::from_millis(3500));
        assert!(config.request_timeout() > config.kafka.delivery_timeout());
    }

    #[test]
    fn test_validate_rejects_duplicate_clusters() {
        let file = write_config(
            r#"
            [kafka]
            clusters = ["clusterA", "CLUSTERA"]
            "#,
        );

        let config = Config::from_file(file.path()).unwrap();
        assert!(config.validate().unwrap_err().to_string().contains("more than once"));
    }

    #[test]
    fn test_validate_requires_tls_material() {
        let file = write_config(
            r#"
            [server]
            enable_tls = true

            [kafka]
            clusters = ["clusterA"]
            "#,
        );

        let config = Config::from_file(file.path()).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("tls_cert"));
    }
}
