use crate::config::Config;
use crate::credentials::CredentialStore;
use crate::kafka::{ClusterConnector, KafkaConnector, ProducerPool};
use crate::server::{self, AppState};
use crate::watcher::FileWatcher;
use crate::{Error, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Startup products shared by the HTTP server and the background tasks.
pub struct Services {
    pub state: AppState,
    pub watcher: Arc<FileWatcher>,
}

pub struct Gateway {
    config: Arc<Config>,
    connector: Arc<dyn ClusterConnector>,
}

impl Gateway {
    pub fn new(config: Config) -> Self {
        Self::with_connector(config, Arc::new(KafkaConnector))
    }

    pub fn with_connector(config: Config, connector: Arc<dyn ClusterConnector>) -> Self {
        Self {
            config: Arc::new(config),
            connector,
        }
    }

    /// Loads the initial credentials and builds the producer pool.
    ///
    /// # Errors
    ///
    /// Any error here is fatal: unreadable or invalid initial documents, a
    /// configured cluster without credentials, or a producer that cannot be
    /// created.
    pub async fn start(&self) -> Result<Services> {
        let credentials = Arc::new(CredentialStore::new(&self.config.secrets.temp_dir));
        let watcher = Arc::new(file_watcher(&self.config, &credentials));

        let mut initial = vec![self.config.secrets_file_path()];
        if self.config.kafka.use_cert_auth {
            initial.push(self.config.certificate_file_path());
        }

        for path in initial {
            match watcher.apply_path(&path).await {
                Ok(true) => {}
                Ok(false) => {
                    return Err(Error::Config(format!("{} is not a watched file", path.display())));
                }
                Err(e) => {
                    return Err(Error::Config(format!(
                        "failed to load initial {}: {}",
                        path.display(),
                        e
                    )));
                }
            }
        }

        let pool = Arc::new(ProducerPool::connect(
            &self.config,
            &credentials,
            Arc::clone(&self.connector),
        )?);

        Ok(Services {
            state: AppState::new(Arc::clone(&self.config), credentials, pool),
            watcher,
        })
    }

    /// Runs the gateway until Ctrl-C, or until the file watcher fails.
    pub async fn run(self) -> Result<()> {
        let Services { state, watcher } = self.start().await?;
        let cancel = CancellationToken::new();

        let watch_task = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let result = watcher.watch(cancel.clone()).await;
                if let Err(e) = &result {
                    error!("File watcher failed: {}", e);
                    cancel.cancel();
                }
                result
            })
        };

        let reload_task = if self.config.kafka.rebuild_on_reload {
            let pool = Arc::clone(&state.pool);
            let credentials = Arc::clone(&state.credentials);
            Some(tokio::spawn(pool.follow_reloads(credentials, cancel.clone())))
        } else {
            info!("Producers keep their startup credentials; rotated secrets apply after restart");
            None
        };

        let signal_task = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Shutdown requested");
                }
                cancel.cancel();
            })
        };

        let served = server::serve(state, cancel.clone()).await;
        cancel.cancel();
        signal_task.abort();

        if let Some(task) = reload_task {
            let _ = task.await;
        }

        let watched = watch_task
            .await
            .map_err(|e| Error::Server(format!("file watcher task failed: {}", e)))?;

        info!("Gateway stopped");
        served.and(watched)
    }
}

/// Registers the secrets document, and the certificate document when
/// certificate auth is enabled.
pub fn file_watcher(config: &Config, credentials: &Arc<CredentialStore>) -> FileWatcher {
    let secrets = Arc::clone(credentials);
    let mut watcher = FileWatcher::new(&config.secrets.path)
        .register(&config.secrets.secrets_file, move |data| secrets.load_secrets(data));

    if config.kafka.use_cert_auth {
        let certificates = Arc::clone(credentials);
        watcher = watcher.register(&config.secrets.certificate_file, move |data| {
            certificates.load_certificates(data)
        });
    }

    watcher
}
