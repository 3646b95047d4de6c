//! HTTP surface of the gateway.
//!
//! ```text
//! GET         /ping      liveness
//! GET         /health    metadata check against every cluster
//! POST|DELETE /events    publish one event
//! GET         /clusters  configured cluster names
//! ```

pub mod handlers;
pub mod middleware;

use crate::config::Config;
use crate::credentials::CredentialStore;
use crate::kafka::{HealthAggregator, ProducerPool, PublishCoordinator};
use crate::{Error, Result};
use axum::routing::{get, post};
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use hyper_util::server::conn::auto;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Everything a handler needs, injected once at startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub credentials: Arc<CredentialStore>,
    pub pool: Arc<ProducerPool>,
    pub publisher: Arc<PublishCoordinator>,
    pub health: Arc<HealthAggregator>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        credentials: Arc<CredentialStore>,
        pool: Arc<ProducerPool>,
    ) -> Self {
        let publisher = Arc::new(PublishCoordinator::from_config(&config.kafka));
        let health = Arc::new(HealthAggregator::from_config(&config.kafka));

        Self {
            config,
            credentials,
            pool,
            publisher,
            health,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ping", get(handlers::ping))
        .route("/health", get(handlers::health))
        .route(
            "/events",
            post(handlers::publish_event).delete(handlers::publish_event),
        )
        .route("/clusters", get(handlers::clusters))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::access_log,
        ))
        .with_state(state)
}

/// Serves HTTP (or HTTPS when TLS is enabled) until `cancel` fires, then
/// drains open connections for `server.shutdown_grace_secs`.
pub async fn serve(state: AppState, cancel: CancellationToken) -> Result<()> {
    let handle = Handle::new();
    let grace = Duration::from_secs(state.config.server.shutdown_grace_secs);

    let shutdown = handle.clone();
    tokio::spawn(async move {
        cancel.cancelled().await;
        shutdown.graceful_shutdown(Some(grace));
    });

    serve_with_handle(state, handle).await
}

/// Serves on `server.port` under the control of `handle`.
///
/// `handle.listening()` resolves to the bound address, which is how callers
/// find the port when `server.port` is `0`.
pub async fn serve_with_handle(state: AppState, handle: Handle<SocketAddr>) -> Result<()> {
    let server = state.config.server.clone();
    let addr = SocketAddr::from(([0, 0, 0, 0], server.port));
    let app = router(state).into_make_service_with_connect_info::<SocketAddr>();

    let served = if server.enable_tls {
        let (Some(cert), Some(key)) = (&server.tls_cert, &server.tls_key) else {
            return Err(Error::Config(
                "TLS is enabled but tls_cert/tls_key are missing".to_string(),
            ));
        };

        let tls = RustlsConfig::from_pem_file(cert, key)
            .await
            .map_err(|e| Error::Server(format!("failed to load TLS certificate: {}", e)))?;

        info!(%addr, "Listening with TLS");

        let mut listener = axum_server::bind_rustls(addr, tls).handle(handle);
        limit_header_reads(listener.http_builder(), server.read_timeout());
        listener.serve(app).await
    } else {
        info!(%addr, "Listening");

        let mut listener = axum_server::bind(addr).handle(handle);
        limit_header_reads(listener.http_builder(), server.read_timeout());
        listener.serve(app).await
    };

    served.map_err(|e| Error::Server(format!("failed to serve on {}: {}", addr, e)))
}

/// Connections that do not finish sending their headers in time are closed.
fn limit_header_reads(builder: &mut auto::Builder<TokioExecutor>, timeout: Duration) {
    builder
        .http1()
        .timer(TokioTimer::new())
        .header_read_timeout(timeout);
}
