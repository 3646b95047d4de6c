//! Request handlers for the gateway routes.

use crate::kafka::PublishRequest;
use crate::server::AppState;
use crate::Error;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use serde::Serialize;
use serde_json::json;
use std::net::SocketAddr;
use tracing::{debug, error, warn};

pub const API_TOKEN_HEADER: &str = "X-API-TOKEN";

#[derive(Debug, Serialize)]
pub struct EventResponse {
    pub message: String,
}

/// Failure body: `{"error": ..., "message": ...}`.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip)]
    status: StatusCode,
}

impl ErrorResponse {
    pub fn new(message: Option<&str>, error: Option<String>) -> Self {
        Self {
            error,
            message: message.map(str::to_string),
            status: StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub(crate) fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }
}

impl From<Error> for ErrorResponse {
    fn from(err: Error) -> Self {
        let message = match &err {
            Error::ClusterNotFound { .. } => Some("Could not retrieve Kafka instance."),
            Error::Serialization(_) => Some("Could not parse 'data' field"),
            _ => None,
        };
        ErrorResponse::new(message, Some(err.to_string()))
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        error!(
            status = self.status.as_u16(),
            error = self.error.as_deref().unwrap_or_default(),
            message = self.message.as_deref().unwrap_or_default(),
            "Request failed"
        );
        (self.status, Json(self)).into_response()
    }
}

/// Liveness check.
pub async fn ping() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Checks every configured cluster.
pub async fn health(State(state): State<AppState>) -> Response {
    let clusters = state.pool.current();
    let report = state.health.check(&clusters).await;

    if report.is_healthy() {
        (StatusCode::OK, "OK").into_response()
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "errors": report.detail() })),
        )
            .into_response()
    }
}

/// Lists the configured cluster names.
pub async fn clusters(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({ "clusters": state.pool.clusters() }))
}

/// Publishes one event and waits for the broker's confirmation.
pub async fn publish_event(
    State(state): State<AppState>,
    ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(rejection) = authorize(&state, &headers, remote_addr) {
        return rejection.into_response();
    }

    let request: PublishRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            let message = Some("error deserializing request body");
            return ErrorResponse::new(message, Some(e.to_string())).into_response();
        }
    };

    debug!(
        method = %method,
        cluster = %request.cluster,
        topic = %request.topic,
        "Publishing event"
    );

    let clusters = state.pool.current();
    match state.publisher.publish(&clusters, &request).await {
        Ok(receipt) => (
            StatusCode::OK,
            Json(EventResponse {
                message: receipt.to_string(),
            }),
        )
            .into_response(),
        Err(e) => ErrorResponse::from(e).into_response(),
    }
}

fn authorize(
    state: &AppState,
    headers: &HeaderMap,
    remote_addr: SocketAddr,
) -> Result<(), ErrorResponse> {
    if !state.config.server.enable_api_auth {
        return Ok(());
    }

    let secrets = state.credentials.secrets();
    let provided = headers.get(API_TOKEN_HEADER).and_then(|v| v.to_str().ok());

    match provided {
        Some(token) if !secrets.api_token.is_empty() && token == secrets.api_token => Ok(()),
        Some(_) => {
            warn!(%remote_addr, "Invalid API token provided");
            Err(unauthorized())
        }
        None => {
            debug!(%remote_addr, "No API token provided in {} header", API_TOKEN_HEADER);
            Err(unauthorized())
        }
    }
}

fn unauthorized() -> ErrorResponse {
    ErrorResponse::new(Some("API Token Request Failed"), None)
        .with_status(StatusCode::UNAUTHORIZED)
}
