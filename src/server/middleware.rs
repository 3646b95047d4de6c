//! Access logging and the whole-request deadline.

use crate::server::handlers::ErrorResponse;
use crate::server::AppState;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::header::USER_AGENT;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Instant;
use tracing::{info, info_span, warn, Instrument};

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

const MAX_REQUEST_ID_LEN: usize = 128;

static NEXT_REQUEST: AtomicU64 = AtomicU64::new(1);

/// Tags the request with an id, logs its outcome and latency, and bounds it
/// by [`Config::request_timeout`](crate::config::Config::request_timeout).
///
/// A caller-supplied `X-Request-Id` is kept when it is short printable
/// ASCII; otherwise a new one is generated. The id is echoed on the response.
pub async fn access_log(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    let request_id = incoming_request_id(&request).unwrap_or_else(next_request_id);
    let remote_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let user_agent = request
        .headers()
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let header_value = HeaderValue::from_str(&request_id).ok();
    if let Some(value) = &header_value {
        request.headers_mut().insert(REQUEST_ID_HEADER, value.clone());
    }

    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        uri = %request.uri(),
        remote_addr = %remote_addr,
        user_agent = %user_agent,
    );

    let deadline = state.config.request_timeout();
    async move {
        let mut response = match tokio::time::timeout(deadline, next.run(request)).await {
            Ok(response) => response,
            Err(_) => {
                warn!(timeout_ms = deadline.as_millis() as u64, "Request deadline exceeded");
                ErrorResponse::new(Some("Request timed out"), None)
                    .with_status(StatusCode::GATEWAY_TIMEOUT)
                    .into_response()
            }
        };

        info!(
            status = response.status().as_u16(),
            latency_ms = started.elapsed().as_millis() as u64,
            "Request completed"
        );

        if let Some(value) = header_value {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
        response
    }
    .instrument(span)
    .await
}

fn incoming_request_id(request: &Request) -> Option<String> {
    let value = request.headers().get(REQUEST_ID_HEADER)?.to_str().ok()?;
    let valid = !value.is_empty()
        && value.len() <= MAX_REQUEST_ID_LEN
        && value.bytes().all(|b| b.is_ascii_graphic());
    valid.then(|| value.to_string())
}

/// `<process start in ms, hex>-<sequence>`; unique within and across runs.
fn next_request_id() -> String {
    static PREFIX: OnceLock<String> = OnceLock::new();
    let prefix = PREFIX.get_or_init(|| format!("{:x}", chrono::Utc::now().timestamp_millis()));
    format!("{}-{:06}", prefix, NEXT_REQUEST.fetch_add(1, Ordering::Relaxed))
}
