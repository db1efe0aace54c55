//! HTTP surface of the proxy.
//!
//! Two control routes live under `/__gym-sync/`; every other request is turned
//! into a fetch event for the active worker generation.

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use gym_sync_core::{Error, NamespaceInfo};
use gym_sync_worker::fetch::is_hop_by_hop;
use gym_sync_worker::{FetchEvent, NetRequest, NetResponse, Registration, WorkerState};
use serde::Serialize;

use crate::error::ProxyError;

pub const MESSAGE_PATH: &str = "/__gym-sync/message";
pub const STATUS_PATH: &str = "/__gym-sync/status";

#[derive(Clone)]
pub struct ProxyState {
    registration: Arc<Registration>,
    max_body: usize,
}

pub fn router(registration: Arc<Registration>, max_body: usize) -> Router {
    Router::new()
        .route(MESSAGE_PATH, post(post_message))
        .route(STATUS_PATH, get(status))
        .fallback(proxy)
        .with_state(ProxyState { registration, max_body })
}

async fn post_message(State(state): State<ProxyState>, body: Bytes) -> StatusCode {
    let worker = state.registration.active().await;
    worker.post_message(&body);
    StatusCode::ACCEPTED
}

#[derive(Debug, Serialize)]
struct StatusBody {
    version: String,
    namespace: String,
    state: WorkerState,
    controlling: bool,
    degraded: bool,
    navigation_preload: bool,
    namespaces: Vec<NamespaceInfo>,
}

async fn status(State(state): State<ProxyState>) -> Result<Json<StatusBody>, ProxyError> {
    let worker = state.registration.active().await;
    let namespaces = state.registration.namespaces().await?;
    let config = worker.config();

    Ok(Json(StatusBody {
        version: config.version.clone(),
        namespace: config.namespace.to_string(),
        state: worker.state(),
        controlling: worker.lifecycle().is_controlling(),
        degraded: config.degraded,
        navigation_preload: worker.lifecycle().navigation_preload_enabled(),
        namespaces,
    }))
}

async fn proxy(State(state): State<ProxyState>, request: Request) -> Result<Response, ProxyError> {
    let worker = state.registration.active().await;
    let (parts, body) = request.into_parts();

    let path = parts.uri.path_and_query().map_or("/", |pq| pq.as_str());
    let url = worker.config().url_for(path)?;
    let body = axum::body::to_bytes(body, state.max_body)
        .await
        .map_err(|e| Error::InvalidInput(format!("request body: {e}")))?;

    let request = NetRequest::new(parts.method, url, forwardable(&parts.headers), body);
    let preload = worker.start_preload(&request);
    let (method, url) = (request.method.clone(), request.url.clone());

    let response = worker.handle_fetch(FetchEvent::new(request).with_preload(preload)).await?;
    tracing::debug!(%method, %url, status = response.status.as_u16(), "proxied");

    Ok(to_http(response))
}

/// Request headers worth sending upstream. Encoding is left to the fetch
/// client so cached bodies are always stored decoded.
fn forwardable(headers: &HeaderMap) -> HeaderMap {
    headers
        .iter()
        .filter(|(name, _)| !is_hop_by_hop(name.as_str()) && *name != header::ACCEPT_ENCODING)
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

fn to_http(response: NetResponse) -> Response {
    let headers: HeaderMap = response
        .headers
        .iter()
        .filter(|(name, _)| !is_hop_by_hop(name.as_str()))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();

    let mut out = Response::new(Body::from(response.body));
    *out.status_mut() = response.status;
    *out.headers_mut() = headers;
    out
}
