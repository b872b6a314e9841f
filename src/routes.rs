use axum::{
    body::Body,
    extract::{OriginalUri, Path, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{any, delete, get},
    Router,
};
use serde::Serialize;
use std::sync::Arc;

use crate::{
    config::Config,
    proxy::{
        cache::{CacheEntry, CacheStats, Payload, ResponseCache, RetentionPolicy},
        error::{ProxyError, SharedProxyError},
        target::{upstream_meetings_url, upstream_mep_url},
        upstream::UpstreamClient,
    },
};

const MEETINGS_PREFIX: &str = "/api/meetings";

// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub cache: Arc<ResponseCache>,
    pub upstream: Arc<UpstreamClient>,
}

impl AppState {
    pub fn from_config(config: Config) -> Result<Self, ProxyError> {
        let cache = ResponseCache::new(RetentionPolicy {
            window: config.retention(),
            max_entries: config.cache_max_entries,
        });
        Self::with_cache(config, cache)
    }

    pub fn with_cache(config: Config, cache: ResponseCache) -> Result<Self, ProxyError> {
        let upstream = UpstreamClient::new(&config)?;
        Ok(Self {
            config: Arc::new(config),
            cache: Arc::new(cache),
            upstream: Arc::new(upstream),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ClearCacheResponse {
    pub message: String,
}

// Route handlers
pub async fn health() -> &'static str {
    "OK"
}

pub async fn cache_status(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.cache.stats())
}

pub async fn clear_cache(State(state): State<AppState>) -> Json<ClearCacheResponse> {
    let cleared = state.cache.clear().await;
    Json(ClearCacheResponse {
        message: format!("Cache cleared: {} entries removed", cleared),
    })
}

/// Forwards `/api/meetings` and everything below it.
///
/// The sub-path is read from the raw request URI so percent-encoded
/// characters such as `%2F` and `%3F` reach the upstream untouched.
pub async fn proxy_meetings(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
) -> Result<Response, SharedProxyError> {
    let sub_path = uri
        .path()
        .strip_prefix(MEETINGS_PREFIX)
        .unwrap_or_default();
    let url = upstream_meetings_url(state.upstream.base_url(), sub_path, uri.query());
    tracing::debug!("Meetings URL: {}", url);

    let lookup = state
        .cache
        .get_or_fetch(&url, || state.upstream.fetch_json(&url))
        .await
        .map_err(|e| {
            tracing::error!("Error in meetings proxy: {}", e);
            SharedProxyError(e)
        })?;

    Ok(replay(lookup.entry())?)
}

pub async fn proxy_mep(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, SharedProxyError> {
    let url = upstream_mep_url(state.upstream.base_url(), &id);
    tracing::debug!("MEPs URL: {}", url);

    let lookup = state
        .cache
        .get_or_fetch(&url, || state.upstream.fetch_passthrough(&url))
        .await
        .map_err(|e| {
            tracing::error!("Error in MEPs proxy: {}", e);
            SharedProxyError(e)
        })?;

    Ok(replay(lookup.entry())?)
}

/// Rebuilds an HTTP response from a cache entry.
///
/// JSON payloads are re-parsed from their stored text, so a corrupt entry
/// surfaces as [`ProxyError::CacheCorruption`] instead of garbage on the wire.
pub fn replay(entry: &CacheEntry) -> Result<Response, ProxyError> {
    let (body, default_content_type) = match &entry.payload {
        Payload::Json(text) => {
            let value: serde_json::Value =
                serde_json::from_str(text).map_err(|source| ProxyError::CacheCorruption {
                    url: entry.url.clone(),
                    source,
                })?;
            let bytes = serde_json::to_vec(&value).map_err(|source| {
                ProxyError::CacheCorruption {
                    url: entry.url.clone(),
                    source,
                }
            })?;
            (bytes, "application/json")
        }
        Payload::Text(text) => (text.clone().into_bytes(), "text/plain; charset=utf-8"),
    };

    let mut headers = HeaderMap::new();
    for (name, value) in &entry.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => tracing::warn!("Skipping unrepresentable cached header {:?}", name),
        }
    }
    if !headers.contains_key(header::CONTENT_TYPE) {
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(default_content_type),
        );
    }

    let status = StatusCode::from_u16(entry.status).unwrap_or(StatusCode::OK);
    let mut response = (status, Body::from(body)).into_response();
    response.headers_mut().extend(headers);
    Ok(response)
}

// Create the router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/cache/status", get(cache_status))
        .route("/api/cache", delete(clear_cache))
        .route(MEETINGS_PREFIX, any(proxy_meetings))
        .route("/api/meetings/", any(proxy_meetings))
        .route("/api/meetings/*sub_path", any(proxy_meetings))
        .route("/api/meps/:id", get(proxy_mep))
        .with_state(state)
}
