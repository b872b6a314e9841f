use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// Body of a non-success upstream response that is mirrored to the caller.
#[derive(Debug, Clone)]
pub struct RawBody {
    pub content_type: Option<String>,
    pub text: String,
}

#[derive(Error, Debug)]
pub enum ProxyError {
    /// Upstream answered with a non-2xx status.
    #[error("External API error: HTTP {status} {reason}")]
    Upstream {
        status: u16,
        reason: String,
        /// Set on routes that mirror the upstream error body verbatim.
        passthrough: Option<RawBody>,
    },
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Malformed upstream response: {0}")]
    MalformedResponse(String),
    #[error("Invalid cached data for {url}: {source}")]
    CacheCorruption {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Structured error payload returned to proxy callers.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: &str) -> Self {
        Self {
            error: error.to_string(),
            status: None,
            message: None,
            details: None,
        }
    }

    pub fn with_details(mut self, details: String) -> Self {
        self.details = Some(details);
        self
    }
}

impl ProxyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn to_response(&self) -> Response {
        let status = self.status_code();
        match self {
            ProxyError::Upstream {
                passthrough: Some(raw),
                ..
            } => {
                let mut response = (status, raw.text.clone()).into_response();
                if let Some(value) = raw
                    .content_type
                    .as_deref()
                    .and_then(|ct| HeaderValue::from_str(ct).ok())
                {
                    response.headers_mut().insert(header::CONTENT_TYPE, value);
                }
                response
            }
            ProxyError::Upstream {
                status: code,
                reason,
                passthrough: None,
            } => {
                let body = ErrorResponse {
                    status: Some(*code),
                    message: Some(reason.clone()),
                    ..ErrorResponse::new("External API error")
                };
                (status, Json(body)).into_response()
            }
            ProxyError::Transport(e) => (
                status,
                Json(ErrorResponse::new("Proxy error").with_details(e.to_string())),
            )
                .into_response(),
            ProxyError::MalformedResponse(details) => (
                status,
                Json(ErrorResponse::new("Proxy error").with_details(details.clone())),
            )
                .into_response(),
            ProxyError::CacheCorruption { source, .. } => (
                status,
                Json(ErrorResponse::new("Invalid cached data").with_details(source.to_string())),
            )
                .into_response(),
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        self.to_response()
    }
}

/// Waiters coalesced onto one upstream fetch share its error.
pub struct SharedProxyError(pub Arc<ProxyError>);

impl From<Arc<ProxyError>> for SharedProxyError {
    fn from(error: Arc<ProxyError>) -> Self {
        Self(error)
    }
}

impl From<ProxyError> for SharedProxyError {
    fn from(error: ProxyError) -> Self {
        Self(Arc::new(error))
    }
}

impl IntoResponse for SharedProxyError {
    fn into_response(self) -> Response {
        self.0.to_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_status_is_forwarded() {
        let error = ProxyError::Upstream {
            status: 404,
            reason: "Not Found".to_string(),
            passthrough: None,
        };
        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(error.to_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_passthrough_keeps_content_type() {
        let error = ProxyError::Upstream {
            status: 503,
            reason: "Service Unavailable".to_string(),
            passthrough: Some(RawBody {
                content_type: Some("text/html".to_string()),
                text: "<h1>down</h1>".to_string(),
            }),
        };
        let response = error.to_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html");
    }

    #[test]
    fn test_malformed_response_is_server_error() {
        let error = ProxyError::MalformedResponse("expected value at line 1".to_string());
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_error_body_skips_empty_fields() {
        let body = serde_json::to_value(ErrorResponse::new("Proxy error")).unwrap();
        assert_eq!(body, serde_json::json!({ "error": "Proxy error" }));
    }
}
