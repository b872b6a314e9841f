use super::cache::{Payload, UpstreamResponse};
use super::error::{ProxyError, RawBody};
use super::target::{filter_headers, is_json_content_type, DEFAULT_FORMAT};
use crate::config::Config;
use reqwest::{header, Client, Response};
use serde_json::Value;

/// HTTP client for the European Parliament open-data API.
///
/// One request per call: no retries and no timeout beyond the transport's own.
pub struct UpstreamClient {
    client: Client,
    base_url: String,
}

impl UpstreamClient {
    pub fn new(config: &Config) -> Result<Self, ProxyError> {
        let client = Client::builder()
            .user_agent(concat!("plenary-votes/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: config.upstream_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(&self, url: &str) -> Result<Response, ProxyError> {
        tracing::debug!("Fetching from external API: {}", url);
        let response = self
            .client
            .get(url)
            .header(header::ACCEPT, DEFAULT_FORMAT)
            .send()
            .await?;

        tracing::debug!(
            status = response.status().as_u16(),
            content_type = ?response.headers().get(header::CONTENT_TYPE),
            "External response for {}",
            url
        );
        Ok(response)
    }

    /// Fetches a resource that must be JSON; non-success statuses become
    /// [`ProxyError::Upstream`] with a structured body.
    pub async fn fetch_json(&self, url: &str) -> Result<UpstreamResponse, ProxyError> {
        let response = self.send(url).await?;
        let status = response.status();

        if !status.is_success() {
            tracing::error!("External API error: {} for {}", status, url);
            return Err(ProxyError::Upstream {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
                passthrough: None,
            });
        }

        let headers = collect_headers(&response);
        let text = response.text().await?;
        let payload = Payload::Json(normalize_json(&text)?);

        Ok(UpstreamResponse {
            status: status.as_u16(),
            headers,
            payload,
        })
    }

    /// Fetches a resource whose body is mirrored as is: JSON when the
    /// upstream says so, raw text otherwise. Error bodies are passed through.
    pub async fn fetch_passthrough(&self, url: &str) -> Result<UpstreamResponse, ProxyError> {
        let response = self.send(url).await?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("application/json")
            .to_string();
        let mut headers = collect_headers(&response);
        let text = response.text().await?;

        if !status.is_success() {
            tracing::error!("External API error: {} for {}", status, url);
            return Err(ProxyError::Upstream {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
                passthrough: Some(RawBody {
                    content_type: Some(content_type),
                    text,
                }),
            });
        }

        if !headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case("content-type"))
        {
            headers.push(("content-type".to_string(), content_type.clone()));
        }

        let payload = if is_json_content_type(&content_type) {
            Payload::Json(normalize_json(&text)?)
        } else {
            Payload::Text(text)
        };

        Ok(UpstreamResponse {
            status: status.as_u16(),
            headers,
            payload,
        })
    }
}

fn collect_headers(response: &Response) -> Vec<(String, String)> {
    filter_headers(response.headers().iter().filter_map(|(name, value)| {
        value
            .to_str()
            .ok()
            .map(|value| (name.as_str().to_string(), value.to_string()))
    }))
}

/// Parses and re-serializes a JSON body into the single string that is cached.
fn normalize_json(text: &str) -> Result<String, ProxyError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| ProxyError::MalformedResponse(format!("upstream body is not JSON: {}", e)))?;
    serde_json::to_string(&value).map_err(|e| ProxyError::MalformedResponse(e.to_string()))
}
