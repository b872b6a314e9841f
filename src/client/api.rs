use super::detail::{join_detail, FanOut};
use super::error::ClientError;
use super::identity::PersonIdentity;
use super::meetings::{window_offset, MeetingSummary};
use reqwest::{header, Client};
use serde_json::Value;

pub const DEFAULT_PROXY_URL: &str = "http://localhost:4000";

/// Reads meetings, their sub-resources and voter identities through the
/// caching proxy.
#[derive(Clone)]
pub struct ViewClient {
    client: Client,
    proxy_base: String,
}

impl ViewClient {
    pub fn new(proxy_base: impl Into<String>) -> Result<Self, ClientError> {
        let client = Client::builder()
            .user_agent(concat!("plenary/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            proxy_base: proxy_base.into().trim_end_matches('/').to_string(),
        })
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value, ClientError> {
        let url = format!("{}{}", self.proxy_base, path);
        let mut request = self.client.get(&url).header(header::ACCEPT, "application/json");
        if !query.is_empty() {
            request = request.query(query);
        }

        tracing::debug!("GET {} {:?}", url, query);
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                url,
            });
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| ClientError::Decode(format!("{}: {}", url, e)))
    }

    /// Total number of meetings in `year`, learned from a one-item query.
    pub async fn meeting_count(&self, year: i32) -> Result<u64, ClientError> {
        let document = self
            .get_json(
                "/api/meetings",
                &[("year", year.to_string()), ("limit", "1".to_string())],
            )
            .await?;

        let total = document
            .get("total")
            .or_else(|| document.pointer("/meta/total"))
            .and_then(|total| {
                total
                    .as_u64()
                    .or_else(|| total.as_str().and_then(|s| s.parse().ok()))
            })
            .ok_or_else(|| ClientError::Decode("meeting count missing from response".into()))?;

        Ok(total)
    }

    /// The last `window` meetings of `year`, most recent first.
    pub async fn recent_meetings(
        &self,
        year: i32,
        window: u64,
    ) -> Result<Vec<MeetingSummary>, ClientError> {
        let total = self.meeting_count(year).await?;
        let offset = window_offset(total, window);
        tracing::debug!("{} meetings in {}, reading from offset {}", total, year, offset);

        let document = self
            .get_json(
                "/api/meetings",
                &[
                    ("year", year.to_string()),
                    ("offset", offset.to_string()),
                    ("limit", window.to_string()),
                ],
            )
            .await?;

        let meetings = document
            .get("data")
            .and_then(Value::as_array)
            .ok_or_else(|| ClientError::Decode("meeting list missing `data`".into()))?;

        Ok(meetings.iter().rev().map(MeetingSummary::from_value).collect())
    }

    /// Fetches all six parts of a meeting's detail concurrently.
    pub async fn meeting_detail(&self, meeting_id: &str) -> FanOut {
        let encoded = urlencoding::encode(meeting_id).into_owned();
        join_detail(|resource| {
            let path = format!("/api/meetings{}", resource.path(&encoded));
            async move { self.get_json(&path, &[]).await }
        })
        .await
    }

    pub async fn identity(&self, person_id: &str) -> Result<PersonIdentity, ClientError> {
        let path = format!("/api/meps/{}", urlencoding::encode(person_id));
        let document = self.get_json(&path, &[]).await?;
        PersonIdentity::from_value(&document)
            .ok_or_else(|| ClientError::Decode(format!("no person data for {}", person_id)))
    }
}
