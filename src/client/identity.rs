use super::api::ViewClient;
use super::error::ClientError;
use super::meetings::{literal, localized};
use moka::future::Cache;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

const MAX_IDENTITIES: u64 = 10_000;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PersonIdentity {
    pub name: String,
    pub image_url: Option<String>,
}

impl PersonIdentity {
    /// Reads the first person of a JSON-LD `data` list (or the document itself).
    pub fn from_value(document: &Value) -> Option<Self> {
        let person = document
            .get("data")
            .and_then(Value::as_array)
            .and_then(|items| items.first())
            .unwrap_or(document);

        let full_name = || {
            let given = person.get("givenName").and_then(literal)?;
            let family = person.get("familyName").and_then(literal)?;
            Some(format!("{} {}", given.trim(), family.trim()))
        };

        let name = person
            .get("label")
            .and_then(localized)
            .or_else(full_name)
            .or_else(|| person.get("sortLabel").and_then(literal))
            .filter(|name| !name.trim().is_empty())?;

        let image_url = ["img", "image"].iter().find_map(|key| {
            person.get(*key).and_then(|image| match image {
                Value::Object(map) => map.get("id").and_then(literal),
                other => literal(other),
            })
        });

        Some(Self { name, image_url })
    }
}

/// One voter line in an expanded decision. Unresolved voters show their id.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VoterRow {
    pub id: String,
    pub name: String,
    pub image_url: Option<String>,
    pub resolved: bool,
}

impl VoterRow {
    fn resolved(id: &str, identity: PersonIdentity) -> Self {
        Self {
            id: id.to_string(),
            name: identity.name,
            image_url: identity.image_url,
            resolved: true,
        }
    }

    fn unresolved(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            image_url: None,
            resolved: false,
        }
    }
}

/// Id → identity mapping shared by every decision view.
///
/// Resolved ids are never fetched again and concurrent lookups of one id
/// share a single request. Failures are not remembered, so a later
/// expansion retries them.
#[derive(Clone)]
pub struct IdentityResolver {
    client: ViewClient,
    identities: Cache<String, PersonIdentity>,
}

impl IdentityResolver {
    pub fn new(client: ViewClient) -> Self {
        Self {
            client,
            identities: Cache::builder().max_capacity(MAX_IDENTITIES).build(),
        }
    }

    pub async fn resolve(&self, id: &str) -> Result<PersonIdentity, Arc<ClientError>> {
        self.identities
            .try_get_with(id.to_string(), self.client.identity(id))
            .await
    }

    /// Resolves every missing id concurrently and returns one row per input
    /// id, in input order. A failed id becomes an unresolved row.
    pub async fn resolve_batch(&self, ids: &[String]) -> Vec<VoterRow> {
        let mut seen = HashSet::new();
        let mut missing: Vec<&str> = Vec::new();
        for id in ids {
            if !self.identities.contains_key(id.as_str()) && seen.insert(id.as_str()) {
                missing.push(id.as_str());
            }
        }

        if !missing.is_empty() {
            tracing::debug!("Resolving {} voter identities", missing.len());
            let results =
                futures::future::join_all(missing.iter().map(|id| self.resolve(id))).await;
            for (id, result) in missing.iter().zip(results) {
                if let Err(e) = result {
                    tracing::warn!("Identity lookup for {} failed: {}", id, e);
                }
            }
        }

        let mut rows = Vec::with_capacity(ids.len());
        for id in ids {
            rows.push(match self.identities.get(id).await {
                Some(identity) => VoterRow::resolved(id, identity),
                None => VoterRow::unresolved(id),
            });
        }
        rows
    }

    pub async fn cached(&self, id: &str) -> Option<PersonIdentity> {
        self.identities.get(id).await
    }

    /// Resolved name, or the raw id while unknown.
    pub async fn display_name(&self, id: &str) -> String {
        self.cached(id)
            .await
            .map(|identity| identity.name)
            .unwrap_or_else(|| id.to_string())
    }
}
