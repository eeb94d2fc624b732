//! Remote OData V2 catalog gateway
//!
//! Read-only access to the product catalog service. Paths are composed as
//! `{service_path}/{entity_set}('{key}')` with a `$select` projection, and
//! the OData V2 JSON envelope (`d` for a single entity, `d.results` for a
//! collection) is unwrapped into plain records. Key literals are escaped
//! before being spliced into the key predicate.
//!
//! Every fault — transport, HTTP status, payload shape — surfaces as
//! [`BackendFailure::ProtocolError`].

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Map, Value as JsonValue};
use tracing::debug;
use url::Url;

use crate::config::DestinationConfig;
use crate::error::BackendFailure;
use crate::request::EntityRecord;

/// Typed read access to the remote catalog service
#[async_trait]
pub trait RemoteCatalogGateway: Send + Sync {
    /// Fetch every record of an entity set, restricted to the projection
    async fn query(
        &self,
        entity_set: &str,
        projection: &[&str],
    ) -> Result<Vec<EntityRecord>, BackendFailure>;

    /// Fetch a single record by key. The backend treats a missing key as a
    /// protocol fault, so there is no absent case here.
    async fn read_one(
        &self,
        entity_set: &str,
        key: &str,
        projection: &[&str],
    ) -> Result<EntityRecord, BackendFailure>;
}

/// Production client for the remote OData V2 catalog service
pub struct ODataCatalogClient {
    client: Client,
    base_url: Url,
    service_path: String,
}

impl ODataCatalogClient {
    pub fn from_config(destination: &DestinationConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(destination.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url =
            Url::parse(&destination.base_url).context("Invalid destination base URL")?;

        Ok(Self {
            client,
            base_url,
            service_path: destination.service_path.trim_matches('/').to_string(),
        })
    }

    /// Escape a key literal for embedding in a key predicate. OData escapes
    /// single quotes by doubling them.
    fn escape_key(key: &str) -> String {
        key.replace('\'', "''")
    }

    fn entity_url(&self, segment: &str) -> Result<Url, BackendFailure> {
        let path = format!("{}/{}", self.service_path, segment);
        self.base_url.join(&path).map_err(|err| {
            BackendFailure::protocol(format!("invalid entity path '{path}'")).caused_by(err)
        })
    }

    async fn fetch(&self, url: Url, projection: &[&str]) -> Result<JsonValue, BackendFailure> {
        debug!(url = %url, "executing remote catalog request");

        let select = projection.join(",");
        let response = self
            .client
            .get(url.clone())
            .query(&[("$format", "json"), ("$select", select.as_str())])
            .send()
            .await
            .map_err(|err| {
                BackendFailure::protocol(format!("request to {url} failed")).caused_by(err)
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(BackendFailure::protocol(format!(
                "remote catalog returned {status}: {detail}"
            )));
        }

        response.json().await.map_err(|err| {
            BackendFailure::protocol("remote catalog returned malformed JSON").caused_by(err)
        })
    }
}

/// Copy the projected fields out of a payload object
fn record_from_object(object: &Map<String, JsonValue>, projection: &[&str]) -> EntityRecord {
    projection
        .iter()
        .filter_map(|field| {
            object
                .get(*field)
                .map(|value| ((*field).to_string(), value.clone()))
        })
        .collect()
}

/// Unwrap a single-entity payload: `{ "d": { ...fields } }`
fn single_from_payload(
    payload: &JsonValue,
    projection: &[&str],
) -> Result<EntityRecord, BackendFailure> {
    payload
        .get("d")
        .and_then(JsonValue::as_object)
        .map(|object| record_from_object(object, projection))
        .ok_or_else(|| BackendFailure::protocol("expected OData V2 single-entity payload"))
}

/// Unwrap a collection payload: `{ "d": { "results": [ ... ] } }`
fn collection_from_payload(
    payload: &JsonValue,
    projection: &[&str],
) -> Result<Vec<EntityRecord>, BackendFailure> {
    let results = payload
        .get("d")
        .and_then(|d| d.get("results"))
        .and_then(JsonValue::as_array)
        .ok_or_else(|| BackendFailure::protocol("expected OData V2 collection payload"))?;

    results
        .iter()
        .map(|entry| {
            entry
                .as_object()
                .map(|object| record_from_object(object, projection))
                .ok_or_else(|| BackendFailure::protocol("collection entry is not an object"))
        })
        .collect()
}

#[async_trait]
impl RemoteCatalogGateway for ODataCatalogClient {
    async fn query(
        &self,
        entity_set: &str,
        projection: &[&str],
    ) -> Result<Vec<EntityRecord>, BackendFailure> {
        let url = self.entity_url(entity_set)?;
        let payload = self.fetch(url, projection).await?;
        collection_from_payload(&payload, projection)
    }

    async fn read_one(
        &self,
        entity_set: &str,
        key: &str,
        projection: &[&str],
    ) -> Result<EntityRecord, BackendFailure> {
        let segment = format!("{entity_set}('{}')", Self::escape_key(key));
        let url = self.entity_url(&segment)?;
        let payload = self.fetch(url, projection).await?;
        single_from_payload(&payload, projection)
    }
}
