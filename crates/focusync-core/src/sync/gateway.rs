//! Remote store boundary.
//!
//! [`RemoteGateway`] is the contract the coordinator drains against.
//! [`HttpGateway`] speaks it over a PostgREST-style REST API.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::GatewayError;
use crate::sync::record_codec::{record_to_row, row_to_record, EntityRecord};
use crate::sync::types::EntityType;

/// Remote store operations, one entity type at a time.
///
/// Each call is treated as atomic: it either applies fully or fails.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// Insert or replace a record.
    async fn create_or_update(
        &self,
        entity_type: EntityType,
        record: &EntityRecord,
    ) -> Result<(), GatewayError>;

    /// Delete a record by id. Deleting a missing record succeeds.
    async fn delete(&self, entity_type: EntityType, id: &str) -> Result<(), GatewayError>;

    /// Every record of `entity_type` visible to the caller.
    async fn fetch_all(&self, entity_type: EntityType) -> Result<Vec<EntityRecord>, GatewayError>;
}

/// REST gateway. Each entity type maps to `{base_url}/{table}`.
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
}

impl HttpGateway {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| GatewayError::NotConfigured(format!("invalid base url {base_url}: {e}")))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::NotConfigured(e.to_string()))?;
        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    fn table_url(&self, entity_type: EntityType) -> Result<Url, GatewayError> {
        self.base_url
            .join(entity_type.table_name())
            .map_err(|e| GatewayError::NotConfigured(e.to_string()))
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.api_key {
            Some(key) => builder.header("apikey", key).bearer_auth(key),
            None => builder,
        }
    }

    async fn check(response: Response) -> Result<Response, GatewayError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(GatewayError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl RemoteGateway for HttpGateway {
    async fn create_or_update(
        &self,
        entity_type: EntityType,
        record: &EntityRecord,
    ) -> Result<(), GatewayError> {
        let url = self.table_url(entity_type)?;
        debug!(%entity_type, id = %record.id, "upserting remote record");
        let response = self
            .request(Method::POST, url)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&[record_to_row(record)])
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn delete(&self, entity_type: EntityType, id: &str) -> Result<(), GatewayError> {
        let mut url = self.table_url(entity_type)?;
        url.query_pairs_mut().append_pair("id", &format!("eq.{id}"));
        debug!(%entity_type, %id, "deleting remote record");
        let response = self.request(Method::DELETE, url).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn fetch_all(&self, entity_type: EntityType) -> Result<Vec<EntityRecord>, GatewayError> {
        let mut url = self.table_url(entity_type)?;
        url.query_pairs_mut().append_pair("select", "*");
        let response = self.request(Method::GET, url).send().await?;
        let rows: Vec<serde_json::Value> = Self::check(response).await?.json().await?;
        debug!(%entity_type, count = rows.len(), "fetched remote records");
        rows.iter().map(|row| row_to_record(entity_type, row)).collect()
    }
}
