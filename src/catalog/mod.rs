//! External catalog API client.
//!
//! The catalog is paged with `offset`/`limit` parameters and authenticated
//! with a client id plus bearer token. Pages are requested sorted ascending
//! by id so a sweep's coverage holds even when pages are fetched out of
//! order or re-fetched.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::error::CatalogError;
use crate::models::{CatalogConfig, CatalogRecord};

/// The catalog capability: fetch one page of records. Trait seam so the
/// gatherer can run against fakes in tests.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_page(&self, offset: u64, limit: u32) -> Result<Vec<CatalogRecord>, CatalogError>;
}

/// HTTP client for the catalog API.
#[derive(Debug)]
pub struct CatalogClient {
    client: Client,
    url: String,
    client_id: String,
    access_token: String,
}

impl CatalogClient {
    /// Create a client from configuration, resolving credentials from the
    /// config file or environment.
    pub fn new(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let client_id = config.resolve_client_id().ok_or_else(|| {
            CatalogError::MissingCredentials(
                "client id not configured (set TWITCH_CLIENT_ID)".to_string(),
            )
        })?;
        let access_token = config.resolve_access_token().ok_or_else(|| {
            CatalogError::MissingCredentials(
                "access token not configured (set TWITCH_APP_ACCESS_TOKEN)".to_string(),
            )
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CatalogError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            url: config.url.clone(),
            client_id,
            access_token,
        })
    }

    fn page_query(offset: u64, limit: u32) -> String {
        format!(
            "fields id,name,summary,storyline,url;\nsort id asc;\nlimit {limit};\noffset {offset};\n"
        )
    }
}

#[async_trait]
impl CatalogSource for CatalogClient {
    async fn fetch_page(&self, offset: u64, limit: u32) -> Result<Vec<CatalogRecord>, CatalogError> {
        debug!(offset, limit, "fetching catalog page");

        let response = self
            .client
            .post(&self.url)
            .header("Accept", "application/json")
            .header("Client-ID", &self.client_id)
            .bearer_auth(&self.access_token)
            .body(Self::page_query(offset, limit))
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    CatalogError::ConnectionError(e.to_string())
                } else {
                    CatalogError::RequestError(e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogError::Status { status, body });
        }

        response
            .json::<Vec<CatalogRecord>>()
            .await
            .map_err(|e| CatalogError::InvalidResponse(e.to_string()))
    }
}
