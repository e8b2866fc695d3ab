//! Catalog retrieval with silent fallback.

use std::sync::Arc;

use mrga_proto::error::CatalogFetchError;
use mrga_proto::fallback::fallback_stations;
use mrga_proto::protocol::Station;
use reqwest::Client;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct CatalogClient {
    client: Client,
    endpoint: String,
}

impl CatalogClient {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}/api/radio-stations", base_url.trim_end_matches('/')),
        }
    }

    /// Fetch the catalog, substituting the built-in stations on any failure.
    pub async fn fetch(&self) -> Vec<Arc<Station>> {
        let stations = match self.try_fetch().await {
            Ok(stations) => {
                info!(
                    "CatalogClient: loaded {} stations from {}",
                    stations.len(),
                    self.endpoint
                );
                stations
            }
            Err(e) => {
                warn!(
                    "CatalogClient: {} unavailable ({}), using built-in stations",
                    self.endpoint, e
                );
                fallback_stations()
            }
        };
        stations.into_iter().map(Arc::new).collect()
    }

    pub async fn try_fetch(&self) -> Result<Vec<Station>, CatalogFetchError> {
        let response = self.client.get(&self.endpoint).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CatalogFetchError::Status(status.as_u16()));
        }
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}
