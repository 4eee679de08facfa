//! Nominatim (OpenStreetMap) forward-geocoding client.

use std::time::Duration;

use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use super::throttle::RateGate;
use super::{ProviderError, USER_AGENT};
use crate::models::Coordinate;

const NOMINATIM_ENDPOINT: &str = "https://nominatim.openstreetmap.org/search";
/// Nominatim's usage policy: at most one request per second.
const MIN_INTERVAL: Duration = Duration::from_secs(1);
const TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the Nominatim free-text search endpoint.
///
/// All calls funnel through one shared rate gate, so consecutive requests
/// are at least [`MIN_INTERVAL`] apart no matter who calls.
pub struct NominatimClient {
    client: reqwest::Client,
    base_url: String,
    gate: Mutex<RateGate>,
}

/// Nominatim returns lat/lon as strings.
#[derive(Debug, Deserialize)]
struct SearchResult {
    lat: String,
    lon: String,
}

impl SearchResult {
    fn coordinate(&self) -> Result<Coordinate, ProviderError> {
        let lat = self.lat.parse::<f64>().map_err(|_| {
            ProviderError::Schema(format!("non-numeric latitude {:?}", self.lat))
        })?;
        let lon = self.lon.parse::<f64>().map_err(|_| {
            ProviderError::Schema(format!("non-numeric longitude {:?}", self.lon))
        })?;
        Ok(Coordinate { lat, lon })
    }
}

impl NominatimClient {
    pub fn new() -> Self {
        Self::with_base_url(NOMINATIM_ENDPOINT)
    }

    /// Point the client at a different Nominatim instance (self-hosted,
    /// tests).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent(USER_AGENT)
                .timeout(TIMEOUT)
                .build()
                .expect("Failed to create HTTP client"),
            base_url: base_url.into(),
            gate: Mutex::new(RateGate::new(MIN_INTERVAL)),
        }
    }

    /// Geocode a free-text query, returning the first match if any.
    ///
    /// Waits out the inter-request interval before every call.
    pub async fn search(&self, query: &str) -> Result<Option<Coordinate>, ProviderError> {
        self.gate.lock().await.wait().await;

        let response = self
            .client
            .get(&self.base_url)
            .query(&[("q", query), ("format", "json"), ("limit", "1")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::Status(response.status()));
        }

        let results: Vec<SearchResult> = response
            .json()
            .await
            .map_err(|e| ProviderError::Schema(e.to_string()))?;

        match results.first() {
            Some(first) => Ok(Some(first.coordinate()?)),
            None => {
                debug!("No geocoding results for {:?}", query);
                Ok(None)
            }
        }
    }
}

impl Default for NominatimClient {
    fn default() -> Self {
        Self::new()
    }
}
