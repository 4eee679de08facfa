//! Direct structured-geocoder lookup keyed by postal code.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{CepProvider, ProviderError, Resolution, USER_AGENT};
use crate::models::{Cep, Coordinate};

const TIMEOUT: Duration = Duration::from_secs(10);
const RESULT_LIMIT: usize = 1;

/// Strategy B: one call to a Pelias-style structured-search endpoint with
/// the postal code as the key.
///
/// The endpoint is a deployment choice (a regional instance), so the base
/// URL is required rather than defaulted.
pub struct DirectProvider {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    geometry: Geometry,
}

/// GeoJSON geometry: coordinates are ordered longitude, latitude.
#[derive(Debug, Deserialize)]
struct Geometry {
    coordinates: [f64; 2],
}

impl Feature {
    /// Swap the wire's `[lon, lat]` into the lat-first coordinate type.
    fn coordinate(&self) -> Coordinate {
        let [lon, lat] = self.geometry.coordinates;
        Coordinate { lat, lon }
    }
}

impl DirectProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent(USER_AGENT)
                .timeout(TIMEOUT)
                .build()
                .expect("Failed to create HTTP client"),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl CepProvider for DirectProvider {
    fn id(&self) -> &'static str {
        "direct"
    }

    async fn resolve(&self, cep: &Cep) -> Result<Resolution, ProviderError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("postalcode", cep.as_str().to_string()),
                ("size", RESULT_LIMIT.to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::Status(response.status()));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Schema(e.to_string()))?;

        match body.features.first() {
            Some(feature) => Ok(Resolution::Resolved(feature.coordinate())),
            None => {
                debug!("No geocoder results for CEP {}", cep);
                Ok(Resolution::Unresolvable)
            }
        }
    }
}
