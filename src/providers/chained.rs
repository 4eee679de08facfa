//! Chained resolution: address registry, then free-text geocoding.

use async_trait::async_trait;
use tracing::debug;

use super::{CepProvider, NominatimClient, ProviderError, Resolution, ViaCepClient};
use crate::models::Cep;

/// Strategy A: resolve the CEP to its registered address via ViaCEP, then
/// geocode the address text via Nominatim.
///
/// ViaCEP carries no coordinates, so both stages are needed; a registry
/// miss short-circuits before the rate-limited geocoding stage.
pub struct ChainedProvider {
    registry: ViaCepClient,
    geocoder: NominatimClient,
}

impl ChainedProvider {
    pub fn new() -> Self {
        Self {
            registry: ViaCepClient::new(),
            geocoder: NominatimClient::new(),
        }
    }

    pub fn with_clients(registry: ViaCepClient, geocoder: NominatimClient) -> Self {
        Self { registry, geocoder }
    }
}

impl Default for ChainedProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CepProvider for ChainedProvider {
    fn id(&self) -> &'static str {
        "viacep+nominatim"
    }

    async fn resolve(&self, cep: &Cep) -> Result<Resolution, ProviderError> {
        // Registry miss is terminal: there is nothing to geocode.
        let Some(address) = self.registry.lookup(cep).await? else {
            return Ok(Resolution::Unresolvable);
        };

        let query = address.query_string();
        debug!("CEP {} -> {:?}", cep, query);

        match self.geocoder.search(&query).await? {
            Some(coordinate) => Ok(Resolution::Resolved(coordinate)),
            None => Ok(Resolution::Unresolvable),
        }
    }
}
