//! ViaCEP address-registry client.

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use super::{ProviderError, USER_AGENT};
use crate::models::{Cep, ResolvedAddress};

const VIACEP_ENDPOINT: &str = "https://viacep.com.br/ws";
const TIMEOUT: Duration = Duration::from_secs(5);

/// Client for the ViaCEP postal-code registry.
pub struct ViaCepClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ViaCepResponse {
    /// Present when the CEP does not exist in the registry.
    #[serde(default)]
    erro: Option<serde_json::Value>,
    #[serde(default)]
    logradouro: String,
    #[serde(default)]
    bairro: String,
    #[serde(default)]
    localidade: String,
    #[serde(default)]
    uf: String,
}

impl ViaCepResponse {
    fn into_address(self) -> Option<ResolvedAddress> {
        if self.erro.is_some() {
            return None;
        }
        Some(ResolvedAddress {
            street: self.logradouro,
            neighborhood: self.bairro,
            city: self.localidade,
            state: self.uf,
        })
    }
}

impl ViaCepClient {
    pub fn new() -> Self {
        Self::with_base_url(VIACEP_ENDPOINT)
    }

    /// Point the client at a different registry instance (mirrors, tests).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent(USER_AGENT)
                .timeout(TIMEOUT)
                .build()
                .expect("Failed to create HTTP client"),
            base_url: base_url.into(),
        }
    }

    /// Look up the address registered for a CEP.
    ///
    /// `Ok(None)` means the registry definitively has no such CEP.
    pub async fn lookup(&self, cep: &Cep) -> Result<Option<ResolvedAddress>, ProviderError> {
        let url = format!("{}/{}/json/", self.base_url, cep);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(ProviderError::Status(response.status()));
        }

        let body: ViaCepResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Schema(e.to_string()))?;

        let address = body.into_address();
        if address.is_none() {
            debug!("CEP {} not in registry", cep);
        }
        Ok(address)
    }
}

impl Default for ViaCepClient {
    fn default() -> Self {
        Self::new()
    }
}
