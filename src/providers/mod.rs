//! Resolution providers.
//!
//! Two interchangeable strategies behind one contract: the chained
//! registry-then-geocoder pipeline and the direct structured geocoder.
//! "Not found" is an ordinary outcome, never an error; only
//! transport-level failures surface as errors, and those are never cached
//! so a later run retries them.

mod chained;
mod direct;
mod nominatim;
mod throttle;
mod viacep;

pub use chained::ChainedProvider;
pub use direct::DirectProvider;
pub use nominatim::NominatimClient;
pub use throttle::RateGate;
pub use viacep::ViaCepClient;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::models::{Cep, Coordinate};

/// Identifying User-Agent sent to the external services. Nominatim's
/// usage policy requires one.
pub(crate) const USER_AGENT: &str = "ipe/0.1 (CEP geocoder)";

/// Outcome of a provider attempt for a single CEP.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution {
    /// The provider produced a coordinate.
    Resolved(Coordinate),
    /// The provider confirmed no data exists for this CEP. Terminal and
    /// cacheable.
    Unresolvable,
}

/// Transport-level failure: network, timeout, bad status, or a response
/// the client cannot make sense of. Never cached, so the next run retries
/// the CEP.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(reqwest::StatusCode),

    #[error("unexpected response shape: {0}")]
    Schema(String),
}

/// Common contract for resolution strategies.
#[async_trait]
pub trait CepProvider: Send + Sync {
    /// Short identifier for log lines.
    fn id(&self) -> &'static str;

    /// Resolve one CEP to a coordinate, or report that none exists.
    async fn resolve(&self, cep: &Cep) -> Result<Resolution, ProviderError>;
}

/// Deployment-time strategy selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// ViaCEP address lookup chained into Nominatim search.
    Chained,
    /// Single structured-geocoder call keyed by postal code.
    Direct,
}
