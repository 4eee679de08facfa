//! Ipê - CEP geocoding resolver with a durable cache.
//!
//! Converts Brazilian postal codes into geographic coordinates by chaining
//! rate-limited public services, caching every terminal outcome so re-runs
//! cost nothing for codes already seen.

pub mod cache;
pub mod models;
pub mod providers;
pub mod resolver;

pub use models::{Cep, Coordinate, ResolvedAddress};
