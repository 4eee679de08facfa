//! Durable resolution cache.

mod store;

pub use store::{CacheError, GeocodeCache};
