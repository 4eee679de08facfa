//! Resolution orchestrator.
//!
//! Drives the cache-then-provider loop over a batch of raw postal codes.
//! Codes are processed strictly sequentially: the geocoding stage is
//! globally rate limited, so concurrency would only violate the provider's
//! policy. A run may be interrupted between any two codes without losing
//! work, because the cache is flushed incrementally.

use std::collections::{BTreeMap, HashSet};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::cache::{CacheError, GeocodeCache};
use crate::models::{Cep, Coordinate};
use crate::providers::{CepProvider, Resolution};

/// Flush cadence matching roughly one write per ten network round trips.
const DEFAULT_FLUSH_EVERY: usize = 10;

/// Counters for one resolver run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ResolveStats {
    /// Raw input strings seen.
    pub total: usize,
    /// Inputs with no canonical 8-digit form.
    pub invalid: usize,
    /// Unique canonical CEPs after deduplication.
    pub unique: usize,
    /// Unique CEPs already cached before this run.
    pub cache_hits: usize,
    /// Newly resolved to a coordinate.
    pub resolved: usize,
    /// Newly confirmed unresolvable.
    pub unresolvable: usize,
    /// Transient failures, left uncached for a later retry.
    pub failed: usize,
}

/// Result of a resolver run: counters plus the coordinate mapping for
/// every input CEP with a positive cache entry, whether from this run or
/// an earlier one.
#[derive(Debug)]
pub struct ResolveOutcome {
    pub stats: ResolveStats,
    pub coordinates: BTreeMap<Cep, Coordinate>,
}

/// Orchestrates cache lookups and provider calls for a batch of codes.
///
/// Invariant: once a CEP has a cache entry, positive or negative, the
/// provider is never invoked for it again.
pub struct Resolver {
    cache: GeocodeCache,
    provider: Box<dyn CepProvider>,
    flush_every: usize,
    limit: Option<usize>,
    progress: bool,
}

impl Resolver {
    pub fn new(cache: GeocodeCache, provider: Box<dyn CepProvider>) -> Self {
        Self {
            cache,
            provider,
            flush_every: DEFAULT_FLUSH_EVERY,
            limit: None,
            progress: false,
        }
    }

    /// Flush the cache after every `n` new entries (1 = write-through).
    pub fn flush_every(mut self, n: usize) -> Self {
        self.flush_every = n.max(1);
        self
    }

    /// Cap the number of uncached CEPs attempted this run.
    pub fn limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// The cache view (for stats/debugging).
    pub fn cache(&self) -> &GeocodeCache {
        &self.cache
    }

    /// Resolve a batch of raw postal-code strings.
    ///
    /// A provider failure on one code never aborts the batch; it is
    /// logged and the loop moves on.
    pub async fn run<I, S>(&mut self, raw_codes: I) -> Result<ResolveOutcome, CacheError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut stats = ResolveStats::default();

        // Normalize and deduplicate, preserving first-seen order. The
        // same CEP recurs across many records; each gets one attempt.
        let mut seen = HashSet::new();
        let mut queue: Vec<Cep> = Vec::new();
        for raw in raw_codes {
            stats.total += 1;
            match Cep::parse(raw.as_ref()) {
                Some(cep) => {
                    if seen.insert(cep.clone()) {
                        queue.push(cep);
                    }
                }
                None => stats.invalid += 1,
            }
        }
        stats.unique = queue.len();

        info!(
            "{} raw codes: {} unique, {} invalid",
            stats.total, stats.unique, stats.invalid
        );

        let pb = if self.progress {
            let pb = ProgressBar::new(queue.len() as u64);
            let style = ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-");
            pb.set_style(style);
            Some(pb)
        } else {
            None
        };

        let mut pending_flush = 0usize;
        let mut attempted = 0usize;

        for cep in &queue {
            if let Some(pb) = &pb {
                pb.inc(1);
            }

            if self.cache.get(cep).is_some() {
                stats.cache_hits += 1;
                continue;
            }

            if self.limit.is_some_and(|limit| attempted >= limit) {
                continue;
            }
            attempted += 1;

            match self.provider.resolve(cep).await {
                Ok(Resolution::Resolved(coordinate)) => {
                    debug!("CEP {} -> ({}, {})", cep, coordinate.lat, coordinate.lon);
                    self.cache.insert(cep.clone(), Some(coordinate));
                    stats.resolved += 1;
                    pending_flush += 1;
                }
                Ok(Resolution::Unresolvable) => {
                    debug!("CEP {} has no coordinates", cep);
                    self.cache.insert(cep.clone(), None);
                    stats.unresolvable += 1;
                    pending_flush += 1;
                }
                Err(e) => {
                    // Left uncached so a later run retries it.
                    warn!("Failed to resolve CEP {} via {}: {}", cep, self.provider.id(), e);
                    stats.failed += 1;
                }
            }

            if pending_flush >= self.flush_every {
                self.cache.persist()?;
                debug!("Cache flushed ({} entries)", self.cache.len());
                pending_flush = 0;
            }
        }

        if pending_flush > 0 {
            self.cache.persist()?;
        }

        if let Some(pb) = &pb {
            pb.finish_with_message("Resolution complete");
        }

        let mut coordinates = BTreeMap::new();
        for cep in queue {
            if let Some(Some(coordinate)) = self.cache.get(&cep) {
                coordinates.insert(cep, *coordinate);
            }
        }

        info!(
            "{} with coordinates ({} cached before this run, {} unresolvable, {} failed)",
            coordinates.len(),
            stats.cache_hits,
            stats.unresolvable,
            stats.failed
        );

        Ok(ResolveOutcome { stats, coordinates })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::*;
    use crate::providers::ProviderError;

    /// Scripted provider: per-CEP outcomes plus a call log.
    struct FakeProvider {
        coords: HashMap<&'static str, Coordinate>,
        failing: Vec<&'static str>,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl FakeProvider {
        fn new() -> Self {
            Self {
                coords: HashMap::new(),
                failing: Vec::new(),
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn resolving(mut self, cep: &'static str, lat: f64, lon: f64) -> Self {
            self.coords.insert(cep, Coordinate { lat, lon });
            self
        }

        fn failing_on(mut self, cep: &'static str) -> Self {
            self.failing.push(cep);
            self
        }

        fn call_log(&self) -> Arc<Mutex<Vec<String>>> {
            self.calls.clone()
        }
    }

    #[async_trait]
    impl CepProvider for FakeProvider {
        fn id(&self) -> &'static str {
            "fake"
        }

        async fn resolve(&self, cep: &Cep) -> Result<Resolution, ProviderError> {
            self.calls.lock().unwrap().push(cep.to_string());
            if self.failing.contains(&cep.as_str()) {
                return Err(ProviderError::Schema("scripted failure".to_string()));
            }
            match self.coords.get(cep.as_str()) {
                Some(c) => Ok(Resolution::Resolved(*c)),
                None => Ok(Resolution::Unresolvable),
            }
        }
    }

    fn load_cache(path: &Path) -> GeocodeCache {
        GeocodeCache::load(path).unwrap()
    }

    #[tokio::test]
    async fn test_duplicates_and_invalid_inputs_collapse() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let provider = FakeProvider::new().resolving("70040902", -15.7998, -47.8645);
        let calls = provider.call_log();

        let mut resolver = Resolver::new(load_cache(&path), Box::new(provider));
        let outcome = resolver
            .run(["70040-902", "70040902", "70.040-902", "bogus"])
            .await
            .unwrap();

        assert_eq!(outcome.stats.total, 4);
        assert_eq!(outcome.stats.invalid, 1);
        assert_eq!(outcome.stats.unique, 1);
        assert_eq!(outcome.stats.resolved, 1);
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_warm_cache_makes_no_provider_calls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let provider = FakeProvider::new()
            .resolving("70040902", -15.7998, -47.8645)
            .resolving("01310100", -23.5614, -46.6558);
        let mut resolver = Resolver::new(load_cache(&path), Box::new(provider));
        let first = resolver.run(["70040-902", "01310-100"]).await.unwrap();
        assert_eq!(first.stats.resolved, 2);

        // Fresh resolver over the persisted cache.
        let provider = FakeProvider::new();
        let calls = provider.call_log();
        let mut resolver = Resolver::new(load_cache(&path), Box::new(provider));
        let second = resolver.run(["70040-902", "01310-100"]).await.unwrap();

        assert!(calls.lock().unwrap().is_empty());
        assert_eq!(second.stats.cache_hits, 2);
        assert_eq!(second.coordinates, first.coordinates);
    }

    #[tokio::test]
    async fn test_one_failure_does_not_abort_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let provider = FakeProvider::new()
            .resolving("70040902", -15.7998, -47.8645)
            .resolving("20040002", -22.9068, -43.1729)
            .failing_on("01310100");

        let mut resolver = Resolver::new(load_cache(&path), Box::new(provider));
        let outcome = resolver
            .run(["70040902", "01310100", "20040002"])
            .await
            .unwrap();

        assert_eq!(outcome.stats.resolved, 2);
        assert_eq!(outcome.stats.failed, 1);
        assert_eq!(outcome.coordinates.len(), 2);
        assert!(!outcome
            .coordinates
            .contains_key(&Cep::parse("01310100").unwrap()));
    }

    #[tokio::test]
    async fn test_unresolvable_is_cached_and_never_retried() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let provider = FakeProvider::new();
        let mut resolver = Resolver::new(load_cache(&path), Box::new(provider));
        let outcome = resolver.run(["99999-999"]).await.unwrap();
        assert_eq!(outcome.stats.unresolvable, 1);

        let provider = FakeProvider::new();
        let calls = provider.call_log();
        let mut resolver = Resolver::new(load_cache(&path), Box::new(provider));
        let outcome = resolver.run(["99999-999"]).await.unwrap();

        assert!(calls.lock().unwrap().is_empty());
        assert_eq!(outcome.stats.cache_hits, 1);
        assert!(outcome.coordinates.is_empty());
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried_on_the_next_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let provider = FakeProvider::new().failing_on("70040902");
        let mut resolver = Resolver::new(load_cache(&path), Box::new(provider));
        let outcome = resolver.run(["70040902"]).await.unwrap();
        assert_eq!(outcome.stats.failed, 1);

        // No cache entry was written, so the next run tries again.
        let provider = FakeProvider::new().resolving("70040902", -15.7998, -47.8645);
        let calls = provider.call_log();
        let mut resolver = Resolver::new(load_cache(&path), Box::new(provider));
        let outcome = resolver.run(["70040902"]).await.unwrap();

        assert_eq!(calls.lock().unwrap().len(), 1);
        assert_eq!(outcome.stats.resolved, 1);
    }

    #[tokio::test]
    async fn test_run_persists_terminal_outcomes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let provider = FakeProvider::new().resolving("70040902", -15.7998, -47.8645);
        let mut resolver = Resolver::new(load_cache(&path), Box::new(provider)).flush_every(100);
        resolver.run(["70040902", "99999999"]).await.unwrap();

        // Even with a large flush cadence, the final flush lands on disk.
        let reloaded = load_cache(&path);
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.resolved_count(), 1);
    }

    #[tokio::test]
    async fn test_limit_caps_provider_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let provider = FakeProvider::new()
            .resolving("70040902", -15.7998, -47.8645)
            .resolving("01310100", -23.5614, -46.6558);
        let calls = provider.call_log();

        let mut resolver =
            Resolver::new(load_cache(&path), Box::new(provider)).limit(Some(1));
        let outcome = resolver.run(["70040902", "01310100"]).await.unwrap();

        assert_eq!(calls.lock().unwrap().len(), 1);
        assert_eq!(outcome.stats.resolved, 1);
    }
}
