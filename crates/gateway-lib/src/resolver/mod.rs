//! Application name resolution
//!
//! Owns the roster snapshot and the process-lifetime resolution cache.
//! A name is matched at most once per process: subsequent lookups return
//! the cached identifier without touching the matcher. Concurrent first
//! lookups for the same name may race; both converge on an identifier and
//! the lost insert only costs one redundant matcher call.

mod llm;
mod matcher;

pub use llm::LlmMatcher;
pub use matcher::{ApplicationMatcher, NameSimilarityMatcher};

use crate::client::NewRelicClient;
use crate::error::Result;
use crate::models::Application;
use crate::observability::GatewayMetrics;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Resolves free-text application names to New Relic identifiers
pub struct AppResolver {
    roster: RwLock<Vec<Application>>,
    cache: DashMap<String, String>,
    matcher: Arc<dyn ApplicationMatcher>,
    metrics: GatewayMetrics,
}

impl AppResolver {
    pub fn new(matcher: Arc<dyn ApplicationMatcher>, metrics: GatewayMetrics) -> Self {
        Self {
            roster: RwLock::new(Vec::new()),
            cache: DashMap::new(),
            matcher,
            metrics,
        }
    }

    /// Load the roster snapshot. Applications added remotely afterwards stay
    /// invisible until this is called again.
    pub async fn initialize(&self, client: &NewRelicClient) -> Result<usize> {
        let applications = client.fetch_applications().await?;
        let count = applications.len();

        let mut roster = self.roster.write().await;
        *roster = applications;
        self.metrics.set_roster_size(count as i64);

        info!(count, "Application roster initialized");
        Ok(count)
    }

    /// Resolve an application name to its identifier.
    ///
    /// The matcher's answer is cached verbatim and never validated against
    /// the roster; a matcher failure caches nothing.
    pub async fn resolve(&self, name: &str) -> Result<String> {
        if let Some(cached) = self.cache.get(name) {
            self.metrics.inc_cache_hit();
            return Ok(cached.value().clone());
        }

        self.metrics.inc_cache_miss();
        let roster = self.roster.read().await;
        let app_id = match self.matcher.best_match(name, &roster).await {
            Ok(id) => id,
            Err(e) => {
                self.metrics.inc_resolution_failure();
                return Err(e);
            }
        };
        drop(roster);

        info!(application_name = %name, app_id = %app_id, "Resolved application id");
        self.cache.insert(name.to_string(), app_id.clone());
        Ok(app_id)
    }

    /// Number of applications in the current roster snapshot
    pub async fn roster_size(&self) -> usize {
        self.roster.read().await.len()
    }

    /// Number of names resolved so far
    pub fn cached_resolutions(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Matcher that counts invocations and echoes a fixed answer
    struct CountingMatcher {
        calls: AtomicUsize,
        answer: String,
    }

    impl CountingMatcher {
        fn new(answer: &str) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                answer: answer.to_string(),
            }
        }
    }

    #[async_trait]
    impl ApplicationMatcher for CountingMatcher {
        async fn best_match(&self, _name: &str, _roster: &[Application]) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.answer.clone())
        }
    }

    struct FailingMatcher;

    #[async_trait]
    impl ApplicationMatcher for FailingMatcher {
        async fn best_match(&self, _name: &str, _roster: &[Application]) -> Result<String> {
            Err(GatewayError::Resolution("model unavailable".into()))
        }
    }

    #[tokio::test]
    async fn test_cache_idempotence() {
        let matcher = Arc::new(CountingMatcher::new("1"));
        let resolver = AppResolver::new(matcher.clone(), GatewayMetrics::new());

        let first = resolver.resolve("Test App").await.unwrap();
        let second = resolver.resolve("Test App").await.unwrap();

        assert_eq!(first, "1");
        assert_eq!(second, "1");
        assert_eq!(matcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_distinct_names_each_resolve_once() {
        let matcher = Arc::new(CountingMatcher::new("7"));
        let resolver = AppResolver::new(matcher.clone(), GatewayMetrics::new());

        resolver.resolve("App A").await.unwrap();
        resolver.resolve("App B").await.unwrap();
        resolver.resolve("App A").await.unwrap();

        assert_eq!(matcher.calls.load(Ordering::SeqCst), 2);
        assert_eq!(resolver.cached_resolutions(), 2);
    }

    #[tokio::test]
    async fn test_matcher_answer_is_cached_unvalidated() {
        // Nothing in the roster carries id 999; the answer is trusted as-is.
        let matcher = Arc::new(CountingMatcher::new("999"));
        let resolver = AppResolver::new(matcher, GatewayMetrics::new());

        let id = resolver.resolve("Ghost App").await.unwrap();
        assert_eq!(id, "999");
    }

    #[tokio::test]
    async fn test_failed_resolution_caches_nothing() {
        let resolver = AppResolver::new(Arc::new(FailingMatcher), GatewayMetrics::new());

        let err = resolver.resolve("Test App").await.unwrap_err();
        assert!(matches!(err, GatewayError::Resolution(_)));
        assert_eq!(resolver.cached_resolutions(), 0);
    }

    #[tokio::test]
    async fn test_names_are_case_sensitive_cache_keys() {
        let matcher = Arc::new(CountingMatcher::new("1"));
        let resolver = AppResolver::new(matcher.clone(), GatewayMetrics::new());

        resolver.resolve("test app").await.unwrap();
        resolver.resolve("Test App").await.unwrap();

        assert_eq!(matcher.calls.load(Ordering::SeqCst), 2);
    }
}
