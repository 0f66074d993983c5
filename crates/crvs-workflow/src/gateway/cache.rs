//! TTL cache for slowly-changing FHIR resources.
//!
//! Practitioners, their roles and Locations are read on every transition
//! but rarely change, so they are kept for a configurable time. Tasks are
//! never put here: the duplicate-status check must see the persisted state.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::RwLock;

/// Configuration for the resource cache.
#[derive(Debug, Clone)]
pub struct ResourceCacheConfig {
    /// Time-to-live for cached resources. Zero disables caching.
    pub ttl: Duration,
    /// Resource types that may be cached.
    pub cacheable_types: Vec<String>,
}

impl Default for ResourceCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            cacheable_types: vec![
                "Practitioner".to_string(),
                "PractitionerRole".to_string(),
                "Location".to_string(),
            ],
        }
    }
}

impl ResourceCacheConfig {
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

struct CachedResource {
    resource: Value,
    fetched_at: Instant,
}

/// In-memory cache of resources keyed by `Type/id`.
pub struct ResourceCache {
    entries: Arc<RwLock<HashMap<String, CachedResource>>>,
    config: ResourceCacheConfig,
}

impl ResourceCache {
    #[must_use]
    pub fn new(config: ResourceCacheConfig) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    /// Whether resources of this type are cached at all.
    pub fn caches(&self, resource_type: &str) -> bool {
        !self.config.ttl.is_zero()
            && self
                .config
                .cacheable_types
                .iter()
                .any(|t| t == resource_type)
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        let entries = self.entries.read().await;
        let cached = entries.get(key)?;
        if cached.fetched_at.elapsed() < self.config.ttl {
            tracing::trace!(key, "resource cache hit");
            Some(cached.resource.clone())
        } else {
            tracing::trace!(key, "resource cache entry expired");
            None
        }
    }

    /// Stores a resource, dropping entries whose TTL has passed.
    pub async fn insert(&self, key: impl Into<String>, resource: Value) {
        let ttl = self.config.ttl;
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, cached| cached.fetched_at.elapsed() < ttl);
        let evicted = before - entries.len();
        if evicted > 0 {
            tracing::debug!(evicted, "evicted expired cached resources");
        }
        entries.insert(
            key.into(),
            CachedResource {
                resource,
                fetched_at: Instant::now(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cacheable_types() {
        let cache = ResourceCache::new(ResourceCacheConfig::default());
        assert!(cache.caches("Location"));
        assert!(cache.caches("Practitioner"));
        assert!(cache.caches("PractitionerRole"));
        assert!(!cache.caches("Task"));

        let disabled = ResourceCache::new(ResourceCacheConfig::default().with_ttl(Duration::ZERO));
        assert!(!disabled.caches("Location"));
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let cache = ResourceCache::new(ResourceCacheConfig::default());
        cache
            .insert("Location/L1", json!({ "resourceType": "Location", "id": "L1" }))
            .await;

        assert_eq!(cache.get("Location/L1").await.unwrap()["id"], "L1");
        assert!(cache.get("Location/L2").await.is_none());
    }

    #[tokio::test]
    async fn test_expired_entries_are_ignored_and_evicted_on_insert() {
        let cache = ResourceCache::new(
            ResourceCacheConfig::default().with_ttl(Duration::from_secs(60)),
        );
        cache.entries.write().await.insert(
            "Location/L1".to_string(),
            CachedResource {
                resource: json!({}),
                fetched_at: Instant::now() - Duration::from_secs(120),
            },
        );

        assert!(cache.get("Location/L1").await.is_none());
        cache.insert("Location/L2", json!({ "id": "L2" })).await;

        let entries = cache.entries.read().await;
        assert_eq!(entries.len(), 1);
        assert!(entries.contains_key("Location/L2"));
    }
}
