//! Rule caching keyed by name, tenant, and locale.
//!
//! Rules are deep-cloned on the way in and on the way out, so a cached
//! rule can never share mutable history with the copy a caller holds and
//! every retrieval is safe to evaluate concurrently.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tracing::{debug, warn};
use verdict_core::Rule;

use crate::RuntimeError;

/// Cache key for rules.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct CacheKey {
    name: String,
    tenant: String,
    locale: String,
}

impl CacheKey {
    fn new(name: &str, tenant: &str, locale: &str) -> Self {
        Self {
            name: name.to_string(),
            tenant: tenant.to_string(),
            locale: locale.to_string(),
        }
    }
}

/// Cache sizing and expiry.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of cached rules.
    pub max_entries: u64,

    /// How long an entry lives after insertion.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            ttl: Duration::from_secs(3600),
        }
    }
}

/// In-memory rule cache using moka.
///
/// Entries are type-erased so rules with different value types share one
/// cache; retrieval with the wrong value type is a miss, not an error.
pub struct RuleCache {
    cache: Cache<CacheKey, Arc<dyn Any + Send + Sync>>,
}

impl RuleCache {
    /// Create a cache with the given configuration.
    pub fn new(config: CacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_entries)
            .time_to_live(config.ttl)
            .build();

        Self { cache }
    }

    /// Store a deep clone of a rule under its name, tenant, and locale.
    pub async fn set<V>(&self, rule: &Rule<V>) -> Result<(), RuntimeError>
    where
        V: Clone + Send + Sync + 'static,
    {
        let key = CacheKey::new(rule.name(), rule.tenant(), rule.locale());
        let clone = rule.deep_clone()?;
        self.cache.insert(key, Arc::new(clone)).await;
        debug!(rule = rule.name(), tenant = rule.tenant(), "rule cached");
        Ok(())
    }

    /// Retrieve a deep clone of a cached rule.
    ///
    /// Returns `None` on a miss or when the cached entry was stored with
    /// a different value type.
    pub async fn get<V>(&self, name: &str, tenant: &str, locale: &str) -> Option<Rule<V>>
    where
        V: Clone + Send + Sync + 'static,
    {
        let key = CacheKey::new(name, tenant, locale);
        let entry = self.cache.get(&key).await?;
        let rule = entry.downcast_ref::<Rule<V>>()?;
        match rule.deep_clone() {
            Ok(clone) => Some(clone),
            Err(error) => {
                warn!(rule = name, %error, "cached rule failed to clone");
                None
            }
        }
    }

    /// Whether a rule is cached under this key.
    pub fn contains(&self, name: &str, tenant: &str, locale: &str) -> bool {
        self.cache.contains_key(&CacheKey::new(name, tenant, locale))
    }

    /// Remove a cached rule.
    pub async fn remove(&self, name: &str, tenant: &str, locale: &str) {
        self.cache.invalidate(&CacheKey::new(name, tenant, locale)).await;
    }

    /// Clear the cache.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    /// Number of cached rules.
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

impl Default for RuleCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}
