//! In-memory cache backed by moka
//!
//! Values are stored as JSON text so one cache can hold any serialisable
//! type. Each entry carries its own TTL, enforced through a moka `Expiry`.

use super::CacheLayer;
use anyhow::{Context, Result};
use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

const DEFAULT_MAX_CAPACITY: u64 = 1_000;
const DEFAULT_TTL: Duration = Duration::from_secs(300);

#[derive(Clone)]
struct CacheEntry {
    json: Arc<String>,
    ttl: Duration,
}

impl CacheEntry {
    fn new<T: Serialize>(value: &T, ttl: Duration) -> Result<Self> {
        let json = serde_json::to_string(value).context("Failed to serialize cache value")?;
        Ok(Self {
            json: Arc::new(json),
            ttl,
        })
    }

    fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.json).context("Failed to deserialize cache value")
    }
}

/// Expire each entry after the TTL it was stored with; overwrites restart the clock
struct PerEntryTtl;

impl Expiry<String, CacheEntry> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-memory cache using moka
pub struct MemoryCache {
    cache: Cache<String, CacheEntry>,
    default_ttl: Duration,
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entry_count", &self.cache.entry_count())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::with_capacity_and_ttl(DEFAULT_MAX_CAPACITY, DEFAULT_TTL)
    }

    /// Create a cache holding at most `max_capacity` entries.
    ///
    /// `default_ttl` is what callers get from [`MemoryCache::default_ttl`];
    /// every `set` still names its own TTL.
    pub fn with_capacity_and_ttl(max_capacity: u64, default_ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(PerEntryTtl)
            .build();

        Self { cache, default_ttl }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Flush moka's pending maintenance so counts and expiries are current
    pub async fn sync(&self) {
        self.cache.run_pending_tasks().await;
    }

    /// Glob match where `*` is any run of characters and `?` exactly one
    fn pattern_matches(pattern: &str, key: &str) -> bool {
        let pattern: Vec<char> = pattern.chars().collect();
        let key: Vec<char> = key.chars().collect();

        let (mut p, mut k) = (0, 0);
        // Position of the last `*` seen and the key index it is currently absorbing up to
        let mut backtrack: Option<(usize, usize)> = None;

        while k < key.len() {
            match pattern.get(p) {
                Some('*') => {
                    backtrack = Some((p, k));
                    p += 1;
                }
                Some(&c) if c == '?' || c == key[k] => {
                    p += 1;
                    k += 1;
                }
                _ => match backtrack {
                    Some((star, absorbed)) => {
                        p = star + 1;
                        k = absorbed + 1;
                        backtrack = Some((star, absorbed + 1));
                    }
                    None => return false,
                },
            }
        }

        pattern[p..].iter().all(|c| *c == '*')
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheLayer for MemoryCache {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>> {
        match self.cache.get(key).await {
            Some(entry) => Ok(Some(entry.decode()?)),
            None => Ok(None),
        }
    }

    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        let entry = CacheEntry::new(value, ttl)?;
        self.cache.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.cache.invalidate(key).await;
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<()> {
        let matching: Vec<String> = self
            .cache
            .iter()
            .filter(|(key, _)| Self::pattern_matches(pattern, key.as_str()))
            .map(|(key, _)| (*key).clone())
            .collect();

        tracing::debug!(pattern, count = matching.len(), "Invalidating cache entries");
        for key in matching {
            self.cache.invalidate(&key).await;
        }
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_and_missing() {
        let cache = MemoryCache::new();

        cache.set("key1", &"value1".to_string(), Duration::from_secs(60)).await.unwrap();

        let hit: Option<String> = cache.get("key1").await.unwrap();
        let miss: Option<String> = cache.get("nonexistent").await.unwrap();
        assert_eq!(hit, Some("value1".to_string()));
        assert_eq!(miss, None);
    }

    #[tokio::test]
    async fn test_entry_expires_after_its_own_ttl() {
        let cache = MemoryCache::with_capacity_and_ttl(100, Duration::from_secs(3600));

        cache.set("short", &1u32, Duration::from_millis(50)).await.unwrap();
        cache.set("long", &2u32, Duration::from_secs(60)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;
        cache.sync().await;

        assert_eq!(cache.get::<u32>("short").await.unwrap(), None);
        assert_eq!(cache.get::<u32>("long").await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_overwrite_and_delete() {
        let cache = MemoryCache::new();

        cache.set("key1", &"value1".to_string(), Duration::from_secs(60)).await.unwrap();
        cache.set("key1", &"value2".to_string(), Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get::<String>("key1").await.unwrap(), Some("value2".to_string()));

        cache.delete("key1").await.unwrap();
        assert_eq!(cache.get::<String>("key1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_pattern() {
        let cache = MemoryCache::new();
        let ttl = Duration::from_secs(60);
        cache.set("items:list:all", &1, ttl).await.unwrap();
        cache.set("items:list:clothing", &2, ttl).await.unwrap();
        cache.set("news:list", &3, ttl).await.unwrap();

        cache.delete_pattern("items:*").await.unwrap();

        assert_eq!(cache.get::<i32>("items:list:all").await.unwrap(), None);
        assert_eq!(cache.get::<i32>("items:list:clothing").await.unwrap(), None);
        assert_eq!(cache.get::<i32>("news:list").await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn test_clear_and_entry_count() {
        let cache = MemoryCache::new();
        cache.set("a", &1, Duration::from_secs(60)).await.unwrap();
        cache.set("b", &2, Duration::from_secs(60)).await.unwrap();
        cache.sync().await;
        assert_eq!(cache.entry_count(), 2);

        cache.clear().await.unwrap();

        assert_eq!(cache.get::<i32>("a").await.unwrap(), None);
        assert_eq!(cache.entry_count(), 0);
    }

    #[tokio::test]
    async fn test_structured_values() {
        #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
        struct Listing {
            names: Vec<String>,
            total: usize,
        }
        let cache = MemoryCache::new();
        let listing = Listing {
            names: vec!["Scarf".to_string(), "Boots".to_string()],
            total: 2,
        };

        cache.set("listing", &listing, Duration::from_secs(60)).await.unwrap();

        assert_eq!(cache.get::<Listing>("listing").await.unwrap(), Some(listing));
    }

    #[test]
    fn test_pattern_matches() {
        assert!(MemoryCache::pattern_matches("items:*", "items:list:all"));
        assert!(MemoryCache::pattern_matches("items:*", "items:"));
        assert!(MemoryCache::pattern_matches("*:all", "items:list:all"));
        assert!(MemoryCache::pattern_matches("*", "anything"));
        assert!(MemoryCache::pattern_matches("*", ""));
        assert!(!MemoryCache::pattern_matches("items:*", "news:1"));

        assert!(MemoryCache::pattern_matches("user:?:x", "user:1:x"));
        assert!(!MemoryCache::pattern_matches("user:?:x", "user:10:x"));
        assert!(MemoryCache::pattern_matches("a*b*c", "a-b-b-c"));
        assert!(!MemoryCache::pattern_matches("a*b*c", "a-b-b-d"));

        assert!(MemoryCache::pattern_matches("exact", "exact"));
        assert!(!MemoryCache::pattern_matches("exact", "exactx"));
        assert!(!MemoryCache::pattern_matches("exactx", "exact"));
    }
}
