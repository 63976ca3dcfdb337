//! Datasource cache with LRU eviction and lazy TTL expiry.
//!
//! Times come from [`tokio::time::Instant`] so expiry follows tokio's
//! clock, which tests can pause and advance.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::Duration;

use lru::LruCache;
use serde::Serialize;
use tokio::time::Instant;
use tracing::debug;

const DEFAULT_MAX_ENTRIES: usize = 100;

/// A cached value. Owned by the cache; callers only ever get copies.
#[derive(Debug, Clone)]
struct CacheEntry {
  value: serde_json::Value,
  inserted_at: Instant,
  expires_at: Instant,
  last_accessed_at: Instant,
  stale: bool,
}

impl CacheEntry {
  fn is_expired(&self, now: Instant) -> bool {
    now >= self.expires_at
  }
}

/// Copy of a cache hit.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedValue {
  pub value: serde_json::Value,
  /// Marked stale by an invalidation; still present until it expires.
  pub stale: bool,
  pub inserted_at: Instant,
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
  pub hits: u64,
  pub misses: u64,
  pub hit_rate: f64,
  pub size: usize,
  pub evictions: u64,
}

struct Inner {
  entries: LruCache<String, CacheEntry>,
  hits: u64,
  misses: u64,
  evictions: u64,
}

/// Cache shared by every datasource instance.
///
/// All operations take one lock, so `get`, `set` and eviction are each
/// atomic.
pub struct DatasourceCache {
  inner: Mutex<Inner>,
}

impl DatasourceCache {
  /// Create a cache holding at most `max_entries` values (minimum 1).
  pub fn new(max_entries: usize) -> Self {
    let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
    Self {
      inner: Mutex::new(Inner {
        entries: LruCache::new(capacity),
        hits: 0,
        misses: 0,
        evictions: 0,
      }),
    }
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
    self.inner.lock().unwrap_or_else(|e| e.into_inner())
  }

  /// Look up `key`, refreshing its recency. Expired entries are removed
  /// and reported as a miss.
  pub fn get(&self, key: &str) -> Option<CachedValue> {
    let now = Instant::now();
    let mut guard = self.lock();
    let inner = &mut *guard;

    let expired = match inner.entries.get_mut(key) {
      Some(entry) if !entry.is_expired(now) => {
        entry.last_accessed_at = now;
        let hit = CachedValue {
          value: entry.value.clone(),
          stale: entry.stale,
          inserted_at: entry.inserted_at,
        };
        inner.hits += 1;
        return Some(hit);
      }
      Some(_) => true,
      None => false,
    };

    if expired {
      inner.entries.pop(key);
      debug!(key, "cache entry expired");
    }
    inner.misses += 1;
    None
  }

  /// Store `value` under `key` for `ttl`, evicting the least recently used
  /// entry when full.
  pub fn set(&self, key: &str, value: serde_json::Value, ttl: Duration) {
    let now = Instant::now();
    let entry = CacheEntry {
      value,
      inserted_at: now,
      expires_at: now + ttl,
      last_accessed_at: now,
      stale: false,
    };

    let mut guard = self.lock();
    let inner = &mut *guard;
    if let Some((evicted, _)) = inner.entries.push(key.to_string(), entry) {
      if evicted != key {
        inner.evictions += 1;
        debug!(key = %evicted, "cache entry evicted");
      }
    }
  }

  /// Remove `key`. Returns whether it was present.
  pub fn invalidate(&self, key: &str) -> bool {
    self.lock().entries.pop(key).is_some()
  }

  /// Remove every key belonging to `datasource_id`, whatever its params.
  pub fn invalidate_prefix(&self, datasource_id: &str) -> usize {
    let prefix = format!("{}:", datasource_id);
    let mut inner = self.lock();
    let keys: Vec<String> = inner
      .entries
      .iter()
      .filter(|(k, _)| k.starts_with(&prefix))
      .map(|(k, _)| k.clone())
      .collect();
    for key in &keys {
      inner.entries.pop(key);
    }
    keys.len()
  }

  /// Flag `key` as stale without removing it. Returns whether it was present.
  pub fn mark_stale(&self, key: &str) -> bool {
    match self.lock().entries.peek_mut(key) {
      Some(entry) => {
        entry.stale = true;
        true
      }
      None => false,
    }
  }

  /// Eagerly drop every expired entry. Returns how many were removed.
  pub fn sweep_expired(&self) -> usize {
    let now = Instant::now();
    let mut inner = self.lock();
    let expired: Vec<String> = inner
      .entries
      .iter()
      .filter(|(_, entry)| entry.is_expired(now))
      .map(|(k, _)| k.clone())
      .collect();
    for key in &expired {
      inner.entries.pop(key);
    }
    expired.len()
  }

  /// Remove every entry. Statistics are kept.
  pub fn clear(&self) {
    self.lock().entries.clear();
  }

  pub fn len(&self) -> usize {
    self.lock().entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// When `key` was last read or written, if present. Does not touch recency.
  pub fn last_accessed_at(&self, key: &str) -> Option<Instant> {
    self.lock().entries.peek(key).map(|e| e.last_accessed_at)
  }

  pub fn stats(&self) -> CacheStats {
    let inner = self.lock();
    let lookups = inner.hits + inner.misses;
    CacheStats {
      hits: inner.hits,
      misses: inner.misses,
      hit_rate: if lookups == 0 {
        0.0
      } else {
        inner.hits as f64 / lookups as f64
      },
      size: inner.entries.len(),
      evictions: inner.evictions,
    }
  }
}

impl Default for DatasourceCache {
  fn default() -> Self {
    Self::new(DEFAULT_MAX_ENTRIES)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  const MINUTE: Duration = Duration::from_secs(60);

  #[tokio::test(start_paused = true)]
  async fn test_expired_entry_is_miss() {
    let cache = DatasourceCache::new(10);
    cache.set("k", json!(1), Duration::from_millis(50));

    tokio::time::advance(Duration::from_millis(40)).await;
    assert_eq!(cache.get("k").map(|c| c.value), Some(json!(1)));

    tokio::time::advance(Duration::from_millis(20)).await;
    assert_eq!(cache.get("k"), None);
    assert_eq!(cache.len(), 0);
  }

  #[tokio::test(start_paused = true)]
  async fn test_lru_evicts_least_recently_accessed() {
    let cache = DatasourceCache::new(2);
    cache.set("a", json!("a"), MINUTE);
    cache.set("b", json!("b"), MINUTE);

    // Touch "a" so "b" becomes the eviction candidate
    assert!(cache.get("a").is_some());
    cache.set("c", json!("c"), MINUTE);

    assert!(cache.get("a").is_some());
    assert!(cache.get("b").is_none());
    assert!(cache.get("c").is_some());
    assert_eq!(cache.stats().evictions, 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_eviction_ignores_remaining_ttl() {
    let cache = DatasourceCache::new(1);
    cache.set("long", json!(1), Duration::from_secs(3600));
    cache.set("short", json!(2), Duration::from_millis(1));

    assert!(cache.get("long").is_none());
  }

  #[tokio::test(start_paused = true)]
  async fn test_overwrite_is_not_eviction() {
    let cache = DatasourceCache::new(1);
    cache.set("k", json!(1), MINUTE);
    cache.set("k", json!(2), MINUTE);

    assert_eq!(cache.get("k").map(|c| c.value), Some(json!(2)));
    assert_eq!(cache.stats().evictions, 0);
  }

  #[tokio::test(start_paused = true)]
  async fn test_stats() {
    let cache = DatasourceCache::new(10);
    cache.set("k", json!(1), MINUTE);

    cache.get("k");
    cache.get("k");
    cache.get("k");
    cache.get("missing");

    let stats = cache.stats();
    assert_eq!(stats.hits, 3);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hit_rate, 0.75);
    assert_eq!(stats.size, 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_mark_stale_keeps_value() {
    let cache = DatasourceCache::new(10);
    cache.set("k", json!(1), MINUTE);

    assert!(cache.mark_stale("k"));
    let hit = cache.get("k").unwrap();
    assert!(hit.stale);
    assert_eq!(hit.value, json!(1));

    // Writing again clears the flag
    cache.set("k", json!(2), MINUTE);
    assert!(!cache.get("k").unwrap().stale);
  }

  #[tokio::test(start_paused = true)]
  async fn test_invalidate_prefix() {
    let cache = DatasourceCache::new(10);
    cache.set("users:{\"page\":1}", json!(1), MINUTE);
    cache.set("users:{\"page\":2}", json!(2), MINUTE);
    cache.set("usersettings:{}", json!(3), MINUTE);

    assert_eq!(cache.invalidate_prefix("users"), 2);
    assert_eq!(cache.len(), 1);
    assert!(cache.get("usersettings:{}").is_some());
  }

  #[tokio::test(start_paused = true)]
  async fn test_sweep_expired() {
    let cache = DatasourceCache::new(10);
    cache.set("short", json!(1), Duration::from_millis(10));
    cache.set("long", json!(2), MINUTE);

    tokio::time::advance(Duration::from_millis(20)).await;
    assert_eq!(cache.sweep_expired(), 1);
    assert_eq!(cache.len(), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_get_refreshes_last_accessed() {
    let cache = DatasourceCache::new(10);
    cache.set("k", json!(1), MINUTE);
    let written = cache.last_accessed_at("k").unwrap();

    tokio::time::advance(Duration::from_secs(5)).await;
    cache.get("k");

    assert_eq!(
      cache.last_accessed_at("k").unwrap() - written,
      Duration::from_secs(5)
    );
  }

  #[test]
  fn test_returned_values_are_copies() {
    let cache = DatasourceCache::default();
    cache.set("k", json!({ "n": 1 }), MINUTE);

    let mut copy = cache.get("k").unwrap().value;
    copy["n"] = json!(99);

    assert_eq!(cache.get("k").unwrap().value, json!({ "n": 1 }));
  }
}
