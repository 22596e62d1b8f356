//! Cache backend implementations.

use crate::clock::Clock;
use crate::fingerprint::RequestFingerprint;
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

#[derive(Clone)]
struct StoredEntry {
    data: Vec<u8>,
    created_at: DateTime<Utc>,
    ttl: Duration,
    last_accessed: DateTime<Utc>,
}

impl StoredEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match chrono::Duration::from_std(self.ttl) {
            Ok(ttl) => now > self.created_at + ttl,
            Err(_) => false,
        }
    }
}

#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &RequestFingerprint) -> Result<Option<Vec<u8>>>;
    async fn set(&self, key: &RequestFingerprint, value: &[u8], ttl: Duration) -> Result<()>;
    async fn delete(&self, key: &RequestFingerprint) -> Result<bool>;
    async fn clear(&self) -> Result<()>;
    async fn len(&self) -> Result<usize>;
    fn name(&self) -> &'static str;
}

/// In-memory backend. Expired entries are dropped on lookup; when the
/// capacity is reached, the least recently accessed entry is evicted.
pub struct MemoryCache {
    entries: Arc<RwLock<HashMap<String, StoredEntry>>>,
    max_entries: usize,
    clock: Arc<dyn Clock>,
}

impl MemoryCache {
    pub fn new(max_entries: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            max_entries: max_entries.max(1),
            clock,
        }
    }

    fn evict_if_needed(&self, entries: &mut HashMap<String, StoredEntry>, now: DateTime<Utc>) {
        entries.retain(|_, e| !e.is_expired(now));
        while entries.len() >= self.max_entries {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.last_accessed)
                .map(|(k, _)| k.clone());
            if let Some(k) = oldest {
                entries.remove(&k);
            } else {
                break;
            }
        }
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &RequestFingerprint) -> Result<Option<Vec<u8>>> {
        let now = self.clock.now();
        let mut entries = self.entries.write().unwrap();
        if let Some(entry) = entries.get_mut(key.as_str()) {
            if entry.is_expired(now) {
                entries.remove(key.as_str());
                return Ok(None);
            }
            entry.last_accessed = now;
            return Ok(Some(entry.data.clone()));
        }
        Ok(None)
    }

    async fn set(&self, key: &RequestFingerprint, value: &[u8], ttl: Duration) -> Result<()> {
        let now = self.clock.now();
        let mut entries = self.entries.write().unwrap();
        self.evict_if_needed(&mut entries, now);
        entries.insert(
            key.as_str().to_string(),
            StoredEntry {
                data: value.to_vec(),
                created_at: now,
                ttl,
                last_accessed: now,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &RequestFingerprint) -> Result<bool> {
        Ok(self.entries.write().unwrap().remove(key.as_str()).is_some())
    }

    async fn clear(&self) -> Result<()> {
        self.entries.write().unwrap().clear();
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        let now = self.clock.now();
        Ok(self
            .entries
            .read()
            .unwrap()
            .values()
            .filter(|e| !e.is_expired(now))
            .count())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// No-op backend: every lookup is a miss.
pub struct NullCache;

impl NullCache {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NullCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for NullCache {
    async fn get(&self, _: &RequestFingerprint) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }
    async fn set(&self, _: &RequestFingerprint, _: &[u8], _: Duration) -> Result<()> {
        Ok(())
    }
    async fn delete(&self, _: &RequestFingerprint) -> Result<bool> {
        Ok(false)
    }
    async fn clear(&self) -> Result<()> {
        Ok(())
    }
    async fn len(&self) -> Result<usize> {
        Ok(0)
    }
    fn name(&self) -> &'static str {
        "null"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::types::{Locale, RequestKind};

    fn fp(text: &str) -> RequestFingerprint {
        RequestFingerprint::compute(RequestKind::MoodReply, text, Locale::Ru)
    }

    #[tokio::test]
    async fn entries_expire_by_manual_clock() {
        let clock = Arc::new(ManualClock::fixed());
        let cache = MemoryCache::new(16, clock.clone());
        let key = fp("tired");
        cache
            .set(&key, b"rest", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(cache.get(&key).await.unwrap(), Some(b"rest".to_vec()));

        clock.advance(chrono::Duration::seconds(61));
        assert_eq!(cache.get(&key).await.unwrap(), None);
        // Opportunistic eviction removed the entry physically.
        assert_eq!(cache.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn capacity_evicts_least_recently_accessed() {
        let clock = Arc::new(ManualClock::fixed());
        let cache = MemoryCache::new(2, clock.clone());
        let (a, b, c) = (fp("a"), fp("b"), fp("c"));
        cache.set(&a, b"1", Duration::from_secs(600)).await.unwrap();
        clock.advance(chrono::Duration::seconds(1));
        cache.set(&b, b"2", Duration::from_secs(600)).await.unwrap();
        clock.advance(chrono::Duration::seconds(1));
        // Touch `a` so `b` becomes the eviction candidate.
        cache.get(&a).await.unwrap();
        clock.advance(chrono::Duration::seconds(1));
        cache.set(&c, b"3", Duration::from_secs(600)).await.unwrap();

        assert!(cache.get(&a).await.unwrap().is_some());
        assert!(cache.get(&b).await.unwrap().is_none());
        assert!(cache.get(&c).await.unwrap().is_some());
    }
}
