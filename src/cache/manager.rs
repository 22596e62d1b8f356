//! High-level response cache.

use super::backend::CacheBackend;
use crate::fingerprint::RequestFingerprint;
use crate::types::Source;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// Responses shorter than this (trimmed) are not worth caching.
const MIN_CACHEABLE_CHARS: usize = 60;

/// A cached answer together with the accounting data of the call that
/// produced it. Read-only once stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedResponse {
    pub text: String,
    pub model: String,
    /// Tier that originally generated the response, not `cache`.
    pub source: Source,
    pub tokens_in: u32,
    pub tokens_out: u32,
    pub usd_cost: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub stores: u64,
    pub skipped: u64,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct AtomicStats {
    hits: AtomicU64,
    misses: AtomicU64,
    stores: AtomicU64,
    skipped: AtomicU64,
}

/// TTL-bound cache of resolved responses, keyed by request fingerprint.
pub struct ResponseCache {
    backend: Box<dyn CacheBackend>,
    ttl: Duration,
    stats: AtomicStats,
}

impl ResponseCache {
    pub fn new(backend: Box<dyn CacheBackend>, ttl: Duration) -> Self {
        Self {
            backend,
            ttl,
            stats: AtomicStats {
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                stores: AtomicU64::new(0),
                skipped: AtomicU64::new(0),
            },
        }
    }

    /// Look up a fresh entry. Expired or corrupt entries count as misses.
    pub async fn lookup(&self, key: &RequestFingerprint) -> Option<CachedResponse> {
        match self.backend.get(key).await {
            Ok(Some(data)) => match serde_json::from_slice(&data) {
                Ok(entry) => {
                    self.stats.hits.fetch_add(1, Ordering::Relaxed);
                    Some(entry)
                }
                Err(err) => {
                    debug!(key = %key, error = %err, "dropping undecodable cache entry");
                    let _ = self.backend.delete(key).await;
                    self.stats.misses.fetch_add(1, Ordering::Relaxed);
                    None
                }
            },
            Ok(None) => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(err) => {
                debug!(key = %key, error = %err, "cache lookup failed");
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a response unless it falls under the minimum-length floor.
    /// Storage failures are swallowed; the cache is an optimization.
    pub async fn store(&self, key: &RequestFingerprint, entry: &CachedResponse) -> Result<()> {
        if entry.text.trim().chars().count() < MIN_CACHEABLE_CHARS {
            self.stats.skipped.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        }
        let data = serde_json::to_vec(entry)?;
        match self.backend.set(key, &data, self.ttl).await {
            Ok(()) => {
                self.stats.stores.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(err) => {
                debug!(key = %key, error = %err, "cache store failed");
                Ok(())
            }
        }
    }

    pub async fn clear(&self) -> Result<()> {
        self.backend.clear().await
    }

    pub async fn len(&self) -> usize {
        self.backend.len().await.unwrap_or(0)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            stores: self.stats.stores.load(Ordering::Relaxed),
            skipped: self.stats.skipped.load(Ordering::Relaxed),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }
}
