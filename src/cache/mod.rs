//! Response caching.
//!
//! The cache maps a [`RequestFingerprint`] to a previously produced answer so
//! that repeated identical requests are served without another upstream call.
//! Expired entries behave as misses and are evicted opportunistically on
//! lookup; there is no background sweep and no durability across restarts.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`ResponseCache`] | TTL, minimum-length floor, hit/miss statistics |
//! | [`CacheBackend`] | Trait for pluggable storage |
//! | [`MemoryCache`] | In-memory backend with capacity-bound eviction |
//! | [`NullCache`] | No-op backend for disabling caching |
//!
//! [`RequestFingerprint`]: crate::fingerprint::RequestFingerprint

mod backend;
mod manager;

pub use backend::{CacheBackend, MemoryCache, NullCache};
pub use manager::{CacheStats, CachedResponse, ResponseCache};
