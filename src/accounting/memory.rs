//! In-memory accounting with aggregate views.

use super::sink::AccountingSink;
use super::{AccountingRecord, AdminEvent};
use crate::types::{RequestKind, Source};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::RwLock;

const MAX_ADMIN_EVENTS: usize = 256;

/// Cumulative counters over a set of records, the shape the admin surface
/// renders.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RouterStats {
    pub requests: u64,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub usd_cost: f64,
    pub by_source: HashMap<Source, u64>,
    pub by_kind: HashMap<RequestKind, u64>,
    pub cache_hits: u64,
}

impl RouterStats {
    fn add(&mut self, record: &AccountingRecord) {
        self.requests += 1;
        self.tokens_in += u64::from(record.tokens_in);
        self.tokens_out += u64::from(record.tokens_out);
        self.usd_cost += record.usd_cost;
        *self.by_source.entry(record.source).or_default() += 1;
        *self.by_kind.entry(record.kind).or_default() += 1;
        if record.source == Source::Cache {
            self.cache_hits += 1;
        }
    }

    pub fn cache_hit_ratio(&self) -> f64 {
        if self.requests == 0 {
            0.0
        } else {
            self.cache_hits as f64 / self.requests as f64
        }
    }
}

struct Inner {
    history: Vec<AccountingRecord>,
    admin_events: Vec<AdminEvent>,
    totals: RouterStats,
}

/// Bounded in-memory sink providing the history and stats views consumed by
/// the administrative control plane.
pub struct MemorySink {
    capacity: usize,
    inner: RwLock<Inner>,
}

impl MemorySink {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: RwLock::new(Inner {
                history: Vec::new(),
                admin_events: Vec::new(),
                totals: RouterStats::default(),
            }),
        }
    }

    /// Most recent records first.
    pub fn history(&self, limit: usize) -> Vec<AccountingRecord> {
        let inner = self.inner.read().unwrap();
        inner.history.iter().rev().take(limit).cloned().collect()
    }

    /// Aggregate counters since process start (the totals survive history
    /// truncation).
    pub fn totals(&self) -> RouterStats {
        self.inner.read().unwrap().totals.clone()
    }

    /// Aggregate counters over retained records not older than `since`.
    pub fn stats_since(&self, since: DateTime<Utc>) -> RouterStats {
        let inner = self.inner.read().unwrap();
        let mut stats = RouterStats::default();
        for record in inner.history.iter().filter(|r| r.at >= since) {
            stats.add(record);
        }
        stats
    }

    pub fn admin_events(&self) -> Vec<AdminEvent> {
        self.inner.read().unwrap().admin_events.clone()
    }
}

#[async_trait]
impl AccountingSink for MemorySink {
    async fn record(&self, record: AccountingRecord) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.totals.add(&record);
        inner.history.push(record);
        if inner.history.len() > self.capacity {
            let overflow = inner.history.len() - self.capacity;
            inner.history.drain(..overflow);
        }
        Ok(())
    }

    async fn admin_event(&self, event: AdminEvent) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.admin_events.push(event);
        if inner.admin_events.len() > MAX_ADMIN_EVENTS {
            let overflow = inner.admin_events.len() - MAX_ADMIN_EVENTS;
            inner.admin_events.drain(..overflow);
        }
        Ok(())
    }
}
