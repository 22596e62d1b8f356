//! Usage accounting.
//!
//! Every resolved request emits exactly one [`AccountingRecord`], whatever
//! tier answered it, so dashboards can compute hit-rate ratios across
//! template, cache, paid and local resolutions. Records flow into an
//! [`AccountingSink`]; sink failures are logged and swallowed, never
//! surfaced on the response path.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`AccountingRecord`] | Immutable per-request usage record |
//! | [`AccountingSink`] | Trait for record destinations |
//! | [`MemorySink`] | Bounded history plus aggregate counters |
//! | [`TracingSink`] | Emits records as structured log events |
//! | [`NoopSink`] | Discards everything |

mod memory;
mod sink;

pub use memory::{MemorySink, RouterStats};
pub use sink::{NoopSink, TracingSink};
pub use sink::AccountingSink;

use crate::types::{RequestKind, Source};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One resolved request, as consumed by analytics and the admin dashboard.
/// Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountingRecord {
    pub id: Uuid,
    pub at: DateTime<Utc>,
    pub source: Source,
    pub model: String,
    pub kind: RequestKind,
    pub tokens_in: u32,
    pub tokens_out: u32,
    pub usd_cost: f64,
    /// Pseudonymous requester identifier; absent for system-initiated work.
    pub user: Option<String>,
    pub latency_ms: u64,
}

/// An administrative mutation, kept as a small audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminEvent {
    pub at: DateTime<Utc>,
    pub actor: String,
    pub action: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_serializes_with_its_id() {
        let record = AccountingRecord {
            id: Uuid::new_v4(),
            at: Utc::now(),
            source: Source::Mini,
            model: "gpt-4-mini".into(),
            kind: RequestKind::MoodReply,
            tokens_in: 12,
            tokens_out: 40,
            usd_cost: 0.01,
            user: Some("abc123".into()),
            latency_ms: 250,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains(&record.id.to_string()));
        let back: AccountingRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, record.id);
    }
}
