//! Accounting sinks.

use super::{AccountingRecord, AdminEvent};
use crate::Result;
use async_trait::async_trait;
use tracing::info;

/// Destination for accounting records.
///
/// Implementations must return quickly; a sink backed by slow storage should
/// buffer internally. The router logs and drops any error a sink returns.
#[async_trait]
pub trait AccountingSink: Send + Sync {
    async fn record(&self, record: AccountingRecord) -> Result<()>;

    /// Administrative audit events. Optional; defaults to a no-op.
    async fn admin_event(&self, _event: AdminEvent) -> Result<()> {
        Ok(())
    }
}

/// Discards all records.
pub struct NoopSink;

#[async_trait]
impl AccountingSink for NoopSink {
    async fn record(&self, _record: AccountingRecord) -> Result<()> {
        Ok(())
    }
}

/// Emits records as structured log events.
pub struct TracingSink;

#[async_trait]
impl AccountingSink for TracingSink {
    async fn record(&self, record: AccountingRecord) -> Result<()> {
        info!(
            source = record.source.as_str(),
            kind = record.kind.as_str(),
            model = %record.model,
            tokens_in = record.tokens_in,
            tokens_out = record.tokens_out,
            usd_cost = record.usd_cost,
            latency_ms = record.latency_ms,
            "ai request resolved"
        );
        Ok(())
    }

    async fn admin_event(&self, event: AdminEvent) -> Result<()> {
        info!(actor = %event.actor, action = %event.action, "admin action");
        Ok(())
    }
}
