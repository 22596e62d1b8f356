//! Shared fixtures for integration tests: scripted providers and requests.

#![allow(dead_code)]

use async_trait::async_trait;
use companion_router::providers::{Generation, GenerationProvider, GenerationRequest};
use companion_router::{AskRequest, Identity, RequestKind, Result, RouterError};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Long enough to clear the minimum-length caching floor.
pub const LONG_REPLY: &str = "Похоже, день был непростым. Попробуй отметить одну вещь, \
которая сегодня всё-таки удалась, и поблагодарить себя за неё.";

/// A provider that follows a simple script: optionally fail the first N
/// calls, optionally wait on a gate, then return a fixed reply. Counts calls.
pub struct ScriptedProvider {
    model: String,
    text: String,
    cost: f64,
    fail_first: u32,
    calls: AtomicU32,
    gate: Option<Arc<Notify>>,
}

impl ScriptedProvider {
    pub fn new(model: &str, text: &str, cost: f64) -> Self {
        Self {
            model: model.to_string(),
            text: text.to_string(),
            cost,
            fail_first: 0,
            calls: AtomicU32::new(0),
            gate: None,
        }
    }

    pub fn mini() -> Self {
        Self::new("gpt-4-mini", LONG_REPLY, 0.01)
    }

    pub fn turbo() -> Self {
        Self::new("gpt-4-turbo", LONG_REPLY, 0.04)
    }

    /// Fails every call.
    pub fn broken(model: &str) -> Self {
        Self::new(model, "", 0.0).failing_first(u32::MAX)
    }

    pub fn failing_first(mut self, calls: u32) -> Self {
        self.fail_first = calls;
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }

    /// Block each call until the gate is notified.
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationProvider for ScriptedProvider {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Generation> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if call < self.fail_first {
            return Err(RouterError::upstream(format!("{} unavailable", self.model)));
        }
        let tokens_in = (request.prompt.split_whitespace().count() as u32).max(1);
        Ok(Generation {
            text: self.text.clone(),
            tokens_in,
            tokens_out: 50,
            usd_cost: self.cost,
        })
    }
}

pub fn ask(user: &str, kind: RequestKind, text: &str) -> AskRequest {
    AskRequest::new(Identity::user(user), kind, text)
}
