//! Generation tiers.
//!
//! Each paid or free generation strategy sits behind the
//! [`GenerationProvider`] trait so the router can be exercised with mock
//! providers in tests.
//!
//! | Provider | Tier | Cost |
//! |----------|------|------|
//! | [`OpenAiProvider`] | mini / turbo | per-token, see [`crate::pricing`] |
//! | [`LocalProvider`] | local | always zero |
//! | [`TemplateCatalog`] | template | always zero, no generation at all |

mod local;
mod openai;
mod template;

pub use local::LocalProvider;
pub use openai::OpenAiProvider;
pub use template::TemplateCatalog;

use crate::types::{Locale, RequestKind};
use crate::Result;
use async_trait::async_trait;

/// Input to one generation call.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub kind: RequestKind,
    pub locale: Locale,
    pub max_tokens: u32,
}

/// Output of one successful generation call.
#[derive(Debug, Clone)]
pub struct Generation {
    pub text: String,
    pub tokens_in: u32,
    pub tokens_out: u32,
    pub usd_cost: f64,
}

/// An upstream generation collaborator.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Model identifier reported in accounting records.
    fn model(&self) -> &str;

    async fn generate(&self, request: &GenerationRequest) -> Result<Generation>;
}
