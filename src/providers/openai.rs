//! Paid tier backed by an OpenAI-compatible chat completions endpoint.

use super::{Generation, GenerationProvider, GenerationRequest};
use crate::error::RouterError;
use crate::pricing;
use crate::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

const SYSTEM_PROMPT: &str = "You are a concise, empathetic wellbeing companion.";

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: Option<u32>,
    #[serde(default)]
    completion_tokens: Option<u32>,
}

/// One configured model on a chat completions API. The router holds two
/// instances of this provider: one for the mini model, one for turbo.
pub struct OpenAiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiProvider {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(8)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }
}

#[async_trait]
impl GenerationProvider for OpenAiProvider {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Generation> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": request.prompt},
            ],
            "max_tokens": request.max_tokens,
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            debug!(model = %self.model, status = %status, "completion request rejected");
            return Err(RouterError::upstream(format!(
                "{} returned HTTP {}",
                self.model,
                status.as_u16()
            )));
        }

        let completion: CompletionResponse = response.json().await?;
        let text = completion
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .unwrap_or("")
            .trim()
            .to_string();

        // Providers that omit usage still get charged on the estimate.
        let (est_in, est_out) = pricing::estimate_tokens(&request.prompt, request.max_tokens);
        let usage = completion.usage.unwrap_or(Usage {
            prompt_tokens: None,
            completion_tokens: None,
        });
        let tokens_in = usage.prompt_tokens.unwrap_or(est_in);
        let tokens_out = usage.completion_tokens.unwrap_or(est_out);
        let usd_cost = pricing::cost_for(&self.model, tokens_in, tokens_out);

        Ok(Generation {
            text,
            tokens_in,
            tokens_out,
            usd_cost,
        })
    }
}
