//! Router configuration.
//!
//! Values come from three places, in increasing priority: built-in defaults,
//! an optional YAML file, and environment variables. All paths end in
//! [`RouterConfig::validate`], which rejects inconsistent limits before a
//! router is built.

use crate::error::RouterError;
use crate::router::RouterMode;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const MIN_CACHE_TTL_SECS: u64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// API key for the paid tiers. `None` disables mini/turbo entirely.
    pub api_key: Option<String>,
    /// Base URL of the OpenAI-compatible endpoint.
    pub api_base_url: String,
    /// Model served by the mini (cheap) tier.
    pub model_mini: String,
    /// Model served by the turbo (expensive) tier.
    pub model_turbo: String,

    /// Daily soft spend limit in USD; beyond it, paid requests degrade to mini.
    pub soft_limit_usd: f64,
    /// Daily hard spend limit in USD; beyond it, only the local tier runs.
    pub hard_limit_usd: f64,

    /// Initial router mode.
    pub mode: RouterMode,
    /// Whether the daily digest batch job is allowed to run.
    pub batch_enabled: bool,

    /// Response cache TTL in seconds (floored at 60).
    pub cache_ttl_secs: u64,
    /// Maximum number of cached responses held in memory.
    pub cache_max_entries: usize,

    /// Output token allowance for quick kinds.
    pub max_tokens_quick: u32,
    /// Output token allowance for deep kinds.
    pub max_tokens_deep: u32,

    /// Upper bound on any single generation call, in seconds.
    pub request_timeout_secs: u64,
    /// Additional attempts at the same tier after a failure.
    pub retry_attempts: u32,

    /// Per-identity request quota within the rate window.
    pub rate_limit_requests: u32,
    /// Rate-limit window length in seconds.
    pub rate_limit_window_secs: u64,

    /// Accounting records retained by the in-memory sink.
    pub history_capacity: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base_url: "https://api.openai.com/v1".into(),
            model_mini: "gpt-4-mini".into(),
            model_turbo: "gpt-4-turbo".into(),
            soft_limit_usd: 0.35,
            hard_limit_usd: 0.50,
            mode: RouterMode::Auto,
            batch_enabled: false,
            cache_ttl_secs: 86_400,
            cache_max_entries: 4_096,
            max_tokens_quick: 120,
            max_tokens_deep: 400,
            request_timeout_secs: 10,
            retry_attempts: 1,
            rate_limit_requests: 20,
            rate_limit_window_secs: 60,
            history_capacity: 10_000,
        }
    }
}

impl RouterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a YAML file, then apply environment overrides.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: RouterConfig = serde_yaml::from_str(&content)
            .map_err(|e| RouterError::config(format!("failed to parse config file: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Build from environment variables on top of the defaults.
    ///
    /// Unknown or malformed values fall back to the default rather than
    /// failing startup; only structurally invalid limit combinations are
    /// rejected.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            if !key.trim().is_empty() {
                config.api_key = Some(key);
            }
        }
        if let Ok(url) = std::env::var("OPENAI_BASE_URL") {
            config.api_base_url = url;
        }
        if let Ok(model) = std::env::var("OPENAI_MODEL_PRIMARY") {
            config.model_mini = model;
        }
        if let Ok(model) = std::env::var("OPENAI_MODEL_DEEP") {
            config.model_turbo = model;
        }
        if let Some(v) = env_parse::<f64>("OPENAI_SOFT_LIMIT_USD") {
            config.soft_limit_usd = v;
        }
        if let Some(v) = env_parse::<f64>("OPENAI_DAILY_LIMIT_USD") {
            config.hard_limit_usd = v;
        }
        if let Ok(mode) = std::env::var("AI_ROUTER_MODE") {
            config.mode = RouterMode::from_tag(&mode);
        }
        if let Some(v) = env_parse::<bool>("OPENAI_ENABLE_BATCH") {
            config.batch_enabled = v;
        }
        if let Some(v) = env_parse::<u64>("AI_CACHE_TTL_SEC") {
            config.cache_ttl_secs = v;
        }
        if let Some(v) = env_parse::<u32>("AI_MAX_TOKENS_QUICK") {
            config.max_tokens_quick = v;
        }
        if let Some(v) = env_parse::<u32>("AI_MAX_TOKENS_DEEP") {
            config.max_tokens_deep = v;
        }
        if let Some(v) = env_parse::<u64>("AI_REQUEST_TIMEOUT_SEC") {
            config.request_timeout_secs = v;
        }
        if let Some(v) = env_parse::<u32>("AI_RATE_LIMIT_REQUESTS") {
            config.rate_limit_requests = v;
        }
        if let Some(v) = env_parse::<u64>("AI_RATE_LIMIT_WINDOW_SEC") {
            config.rate_limit_window_secs = v;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_limits(mut self, soft: f64, hard: f64) -> Self {
        self.soft_limit_usd = soft;
        self.hard_limit_usd = hard;
        self
    }

    pub fn with_mode(mut self, mode: RouterMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl_secs = ttl.as_secs();
        self
    }

    pub fn with_rate_limit(mut self, requests: u32, window: Duration) -> Self {
        self.rate_limit_requests = requests;
        self.rate_limit_window_secs = window.as_secs();
        self
    }

    pub fn with_batch_enabled(mut self, enabled: bool) -> Self {
        self.batch_enabled = enabled;
        self
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs.max(MIN_CACHE_TTL_SECS))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs.max(1))
    }

    /// Check structural invariants shared with [`validate_limits`].
    pub fn validate(&self) -> Result<()> {
        validate_limits(self.soft_limit_usd, self.hard_limit_usd)?;
        if self.max_tokens_quick == 0 || self.max_tokens_deep == 0 {
            return Err(RouterError::config("token allowances must be positive"));
        }
        if self.rate_limit_requests == 0 {
            return Err(RouterError::config("rate limit quota must be positive"));
        }
        Ok(())
    }
}

/// Shared validation for the daily spend limits, also used when an
/// administrator updates them at runtime.
pub fn validate_limits(soft: f64, hard: f64) -> Result<()> {
    if !soft.is_finite() || !hard.is_finite() || soft < 0.0 || hard < 0.0 {
        return Err(RouterError::config("limits must be finite and non-negative"));
    }
    if soft >= hard {
        return Err(RouterError::config(format!(
            "soft limit {soft} must be below hard limit {hard}"
        )));
    }
    Ok(())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok()?.trim().parse().ok()
}
