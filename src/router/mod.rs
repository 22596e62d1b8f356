//! Hybrid tier resolution.
//!
//! The [`Router`] answers companion requests through a fixed priority chain:
//! canned templates, the response cache, the paid mini and turbo models, and
//! a local zero-cost fallback. Resolution short-circuits at the first tier
//! that produces an answer; every resolved request emits exactly one
//! accounting record.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`Router`] | Cheap-to-clone handle over the shared resolution state |
//! | [`RouterBuilder`] | Assembles a router from config plus injected parts |
//! | [`RouterMode`] | Admin override narrowing the allowed tiers |
//!
//! Identical concurrent requests share one upstream call: the first caller
//! leads the generation, later callers follow and receive the same outcome,
//! accounted as cache hits.

mod state;

pub use state::Tier;

use crate::accounting::{
    AccountingRecord, AccountingSink, AdminEvent, MemorySink, RouterStats,
};
use crate::cache::{CacheBackend, CacheStats, CachedResponse, MemoryCache, ResponseCache};
use crate::clock::{Clock, SystemClock};
use crate::config::RouterConfig;
use crate::error::RouterError;
use crate::fingerprint::{hash_identity, RequestFingerprint};
use crate::inflight::{Flight, InFlightTable};
use crate::ledger::{BudgetInfo, BudgetLedger, BudgetMode, PendingCharge, Reservation};
use crate::pricing;
use crate::providers::{
    GenerationProvider, GenerationRequest, LocalProvider, OpenAiProvider, TemplateCatalog,
};
use crate::ratelimit::IdentityRateLimiter;
use crate::types::{AskOptions, AskRequest, Locale, RequestKind, RoutedResponse, Source};
use crate::Result;
use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use state::RouteState;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Operator override for tier selection. `Auto` lets the request kind and
/// the budget decide; the `*Only` modes pin every generation to one tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouterMode {
    Auto,
    MiniOnly,
    TurboOnly,
    LocalOnly,
}

impl RouterMode {
    /// Parse an over-the-wire mode tag; unknown values normalize to `Auto`.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "mini_only" => RouterMode::MiniOnly,
            "turbo_only" => RouterMode::TurboOnly,
            "local_only" => RouterMode::LocalOnly,
            _ => RouterMode::Auto,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RouterMode::Auto => "auto",
            RouterMode::MiniOnly => "mini_only",
            RouterMode::TurboOnly => "turbo_only",
            RouterMode::LocalOnly => "local_only",
        }
    }
}

impl Default for RouterMode {
    fn default() -> Self {
        RouterMode::Auto
    }
}

/// Outcome broadcast from a flight leader to its followers.
#[derive(Clone)]
enum FlightOutcome {
    Success(RoutedResponse),
    Failure(FailureKind),
}

#[derive(Clone, Copy)]
enum FailureKind {
    OverBudget,
    Upstream,
}

impl FailureKind {
    fn into_error(self) -> RouterError {
        match self {
            FailureKind::OverBudget => RouterError::OverBudget,
            FailureKind::Upstream => {
                RouterError::upstream("all generation tiers failed for this request")
            }
        }
    }
}

struct Inner {
    config: RouterConfig,
    clock: Arc<dyn Clock>,
    mode: ArcSwap<RouterMode>,
    batch_enabled: AtomicBool,
    templates: TemplateCatalog,
    cache: ResponseCache,
    ledger: Arc<BudgetLedger>,
    inflight: InFlightTable<FlightOutcome>,
    limiter: IdentityRateLimiter,
    mini: Option<Arc<dyn GenerationProvider>>,
    turbo: Option<Arc<dyn GenerationProvider>>,
    local: Arc<dyn GenerationProvider>,
    analytics: Arc<MemorySink>,
    extra_sink: Option<Arc<dyn AccountingSink>>,
}

/// The response router. Clones share all state, so one router can serve
/// many concurrent callers and background jobs.
#[derive(Clone)]
pub struct Router {
    inner: Arc<Inner>,
}

impl Router {
    /// Build a router from configuration with default collaborators.
    pub fn new(config: RouterConfig) -> Result<Self> {
        RouterBuilder::new(config).build()
    }

    pub fn builder(config: RouterConfig) -> RouterBuilder {
        RouterBuilder::new(config)
    }

    /// Resolve one request with default options.
    pub async fn ask(&self, request: AskRequest) -> Result<RoutedResponse> {
        self.ask_with_options(request, AskOptions::default()).await
    }

    /// Resolve one request.
    ///
    /// The rate limit is checked before anything else; a rejected request
    /// never touches the budget and leaves no accounting record. Identical
    /// concurrent requests collapse onto one generation.
    pub async fn ask_with_options(
        &self,
        request: AskRequest,
        options: AskOptions,
    ) -> Result<RoutedResponse> {
        let started = Instant::now();
        let identity = request.identity.clone().ok_or(RouterError::Unauthenticated)?;
        if !self.inner.limiter.allow(&identity.id) {
            debug!(identity = %identity.id, "request rejected by rate limiter");
            return Err(RouterError::RateLimited {
                identity: identity.id,
            });
        }

        let kind = request.kind;
        let locale = request.locale;
        let user = Some(hash_identity(&identity.id));
        let fingerprint = RequestFingerprint::compute(kind, &request.text, locale);

        // Template tier: fixed wellness content, no generation, no spend.
        if self.inner.templates.matches(kind) {
            let response = RoutedResponse {
                text: self.inner.templates.choose(kind, locale).to_string(),
                source: Source::Template,
                model: "template".to_string(),
                tokens_in: 0,
                tokens_out: 0,
                usd_cost: 0.0,
                cached: false,
            };
            self.emit_record(Source::Template, "template", kind, 0, 0, 0.0, user, started)
                .await;
            return Ok(response);
        }

        if options.use_cache {
            if let Some(hit) = self.inner.cache.lookup(&fingerprint).await {
                debug!(key = %fingerprint, "resolved from cache");
                let response = RoutedResponse {
                    text: hit.text,
                    source: Source::Cache,
                    model: hit.model,
                    tokens_in: hit.tokens_in,
                    tokens_out: hit.tokens_out,
                    usd_cost: 0.0,
                    cached: true,
                };
                self.emit_record(Source::Cache, &response.model, kind, 0, 0, 0.0, user, started)
                    .await;
                return Ok(response);
            }
        }

        match self.inner.inflight.join(&fingerprint) {
            Flight::Follower(mut rx) => match rx.recv().await {
                Ok(FlightOutcome::Success(shared)) => {
                    let response = RoutedResponse {
                        source: Source::Cache,
                        usd_cost: 0.0,
                        cached: true,
                        ..shared
                    };
                    self.emit_record(
                        Source::Cache,
                        &response.model,
                        kind,
                        0,
                        0,
                        0.0,
                        user,
                        started,
                    )
                    .await;
                    Ok(response)
                }
                Ok(FlightOutcome::Failure(failure)) => Err(failure.into_error()),
                Err(_) => Err(RouterError::upstream("shared generation was abandoned")),
            },
            Flight::Leader(guard) => {
                // The generation runs in its own task: followers depend on the
                // outcome, so a caller dropping this future must not cancel it.
                let this = self.clone();
                let text = request.text.clone();
                let key = fingerprint.clone();
                let use_cache = options.use_cache;
                let user = user.clone();
                let authenticated = identity.authenticated;
                let handle = tokio::spawn(async move {
                    let outcome = this
                        .resolve_leader(
                            kind,
                            &text,
                            locale,
                            &key,
                            authenticated,
                            use_cache,
                            user,
                            started,
                        )
                        .await;
                    guard.publish(outcome.clone());
                    outcome
                });
                match handle.await {
                    Ok(FlightOutcome::Success(response)) => Ok(response),
                    Ok(FlightOutcome::Failure(failure)) => Err(failure.into_error()),
                    Err(err) => Err(RouterError::upstream(format!(
                        "generation task failed: {err}"
                    ))),
                }
            }
        }
    }

    /// Drive the tier chain for a flight leader.
    #[allow(clippy::too_many_arguments)]
    async fn resolve_leader(
        &self,
        kind: RequestKind,
        text: &str,
        locale: Locale,
        key: &RequestFingerprint,
        authenticated: bool,
        use_cache: bool,
        user: Option<String>,
        started: Instant,
    ) -> FlightOutcome {
        // Another leader may have stored to cache between this caller's
        // cache miss and it winning the flight slot. Serve that entry
        // instead of regenerating.
        if use_cache {
            if let Some(hit) = self.inner.cache.lookup(key).await {
                debug!(key = %key, "cache filled while waiting for leadership");
                let response = RoutedResponse {
                    text: hit.text,
                    source: Source::Cache,
                    model: hit.model,
                    tokens_in: hit.tokens_in,
                    tokens_out: hit.tokens_out,
                    usd_cost: 0.0,
                    cached: true,
                };
                self.emit_record(Source::Cache, &response.model, kind, 0, 0, 0.0, user, started)
                    .await;
                return FlightOutcome::Success(response);
            }
        }

        let mode = self.mode();
        let paid_available = self.inner.mini.is_some() || self.inner.turbo.is_some();
        let planned = state::plan_tier(kind, mode, authenticated, paid_available);

        let mut tier = planned;
        let mut paid_blocked = false;
        let mut charge: Option<PendingCharge> = None;
        let max_tokens = self.max_tokens_for(kind);

        if planned.is_paid() {
            let model = self.model_for(planned);
            let estimate = pricing::estimate_cost(model, text, max_tokens);
            match self.inner.ledger.reserve(estimate) {
                Reservation::Allowed(c) => charge = Some(c),
                Reservation::SoftExceeded(c) => {
                    charge = Some(c);
                    tier = state::apply_budget(tier, BudgetMode::Soft);
                    debug!(kind = kind.as_str(), "soft budget reached, clamping to mini");
                }
                Reservation::HardExceeded => {
                    tier = Tier::Local;
                    paid_blocked = true;
                    info!(kind = kind.as_str(), "hard budget reached, forcing local tier");
                }
            }
        }

        let generation_request = GenerationRequest {
            prompt: text.to_string(),
            kind,
            locale,
            max_tokens,
        };
        let retry_attempts = self.inner.config.retry_attempts;
        let mut route = RouteState::after_budget(tier);

        while let RouteState::Generate { tier, attempt } = route {
            if tier == Tier::Local {
                // Entering the free tier; any held paid reservation goes back.
                if let Some(c) = charge.take() {
                    c.release();
                }
            }
            let Some(provider) = self.provider_for(tier) else {
                route = match tier.degraded() {
                    Some(lower) => RouteState::Generate {
                        tier: lower,
                        attempt: 0,
                    },
                    None => RouteState::Failed,
                };
                continue;
            };

            let outcome = tokio::time::timeout(
                self.inner.config.request_timeout(),
                provider.generate(&generation_request),
            )
            .await;
            match outcome {
                Ok(Ok(generation)) => {
                    let cost = if tier.is_paid() { generation.usd_cost } else { 0.0 };
                    if tier.is_paid() {
                        match charge.take() {
                            Some(c) => c.commit(cost),
                            None => self.inner.ledger.register(cost),
                        }
                    }

                    let mut response_text = generation.text.trim().to_string();
                    let mut source = tier.source();
                    let mut model = provider.model().to_string();
                    if response_text.is_empty() {
                        // The model consumed tokens but produced nothing
                        // usable; answer with the canned local reply instead.
                        warn!(model = %model, "empty generation, using local fallback text");
                        response_text = LocalProvider::respond(kind, locale).to_string();
                        source = Source::Local;
                        model = "local".to_string();
                    }

                    let response = RoutedResponse {
                        text: response_text,
                        source,
                        model,
                        tokens_in: generation.tokens_in,
                        tokens_out: generation.tokens_out,
                        usd_cost: cost,
                        cached: false,
                    };
                    if use_cache && matches!(source, Source::Mini | Source::Turbo) {
                        let entry = CachedResponse {
                            text: response.text.clone(),
                            model: response.model.clone(),
                            source,
                            tokens_in: response.tokens_in,
                            tokens_out: response.tokens_out,
                            usd_cost: cost,
                        };
                        let _ = self.inner.cache.store(key, &entry).await;
                    }
                    self.emit_record(
                        source,
                        &response.model,
                        kind,
                        response.tokens_in,
                        response.tokens_out,
                        cost,
                        user,
                        started,
                    )
                    .await;
                    return FlightOutcome::Success(response);
                }
                Ok(Err(err)) => {
                    warn!(
                        tier = tier.source().as_str(),
                        attempt,
                        error = %err,
                        "generation attempt failed"
                    );
                    route = RouteState::after_generation(tier, attempt, false, retry_attempts);
                }
                Err(_) => {
                    warn!(
                        tier = tier.source().as_str(),
                        attempt,
                        timeout_secs = self.inner.config.request_timeout_secs,
                        "generation attempt timed out"
                    );
                    route = RouteState::after_generation(tier, attempt, false, retry_attempts);
                }
            }
        }

        if let Some(c) = charge.take() {
            c.release();
        }
        if paid_blocked {
            FlightOutcome::Failure(FailureKind::OverBudget)
        } else {
            FlightOutcome::Failure(FailureKind::Upstream)
        }
    }

    fn provider_for(&self, tier: Tier) -> Option<Arc<dyn GenerationProvider>> {
        match tier {
            Tier::Mini => self.inner.mini.clone(),
            Tier::Turbo => self.inner.turbo.clone(),
            Tier::Local => Some(Arc::clone(&self.inner.local)),
        }
    }

    fn model_for(&self, tier: Tier) -> &str {
        match tier {
            Tier::Turbo => &self.inner.config.model_turbo,
            _ => &self.inner.config.model_mini,
        }
    }

    fn max_tokens_for(&self, kind: RequestKind) -> u32 {
        if kind.is_deep() {
            self.inner.config.max_tokens_deep
        } else {
            self.inner.config.max_tokens_quick
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn emit_record(
        &self,
        source: Source,
        model: &str,
        kind: RequestKind,
        tokens_in: u32,
        tokens_out: u32,
        usd_cost: f64,
        user: Option<String>,
        started: Instant,
    ) {
        let record = AccountingRecord {
            id: Uuid::new_v4(),
            at: self.inner.clock.now(),
            source,
            model: model.to_string(),
            kind,
            tokens_in,
            tokens_out,
            usd_cost,
            user,
            latency_ms: started.elapsed().as_millis() as u64,
        };
        if let Err(err) = self.inner.analytics.record(record.clone()).await {
            warn!(error = %err, "analytics sink rejected record");
        }
        if let Some(sink) = &self.inner.extra_sink {
            if let Err(err) = sink.record(record).await {
                warn!(error = %err, "accounting sink rejected record");
            }
        }
    }

    async fn emit_admin(&self, actor: &str, action: String) {
        let event = AdminEvent {
            at: self.inner.clock.now(),
            actor: actor.to_string(),
            action,
        };
        if let Err(err) = self.inner.analytics.admin_event(event.clone()).await {
            warn!(error = %err, "analytics sink rejected admin event");
        }
        if let Some(sink) = &self.inner.extra_sink {
            if let Err(err) = sink.admin_event(event).await {
                warn!(error = %err, "accounting sink rejected admin event");
            }
        }
    }

    /// Current router mode.
    pub fn mode(&self) -> RouterMode {
        **self.inner.mode.load()
    }

    /// Replace the router mode; takes effect for the next request.
    pub async fn set_mode(&self, mode: RouterMode, actor: &str) {
        self.inner.mode.store(Arc::new(mode));
        info!(mode = mode.as_str(), actor, "router mode changed");
        self.emit_admin(actor, format!("set_mode {}", mode.as_str())).await;
    }

    /// Replace the daily spend limits. Rejects soft >= hard.
    pub async fn set_limits(&self, soft: f64, hard: f64, actor: &str) -> Result<()> {
        self.inner.ledger.set_limits(soft, hard)?;
        info!(soft, hard, actor, "budget limits changed");
        self.emit_admin(actor, format!("set_limits soft={soft} hard={hard}"))
            .await;
        Ok(())
    }

    pub async fn set_batch_enabled(&self, enabled: bool, actor: &str) {
        self.inner.batch_enabled.store(enabled, Ordering::Relaxed);
        self.emit_admin(actor, format!("set_batch_enabled {enabled}")).await;
    }

    pub fn batch_enabled(&self) -> bool {
        self.inner.batch_enabled.load(Ordering::Relaxed)
    }

    /// Declare spend that happened outside this router, e.g. restored from
    /// persistence at startup.
    pub fn register_external_spend(&self, usd_cost: f64) {
        self.inner.ledger.register(usd_cost);
    }

    pub fn budget_info(&self) -> BudgetInfo {
        self.inner.ledger.info()
    }

    /// Aggregate usage since startup.
    pub fn stats(&self) -> RouterStats {
        self.inner.analytics.totals()
    }

    /// Aggregate usage over records at or after `since`.
    ///
    /// Computed from the bounded in-memory history: once records older than
    /// `since` have been evicted by the capacity limit, the range
    /// under-reports. [`Router::stats`] aggregates separately and stays
    /// exact for the whole process lifetime.
    pub fn stats_since(&self, since: DateTime<Utc>) -> RouterStats {
        self.inner.analytics.stats_since(since)
    }

    /// Most recent accounting records, newest first.
    pub fn history(&self, limit: usize) -> Vec<AccountingRecord> {
        self.inner.analytics.history(limit)
    }

    pub fn admin_events(&self) -> Vec<AdminEvent> {
        self.inner.analytics.admin_events()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.inner.cache.stats()
    }

    pub async fn clear_cache(&self, actor: &str) -> Result<()> {
        self.inner.cache.clear().await?;
        self.emit_admin(actor, "clear_cache".to_string()).await;
        Ok(())
    }

    pub fn config(&self) -> &RouterConfig {
        &self.inner.config
    }
}

/// Assembles a [`Router`]. Collaborators not supplied explicitly are built
/// from the configuration; tests inject manual clocks and mock providers.
pub struct RouterBuilder {
    config: RouterConfig,
    clock: Option<Arc<dyn Clock>>,
    cache_backend: Option<Box<dyn CacheBackend>>,
    mini: Option<Arc<dyn GenerationProvider>>,
    turbo: Option<Arc<dyn GenerationProvider>>,
    local: Option<Arc<dyn GenerationProvider>>,
    sink: Option<Arc<dyn AccountingSink>>,
}

impl RouterBuilder {
    pub fn new(config: RouterConfig) -> Self {
        Self {
            config,
            clock: None,
            cache_backend: None,
            mini: None,
            turbo: None,
            local: None,
            sink: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_cache_backend(mut self, backend: Box<dyn CacheBackend>) -> Self {
        self.cache_backend = Some(backend);
        self
    }

    pub fn with_mini_provider(mut self, provider: Arc<dyn GenerationProvider>) -> Self {
        self.mini = Some(provider);
        self
    }

    pub fn with_turbo_provider(mut self, provider: Arc<dyn GenerationProvider>) -> Self {
        self.turbo = Some(provider);
        self
    }

    pub fn with_local_provider(mut self, provider: Arc<dyn GenerationProvider>) -> Self {
        self.local = Some(provider);
        self
    }

    /// Forward accounting records to an additional sink besides the built-in
    /// in-memory analytics.
    pub fn with_sink(mut self, sink: Arc<dyn AccountingSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn build(self) -> Result<Router> {
        self.config.validate()?;
        let config = self.config;
        let clock: Arc<dyn Clock> = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let timeout = config.request_timeout();
        let mini = match self.mini {
            Some(provider) => Some(provider),
            None => match &config.api_key {
                Some(key) => Some(Arc::new(OpenAiProvider::new(
                    key.as_str(),
                    &config.model_mini,
                    &config.api_base_url,
                    timeout,
                )?) as Arc<dyn GenerationProvider>),
                None => None,
            },
        };
        let turbo = match self.turbo {
            Some(provider) => Some(provider),
            None => match &config.api_key {
                Some(key) => Some(Arc::new(OpenAiProvider::new(
                    key.as_str(),
                    &config.model_turbo,
                    &config.api_base_url,
                    timeout,
                )?) as Arc<dyn GenerationProvider>),
                None => None,
            },
        };
        if mini.is_none() && turbo.is_none() {
            warn!("no API key configured, paid tiers disabled");
        }
        let local = self
            .local
            .unwrap_or_else(|| Arc::new(LocalProvider::new()) as Arc<dyn GenerationProvider>);

        let backend = self
            .cache_backend
            .unwrap_or_else(|| Box::new(MemoryCache::new(config.cache_max_entries, clock.clone())));
        let cache = ResponseCache::new(backend, config.cache_ttl());
        let ledger = Arc::new(BudgetLedger::new(
            clock.clone(),
            config.soft_limit_usd,
            config.hard_limit_usd,
        ));
        let limiter = IdentityRateLimiter::new(
            clock.clone(),
            config.rate_limit_requests,
            config.rate_limit_window(),
        );
        let analytics = Arc::new(MemorySink::new(config.history_capacity));

        Ok(Router {
            inner: Arc::new(Inner {
                mode: ArcSwap::from_pointee(config.mode),
                batch_enabled: AtomicBool::new(config.batch_enabled),
                templates: TemplateCatalog::new(),
                cache,
                ledger,
                inflight: InFlightTable::new(),
                limiter,
                mini,
                turbo,
                local,
                analytics,
                extra_sink: self.sink,
                clock,
                config,
            }),
        })
    }
}
