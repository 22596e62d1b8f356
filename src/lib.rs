//! # companion-router
//!
//! Hybrid response router for a wellness companion. Every user-facing AI
//! answer flows through one resolution pipeline that balances answer quality
//! against a strict daily budget, falling back gracefully when money, quota
//! or the upstream API run out.
//!
//! ## Overview
//!
//! A request is resolved by the first tier able to answer it:
//!
//! 1. **Template** - canned wellness content for fixed request kinds
//! 2. **Cache** - previously generated answers, keyed by a request fingerprint
//! 3. **Mini** - the cheap paid model, for everyday replies
//! 4. **Turbo** - the expensive paid model, for deep insights and reviews
//! 5. **Local** - a built-in zero-cost fallback that always answers
//!
//! Paid tiers are guarded by a daily spend ledger with a soft and a hard
//! limit, a per-identity rate limiter, and in-flight deduplication so that
//! identical concurrent requests share a single upstream call.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use companion_router::{AskRequest, Identity, RequestKind, Router, RouterConfig};
//!
//! #[tokio::main]
//! async fn main() -> companion_router::Result<()> {
//!     let router = Router::new(RouterConfig::from_env()?)?;
//!
//!     let request = AskRequest::new(
//!         Identity::user("tg:42"),
//!         RequestKind::MoodReply,
//!         "мне сегодня тревожно",
//!     );
//!     let response = router.ask(request).await?;
//!     println!("[{}] {}", response.source.as_str(), response.text);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`router`] | Tier resolution, modes, and the admin surface |
//! | [`config`] | Configuration from defaults, YAML and environment |
//! | [`ledger`] | Daily budget with reserve-then-settle accounting |
//! | [`cache`] | TTL-bound response cache with pluggable backends |
//! | [`inflight`] | Leader/follower deduplication of identical requests |
//! | [`ratelimit`] | Per-identity sliding-window quota |
//! | [`providers`] | Template, OpenAI-compatible and local generation tiers |
//! | [`pricing`] | Per-model token pricing and cost estimation |
//! | [`accounting`] | Usage records, aggregates and admin audit trail |
//! | [`batch`] | Daily digest job driving the router for recent users |
//! | [`clock`] | Injectable wall clock for deterministic tests |

pub mod accounting;
pub mod batch;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod inflight;
pub mod ledger;
pub mod pricing;
pub mod providers;
pub mod ratelimit;
pub mod router;
pub mod types;

// Re-export main types for convenience
pub use accounting::{AccountingRecord, AccountingSink, MemorySink, RouterStats, TracingSink};
pub use batch::{DigestJob, UserActivity};
pub use cache::{CacheBackend, CacheStats, MemoryCache, ResponseCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::RouterConfig;
pub use error::RouterError;
pub use fingerprint::RequestFingerprint;
pub use ledger::{BudgetInfo, BudgetLedger, BudgetMode};
pub use providers::{GenerationProvider, LocalProvider, OpenAiProvider};
pub use router::{Router, RouterBuilder, RouterMode};
pub use types::{
    AskOptions, AskRequest, Identity, Locale, RequestKind, RoutedResponse, Source,
};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, RouterError>;
