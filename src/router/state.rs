//! Tier selection state machine.
//!
//! Resolution walks a fixed priority chain: template, cache, budget-gated
//! paid tiers, local fallback. The chain is expressed as a tagged state with
//! one transition function per decision point so the full matrix can be
//! tested without providers, clocks or I/O.

use super::RouterMode;
use crate::ledger::BudgetMode;
use crate::types::{RequestKind, Source};

/// A generation tier, ordered by decreasing cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Turbo,
    Mini,
    Local,
}

impl Tier {
    pub fn source(&self) -> Source {
        match self {
            Tier::Turbo => Source::Turbo,
            Tier::Mini => Source::Mini,
            Tier::Local => Source::Local,
        }
    }

    pub fn is_paid(&self) -> bool {
        !matches!(self, Tier::Local)
    }

    /// The next cheaper tier, if any. Local is the floor.
    pub fn degraded(&self) -> Option<Tier> {
        match self {
            Tier::Turbo => Some(Tier::Mini),
            Tier::Mini => Some(Tier::Local),
            Tier::Local => None,
        }
    }
}

/// Per-request resolution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteState {
    Template,
    CacheLookup,
    BudgetCheck,
    Generate { tier: Tier, attempt: u32 },
    Resolved { source: Source },
    Failed,
}

impl RouteState {
    /// Leave the template stage.
    pub fn after_template(matched: bool) -> RouteState {
        if matched {
            RouteState::Resolved {
                source: Source::Template,
            }
        } else {
            RouteState::CacheLookup
        }
    }

    /// Leave the cache stage.
    pub fn after_cache(hit: bool) -> RouteState {
        if hit {
            RouteState::Resolved {
                source: Source::Cache,
            }
        } else {
            RouteState::BudgetCheck
        }
    }

    /// Enter generation at the budget-adjusted tier.
    pub fn after_budget(tier: Tier) -> RouteState {
        RouteState::Generate { tier, attempt: 0 }
    }

    /// Leave a generation attempt. Paid tiers retry up to `retry_attempts`
    /// times in place, then degrade one tier; local failure is terminal.
    pub fn after_generation(
        tier: Tier,
        attempt: u32,
        succeeded: bool,
        retry_attempts: u32,
    ) -> RouteState {
        if succeeded {
            return RouteState::Resolved {
                source: tier.source(),
            };
        }
        if tier.is_paid() && attempt < retry_attempts {
            return RouteState::Generate {
                tier,
                attempt: attempt + 1,
            };
        }
        match tier.degraded() {
            Some(lower) => RouteState::Generate {
                tier: lower,
                attempt: 0,
            },
            None => RouteState::Failed,
        }
    }
}

/// Intended tier before the budget is consulted.
///
/// Mode overrides come first; unauthenticated identities and deployments
/// without an API key never reach a paid tier.
pub fn plan_tier(
    kind: RequestKind,
    mode: RouterMode,
    authenticated: bool,
    paid_available: bool,
) -> Tier {
    let base = if kind.is_deep() { Tier::Turbo } else { Tier::Mini };
    let forced = match mode {
        RouterMode::LocalOnly => return Tier::Local,
        RouterMode::MiniOnly => Tier::Mini,
        RouterMode::TurboOnly => Tier::Turbo,
        RouterMode::Auto => base,
    };
    if !authenticated || !paid_available {
        return Tier::Local;
    }
    forced
}

/// Apply budget pressure to a planned tier. Hard exhaustion always wins,
/// soft exhaustion clamps paid work to the cheapest paid tier.
pub fn apply_budget(tier: Tier, budget: BudgetMode) -> Tier {
    match budget {
        BudgetMode::Hard => Tier::Local,
        BudgetMode::Soft if tier == Tier::Turbo => Tier::Mini,
        _ => tier,
    }
}
