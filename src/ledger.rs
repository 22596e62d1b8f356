//! Daily budget ledger.
//!
//! Tracks cumulative USD spend for the current accounting day against a soft
//! and a hard limit. Reservation follows a reserve-then-settle discipline: a
//! paid call reserves its estimated cost up front (so concurrent reservations
//! cannot jointly slip past the hard limit) and settles to the actual cost on
//! completion. The day rolls over lazily: any operation that observes a new
//! UTC calendar date resets the spend exactly once before evaluating.

use crate::clock::Clock;
use crate::config::validate_limits;
use crate::Result;
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Budget pressure derived from current spend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetMode {
    Normal,
    Soft,
    Hard,
}

impl BudgetMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BudgetMode::Normal => "normal",
            BudgetMode::Soft => "soft",
            BudgetMode::Hard => "hard",
        }
    }
}

/// Outcome of [`BudgetLedger::reserve`].
///
/// `Allowed` and `SoftExceeded` carry a [`PendingCharge`] holding the
/// reserved estimate; dropping it without committing releases the funds.
pub enum Reservation {
    Allowed(PendingCharge),
    SoftExceeded(PendingCharge),
    HardExceeded,
}

#[derive(Debug)]
struct LedgerState {
    day: NaiveDate,
    committed: f64,
    reserved: f64,
    soft_limit: f64,
    hard_limit: f64,
}

impl LedgerState {
    fn mode(&self) -> BudgetMode {
        let total = self.committed + self.reserved;
        if total >= self.hard_limit {
            BudgetMode::Hard
        } else if total >= self.soft_limit {
            BudgetMode::Soft
        } else {
            BudgetMode::Normal
        }
    }

    /// Reset spend when the calendar date has moved on. Under the ledger
    /// mutex this runs at most once per boundary regardless of contention.
    fn roll_day(&mut self, today: NaiveDate) {
        if self.day != today {
            info!(
                previous_day = %self.day,
                spend = self.committed,
                "accounting day rollover, spend reset"
            );
            self.day = today;
            self.committed = 0.0;
            self.reserved = 0.0;
        }
    }
}

/// Serializable snapshot for the admin surface.
#[derive(Debug, Clone, Serialize)]
pub struct BudgetInfo {
    pub day: NaiveDate,
    pub mode: BudgetMode,
    pub spend_usd: f64,
    pub reserved_usd: f64,
    pub soft_limit_usd: f64,
    pub hard_limit_usd: f64,
}

/// Shared daily spend ledger. All state sits behind one mutex; every public
/// operation holds it for the whole decision, so reservations are
/// sequentially consistent with each other.
pub struct BudgetLedger {
    clock: Arc<dyn Clock>,
    state: Mutex<LedgerState>,
}

impl BudgetLedger {
    pub fn new(clock: Arc<dyn Clock>, soft_limit: f64, hard_limit: f64) -> Self {
        let day = clock.today();
        Self {
            clock,
            state: Mutex::new(LedgerState {
                day,
                committed: 0.0,
                reserved: 0.0,
                soft_limit: soft_limit.max(0.0),
                hard_limit: hard_limit.max(soft_limit.max(0.0)),
            }),
        }
    }

    /// Reserve an estimated cost for an imminent paid call.
    ///
    /// The limits are checked against the projected spend, committed plus
    /// held reservations plus this call's estimate, so a call whose own cost
    /// would cross a limit is downgraded before it runs. The check and the
    /// reservation happen under one lock acquisition, so two concurrent
    /// callers can never both pass a check that together breaches the hard
    /// limit. A `HardExceeded` outcome reserves nothing.
    pub fn reserve(self: &Arc<Self>, estimate: f64) -> Reservation {
        let estimate = estimate.max(0.0);
        let mut st = self.state.lock().unwrap();
        st.roll_day(self.clock.today());
        let projected = st.committed + st.reserved + estimate;
        if projected >= st.hard_limit {
            return Reservation::HardExceeded;
        }
        st.reserved += estimate;
        let charge = PendingCharge {
            ledger: Arc::clone(self),
            estimate,
            settled: false,
        };
        if projected >= st.soft_limit {
            Reservation::SoftExceeded(charge)
        } else {
            Reservation::Allowed(charge)
        }
    }

    /// Current budget pressure without reserving anything.
    pub fn mode(&self) -> BudgetMode {
        let mut st = self.state.lock().unwrap();
        st.roll_day(self.clock.today());
        st.mode()
    }

    /// Committed spend for the current accounting day.
    pub fn current_spend(&self) -> f64 {
        let mut st = self.state.lock().unwrap();
        st.roll_day(self.clock.today());
        st.committed
    }

    /// Record spend that bypassed reservation (zero-estimate paths, or spend
    /// restored from persistence at startup).
    pub fn register(&self, usd_cost: f64) {
        let mut st = self.state.lock().unwrap();
        st.roll_day(self.clock.today());
        st.committed += usd_cost.max(0.0);
    }

    /// Replace the daily limits. Rejects soft >= hard and negative values.
    pub fn set_limits(&self, soft_limit: f64, hard_limit: f64) -> Result<()> {
        validate_limits(soft_limit, hard_limit)?;
        let mut st = self.state.lock().unwrap();
        st.roll_day(self.clock.today());
        st.soft_limit = soft_limit;
        st.hard_limit = hard_limit;
        Ok(())
    }

    pub fn info(&self) -> BudgetInfo {
        let mut st = self.state.lock().unwrap();
        st.roll_day(self.clock.today());
        BudgetInfo {
            day: st.day,
            mode: st.mode(),
            spend_usd: round4(st.committed),
            reserved_usd: round4(st.reserved),
            soft_limit_usd: st.soft_limit,
            hard_limit_usd: st.hard_limit,
        }
    }

    fn settle(&self, estimate: f64, actual: Option<f64>) {
        let mut st = self.state.lock().unwrap();
        st.roll_day(self.clock.today());
        // A rollover may already have cleared the reservation; never go
        // negative.
        st.reserved = (st.reserved - estimate).max(0.0);
        if let Some(actual) = actual {
            st.committed += actual.max(0.0);
        } else {
            debug!(estimate, "budget reservation released uncommitted");
        }
    }
}

/// Funds held against the ledger for one in-flight paid call.
pub struct PendingCharge {
    ledger: Arc<BudgetLedger>,
    estimate: f64,
    settled: bool,
}

impl PendingCharge {
    /// Settle the reservation to the actual cost of the call.
    pub fn commit(mut self, actual_cost: f64) {
        self.settled = true;
        self.ledger.settle(self.estimate, Some(actual_cost));
    }

    /// Explicitly release the reservation without charging.
    pub fn release(self) {}

    pub fn estimate(&self) -> f64 {
        self.estimate
    }
}

impl Drop for PendingCharge {
    fn drop(&mut self) {
        if !self.settled {
            self.ledger.settle(self.estimate, None);
        }
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::Duration;

    fn ledger_with_clock() -> (Arc<BudgetLedger>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::fixed());
        let ledger = Arc::new(BudgetLedger::new(clock.clone(), 0.35, 0.50));
        (ledger, clock)
    }

    #[test]
    fn reserve_commit_cycle() {
        let (ledger, _clock) = ledger_with_clock();
        let charge = match ledger.reserve(0.02) {
            Reservation::Allowed(c) => c,
            _ => panic!("fresh ledger must allow"),
        };
        assert_eq!(ledger.info().reserved_usd, 0.02);
        charge.commit(0.01);
        assert_eq!(ledger.current_spend(), 0.01);
        assert_eq!(ledger.info().reserved_usd, 0.0);
    }

    #[test]
    fn dropped_charge_releases_reservation() {
        let (ledger, _clock) = ledger_with_clock();
        match ledger.reserve(0.10) {
            Reservation::Allowed(charge) => drop(charge),
            _ => panic!("must allow"),
        }
        assert_eq!(ledger.current_spend(), 0.0);
        assert_eq!(ledger.info().reserved_usd, 0.0);
    }

    #[test]
    fn soft_then_hard_thresholds() {
        let (ledger, _clock) = ledger_with_clock();
        ledger.register(0.40);
        match ledger.reserve(0.01) {
            Reservation::SoftExceeded(charge) => charge.release(),
            _ => panic!("0.40 of 0.35/0.50 must be soft"),
        }
        ledger.register(0.10);
        assert!(matches!(ledger.reserve(0.01), Reservation::HardExceeded));
        assert_eq!(ledger.mode(), BudgetMode::Hard);
    }

    #[test]
    fn reservations_count_toward_the_check() {
        let (ledger, _clock) = ledger_with_clock();
        let first = match ledger.reserve(0.30) {
            Reservation::Allowed(c) => c,
            _ => panic!("must allow"),
        };
        // A concurrent second reservation must see the held funds.
        assert!(matches!(ledger.reserve(0.25), Reservation::HardExceeded));
        first.commit(0.05);
        assert!(matches!(ledger.reserve(0.01), Reservation::Allowed(_)));
    }

    #[test]
    fn estimate_itself_counts_against_the_limits() {
        let (ledger, _clock) = ledger_with_clock();
        ledger.register(0.49);
        // 0.49 committed plus a 0.10 estimate projects past the hard limit,
        // so the call must be refused even though spend alone is under it.
        assert!(matches!(ledger.reserve(0.10), Reservation::HardExceeded));
        assert_eq!(ledger.current_spend(), 0.49);

        let (ledger, _clock) = ledger_with_clock();
        ledger.register(0.30);
        // Crossing only the soft limit downgrades instead.
        match ledger.reserve(0.10) {
            Reservation::SoftExceeded(charge) => charge.release(),
            _ => panic!("0.30 + 0.10 against 0.35/0.50 must be soft"),
        }
    }

    #[test]
    fn day_rollover_resets_spend_once() {
        let (ledger, clock) = ledger_with_clock();
        ledger.register(0.49);
        assert_eq!(ledger.mode(), BudgetMode::Soft);
        clock.advance(Duration::days(1));
        assert_eq!(ledger.current_spend(), 0.0);
        assert_eq!(ledger.mode(), BudgetMode::Normal);
        // Spend after the boundary accumulates normally, no second reset.
        ledger.register(0.05);
        assert_eq!(ledger.current_spend(), 0.05);
    }

    #[test]
    fn concurrent_rollover_resets_exactly_once() {
        let (ledger, clock) = ledger_with_clock();
        ledger.register(0.30);
        clock.advance(Duration::days(1));
        // Every thread observes the new date; whichever wins the lock first
        // performs the single reset and none of the registrations that follow
        // it may be wiped by a second one.
        let mut handles = Vec::new();
        for _ in 0..16 {
            let ledger = Arc::clone(&ledger);
            handles.push(std::thread::spawn(move || {
                if let Reservation::Allowed(c) | Reservation::SoftExceeded(c) =
                    ledger.reserve(0.0)
                {
                    c.release();
                }
                ledger.register(0.01);
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        let spend = ledger.current_spend();
        assert!(
            (spend - 0.16).abs() < 1e-9,
            "yesterday's 0.30 must be erased once and all 16 registrations kept, got {spend}"
        );
    }

    #[test]
    fn set_limits_validates() {
        let (ledger, _clock) = ledger_with_clock();
        assert!(ledger.set_limits(0.10, 0.20).is_ok());
        assert!(ledger.set_limits(0.20, 0.20).is_err());
        assert!(ledger.set_limits(-1.0, 1.0).is_err());
        ledger.register(0.15);
        assert_eq!(ledger.mode(), BudgetMode::Soft);
    }

    #[test]
    fn concurrent_reservations_never_breach_hard_limit() {
        let (ledger, _clock) = ledger_with_clock();
        let mut handles = Vec::new();
        for _ in 0..32 {
            let ledger = Arc::clone(&ledger);
            handles.push(std::thread::spawn(move || {
                for _ in 0..16 {
                    if let Reservation::Allowed(c) | Reservation::SoftExceeded(c) =
                        ledger.reserve(0.02)
                    {
                        c.commit(0.02);
                    }
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        // Each admitted reservation projected under the hard limit and
        // settled at its estimate, so committed spend stays under it too.
        assert!(ledger.current_spend() <= 0.50 + 1e-9);
    }
}
