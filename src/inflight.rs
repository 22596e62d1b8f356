//! In-flight request deduplication.
//!
//! At most one upstream generation runs per fingerprint at a time. The first
//! caller for a fingerprint becomes the leader and holds a [`FlightGuard`];
//! concurrent callers become followers and await the leader's published
//! outcome. Publishing (or dropping the guard) removes the ticket, so a later
//! request starts a fresh flight.

use crate::fingerprint::RequestFingerprint;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::debug;

/// Role assigned to a caller joining a flight.
pub enum Flight<T: Clone> {
    Leader(FlightGuard<T>),
    Follower(broadcast::Receiver<T>),
}

struct Slots<T: Clone> {
    map: Mutex<HashMap<RequestFingerprint, broadcast::Sender<T>>>,
}

/// Table of in-flight generations keyed by request fingerprint.
pub struct InFlightTable<T: Clone> {
    slots: Arc<Slots<T>>,
}

impl<T: Clone> InFlightTable<T> {
    pub fn new() -> Self {
        Self {
            slots: Arc::new(Slots {
                map: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Join the flight for `key`, becoming leader if none is active.
    ///
    /// Followers subscribe under the same lock that admits the leader, so a
    /// published outcome can never be missed.
    pub fn join(&self, key: &RequestFingerprint) -> Flight<T> {
        let mut map = self.slots.map.lock().unwrap();
        if let Some(tx) = map.get(key) {
            debug!(key = %key, "joining in-flight generation as follower");
            return Flight::Follower(tx.subscribe());
        }
        let (tx, _rx) = broadcast::channel(1);
        map.insert(key.clone(), tx.clone());
        Flight::Leader(FlightGuard {
            slots: Arc::clone(&self.slots),
            key: key.clone(),
            tx,
            published: false,
        })
    }

    /// Number of active flights.
    pub fn len(&self) -> usize {
        self.slots.map.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone> Default for InFlightTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Leadership of one flight. Exactly one guard exists per active fingerprint.
pub struct FlightGuard<T: Clone> {
    slots: Arc<Slots<T>>,
    key: RequestFingerprint,
    tx: broadcast::Sender<T>,
    published: bool,
}

impl<T: Clone> FlightGuard<T> {
    /// Publish the outcome to all followers and retire the ticket.
    ///
    /// The slot is removed before the send, so a request arriving after
    /// publication starts a fresh flight instead of observing a stale one.
    pub fn publish(mut self, outcome: T) {
        self.remove_slot();
        self.published = true;
        // No receivers is fine: the leader may have been alone.
        let _ = self.tx.send(outcome);
    }

    fn remove_slot(&self) {
        self.slots.map.lock().unwrap().remove(&self.key);
    }
}

impl<T: Clone> Drop for FlightGuard<T> {
    fn drop(&mut self) {
        if !self.published {
            // Leader bailed without a result; closing the channel wakes the
            // followers, which treat it as a failed flight.
            self.remove_slot();
        }
    }
}
