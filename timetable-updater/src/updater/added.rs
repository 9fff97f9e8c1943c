//! Bookkeeping for trips that exist only because realtime added them.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::domain::{ServiceDate, TripId};
use crate::schedule::{PatternId, SynthesizedPattern};

/// What removing an added trip left behind.
#[derive(Debug, Clone)]
pub struct RemovedTrip {
    pub service_date: ServiceDate,
    /// The pattern as it stood when the trip was removed.
    pub synthesized: SynthesizedPattern,
    /// True if no other added trip uses the pattern any more.
    pub last_user: bool,
}

/// Which added trips exist, which synthesized pattern each one uses and
/// which service date it runs on.
#[derive(Debug, Default)]
pub struct AddedTrips {
    by_trip: HashMap<TripId, (ServiceDate, PatternId)>,
    patterns: HashMap<PatternId, SynthesizedPattern>,
    usage: HashMap<PatternId, usize>,
    by_service_date: BTreeMap<ServiceDate, BTreeSet<TripId>>,
}

impl AddedTrips {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if `trip` was added and not yet removed.
    pub fn contains(&self, trip: &TripId) -> bool {
        self.by_trip.contains_key(trip)
    }

    /// Number of added trips.
    pub fn len(&self) -> usize {
        self.by_trip.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_trip.is_empty()
    }

    /// The synthesized pattern `trip` uses.
    pub fn pattern_for(&self, trip: &TripId) -> Option<&SynthesizedPattern> {
        let (_, pattern) = self.by_trip.get(trip)?;
        self.patterns.get(pattern)
    }

    /// Record that `trip` now runs on `synthesized` on `service_date`.
    ///
    /// The stored pattern is replaced so later removals see every trip
    /// the pattern has gained.
    pub fn insert(&mut self, trip: TripId, service_date: ServiceDate, synthesized: SynthesizedPattern) {
        let pattern = synthesized.pattern.id();
        if let Some(previous) = self.by_trip.insert(trip.clone(), (service_date, pattern)) {
            self.forget(&trip, previous);
        }
        *self.usage.entry(pattern).or_default() += 1;
        self.patterns.insert(pattern, synthesized);
        self.by_service_date
            .entry(service_date)
            .or_default()
            .insert(trip);
    }

    /// Forget `trip`. Returns `None` if it was never added.
    pub fn remove(&mut self, trip: &TripId) -> Option<RemovedTrip> {
        let (service_date, pattern) = self.by_trip.remove(trip)?;
        let synthesized = self.patterns.get(&pattern)?.clone();
        let last_user = self.forget(trip, (service_date, pattern));
        Some(RemovedTrip {
            service_date,
            synthesized,
            last_user,
        })
    }

    /// Store a newer version of a pattern that still has users.
    ///
    /// Ignored once the pattern's last trip has gone.
    pub fn update_pattern(&mut self, synthesized: SynthesizedPattern) {
        if let Some(stored) = self.patterns.get_mut(&synthesized.pattern.id()) {
            *stored = synthesized;
        }
    }

    /// Added trips running on `last` or any earlier date, oldest first.
    pub fn trips_through(&self, last: ServiceDate) -> Vec<TripId> {
        self.by_service_date
            .range(..=last)
            .flat_map(|(_, trips)| trips.iter().cloned())
            .collect()
    }

    /// Drop the pattern usage and date entry for `trip`.
    ///
    /// Returns true if the pattern has no users left.
    fn forget(&mut self, trip: &TripId, (service_date, pattern): (ServiceDate, PatternId)) -> bool {
        if let Some(trips) = self.by_service_date.get_mut(&service_date) {
            trips.remove(trip);
            if trips.is_empty() {
                self.by_service_date.remove(&service_date);
            }
        }

        let remaining = match self.usage.get_mut(&pattern) {
            Some(count) => {
                *count = count.saturating_sub(1);
                *count
            }
            None => 0,
        };
        if remaining == 0 {
            self.usage.remove(&pattern);
            self.patterns.remove(&pattern);
        }
        remaining == 0
    }
}
