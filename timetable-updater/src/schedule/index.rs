//! Lookups from trips to patterns, and the stop and agency registry.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::{StopId, TripId};

use super::{Agency, GraphError, PatternId, Stop, SynthesizedPattern, TripPattern};

/// What the updater needs to know about the static schedule.
pub trait TransitIndex: Send {
    /// The pattern `trip` currently belongs to.
    fn pattern_for_trip(&self, trip: &TripId) -> Option<Arc<TripPattern>>;

    /// Every known stop.
    fn all_stops(&self) -> &HashMap<StopId, Stop>;

    /// The agency with id `agency_id`.
    fn agency(&self, agency_id: &str) -> Option<&Agency>;

    /// Make a synthesized pattern and its trips findable.
    fn add_synthesized_pattern(&mut self, synthesized: &SynthesizedPattern);

    /// Forget a synthesized pattern and its trips.
    fn remove_synthesized_pattern(&mut self, synthesized: &SynthesizedPattern);
}

/// A [`TransitIndex`] held in hash maps.
#[derive(Debug, Default)]
pub struct InMemoryTransitIndex {
    agencies: HashMap<String, Agency>,
    stops: HashMap<StopId, Stop>,
    patterns: HashMap<PatternId, Arc<TripPattern>>,
    pattern_by_trip: HashMap<TripId, PatternId>,
}

impl InMemoryTransitIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_agency(&mut self, agency: Agency) {
        self.agencies.insert(agency.id.clone(), agency);
    }

    pub fn add_stop(&mut self, stop: Stop) {
        self.stops.insert(stop.id.clone(), stop);
    }

    /// Register a scheduled pattern and its trips.
    pub fn add_pattern(&mut self, pattern: Arc<TripPattern>) -> Result<(), GraphError> {
        if self.patterns.contains_key(&pattern.id()) {
            return Err(GraphError::DuplicatePattern(pattern.id()));
        }
        self.register(pattern);
        Ok(())
    }

    pub fn pattern(&self, id: PatternId) -> Option<&Arc<TripPattern>> {
        self.patterns.get(&id)
    }

    /// Every registered pattern, in no particular order.
    pub fn patterns(&self) -> impl Iterator<Item = &Arc<TripPattern>> {
        self.patterns.values()
    }

    /// The first pattern id not yet used.
    pub fn next_pattern_id(&self) -> PatternId {
        PatternId(self.patterns.keys().map(|id| id.0 + 1).max().unwrap_or(0))
    }

    fn register(&mut self, pattern: Arc<TripPattern>) {
        for trip in pattern.trips() {
            self.pattern_by_trip.insert(trip.id.clone(), pattern.id());
        }
        self.patterns.insert(pattern.id(), pattern);
    }
}

impl TransitIndex for InMemoryTransitIndex {
    fn pattern_for_trip(&self, trip: &TripId) -> Option<Arc<TripPattern>> {
        let id = self.pattern_by_trip.get(trip)?;
        self.patterns.get(id).cloned()
    }

    fn all_stops(&self) -> &HashMap<StopId, Stop> {
        &self.stops
    }

    fn agency(&self, agency_id: &str) -> Option<&Agency> {
        self.agencies.get(agency_id)
    }

    fn add_synthesized_pattern(&mut self, synthesized: &SynthesizedPattern) {
        self.register(synthesized.pattern.clone());
    }

    fn remove_synthesized_pattern(&mut self, synthesized: &SynthesizedPattern) {
        let id = synthesized.pattern.id();
        self.patterns.remove(&id);
        self.pattern_by_trip.retain(|_, pattern| *pattern != id);
    }
}
