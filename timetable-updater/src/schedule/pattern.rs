//! Trip patterns: trips that share a stop sequence.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::domain::{RouteId, StopId, TripId};
use crate::timetable::Timetable;
use crate::trip_times::ScheduledTripTimes;

use super::{ScheduleError, Trip};

/// Identifies a trip pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PatternId(pub u32);

impl fmt::Display for PatternId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// An ordered list of stops and the scheduled trips that serve it.
///
/// Immutable apart from the traversable flag, which routing checks before
/// using the pattern. Patterns made from realtime messages are marked
/// synthesized.
#[derive(Debug)]
pub struct TripPattern {
    id: PatternId,
    route_id: RouteId,
    scheduled: Arc<Timetable>,
    traversable: AtomicBool,
    synthesized: bool,
}

impl TripPattern {
    /// A pattern from the static schedule.
    pub fn new(
        id: PatternId,
        route_id: RouteId,
        stops: Vec<StopId>,
        trips: Vec<Arc<ScheduledTripTimes>>,
    ) -> Result<Self, ScheduleError> {
        let mut scheduled = Timetable::new(id, stops.into(), trips)?;
        scheduled.finish();
        Ok(Self {
            id,
            route_id,
            scheduled: Arc::new(scheduled),
            traversable: AtomicBool::new(true),
            synthesized: false,
        })
    }

    /// A pattern created for a trip that only exists in realtime.
    pub fn synthesized(
        id: PatternId,
        route_id: RouteId,
        stops: Vec<StopId>,
        trips: Vec<Arc<ScheduledTripTimes>>,
    ) -> Result<Self, ScheduleError> {
        let mut pattern = Self::new(id, route_id, stops, trips)?;
        pattern.synthesized = true;
        Ok(pattern)
    }

    /// A copy of this pattern that also carries `trip`.
    ///
    /// A trip already present has its scheduled times replaced.
    pub fn with_trip(&self, trip: Arc<ScheduledTripTimes>) -> Result<Self, ScheduleError> {
        let mut scheduled = (*self.scheduled).clone();
        scheduled.insert_trip(trip)?;
        scheduled.finish();
        Ok(Self {
            id: self.id,
            route_id: self.route_id.clone(),
            scheduled: Arc::new(scheduled),
            traversable: AtomicBool::new(self.is_traversable()),
            synthesized: self.synthesized,
        })
    }

    /// A copy of this pattern without `trip`.
    pub fn without_trip(&self, trip: &TripId) -> Self {
        let mut scheduled = (*self.scheduled).clone();
        scheduled.remove_trip(trip);
        scheduled.finish();
        Self {
            id: self.id,
            route_id: self.route_id.clone(),
            scheduled: Arc::new(scheduled),
            traversable: AtomicBool::new(self.is_traversable()),
            synthesized: self.synthesized,
        }
    }

    pub fn id(&self) -> PatternId {
        self.id
    }

    pub fn route_id(&self) -> &RouteId {
        &self.route_id
    }

    /// Stops in visiting order.
    pub fn stops(&self) -> &[StopId] {
        self.scheduled.stops()
    }

    /// Scheduled times of every trip, with no service date.
    pub fn scheduled_timetable(&self) -> &Arc<Timetable> {
        &self.scheduled
    }

    /// Scheduled times of `trip`, if it belongs here.
    pub fn scheduled_trip(&self, trip: &TripId) -> Option<&Arc<ScheduledTripTimes>> {
        self.scheduled
            .trip_index(trip)
            .and_then(|index| self.scheduled.scheduled_at(index))
    }

    /// Every trip of the pattern.
    pub fn trips(&self) -> impl Iterator<Item = &Arc<Trip>> {
        self.scheduled.scheduled_trips().map(|times| times.trip())
    }

    /// Returns true if routing may use this pattern.
    pub fn is_traversable(&self) -> bool {
        self.traversable.load(Ordering::Acquire)
    }

    pub fn set_traversable(&self, traversable: bool) {
        self.traversable.store(traversable, Ordering::Release);
    }

    /// Returns true if the pattern was made from realtime messages.
    pub fn is_synthesized(&self) -> bool {
        self.synthesized
    }
}
