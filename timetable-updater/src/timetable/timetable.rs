//! Trip times for every trip of one pattern.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::{ServiceDate, ServiceSeconds, StopId, TripId, is_sentinel};
use crate::schedule::{PatternId, ScheduleError};
use crate::trip_times::{
    ReconcileConfig, ReconcileError, ScheduledTripTimes, SharedTripTimes, TripTimes, reconcile,
};
use crate::update::TripUpdate;

/// Per-stop times sorted for lookups, built by [`Timetable::finish`].
#[derive(Debug)]
struct StopIndex {
    /// `(departure, trip)` for trips boardable at each stop.
    departures: Vec<Vec<(ServiceSeconds, usize)>>,
    /// `(arrival, trip)` for trips alightable at each stop.
    arrivals: Vec<Vec<(ServiceSeconds, usize)>>,
}

impl StopIndex {
    fn build(stops: usize, trips: &[SharedTripTimes]) -> Self {
        let mut departures = vec![Vec::new(); stops];
        let mut arrivals = vec![Vec::new(); stops];
        for (trip, times) in trips.iter().enumerate() {
            for stop in 0..stops {
                if times.can_board(stop) {
                    departures[stop].push((times.departure_time(stop), trip));
                }
                if times.can_alight(stop) {
                    arrivals[stop].push((times.arrival_time(stop), trip));
                }
            }
        }
        for list in departures.iter_mut().chain(arrivals.iter_mut()) {
            list.sort_unstable();
        }
        Self {
            departures,
            arrivals,
        }
    }
}

/// All trips of one pattern, with their current trip times.
///
/// The pattern's own copy holds scheduled times and has no service date.
/// Realtime copies are per service date and are cloned from it on first
/// write. Any change drops the stop index until [`finish`] runs again.
///
/// [`finish`]: Timetable::finish
#[derive(Debug, Clone)]
pub struct Timetable {
    pattern: PatternId,
    service_date: Option<ServiceDate>,
    stops: Arc<[StopId]>,
    scheduled: Vec<Arc<ScheduledTripTimes>>,
    trip_times: Vec<SharedTripTimes>,
    trip_index: HashMap<TripId, usize>,
    stop_index: Option<Arc<StopIndex>>,
}

impl Timetable {
    /// Build a scheduled timetable. Every trip must serve exactly `stops`.
    pub fn new(
        pattern: PatternId,
        stops: Arc<[StopId]>,
        scheduled: Vec<Arc<ScheduledTripTimes>>,
    ) -> Result<Self, ScheduleError> {
        let mut timetable = Self {
            pattern,
            service_date: None,
            stops,
            scheduled: Vec::with_capacity(scheduled.len()),
            trip_times: Vec::with_capacity(scheduled.len()),
            trip_index: HashMap::with_capacity(scheduled.len()),
            stop_index: None,
        };
        for trip in scheduled {
            if timetable.trip_index.contains_key(&trip.trip().id) {
                return Err(ScheduleError::DuplicateTrip(trip.trip().id.clone()));
            }
            timetable.insert_trip(trip)?;
        }
        Ok(timetable)
    }

    /// A copy of this timetable for one service date.
    pub fn for_date(&self, service_date: ServiceDate) -> Self {
        Self {
            service_date: Some(service_date),
            ..self.clone()
        }
    }

    pub fn pattern(&self) -> PatternId {
        self.pattern
    }

    /// `None` for a pattern's scheduled timetable.
    pub fn service_date(&self) -> Option<ServiceDate> {
        self.service_date
    }

    pub fn stops(&self) -> &[StopId] {
        &self.stops
    }

    /// Number of trips.
    pub fn len(&self) -> usize {
        self.trip_times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trip_times.is_empty()
    }

    /// Position of `trip` within this timetable.
    pub fn trip_index(&self, trip: &TripId) -> Option<usize> {
        self.trip_index.get(trip).copied()
    }

    /// Current trip times for `trip`.
    pub fn get(&self, trip: &TripId) -> Option<&SharedTripTimes> {
        self.trip_index(trip).map(|i| &self.trip_times[i])
    }

    /// Current trip times at position `index`.
    pub fn trip_times_at(&self, index: usize) -> Option<&SharedTripTimes> {
        self.trip_times.get(index)
    }

    /// Scheduled trip times at position `index`.
    pub fn scheduled_at(&self, index: usize) -> Option<&Arc<ScheduledTripTimes>> {
        self.scheduled.get(index)
    }

    /// Current trip times in position order.
    pub fn iter(&self) -> impl Iterator<Item = &SharedTripTimes> {
        self.trip_times.iter()
    }

    /// Scheduled trip times in position order.
    pub fn scheduled_trips(&self) -> impl Iterator<Item = &Arc<ScheduledTripTimes>> {
        self.scheduled.iter()
    }

    /// Add a trip, or reset it to `scheduled` if already present.
    ///
    /// Returns the trip's position.
    pub fn insert_trip(
        &mut self,
        scheduled: Arc<ScheduledTripTimes>,
    ) -> Result<usize, ScheduleError> {
        if scheduled.num_stops() != self.stops.len() {
            return Err(ScheduleError::StopCountMismatch {
                trip: scheduled.trip().id.clone(),
                expected: self.stops.len(),
                actual: scheduled.num_stops(),
            });
        }

        self.stop_index = None;
        let current: SharedTripTimes = scheduled.clone();
        match self.trip_index.get(&scheduled.trip().id) {
            Some(&index) => {
                self.scheduled[index] = scheduled;
                self.trip_times[index] = current;
                Ok(index)
            }
            None => {
                let index = self.trip_times.len();
                self.trip_index.insert(scheduled.trip().id.clone(), index);
                self.scheduled.push(scheduled);
                self.trip_times.push(current);
                Ok(index)
            }
        }
    }

    /// Take `trip` out. Later trips move up one position.
    ///
    /// Returns false if the trip was not here.
    pub fn remove_trip(&mut self, trip: &TripId) -> bool {
        let Some(index) = self.trip_index.remove(trip) else {
            return false;
        };
        self.stop_index = None;
        self.scheduled.remove(index);
        self.trip_times.remove(index);
        for position in self.trip_index.values_mut() {
            if *position > index {
                *position -= 1;
            }
        }
        true
    }

    /// Work out the trip times `update` leads to, without applying them.
    ///
    /// Returns the trip's position along with the new times.
    pub fn reconcile_trip(
        &self,
        update: &TripUpdate,
        config: &ReconcileConfig,
    ) -> Result<(usize, SharedTripTimes), ReconcileError> {
        let index = self
            .trip_index(&update.trip_id)
            .ok_or_else(|| ReconcileError::TripNotInPattern(update.trip_id.clone()))?;
        let times = reconcile(
            &self.stops,
            &self.scheduled[index],
            &self.trip_times[index],
            update,
            config,
        )?;
        Ok((index, times))
    }

    /// Replace the trip times at `index`.
    pub fn set_trip_times(&mut self, index: usize, times: SharedTripTimes) {
        self.stop_index = None;
        self.trip_times[index] = times;
    }

    /// Build the stop index if it is missing.
    pub fn finish(&mut self) {
        if self.stop_index.is_none() {
            self.stop_index = Some(Arc::new(StopIndex::build(
                self.stops.len(),
                &self.trip_times,
            )));
        }
    }

    /// Returns true if the stop index is current.
    pub fn is_finished(&self) -> bool {
        self.stop_index.is_some()
    }

    /// Earliest boardable departure from `stop` at or after `after`.
    ///
    /// Returns the trip's position and the departure time.
    pub fn next_departure(
        &self,
        stop: usize,
        after: ServiceSeconds,
    ) -> Option<(usize, ServiceSeconds)> {
        match &self.stop_index {
            Some(index) => {
                let list = index.departures.get(stop)?;
                let at = list.partition_point(|(t, _)| *t < after);
                list.get(at).map(|(t, trip)| (*trip, *t))
            }
            None => self
                .trip_times
                .iter()
                .enumerate()
                .filter(|(_, times)| stop < times.num_stops() && times.can_board(stop))
                .map(|(trip, times)| (times.departure_time(stop), trip))
                .filter(|(t, _)| !is_sentinel(*t) && *t >= after)
                .min()
                .map(|(t, trip)| (trip, t)),
        }
    }

    /// Latest alightable arrival at `stop` at or before `before`.
    ///
    /// Returns the trip's position and the arrival time.
    pub fn last_arrival(
        &self,
        stop: usize,
        before: ServiceSeconds,
    ) -> Option<(usize, ServiceSeconds)> {
        match &self.stop_index {
            Some(index) => {
                let list = index.arrivals.get(stop)?;
                let at = list.partition_point(|(t, _)| *t <= before);
                at.checked_sub(1)
                    .and_then(|i| list.get(i))
                    .map(|(t, trip)| (*trip, *t))
            }
            None => self
                .trip_times
                .iter()
                .enumerate()
                .filter(|(_, times)| stop < times.num_stops() && times.can_alight(stop))
                .map(|(trip, times)| (times.arrival_time(stop), trip))
                .filter(|(t, _)| !is_sentinel(*t) && *t <= before)
                .max()
                .map(|(t, trip)| (trip, t)),
        }
    }
}
