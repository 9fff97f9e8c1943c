//! Baseline trip times built from the static schedule.

use std::sync::Arc;

use crate::domain::ServiceSeconds;
use crate::schedule::{PickDrop, ScheduleError, StopTime, Trip};

use super::{TripTimes, TripTimesKind};

/// The published schedule for one trip.
///
/// Built once when the static schedule is loaded and never modified.
/// Realtime variants hold an `Arc` to it and read through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledTripTimes {
    trip: Arc<Trip>,
    arrivals: Box<[ServiceSeconds]>,
    departures: Box<[ServiceSeconds]>,
    pickups: Box<[PickDrop]>,
    dropoffs: Box<[PickDrop]>,
}

impl ScheduledTripTimes {
    /// Build from a trip's stop times, which must already be in sequence order.
    pub fn new(trip: Arc<Trip>, stop_times: &[StopTime]) -> Result<Self, ScheduleError> {
        if stop_times.is_empty() {
            return Err(ScheduleError::EmptyTrip(trip.id.clone()));
        }

        Ok(Self {
            arrivals: stop_times.iter().map(|st| st.arrival).collect(),
            departures: stop_times.iter().map(|st| st.departure).collect(),
            pickups: stop_times.iter().map(|st| st.pickup).collect(),
            dropoffs: stop_times.iter().map(|st| st.dropoff).collect(),
            trip,
        })
    }

    /// The trip these times belong to.
    pub fn trip(&self) -> &Arc<Trip> {
        &self.trip
    }

    /// Number of stops served.
    pub fn num_stops(&self) -> usize {
        self.departures.len()
    }
}

impl TripTimes for ScheduledTripTimes {
    fn kind(&self) -> TripTimesKind {
        TripTimesKind::Scheduled
    }

    fn scheduled(&self) -> &ScheduledTripTimes {
        self
    }

    fn arrival_time(&self, stop: usize) -> ServiceSeconds {
        self.arrivals[stop]
    }

    fn departure_time(&self, stop: usize) -> ServiceSeconds {
        self.departures[stop]
    }

    fn pickup(&self, stop: usize) -> PickDrop {
        self.pickups[stop]
    }

    fn dropoff(&self, stop: usize) -> PickDrop {
        self.dropoffs[stop]
    }

    fn is_wheelchair_accessible(&self) -> bool {
        self.trip.wheelchair_accessible
    }
}
