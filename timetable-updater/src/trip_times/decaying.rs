//! Fallback estimate: a delay that fades back to the schedule.

use std::sync::Arc;

use crate::domain::ServiceSeconds;
use crate::schedule::PickDrop;

use super::{ScheduledTripTimes, TripTimes, TripTimesKind};

/// Scheduled times shifted by a delay that shrinks as the trip goes on.
///
/// From stop `start` the delay starts at `initial_delay` and moves toward
/// zero by `recovery_secs_per_minute` seconds for every scheduled minute
/// travelled past the scheduled departure from `start`. Stops before
/// `start` read through to the schedule.
///
/// With a recovery rate below 60 the result runs forwards whenever the
/// schedule does, and the delay is gone after `|initial_delay| * 60 / rate`
/// scheduled seconds.
#[derive(Debug, Clone)]
pub struct DecayingDelayTripTimes {
    scheduled: Arc<ScheduledTripTimes>,
    start: usize,
    initial_delay: ServiceSeconds,
    recovery_secs_per_minute: u32,
    wheelchair_accessible: bool,
}

impl DecayingDelayTripTimes {
    pub fn new(
        scheduled: Arc<ScheduledTripTimes>,
        start: usize,
        initial_delay: ServiceSeconds,
        recovery_secs_per_minute: u32,
        wheelchair_accessible: Option<bool>,
    ) -> Self {
        let wheelchair_accessible =
            wheelchair_accessible.unwrap_or_else(|| scheduled.is_wheelchair_accessible());
        Self {
            scheduled,
            start,
            initial_delay,
            recovery_secs_per_minute,
            wheelchair_accessible,
        }
    }

    /// Stop where the delay was observed.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Delay at `start`.
    pub fn initial_delay(&self) -> ServiceSeconds {
        self.initial_delay
    }

    /// Delay applied to a scheduled time at `stop`.
    fn delay_at(&self, stop: usize, scheduled_time: ServiceSeconds) -> ServiceSeconds {
        if stop < self.start || self.initial_delay == 0 {
            return 0;
        }
        let origin = i64::from(self.scheduled.departure_time(self.start));
        let elapsed = (i64::from(scheduled_time) - origin).max(0);
        let recovered = elapsed * i64::from(self.recovery_secs_per_minute) / 60;
        let remaining = (i64::from(self.initial_delay).abs() - recovered).max(0);
        // remaining <= |initial_delay|, so it fits
        let remaining = remaining as ServiceSeconds;
        if self.initial_delay < 0 {
            -remaining
        } else {
            remaining
        }
    }

    /// First stop at or after `start` where the delay has fully decayed.
    pub fn recovered_at(&self) -> Option<usize> {
        (self.start..self.num_stops()).find(|&stop| {
            self.delay_at(stop, self.scheduled.arrival_time(stop)) == 0
                && self.delay_at(stop, self.scheduled.departure_time(stop)) == 0
        })
    }
}

impl TripTimes for DecayingDelayTripTimes {
    fn kind(&self) -> TripTimesKind {
        TripTimesKind::DecayingDelay
    }

    fn scheduled(&self) -> &ScheduledTripTimes {
        &self.scheduled
    }

    fn arrival_time(&self, stop: usize) -> ServiceSeconds {
        let t = self.scheduled.arrival_time(stop);
        t + self.delay_at(stop, t)
    }

    fn departure_time(&self, stop: usize) -> ServiceSeconds {
        let t = self.scheduled.departure_time(stop);
        t + self.delay_at(stop, t)
    }

    fn pickup(&self, stop: usize) -> PickDrop {
        self.scheduled.pickup(stop)
    }

    fn dropoff(&self, stop: usize) -> PickDrop {
        self.scheduled.dropoff(stop)
    }

    fn is_wheelchair_accessible(&self) -> bool {
        self.wheelchair_accessible
    }
}
