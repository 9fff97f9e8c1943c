//! Per-trip time lookups and the realtime variants layered over them.
//!
//! Every trip has one immutable [`ScheduledTripTimes`]. Realtime patches
//! never modify it; they produce a wrapper that stores only the deviation
//! and reads through to what it wraps everywhere else:
//!
//! - [`UpdatedTripTimes`]: explicit times for a contiguous block of stops
//! - [`CanceledTripTimes`]: the whole trip is off
//! - [`DecayingDelayTripTimes`]: a delay fading back to schedule, used
//!   when an update would make times run backwards
//!
//! All four implement [`TripTimes`], which is the only interface routing
//! code needs. Stops are addressed by their position in the trip's stop
//! sequence; hop `h` runs from stop `h` to stop `h + 1`.

mod canceled;
mod decaying;
mod factory;
mod scheduled;
mod updated;

use std::fmt;
use std::sync::Arc;

pub use canceled::CanceledTripTimes;
pub use decaying::DecayingDelayTripTimes;
pub use factory::{ReconcileConfig, ReconcileError, reconcile};
pub use scheduled::ScheduledTripTimes;
pub use updated::{StopFlags, UpdatedTripTimes};

use crate::domain::{ServiceSeconds, format_service_time, is_sentinel};
use crate::schedule::{PickDrop, Trip};

/// Which variant a [`TripTimes`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TripTimesKind {
    Scheduled,
    Updated,
    Canceled,
    DecayingDelay,
}

/// Time and boarding lookups over one trip's stop sequence.
///
/// Implementations are immutable once built and may be shared freely
/// between threads. Stop positions must be below [`num_stops`]; lookups
/// past the end panic like slice indexing.
///
/// [`num_stops`]: TripTimes::num_stops
pub trait TripTimes: fmt::Debug + Send + Sync {
    /// Which variant this is.
    fn kind(&self) -> TripTimesKind;

    /// The baseline schedule at the bottom of any wrapping.
    fn scheduled(&self) -> &ScheduledTripTimes;

    /// Arrival at `stop`, or a sentinel.
    fn arrival_time(&self, stop: usize) -> ServiceSeconds;

    /// Departure from `stop`, or a sentinel.
    fn departure_time(&self, stop: usize) -> ServiceSeconds;

    /// Boarding permission at `stop`.
    fn pickup(&self, stop: usize) -> PickDrop;

    /// Alighting permission at `stop`.
    fn dropoff(&self, stop: usize) -> PickDrop;

    /// Whether the vehicle can take a wheelchair.
    fn is_wheelchair_accessible(&self) -> bool;

    /// Downcast to an overlay, used when stacking a newer overlay on top.
    fn as_updated(&self) -> Option<&UpdatedTripTimes> {
        None
    }

    /// The trip these times describe.
    fn trip(&self) -> &Arc<Trip> {
        self.scheduled().trip()
    }

    /// Number of stops in the trip.
    fn num_stops(&self) -> usize {
        self.scheduled().num_stops()
    }

    /// Returns true if the whole trip is canceled.
    fn is_canceled(&self) -> bool {
        self.kind() == TripTimesKind::Canceled
    }

    /// Returns true if a passenger can get on at `stop`.
    fn can_board(&self, stop: usize) -> bool {
        self.pickup(stop).is_allowed() && !is_sentinel(self.departure_time(stop))
    }

    /// Returns true if a passenger can get off at `stop`.
    fn can_alight(&self, stop: usize) -> bool {
        self.dropoff(stop).is_allowed() && !is_sentinel(self.arrival_time(stop))
    }

    /// Travel time over hop `hop`, from stop `hop` to stop `hop + 1`.
    ///
    /// Skipped stops are bridged: the hop is measured from the last stop
    /// at or before `hop` that still has a departure. A hop ending at a
    /// skipped stop takes no time.
    fn running_time(&self, hop: usize) -> ServiceSeconds {
        let arrival = self.arrival_time(hop + 1);
        if is_sentinel(arrival) {
            return 0;
        }
        (0..=hop)
            .rev()
            .map(|stop| self.departure_time(stop))
            .find(|t| !is_sentinel(*t))
            .map_or(0, |departure| arrival - departure)
    }

    /// Time spent standing at `stop`, zero if either end is a sentinel.
    fn dwell_time(&self, stop: usize) -> ServiceSeconds {
        let arrival = self.arrival_time(stop);
        let departure = self.departure_time(stop);
        if is_sentinel(arrival) || is_sentinel(departure) {
            0
        } else {
            departure - arrival
        }
    }

    /// Realtime minus scheduled arrival, `None` at skipped stops.
    fn arrival_delay(&self, stop: usize) -> Option<ServiceSeconds> {
        let t = self.arrival_time(stop);
        (!is_sentinel(t)).then(|| t - self.scheduled().arrival_time(stop))
    }

    /// Realtime minus scheduled departure, `None` at skipped stops.
    fn departure_delay(&self, stop: usize) -> Option<ServiceSeconds> {
        let t = self.departure_time(stop);
        (!is_sentinel(t)).then(|| t - self.scheduled().departure_time(stop))
    }

    /// Returns true if times never run backwards along the trip.
    ///
    /// Checks `arrival(i) <= departure(i) <= arrival(i + 1)` over every
    /// stop, ignoring sentinels.
    fn times_increasing(&self) -> bool {
        let mut last = ServiceSeconds::MIN;
        for stop in 0..self.num_stops() {
            for t in [self.arrival_time(stop), self.departure_time(stop)] {
                if is_sentinel(t) {
                    continue;
                }
                if t < last {
                    return false;
                }
                last = t;
            }
        }
        true
    }
}

/// Shared handle to any trip times variant.
pub type SharedTripTimes = Arc<dyn TripTimes>;

/// Renders a stop-by-stop table for log output.
pub fn dump_times(times: &dyn TripTimes) -> String {
    let mut out = String::new();
    for stop in 0..times.num_stops() {
        out.push_str(&format!(
            "  {stop:>3}  arr {:>9}  dep {:>9}  board {:<5} alight {}\n",
            format_service_time(times.arrival_time(stop)),
            format_service_time(times.departure_time(stop)),
            times.can_board(stop),
            times.can_alight(stop),
        ));
    }
    out
}
