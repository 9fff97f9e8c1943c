//! Partial overlay of realtime times on a block of stops.

use crate::domain::{CANCELED, PASSED, ServiceSeconds};
use crate::schedule::PickDrop;
use crate::update::{StopStatus, TripUpdate};

use super::{ScheduledTripTimes, SharedTripTimes, TripTimes, TripTimesKind};

/// Boarding and alighting permission for one overlaid stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopFlags {
    pub pickup: PickDrop,
    pub dropoff: PickDrop,
}

impl StopFlags {
    const CLOSED: StopFlags = StopFlags {
        pickup: PickDrop::None,
        dropoff: PickDrop::None,
    };

    fn of(times: &dyn TripTimes, stop: usize) -> Self {
        Self {
            pickup: times.pickup(stop),
            dropoff: times.dropoff(stop),
        }
    }
}

/// Realtime times for stops `offset .. offset + span`, reading through to
/// the wrapped trip times everywhere else.
///
/// Arrays are sized to the span, not the trip. After construction the
/// overlay is compacted: a tail that matches the wrapped times is cut off,
/// and arrivals or flags identical to what would be read through anyway
/// are dropped.
#[derive(Debug, Clone)]
pub struct UpdatedTripTimes {
    delegate: SharedTripTimes,
    offset: usize,
    /// `None` when every arrival equals the departure at the same stop.
    arrivals: Option<Vec<ServiceSeconds>>,
    departures: Vec<ServiceSeconds>,
    /// `None` when every flag equals the wrapped one.
    flags: Option<Vec<StopFlags>>,
    wheelchair_accessible: bool,
}

impl UpdatedTripTimes {
    /// Overlay the patches of `update` on `delegate`, starting at stop `offset`.
    ///
    /// The patches must fit inside the trip: `offset + len <= num_stops`.
    /// When `delegate` is itself an overlay lying entirely inside the new
    /// block it is skipped, so repeated updates do not build deep chains.
    pub fn new(delegate: SharedTripTimes, update: &TripUpdate, offset: usize) -> Self {
        let span = update.updates.len();
        debug_assert!(offset + span <= delegate.num_stops());

        let wheelchair_accessible = update
            .wheelchair_accessible
            .unwrap_or_else(|| delegate.is_wheelchair_accessible());

        let mut arrivals = Vec::with_capacity(span);
        let mut departures = Vec::with_capacity(span);
        let mut flags = Vec::with_capacity(span);

        let scheduled: &ScheduledTripTimes = delegate.scheduled();
        for (i, patch) in update.updates.iter().enumerate() {
            let stop = offset + i;
            let (arrival, departure, stop_flags) = if patch.status.closes_stop() {
                let marker = match patch.status {
                    StopStatus::Passed => PASSED,
                    _ => CANCELED,
                };
                (marker, marker, StopFlags::CLOSED)
            } else {
                // times on a planned or unknown stop are ignored
                let reported = patch
                    .status
                    .has_times()
                    .then(|| patch.arrival.or(patch.departure))
                    .flatten();
                match reported {
                    Some(arrival) => (
                        arrival,
                        patch.departure.unwrap_or(arrival),
                        StopFlags::of(scheduled, stop),
                    ),
                    None => (
                        scheduled.arrival_time(stop),
                        scheduled.departure_time(stop),
                        StopFlags::of(scheduled, stop),
                    ),
                }
            };
            arrivals.push(arrival);
            departures.push(departure);
            flags.push(stop_flags);
        }

        let delegate = Self::skip_covered(delegate, offset, span);
        let mut overlay = Self {
            delegate,
            offset,
            arrivals: Some(arrivals),
            departures,
            flags: Some(flags),
            wheelchair_accessible,
        };
        overlay.compact();
        overlay
    }

    /// Unwrap overlays whose whole span lies inside `offset .. offset + span`.
    fn skip_covered(mut delegate: SharedTripTimes, offset: usize, span: usize) -> SharedTripTimes {
        loop {
            let inner = match delegate.as_updated() {
                Some(inner) if inner.offset >= offset && inner.end() <= offset + span => {
                    inner.delegate.clone()
                }
                _ => return delegate,
            };
            delegate = inner;
        }
    }

    /// First overlaid stop.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Number of overlaid stops remaining after compaction.
    pub fn span(&self) -> usize {
        self.departures.len()
    }

    /// One past the last overlaid stop.
    fn end(&self) -> usize {
        self.offset + self.span()
    }

    /// The trip times this overlay reads through to.
    pub fn delegate(&self) -> &SharedTripTimes {
        &self.delegate
    }

    /// Position within the overlay arrays, if `stop` is overlaid.
    fn slot(&self, stop: usize) -> Option<usize> {
        stop.checked_sub(self.offset)
            .filter(|slot| *slot < self.departures.len())
    }

    fn arrival_at(&self, slot: usize) -> ServiceSeconds {
        match &self.arrivals {
            Some(arrivals) => arrivals[slot],
            None => self.departures[slot],
        }
    }

    fn flags_at(&self, slot: usize) -> StopFlags {
        match &self.flags {
            Some(flags) => flags[slot],
            None => StopFlags::of(&*self.delegate, self.offset + slot),
        }
    }

    /// Shrink the overlay without changing any lookup result.
    ///
    /// Returns true if anything was dropped. Calling it again is a no-op.
    pub fn compact(&mut self) -> bool {
        let mut changed = false;

        while let Some(last) = self.departures.len().checked_sub(1) {
            let stop = self.offset + last;
            let same = self.arrival_at(last) == self.delegate.arrival_time(stop)
                && self.departures[last] == self.delegate.departure_time(stop)
                && self.flags_at(last) == StopFlags::of(&*self.delegate, stop);
            if !same {
                break;
            }
            self.departures.pop();
            if let Some(arrivals) = &mut self.arrivals {
                arrivals.pop();
            }
            if let Some(flags) = &mut self.flags {
                flags.pop();
            }
            changed = true;
        }

        if self
            .arrivals
            .as_ref()
            .is_some_and(|arrivals| arrivals[..] == self.departures[..])
        {
            self.arrivals = None;
            changed = true;
        }

        let flags_redundant = self.flags.as_ref().is_some_and(|flags| {
            flags.iter().enumerate().all(|(slot, f)| {
                *f == StopFlags::of(&*self.delegate, self.offset + slot)
            })
        });
        if flags_redundant {
            self.flags = None;
            changed = true;
        }

        changed
    }
}

impl TripTimes for UpdatedTripTimes {
    fn kind(&self) -> TripTimesKind {
        TripTimesKind::Updated
    }

    fn scheduled(&self) -> &ScheduledTripTimes {
        self.delegate.scheduled()
    }

    fn arrival_time(&self, stop: usize) -> ServiceSeconds {
        match self.slot(stop) {
            Some(slot) => self.arrival_at(slot),
            None => self.delegate.arrival_time(stop),
        }
    }

    fn departure_time(&self, stop: usize) -> ServiceSeconds {
        match self.slot(stop) {
            Some(slot) => self.departures[slot],
            None => self.delegate.departure_time(stop),
        }
    }

    fn pickup(&self, stop: usize) -> PickDrop {
        match (self.slot(stop), &self.flags) {
            (Some(slot), Some(flags)) => flags[slot].pickup,
            _ => self.delegate.pickup(stop),
        }
    }

    fn dropoff(&self, stop: usize) -> PickDrop {
        match (self.slot(stop), &self.flags) {
            (Some(slot), Some(flags)) => flags[slot].dropoff,
            _ => self.delegate.dropoff(stop),
        }
    }

    fn is_wheelchair_accessible(&self) -> bool {
        self.wheelchair_accessible
    }

    fn as_updated(&self) -> Option<&UpdatedTripTimes> {
        Some(self)
    }
}
