//! Whole-trip cancellation.

use std::sync::Arc;

use crate::domain::{CANCELED, ServiceSeconds};
use crate::schedule::PickDrop;

use super::{ScheduledTripTimes, TripTimes, TripTimesKind};

/// A trip that will not run. Every stop is closed and reports [`CANCELED`].
#[derive(Debug, Clone)]
pub struct CanceledTripTimes {
    scheduled: Arc<ScheduledTripTimes>,
}

impl CanceledTripTimes {
    pub fn new(scheduled: Arc<ScheduledTripTimes>) -> Self {
        Self { scheduled }
    }
}

impl TripTimes for CanceledTripTimes {
    fn kind(&self) -> TripTimesKind {
        TripTimesKind::Canceled
    }

    fn scheduled(&self) -> &ScheduledTripTimes {
        &self.scheduled
    }

    fn arrival_time(&self, _stop: usize) -> ServiceSeconds {
        CANCELED
    }

    fn departure_time(&self, _stop: usize) -> ServiceSeconds {
        CANCELED
    }

    fn pickup(&self, _stop: usize) -> PickDrop {
        PickDrop::None
    }

    fn dropoff(&self, _stop: usize) -> PickDrop {
        PickDrop::None
    }

    fn is_wheelchair_accessible(&self) -> bool {
        self.scheduled.is_wheelchair_accessible()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::eight_stop_schedule;

    #[test]
    fn every_stop_closed() {
        let times = CanceledTripTimes::new(eight_stop_schedule());
        assert!(times.is_canceled());
        assert_eq!(times.num_stops(), 8);
        for stop in 0..8 {
            assert!(!times.can_board(stop));
            assert!(!times.can_alight(stop));
            assert_eq!(times.arrival_time(stop), CANCELED);
        }
        assert_eq!(times.running_time(3), 0);
        assert!(times.times_increasing());
    }

    #[test]
    fn wheelchair_passes_through() {
        let sched = eight_stop_schedule();
        let times = CanceledTripTimes::new(sched.clone());
        assert_eq!(
            times.is_wheelchair_accessible(),
            sched.is_wheelchair_accessible()
        );
    }
}
