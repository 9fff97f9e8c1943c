//! Turns a batch of stop patches into the trip times that replace a trip's current ones.

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::domain::{StopId, TripId, is_sentinel};
use crate::update::TripUpdate;

use super::{
    CanceledTripTimes, DecayingDelayTripTimes, ScheduledTripTimes, SharedTripTimes, TripTimes,
    TripTimesKind, UpdatedTripTimes, dump_times,
};

/// Tuning for reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileConfig {
    recovery_secs_per_minute: u32,
}

impl ReconcileConfig {
    /// Fastest recovery that still keeps decayed times increasing.
    pub const MAX_RECOVERY_SECS_PER_MINUTE: u32 = 59;

    /// Create a configuration, clamping the rate into the usable range.
    pub fn new(recovery_secs_per_minute: u32) -> Self {
        Self {
            recovery_secs_per_minute: recovery_secs_per_minute
                .clamp(1, Self::MAX_RECOVERY_SECS_PER_MINUTE),
        }
    }

    /// Seconds of delay recovered per scheduled minute of travel when
    /// falling back to a decaying delay. Always within `1..=59`, so the
    /// fallback both recovers and never runs backwards.
    pub fn recovery_secs_per_minute(&self) -> u32 {
        self.recovery_secs_per_minute
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            recovery_secs_per_minute: 30,
        }
    }
}

/// Reasons a batch could not be turned into trip times.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReconcileError {
    /// The timetable has no entry for the batch's trip
    #[error("trip {0} is not part of this pattern")]
    TripNotInPattern(TripId),

    /// The patches do not line up with the pattern's stops
    #[error("could not align updates for trip {trip} with its stops")]
    MatchFailed { trip: TripId },

    /// Even the decaying fallback runs backwards, so the schedule itself is broken
    #[error("times for trip {trip} decrease even after falling back to a decaying delay")]
    NonIncreasing { trip: TripId },
}

/// Compute the trip times that result from applying `update`.
///
/// `current` is what the timetable holds for the trip right now and
/// `scheduled` is its baseline. Removal returns the baseline and
/// cancellation wraps it. Anything else is overlaid on `current` when that
/// is a schedule or an overlay, and on the baseline otherwise. An overlay
/// whose times would run backwards is replaced by a decaying delay seeded
/// at the first stop that has a time.
pub fn reconcile(
    pattern_stops: &[StopId],
    scheduled: &Arc<ScheduledTripTimes>,
    current: &SharedTripTimes,
    update: &TripUpdate,
    config: &ReconcileConfig,
) -> Result<SharedTripTimes, ReconcileError> {
    if update.is_removal() {
        let times: SharedTripTimes = scheduled.clone();
        return Ok(times);
    }
    if update.is_cancellation() {
        return Ok(Arc::new(CanceledTripTimes::new(scheduled.clone())));
    }

    let start = update
        .find_update_stop_index(pattern_stops)
        .filter(|start| start + update.updates.len() <= scheduled.num_stops())
        .ok_or_else(|| ReconcileError::MatchFailed {
            trip: update.trip_id.clone(),
        })?;

    let base: SharedTripTimes = match current.kind() {
        TripTimesKind::Scheduled | TripTimesKind::Updated => current.clone(),
        TripTimesKind::Canceled | TripTimesKind::DecayingDelay => scheduled.clone(),
    };
    let overlay = UpdatedTripTimes::new(base, update, start);

    if overlay.times_increasing() {
        let delegate = overlay.delegate();
        if overlay.span() == 0
            && overlay.is_wheelchair_accessible() == delegate.is_wheelchair_accessible()
        {
            debug!(trip = %update.trip_id, "update carries no deviation");
            return Ok(delegate.clone());
        }
        return Ok(Arc::new(overlay));
    }

    warn!(
        trip = %update.trip_id,
        start,
        "update makes times run backwards, falling back to a decaying delay"
    );
    debug!("rejected overlay:\n{}", dump_times(&overlay));

    let (seed_stop, seed_delay) = seed_delay(scheduled, &overlay, start, update.updates.len());
    let decaying = DecayingDelayTripTimes::new(
        scheduled.clone(),
        seed_stop,
        seed_delay,
        config.recovery_secs_per_minute(),
        update.wheelchair_accessible,
    );
    if decaying.times_increasing() {
        return Ok(Arc::new(decaying));
    }

    error!(
        trip = %update.trip_id,
        "decaying delay still runs backwards, schedule is inconsistent:\n{}",
        dump_times(&decaying)
    );
    Err(ReconcileError::NonIncreasing {
        trip: update.trip_id.clone(),
    })
}

/// The first overlaid stop with a real time, and its departure delay.
///
/// An early-running delay is capped so the seeded stop is not reached
/// before the scheduled departure from the previous stop.
fn seed_delay(
    scheduled: &ScheduledTripTimes,
    overlay: &UpdatedTripTimes,
    start: usize,
    span: usize,
) -> (usize, i32) {
    let found = (start..start + span).find_map(|stop| {
        let arrival = overlay.arrival_time(stop);
        let departure = overlay.departure_time(stop);
        if is_sentinel(arrival) || is_sentinel(departure) {
            return None;
        }
        Some((stop, departure - scheduled.departure_time(stop)))
    });
    let Some((stop, delay)) = found else {
        return (start, 0);
    };

    let floor = match stop.checked_sub(1) {
        Some(previous) => scheduled.departure_time(previous) - scheduled.arrival_time(stop),
        None => i32::MIN,
    };
    (stop, delay.max(floor.min(0)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CANCELED, ServiceDate};
    use crate::test_support::{
        eight_stop_schedule, eight_stop_stops, patch, service_date, test_trip, updated_trip,
    };
    use crate::update::{StopStatus, TripUpdate};

    fn current(sched: &Arc<ScheduledTripTimes>) -> SharedTripTimes {
        sched.clone()
    }

    fn apply(current: &SharedTripTimes, update: &TripUpdate) -> SharedTripTimes {
        reconcile(
            &eight_stop_stops(),
            &eight_stop_schedule(),
            current,
            update,
            &ReconcileConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn config_clamps_rate() {
        assert_eq!(ReconcileConfig::default().recovery_secs_per_minute(), 30);
        assert_eq!(ReconcileConfig::new(0).recovery_secs_per_minute(), 1);
        assert_eq!(ReconcileConfig::new(600).recovery_secs_per_minute(), 59);
    }

    #[test]
    fn removal_returns_schedule() {
        let sched = eight_stop_schedule();
        let update = TripUpdate::for_removed_trip(sched.trip().id.clone(), 0, service_date());
        let times = apply(&current(&sched), &update);
        assert_eq!(times.kind(), TripTimesKind::Scheduled);
    }

    #[test]
    fn cancellation_closes_every_stop() {
        let sched = eight_stop_schedule();
        let update = TripUpdate::for_canceled_trip(sched.trip().id.clone(), 0, service_date());
        let times = apply(&current(&sched), &update);
        assert!(times.is_canceled());
        assert_eq!(times.departure_time(0), CANCELED);
    }

    #[test]
    fn stop_cancellation_scenario() {
        let sched = eight_stop_schedule();
        let update = updated_trip(vec![
            patch(2, StopStatus::Canceled, None),
            patch(3, StopStatus::Canceled, None),
        ]);
        let times = apply(&current(&sched), &update);

        assert_eq!(times.kind(), TripTimesKind::Updated);
        assert_eq!(times.departure_time(1), 60);
        assert_eq!(times.arrival_time(2), CANCELED);
        assert_eq!(times.arrival_time(3), CANCELED);
        assert_eq!(times.arrival_time(4), 240);
        for stop in 0..8 {
            assert_eq!(times.can_alight(stop), stop != 2 && stop != 3);
        }
    }

    #[test]
    fn prediction_scenario() {
        let sched = eight_stop_schedule();
        let update = updated_trip(vec![patch(3, StopStatus::Prediction, Some(190))]);
        let times = apply(&current(&sched), &update);

        for stop in 0..3 {
            assert_eq!(times.departure_time(stop), sched.departure_time(stop));
        }
        assert_eq!(times.departure_time(3), 190);
        assert_eq!(times.arrival_time(4), 240);
    }

    #[test]
    fn passed_scenario() {
        let sched = eight_stop_schedule();
        let update = updated_trip(vec![patch(0, StopStatus::Passed, None)]);
        let times = apply(&current(&sched), &update);
        assert!(!times.can_board(0));
        assert!(!times.can_alight(0));
        assert!(times.can_board(1));
    }

    #[test]
    fn overlapping_updates_supersede_at_overlap_only() {
        let sched = eight_stop_schedule();
        let first = updated_trip(vec![
            patch(1, StopStatus::Prediction, Some(90)),
            patch(2, StopStatus::Prediction, Some(150)),
            patch(3, StopStatus::Prediction, Some(210)),
        ]);
        let after_first = apply(&current(&sched), &first);

        let second = updated_trip(vec![
            patch(3, StopStatus::Prediction, Some(230)),
            patch(4, StopStatus::Prediction, Some(270)),
        ]);
        let after_second = apply(&after_first, &second);

        assert_eq!(after_second.departure_time(1), 90);
        assert_eq!(after_second.departure_time(2), 150);
        assert_eq!(after_second.departure_time(3), 230);
        assert_eq!(after_second.departure_time(4), 270);
        assert_eq!(after_second.departure_time(5), 300);
    }

    #[test]
    fn planned_only_update_returns_current() {
        let sched = eight_stop_schedule();
        let update = updated_trip(vec![patch(4, StopStatus::Planned, None)]);
        let before = current(&sched);
        let times = apply(&before, &update);
        assert!(Arc::ptr_eq(&before, &times));
    }

    #[test]
    fn overlay_after_cancellation_is_rooted_on_schedule() {
        let sched = eight_stop_schedule();
        let canceled: SharedTripTimes = Arc::new(CanceledTripTimes::new(sched.clone()));
        let update = updated_trip(vec![patch(5, StopStatus::Prediction, Some(320))]);
        let times = apply(&canceled, &update);

        assert_eq!(times.kind(), TripTimesKind::Updated);
        assert_eq!(times.departure_time(0), 0);
        assert_eq!(times.departure_time(5), 320);
    }

    #[test]
    fn backwards_update_falls_back_to_decaying_delay() {
        let sched = eight_stop_schedule();
        // 150 s late at stop 2, then stop 3 claims an earlier time
        let update = updated_trip(vec![
            patch(2, StopStatus::Prediction, Some(270)),
            patch(3, StopStatus::Prediction, Some(200)),
        ]);
        let times = apply(&current(&sched), &update);

        assert_eq!(times.kind(), TripTimesKind::DecayingDelay);
        assert_eq!(times.departure_time(2), 270);
        assert_eq!(times.departure_delay(3), Some(120));
        assert_eq!(times.departure_delay(7), Some(0));
        assert!(times.times_increasing());
    }

    #[test]
    fn early_seed_is_capped_at_previous_departure() {
        let sched = eight_stop_schedule();
        // stop 3 ten minutes early would arrive before stop 2 departs
        let update = updated_trip(vec![
            patch(3, StopStatus::Prediction, Some(-420)),
            patch(4, StopStatus::Prediction, Some(-500)),
        ]);
        let times = apply(&current(&sched), &update);

        assert_eq!(times.kind(), TripTimesKind::DecayingDelay);
        assert_eq!(times.arrival_time(3), 120);
        assert!(times.times_increasing());
    }

    #[test]
    fn wheelchair_change_alone_is_kept() {
        let sched = eight_stop_schedule();
        let mut update = updated_trip(vec![patch(4, StopStatus::Planned, None)]);
        update.wheelchair_accessible = Some(true);
        let times = apply(&current(&sched), &update);
        assert_eq!(times.kind(), TripTimesKind::Updated);
        assert!(times.is_wheelchair_accessible());
    }

    #[test]
    fn unaligned_update_fails_to_match() {
        let sched = eight_stop_schedule();
        let mut update = updated_trip(vec![patch(3, StopStatus::Prediction, Some(190))]);
        update.updates[0].stop_id = crate::domain::FeedId::new("agency", "elsewhere");

        let err = reconcile(
            &eight_stop_stops(),
            &sched,
            &current(&sched),
            &update,
            &ReconcileConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ReconcileError::MatchFailed { .. }));
    }

    #[test]
    fn broken_schedule_is_reported() {
        use crate::schedule::StopTime;
        use crate::test_support::stop_id;

        // stop 2 is scheduled before stop 1
        let stop_times: Vec<StopTime> = [0, 100, 50, 200]
            .iter()
            .enumerate()
            .map(|(i, t)| StopTime::new(stop_id(i), i as u32, *t, *t))
            .collect();
        let trip = test_trip("broken");
        let sched = Arc::new(ScheduledTripTimes::new(trip.clone(), &stop_times).unwrap());
        let stops: Vec<StopId> = (0..4).map(stop_id).collect();
        let update = TripUpdate::for_updated_trip(
            trip.id.clone(),
            0,
            ServiceDate::from_ymd(2024, 3, 1).unwrap(),
            vec![{
                let mut u = patch(3, StopStatus::Prediction, Some(20));
                u.trip_id = trip.id.clone();
                u
            }],
        );

        let err = reconcile(
            &stops,
            &sched,
            &(sched.clone() as SharedTripTimes),
            &update,
            &ReconcileConfig::default(),
        )
        .unwrap_err();
        assert_eq!(err, ReconcileError::NonIncreasing { trip: trip.id.clone() });
        assert_eq!(
            err.to_string(),
            format!("times for trip {} decrease even after falling back to a decaying delay", trip.id)
        );
    }
}
