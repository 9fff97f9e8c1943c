//! The writer's working set of realtime timetables.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::domain::{ServiceDate, TripId};
use crate::schedule::{PatternId, ScheduleError, TripPattern};
use crate::trip_times::{ReconcileConfig, ReconcileError};
use crate::update::TripUpdate;

use super::{Timetable, TimetableSnapshot};

/// Realtime timetables are kept per pattern and service date.
pub type TimetableKey = (PatternId, ServiceDate);

/// Mutable timetables owned by the single writer.
///
/// Entries are shared with published snapshots. The first write to an
/// entry after a commit copies it, so snapshots never see later changes.
#[derive(Debug, Default)]
pub struct TimetableResolver {
    timetables: HashMap<TimetableKey, Arc<Timetable>>,
    /// Entries written since the last commit.
    dirty: HashSet<TimetableKey>,
    /// Entries were removed since the last commit.
    removed: bool,
    generation: u64,
    config: ReconcileConfig,
}

impl TimetableResolver {
    pub fn new(config: ReconcileConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Apply `update` to its trip in `pattern`.
    ///
    /// Nothing changes when reconciliation fails.
    pub fn update(
        &mut self,
        pattern: &TripPattern,
        update: &TripUpdate,
    ) -> Result<(), ReconcileError> {
        let key = (pattern.id(), update.service_date);
        let (index, times) = match self.timetables.get(&key) {
            Some(timetable) => timetable.reconcile_trip(update, &self.config)?,
            None => pattern
                .scheduled_timetable()
                .reconcile_trip(update, &self.config)?,
        };

        let entry = self
            .timetables
            .entry(key)
            .or_insert_with(|| Arc::new(pattern.scheduled_timetable().for_date(update.service_date)));
        Arc::make_mut(entry).set_trip_times(index, times);
        self.dirty.insert(key);
        trace!(pattern = %key.0, date = %key.1, trip = %update.trip_id, "buffer updated");
        Ok(())
    }

    /// The timetable `pattern` has on `service_date` as of the last write.
    pub fn resolve<'a>(&'a self, pattern: &'a TripPattern, service_date: ServiceDate) -> &'a Timetable {
        self.timetables
            .get(&(pattern.id(), service_date))
            .unwrap_or(pattern.scheduled_timetable())
    }

    /// Returns true if a commit would publish anything new.
    pub fn is_dirty(&self) -> bool {
        self.removed || !self.dirty.is_empty()
    }

    /// Number of realtime timetables held.
    pub fn len(&self) -> usize {
        self.timetables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timetables.is_empty()
    }

    /// Index every changed timetable and hand out an immutable view.
    ///
    /// Unchanged timetables are shared with the previous snapshot.
    pub fn commit(&mut self) -> TimetableSnapshot {
        let changed = self.dirty.len();
        for key in self.dirty.drain() {
            if let Some(timetable) = self.timetables.get_mut(&key) {
                Arc::make_mut(timetable).finish();
            }
        }
        self.removed = false;
        self.generation += 1;
        debug!(
            generation = self.generation,
            changed,
            total = self.timetables.len(),
            "committed timetable buffer"
        );
        TimetableSnapshot::new(self.timetables.clone(), self.generation)
    }

    /// Drop timetables for service dates before `before`.
    ///
    /// Returns true if anything was dropped.
    pub fn purge_expired_data(&mut self, before: ServiceDate) -> bool {
        let count = self.timetables.len();
        self.timetables.retain(|(_, date), _| *date >= before);
        self.dirty.retain(|(_, date)| *date >= before);
        let purged = count - self.timetables.len();
        if purged > 0 {
            debug!(purged, %before, "purged expired timetables");
            self.removed = true;
        }
        purged > 0
    }

    /// Drop every timetable of `pattern`. Returns true if any existed.
    pub fn remove_pattern(&mut self, pattern: PatternId) -> bool {
        let count = self.timetables.len();
        self.timetables.retain(|(id, _), _| *id != pattern);
        self.dirty.retain(|(id, _)| *id != pattern);
        let removed = count != self.timetables.len();
        self.removed |= removed;
        removed
    }

    /// Bring the realtime timetables of `pattern` in line with its schedule.
    ///
    /// Trips the pattern gained are added, trips it lost are dropped and
    /// trips whose scheduled times were replaced are reset to them.
    /// Returns true if any timetable changed.
    pub fn sync_pattern(&mut self, pattern: &TripPattern) -> Result<bool, ScheduleError> {
        let mut changed = false;
        for (key, timetable) in &mut self.timetables {
            if key.0 != pattern.id() {
                continue;
            }
            let gone: Vec<TripId> = timetable
                .scheduled_trips()
                .map(|scheduled| &scheduled.trip().id)
                .filter(|trip| pattern.scheduled_trip(trip).is_none())
                .cloned()
                .collect();
            for trip in &gone {
                Arc::make_mut(timetable).remove_trip(trip);
                self.dirty.insert(*key);
                changed = true;
            }
            for scheduled in pattern.scheduled_timetable().scheduled_trips() {
                let current = timetable
                    .trip_index(&scheduled.trip().id)
                    .and_then(|index| timetable.scheduled_at(index));
                if !current.is_some_and(|current| Arc::ptr_eq(current, scheduled)) {
                    Arc::make_mut(timetable).insert_trip(scheduled.clone())?;
                    self.dirty.insert(*key);
                    changed = true;
                }
            }
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        eight_stop_pattern, eight_stop_schedule, patch, service_date, updated_trip,
    };
    use crate::trip_times::{TripTimes, TripTimesKind};
    use crate::update::StopStatus;

    fn delayed(stop: usize, time: i32) -> TripUpdate {
        updated_trip(vec![patch(stop, StopStatus::Prediction, Some(time))])
    }

    #[test]
    fn update_marks_dirty_and_commit_cleans() {
        let pattern = eight_stop_pattern();
        let mut buffer = TimetableResolver::default();
        assert!(!buffer.is_dirty());

        buffer.update(&pattern, &delayed(3, 190)).unwrap();
        assert!(buffer.is_dirty());
        assert_eq!(buffer.len(), 1);

        let snapshot = buffer.commit();
        assert!(!buffer.is_dirty());
        assert_eq!(snapshot.generation(), 1);
        let timetable = snapshot.get(pattern.id(), service_date()).unwrap();
        assert!(timetable.is_finished());
    }

    #[test]
    fn failed_update_changes_nothing() {
        let pattern = eight_stop_pattern();
        let mut buffer = TimetableResolver::default();
        let mut update = delayed(3, 190);
        update.updates[0].stop_id = crate::domain::FeedId::new("agency", "nowhere");

        let err = buffer.update(&pattern, &update).unwrap_err();
        assert!(matches!(err, ReconcileError::MatchFailed { .. }));
        assert!(!buffer.is_dirty());
        assert!(buffer.is_empty());
    }

    #[test]
    fn committed_snapshot_is_isolated_from_later_writes() {
        let pattern = eight_stop_pattern();
        let mut buffer = TimetableResolver::default();
        buffer.update(&pattern, &delayed(3, 190)).unwrap();
        let first = buffer.commit();

        buffer.update(&pattern, &delayed(3, 240)).unwrap();
        let trip = &eight_stop_schedule().trip().id.clone();

        let old = first.get(pattern.id(), service_date()).unwrap();
        assert_eq!(old.get(trip).unwrap().departure_time(3), 190);
        assert_eq!(
            buffer.resolve(&pattern, service_date()).get(trip).unwrap().departure_time(3),
            240
        );

        let second = buffer.commit();
        let new = second.get(pattern.id(), service_date()).unwrap();
        assert_eq!(new.get(trip).unwrap().departure_time(3), 240);
    }

    #[test]
    fn untouched_timetables_are_shared_between_snapshots() {
        let pattern = eight_stop_pattern();
        let mut buffer = TimetableResolver::default();
        let today = service_date();
        let tomorrow = today.next();

        buffer.update(&pattern, &delayed(3, 190)).unwrap();
        let mut other_day = delayed(3, 200);
        other_day.service_date = tomorrow;
        other_day.updates[0].service_date = tomorrow;
        buffer.update(&pattern, &other_day).unwrap();
        let first = buffer.commit();

        buffer.update(&pattern, &delayed(4, 250)).unwrap();
        let second = buffer.commit();

        assert!(Arc::ptr_eq(
            first.get(pattern.id(), tomorrow).unwrap(),
            second.get(pattern.id(), tomorrow).unwrap()
        ));
        assert!(!Arc::ptr_eq(
            first.get(pattern.id(), today).unwrap(),
            second.get(pattern.id(), today).unwrap()
        ));
    }

    #[test]
    fn resolve_falls_back_to_schedule() {
        let pattern = eight_stop_pattern();
        let buffer = TimetableResolver::default();
        let timetable = buffer.resolve(&pattern, service_date());
        assert_eq!(timetable.service_date(), None);
        assert_eq!(
            timetable.trip_times_at(0).unwrap().kind(),
            TripTimesKind::Scheduled
        );
    }

    #[test]
    fn purge_drops_older_dates_only() {
        let pattern = eight_stop_pattern();
        let mut buffer = TimetableResolver::default();
        let today = service_date();
        let yesterday = today.previous();

        let mut old = delayed(3, 190);
        old.service_date = yesterday;
        old.updates[0].service_date = yesterday;
        buffer.update(&pattern, &old).unwrap();
        buffer.update(&pattern, &delayed(3, 190)).unwrap();
        buffer.commit();

        assert!(!buffer.purge_expired_data(yesterday));
        assert!(!buffer.is_dirty());
        assert!(buffer.purge_expired_data(today));
        assert!(buffer.is_dirty());
        assert_eq!(buffer.len(), 1);
        assert!(!buffer.purge_expired_data(today));
    }

    #[test]
    fn remove_pattern_drops_all_dates() {
        let pattern = eight_stop_pattern();
        let mut buffer = TimetableResolver::default();
        buffer.update(&pattern, &delayed(3, 190)).unwrap();
        buffer.commit();

        assert!(buffer.remove_pattern(pattern.id()));
        assert!(buffer.is_dirty());
        assert!(buffer.is_empty());
        assert!(!buffer.remove_pattern(pattern.id()));
    }

    #[test]
    fn sync_pattern_picks_up_new_trips() {
        use crate::schedule::StopTime;
        use crate::test_support::{stop_id, test_trip};
        use crate::trip_times::ScheduledTripTimes;

        let pattern = eight_stop_pattern();
        let mut buffer = TimetableResolver::default();
        buffer.update(&pattern, &delayed(3, 190)).unwrap();
        buffer.commit();
        assert!(!buffer.sync_pattern(&pattern).unwrap());

        let stop_times: Vec<StopTime> = (0..8)
            .map(|i| StopTime::new(stop_id(i), i as u32, 600 + 60 * i as i32, 600 + 60 * i as i32))
            .collect();
        let second = Arc::new(ScheduledTripTimes::new(test_trip("T2"), &stop_times).unwrap());
        let grown = pattern.with_trip(second).unwrap();

        assert!(buffer.sync_pattern(&grown).unwrap());
        assert!(buffer.is_dirty());
        let timetable = buffer.resolve(&grown, service_date());
        assert_eq!(timetable.len(), 2);
        // the realtime change to the first trip survives
        let trip = eight_stop_schedule().trip().id.clone();
        assert_eq!(timetable.get(&trip).unwrap().departure_time(3), 190);
        assert!(!buffer.sync_pattern(&grown).unwrap());
    }

    #[test]
    fn sync_pattern_drops_trips_the_pattern_lost() {
        use crate::schedule::StopTime;
        use crate::test_support::{stop_id, test_trip};
        use crate::trip_times::ScheduledTripTimes;

        let stop_times: Vec<StopTime> = (0..8)
            .map(|i| StopTime::new(stop_id(i), i as u32, 600 + 60 * i as i32, 600 + 60 * i as i32))
            .collect();
        let second = Arc::new(ScheduledTripTimes::new(test_trip("T2"), &stop_times).unwrap());
        let grown = eight_stop_pattern().with_trip(second).unwrap();

        let mut buffer = TimetableResolver::default();
        buffer.update(&grown, &delayed(3, 190)).unwrap();
        buffer.commit();

        let trip = eight_stop_schedule().trip().id.clone();
        let shrunk = grown.without_trip(&trip);
        assert!(buffer.sync_pattern(&shrunk).unwrap());
        assert!(buffer.is_dirty());
        let timetable = buffer.resolve(&shrunk, service_date());
        assert_eq!(timetable.len(), 1);
        assert!(timetable.get(&trip).is_none());
        assert!(timetable.get(&test_trip("T2").id).is_some());
    }
}
