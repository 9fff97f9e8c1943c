//! Immutable timetable views for routing threads.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use tracing::{debug, trace};

use crate::domain::ServiceDate;
use crate::schedule::{PatternId, TripPattern};
use crate::trip_times::ReconcileConfig;

use super::{Timetable, TimetableKey, TimetableResolver};

/// A point-in-time set of realtime timetables.
///
/// Never changes once built. Patterns without a realtime timetable for a
/// date run to schedule.
#[derive(Debug, Clone, Default)]
pub struct TimetableSnapshot {
    timetables: HashMap<TimetableKey, Arc<Timetable>>,
    generation: u64,
}

impl TimetableSnapshot {
    pub(super) fn new(timetables: HashMap<TimetableKey, Arc<Timetable>>, generation: u64) -> Self {
        Self {
            timetables,
            generation,
        }
    }

    /// The timetable routing should use for `pattern` on `service_date`.
    pub fn resolve<'a>(&'a self, pattern: &'a TripPattern, service_date: ServiceDate) -> &'a Timetable {
        self.timetables
            .get(&(pattern.id(), service_date))
            .unwrap_or(pattern.scheduled_timetable())
    }

    /// The realtime timetable for `pattern` on `service_date`, if any.
    pub fn get(&self, pattern: PatternId, service_date: ServiceDate) -> Option<&Arc<Timetable>> {
        self.timetables.get(&(pattern, service_date))
    }

    /// Increases with every commit; zero for the empty startup snapshot.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of realtime timetables.
    pub fn len(&self) -> usize {
        self.timetables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timetables.is_empty()
    }

    /// Keys of every realtime timetable.
    pub fn keys(&self) -> impl Iterator<Item = &TimetableKey> {
        self.timetables.keys()
    }
}

/// The writer's side of publication: owns the buffer and decides when a
/// new snapshot is cut.
///
/// A new snapshot is cut at most once per `min_interval` unless forced,
/// and only if the buffer changed. Readers hold a [`SnapshotReader`] and
/// only ever load the published snapshot, so neither side waits on the
/// other.
#[derive(Debug)]
pub struct TimetableSnapshotSource {
    buffer: TimetableResolver,
    published: Arc<ArcSwap<TimetableSnapshot>>,
    /// When the last snapshot was cut.
    last_commit: Option<Instant>,
    min_interval: Duration,
}

impl TimetableSnapshotSource {
    pub fn new(min_interval: Duration, config: ReconcileConfig) -> Self {
        Self {
            buffer: TimetableResolver::new(config),
            published: Arc::new(ArcSwap::from_pointee(TimetableSnapshot::default())),
            last_commit: None,
            min_interval,
        }
    }

    /// Minimum time between two unforced commits.
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn buffer(&self) -> &TimetableResolver {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut TimetableResolver {
        &mut self.buffer
    }

    /// A handle readers use to load the published snapshot.
    pub fn reader(&self) -> SnapshotReader {
        SnapshotReader {
            published: self.published.clone(),
        }
    }

    /// The last published snapshot, without considering a new one.
    pub fn latest(&self) -> Arc<TimetableSnapshot> {
        self.published.load_full()
    }

    /// A snapshot reflecting the buffer, subject to the throttle.
    ///
    /// With `force` the buffer is always committed. Otherwise a clean
    /// buffer, or one committed less than `min_interval` ago, leaves the
    /// published snapshot in place; its changes go out on a later call.
    pub fn get_snapshot(&mut self, force: bool) -> Arc<TimetableSnapshot> {
        if !force {
            let due = self
                .last_commit
                .is_none_or(|at| at.elapsed() >= self.min_interval);
            if !due {
                trace!("snapshot frequency exceeded, reusing snapshot");
                return self.latest();
            }
            if !self.buffer.is_dirty() {
                debug!("buffer unchanged, keeping snapshot");
                return self.latest();
            }
        }

        let snapshot = Arc::new(self.buffer.commit());
        self.published.store(snapshot.clone());
        self.last_commit = Some(Instant::now());
        snapshot
    }
}

/// Read-only access to published snapshots, shared by routing threads.
///
/// Loading never locks and never waits for the writer.
#[derive(Debug, Clone)]
pub struct SnapshotReader {
    published: Arc<ArcSwap<TimetableSnapshot>>,
}

impl SnapshotReader {
    /// The snapshot published most recently.
    pub fn get_snapshot(&self) -> Arc<TimetableSnapshot> {
        self.published.load_full()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{eight_stop_pattern, eight_stop_schedule, patch, service_date, updated_trip};
    use crate::trip_times::TripTimes;
    use crate::update::StopStatus;
    use std::sync::Barrier;
    use std::thread;

    fn source(min_interval: Duration) -> TimetableSnapshotSource {
        TimetableSnapshotSource::new(min_interval, ReconcileConfig::default())
    }

    fn delay_stop_three(source: &mut TimetableSnapshotSource, pattern: &TripPattern, time: i32) {
        let update = updated_trip(vec![patch(3, StopStatus::Prediction, Some(time))]);
        source.buffer_mut().update(pattern, &update).unwrap();
    }

    fn stop_three(snapshot: &TimetableSnapshot, pattern: &TripPattern) -> i32 {
        let trip = eight_stop_schedule().trip().id.clone();
        snapshot
            .resolve(pattern, service_date())
            .get(&trip)
            .unwrap()
            .departure_time(3)
    }

    #[test]
    fn starts_with_empty_snapshot() {
        let source = source(Duration::from_secs(1));
        let snapshot = source.reader().get_snapshot();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.generation(), 0);
        assert!(Arc::ptr_eq(&snapshot, &source.latest()));
    }

    #[test]
    fn throttle_reuses_snapshot_within_interval() {
        let pattern = eight_stop_pattern();
        let mut source = source(Duration::from_secs(3600));

        delay_stop_three(&mut source, &pattern, 190);
        let first = source.get_snapshot(false);
        assert_eq!(stop_three(&first, &pattern), 190);

        delay_stop_three(&mut source, &pattern, 200);
        let second = source.get_snapshot(false);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(source.buffer().is_dirty());

        let forced = source.get_snapshot(true);
        assert!(!Arc::ptr_eq(&first, &forced));
        assert_eq!(stop_three(&forced, &pattern), 200);
    }

    #[test]
    fn throttled_changes_go_out_once_due() {
        let pattern = eight_stop_pattern();
        let mut source = source(Duration::from_millis(20));

        delay_stop_three(&mut source, &pattern, 190);
        let first = source.get_snapshot(false);
        delay_stop_three(&mut source, &pattern, 200);
        assert!(Arc::ptr_eq(&first, &source.get_snapshot(false)));

        thread::sleep(Duration::from_millis(30));
        let later = source.get_snapshot(false);
        assert_eq!(later.generation(), first.generation() + 1);
        assert_eq!(stop_three(&later, &pattern), 200);
    }

    #[test]
    fn unchanged_buffer_keeps_snapshot() {
        let pattern = eight_stop_pattern();
        let mut source = source(Duration::ZERO);

        delay_stop_three(&mut source, &pattern, 190);
        let first = source.get_snapshot(false);
        let second = source.get_snapshot(false);
        assert!(Arc::ptr_eq(&first, &second));

        delay_stop_three(&mut source, &pattern, 200);
        let third = source.get_snapshot(false);
        assert_eq!(third.generation(), first.generation() + 1);
    }

    #[test]
    fn forced_commit_publishes_even_when_clean() {
        let mut source = source(Duration::from_secs(3600));
        let first = source.get_snapshot(true);
        let second = source.get_snapshot(true);
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.generation(), 2);
    }

    #[test]
    fn readers_keep_their_snapshot_while_writer_moves_on() {
        let pattern = Arc::new(eight_stop_pattern());
        let mut source = source(Duration::ZERO);
        delay_stop_three(&mut source, &pattern, 190);
        source.get_snapshot(true);

        let readers = 4;
        let held = Arc::new(Barrier::new(readers + 1));
        let written = Arc::new(Barrier::new(readers + 1));

        let handles: Vec<_> = (0..readers)
            .map(|_| {
                let (reader, pattern) = (source.reader(), pattern.clone());
                let (held, written) = (held.clone(), written.clone());
                thread::spawn(move || {
                    let snapshot = reader.get_snapshot();
                    held.wait();
                    written.wait();
                    let before = stop_three(&snapshot, &pattern);
                    let after = stop_three(&reader.get_snapshot(), &pattern);
                    (before, after)
                })
            })
            .collect();

        held.wait();
        // the writer changes and commits while every reader holds a snapshot
        delay_stop_three(&mut source, &pattern, 230);
        source.get_snapshot(true);
        written.wait();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), (190, 230));
        }
    }
}
