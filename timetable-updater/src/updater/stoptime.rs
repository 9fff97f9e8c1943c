//! The single writer that applies realtime batches to the timetables.

use std::sync::Arc;

use tracing::{debug, info, trace, warn};

use crate::domain::{FeedId, ServiceDate, TripId};
use crate::periodic::{PeriodicTask, TaskError};
use crate::schedule::{ScheduleGraph, StopTime, TransitIndex, Trip};
use crate::timetable::{SnapshotReader, TimetableSnapshot, TimetableSnapshotSource};
use crate::update::{FilterOptions, TripStatus, TripUpdate};

use super::{AddedTrips, ApplyError, MessageSource, UpdaterConfig, UpdaterError};

/// Outcome of one [`StoptimeUpdater::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Trip updates that changed something.
    pub applied: usize,
    /// Trip updates dropped with an error.
    pub failed: usize,
    /// Whether expired realtime data was purged.
    pub purged: bool,
}

/// Pulls trip updates from a source and applies them.
///
/// Owns the timetable buffer and is the only one to publish snapshots.
/// Readers load them through a [`SnapshotReader`] from [`snapshot_reader`]
/// and never see a batch half applied. Trips that realtime adds get a
/// synthesized pattern in the graph and index, tracked so they can be
/// removed again and expired once their service day is over.
///
/// [`snapshot_reader`]: StoptimeUpdater::snapshot_reader
pub struct StoptimeUpdater<S, I, G> {
    source: S,
    index: I,
    graph: G,
    snapshots: TimetableSnapshotSource,
    added: AddedTrips,
    config: UpdaterConfig,
    /// Latest service date whose realtime data has been purged.
    last_purge: Option<ServiceDate>,
    /// Applied trip updates since start, for progress logging.
    applied: u64,
}

impl<S, I, G> StoptimeUpdater<S, I, G>
where
    S: MessageSource,
    I: TransitIndex,
    G: ScheduleGraph,
{
    pub fn new(source: S, index: I, graph: G, config: UpdaterConfig) -> Self {
        let snapshots =
            TimetableSnapshotSource::new(config.max_snapshot_frequency, config.reconcile.clone());
        Self {
            source,
            index,
            graph,
            snapshots,
            added: AddedTrips::new(),
            config,
            last_purge: None,
            applied: 0,
        }
    }

    /// Handle readers use to load published snapshots.
    pub fn snapshot_reader(&self) -> SnapshotReader {
        self.snapshots.reader()
    }

    pub fn snapshots(&self) -> &TimetableSnapshotSource {
        &self.snapshots
    }

    /// Publish the buffer now if due, or unconditionally with `force`.
    pub fn publish(&mut self, force: bool) -> Arc<TimetableSnapshot> {
        self.snapshots.get_snapshot(force)
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    pub fn graph(&self) -> &G {
        &self.graph
    }

    pub fn added_trips(&self) -> &AddedTrips {
        &self.added
    }

    pub fn config(&self) -> &UpdaterConfig {
        &self.config
    }

    /// Apply the next batch from the source, with "today" taken from the
    /// configured time zone.
    pub fn run(&mut self) -> Result<RunSummary, UpdaterError> {
        let today = ServiceDate::today_in(self.config.timezone);
        self.run_at(today)
    }

    /// Apply the next batch from the source as of `today`.
    ///
    /// A failed trip update is logged and skipped; only a source failure
    /// ends the invocation early.
    pub fn run_at(&mut self, today: ServiceDate) -> Result<RunSummary, UpdaterError> {
        let mut summary = RunSummary::default();

        if let Some(batch) = self.source.next_batch()? {
            debug!(updates = batch.len(), "applying trip update batch");
            for update in batch {
                let trip = update.trip_id.clone();
                match self.apply(update) {
                    Ok(()) => {
                        summary.applied += 1;
                        self.applied += 1;
                        if self.config.log_frequency > 0
                            && self.applied % self.config.log_frequency == 0
                        {
                            info!(applied = self.applied, "applied trip updates");
                        }
                    }
                    Err(e) => {
                        summary.failed += 1;
                        warn!(%trip, error = %e, "dropping trip update");
                    }
                }
            }
        }

        if self.config.purge_expired_data {
            summary.purged = self.purge_expired_data(today);
        }

        // a throttled change stays in the buffer and goes out on a later run
        self.snapshots.get_snapshot(summary.purged);
        Ok(summary)
    }

    /// Apply a single trip update.
    pub fn apply(&mut self, update: TripUpdate) -> Result<(), ApplyError> {
        trace!(?update, "trip update");
        let added = self.added.contains(&update.trip_id);
        match (update.status, added) {
            (TripStatus::Added, false) => self.handle_added_trip(update),
            (TripStatus::Added, true) | (TripStatus::Modified, _) => {
                self.handle_modified_trip(update)
            }
            (TripStatus::Canceled | TripStatus::Removed, true) => {
                self.remove_added_trip(&update.trip_id)
            }
            (TripStatus::Canceled, false) => self.handle_canceled_trip(update),
            (TripStatus::Removed, false) => self.handle_removed_trip(update),
        }
    }

    fn handle_modified_trip(&mut self, mut update: TripUpdate) -> Result<(), ApplyError> {
        let dropped = update.filter(FilterOptions::default());
        if dropped > 0 {
            debug!(trip = %update.trip_id, dropped, "filtered trip update");
        }
        if update.updates.is_empty() {
            return Err(ApplyError::EmptyAfterFilter(update.trip_id));
        }
        if !update.is_coherent() {
            return Err(ApplyError::Incoherent(update.trip_id));
        }

        let pattern = self
            .index
            .pattern_for_trip(&update.trip_id)
            .ok_or_else(|| ApplyError::UnknownPattern(update.trip_id.clone()))?;
        self.snapshots.buffer_mut().update(&pattern, &update)?;
        Ok(())
    }

    fn handle_canceled_trip(&mut self, update: TripUpdate) -> Result<(), ApplyError> {
        let pattern = self
            .index
            .pattern_for_trip(&update.trip_id)
            .ok_or_else(|| ApplyError::UnknownPattern(update.trip_id.clone()))?;
        self.snapshots.buffer_mut().update(&pattern, &update)?;
        debug!(trip = %update.trip_id, date = %update.service_date, "trip canceled");
        Ok(())
    }

    /// Put a scheduled trip back to its schedule.
    fn handle_removed_trip(&mut self, update: TripUpdate) -> Result<(), ApplyError> {
        let pattern = self
            .index
            .pattern_for_trip(&update.trip_id)
            .ok_or_else(|| ApplyError::NotAdded(update.trip_id.clone()))?;
        self.snapshots.buffer_mut().update(&pattern, &update)?;
        debug!(trip = %update.trip_id, date = %update.service_date, "trip reverted to schedule");
        Ok(())
    }

    fn handle_added_trip(&mut self, mut update: TripUpdate) -> Result<(), ApplyError> {
        if self.index.pattern_for_trip(&update.trip_id).is_some() {
            debug!(trip = %update.trip_id, "added trip is already scheduled, updating it instead");
            return self.handle_modified_trip(update);
        }

        update.filter(FilterOptions::default());
        let trip_id = update.trip_id.clone();
        if update.updates.is_empty() {
            return Err(ApplyError::EmptyAfterFilter(trip_id));
        }

        let timezone = self
            .index
            .agency(trip_id.agency())
            .map(|agency| agency.timezone)
            .ok_or_else(|| ApplyError::UnknownAgency {
                trip: trip_id.clone(),
                agency: trip_id.agency().to_string(),
            })?;

        let stops = self.index.all_stops();
        let stop_times = update
            .updates
            .iter()
            .enumerate()
            .map(|(sequence, patch)| {
                if !stops.contains_key(&patch.stop_id) {
                    return Err(ApplyError::UnknownStop {
                        trip: trip_id.clone(),
                        stop: patch.stop_id.clone(),
                    });
                }
                let (arrival, departure) = match (patch.arrival, patch.departure) {
                    (Some(arrival), Some(departure)) => (arrival, departure),
                    (Some(t), None) | (None, Some(t)) => (t, t),
                    (None, None) => {
                        return Err(ApplyError::MissingTimes {
                            trip: trip_id.clone(),
                            stop: patch.stop_id.clone(),
                        });
                    }
                };
                Ok(StopTime::new(
                    patch.stop_id.clone(),
                    sequence as u32,
                    arrival,
                    departure,
                ))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let service_id = update.service_id.clone().unwrap_or_else(|| {
            FeedId::new(
                trip_id.agency(),
                format!("RT-SERVICE-{}", update.service_date),
            )
        });
        let calendar = self.graph.calendar_mut();
        if calendar.add_service(service_id.clone(), timezone, [update.service_date]) {
            debug!(service = %service_id, "registered realtime service");
        }

        let trip = Arc::new(Trip {
            id: trip_id.clone(),
            route_id: update.route_id.clone().unwrap_or_else(|| trip_id.clone()),
            service_id,
            wheelchair_accessible: update.wheelchair_accessible.unwrap_or(false),
        });
        let synthesized = self.graph.add_pattern_for_trip(trip, &stop_times)?;
        let pattern = synthesized.pattern.clone();
        self.index.add_synthesized_pattern(&synthesized);
        self.added
            .insert(trip_id.clone(), update.service_date, synthesized);
        self.snapshots.buffer_mut().sync_pattern(&pattern)?;
        pattern.set_traversable(true);

        debug!(
            trip = %trip_id,
            pattern = %pattern.id(),
            stops = stop_times.len(),
            "added trip"
        );
        Ok(())
    }

    /// Take an added trip out again.
    ///
    /// The last trip of a synthesized pattern takes the pattern, its edges
    /// and vertices with it. Otherwise the trip leaves the pattern it
    /// shares, in the graph, the index and the buffer alike, so later
    /// updates for it no longer find a pattern.
    fn remove_added_trip(&mut self, trip: &TripId) -> Result<(), ApplyError> {
        let removed = self
            .added
            .remove(trip)
            .ok_or_else(|| ApplyError::NotAdded(trip.clone()))?;
        let pattern = &removed.synthesized.pattern;

        if removed.last_user {
            pattern.set_traversable(false);
            self.graph.detach_and_remove(&removed.synthesized)?;
            self.index.remove_synthesized_pattern(&removed.synthesized);
            self.snapshots.buffer_mut().remove_pattern(pattern.id());
            debug!(%trip, pattern = %pattern.id(), "removed added trip and its pattern");
        } else {
            let shrunk = self.graph.remove_trip_from_pattern(&removed.synthesized, trip)?;
            self.index.remove_synthesized_pattern(&removed.synthesized);
            self.index.add_synthesized_pattern(&shrunk);
            self.snapshots.buffer_mut().sync_pattern(&shrunk.pattern)?;
            debug!(
                %trip,
                pattern = %pattern.id(),
                remaining = shrunk.pattern.trips().count(),
                "removed added trip from shared pattern"
            );
            self.added.update_pattern(shrunk);
        }
        Ok(())
    }

    /// Drop realtime data for the service day two days before `today`.
    ///
    /// Added trips on or before that day are removed and the buffer loses
    /// its timetables for them. Returns true if anything went; a day
    /// already purged is skipped.
    pub fn purge_expired_data(&mut self, today: ServiceDate) -> bool {
        let boundary = today.previous().previous();
        if self.last_purge.is_some_and(|last| last >= boundary) {
            return false;
        }

        let mut removed = false;
        for trip in self.added.trips_through(boundary) {
            match self.remove_added_trip(&trip) {
                Ok(()) => removed = true,
                Err(e) => warn!(%trip, error = %e, "failed to expire added trip"),
            }
        }
        removed |= self.snapshots.buffer_mut().purge_expired_data(boundary.next());
        self.last_purge = Some(boundary);

        if removed {
            info!(%boundary, "purged expired realtime data");
        }
        removed
    }
}

impl<S, I, G> PeriodicTask for StoptimeUpdater<S, I, G>
where
    S: MessageSource + 'static,
    I: TransitIndex + 'static,
    G: ScheduleGraph + 'static,
{
    fn name(&self) -> &str {
        "stoptime-updater"
    }

    fn run_once(&mut self) -> Result<(), TaskError> {
        let summary = self.run()?;
        if summary.applied + summary.failed > 0 {
            debug!(
                applied = summary.applied,
                failed = summary.failed,
                "stoptime updater run finished"
            );
        }
        Ok(())
    }
}
