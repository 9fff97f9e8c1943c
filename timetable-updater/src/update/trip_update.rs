//! A batch of patches for one trip.

use serde::{Deserialize, Serialize};

use crate::domain::{RouteId, ServiceDate, ServiceId, StopId, TripId};

use super::{StopStatus, Update};

/// What happened to the trip as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TripStatus {
    /// Not in the static schedule; runs only because the feed says so.
    Added,
    /// Will not run.
    Canceled,
    /// Runs with changed stop times.
    Modified,
    /// Withdrawn; any realtime state for it should go.
    Removed,
}

/// Which cleanups [`TripUpdate::filter`] applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterOptions {
    /// Drop patches addressed to another trip or service date.
    pub drop_foreign: bool,
    /// Keep only the last of consecutive patches for the same stop.
    pub collapse_duplicates: bool,
    /// Drop trailing patches that carry no information.
    pub drop_trailing_unknown: bool,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            drop_foreign: true,
            collapse_duplicates: true,
            drop_trailing_unknown: true,
        }
    }
}

/// Every patch the feed sent for one trip on one service date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripUpdate {
    pub trip_id: TripId,
    pub service_date: ServiceDate,
    pub status: TripStatus,
    /// Stop patches in stop order.
    #[serde(default)]
    pub updates: Vec<Update>,
    /// Overrides the schedule's accessibility flag when present.
    #[serde(default)]
    pub wheelchair_accessible: Option<bool>,
    /// Unix seconds at which the feed produced the message.
    #[serde(default)]
    pub timestamp: i64,
    /// Route of an added trip.
    #[serde(default)]
    pub route_id: Option<RouteId>,
    /// Calendar entry of an added trip; one is made up when absent.
    #[serde(default)]
    pub service_id: Option<ServiceId>,
}

impl TripUpdate {
    fn with_status(
        trip_id: TripId,
        timestamp: i64,
        service_date: ServiceDate,
        status: TripStatus,
        updates: Vec<Update>,
    ) -> Self {
        Self {
            trip_id,
            service_date,
            status,
            updates,
            wheelchair_accessible: None,
            timestamp,
            route_id: None,
            service_id: None,
        }
    }

    /// New stop times for a scheduled trip.
    pub fn for_updated_trip(
        trip_id: TripId,
        timestamp: i64,
        service_date: ServiceDate,
        updates: Vec<Update>,
    ) -> Self {
        Self::with_status(trip_id, timestamp, service_date, TripStatus::Modified, updates)
    }

    /// The trip will not run.
    pub fn for_canceled_trip(trip_id: TripId, timestamp: i64, service_date: ServiceDate) -> Self {
        Self::with_status(
            trip_id,
            timestamp,
            service_date,
            TripStatus::Canceled,
            Vec::new(),
        )
    }

    /// Withdraw the trip and anything realtime created for it.
    pub fn for_removed_trip(trip_id: TripId, timestamp: i64, service_date: ServiceDate) -> Self {
        Self::with_status(
            trip_id,
            timestamp,
            service_date,
            TripStatus::Removed,
            Vec::new(),
        )
    }

    /// A trip absent from the static schedule, described stop by stop.
    pub fn for_added_trip(
        trip_id: TripId,
        route_id: RouteId,
        timestamp: i64,
        service_date: ServiceDate,
        updates: Vec<Update>,
    ) -> Self {
        let mut update =
            Self::with_status(trip_id, timestamp, service_date, TripStatus::Added, updates);
        update.route_id = Some(route_id);
        update
    }

    /// Returns true if the trip is being withdrawn.
    pub fn is_removal(&self) -> bool {
        self.status == TripStatus::Removed
    }

    /// Returns true if the whole trip is canceled.
    pub fn is_cancellation(&self) -> bool {
        self.status == TripStatus::Canceled
    }

    /// Clean up the patch list. Returns how many patches were dropped.
    pub fn filter(&mut self, options: FilterOptions) -> usize {
        let before = self.updates.len();

        if options.drop_foreign {
            let (trip_id, service_date) = (&self.trip_id, self.service_date);
            self.updates
                .retain(|u| u.trip_id == *trip_id && u.service_date == service_date);
        }

        if options.collapse_duplicates {
            // dedup_by keeps the earlier element, so move the newer one into it
            self.updates.dedup_by(|newer, kept| {
                if newer.stop_seq == kept.stop_seq {
                    std::mem::swap(newer, kept);
                    true
                } else {
                    false
                }
            });
        }

        if options.drop_trailing_unknown {
            while self
                .updates
                .last()
                .is_some_and(|u| u.status == StopStatus::Unknown)
            {
                self.updates.pop();
            }
        }

        before - self.updates.len()
    }

    /// Returns true if the patches describe one contiguous run of stops.
    ///
    /// Every patch must belong to this trip and service date, and stop
    /// positions must go up by exactly one from each patch to the next.
    pub fn is_coherent(&self) -> bool {
        let own = self
            .updates
            .iter()
            .all(|u| u.trip_id == self.trip_id && u.service_date == self.service_date);
        own && self
            .updates
            .windows(2)
            .all(|pair| pair[0].stop_seq + 1 == pair[1].stop_seq)
    }

    /// Position in `stops` where the first patch applies.
    ///
    /// The patches' stop ids must match `stops` one for one from there.
    /// The first patch's `stop_seq` is tried first; otherwise the match
    /// must be unique, so loops visiting a stop twice need the hint.
    pub fn find_update_stop_index(&self, stops: &[StopId]) -> Option<usize> {
        let first = self.updates.first()?;
        let len = self.updates.len();
        let last_start = stops.len().checked_sub(len)?;

        let matches_at = |start: usize| {
            self.updates
                .iter()
                .zip(&stops[start..start + len])
                .all(|(u, stop)| u.stop_id == *stop)
        };

        if first.stop_seq <= last_start && matches_at(first.stop_seq) {
            return Some(first.stop_seq);
        }

        let mut candidates = (0..=last_start).filter(|start| matches_at(*start));
        let found = candidates.next()?;
        candidates.next().is_none().then_some(found)
    }
}
