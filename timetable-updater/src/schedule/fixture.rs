//! Loads a static schedule from a JSON file.
//!
//! Meant for development and tests, where a full schedule build is
//! overkill. Trips with the same route and stop sequence share a pattern.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use tracing::info;

use crate::domain::{RouteId, ServiceDate, ServiceId, StopId};
use crate::trip_times::ScheduledTripTimes;

use super::{
    Agency, CalendarService, GraphError, InMemoryGraph, InMemoryTransitIndex, PatternId,
    ScheduleError, Stop, StopTime, TransitIndex, Trip, TripPattern,
};

/// Errors loading a schedule fixture.
#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    /// File could not be read
    #[error("failed to read schedule fixture: {0}")]
    Io(#[from] std::io::Error),

    /// File is not a valid fixture
    #[error("failed to parse schedule fixture: {0}")]
    Json(#[from] serde_json::Error),

    /// A service belongs to an agency the fixture does not define
    #[error("service {0} belongs to an unknown agency")]
    UnknownAgency(ServiceId),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

#[derive(Debug, Clone, Deserialize)]
struct ServiceRecord {
    id: ServiceId,
    dates: Vec<ServiceDate>,
}

#[derive(Debug, Clone, Deserialize)]
struct TripRecord {
    #[serde(flatten)]
    trip: Trip,
    stop_times: Vec<StopTime>,
}

/// A whole static schedule in one JSON document.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleFixture {
    agencies: Vec<Agency>,
    stops: Vec<Stop>,
    #[serde(default)]
    services: Vec<ServiceRecord>,
    trips: Vec<TripRecord>,
}

impl ScheduleFixture {
    pub fn from_json(json: &str) -> Result<Self, FixtureError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, FixtureError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Build the index and graph the updater runs against.
    pub fn build(self) -> Result<(InMemoryTransitIndex, InMemoryGraph), FixtureError> {
        let mut index = InMemoryTransitIndex::new();
        let mut calendar = CalendarService::new();

        for service in self.services {
            let timezone = self
                .agencies
                .iter()
                .find(|agency| agency.id == service.id.agency())
                .map(|agency| agency.timezone)
                .ok_or_else(|| FixtureError::UnknownAgency(service.id.clone()))?;
            calendar.add_service(service.id, timezone, service.dates);
        }
        for agency in self.agencies {
            index.add_agency(agency);
        }
        for stop in self.stops {
            index.add_stop(stop);
        }

        let mut groups: Vec<((RouteId, Vec<StopId>), Vec<Arc<ScheduledTripTimes>>)> = Vec::new();
        let mut group_of: HashMap<(RouteId, Vec<StopId>), usize> = HashMap::new();
        for TripRecord {
            trip,
            mut stop_times,
        } in self.trips
        {
            stop_times.sort_by_key(|st| st.stop_sequence);
            if let Some(st) = stop_times
                .iter()
                .find(|st| !index.all_stops().contains_key(&st.stop_id))
            {
                return Err(ScheduleError::UnknownStop(st.stop_id.clone()).into());
            }

            let stops: Vec<StopId> = stop_times.iter().map(|st| st.stop_id.clone()).collect();
            let key = (trip.route_id.clone(), stops);
            let times = Arc::new(ScheduledTripTimes::new(Arc::new(trip), &stop_times)?);
            let slot = *group_of.entry(key.clone()).or_insert_with(|| {
                groups.push((key, Vec::new()));
                groups.len() - 1
            });
            groups[slot].1.push(times);
        }

        let mut graph = InMemoryGraph::new(PatternId(groups.len() as u32), calendar);
        for (i, ((route_id, stops), trips)) in groups.into_iter().enumerate() {
            let pattern = TripPattern::new(PatternId(i as u32), route_id, stops, trips)?;
            graph.add_scheduled_pattern(&pattern);
            index.add_pattern(Arc::new(pattern))?;
        }

        info!(
            patterns = index.patterns().count(),
            stops = index.all_stops().len(),
            "loaded schedule fixture"
        );
        Ok((index, graph))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FeedId;
    use crate::schedule::ScheduleGraph;

    const FIXTURE: &str = r#"{
        "agencies": [{"id": "metro", "name": "Metro", "timezone": "Europe/London"}],
        "stops": [
            {"id": "metro:A", "name": "Alpha"},
            {"id": "metro:B", "name": "Bravo"},
            {"id": "metro:C", "name": "Charlie"}
        ],
        "services": [{"id": "metro:WK", "dates": ["20240301", "20240304"]}],
        "trips": [
            {
                "id": "metro:T1", "route_id": "metro:R1", "service_id": "metro:WK",
                "stop_times": [
                    {"stop_id": "metro:B", "stop_sequence": 2, "arrival": 420, "departure": 450},
                    {"stop_id": "metro:A", "stop_sequence": 1, "arrival": 300, "departure": 300}
                ]
            },
            {
                "id": "metro:T2", "route_id": "metro:R1", "service_id": "metro:WK",
                "wheelchair_accessible": true,
                "stop_times": [
                    {"stop_id": "metro:A", "stop_sequence": 1, "arrival": 900, "departure": 900},
                    {"stop_id": "metro:B", "stop_sequence": 2, "arrival": 1020, "departure": 1050}
                ]
            },
            {
                "id": "metro:T3", "route_id": "metro:R1", "service_id": "metro:WK",
                "stop_times": [
                    {"stop_id": "metro:A", "stop_sequence": 1, "arrival": 600, "departure": 600},
                    {"stop_id": "metro:C", "stop_sequence": 2, "arrival": 720, "departure": 720}
                ]
            }
        ]
    }"#;

    #[test]
    fn groups_trips_into_patterns() {
        let (index, graph) = ScheduleFixture::from_json(FIXTURE).unwrap().build().unwrap();

        let t1 = index.pattern_for_trip(&FeedId::new("metro", "T1")).unwrap();
        let t2 = index.pattern_for_trip(&FeedId::new("metro", "T2")).unwrap();
        let t3 = index.pattern_for_trip(&FeedId::new("metro", "T3")).unwrap();

        assert_eq!(t1.id(), t2.id());
        assert_ne!(t1.id(), t3.id());
        assert_eq!(t1.stops(), &[FeedId::new("metro", "A"), FeedId::new("metro", "B")]);
        assert_eq!(index.next_pattern_id(), PatternId(2));
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(index.agency("metro").unwrap().timezone, chrono_tz::Europe::London);
        assert!(graph.calendar().runs_on(
            &FeedId::new("metro", "WK"),
            ServiceDate::from_ymd(2024, 3, 4).unwrap()
        ));
    }

    #[test]
    fn unknown_stop_rejected() {
        let json = FIXTURE.replace(r#""stop_id": "metro:C""#, r#""stop_id": "metro:Z""#);
        let err = ScheduleFixture::from_json(&json).unwrap().build().unwrap_err();
        assert!(matches!(
            err,
            FixtureError::Schedule(ScheduleError::UnknownStop(_))
        ));
    }

    #[test]
    fn unknown_service_agency_rejected() {
        let json = FIXTURE.replace(r#""id": "metro:WK""#, r#""id": "other:WK""#);
        let err = ScheduleFixture::from_json(&json).unwrap().build().unwrap_err();
        assert!(matches!(err, FixtureError::UnknownAgency(_)));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schedule.json");
        std::fs::write(&path, FIXTURE).unwrap();
        let fixture = ScheduleFixture::load(&path).unwrap();
        assert_eq!(fixture.trips.len(), 3);

        let err = ScheduleFixture::load(dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, FixtureError::Io(_)));
    }
}
