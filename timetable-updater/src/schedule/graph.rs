//! The schedule graph routing walks, and how realtime adds to it.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::domain::{RouteId, StopId, TripId};
use crate::trip_times::ScheduledTripTimes;

use super::{CalendarService, GraphError, PatternId, StopTime, Trip, TripPattern};

pub type EdgeId = u64;
pub type VertexId = u64;

/// What adding a realtime trip put into the graph.
///
/// Kept so the same edges and vertices can be taken out again.
#[derive(Debug, Clone)]
pub struct SynthesizedPattern {
    pub pattern: Arc<TripPattern>,
    pub edges: Vec<EdgeId>,
    pub vertices: Vec<VertexId>,
}

/// Graph mutations the updater needs.
pub trait ScheduleGraph: Send {
    /// Build a pattern with edges and vertices for a trip missing from the schedule.
    ///
    /// A trip with the same route and stops as an earlier added trip joins
    /// that trip's pattern and reuses its edges.
    fn add_pattern_for_trip(
        &mut self,
        trip: Arc<Trip>,
        stop_times: &[StopTime],
    ) -> Result<SynthesizedPattern, GraphError>;

    /// Take `trip` out of a synthesized pattern other trips still use.
    ///
    /// The edges and vertices stay; the returned pattern no longer carries
    /// the trip.
    fn remove_trip_from_pattern(
        &mut self,
        synthesized: &SynthesizedPattern,
        trip: &TripId,
    ) -> Result<SynthesizedPattern, GraphError>;

    /// Detach the edges and remove the vertices a synthesized pattern added.
    fn detach_and_remove(&mut self, synthesized: &SynthesizedPattern) -> Result<(), GraphError>;

    fn calendar(&self) -> &CalendarService;

    fn calendar_mut(&mut self) -> &mut CalendarService;
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Vertex {
    stop: StopId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Edge {
    pattern: PatternId,
    from: VertexId,
    to: VertexId,
}

/// A graph kept entirely in memory: one vertex per pattern stop and one
/// hop edge between consecutive stops.
#[derive(Debug, Default)]
pub struct InMemoryGraph {
    vertices: HashMap<VertexId, Vertex>,
    edges: HashMap<EdgeId, Edge>,
    synthesized: HashMap<(RouteId, Vec<StopId>), SynthesizedPattern>,
    calendar: CalendarService,
    next_pattern: u32,
    next_vertex: VertexId,
    next_edge: EdgeId,
}

impl InMemoryGraph {
    /// An empty graph whose synthesized patterns are numbered from `first_pattern`.
    pub fn new(first_pattern: PatternId, calendar: CalendarService) -> Self {
        Self {
            calendar,
            next_pattern: first_pattern.0,
            ..Self::default()
        }
    }

    /// Link a pattern from the static schedule into the graph.
    pub fn add_scheduled_pattern(&mut self, pattern: &TripPattern) {
        self.link(pattern.id(), pattern.stops());
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Returns true if `edge` is attached.
    pub fn contains_edge(&self, edge: EdgeId) -> bool {
        self.edges.contains_key(&edge)
    }

    /// Stop pairs joined by the hop edges of `pattern`, in creation order.
    pub fn hops(&self, pattern: PatternId) -> Vec<(StopId, StopId)> {
        let mut edges: Vec<_> = self
            .edges
            .iter()
            .filter(|(_, edge)| edge.pattern == pattern)
            .collect();
        edges.sort_unstable_by_key(|(id, _)| **id);
        edges
            .into_iter()
            .filter_map(|(_, edge)| {
                let from = self.vertices.get(&edge.from)?;
                let to = self.vertices.get(&edge.to)?;
                Some((from.stop.clone(), to.stop.clone()))
            })
            .collect()
    }

    /// Number of synthesized patterns currently in the graph.
    pub fn synthesized_count(&self) -> usize {
        self.synthesized.len()
    }

    /// Add a vertex for every stop and an edge for every hop of `pattern`.
    fn link(&mut self, pattern: PatternId, stops: &[StopId]) -> (Vec<EdgeId>, Vec<VertexId>) {
        let vertices: Vec<VertexId> = stops
            .iter()
            .map(|stop| {
                let id = self.next_vertex;
                self.next_vertex += 1;
                self.vertices.insert(id, Vertex { stop: stop.clone() });
                id
            })
            .collect();

        let edges = vertices
            .windows(2)
            .map(|hop| {
                let id = self.next_edge;
                self.next_edge += 1;
                self.edges.insert(
                    id,
                    Edge {
                        pattern,
                        from: hop[0],
                        to: hop[1],
                    },
                );
                id
            })
            .collect();

        (edges, vertices)
    }
}

impl ScheduleGraph for InMemoryGraph {
    fn add_pattern_for_trip(
        &mut self,
        trip: Arc<Trip>,
        stop_times: &[StopTime],
    ) -> Result<SynthesizedPattern, GraphError> {
        let scheduled = Arc::new(ScheduledTripTimes::new(trip.clone(), stop_times)?);
        let stops: Vec<StopId> = stop_times.iter().map(|st| st.stop_id.clone()).collect();
        let key = (trip.route_id.clone(), stops);

        if let Some(existing) = self.synthesized.get_mut(&key) {
            existing.pattern = Arc::new(existing.pattern.with_trip(scheduled)?);
            debug!(pattern = %existing.pattern.id(), trip = %trip.id, "trip joins synthesized pattern");
            return Ok(existing.clone());
        }

        let id = PatternId(self.next_pattern);
        let pattern = Arc::new(TripPattern::synthesized(
            id,
            trip.route_id.clone(),
            key.1.clone(),
            vec![scheduled],
        )?);
        self.next_pattern += 1;

        let (edges, vertices) = self.link(id, &key.1);
        debug!(
            pattern = %id,
            trip = %trip.id,
            edges = edges.len(),
            "synthesized pattern added to graph"
        );
        let synthesized = SynthesizedPattern {
            pattern,
            edges,
            vertices,
        };
        self.synthesized.insert(key, synthesized.clone());
        Ok(synthesized)
    }

    fn remove_trip_from_pattern(
        &mut self,
        synthesized: &SynthesizedPattern,
        trip: &TripId,
    ) -> Result<SynthesizedPattern, GraphError> {
        let id = synthesized.pattern.id();
        let existing = self
            .synthesized
            .values_mut()
            .find(|s| s.pattern.id() == id)
            .ok_or(GraphError::UnknownPattern(id))?;
        existing.pattern = Arc::new(existing.pattern.without_trip(trip));
        debug!(pattern = %id, %trip, "trip leaves synthesized pattern");
        Ok(existing.clone())
    }

    fn detach_and_remove(&mut self, synthesized: &SynthesizedPattern) -> Result<(), GraphError> {
        if let Some(edge) = synthesized.edges.iter().find(|e| !self.edges.contains_key(*e)) {
            return Err(GraphError::UnknownEdge(*edge));
        }
        if let Some(vertex) = synthesized
            .vertices
            .iter()
            .find(|v| !self.vertices.contains_key(*v))
        {
            return Err(GraphError::UnknownVertex(*vertex));
        }

        for edge in &synthesized.edges {
            self.edges.remove(edge);
        }
        for vertex in &synthesized.vertices {
            self.vertices.remove(vertex);
        }
        let id = synthesized.pattern.id();
        self.synthesized.retain(|_, s| s.pattern.id() != id);
        debug!(pattern = %id, "synthesized pattern removed from graph");
        Ok(())
    }

    fn calendar(&self) -> &CalendarService {
        &self.calendar
    }

    fn calendar_mut(&mut self) -> &mut CalendarService {
        &mut self.calendar
    }
}
