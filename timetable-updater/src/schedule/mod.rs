//! The static schedule the realtime layer patches.
//!
//! Trips grouped into [`TripPattern`]s, the calendar saying which services
//! run when, and the graph and index seams the updater mutates when a
//! realtime message adds a trip the schedule never had.

mod calendar;
mod error;
mod fixture;
mod graph;
mod index;
mod model;
mod pattern;

pub use calendar::CalendarService;
pub use error::{GraphError, ScheduleError};
pub use fixture::{FixtureError, ScheduleFixture};
pub use graph::{EdgeId, InMemoryGraph, ScheduleGraph, SynthesizedPattern, VertexId};
pub use index::{InMemoryTransitIndex, TransitIndex};
pub use model::{Agency, PickDrop, Stop, StopTime, Trip};
pub use pattern::{PatternId, TripPattern};
