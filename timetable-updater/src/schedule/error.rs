//! Schedule construction and graph mutation errors.

use crate::domain::{StopId, TripId};

use super::PatternId;

/// Errors building schedule structures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    /// A trip must serve at least one stop
    #[error("trip {0} has no stop times")]
    EmptyTrip(TripId),

    /// Trip times must cover exactly the pattern's stops
    #[error("trip {trip} has {actual} stops but its pattern has {expected}")]
    StopCountMismatch {
        trip: TripId,
        expected: usize,
        actual: usize,
    },

    /// Two trips of one pattern share an id
    #[error("trip {0} appears twice in one pattern")]
    DuplicateTrip(TripId),

    /// Referenced stop is not known to the index
    #[error("unknown stop {0}")]
    UnknownStop(StopId),
}

/// Errors mutating the schedule graph.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// Pattern id already in use
    #[error("pattern {0} already exists")]
    DuplicatePattern(PatternId),

    /// Pattern is not a synthesized pattern of this graph
    #[error("pattern {0} was not synthesized by this graph")]
    UnknownPattern(PatternId),

    /// Edge was already detached or never existed
    #[error("edge {0} is not in the graph")]
    UnknownEdge(u64),

    /// Vertex was already removed or never existed
    #[error("vertex {0} is not in the graph")]
    UnknownVertex(u64),

    /// Underlying schedule data was invalid
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}
