//! Updater error types.

use std::path::PathBuf;

use crate::domain::{StopId, TripId};
use crate::schedule::{GraphError, ScheduleError};
use crate::trip_times::ReconcileError;

/// Why one batch had no effect.
///
/// Always local to the batch: the updater logs it and carries on with the
/// next one.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApplyError {
    /// Patches skip or repeat stop positions, or name another trip or day
    #[error("updates for trip {0} are not coherent")]
    Incoherent(TripId),

    /// Filtering left nothing to apply
    #[error("no usable updates for trip {0}")]
    EmptyAfterFilter(TripId),

    /// The index knows no pattern for the trip
    #[error("no pattern found for trip {0}")]
    UnknownPattern(TripId),

    /// Removal of an added trip that was never added
    #[error("trip {0} was not added by realtime")]
    NotAdded(TripId),

    /// An added trip names an agency the index does not know
    #[error("unknown agency {agency} for added trip {trip}")]
    UnknownAgency { trip: TripId, agency: String },

    /// An added trip calls at a stop the index does not know
    #[error("added trip {trip} calls at unknown stop {stop}")]
    UnknownStop { trip: TripId, stop: StopId },

    /// An added trip has a stop with neither arrival nor departure
    #[error("added trip {trip} has no time at stop {stop}")]
    MissingTimes { trip: TripId, stop: StopId },

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}

/// Failures pulling batches from a [`MessageSource`](super::MessageSource).
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// A replay file or directory could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A replay file is not a list of trip updates
    #[error("failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Every sender has gone away
    #[error("message source disconnected")]
    Disconnected,
}

/// Errors that end one updater invocation.
#[derive(Debug, thiserror::Error)]
pub enum UpdaterError {
    #[error(transparent)]
    Source(#[from] SourceError),
}
