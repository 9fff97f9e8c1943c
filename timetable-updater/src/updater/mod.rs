//! Applying realtime trip updates to the schedule.
//!
//! [`StoptimeUpdater`] is the single writer: it pulls batches from a
//! [`MessageSource`], routes each trip update by its status, and publishes
//! the result through a [`TimetableSnapshotSource`] that any number of
//! readers share.
//!
//! [`TimetableSnapshotSource`]: crate::timetable::TimetableSnapshotSource

mod added;
mod config;
mod error;
mod source;
mod stoptime;


pub use added::{AddedTrips, RemovedTrip};
pub use config::UpdaterConfig;
pub use error::{ApplyError, SourceError, UpdaterError};
pub use source::{ChannelSource, MessageSource, ReplaySource};
pub use stoptime::{RunSummary, StoptimeUpdater};
