//! Timetables and the buffer/snapshot pair that publishes them.
//!
//! The updater owns a [`TimetableResolver`], its private working copy of
//! every timetable realtime has touched. Committing the buffer yields an
//! immutable [`TimetableSnapshot`] that routing threads read without
//! locks. [`TimetableSnapshotSource`] ties the two together and throttles
//! how often a new snapshot is cut; readers load the latest one through a
//! [`SnapshotReader`].

mod resolver;
mod snapshot;
#[allow(clippy::module_inception)]
mod timetable;

pub use resolver::{TimetableKey, TimetableResolver};
pub use snapshot::{SnapshotReader, TimetableSnapshot, TimetableSnapshotSource};
pub use timetable::Timetable;
