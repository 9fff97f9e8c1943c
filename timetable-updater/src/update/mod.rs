//! Realtime patches as they arrive from the feed decoder.
//!
//! An [`Update`] describes one stop of one trip. A [`TripUpdate`] groups
//! the patches for a single trip and service date and says what happened
//! to the trip as a whole.

mod stop_update;
mod trip_update;

pub use stop_update::{StopStatus, Update};
pub use trip_update::{FilterOptions, TripStatus, TripUpdate};
