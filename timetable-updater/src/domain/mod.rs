//! Domain types shared by every layer.
//!
//! Identifiers, service dates and the service-day time convention. All
//! types validate at construction, so code receiving them can trust them.

mod ids;
mod time;

pub use ids::{FeedId, InvalidFeedId, RouteId, ServiceId, StopId, TripId};
pub use time::{
    CANCELED, InvalidServiceDate, PASSED, ServiceDate, ServiceSeconds, format_service_time,
    is_sentinel,
};
