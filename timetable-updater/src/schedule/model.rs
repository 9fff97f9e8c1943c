//! Static schedule records.

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::domain::{RouteId, ServiceId, ServiceSeconds, StopId, TripId};

/// Whether passengers may board or alight at a stop.
///
/// Discriminants follow the GTFS `pickup_type` / `drop_off_type` codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickDrop {
    /// Regularly scheduled.
    #[default]
    Regular = 0,
    /// Not available.
    None = 1,
    /// Must phone the agency to arrange.
    PhoneAgency = 2,
    /// Must coordinate with the driver.
    CoordinateWithDriver = 3,
}

impl PickDrop {
    /// Returns true unless passengers are barred outright.
    pub fn is_allowed(self) -> bool {
        self != PickDrop::None
    }
}

/// A transit operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agency {
    pub id: String,
    pub name: String,
    /// Local time zone; service days are counted in it.
    pub timezone: Tz,
}

/// A stop or platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stop {
    pub id: StopId,
    pub name: String,
}

/// A single scheduled vehicle journey.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trip {
    pub id: TripId,
    pub route_id: RouteId,
    pub service_id: ServiceId,
    #[serde(default)]
    pub wheelchair_accessible: bool,
}

/// One row of a trip's stop sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopTime {
    pub stop_id: StopId,
    pub stop_sequence: u32,
    pub arrival: ServiceSeconds,
    pub departure: ServiceSeconds,
    #[serde(default)]
    pub pickup: PickDrop,
    #[serde(default)]
    pub dropoff: PickDrop,
}

impl StopTime {
    /// A regular stop with the given times.
    pub fn new(
        stop_id: StopId,
        stop_sequence: u32,
        arrival: ServiceSeconds,
        departure: ServiceSeconds,
    ) -> Self {
        Self {
            stop_id,
            stop_sequence,
            arrival,
            departure,
            pickup: PickDrop::Regular,
            dropoff: PickDrop::Regular,
        }
    }
}
