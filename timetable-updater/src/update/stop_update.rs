//! A single stop-level patch.

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::domain::{ServiceDate, ServiceSeconds, StopId, TripId};

/// What the feed says about one stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StopStatus {
    /// The vehicle has already left.
    Passed,
    /// The stop will not be served.
    Canceled,
    /// No information; keep the schedule.
    Unknown,
    /// Running to schedule.
    Planned,
    /// The vehicle is at the stop now.
    Arrived,
    /// Predicted times.
    Prediction,
}

impl StopStatus {
    /// Returns true if the patch closes the stop to passengers.
    pub fn closes_stop(self) -> bool {
        matches!(self, StopStatus::Passed | StopStatus::Canceled)
    }

    /// Returns true if the patch carries its own times.
    pub fn has_times(self) -> bool {
        matches!(self, StopStatus::Arrived | StopStatus::Prediction)
    }
}

/// One stop's patch within a [`TripUpdate`](super::TripUpdate).
///
/// Times are seconds since the start of `service_date`. Absent times fall
/// back to the schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Update {
    pub trip_id: TripId,
    pub stop_id: StopId,
    /// Position of the stop within the trip, counting from zero.
    pub stop_seq: usize,
    #[serde(default)]
    pub arrival: Option<ServiceSeconds>,
    #[serde(default)]
    pub departure: Option<ServiceSeconds>,
    pub status: StopStatus,
    /// Reported delay in seconds, informational only.
    #[serde(default)]
    pub delay: i32,
    pub service_date: ServiceDate,
}

impl Update {
    /// A patch without times.
    pub fn new(
        trip_id: TripId,
        stop_id: StopId,
        stop_seq: usize,
        status: StopStatus,
        service_date: ServiceDate,
    ) -> Self {
        Self {
            trip_id,
            stop_id,
            stop_seq,
            arrival: None,
            departure: None,
            status,
            delay: 0,
            service_date,
        }
    }

    /// Set arrival and departure in service-day seconds.
    pub fn with_times(
        mut self,
        arrival: Option<ServiceSeconds>,
        departure: Option<ServiceSeconds>,
    ) -> Self {
        self.arrival = arrival;
        self.departure = departure;
        self
    }

    /// Set arrival and departure from Unix timestamps.
    ///
    /// The service day is counted in `tz`, the agency's zone. Returns
    /// `None` if a timestamp lies too far from the service day.
    pub fn with_epoch_times(
        self,
        tz: Tz,
        arrival: Option<i64>,
        departure: Option<i64>,
    ) -> Option<Self> {
        let convert = |epoch: Option<i64>| match epoch {
            Some(secs) => self
                .service_date
                .seconds_since_start(tz, secs)
                .map(Some),
            None => Some(None),
        };
        let arrival = convert(arrival)?;
        let departure = convert(departure)?;
        Some(self.with_times(arrival, departure))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FeedId;

    fn update(status: StopStatus) -> Update {
        Update::new(
            FeedId::new("a", "T1"),
            FeedId::new("a", "S1"),
            2,
            status,
            ServiceDate::from_ymd(2024, 3, 1).unwrap(),
        )
    }

    #[test]
    fn status_classification() {
        assert!(StopStatus::Passed.closes_stop());
        assert!(StopStatus::Canceled.closes_stop());
        assert!(!StopStatus::Prediction.closes_stop());
        assert!(StopStatus::Arrived.has_times());
        assert!(!StopStatus::Planned.has_times());
    }

    #[test]
    fn epoch_times_convert_to_service_seconds() {
        // 2024-03-01 08:00:00 UTC
        let eight_am = 1_709_280_000;
        let u = update(StopStatus::Prediction)
            .with_epoch_times(chrono_tz::UTC, Some(eight_am), Some(eight_am + 30))
            .unwrap();
        assert_eq!(u.arrival, Some(8 * 3600));
        assert_eq!(u.departure, Some(8 * 3600 + 30));
    }

    #[test]
    fn epoch_times_out_of_range() {
        let u = update(StopStatus::Prediction).with_epoch_times(chrono_tz::UTC, Some(i64::MAX), None);
        assert!(u.is_none());
    }

    #[test]
    fn deserializes_feed_json() {
        let json = r#"{
            "trip_id": "a:T1",
            "stop_id": "a:S1",
            "stop_seq": 2,
            "departure": 600,
            "status": "PREDICTION",
            "service_date": "20240301"
        }"#;
        let u: Update = serde_json::from_str(json).unwrap();
        assert_eq!(u.status, StopStatus::Prediction);
        assert_eq!(u.arrival, None);
        assert_eq!(u.departure, Some(600));
        assert_eq!(u.delay, 0);
    }
}
