//! Service days and times within them.
//!
//! Stop times are integer seconds since the start of the service day. A
//! trip running past midnight keeps counting, so values above 86400 are
//! valid. Two sentinels sit outside the valid range and mark stops that
//! have been passed or canceled.

use std::fmt;

use chrono::{DateTime, Datelike, Days, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Seconds since the start of the service day.
pub type ServiceSeconds = i32;

/// Time reported for a stop the vehicle has already passed.
pub const PASSED: ServiceSeconds = i32::MIN;

/// Time reported for a stop that will not be served.
pub const CANCELED: ServiceSeconds = i32::MIN + 1;

/// Returns true for [`PASSED`] and [`CANCELED`].
pub fn is_sentinel(t: ServiceSeconds) -> bool {
    t == PASSED || t == CANCELED
}

/// Formats a service time as `HH:MM:SS`, hours allowed past 23.
///
/// # Examples
///
/// ```
/// use timetable_updater::domain::{format_service_time, CANCELED};
///
/// assert_eq!(format_service_time(3_661), "01:01:01");
/// assert_eq!(format_service_time(90_000), "25:00:00");
/// assert_eq!(format_service_time(CANCELED), "CANCELED");
/// ```
pub fn format_service_time(t: ServiceSeconds) -> String {
    match t {
        PASSED => "PASSED".to_string(),
        CANCELED => "CANCELED".to_string(),
        t => {
            let sign = if t < 0 { "-" } else { "" };
            let abs = t.unsigned_abs();
            format!(
                "{sign}{:02}:{:02}:{:02}",
                abs / 3600,
                (abs / 60) % 60,
                abs % 60
            )
        }
    }
}

/// Error returned when parsing an invalid service date.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid service date {input:?}: expected YYYYMMDD")]
pub struct InvalidServiceDate {
    input: String,
}

/// The calendar day a trip belongs to.
///
/// Not the same as the wall-clock day: a trip starting at 23:50 and
/// arriving at 00:30 belongs entirely to the first day. The textual form
/// is `YYYYMMDD`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServiceDate(NaiveDate);

impl ServiceDate {
    /// Create from year, month, day. Returns `None` for impossible dates.
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    /// Parse from `YYYYMMDD`.
    pub fn parse(s: &str) -> Result<Self, InvalidServiceDate> {
        if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InvalidServiceDate {
                input: s.to_string(),
            });
        }
        NaiveDate::parse_from_str(s, "%Y%m%d")
            .map(Self)
            .map_err(|_| InvalidServiceDate {
                input: s.to_string(),
            })
    }

    /// The current service date in the given time zone.
    pub fn today_in(tz: Tz) -> Self {
        Self(Utc::now().with_timezone(&tz).date_naive())
    }

    /// The underlying calendar date.
    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// The day before. Saturates at the earliest representable date.
    pub fn previous(&self) -> Self {
        Self(self.0.checked_sub_days(Days::new(1)).unwrap_or(self.0))
    }

    /// The day after. Saturates at the latest representable date.
    pub fn next(&self) -> Self {
        Self(self.0.checked_add_days(Days::new(1)).unwrap_or(self.0))
    }

    /// The instant service-day seconds are counted from.
    ///
    /// Defined as noon local time minus twelve hours, which keeps the
    /// schedule stable across daylight-saving transitions.
    pub fn start_in(&self, tz: Tz) -> Option<DateTime<Tz>> {
        let noon = self.0.and_hms_opt(12, 0, 0)?;
        let noon = tz.from_local_datetime(&noon).single()?;
        Some(noon - chrono::Duration::hours(12))
    }

    /// Convert epoch seconds to seconds since the start of this service day.
    ///
    /// Returns `None` if the result does not fit a [`ServiceSeconds`] or
    /// would collide with a sentinel.
    pub fn seconds_since_start(&self, tz: Tz, epoch_secs: i64) -> Option<ServiceSeconds> {
        let start = self.start_in(tz)?.timestamp();
        let secs = ServiceSeconds::try_from(epoch_secs - start).ok()?;
        (!is_sentinel(secs)).then_some(secs)
    }
}

impl From<NaiveDate> for ServiceDate {
    fn from(value: NaiveDate) -> Self {
        Self(value)
    }
}

impl fmt::Debug for ServiceDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceDate({self})")
    }
}

impl fmt::Display for ServiceDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}{:02}{:02}",
            self.0.year(),
            self.0.month(),
            self.0.day()
        )
    }
}

impl TryFrom<String> for ServiceDate {
    type Error = InvalidServiceDate;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ServiceDate> for String {
    fn from(value: ServiceDate) -> Self {
        value.to_string()
    }
}
