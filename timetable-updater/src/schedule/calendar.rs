//! Which service ids run on which dates.

use std::collections::{BTreeSet, HashMap};

use chrono_tz::Tz;

use crate::domain::{ServiceDate, ServiceId};

#[derive(Debug, Clone)]
struct ServiceCalendar {
    timezone: Tz,
    dates: BTreeSet<ServiceDate>,
}

/// Service ids and the dates they run on.
///
/// Holds explicit date lists only; expanding weekly patterns into dates is
/// the schedule loader's job.
#[derive(Debug, Clone, Default)]
pub struct CalendarService {
    services: HashMap<ServiceId, ServiceCalendar>,
}

impl CalendarService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if `service` is registered.
    pub fn contains(&self, service: &ServiceId) -> bool {
        self.services.contains_key(service)
    }

    /// Register `service` running on `dates` in `timezone`.
    ///
    /// Returns false and changes nothing if it is already registered.
    pub fn add_service(
        &mut self,
        service: ServiceId,
        timezone: Tz,
        dates: impl IntoIterator<Item = ServiceDate>,
    ) -> bool {
        if self.contains(&service) {
            return false;
        }
        self.services.insert(
            service,
            ServiceCalendar {
                timezone,
                dates: dates.into_iter().collect(),
            },
        );
        true
    }

    /// Returns true if `service` runs on `date`.
    pub fn runs_on(&self, service: &ServiceId, date: ServiceDate) -> bool {
        self.services
            .get(service)
            .is_some_and(|calendar| calendar.dates.contains(&date))
    }

    /// The zone `service` counts its days in.
    pub fn timezone(&self, service: &ServiceId) -> Option<Tz> {
        self.services.get(service).map(|calendar| calendar.timezone)
    }

    /// Number of registered services.
    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FeedId;

    #[test]
    fn add_once() {
        let mut calendar = CalendarService::new();
        let service = FeedId::new("a", "WEEKDAY");
        let monday = ServiceDate::from_ymd(2024, 3, 4).unwrap();

        assert!(calendar.add_service(service.clone(), chrono_tz::Europe::London, [monday]));
        assert!(!calendar.add_service(service.clone(), chrono_tz::UTC, []));

        assert!(calendar.contains(&service));
        assert!(calendar.runs_on(&service, monday));
        assert!(!calendar.runs_on(&service, monday.next()));
        assert_eq!(calendar.timezone(&service), Some(chrono_tz::Europe::London));
        assert_eq!(calendar.len(), 1);
    }

    #[test]
    fn unknown_service_never_runs() {
        let calendar = CalendarService::new();
        let service = FeedId::new("a", "NONE");
        assert!(!calendar.contains(&service));
        assert!(!calendar.runs_on(&service, ServiceDate::from_ymd(2024, 1, 1).unwrap()));
        assert!(calendar.is_empty());
    }
}
