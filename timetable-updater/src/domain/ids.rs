//! Agency-scoped identifiers.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Error returned when parsing an invalid feed identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid feed id {input:?}: {reason}")]
pub struct InvalidFeedId {
    input: String,
    reason: &'static str,
}

/// An identifier scoped to the agency that published it.
///
/// Two agencies may reuse the same local id, so the pair is the key.
/// The textual form is `agency:id`.
///
/// # Examples
///
/// ```
/// use timetable_updater::domain::FeedId;
///
/// let id = FeedId::parse("metro:T42").unwrap();
/// assert_eq!(id.agency(), "metro");
/// assert_eq!(id.id(), "T42");
/// assert_eq!(id.to_string(), "metro:T42");
///
/// assert!(FeedId::parse("T42").is_err());
/// assert!(FeedId::parse(":T42").is_err());
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FeedId {
    agency: Arc<str>,
    id: Arc<str>,
}

/// Trip identifier.
pub type TripId = FeedId;
/// Stop identifier.
pub type StopId = FeedId;
/// Route identifier.
pub type RouteId = FeedId;
/// Calendar service identifier.
pub type ServiceId = FeedId;

impl FeedId {
    /// Create an identifier from its two parts.
    pub fn new(agency: impl Into<Arc<str>>, id: impl Into<Arc<str>>) -> Self {
        Self {
            agency: agency.into(),
            id: id.into(),
        }
    }

    /// Parse an identifier from `agency:id` form.
    ///
    /// Only the first colon separates the parts, so local ids may contain colons.
    pub fn parse(s: &str) -> Result<Self, InvalidFeedId> {
        let invalid = |reason| InvalidFeedId {
            input: s.to_string(),
            reason,
        };

        let (agency, id) = s.split_once(':').ok_or_else(|| invalid("missing ':'"))?;
        if agency.is_empty() {
            return Err(invalid("empty agency"));
        }
        if id.is_empty() {
            return Err(invalid("empty id"));
        }

        Ok(Self::new(agency, id))
    }

    /// The publishing agency.
    pub fn agency(&self) -> &str {
        &self.agency
    }

    /// The agency-local identifier.
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Debug for FeedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FeedId({}:{})", self.agency, self.id)
    }
}

impl fmt::Display for FeedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.agency, self.id)
    }
}

impl TryFrom<String> for FeedId {
    type Error = InvalidFeedId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<FeedId> for String {
    fn from(value: FeedId) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_splits_on_first_colon() {
        let id = FeedId::parse("bus:stop:12").unwrap();
        assert_eq!(id.agency(), "bus");
        assert_eq!(id.id(), "stop:12");
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!(FeedId::parse("").is_err());
        assert!(FeedId::parse("nocolon").is_err());
        assert!(FeedId::parse("agency:").is_err());
        assert!(FeedId::parse(":id").is_err());
    }

    #[test]
    fn error_display() {
        let err = FeedId::parse("T42").unwrap_err();
        assert_eq!(err.to_string(), "invalid feed id \"T42\": missing ':'");
    }

    #[test]
    fn serde_uses_textual_form() {
        let id = FeedId::new("metro", "A");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"metro:A\"");

        let back: FeedId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);

        assert!(serde_json::from_str::<FeedId>("\"metro\"").is_err());
    }
}
