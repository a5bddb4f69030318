use crate::error::{CoreError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use time::macros::{datetime, format_description};
use time::{Date, Duration, OffsetDateTime, Time};

/// An instant on the `lastUpdated` axis of claim records and load batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub OffsetDateTime);

/// The instant before last-updated tracking existed. Records without a
/// `lastUpdated` value predate it.
pub const BEFORE_LAST_UPDATED: Timestamp = Timestamp(datetime!(2020-01-01 00:00:00 UTC));

impl Timestamp {
    pub fn new(datetime: OffsetDateTime) -> Self {
        Self(datetime)
    }

    pub fn inner(&self) -> &OffsetDateTime {
        &self.0
    }

    pub fn into_inner(self) -> OffsetDateTime {
        self.0
    }

    /// The smallest representable instant strictly after this one, or
    /// `None` at the end of the representable range.
    pub fn successor(&self) -> Option<Self> {
        self.0.checked_add(Duration::nanoseconds(1)).map(Self)
    }

    /// Parse an RFC 3339 instant or a plain `YYYY-MM-DD` date (midnight UTC).
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.len() == 10 && !trimmed.contains('T') {
            let date = Date::parse(trimmed, format_description!("[year]-[month]-[day]"))
                .map_err(|e| {
                    CoreError::invalid_date_time(format!("Failed to parse date '{trimmed}': {e}"))
                })?;
            return Ok(Self(date.with_time(Time::MIDNIGHT).assume_utc()));
        }

        let datetime =
            OffsetDateTime::parse(trimmed, &time::format_description::well_known::Rfc3339)
                .map_err(|e| {
                    CoreError::invalid_date_time(format!(
                        "Failed to parse timestamp '{trimmed}': {e}"
                    ))
                })?;
        Ok(Self(datetime))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let formatted = self
            .0
            .format(&time::format_description::well_known::Rfc3339)
            .map_err(|_| fmt::Error)?;
        write!(f, "{formatted}")
    }
}

impl FromStr for Timestamp {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<OffsetDateTime> for Timestamp {
    fn from(datetime: OffsetDateTime) -> Self {
        Self(datetime)
    }
}

impl Serialize for Timestamp {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let formatted = self
            .0
            .format(&time::format_description::well_known::Rfc3339)
            .map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&formatted)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Timestamp::parse(&s).map_err(serde::de::Error::custom)
    }
}
