use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::status::{ConferenceStatus, reconciled_status, resolve_status};
use crate::timestamp::normalize_instant;

/// Document field holding the scheduled start.
pub const START_TIME_FIELD: &str = "startTime";
/// Document field holding the scheduled end.
pub const END_TIME_FIELD: &str = "endTime";
/// Document field holding the persisted lifecycle label.
pub const STATUS_FIELD: &str = "status";
/// Marker written alongside every status change.
pub const UPDATED_AT_FIELD: &str = "updatedAt";
const TITLE_FIELD: &str = "title";

/// Opaque document identifier.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConferenceId(String);

impl ConferenceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConferenceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ConferenceId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A conference as the core sees it: boundaries already normalized.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConferenceRecord {
    pub id: ConferenceId,
    pub title: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// `None` when the document never had a status written.
    pub status: Option<ConferenceStatus>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ConferenceRecord {
    pub fn new(id: impl Into<ConferenceId>) -> Self {
        Self {
            id: id.into(),
            title: None,
            start_time: None,
            end_time: None,
            status: Some(ConferenceStatus::Upcoming),
            updated_at: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_window(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start_time = Some(start);
        self.end_time = Some(end);
        self
    }

    pub fn with_status(mut self, status: Option<ConferenceStatus>) -> Self {
        self.status = status;
        self
    }

    /// Stored label, reading an unset status as `Upcoming`.
    pub fn stored_status(&self) -> ConferenceStatus {
        self.status.unwrap_or_default()
    }

    /// Records without both boundaries are managed by hand.
    pub fn is_time_managed(&self) -> bool {
        self.start_time.is_some() && self.end_time.is_some()
    }

    pub fn resolve(&self, now: DateTime<Utc>) -> ConferenceStatus {
        resolve_status(self.status, self.start_time, self.end_time, now)
    }

    /// Status after applying the resolver forward-only.
    pub fn reconcile(&self, now: DateTime<Utc>) -> ConferenceStatus {
        reconciled_status(self.status, self.start_time, self.end_time, now)
    }

    /// Builds a record from a plain JSON document.
    ///
    /// Any boundary or status that cannot be read yields a
    /// [`MalformedRecord`] instead of a best guess.
    pub fn from_document(
        id: impl Into<ConferenceId>,
        fields: &Map<String, Value>,
    ) -> Result<Self, MalformedRecord> {
        let id = id.into();
        let read_instant = |field: &str| {
            fields
                .get(field)
                .map(normalize_instant)
                .transpose()
                .map(Option::flatten)
                .map_err(|err| MalformedRecord::new(id.clone(), format!("{field}: {err}")))
        };

        let start_time = read_instant(START_TIME_FIELD)?;
        let end_time = read_instant(END_TIME_FIELD)?;

        let status = match fields.get(STATUS_FIELD) {
            None | Some(Value::Null) => None,
            Some(Value::String(label)) => Some(
                label
                    .parse::<ConferenceStatus>()
                    .map_err(|err| MalformedRecord::new(id.clone(), err.to_string()))?,
            ),
            Some(other) => {
                return Err(MalformedRecord::new(
                    id.clone(),
                    format!("{STATUS_FIELD}: expected a string, found {other}"),
                ));
            }
        };

        let title = fields
            .get(TITLE_FIELD)
            .and_then(Value::as_str)
            .map(str::to_string);
        let updated_at = fields
            .get(UPDATED_AT_FIELD)
            .and_then(|value| normalize_instant(value).ok().flatten());

        Ok(Self {
            id,
            title,
            start_time,
            end_time,
            status,
            updated_at,
        })
    }
}

/// A document whose boundaries or status could not be understood.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MalformedRecord {
    pub id: ConferenceId,
    pub reason: String,
}

impl MalformedRecord {
    pub fn new(id: ConferenceId, reason: impl Into<String>) -> Self {
        Self {
            id,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for MalformedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conference {} is malformed: {}", self.id, self.reason)
    }
}

/// One entry of a store listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoredConference {
    Valid(ConferenceRecord),
    Malformed(MalformedRecord),
}

impl StoredConference {
    pub fn from_document(id: impl Into<ConferenceId>, fields: &Map<String, Value>) -> Self {
        match ConferenceRecord::from_document(id, fields) {
            Ok(record) => StoredConference::Valid(record),
            Err(malformed) => StoredConference::Malformed(malformed),
        }
    }

    pub fn id(&self) -> &ConferenceId {
        match self {
            StoredConference::Valid(record) => &record.id,
            StoredConference::Malformed(malformed) => &malformed.id,
        }
    }

    pub fn as_record(&self) -> Option<&ConferenceRecord> {
        match self {
            StoredConference::Valid(record) => Some(record),
            StoredConference::Malformed(_) => None,
        }
    }
}

impl From<ConferenceRecord> for StoredConference {
    fn from(record: ConferenceRecord) -> Self {
        StoredConference::Valid(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn reads_mixed_timestamp_shapes() {
        let doc = fields(json!({
            "title": "Biofilm Summit",
            "startTime": { "seconds": 1_714_557_600, "nanoseconds": 0 },
            "endTime": "2024-05-01T12:00:00Z",
            "status": "upcoming",
            "organizer": "uid-42",
        }));

        let record = ConferenceRecord::from_document("conf-1", &doc).unwrap();
        assert_eq!(record.title.as_deref(), Some("Biofilm Summit"));
        assert_eq!(
            record.start_time,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap())
        );
        assert_eq!(
            record.end_time,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
        );
        assert_eq!(record.status, Some(ConferenceStatus::Upcoming));
    }

    #[test]
    fn missing_fields_are_absent_not_malformed() {
        let record = ConferenceRecord::from_document("conf-2", &Map::new()).unwrap();
        assert!(!record.is_time_managed());
        assert_eq!(record.status, None);
        assert_eq!(record.stored_status(), ConferenceStatus::Upcoming);
    }

    #[test]
    fn bad_boundary_is_malformed() {
        let doc = fields(json!({ "startTime": [2024, 5, 1], "endTime": null }));
        let entry = StoredConference::from_document("conf-3", &doc);
        match entry {
            StoredConference::Malformed(malformed) => {
                assert_eq!(malformed.id.as_str(), "conf-3");
                assert!(malformed.reason.starts_with("startTime"));
            }
            StoredConference::Valid(_) => panic!("expected malformed entry"),
        }
    }

    #[test]
    fn unknown_status_is_malformed() {
        let doc = fields(json!({ "status": "postponed" }));
        assert!(ConferenceRecord::from_document("conf-4", &doc).is_err());

        let doc = fields(json!({ "status": 3 }));
        assert!(ConferenceRecord::from_document("conf-5", &doc).is_err());
    }
}
