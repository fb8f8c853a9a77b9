//! Firestore REST (v1) adapter.
//!
//! Typed Firestore values are flattened into plain JSON first, then run
//! through the same document decoding as every other backend.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;

use super::ConferenceStore;
use crate::error::{AgarError, Result};
use crate::record::{ConferenceId, STATUS_FIELD, StoredConference, UPDATED_AT_FIELD};
use crate::status::ConferenceStatus;

pub const DEFAULT_BASE_URL: &str = "https://firestore.googleapis.com/v1";
pub const DEFAULT_DATABASE: &str = "(default)";
pub const DEFAULT_COLLECTION: &str = "conferences";

/// Connection settings for [`FirestoreConferenceStore`].
#[derive(Clone)]
pub struct FirestoreSettings {
    pub base_url: String,
    pub project_id: String,
    pub database: String,
    pub collection: String,
    /// OAuth bearer token; `None` relies on open security rules or an emulator.
    pub access_token: Option<String>,
    pub page_size: u32,
    pub request_timeout: Duration,
}

impl FirestoreSettings {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            project_id: project_id.into(),
            database: DEFAULT_DATABASE.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            access_token: None,
            page_size: 300,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl fmt::Debug for FirestoreSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FirestoreSettings")
            .field("base_url", &self.base_url)
            .field("project_id", &self.project_id)
            .field("database", &self.database)
            .field("collection", &self.collection)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("page_size", &self.page_size)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct FirestoreDocument {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
    #[serde(rename = "updateTime", default)]
    update_time: Option<String>,
}

impl FirestoreDocument {
    fn id(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(self.name.as_str())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<FirestoreDocument>,
    next_page_token: Option<String>,
}

/// Status writes carry a `currentDocument.updateTime` precondition taken
/// from the most recent read of that document, so a change made by an
/// organizer after the listing is never overwritten. Such a write fails
/// with [`AgarError::Conflict`] and is retried against a fresh listing.
pub struct FirestoreConferenceStore {
    client: Client,
    collection_url: Url,
    settings: FirestoreSettings,
    // Last seen `updateTime` per document.
    revisions: Mutex<HashMap<ConferenceId, String>>,
}

impl fmt::Debug for FirestoreConferenceStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FirestoreConferenceStore")
            .field("collection_url", &self.collection_url.as_str())
            .field("settings", &self.settings)
            .finish()
    }
}

impl FirestoreConferenceStore {
    pub fn new(settings: FirestoreSettings) -> Result<Self> {
        let collection_url = collection_url(&settings)?;
        let client = Client::builder()
            .timeout(settings.request_timeout)
            .build()?;
        Ok(Self {
            client,
            collection_url,
            settings,
            revisions: Mutex::new(HashMap::new()),
        })
    }

    fn document_url(&self, id: &ConferenceId) -> Result<Url> {
        let mut url = self.collection_url.clone();
        url.path_segments_mut()
            .map_err(|_| AgarError::Internal("Firestore base URL cannot hold a path".into()))?
            .push(id.as_str());
        Ok(url)
    }

    /// PATCH target for a status write, guarded by `revision` when known.
    fn status_patch_url(&self, id: &ConferenceId, revision: Option<&str>) -> Result<Url> {
        let mut url = self.document_url(id)?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("updateMask.fieldPaths", STATUS_FIELD)
                .append_pair("updateMask.fieldPaths", UPDATED_AT_FIELD);
            match revision {
                Some(update_time) => query.append_pair("currentDocument.updateTime", update_time),
                None => query.append_pair("currentDocument.exists", "true"),
            };
        }
        Ok(url)
    }

    async fn remember(&self, document: &FirestoreDocument) {
        if let Some(update_time) = &document.update_time {
            self.revisions
                .lock()
                .await
                .insert(ConferenceId::from(document.id()), update_time.clone());
        }
    }

    async fn revision(&self, id: &ConferenceId) -> Option<String> {
        self.revisions.lock().await.get(id).cloned()
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.settings.access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

fn collection_url(settings: &FirestoreSettings) -> Result<Url> {
    let mut url = Url::parse(settings.base_url.trim_end_matches('/')).map_err(|err| {
        AgarError::Internal(format!("invalid Firestore base URL {}: {err}", settings.base_url))
    })?;
    url.path_segments_mut()
        .map_err(|_| AgarError::Internal("Firestore base URL cannot hold a path".into()))?
        .pop_if_empty()
        .extend([
            "projects",
            settings.project_id.as_str(),
            "databases",
            settings.database.as_str(),
            "documents",
            settings.collection.as_str(),
        ]);
    Ok(url)
}

async fn check_status(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = format!("{what}: HTTP {status}: {}", body.trim());
    Err(status_error(status, detail))
}

fn status_error(status: StatusCode, detail: String) -> AgarError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AgarError::PermissionDenied(detail),
        StatusCode::NOT_FOUND => AgarError::NotFound(detail),
        StatusCode::PRECONDITION_FAILED | StatusCode::CONFLICT => AgarError::Conflict(detail),
        StatusCode::BAD_REQUEST if detail.contains("FAILED_PRECONDITION") => {
            AgarError::Conflict(detail)
        }
        StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT => {
            AgarError::StoreUnavailable(detail)
        }
        s if s.is_server_error() => AgarError::StoreUnavailable(detail),
        _ => AgarError::Internal(detail),
    }
}

/// Flattens a Firestore typed value (`{"integerValue": "5"}` etc.) into plain JSON.
pub fn flatten_value(value: &Value) -> Value {
    let Some(typed) = value.as_object() else {
        return Value::Null;
    };
    let Some((kind, inner)) = typed.iter().next() else {
        return Value::Null;
    };

    match kind.as_str() {
        "nullValue" => Value::Null,
        "integerValue" => match inner {
            Value::String(raw) => raw
                .parse::<i64>()
                .map(Value::from)
                .unwrap_or_else(|_| inner.clone()),
            _ => inner.clone(),
        },
        "booleanValue" | "doubleValue" | "stringValue" | "timestampValue" | "referenceValue"
        | "bytesValue" | "geoPointValue" => inner.clone(),
        "mapValue" => Value::Object(flatten_fields(
            inner.get("fields").and_then(Value::as_object),
        )),
        "arrayValue" => Value::Array(
            inner
                .get("values")
                .and_then(Value::as_array)
                .map(|values| values.iter().map(flatten_value).collect())
                .unwrap_or_default(),
        ),
        _ => Value::Null,
    }
}

fn flatten_fields(fields: Option<&Map<String, Value>>) -> Map<String, Value> {
    fields
        .map(|fields| {
            fields
                .iter()
                .map(|(key, value)| (key.clone(), flatten_value(value)))
                .collect()
        })
        .unwrap_or_default()
}

fn to_entry(document: &FirestoreDocument) -> StoredConference {
    StoredConference::from_document(document.id(), &flatten_fields(Some(&document.fields)))
}

/// Request body for a status-only PATCH.
pub fn status_patch_body(status: ConferenceStatus, updated_at: DateTime<Utc>) -> Value {
    json!({
        "fields": {
            STATUS_FIELD: { "stringValue": status.as_str() },
            UPDATED_AT_FIELD: {
                "timestampValue": updated_at.to_rfc3339_opts(SecondsFormat::Micros, true)
            },
        }
    })
}

#[async_trait]
impl ConferenceStore for FirestoreConferenceStore {
    async fn list_conferences(&self) -> Result<Vec<StoredConference>> {
        let mut entries = Vec::new();
        let mut revisions = HashMap::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = self.collection_url.clone();
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("pageSize", &self.settings.page_size.to_string());
                if let Some(token) = &page_token {
                    query.append_pair("pageToken", token);
                }
            }

            let response = self
                .request(Method::GET, url)
                .send()
                .await
                .map_err(|err| AgarError::StoreUnavailable(format!("list conferences: {err}")))?;
            let page: ListDocumentsResponse = check_status(response, "list conferences")
                .await?
                .json()
                .await?;

            debug!(count = page.documents.len(), "fetched Firestore page");
            entries.extend(page.documents.iter().map(to_entry));
            revisions.extend(page.documents.into_iter().filter_map(|document| {
                let id = ConferenceId::from(document.id());
                document.update_time.map(|update_time| (id, update_time))
            }));

            match page.next_page_token.filter(|token| !token.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        *self.revisions.lock().await = revisions;
        Ok(entries)
    }

    async fn get_conference(&self, id: &ConferenceId) -> Result<Option<StoredConference>> {
        let url = self.document_url(id)?;
        let response = self
            .request(Method::GET, url)
            .send()
            .await
            .map_err(|err| AgarError::StoreUnavailable(format!("get conference {id}: {err}")))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let document: FirestoreDocument = check_status(response, "get conference")
            .await?
            .json()
            .await?;
        self.remember(&document).await;
        Ok(Some(to_entry(&document)))
    }

    async fn update_status(
        &self,
        id: &ConferenceId,
        status: ConferenceStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let revision = self.revision(id).await;
        let url = self.status_patch_url(id, revision.as_deref())?;

        let response = self
            .request(Method::PATCH, url)
            .json(&status_patch_body(status, updated_at))
            .send()
            .await
            .map_err(|err| {
                AgarError::StoreUnavailable(format!("update conference {id}: {err}"))
            })?;
        let response = check_status(response, "update conference").await?;
        match response.json::<FirestoreDocument>().await {
            Ok(document) => self.remember(&document).await,
            // The write landed; the next listing refreshes the revision.
            Err(err) => debug!(conference = %id, error = %err, "unreadable PATCH response"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn builds_collection_url() {
        let mut settings = FirestoreSettings::new("micro-hub");
        settings.base_url = "http://localhost:8080/v1/".into();
        let url = collection_url(&settings).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/v1/projects/micro-hub/databases/(default)/documents/conferences"
        );
    }

    #[test]
    fn flattens_typed_document_into_record() {
        let document: FirestoreDocument = serde_json::from_value(json!({
            "name": "projects/p/databases/(default)/documents/conferences/abc123",
            "fields": {
                "title": { "stringValue": "Virology Live" },
                "startTime": { "timestampValue": "2024-05-01T10:00:00Z" },
                "endTime": { "mapValue": { "fields": {
                    "seconds": { "integerValue": "1714564800" },
                    "nanoseconds": { "integerValue": "0" }
                } } },
                "status": { "stringValue": "live" },
                "tags": { "arrayValue": { "values": [ { "stringValue": "virus" } ] } }
            }
        }))
        .unwrap();

        let entry = to_entry(&document);
        let record = entry.as_record().expect("valid record");
        assert_eq!(record.id.as_str(), "abc123");
        assert_eq!(record.title.as_deref(), Some("Virology Live"));
        assert_eq!(
            record.start_time,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap())
        );
        assert_eq!(
            record.end_time,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
        );
        assert_eq!(record.status, Some(ConferenceStatus::Live));
    }

    #[test]
    fn integer_epoch_millis_survive_flattening() {
        let flat = flatten_value(&json!({ "integerValue": "1714557600000" }));
        assert_eq!(flat, json!(1_714_557_600_000i64));
    }

    fn settings() -> FirestoreSettings {
        let mut settings = FirestoreSettings::new("micro-hub");
        settings.base_url = "http://localhost:8080/v1".into();
        settings
    }

    #[tokio::test]
    async fn status_writes_are_guarded_by_the_last_seen_revision() {
        let store = FirestoreConferenceStore::new(settings()).unwrap();
        let id = ConferenceId::from("abc123");

        let unguarded = store.status_patch_url(&id, None).unwrap();
        assert!(
            unguarded
                .query_pairs()
                .any(|(key, value)| key == "currentDocument.exists" && value == "true")
        );

        let document: FirestoreDocument = serde_json::from_value(json!({
            "name": "projects/micro-hub/databases/(default)/documents/conferences/abc123",
            "fields": { "status": { "stringValue": "upcoming" } },
            "updateTime": "2025-03-04T09:15:00.123456Z"
        }))
        .unwrap();
        store.remember(&document).await;

        let revision = store.revision(&id).await;
        assert_eq!(revision.as_deref(), Some("2025-03-04T09:15:00.123456Z"));

        let guarded = store.status_patch_url(&id, revision.as_deref()).unwrap();
        let query: Vec<(String, String)> = guarded.query_pairs().into_owned().collect();
        assert_eq!(
            query,
            [
                ("updateMask.fieldPaths".to_string(), "status".to_string()),
                ("updateMask.fieldPaths".to_string(), "updatedAt".to_string()),
                (
                    "currentDocument.updateTime".to_string(),
                    "2025-03-04T09:15:00.123456Z".to_string()
                ),
            ]
        );
    }

    #[test]
    fn failed_preconditions_are_conflicts() {
        let err = status_error(StatusCode::PRECONDITION_FAILED, "changed".into());
        assert!(matches!(err, AgarError::Conflict(_)));
        assert!(err.is_transient());
        assert!(matches!(
            status_error(
                StatusCode::BAD_REQUEST,
                r#"update conference: HTTP 400: {"error":{"status":"FAILED_PRECONDITION"}}"#.into()
            ),
            AgarError::Conflict(_)
        ));
        assert!(matches!(
            status_error(StatusCode::BAD_REQUEST, "bad field".into()),
            AgarError::Internal(_)
        ));
        assert!(matches!(
            status_error(StatusCode::FORBIDDEN, "rules".into()),
            AgarError::PermissionDenied(_)
        ));
        assert!(matches!(
            status_error(StatusCode::SERVICE_UNAVAILABLE, "down".into()),
            AgarError::StoreUnavailable(_)
        ));
    }

    #[test]
    fn patch_body_carries_only_status_and_marker() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 1).unwrap();
        let body = status_patch_body(ConferenceStatus::Ended, at);
        let fields = body["fields"].as_object().unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(body["fields"]["status"]["stringValue"], "ended");
        assert_eq!(
            body["fields"]["updatedAt"]["timestampValue"],
            "2024-05-01T12:00:01.000000Z"
        );
    }
}
