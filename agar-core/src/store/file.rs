use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

use super::ConferenceStore;
use crate::error::{AgarError, Result};
use crate::record::{
    ConferenceId, ConferenceRecord, MalformedRecord, STATUS_FIELD, StoredConference,
    UPDATED_AT_FIELD,
};
use crate::status::ConferenceStatus;

/// Conferences kept as a JSON array of documents on local disk.
///
/// Each document carries its identifier in an `id` field; every other field
/// is preserved untouched across status updates.
#[derive(Debug)]
pub struct JsonFileConferenceStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl JsonFileConferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_documents(&self) -> Result<Vec<Value>> {
        let contents = tokio::fs::read_to_string(&self.path).await.map_err(|err| {
            AgarError::StoreUnavailable(format!(
                "failed to read {}: {}",
                self.path.display(),
                err
            ))
        })?;
        match serde_json::from_str::<Value>(&contents)? {
            Value::Array(documents) => Ok(documents),
            _ => Err(AgarError::Internal(format!(
                "{} must contain a JSON array of conferences",
                self.path.display()
            ))),
        }
    }

    async fn write_documents(&self, documents: Vec<Value>) -> Result<()> {
        let contents = serde_json::to_string_pretty(&Value::Array(documents))?;
        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, contents).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}

fn document_id(document: &Value) -> Option<&str> {
    document.get("id").and_then(Value::as_str)
}

fn to_entry(index: usize, document: &Value) -> StoredConference {
    match (document_id(document), document.as_object()) {
        (Some(id), Some(fields)) => StoredConference::from_document(id, fields),
        (id, _) => {
            let id = id
                .map(ConferenceId::from)
                .unwrap_or_else(|| ConferenceId::new(format!("#{index}")));
            StoredConference::Malformed(MalformedRecord::new(
                id,
                "document must be an object with a string id",
            ))
        }
    }
}

#[async_trait]
impl ConferenceStore for JsonFileConferenceStore {
    async fn list_conferences(&self) -> Result<Vec<StoredConference>> {
        let documents = self.read_documents().await?;
        Ok(documents
            .iter()
            .enumerate()
            .map(|(index, document)| to_entry(index, document))
            .collect())
    }

    async fn get_conference(&self, id: &ConferenceId) -> Result<Option<StoredConference>> {
        let documents = self.read_documents().await?;
        Ok(documents
            .iter()
            .enumerate()
            .find(|(_, document)| document_id(document) == Some(id.as_str()))
            .map(|(index, document)| to_entry(index, document)))
    }

    async fn update_status(
        &self,
        id: &ConferenceId,
        status: ConferenceStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut documents = self.read_documents().await?;

        let fields = documents
            .iter_mut()
            .find(|document| document_id(document) == Some(id.as_str()))
            .and_then(Value::as_object_mut)
            .ok_or_else(|| AgarError::NotFound(id.to_string()))?;

        if let Err(malformed) = ConferenceRecord::from_document(id.clone(), fields) {
            return Err(AgarError::MalformedRecord {
                id: malformed.id.to_string(),
                reason: malformed.reason,
            });
        }

        fields.insert(STATUS_FIELD.into(), Value::String(status.to_string()));
        fields.insert(
            UPDATED_AT_FIELD.into(),
            Value::String(updated_at.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );

        self.write_documents(documents).await?;
        debug!(conference = %id, %status, path = %self.path.display(), "status written");
        Ok(())
    }
}
