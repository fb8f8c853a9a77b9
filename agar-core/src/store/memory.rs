use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

use super::ConferenceStore;
use crate::error::{AgarError, Result};
use crate::record::{ConferenceId, ConferenceRecord, StoredConference};
use crate::status::ConferenceStatus;

/// A status write as observed by the in-memory store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusWrite {
    pub id: ConferenceId,
    pub status: ConferenceStatus,
    pub updated_at: DateTime<Utc>,
}

/// Process-local store. Backs the `memory` backend and most tests.
#[derive(Clone, Debug, Default)]
pub struct InMemoryConferenceStore {
    documents: Arc<Mutex<BTreeMap<ConferenceId, StoredConference>>>,
    writes: Arc<Mutex<Vec<StatusWrite>>>,
    list_calls: Arc<AtomicUsize>,
}

impl InMemoryConferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records<I>(records: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<StoredConference>,
    {
        let documents = records
            .into_iter()
            .map(Into::into)
            .map(|entry: StoredConference| (entry.id().clone(), entry))
            .collect();
        Self {
            documents: Arc::new(Mutex::new(documents)),
            ..Self::default()
        }
    }

    pub async fn insert(&self, entry: impl Into<StoredConference>) {
        let entry = entry.into();
        self.documents
            .lock()
            .await
            .insert(entry.id().clone(), entry);
    }

    pub async fn record(&self, id: &ConferenceId) -> Option<ConferenceRecord> {
        self.documents
            .lock()
            .await
            .get(id)
            .and_then(StoredConference::as_record)
            .cloned()
    }

    /// Every status write applied so far, oldest first.
    pub async fn writes(&self) -> Vec<StatusWrite> {
        self.writes.lock().await.clone()
    }

    /// Number of full listings served.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConferenceStore for InMemoryConferenceStore {
    async fn list_conferences(&self) -> Result<Vec<StoredConference>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.documents.lock().await.values().cloned().collect())
    }

    async fn get_conference(&self, id: &ConferenceId) -> Result<Option<StoredConference>> {
        Ok(self.documents.lock().await.get(id).cloned())
    }

    async fn update_status(
        &self,
        id: &ConferenceId,
        status: ConferenceStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut documents = self.documents.lock().await;
        match documents.get_mut(id) {
            Some(StoredConference::Valid(record)) => {
                record.status = Some(status);
                record.updated_at = Some(updated_at);
            }
            Some(StoredConference::Malformed(malformed)) => {
                return Err(AgarError::MalformedRecord {
                    id: malformed.id.to_string(),
                    reason: malformed.reason.clone(),
                });
            }
            None => return Err(AgarError::NotFound(id.to_string())),
        }
        drop(documents);

        self.writes.lock().await.push(StatusWrite {
            id: id.clone(),
            status,
            updated_at,
        });
        Ok(())
    }
}
