//! Document store boundary.
//!
//! The core only needs three things from the backing store: list a
//! collection, read one document, and update named fields of one document.
//! Adapters normalize timestamps before handing records over.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::record::{ConferenceId, StoredConference};
use crate::status::ConferenceStatus;

pub mod file;
#[cfg(feature = "firestore")]
#[cfg_attr(docsrs, doc(cfg(feature = "firestore")))]
pub mod firestore;
pub mod memory;

pub use file::JsonFileConferenceStore;
#[cfg(feature = "firestore")]
pub use firestore::{FirestoreConferenceStore, FirestoreSettings};
pub use memory::InMemoryConferenceStore;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConferenceStore: Send + Sync {
    /// Every conference in the collection. There is no server-side filter
    /// for "stale status", so reconciliation always scans everything.
    async fn list_conferences(&self) -> Result<Vec<StoredConference>>;

    async fn get_conference(&self, id: &ConferenceId) -> Result<Option<StoredConference>>;

    /// Writes only `status` and the `updatedAt` marker.
    async fn update_status(
        &self,
        id: &ConferenceId,
        status: ConferenceStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<()>;
}
